use super::{BinaryOp, ConversionKind, OpKind, Pattern, UnaryOp};

/// Short variant name, for logging and debug trees.
pub trait Discrim {
    fn discrim(&self) -> &'static str;
}

impl Discrim for OpKind {
    fn discrim(&self) -> &'static str {
        use self::OpKind::*;
        match self {
            Block(..) => "Block",
            Return(..) => "Return",
            Conditional { .. } => "Conditional",
            Binary { .. } => "Binary",
            Unary { .. } => "Unary",
            Invocation { .. } => "Invocation",
            MemberReference { .. } => "MemberReference",
            ParameterReference(..) => "ParameterReference",
            LocalReference(..) => "LocalReference",
            InstanceReference => "InstanceReference",
            ExternalReference(..) => "ExternalReference",
            Literal => "Literal",
            IsPattern { .. } => "IsPattern",
            VariableDeclaration { .. } => "VariableDeclaration",
            Throw(..) => "Throw",
            Conversion { .. } => "Conversion",
            Assignment { .. } => "Assignment",
            ObjectCreation { .. } => "ObjectCreation",
            Switch { .. } => "Switch",
        }
    }
}

impl Discrim for Pattern {
    fn discrim(&self) -> &'static str {
        match self {
            Pattern::Type { .. } => "TypePattern",
            Pattern::Null => "NullPattern",
            Pattern::Not(..) => "NotPattern",
            Pattern::Discard => "DiscardPattern",
            Pattern::Constant(..) => "ConstantPattern",
        }
    }
}

impl Discrim for ConversionKind {
    fn discrim(&self) -> &'static str {
        match self {
            ConversionKind::Implicit => "Implicit",
            ConversionKind::Explicit => "Explicit",
            ConversionKind::TryCast => "TryCast",
        }
    }
}

impl BinaryOp {
    pub fn token(self) -> &'static str {
        use self::BinaryOp::*;
        match self {
            Equals => "==",
            NotEquals => "!=",
            ConditionalAnd => "&&",
            ConditionalOr => "||",
            And => "&",
            Or => "|",
            ExclusiveOr => "^",
            Add => "+",
            Subtract => "-",
            Multiply => "*",
            Divide => "/",
            Remainder => "%",
            LessThan => "<",
            LessThanOrEqual => "<=",
            GreaterThan => ">",
            GreaterThanOrEqual => ">=",
            Coalesce => "??",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        use self::BinaryOp::*;
        match self {
            Coalesce => 1,
            ConditionalOr => 2,
            ConditionalAnd => 3,
            Or => 4,
            ExclusiveOr => 5,
            And => 6,
            Equals | NotEquals => 7,
            LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => 8,
            Add | Subtract => 9,
            Multiply | Divide | Remainder => 10,
        }
    }
}

impl UnaryOp {
    pub fn token(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Negate => "-",
        }
    }
}
