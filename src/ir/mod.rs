//! The typed operation tree: a semantic IR of method bodies.
//!
//! Every node carries its resolved static type. Trees are immutable once built; edits produce new
//! trees through [`Operation::replaced`] and [`Operation::without`], preserving the ids of
//! everything that was not touched.

pub mod names;
pub mod visit;

use crate::symbols::{SymbolId, Type};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct OpId(u32);

impl OpId {
    pub fn new(n: u32) -> Self {
        OpId(n)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// Hands out operation ids; ids are unique within a program.
#[derive(Debug)]
pub struct IdGen {
    next: u32,
}

impl Default for IdGen {
    fn default() -> Self {
        IdGen { next: 1 }
    }
}

impl IdGen {
    pub fn new() -> Self {
        IdGen::default()
    }

    /// Continue numbering after an existing tree's largest id.
    pub fn after(last: OpId) -> Self {
        IdGen { next: last.0 + 1 }
    }

    pub fn next(&mut self) -> OpId {
        let id = OpId(self.next);
        self.next += 1;
        id
    }

    pub fn last(&self) -> OpId {
        OpId(self.next - 1)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Span {
    pub start: LineColumn,
    pub end: LineColumn,
}

impl Span {
    pub fn new(start: LineColumn, end: LineColumn) -> Self {
        Span { start, end }
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Size key: lines covered, then columns.
    pub fn extent(&self) -> (usize, usize) {
        let lines = self.end.line.saturating_sub(self.start.line);
        if lines == 0 {
            (0, self.end.column.saturating_sub(self.start.column))
        } else {
            (lines, self.end.column)
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Constant {
    Null,
    /// The `default` literal.
    Default,
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BinaryOp {
    Equals,
    NotEquals,
    ConditionalAnd,
    ConditionalOr,
    And,
    Or,
    ExclusiveOr,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Coalesce,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ConversionKind {
    Implicit,
    /// `(T)x`
    Explicit,
    /// `x as T`
    TryCast,
}

/// Target of an invocation.
#[derive(Clone, PartialEq, Debug)]
pub struct MethodRef {
    pub name: String,
    pub symbol: Option<SymbolId>,
    /// Type name for static calls on types outside the model, e.g. `HashCode`.
    pub qualifier: Option<String>,
}

impl MethodRef {
    pub fn named(name: impl Into<String>) -> Self {
        MethodRef {
            name: name.into(),
            symbol: None,
            qualifier: None,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Pattern {
    /// `T` or `T x`
    Type { ty: Type, declared: Option<SymbolId> },
    /// `null`
    Null,
    /// `not p`
    Not(Box<Pattern>),
    /// `_`
    Discard,
    Constant(Box<Operation>),
}

impl Pattern {
    /// Locals introduced by this pattern.
    pub fn declared_locals(&self) -> Vec<SymbolId> {
        match self {
            Pattern::Type {
                declared: Some(x), ..
            } => vec![*x],
            Pattern::Not(p) => p.declared_locals(),
            _ => Vec::new(),
        }
    }

    fn operations(&self) -> Vec<&Operation> {
        match self {
            Pattern::Constant(op) => vec![op],
            Pattern::Not(p) => p.operations(),
            _ => Vec::new(),
        }
    }

    fn operations_mut(&mut self) -> Vec<&mut Operation> {
        match self {
            Pattern::Constant(op) => vec![op],
            Pattern::Not(p) => p.operations_mut(),
            _ => Vec::new(),
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct SwitchArm {
    pub pattern: Pattern,
    pub value: Operation,
}

#[derive(Clone, PartialEq, Debug)]
pub enum OpKind {
    Block(Vec<Operation>),
    Return(Option<Box<Operation>>),
    /// An `if` statement, or a `?:` expression when `is_expression`.
    Conditional {
        condition: Box<Operation>,
        when_true: Box<Operation>,
        when_false: Option<Box<Operation>>,
        is_expression: bool,
    },
    Binary {
        op: BinaryOp,
        left: Box<Operation>,
        right: Box<Operation>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Operation>,
    },
    Invocation {
        method: MethodRef,
        instance: Option<Box<Operation>>,
        arguments: Vec<Operation>,
    },
    /// Field or property access; `instance` is `None` for static members.
    MemberReference {
        member: SymbolId,
        instance: Option<Box<Operation>>,
    },
    ParameterReference(SymbolId),
    LocalReference(SymbolId),
    /// `this`, explicit or implicit.
    InstanceReference,
    /// A name outside the model, such as a static utility type.
    ExternalReference(String),
    /// Value is in [`Operation::constant`].
    Literal,
    IsPattern {
        value: Box<Operation>,
        pattern: Pattern,
    },
    VariableDeclaration {
        local: SymbolId,
        initializer: Option<Box<Operation>>,
    },
    Throw(Option<Box<Operation>>),
    Conversion {
        kind: ConversionKind,
        operand: Box<Operation>,
    },
    Assignment {
        target: Box<Operation>,
        value: Box<Operation>,
    },
    /// `new T(args) { P = v, ... }`; `constructor` is `None` for the implicit parameterless one.
    ObjectCreation {
        constructor: Option<SymbolId>,
        arguments: Vec<Operation>,
        initializer: Option<Vec<Operation>>,
    },
    Switch {
        value: Box<Operation>,
        arms: Vec<SwitchArm>,
    },
}

#[derive(Clone, PartialEq, Debug)]
pub struct Operation {
    pub id: OpId,
    pub kind: OpKind,
    pub ty: Type,
    pub constant: Option<Constant>,
    pub span: Span,
    /// Inserted by the compiler rather than written, e.g. the receiver of `P` meaning `this.P`.
    pub implicit: bool,
}

impl Operation {
    pub fn new(id: OpId, kind: OpKind, ty: Type) -> Self {
        Operation {
            id,
            kind,
            ty,
            constant: None,
            span: Span::default(),
            implicit: false,
        }
    }

    pub fn literal(id: OpId, value: Constant, ty: Type) -> Self {
        Operation {
            constant: Some(value),
            ..Operation::new(id, OpKind::Literal, ty)
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn into_implicit(mut self) -> Self {
        self.implicit = true;
        self
    }

    pub fn children(&self) -> Vec<&Operation> {
        use self::OpKind::*;
        match &self.kind {
            Block(xs) => xs.iter().collect(),
            Return(x) | Throw(x) => x.iter().map(|x| &**x).collect(),
            Conditional {
                condition,
                when_true,
                when_false,
                ..
            } => {
                let mut v = vec![&**condition, &**when_true];
                v.extend(when_false.iter().map(|x| &**x));
                v
            }
            Binary { left, right, .. } => vec![left, right],
            Unary { operand, .. } | Conversion { operand, .. } => vec![operand],
            Invocation {
                instance,
                arguments,
                ..
            } => instance
                .iter()
                .map(|x| &**x)
                .chain(arguments.iter())
                .collect(),
            MemberReference { instance, .. } => instance.iter().map(|x| &**x).collect(),
            IsPattern { value, pattern } => {
                let mut v = vec![&**value];
                v.extend(pattern.operations());
                v
            }
            VariableDeclaration { initializer, .. } => {
                initializer.iter().map(|x| &**x).collect()
            }
            Assignment { target, value } => vec![target, value],
            ObjectCreation {
                arguments,
                initializer,
                ..
            } => arguments
                .iter()
                .chain(initializer.iter().flatten())
                .collect(),
            Switch { value, arms } => {
                let mut v = vec![&**value];
                for arm in arms {
                    v.extend(arm.pattern.operations());
                    v.push(&arm.value);
                }
                v
            }
            ParameterReference(_) | LocalReference(_) | InstanceReference
            | ExternalReference(_) | Literal => Vec::new(),
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut Operation> {
        use self::OpKind::*;
        match &mut self.kind {
            Block(xs) => xs.iter_mut().collect(),
            Return(x) | Throw(x) => x.iter_mut().map(|x| &mut **x).collect(),
            Conditional {
                condition,
                when_true,
                when_false,
                ..
            } => {
                let mut v = vec![&mut **condition, &mut **when_true];
                v.extend(when_false.iter_mut().map(|x| &mut **x));
                v
            }
            Binary { left, right, .. } => vec![&mut **left, &mut **right],
            Unary { operand, .. } | Conversion { operand, .. } => vec![&mut **operand],
            Invocation {
                instance,
                arguments,
                ..
            } => instance
                .iter_mut()
                .map(|x| &mut **x)
                .chain(arguments.iter_mut())
                .collect(),
            MemberReference { instance, .. } => instance.iter_mut().map(|x| &mut **x).collect(),
            IsPattern { value, pattern } => {
                let mut v = vec![&mut **value];
                v.extend(pattern.operations_mut());
                v
            }
            VariableDeclaration { initializer, .. } => {
                initializer.iter_mut().map(|x| &mut **x).collect()
            }
            Assignment { target, value } => vec![&mut **target, &mut **value],
            ObjectCreation {
                arguments,
                initializer,
                ..
            } => arguments
                .iter_mut()
                .chain(initializer.iter_mut().flatten())
                .collect(),
            Switch { value, arms } => {
                let mut v = vec![&mut **value];
                for arm in arms {
                    v.extend(arm.pattern.operations_mut());
                    v.push(&mut arm.value);
                }
                v
            }
            ParameterReference(_) | LocalReference(_) | InstanceReference
            | ExternalReference(_) | Literal => Vec::new(),
        }
    }

    /// Pre-order traversal, `self` first.
    pub fn descendants(&self) -> Vec<&Operation> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(op) = stack.pop() {
            out.push(op);
            let mut children = op.children();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    pub fn find(&self, id: OpId) -> Option<&Operation> {
        if self.id == id {
            return Some(self);
        }
        self.children().into_iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: OpId) -> Option<&mut Operation> {
        if self.id == id {
            return Some(self);
        }
        self.children_mut().into_iter().find_map(|c| c.find_mut(id))
    }

    /// A copy of this tree with the node `id` replaced; `None` if there is no such node.
    pub fn replaced(&self, id: OpId, with: Operation) -> Option<Operation> {
        let mut copy = self.clone();
        let slot = copy.find_mut(id)?;
        *slot = with;
        Some(copy)
    }

    /// A copy of this tree with the given statements removed from every block.
    pub fn without(&self, statements: &[OpId]) -> Operation {
        let mut copy = self.clone();
        copy.remove_statements(statements);
        copy
    }

    fn remove_statements(&mut self, statements: &[OpId]) {
        if let OpKind::Block(xs) = &mut self.kind {
            xs.retain(|s| !statements.contains(&s.id));
        }
        for c in self.children_mut() {
            c.remove_statements(statements);
        }
    }

    /// The statements of a body with nested blocks flattened.
    pub fn statements(&self) -> Vec<&Operation> {
        match &self.kind {
            OpKind::Block(xs) => xs.iter().flat_map(|s| s.statements()).collect(),
            _ => vec![self],
        }
    }

    /// Skip compiler-inserted conversions.
    pub fn unwrap_implicit(&self) -> &Operation {
        match &self.kind {
            OpKind::Conversion {
                kind: ConversionKind::Implicit,
                operand,
            } => operand.unwrap_implicit(),
            _ => self,
        }
    }

    pub fn is_bool_literal(&self, value: bool) -> bool {
        matches!(self.kind, OpKind::Literal) && self.constant == Some(Constant::Bool(value))
    }

    pub fn is_null_literal(&self) -> bool {
        let op = self.unwrap_implicit();
        matches!(op.kind, OpKind::Literal) && op.constant == Some(Constant::Null)
    }

    pub fn max_id(&self) -> OpId {
        self.descendants()
            .into_iter()
            .map(|op| op.id)
            .max()
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum InitializerKind {
    This,
    Base,
}

/// `: this(...)` or `: base(...)` on a constructor.
#[derive(Clone, PartialEq, Debug)]
pub struct ConstructorInitializer {
    pub kind: InitializerKind,
    /// The constructor called; `None` for a base record's positional constructor.
    pub target: Option<SymbolId>,
    /// Parameters of the called constructor, in order.
    pub parameters: Vec<SymbolId>,
    pub arguments: Vec<Operation>,
}

impl ConstructorInitializer {
    pub fn bindings(&self) -> impl Iterator<Item = (SymbolId, &Operation)> {
        self.parameters.iter().copied().zip(self.arguments.iter())
    }
}

/// The lowered body of a method or constructor. Expression bodies are lowered to a block.
#[derive(Clone, PartialEq, Debug)]
pub struct Body {
    pub owner: SymbolId,
    pub initializer: Option<ConstructorInitializer>,
    pub block: Operation,
    pub span: Span,
}

impl Body {
    pub fn find(&self, id: OpId) -> Option<&Operation> {
        self.initializer
            .iter()
            .flat_map(|i| i.arguments.iter())
            .find_map(|a| a.find(id))
            .or_else(|| self.block.find(id))
    }

    pub fn max_id(&self) -> OpId {
        self.initializer
            .iter()
            .flat_map(|i| i.arguments.iter())
            .map(|a| a.max_id())
            .chain(std::iter::once(self.block.max_id()))
            .max()
            .unwrap_or_default()
    }

    /// A copy with node `id` replaced wherever it occurs.
    pub fn replaced(&self, id: OpId, with: Operation) -> Option<Body> {
        let mut copy = self.clone();
        if let Some(slot) = copy.block.find_mut(id) {
            *slot = with;
            return Some(copy);
        }
        let slot = copy
            .initializer
            .iter_mut()
            .flat_map(|i| i.arguments.iter_mut())
            .find_map(|a| a.find_mut(id))?;
        *slot = with;
        Some(copy)
    }

    /// Every operation of the body, initializer arguments first.
    pub fn operations(&self) -> Vec<&Operation> {
        self.initializer
            .iter()
            .flat_map(|i| i.arguments.iter())
            .flat_map(|a| a.descendants())
            .chain(self.block.descendants())
            .collect()
    }
}
