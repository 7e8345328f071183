//! Recognizing hand-written equality members that a record would generate anyway.
//!
//! `Equals` bodies are matched by recursive descent over boolean conditions, carrying a
//! success polarity: whether the condition being true means the objects are equal (`true`) or
//! that the method returns `false` (`false`). Negation flips the polarity, so De Morgan
//! rewritings of the same comparison are recognized alike. Every comparison found adds the
//! compared storage to a [`FieldSet`]; the method is redundant only if that set is exactly the
//! expected one.
//!
//! Recognition fails closed: any statement or condition shape not understood here means the
//! user's method is kept.

pub mod hash;

use log::trace;

use crate::ir::names::Discrim;
use crate::ir::{BinaryOp, Body, ConversionKind, OpKind, Operation, Pattern, UnaryOp};
use crate::symbols::{FieldSet, MethodKind, Model, SymbolId};

pub use self::hash::{DefaultHashCodeAnalyzer, HashCodeAnalyzer};

/// Something an expression can denote in an `Equals` body.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Ref {
    This,
    Parameter(SymbolId),
    Local(SymbolId),
}

/// What is known about "the other object" at a point of the match.
#[derive(Clone, Debug)]
struct Binding {
    /// The single parameter of `Equals`.
    param: SymbolId,
    /// Expressions known to denote the other object, as the declaring type.
    others: Vec<Ref>,
    /// The parameter has passed `param is T`, so `(T)param` is safe.
    type_checked: bool,
}

impl Binding {
    fn is_other(&self, r: Ref) -> bool {
        self.others.contains(&r)
    }
}

/// Matcher state for one type; see [`equals_fields`].
struct EqualsMatcher<'m> {
    model: &'m Model,
    ty: SymbolId,
}

impl<'m> EqualsMatcher<'m> {
    fn is_other(&self, op: &Operation, cx: &Binding) -> bool {
        reference(op).map_or(false, |r| cx.is_other(r)) || self.is_checked_cast(op.unwrap_implicit(), cx)
    }

    /// `(T)param` once the parameter has passed a type test.
    fn is_checked_cast(&self, op: &Operation, cx: &Binding) -> bool {
        match &op.kind {
            OpKind::Conversion {
                kind: ConversionKind::Explicit,
                operand,
            } => cx.type_checked && op.ty.is(self.ty) && reference(operand) == Some(Ref::Parameter(cx.param)),
            _ => false,
        }
    }

    /// The other object, or the not-yet-cast parameter: both may be null-checked.
    fn is_null_checkable(&self, op: &Operation, cx: &Binding) -> bool {
        self.is_other(op, cx) || reference(op) == Some(Ref::Parameter(cx.param))
    }

    /// `x.Member` with an instance receiver.
    fn member_reference<'o>(&self, op: &'o Operation) -> Option<(SymbolId, &'o Operation)> {
        match &op.unwrap_implicit().kind {
            OpKind::MemberReference {
                member,
                instance: Some(instance),
            } => Some((*member, instance)),
            _ => None,
        }
    }

    /// `this.M` against `other.M` in either order; the same member, each binding once.
    fn member_comparison(
        &self,
        left: &Operation,
        right: &Operation,
        cx: &Binding,
        fields: &mut FieldSet,
    ) -> bool {
        let ((lm, li), (rm, ri)) = match (self.member_reference(left), self.member_reference(right)) {
            (Some(l), Some(r)) => (l, r),
            _ => {
                trace!("comparison of non-members");
                return false;
            }
        };
        if lm != rm {
            trace!("{} compared against {}", self.model.name(lm), self.model.name(rm));
            return false;
        }
        let this = |op: &Operation| reference(op) == Some(Ref::This);
        let crossed = (this(li) && self.is_other(ri, cx)) || (self.is_other(li, cx) && this(ri));
        if !crossed {
            trace!("{} not compared between this and other", self.model.name(lm));
            return false;
        }
        fields.insert_member(self.model, lm);
        true
    }

    /// `a.Equals(b)`, `Equals(a, b)` or `EqualityComparer<T>.Default.Equals(a, b)`.
    fn equals_invocation(&self, op: &Operation, cx: &Binding, fields: &mut FieldSet) -> bool {
        let (method, instance, arguments) = match &op.kind {
            OpKind::Invocation {
                method,
                instance,
                arguments,
            } => (method, instance, arguments),
            _ => return false,
        };
        if method.name != "Equals" {
            return false;
        }
        match (instance.as_deref(), &arguments[..]) {
            (Some(x), [y]) => self.member_comparison(x, y, cx, fields),
            (Some(comparer), [x, y]) if is_default_comparer(comparer) => {
                self.member_comparison(x, y, cx, fields)
            }
            (None, [x, y]) => self.member_comparison(x, y, cx, fields),
            _ => false,
        }
    }

    /// Matches a boolean condition under the given polarity.
    fn condition(
        &self,
        op: &Operation,
        success: bool,
        cx: &mut Binding,
        fields: &mut FieldSet,
    ) -> bool {
        let op = op.unwrap_implicit();
        match &op.kind {
            OpKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.condition(operand, !success, cx, fields),
            OpKind::Binary {
                op: BinaryOp::ConditionalAnd,
                left,
                right,
            } if success => {
                self.condition(left, true, cx, fields) && self.condition(right, true, cx, fields)
            }
            OpKind::Binary {
                op: BinaryOp::ConditionalOr,
                left,
                right,
            } if !success => {
                self.condition(left, false, cx, fields) && self.condition(right, false, cx, fields)
            }
            OpKind::Binary {
                op: bop @ (BinaryOp::Equals | BinaryOp::NotEquals),
                left,
                right,
            } => {
                let equal = *bop == BinaryOp::Equals;
                let checked = if right.is_null_literal() {
                    Some(left)
                } else if left.is_null_literal() {
                    Some(right)
                } else {
                    None
                };
                if let Some(checked) = checked {
                    // `other == null` being true means failure
                    return equal != success && self.is_null_checkable(checked, cx);
                }
                if equal != success {
                    trace!("comparison with inverted polarity");
                    return false;
                }
                self.member_comparison(left, right, cx, fields)
            }
            OpKind::IsPattern { value, pattern } => self.pattern(value, pattern, success, cx),
            OpKind::Invocation { .. } if success => self.equals_invocation(op, cx, fields),
            other => {
                trace!("unrecognized condition {} (success: {})", other.discrim(), success);
                false
            }
        }
    }

    fn pattern(&self, value: &Operation, pattern: &Pattern, success: bool, cx: &mut Binding) -> bool {
        match pattern {
            Pattern::Not(inner) => self.pattern(value, inner, !success, cx),
            Pattern::Null => !success && self.is_null_checkable(value, cx),
            Pattern::Type { ty, declared } => {
                if !success || !ty.is(self.ty) || !self.is_null_checkable(value, cx) {
                    trace!("type test does not establish the other object");
                    return false;
                }
                match declared {
                    Some(local) => cx.others.push(Ref::Local(*local)),
                    None => cx.type_checked = true,
                }
                true
            }
            other => {
                trace!("unrecognized pattern {}", other.discrim());
                false
            }
        }
    }

    /// `var x = param as T;`, or `var x = (T)param;` after a type test.
    fn binds_other(&self, init: &Operation, cx: &Binding) -> bool {
        match &init.kind {
            OpKind::Conversion { kind, operand } if *kind != ConversionKind::Implicit => {
                let checked = *kind == ConversionKind::TryCast || cx.type_checked;
                checked
                    && init.ty.is(self.ty)
                    && reference(operand) == Some(Ref::Parameter(cx.param))
            }
            _ => false,
        }
    }

    /// Matches a statement list, where the method's result decides equality.
    fn statements(&self, stmts: &[&Operation], cx: &mut Binding, fields: &mut FieldSet) -> bool {
        let (first, rest) = match stmts.split_first() {
            Some(x) => x,
            None => {
                trace!("fell off the end");
                return false;
            }
        };
        match &first.kind {
            OpKind::Return(Some(value)) => {
                value.unwrap_implicit().is_bool_literal(true)
                    || self.condition(value, true, cx, fields)
            }
            OpKind::VariableDeclaration {
                local,
                initializer: Some(init),
            } if self.binds_other(init, cx) => {
                cx.others.push(Ref::Local(*local));
                self.statements(rest, cx, fields)
            }
            OpKind::Conditional {
                condition,
                when_true,
                when_false,
                is_expression: false,
            } => {
                let mut a = when_true.statements();
                a.extend(rest);
                let mut b = when_false
                    .as_ref()
                    .map(|x| x.statements())
                    .unwrap_or_default();
                b.extend(rest);
                let (a_fails, b_fails) = (returns_false(&a), returns_false(&b));
                if a_fails == b_fails {
                    trace!("neither or both branches fail");
                    return false;
                }
                let success = !a_fails;
                if !self.condition(condition, success, cx, fields) {
                    return false;
                }
                let continuation = if a_fails { b } else { a };
                self.statements(&continuation, cx, fields)
            }
            other => {
                trace!("unrecognized statement {}", other.discrim());
                false
            }
        }
    }
}

/// What `op` denotes, seeing through implicit conversions.
fn reference(op: &Operation) -> Option<Ref> {
    match &op.unwrap_implicit().kind {
        OpKind::InstanceReference => Some(Ref::This),
        OpKind::ParameterReference(p) => Some(Ref::Parameter(*p)),
        OpKind::LocalReference(l) => Some(Ref::Local(*l)),
        _ => None,
    }
}

fn returns_false(stmts: &[&Operation]) -> bool {
    match stmts.first().map(|s| &s.kind) {
        Some(OpKind::Return(Some(v))) => v.unwrap_implicit().is_bool_literal(false),
        _ => false,
    }
}

fn is_default_comparer(op: &Operation) -> bool {
    match &op.kind {
        OpKind::ExternalReference(path) => {
            path.starts_with("EqualityComparer<") && path.ends_with(">.Default")
        }
        _ => false,
    }
}

/// The single parameter of a one-parameter, `bool`-returning method.
fn equals_parameter(model: &Model, method: SymbolId) -> Option<SymbolId> {
    let m = model.method(method)?;
    match (&m.parameters[..], m.return_type.is_bool()) {
        ([p], true) if m.name == "Equals" && !m.is_static => Some(*p),
        _ => None,
    }
}

/// The storage compared by an `Equals(T)` or `Equals(object)` body, if it has a recognized shape.
pub fn equals_fields(model: &Model, ty: SymbolId, method: SymbolId, body: &Body) -> Option<FieldSet> {
    let param = equals_parameter(model, method)?;
    let pty = &model.parameter(param)?.ty;
    let mut cx = Binding {
        param,
        others: Vec::new(),
        type_checked: false,
    };
    if pty.is(ty) {
        cx.others.push(Ref::Parameter(param));
    } else if !pty.is_object() {
        return None;
    }
    let matcher = EqualsMatcher { model, ty };
    let mut fields = FieldSet::new();
    if matcher.statements(&body.block.statements(), &mut cx, &mut fields) {
        Some(fields)
    } else {
        None
    }
}

/// `Equals(object other) => Equals(other as T)`: delegation to the typed overload.
pub fn delegates_to_typed_equals(model: &Model, ty: SymbolId, method: SymbolId, body: &Body) -> bool {
    let param = match equals_parameter(model, method) {
        Some(p) => p,
        None => return false,
    };
    if !model.parameter(param).map_or(false, |p| p.ty.is_object()) {
        return false;
    }
    let value = match body.block.statements()[..] {
        [ret] => match &ret.kind {
            OpKind::Return(Some(v)) => v.unwrap_implicit(),
            _ => return false,
        },
        _ => return false,
    };
    let (target, instance, arguments) = match &value.kind {
        OpKind::Invocation {
            method,
            instance,
            arguments,
        } => (method, instance, arguments),
        _ => return false,
    };
    let on_this = match instance.as_deref() {
        None => true,
        Some(i) => matches!(i.kind, OpKind::InstanceReference),
    };
    let typed_overload = match target.symbol {
        Some(m) => model.parameter_types(m).first().map_or(false, |t| t.is(ty)),
        None => true,
    };
    let cast = match &arguments[..] {
        [arg] => match &arg.unwrap_implicit().kind {
            OpKind::Conversion {
                kind: ConversionKind::TryCast,
                operand,
            } => {
                arg.unwrap_implicit().ty.is(ty)
                    && matches!(operand.unwrap_implicit().kind, OpKind::ParameterReference(p) if p == param)
            }
            _ => false,
        },
        _ => false,
    };
    target.name == "Equals" && on_this && typed_overload && cast
}

/// Whether an `Equals` method compares exactly the expected fields.
pub fn is_redundant_equals(
    model: &Model,
    ty: SymbolId,
    method: SymbolId,
    body: &Body,
    expected: &FieldSet,
) -> bool {
    if delegates_to_typed_equals(model, ty, method, body) {
        return true;
    }
    match equals_fields(model, ty, method, body) {
        Some(fields) if &fields == expected => true,
        Some(fields) => {
            trace!("Equals compares {} fields, {} expected", fields.len(), expected.len());
            false
        }
        None => false,
    }
}

fn binary_parameters(model: &Model, method: SymbolId, kind: MethodKind) -> Option<(SymbolId, SymbolId)> {
    let m = model.method(method)?;
    match &m.parameters[..] {
        [a, b] if m.kind == kind => Some((*a, *b)),
        _ => None,
    }
}

fn sole_return(body: &Body) -> Option<&Operation> {
    match body.block.statements()[..] {
        [ret] => match &ret.kind {
            OpKind::Return(Some(v)) => Some(v.unwrap_implicit()),
            _ => None,
        },
        _ => None,
    }
}

fn parameter_of(op: &Operation) -> Option<SymbolId> {
    match op.unwrap_implicit().kind {
        OpKind::ParameterReference(p) => Some(p),
        _ => None,
    }
}

/// `a.Equals(b)` or `b.Equals(a)`.
fn delegates_to_equals(op: &Operation, (a, b): (SymbolId, SymbolId)) -> bool {
    match &op.kind {
        OpKind::Invocation {
            method,
            instance: Some(instance),
            arguments,
        } if method.name == "Equals" && arguments.len() == 1 => {
            let pair = (parameter_of(instance), parameter_of(&arguments[0]));
            pair == (Some(a), Some(b)) || pair == (Some(b), Some(a))
        }
        _ => false,
    }
}

/// `operator ==(a, b) => a.Equals(b)`, in either role.
pub fn is_redundant_eq_operator(model: &Model, method: SymbolId, body: &Body) -> bool {
    let params = match binary_parameters(model, method, MethodKind::Equality) {
        Some(p) if p.0 != p.1 => p,
        _ => return false,
    };
    sole_return(body).map_or(false, |v| delegates_to_equals(v, params))
}

/// `operator !=(a, b) => !a.Equals(b)` or `!(a == b)`.
pub fn is_redundant_ne_operator(model: &Model, method: SymbolId, body: &Body) -> bool {
    let (a, b) = match binary_parameters(model, method, MethodKind::Inequality) {
        Some(p) if p.0 != p.1 => p,
        _ => return false,
    };
    let negated = match sole_return(body).map(|v| &v.kind) {
        Some(OpKind::Unary {
            op: UnaryOp::Not,
            operand,
        }) => operand.unwrap_implicit(),
        _ => return false,
    };
    match &negated.kind {
        OpKind::Binary {
            op: BinaryOp::Equals,
            left,
            right,
        } => {
            let pair = (parameter_of(left), parameter_of(right));
            pair == (Some(a), Some(b)) || pair == (Some(b), Some(a))
        }
        _ => delegates_to_equals(negated, (a, b)),
    }
}

/// Whether `GetHashCode` hashes exactly the expected fields, per `analyzer`.
pub fn is_redundant_get_hash_code(
    model: &Model,
    ty: SymbolId,
    body: &Body,
    expected: &FieldSet,
    analyzer: &dyn HashCodeAnalyzer,
) -> bool {
    let members = match analyzer.hashed_members(model, ty, body) {
        Some(members) => members,
        None => return false,
    };
    let mut hashed = FieldSet::new();
    for m in members {
        hashed.insert_member(model, m);
    }
    &hashed == expected
}
