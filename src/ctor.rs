//! Matching constructors against the positional parameter list.
//!
//! The first constructor whose body is nothing but `Property = parameter` assignments covering
//! every candidate becomes the primary constructor and fixes the parameter order. A copy
//! constructor is recognised so it can be dropped. Everything else is rewritten to forward to
//! the primary constructor through `: this(...)`, hoisting the assignments that are safe to
//! evaluate before the object exists.

use std::collections::HashMap;

use log::{debug, trace};

use crate::classify::MemberCandidate;
use crate::ir::visit::Visitor;
use crate::ir::{Body, InitializerKind, OpId, OpKind, Operation, Pattern};
use crate::rewrite::Program;
use crate::symbols::{Model, SymbolId, Type};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ConstructorShape {
    Primary,
    Copy,
    Other,
}

/// A value passed to the primary constructor by a forwarding constructor.
#[derive(Clone, PartialEq, Debug)]
pub enum Argument {
    Value(Operation),
    Null,
    Default,
}

#[derive(Clone, PartialEq, Debug)]
pub enum Disposition {
    /// Replaced by the record's positional parameter list.
    Primary,
    /// Replaced by the record's synthesized copy constructor.
    Copy,
    /// Its signature equals the positional one, or it already chains to another constructor.
    Untouched,
    /// Gains `: this(arguments)`; `removed_statements` move into the arguments.
    Forwarding {
        arguments: Vec<Argument>,
        removed_statements: Vec<OpId>,
    },
    /// Could not be made to forward; left as written.
    Kept,
}

impl Disposition {
    pub fn shape(&self) -> ConstructorShape {
        match self {
            Disposition::Primary => ConstructorShape::Primary,
            Disposition::Copy => ConstructorShape::Copy,
            _ => ConstructorShape::Other,
        }
    }
}

/// A positional parameter in its final place.
#[derive(Clone, PartialEq, Debug)]
pub struct Positional {
    pub candidate: MemberCandidate,
    /// Default value carried over from the primary constructor.
    pub default: Option<Operation>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ConstructorMatch {
    pub primary: Option<SymbolId>,
    /// Final positional order.
    pub parameters: Vec<Positional>,
    /// Every declared constructor, in declaration order.
    pub constructors: Vec<(SymbolId, Disposition)>,
}

impl ConstructorMatch {
    pub fn disposition(&self, ctor: SymbolId) -> Option<&Disposition> {
        self.constructors
            .iter()
            .find(|(c, _)| *c == ctor)
            .map(|(_, d)| d)
    }

    pub fn order(&self) -> Vec<SymbolId> {
        self.parameters.iter().map(|p| p.candidate.symbol).collect()
    }
}

/// Positional parameters straight from the candidates, with no primary constructor.
fn unordered(candidates: &[MemberCandidate]) -> Vec<Positional> {
    candidates
        .iter()
        .map(|c| Positional {
            candidate: c.clone(),
            default: None,
        })
        .collect()
}

fn member_type(model: &Model, member: SymbolId) -> Type {
    model.value_type(member).cloned().unwrap_or_else(Type::object)
}

/// Compares type lists as multisets: both sorted by name, then element-wise.
fn same_type_multiset(mut a: Vec<Type>, mut b: Vec<Type>) -> bool {
    a.sort_by(|x, y| x.sort_key().cmp(&y.sort_key()));
    b.sort_by(|x, y| x.sort_key().cmp(&y.sort_key()));
    a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| x.same_as(y))
}

fn same_type_sequence(a: &[Type], b: &[Type]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
}

/// `this.Member = value` (receiver explicit or implicit).
pub(crate) fn member_assignment(stmt: &Operation) -> Option<(SymbolId, &Operation)> {
    let (target, value) = match &stmt.kind {
        OpKind::Assignment { target, value } => (target, value),
        _ => return None,
    };
    match &target.kind {
        OpKind::MemberReference {
            member,
            instance: Some(instance),
        } if matches!(instance.kind, OpKind::InstanceReference) => Some((*member, value)),
        _ => None,
    }
}

fn parameter_reference(op: &Operation) -> Option<SymbolId> {
    match op.unwrap_implicit().kind {
        OpKind::ParameterReference(p) => Some(p),
        _ => None,
    }
}

/// Analyzes the constructors of `ty` against the classified candidates.
pub fn match_constructors(
    program: &Program,
    ty: SymbolId,
    candidates: &[MemberCandidate],
) -> ConstructorMatch {
    let model = &program.model;
    let ctors = model.constructors(ty);
    let candidate_types: Vec<_> = candidates
        .iter()
        .map(|c| member_type(model, c.symbol))
        .collect();

    let mut primary = None;
    let mut parameters = unordered(candidates);
    let mut bindings = HashMap::new();
    for &ctor in &ctors {
        if !same_type_multiset(model.parameter_types(ctor), candidate_types.clone()) {
            continue;
        }
        let body = match program.body(ctor) {
            Some(body) => body,
            None => continue,
        };
        if let Some((order, map)) = primary_order(model, ctor, body, candidates) {
            debug!("primary constructor: {}({:?})", model.name(ctor), order_names(model, &order));
            primary = Some(ctor);
            parameters = order;
            bindings = map;
            break;
        }
    }

    let positional_types: Vec<_> = parameters
        .iter()
        .map(|p| member_type(model, p.candidate.symbol))
        .collect();
    let constructors = ctors
        .iter()
        .map(|&ctor| {
            let disposition = if Some(ctor) == primary {
                Disposition::Primary
            } else {
                match program.body(ctor) {
                    Some(body) if is_copy(model, ty, ctor, body) => Disposition::Copy,
                    _ if same_type_sequence(&model.parameter_types(ctor), &positional_types) => {
                        trace!("{}: same signature as the positional parameters", model.name(ctor));
                        Disposition::Untouched
                    }
                    Some(body) => forwarding(model, primary, &bindings, &parameters, body),
                    None => Disposition::Untouched,
                }
            };
            (ctor, disposition)
        })
        .collect();

    ConstructorMatch {
        primary,
        parameters,
        constructors,
    }
}

fn order_names<'m>(model: &'m Model, order: &[Positional]) -> Vec<&'m str> {
    order
        .iter()
        .map(|p| model.name(p.candidate.symbol))
        .collect()
}

/// If `ctor` is a primary constructor, the positional parameters in its parameter order and the
/// map from its parameters to the properties they initialize.
fn primary_order(
    model: &Model,
    ctor: SymbolId,
    body: &Body,
    candidates: &[MemberCandidate],
) -> Option<(Vec<Positional>, HashMap<SymbolId, SymbolId>)> {
    let params = &model.method(ctor)?.parameters;
    let mut assigned: HashMap<SymbolId, SymbolId> = HashMap::new();
    let mut bind = |member: SymbolId, param: SymbolId| -> Option<()> {
        if !params.contains(&param) || assigned.contains_key(&param) {
            trace!("{}: parameter used twice or foreign", model.name(ctor));
            return None;
        }
        if !candidates.iter().any(|c| c.symbol == member) || assigned.values().any(|&m| m == member) {
            trace!("{}: {} is not a candidate or assigned twice", model.name(ctor), model.name(member));
            return None;
        }
        assigned.insert(param, member);
        Some(())
    };

    if let Some(init) = &body.initializer {
        if init.kind != InitializerKind::Base {
            return None;
        }
        for (target, arg) in init.bindings() {
            let member = model.parameter(target)?.promotes?;
            bind(member, parameter_reference(arg)?)?;
        }
    }
    for stmt in body.block.statements() {
        let (member, value) = member_assignment(stmt)?;
        bind(member, parameter_reference(value)?)?;
    }
    if assigned.len() != candidates.len() {
        trace!("{}: not every candidate is assigned", model.name(ctor));
        return None;
    }

    let order = params
        .iter()
        .map(|p| {
            let member = *assigned.get(p)?;
            let candidate = candidates.iter().find(|c| c.symbol == member)?;
            Some(Positional {
                candidate: candidate.clone(),
                default: model.parameter(*p).and_then(|p| p.default.clone()),
            })
        })
        .collect::<Option<Vec<_>>>()?;
    Some((order, assigned))
}

/// `C(C other) { A = other.A; ... }` copying every instance field exactly once, in order.
fn is_copy(model: &Model, ty: SymbolId, ctor: SymbolId, body: &Body) -> bool {
    let param = match model.method(ctor).map(|m| &m.parameters[..]) {
        Some([p]) => *p,
        _ => return false,
    };
    if !model.parameter(param).map_or(false, |p| p.ty.is(ty)) {
        return false;
    }
    if let Some(init) = &body.initializer {
        let forwards_original = init.kind == InitializerKind::Base
            && init.arguments.len() == 1
            && parameter_reference(&init.arguments[0]) == Some(param);
        if !forwards_original {
            return false;
        }
    }

    let fields = model.instance_fields(ty);
    let statements = body.block.statements();
    if statements.len() != fields.len() {
        trace!("{}: copies {} of {} fields", model.name(ctor), statements.len(), fields.len());
        return false;
    }
    let mut copied = Vec::new();
    for stmt in statements {
        let (lhs, value) = match member_assignment(stmt) {
            Some(x) => x,
            None => return false,
        };
        let rhs = match &value.unwrap_implicit().kind {
            OpKind::MemberReference {
                member,
                instance: Some(instance),
            } if parameter_reference(instance) == Some(param) => *member,
            _ => return false,
        };
        let (lhs, rhs) = (model.storage_of(lhs), model.storage_of(rhs));
        if lhs != rhs || copied.contains(&lhs) {
            return false;
        }
        copied.push(lhs);
    }
    fields.iter().all(|f| copied.contains(f))
}

/// Finds anything an argument of `: this(...)` must not see: locals, pattern variables and the
/// instance under construction.
struct Hoistable {
    safe: bool,
}

impl Default for Hoistable {
    fn default() -> Self {
        Hoistable { safe: true }
    }
}

impl Visitor<'_> for Hoistable {
    type Output = bool;

    fn finish(self) -> bool {
        self.safe
    }

    fn open_op(&mut self, op: &Operation) -> Result<(), ()> {
        match op.kind {
            OpKind::LocalReference(_) | OpKind::InstanceReference => {
                self.safe = false;
                Err(())
            }
            _ => Ok(()),
        }
    }

    fn open_pattern(&mut self, p: &Pattern) {
        if !p.declared_locals().is_empty() {
            self.safe = false;
        }
    }
}

fn is_hoistable(value: &Operation) -> bool {
    Hoistable::apply(value)
}

fn forwarding(
    model: &Model,
    primary: Option<SymbolId>,
    primary_bindings: &HashMap<SymbolId, SymbolId>,
    parameters: &[Positional],
    body: &Body,
) -> Disposition {
    let ctor = model.name(body.owner);
    let position = |member: SymbolId| parameters.iter().position(|p| p.candidate.symbol == member);
    let mut arguments: Vec<Option<Argument>> = vec![None; parameters.len()];
    let mut folded = vec![false; parameters.len()];

    if let Some(init) = &body.initializer {
        if init.kind == InitializerKind::This && (primary.is_none() || init.target != primary) {
            trace!("{}: already chains to another constructor", ctor);
            return Disposition::Untouched;
        }
        for (target, arg) in init.bindings() {
            let member = model
                .parameter(target)
                .and_then(|p| p.promotes)
                .or_else(|| primary_bindings.get(&target).copied());
            let pos = match member.and_then(position) {
                Some(pos) => pos,
                None => {
                    trace!("{}: initializer argument binds to no positional parameter", ctor);
                    return Disposition::Kept;
                }
            };
            if folded[pos] {
                trace!("{}: initializer binds a parameter twice", ctor);
                return Disposition::Kept;
            }
            arguments[pos] = Some(Argument::Value(arg.clone()));
            folded[pos] = true;
        }
    }

    let mut seen = vec![false; parameters.len()];
    let mut removed_statements = Vec::new();
    for stmt in body.block.statements() {
        let (member, value) = match member_assignment(stmt) {
            Some(x) => x,
            None => continue,
        };
        let pos = match position(member) {
            Some(pos) => pos,
            None => continue,
        };
        if folded[pos] {
            trace!("{}: {} set by both initializer and body", ctor, model.name(member));
            return Disposition::Kept;
        }
        if seen[pos] {
            continue;
        }
        seen[pos] = true;
        if is_hoistable(value) {
            arguments[pos] = Some(Argument::Value(value.clone()));
            removed_statements.push(stmt.id);
        } else {
            trace!("{}: value of {} cannot be hoisted", ctor, model.name(member));
        }
    }

    let arguments = arguments
        .into_iter()
        .zip(parameters)
        .map(|(arg, p)| {
            arg.unwrap_or_else(|| {
                if member_type(model, p.candidate.symbol).nullable {
                    Argument::Null
                } else {
                    Argument::Default
                }
            })
        })
        .collect();
    Disposition::Forwarding {
        arguments,
        removed_statements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Constant, IdGen};
    use crate::rewrite::{Document, Language};
    use crate::symbols::{
        AccessorKind, LocalSymbol, MethodKind, MethodSymbol, ParameterSymbol, PropertySymbol,
        TypeKind, TypeSymbol,
    };

    /// A class `C` with `int P { get; init; }` and `bool B { get; init; }`.
    struct Fixture {
        program: Program,
        ids: IdGen,
        ty: SymbolId,
        p: SymbolId,
        b: SymbolId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut program = Program::new();
            let model = &mut program.model;
            let ty = model.add_type(TypeSymbol::new("C", TypeKind::Class));
            let mut init = PropertySymbol::new("P", Type::int());
            init.setter = Some(crate::symbols::Accessor::auto(AccessorKind::Init));
            let p = model.add_property(ty, init.clone());
            let b = model.add_property(
                ty,
                PropertySymbol {
                    name: "B".into(),
                    ty: Type::bool(),
                    ..init
                },
            );
            program.documents.push(Document::new("C.cs", Language::CSharp));
            Fixture {
                program,
                ids: IdGen::new(),
                ty,
                p,
                b,
            }
        }

        fn ctor(&mut self, params: &[(&str, Type)]) -> (SymbolId, Vec<SymbolId>) {
            let model = &mut self.program.model;
            let m = model.add_method(
                self.ty,
                MethodSymbol::new(".ctor", MethodKind::Constructor, Type::void()),
            );
            let ps = params
                .iter()
                .map(|(n, t)| model.add_parameter(m, ParameterSymbol::new(*n, t.clone())))
                .collect();
            (m, ps)
        }

        fn op(&mut self, kind: OpKind, ty: Type) -> Operation {
            Operation::new(self.ids.next(), kind, ty)
        }

        fn param(&mut self, p: SymbolId) -> Operation {
            let ty = self.program.model.value_type(p).cloned().unwrap();
            self.op(OpKind::ParameterReference(p), ty)
        }

        fn assign(&mut self, member: SymbolId, value: Operation) -> Operation {
            let ty = self.program.model.value_type(member).cloned().unwrap();
            let this = self.op(OpKind::InstanceReference, Type::named("C", Some(self.ty), false));
            let target = self.op(
                OpKind::MemberReference {
                    member,
                    instance: Some(Box::new(this.into_implicit())),
                },
                ty.clone(),
            );
            self.op(
                OpKind::Assignment {
                    target: Box::new(target),
                    value: Box::new(value),
                },
                ty,
            )
        }

        fn body(&mut self, owner: SymbolId, statements: Vec<Operation>) {
            let block = self.op(OpKind::Block(statements), Type::void());
            self.program.documents[0].bodies.push(Body {
                owner,
                initializer: None,
                block,
                span: Default::default(),
            });
        }

        fn candidates(&self) -> Vec<MemberCandidate> {
            crate::classify::candidates(&self.program.model, self.ty)
        }
    }

    #[test]
    fn hoisting_rejects_locals_and_the_instance() {
        let mut f = Fixture::new();
        let (ctor, ps) = f.ctor(&[("p", Type::int())]);
        let one = Operation::literal(f.ids.next(), Constant::Int(1), Type::int());
        let param = f.param(ps[0]);
        let sum = f.op(
            OpKind::Binary {
                op: BinaryOp::Add,
                left: Box::new(param),
                right: Box::new(one),
            },
            Type::int(),
        );
        assert!(is_hoistable(&sum));

        let local = f.program.model.add_local(LocalSymbol {
            name: "t".into(),
            ty: Type::int(),
            owner: Some(ctor),
        });
        let local = f.op(OpKind::LocalReference(local), Type::int());
        assert!(!is_hoistable(&local));
        let this = f.op(OpKind::InstanceReference, Type::named("C", Some(f.ty), false));
        assert!(!is_hoistable(&this));
    }

    #[test]
    fn parameter_order_wins_over_declaration_order() {
        let mut f = Fixture::new();
        let (ctor, ps) = f.ctor(&[("b", Type::bool()), ("p", Type::int())]);
        let (p, b) = (f.p, f.b);
        let vp = f.param(ps[1]);
        let vb = f.param(ps[0]);
        let s1 = f.assign(p, vp);
        let s2 = f.assign(b, vb);
        f.body(ctor, vec![s1, s2]);

        let m = match_constructors(&f.program, f.ty, &f.candidates());
        assert_eq!(m.primary, Some(ctor));
        assert_eq!(m.order(), vec![b, p]);
        assert_eq!(m.disposition(ctor), Some(&Disposition::Primary));
    }

    #[test]
    fn a_parameter_used_twice_is_not_primary() {
        let mut f = Fixture::new();
        let (ctor, ps) = f.ctor(&[("p", Type::int()), ("b", Type::bool())]);
        let (p, b) = (f.p, f.b);
        let vp = f.param(ps[0]);
        let vp2 = f.param(ps[0]);
        let s1 = f.assign(p, vp);
        let s2 = f.assign(b, vp2);
        f.body(ctor, vec![s1, s2]);

        let m = match_constructors(&f.program, f.ty, &f.candidates());
        assert_eq!(m.primary, None);
        assert_eq!(m.disposition(ctor), Some(&Disposition::Untouched));
    }

    #[test]
    fn unsafe_values_stay_in_the_body() {
        let mut f = Fixture::new();
        let (primary, ps) = f.ctor(&[("b", Type::bool()), ("p", Type::int())]);
        let (p, b) = (f.p, f.b);
        let vp = f.param(ps[1]);
        let vb = f.param(ps[0]);
        let s1 = f.assign(p, vp);
        let s2 = f.assign(b, vb);
        f.body(primary, vec![s1, s2]);

        // C(bool b1, bool b2) { P = 1; var b = !b2; B = b; }
        let (other, qs) = f.ctor(&[("b1", Type::bool()), ("b2", Type::bool())]);
        let one = Operation::literal(f.ids.next(), Constant::Int(1), Type::int());
        let hoisted = f.assign(p, one.clone());
        let local = f.program.model.add_local(LocalSymbol {
            name: "b".into(),
            ty: Type::bool(),
            owner: Some(other),
        });
        let b2 = f.param(qs[1]);
        let not = f.op(
            OpKind::Unary {
                op: crate::ir::UnaryOp::Not,
                operand: Box::new(b2),
            },
            Type::bool(),
        );
        let decl = f.op(
            OpKind::VariableDeclaration {
                local,
                initializer: Some(Box::new(not)),
            },
            Type::void(),
        );
        let read = f.op(OpKind::LocalReference(local), Type::bool());
        let kept = f.assign(b, read);
        let hoisted_id = hoisted.id;
        f.body(other, vec![hoisted, decl, kept]);

        let m = match_constructors(&f.program, f.ty, &f.candidates());
        match m.disposition(other) {
            Some(Disposition::Forwarding {
                arguments,
                removed_statements,
            }) => {
                assert_eq!(arguments[0], Argument::Default);
                assert_eq!(arguments[1], Argument::Value(one));
                assert_eq!(removed_statements, &vec![hoisted_id]);
            }
            other => panic!("unexpected disposition {:?}", other),
        }
    }

    #[test]
    fn copy_constructor_must_cover_every_field() {
        let mut f = Fixture::new();
        let ty = Type::named("C", Some(f.ty), false);
        let (copy, ps) = f.ctor(&[("other", ty.clone())]);
        let (p, b) = (f.p, f.b);
        let mut copies = Vec::new();
        for member in [p, b] {
            let src = f.param(ps[0]);
            let mty = f.program.model.value_type(member).cloned().unwrap();
            let read = f.op(
                OpKind::MemberReference {
                    member,
                    instance: Some(Box::new(src)),
                },
                mty,
            );
            copies.push(f.assign(member, read));
        }
        let partial = vec![copies[0].clone()];
        f.body(copy, copies);
        let m = match_constructors(&f.program, f.ty, &f.candidates());
        assert_eq!(m.disposition(copy), Some(&Disposition::Copy));

        let mut g = Fixture::new();
        let (copy, _) = g.ctor(&[("other", ty)]);
        g.body(copy, partial);
        let m = match_constructors(&g.program, g.ty, &g.candidates());
        assert_eq!(m.disposition(copy).map(Disposition::shape), Some(ConstructorShape::Other));
    }

    #[test]
    fn conditions_are_hoisted_whole() {
        let mut f = Fixture::new();
        let (ctor, ps) = f.ctor(&[("x", Type::int())]);
        let b = f.b;
        let x = f.param(ps[0]);
        let zero = Operation::literal(f.ids.next(), Constant::Int(0), Type::int());
        let cmp = f.op(
            OpKind::Binary {
                op: BinaryOp::Equals,
                left: Box::new(x),
                right: Box::new(zero),
            },
            Type::bool(),
        );
        let s = f.assign(b, cmp.clone());
        let hoisted = s.id;
        f.body(ctor, vec![s]);
        let m = match_constructors(&f.program, f.ty, &f.candidates());
        assert_eq!(
            m.disposition(ctor),
            Some(&Disposition::Forwarding {
                arguments: vec![Argument::Default, Argument::Value(cmp)],
                removed_statements: vec![hoisted],
            })
        );
    }
}
