//! Shapes of `GetHashCode` bodies.

use log::trace;

use crate::ir::{BinaryOp, Body, OpKind, Operation, UnaryOp};
use crate::symbols::{Model, SymbolId};

/// Extracts the members a `GetHashCode` body hashes.
pub trait HashCodeAnalyzer {
    /// `None` if the body is not a recognized pure combination of member hashes.
    fn hashed_members(&self, model: &Model, ty: SymbolId, body: &Body) -> Option<Vec<SymbolId>>;
}

/// Recognizes the shapes hand-written and IDE-generated hash codes take:
///
/// ```text
/// return HashCode.Combine(A, B);
///
/// var hash = 339610899;
/// hash = hash * -1521134295 + A.GetHashCode();
/// hash = hash * -1521134295 + EqualityComparer<bool>.Default.GetHashCode(B);
/// return hash;
///
/// return A.GetHashCode() ^ B.GetHashCode();
/// ```
#[derive(Copy, Clone, Default, Debug)]
pub struct DefaultHashCodeAnalyzer;

impl HashCodeAnalyzer for DefaultHashCodeAnalyzer {
    fn hashed_members(&self, _: &Model, _: SymbolId, body: &Body) -> Option<Vec<SymbolId>> {
        let stmts = body.block.statements();
        let found = match stmts[..] {
            [ret] => returned(ret).and_then(|v| combine(v).or_else(|| xor_chain(v))),
            _ => accumulator(&stmts),
        };
        if found.is_none() {
            trace!("unrecognized GetHashCode body");
        }
        found
    }
}

fn returned(stmt: &Operation) -> Option<&Operation> {
    match &stmt.kind {
        OpKind::Return(Some(v)) => Some(v.unwrap_implicit()),
        _ => None,
    }
}

/// `this.M` with an explicit or implicit receiver.
fn own_member(op: &Operation) -> Option<SymbolId> {
    match &op.unwrap_implicit().kind {
        OpKind::MemberReference {
            member,
            instance: Some(instance),
        } if matches!(instance.kind, OpKind::InstanceReference) => Some(*member),
        _ => None,
    }
}

/// `M`, `M.GetHashCode()` or `EqualityComparer<T>.Default.GetHashCode(M)`.
fn hashed(op: &Operation) -> Option<SymbolId> {
    let op = op.unwrap_implicit();
    if let Some(m) = own_member(op) {
        return Some(m);
    }
    match &op.kind {
        OpKind::Invocation {
            method,
            instance: Some(instance),
            arguments,
        } if method.name == "GetHashCode" => match &arguments[..] {
            [] => own_member(instance),
            [arg] => match &instance.kind {
                OpKind::ExternalReference(path) if path.starts_with("EqualityComparer<") => {
                    own_member(arg)
                }
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

fn combine(op: &Operation) -> Option<Vec<SymbolId>> {
    match &op.kind {
        OpKind::Invocation {
            method,
            instance: None,
            arguments,
        } if method.name == "Combine" && method.qualifier.as_deref() == Some("HashCode") => {
            arguments.iter().map(own_member).collect()
        }
        _ => None,
    }
}

fn xor_chain(op: &Operation) -> Option<Vec<SymbolId>> {
    match &op.unwrap_implicit().kind {
        OpKind::Binary {
            op: BinaryOp::ExclusiveOr,
            left,
            right,
        } => {
            let mut members = xor_chain(left)?;
            members.extend(xor_chain(right)?);
            Some(members)
        }
        _ => hashed(op).map(|m| vec![m]),
    }
}

fn is_constant(op: &Operation) -> bool {
    match &op.unwrap_implicit().kind {
        OpKind::Literal => true,
        OpKind::Unary {
            op: UnaryOp::Negate,
            operand,
        } => matches!(operand.unwrap_implicit().kind, OpKind::Literal),
        _ => false,
    }
}

fn is_local(op: &Operation, local: SymbolId) -> bool {
    matches!(op.unwrap_implicit().kind, OpKind::LocalReference(l) if l == local)
}

/// `var h = K; (h = h * M + hash(X);)* return h;`
fn accumulator(stmts: &[&Operation]) -> Option<Vec<SymbolId>> {
    let (first, rest) = stmts.split_first()?;
    let (last, steps) = rest.split_last()?;
    let local = match &first.kind {
        OpKind::VariableDeclaration {
            local,
            initializer: Some(init),
        } if is_constant(init) => *local,
        _ => return None,
    };
    if !returned(last).map_or(false, |v| is_local(v, local)) {
        return None;
    }
    steps
        .iter()
        .map(|step| {
            let (target, value) = match &step.kind {
                OpKind::Assignment { target, value } => (target, value.unwrap_implicit()),
                _ => return None,
            };
            if !is_local(target, local) {
                return None;
            }
            let (product, term) = match &value.kind {
                OpKind::Binary {
                    op: BinaryOp::Add,
                    left,
                    right,
                } => (left.unwrap_implicit(), right),
                _ => return None,
            };
            match &product.kind {
                OpKind::Binary {
                    op: BinaryOp::Multiply,
                    left,
                    right,
                } if is_local(left, local) && is_constant(right) => hashed(term),
                _ => None,
            }
        })
        .collect()
}
