use super::{OpKind, Operation, Pattern};

/// Walks an operation tree in source order.
///
/// `open_op` may return `Err(())` to skip the node's children; `close_op` is then not called.
pub trait Visitor<'op> {
    type Output;

    fn finish(self) -> Self::Output;

    fn open_op(&mut self, _: &'op Operation) -> Result<(), ()> {
        Ok(())
    }
    fn close_op(&mut self, _: &'op Operation) {}

    fn open_pattern(&mut self, _: &'op Pattern) {}
    fn close_pattern(&mut self, _: &'op Pattern) {}

    fn visit<V: Visitable<'op> + ?Sized>(mut self, v: &'op V) -> Self::Output
    where
        Self: Sized,
    {
        v.apply(&mut self);
        self.finish()
    }

    fn apply<V: Visitable<'op> + ?Sized>(v: &'op V) -> Self::Output
    where
        Self: Sized + Default,
    {
        let mut viz = <Self as Default>::default();
        v.apply(&mut viz);
        viz.finish()
    }
}

pub trait Visitable<'a> {
    fn apply<V: Visitor<'a>>(&'a self, v: &mut V);
}

impl<'a> Visitable<'a> for Operation {
    fn apply<V: Visitor<'a>>(&'a self, v: &mut V) {
        walk_op(self, v);
    }
}

impl<'a> Visitable<'a> for [Operation] {
    fn apply<V: Visitor<'a>>(&'a self, v: &mut V) {
        for op in self {
            walk_op(op, v);
        }
    }
}

impl<'a> Visitable<'a> for Pattern {
    fn apply<V: Visitor<'a>>(&'a self, v: &mut V) {
        walk_pattern(self, v);
    }
}

fn walk_op<'a, V: Visitor<'a>>(op: &'a Operation, v: &mut V) {
    if let Err(()) = v.open_op(op) {
        return;
    }
    match &op.kind {
        OpKind::IsPattern { value, pattern } => {
            walk_op(value, v);
            walk_pattern(pattern, v);
        }
        OpKind::Switch { value, arms } => {
            walk_op(value, v);
            for arm in arms {
                walk_pattern(&arm.pattern, v);
                walk_op(&arm.value, v);
            }
        }
        _ => {
            for child in op.children() {
                walk_op(child, v);
            }
        }
    }
    v.close_op(op);
}

fn walk_pattern<'a, V: Visitor<'a>>(p: &'a Pattern, v: &mut V) {
    v.open_pattern(p);
    match p {
        Pattern::Not(inner) => walk_pattern(inner, v),
        Pattern::Constant(op) => walk_op(op, v),
        Pattern::Type { .. } | Pattern::Null | Pattern::Discard => (),
    }
    v.close_pattern(p);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Constant, IdGen, OpKind};
    use crate::symbols::Type;

    #[derive(Default)]
    struct Counter {
        ops: usize,
        patterns: usize,
    }

    impl Visitor<'_> for Counter {
        type Output = (usize, usize);
        fn finish(self) -> Self::Output {
            (self.ops, self.patterns)
        }
        fn open_op(&mut self, op: &Operation) -> Result<(), ()> {
            self.ops += 1;
            match op.kind {
                OpKind::Return(_) => Err(()),
                _ => Ok(()),
            }
        }
        fn open_pattern(&mut self, _: &Pattern) {
            self.patterns += 1;
        }
    }

    #[test]
    fn patterns_are_visited_and_subtrees_can_be_skipped() {
        let mut ids = IdGen::new();
        let value = Operation::literal(ids.next(), Constant::Int(1), Type::int());
        let one = Operation::literal(ids.next(), Constant::Int(1), Type::int());
        let test = Operation::new(
            ids.next(),
            OpKind::IsPattern {
                value: Box::new(value),
                pattern: Pattern::Not(Box::new(Pattern::Constant(Box::new(one)))),
            },
            Type::bool(),
        );
        let hidden = Operation::literal(ids.next(), Constant::Bool(true), Type::bool());
        let ret = Operation::new(ids.next(), OpKind::Return(Some(Box::new(hidden))), Type::void());
        let body = Operation::new(ids.next(), OpKind::Block(vec![test, ret]), Type::void());
        assert_eq!(Counter::apply(&body), (5, 2));
    }
}
