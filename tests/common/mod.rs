#![allow(dead_code)]

use recordize::ast::parse_program;
use recordize::ir::{Body, OpKind, Operation};
use recordize::{Program, SymbolId};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn program(src: &str) -> Program {
    init();
    match parse_program(src) {
        Ok(program) => program,
        Err(e) => panic!("{}", e.annotate(src)),
    }
}

pub fn ty(program: &Program, name: &str) -> SymbolId {
    program.model.lookup_type(name).unwrap()
}

pub fn member(program: &Program, ty: SymbolId, name: &str) -> SymbolId {
    program.model.find_member(ty, name).unwrap()
}

pub fn method(program: &Program, ty: SymbolId, name: &str, arity: usize) -> SymbolId {
    program.model.find_method(ty, name, arity).unwrap()
}

pub fn body<'p>(program: &'p Program, owner: SymbolId) -> &'p Body {
    program.body(owner).unwrap()
}

/// The value of a body's single `return`.
pub fn returned(body: &Body) -> &Operation {
    match &body.block.statements()[..] {
        [ret] => match &ret.kind {
            OpKind::Return(Some(v)) => v,
            other => panic!("not a return: {:?}", other),
        },
        other => panic!("{} statements", other.len()),
    }
}
