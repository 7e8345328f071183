//! Lowering method bodies to operation trees.

use log::trace;
use proc_macro2::Span as TokenSpan;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::Token;

use super::{named_type, path_text, resolve_type, span_of, unresolved, unsupported};
use crate::ir::names::Discrim;
use crate::ir::{
    BinaryOp, Constant, ConstructorInitializer, ConversionKind, IdGen, InitializerKind,
    MethodRef, OpKind, Operation, Pattern, SwitchArm, UnaryOp,
};
use crate::symbols::{LocalSymbol, MethodKind, Model, Symbol, SymbolId, Type};
use crate::Result;

/// Name resolution and id allocation for one method of one type.
pub(super) struct Lowering<'a> {
    model: &'a mut Model,
    ids: &'a mut IdGen,
    ty: SymbolId,
    owner: SymbolId,
    /// Locals by name, innermost block last.
    scopes: Vec<Vec<(String, SymbolId)>>,
}

impl<'a> Lowering<'a> {
    pub fn new(model: &'a mut Model, ids: &'a mut IdGen, ty: SymbolId, owner: SymbolId) -> Self {
        Lowering {
            model,
            ids,
            ty,
            owner,
            scopes: vec![Vec::new()],
        }
    }

    fn op(&mut self, kind: OpKind, ty: Type, span: TokenSpan) -> Operation {
        Operation::new(self.ids.next(), kind, ty).with_span(span_of(span))
    }

    fn constant(&mut self, value: Constant, ty: Type, span: TokenSpan) -> Operation {
        Operation::literal(self.ids.next(), value, ty).with_span(span_of(span))
    }

    fn this(&mut self, implicit: bool, span: TokenSpan) -> Operation {
        let ty = self.model.type_of_symbol(self.ty);
        let op = self.op(OpKind::InstanceReference, ty, span);
        if implicit {
            op.into_implicit()
        } else {
            op
        }
    }

    fn returns_value(&self) -> bool {
        self.model.method(self.owner).map_or(false, |m| {
            m.kind != MethodKind::Constructor && !m.return_type.same_as(&Type::void())
        })
    }

    pub fn set_default(&mut self, param: SymbolId, value: Operation) {
        if let Some(p) = self.model.parameter_mut(param) {
            p.default = Some(value);
        }
    }

    /// A method body; the trailing expression of a value-returning method is returned.
    pub fn body(&mut self, block: &syn::Block) -> Result<Operation> {
        let returns = self.returns_value();
        self.block(block, returns)
    }

    fn block(&mut self, block: &syn::Block, tail_returns: bool) -> Result<Operation> {
        self.scopes.push(Vec::new());
        let last = block.stmts.len().checked_sub(1);
        let mut stmts = Vec::with_capacity(block.stmts.len());
        for (i, stmt) in block.stmts.iter().enumerate() {
            stmts.push(self.stmt(stmt, tail_returns && Some(i) == last)?);
        }
        self.scopes.pop();
        Ok(self.op(OpKind::Block(stmts), Type::void(), block.span()))
    }

    fn stmt(&mut self, stmt: &syn::Stmt, tail: bool) -> Result<Operation> {
        match stmt {
            syn::Stmt::Local(local) => self.local(local),
            syn::Stmt::Expr(e, semi) => self.statement(e, tail && semi.is_none()),
            syn::Stmt::Macro(m) => self.macro_op(&m.mac),
            other => Err(unsupported(other.discrim(), other.span())),
        }
    }

    fn statement(&mut self, e: &syn::Expr, tail: bool) -> Result<Operation> {
        match e {
            syn::Expr::If(x) => self.if_statement(x, tail),
            syn::Expr::Block(x) => self.block(&x.block, tail),
            syn::Expr::Return(x) => {
                let value = match &x.expr {
                    Some(v) => Some(Box::new(self.expr(v)?)),
                    None => None,
                };
                Ok(self.op(OpKind::Return(value), Type::void(), x.span()))
            }
            syn::Expr::Macro(m) => self.macro_op(&m.mac),
            _ if tail => {
                let value = self.expr(e)?;
                Ok(self.op(OpKind::Return(Some(Box::new(value))), Type::void(), e.span()))
            }
            _ => self.expr(e),
        }
    }

    fn if_statement(&mut self, x: &syn::ExprIf, tail: bool) -> Result<Operation> {
        // pattern variables of the condition stay in scope after the `if`
        let condition = self.expr(&x.cond)?;
        let when_true = self.block(&x.then_branch, tail)?;
        let when_false = match &x.else_branch {
            Some((_, e)) => Some(Box::new(self.statement(e, tail)?)),
            None => None,
        };
        Ok(self.op(
            OpKind::Conditional {
                condition: Box::new(condition),
                when_true: Box::new(when_true),
                when_false,
                is_expression: false,
            },
            Type::void(),
            x.span(),
        ))
    }

    fn declare(&mut self, name: String, ty: Type) -> SymbolId {
        let id = self.model.add_local(LocalSymbol {
            name: name.clone(),
            ty,
            owner: Some(self.owner),
        });
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((name, id));
        }
        id
    }

    fn local(&mut self, local: &syn::Local) -> Result<Operation> {
        let (name, annotated) = match &local.pat {
            syn::Pat::Ident(p) => (p.ident.to_string(), None),
            syn::Pat::Type(pt) => match &*pt.pat {
                syn::Pat::Ident(p) => (p.ident.to_string(), Some(resolve_type(self.model, &pt.ty)?)),
                other => return Err(unsupported(other.discrim(), other.span())),
            },
            other => return Err(unsupported(other.discrim(), other.span())),
        };
        let initializer = match &local.init {
            Some(init) if init.diverge.is_some() => {
                return Err(unsupported("let-else", local.span()))
            }
            Some(init) => Some(self.expr(&init.expr)?),
            None => None,
        };
        let ty = match (annotated, &initializer) {
            (Some(ty), _) => ty,
            (None, Some(init)) => init.ty.clone(),
            (None, None) => return Err(unsupported("declaration without type", local.span())),
        };
        let id = self.declare(name, ty);
        Ok(self.op(
            OpKind::VariableDeclaration {
                local: id,
                initializer: initializer.map(Box::new),
            },
            Type::void(),
            local.span(),
        ))
    }

    pub fn expr(&mut self, e: &syn::Expr) -> Result<Operation> {
        let span = e.span();
        match e {
            syn::Expr::Lit(x) => self.literal(&x.lit),
            syn::Expr::Path(x) => self.path(x),
            syn::Expr::Paren(x) => self.expr(&x.expr),
            syn::Expr::Group(x) => self.expr(&x.expr),
            syn::Expr::Unary(x) => {
                let op = match x.op {
                    syn::UnOp::Not(_) => UnaryOp::Not,
                    syn::UnOp::Neg(_) => UnaryOp::Negate,
                    _ => return Err(unsupported("unary operator", span)),
                };
                let operand = self.expr(&x.expr)?;
                let ty = match op {
                    UnaryOp::Not => Type::bool(),
                    UnaryOp::Negate => operand.ty.clone(),
                };
                Ok(self.op(
                    OpKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    ty,
                    span,
                ))
            }
            syn::Expr::Binary(x) => self.binary(x),
            syn::Expr::Assign(x) => {
                let target = self.expr(&x.left)?;
                let value = self.expr(&x.right)?;
                let ty = target.ty.clone();
                Ok(self.op(
                    OpKind::Assignment {
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                    ty,
                    span,
                ))
            }
            syn::Expr::Cast(x) => {
                let operand = self.expr(&x.expr)?;
                let ty = resolve_type(self.model, &x.ty)?;
                let kind = if ty.nullable {
                    ConversionKind::TryCast
                } else {
                    ConversionKind::Explicit
                };
                Ok(self.op(
                    OpKind::Conversion {
                        kind,
                        operand: Box::new(operand),
                    },
                    ty,
                    span,
                ))
            }
            syn::Expr::Let(x) => {
                let value = self.expr(&x.expr)?;
                let pattern = self.pattern(&x.pat)?;
                Ok(self.op(
                    OpKind::IsPattern {
                        value: Box::new(value),
                        pattern,
                    },
                    Type::bool(),
                    span,
                ))
            }
            syn::Expr::Field(x) => self.field(x),
            syn::Expr::MethodCall(x) => self.method_call(x),
            syn::Expr::Call(x) => self.call(x),
            syn::Expr::Struct(x) => self.creation(x),
            syn::Expr::If(x) => self.conditional(x),
            syn::Expr::Match(x) => self.switch(x),
            syn::Expr::Macro(x) => self.macro_op(&x.mac),
            syn::Expr::Block(_) | syn::Expr::Return(_) => self.statement(e, false),
            other => Err(unsupported(other.discrim(), span)),
        }
    }

    fn literal(&mut self, lit: &syn::Lit) -> Result<Operation> {
        let (value, ty) = match lit {
            syn::Lit::Int(n) => (Constant::Int(n.base10_parse::<i64>()?), Type::int()),
            syn::Lit::Bool(b) => (Constant::Bool(b.value), Type::bool()),
            syn::Lit::Str(s) => (Constant::Str(s.value()), Type::string()),
            other => return Err(unsupported("literal", other.span())),
        };
        Ok(self.constant(value, ty, lit.span()))
    }

    fn lookup_local(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|s| s.iter().rev())
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    fn lookup_parameter(&self, name: &str) -> Option<SymbolId> {
        let m = self.model.method(self.owner)?;
        m.parameters
            .iter()
            .copied()
            .find(|&p| self.model.name(p) == name)
    }

    fn is_static(&self, member: SymbolId) -> bool {
        match self.model.symbol(member) {
            Symbol::Field(f) => !f.is_instance(),
            Symbol::Property(p) => p.is_static,
            Symbol::Method(m) => m.is_static,
            _ => false,
        }
    }

    /// `instance.member`; an instance member named without a receiver gets an implicit `this`.
    fn member(&mut self, member: SymbolId, instance: Option<Operation>, span: TokenSpan) -> Operation {
        let ty = self
            .model
            .value_type(member)
            .cloned()
            .unwrap_or_else(Type::object);
        let instance = match instance {
            Some(i) => Some(i),
            None if !self.is_static(member) => Some(self.this(true, span)),
            None => None,
        };
        self.op(
            OpKind::MemberReference {
                member,
                instance: instance.map(Box::new),
            },
            ty,
            span,
        )
    }

    fn name(&mut self, name: &str, span: TokenSpan) -> Result<Operation> {
        match name {
            "self" => return Ok(self.this(false, span)),
            "None" => return Ok(self.constant(Constant::Null, Type::null(), span)),
            _ => (),
        }
        if let Some(local) = self.lookup_local(name) {
            let ty = self.model.value_type(local).cloned().unwrap_or_else(Type::object);
            return Ok(self.op(OpKind::LocalReference(local), ty, span));
        }
        if let Some(param) = self.lookup_parameter(name) {
            let ty = self.model.value_type(param).cloned().unwrap_or_else(Type::object);
            return Ok(self.op(OpKind::ParameterReference(param), ty, span));
        }
        match self.model.find_member(self.ty, name) {
            Some(member) => Ok(self.member(member, None, span)),
            None => Err(unresolved(name, span)),
        }
    }

    fn path(&mut self, x: &syn::ExprPath) -> Result<Operation> {
        let span = x.span();
        if x.qself.is_some() {
            return Err(unsupported("qualified path", span));
        }
        let segments: Vec<_> = x.path.segments.iter().collect();
        match segments[..] {
            [seg] if seg.arguments.is_empty() => return self.name(&seg.ident.to_string(), span),
            [ty, member] if ty.arguments.is_empty() => {
                if let Some(t) = self.model.lookup_type(&ty.ident.to_string()) {
                    let name = member.ident.to_string();
                    let found = self
                        .model
                        .find_member(t, &name)
                        .ok_or_else(|| unresolved(format!("{}::{}", ty.ident, name), span))?;
                    return Ok(self.member(found, None, span));
                }
            }
            _ => (),
        }
        let path = path_text(self.model, &x.path)?;
        Ok(self.op(OpKind::ExternalReference(path), Type::object(), span))
    }

    fn field(&mut self, x: &syn::ExprField) -> Result<Operation> {
        let span = x.span();
        let name = match &x.member {
            syn::Member::Named(id) => id.to_string(),
            syn::Member::Unnamed(_) => return Err(unsupported("tuple field", span)),
        };
        let base = self.expr(&x.base)?;
        let found = base.ty.symbol.and_then(|t| self.model.find_member(t, &name));
        if let Some(member) = found {
            return Ok(self.member(member, Some(base), span));
        }
        match base.kind {
            OpKind::ExternalReference(path) => {
                let path = format!("{}.{}", path, name);
                Ok(self.op(OpKind::ExternalReference(path), Type::object(), span))
            }
            _ => Err(unresolved(name, span)),
        }
    }

    fn arguments(&mut self, args: &Punctuated<syn::Expr, Token![,]>) -> Result<Vec<Operation>> {
        args.iter().map(|a| self.expr(a)).collect()
    }

    fn return_type(&self, symbol: Option<SymbolId>, name: &str) -> Type {
        match symbol.and_then(|m| self.model.method(m)) {
            Some(m) => m.return_type.clone(),
            None => match name {
                "Equals" => Type::bool(),
                "GetHashCode" | "Combine" => Type::int(),
                "ToString" => Type::string(),
                _ => Type::object(),
            },
        }
    }

    fn invocation(
        &mut self,
        method: MethodRef,
        instance: Option<Operation>,
        arguments: Vec<Operation>,
        span: TokenSpan,
    ) -> Operation {
        let ty = self.return_type(method.symbol, &method.name);
        self.op(
            OpKind::Invocation {
                method,
                instance: instance.map(Box::new),
                arguments,
            },
            ty,
            span,
        )
    }

    fn method_call(&mut self, x: &syn::ExprMethodCall) -> Result<Operation> {
        let receiver = self.expr(&x.receiver)?;
        let arguments = self.arguments(&x.args)?;
        let name = x.method.to_string();
        let symbol = receiver
            .ty
            .symbol
            .and_then(|t| self.resolve_method(t, &name, &arguments));
        let method = MethodRef {
            symbol,
            ..MethodRef::named(name)
        };
        Ok(self.invocation(method, Some(receiver), arguments, x.span()))
    }

    fn call(&mut self, x: &syn::ExprCall) -> Result<Operation> {
        let span = x.span();
        let path = match &*x.func {
            syn::Expr::Path(p) if p.qself.is_none() => &p.path,
            other => return Err(unsupported("call target", other.span())),
        };
        let arguments = self.arguments(&x.args)?;
        let segments: Vec<_> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        match &segments[..] {
            [name] => self.local_call(name, arguments, span),
            [ty, name] if ty == "Default" && name == "default" && arguments.is_empty() => {
                Ok(self.constant(Constant::Default, Type::object(), span))
            }
            [ty, name] if self.model.lookup_type(ty).is_some() => {
                let t = self
                    .model
                    .lookup_type(ty)
                    .ok_or_else(|| unresolved(ty.as_str(), span))?;
                if name == "new" {
                    return self.construct(t, arguments, None, span);
                }
                let symbol = self
                    .resolve_method(t, name, &arguments)
                    .ok_or_else(|| unresolved(format!("{}::{}", ty, name), span))?;
                let method = MethodRef {
                    symbol: Some(symbol),
                    qualifier: Some(ty.clone()),
                    ..MethodRef::named(name.as_str())
                };
                Ok(self.invocation(method, None, arguments, span))
            }
            _ => {
                let text = path_text(self.model, path)?;
                let (qualifier, name) = text
                    .rsplit_once('.')
                    .ok_or_else(|| unresolved(text.as_str(), span))?;
                let method = MethodRef {
                    qualifier: Some(qualifier.to_owned()),
                    ..MethodRef::named(name)
                };
                Ok(self.invocation(method, None, arguments, span))
            }
        }
    }

    /// `M(args)` on the declaring type, or the static `object.Equals(a, b)`.
    fn local_call(&mut self, name: &str, arguments: Vec<Operation>, span: TokenSpan) -> Result<Operation> {
        match self.resolve_method(self.ty, name, &arguments) {
            Some(symbol) => {
                let instance = match self.model.method(symbol) {
                    Some(m) if !m.is_static => Some(self.this(true, span)),
                    _ => None,
                };
                let method = MethodRef {
                    symbol: Some(symbol),
                    ..MethodRef::named(name)
                };
                Ok(self.invocation(method, instance, arguments, span))
            }
            None if name == "Equals" && arguments.len() == 2 => {
                Ok(self.invocation(MethodRef::named(name), None, arguments, span))
            }
            None => Err(unresolved(name, span)),
        }
    }

    /// Overload resolution: the first candidate whose parameter types match the arguments,
    /// else the first with the right arity.
    fn best_overload(&self, candidates: &[SymbolId], arguments: &[Operation]) -> Option<SymbolId> {
        let arity = |m: SymbolId| self.model.parameter_types(m).len() == arguments.len();
        let typed = |m: SymbolId| {
            self.model
                .parameter_types(m)
                .iter()
                .zip(arguments)
                .all(|(p, a)| p.same_as(&a.ty))
        };
        candidates
            .iter()
            .copied()
            .find(|&m| arity(m) && typed(m))
            .or_else(|| candidates.iter().copied().find(|&m| arity(m)))
    }

    /// A method named `name` on `ty` or its bases.
    fn resolve_method(&self, ty: SymbolId, name: &str, arguments: &[Operation]) -> Option<SymbolId> {
        self.model.base_chain(ty).into_iter().find_map(|t| {
            let overloads: Vec<_> = self
                .model
                .methods(t)
                .filter(|(_, m)| m.name == name)
                .map(|(id, _)| id)
                .collect();
            self.best_overload(&overloads, arguments)
        })
    }

    fn resolve_constructor(
        &self,
        ty: SymbolId,
        arguments: &[Operation],
        exclude: Option<SymbolId>,
    ) -> Option<SymbolId> {
        let ctors: Vec<_> = self
            .model
            .constructors(ty)
            .into_iter()
            .filter(|&c| Some(c) != exclude)
            .collect();
        self.best_overload(&ctors, arguments)
    }

    fn construct(
        &mut self,
        ty: SymbolId,
        arguments: Vec<Operation>,
        initializer: Option<Vec<Operation>>,
        span: TokenSpan,
    ) -> Result<Operation> {
        let constructor = if arguments.is_empty() {
            self.resolve_constructor(ty, &arguments, None)
        } else {
            let found = self.resolve_constructor(ty, &arguments, None).ok_or_else(|| {
                unresolved(format!("{}::new/{}", self.model.name(ty), arguments.len()), span)
            })?;
            Some(found)
        };
        let created = self.model.type_of_symbol(ty);
        Ok(self.op(
            OpKind::ObjectCreation {
                constructor,
                arguments,
                initializer,
            },
            created,
            span,
        ))
    }

    /// `C { P: v, ..C::new(args) }`: a creation with a member initializer.
    fn creation(&mut self, x: &syn::ExprStruct) -> Result<Operation> {
        let span = x.span();
        let name = match x.path.get_ident() {
            Some(id) => id.to_string(),
            None => return Err(unsupported("qualified struct literal", span)),
        };
        let ty = self
            .model
            .lookup_type(&name)
            .ok_or_else(|| unresolved(name.as_str(), span))?;
        let (constructor, arguments) = match &x.rest {
            None => (self.resolve_constructor(ty, &[], None), Vec::new()),
            Some(rest) => match self.expr(rest)?.kind {
                OpKind::ObjectCreation {
                    constructor,
                    arguments,
                    initializer: None,
                } => (constructor, arguments),
                _ => return Err(unsupported("struct update base", rest.span())),
            },
        };
        let created = self.model.type_of_symbol(ty);
        let mut entries = Vec::with_capacity(x.fields.len());
        for fv in &x.fields {
            let member_span = fv.member.span();
            let name = match &fv.member {
                syn::Member::Named(id) => id.to_string(),
                syn::Member::Unnamed(_) => return Err(unsupported("tuple field", member_span)),
            };
            let member = self
                .model
                .find_member(ty, &name)
                .ok_or_else(|| unresolved(name.as_str(), member_span))?;
            let value = self.expr(&fv.expr)?;
            let receiver = self
                .op(OpKind::InstanceReference, created.clone(), member_span)
                .into_implicit();
            let target = self.member(member, Some(receiver), member_span);
            let ty = target.ty.clone();
            entries.push(self.op(
                OpKind::Assignment {
                    target: Box::new(target),
                    value: Box::new(value),
                },
                ty,
                fv.span(),
            ));
        }
        let initializer = if entries.is_empty() { None } else { Some(entries) };
        Ok(self.op(
            OpKind::ObjectCreation {
                constructor,
                arguments,
                initializer,
            },
            created,
            span,
        ))
    }

    fn binary(&mut self, x: &syn::ExprBinary) -> Result<Operation> {
        use syn::BinOp as B;
        let span = x.span();
        let (op, compound) = match x.op {
            B::Add(_) => (BinaryOp::Add, false),
            B::Sub(_) => (BinaryOp::Subtract, false),
            B::Mul(_) => (BinaryOp::Multiply, false),
            B::Div(_) => (BinaryOp::Divide, false),
            B::Rem(_) => (BinaryOp::Remainder, false),
            B::And(_) => (BinaryOp::ConditionalAnd, false),
            B::Or(_) => (BinaryOp::ConditionalOr, false),
            B::BitXor(_) => (BinaryOp::ExclusiveOr, false),
            B::BitAnd(_) => (BinaryOp::And, false),
            B::BitOr(_) => (BinaryOp::Or, false),
            B::Eq(_) => (BinaryOp::Equals, false),
            B::Ne(_) => (BinaryOp::NotEquals, false),
            B::Lt(_) => (BinaryOp::LessThan, false),
            B::Le(_) => (BinaryOp::LessThanOrEqual, false),
            B::Gt(_) => (BinaryOp::GreaterThan, false),
            B::Ge(_) => (BinaryOp::GreaterThanOrEqual, false),
            B::AddAssign(_) => (BinaryOp::Add, true),
            B::SubAssign(_) => (BinaryOp::Subtract, true),
            B::MulAssign(_) => (BinaryOp::Multiply, true),
            B::BitXorAssign(_) => (BinaryOp::ExclusiveOr, true),
            _ => return Err(unsupported("binary operator", span)),
        };
        let left = self.expr(&x.left)?;
        let right = self.expr(&x.right)?;
        use BinaryOp::*;
        let ty = match op {
            ConditionalAnd | ConditionalOr | Equals | NotEquals | LessThan | LessThanOrEqual
            | GreaterThan | GreaterThanOrEqual => Type::bool(),
            _ => left.ty.clone(),
        };
        let value = self.op(
            OpKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty.clone(),
            span,
        );
        if !compound {
            return Ok(value);
        }
        // `x += y` reads and writes `x`; the target is lowered again as its own node
        let target = self.expr(&x.left)?;
        Ok(self.op(
            OpKind::Assignment {
                target: Box::new(target),
                value: Box::new(value),
            },
            ty,
            span,
        ))
    }

    fn block_value(&mut self, b: &syn::Block) -> Result<Operation> {
        match &b.stmts[..] {
            [syn::Stmt::Expr(e, None)] => self.expr(e),
            _ => Err(unsupported("block as a value", b.span())),
        }
    }

    /// `if c { a } else { b }` as a value: `c ? a : b`.
    fn conditional(&mut self, x: &syn::ExprIf) -> Result<Operation> {
        let span = x.span();
        let condition = self.expr(&x.cond)?;
        let when_true = self.block_value(&x.then_branch)?;
        let when_false = match &x.else_branch {
            Some((_, e)) => match &**e {
                syn::Expr::Block(b) => self.block_value(&b.block)?,
                other => self.expr(other)?,
            },
            None => return Err(unsupported("`if` without `else` as a value", span)),
        };
        let ty = when_true.ty.clone();
        Ok(self.op(
            OpKind::Conditional {
                condition: Box::new(condition),
                when_true: Box::new(when_true),
                when_false: Some(Box::new(when_false)),
                is_expression: true,
            },
            ty,
            span,
        ))
    }

    fn switch(&mut self, x: &syn::ExprMatch) -> Result<Operation> {
        let value = self.expr(&x.expr)?;
        let mut arms = Vec::with_capacity(x.arms.len());
        for arm in &x.arms {
            if let Some((_, guard)) = &arm.guard {
                return Err(unsupported("match guard", guard.span()));
            }
            let pattern = self.pattern(&arm.pat)?;
            let value = self.expr(&arm.body)?;
            arms.push(SwitchArm { pattern, value });
        }
        let ty = arms
            .first()
            .map(|a| a.value.ty.clone())
            .unwrap_or_else(Type::object);
        Ok(self.op(
            OpKind::Switch {
                value: Box::new(value),
                arms,
            },
            ty,
            x.span(),
        ))
    }

    /// `C(x)` declares `x`, `C(_)` and `C` only test the type, `None` is the null pattern.
    fn pattern(&mut self, p: &syn::Pat) -> Result<Pattern> {
        match p {
            syn::Pat::Wild(_) => Ok(Pattern::Discard),
            syn::Pat::Ident(x) if x.ident == "None" => Ok(Pattern::Null),
            syn::Pat::Ident(x) if x.subpat.is_none() && x.by_ref.is_none() => {
                let ty = named_type(self.model, &x.ident.to_string(), x.span())?;
                Ok(Pattern::Type { ty, declared: None })
            }
            syn::Pat::TupleStruct(x) => {
                let name = match x.path.get_ident() {
                    Some(id) => id.to_string(),
                    None => return Err(unsupported("qualified type pattern", x.span())),
                };
                let ty = named_type(self.model, &name, x.path.span())?;
                let elems: Vec<_> = x.elems.iter().collect();
                match elems[..] {
                    [syn::Pat::Ident(local)] => {
                        trace!("pattern declares {}", local.ident);
                        let declared = self.declare(local.ident.to_string(), ty.clone());
                        Ok(Pattern::Type {
                            ty,
                            declared: Some(declared),
                        })
                    }
                    [syn::Pat::Wild(_)] => Ok(Pattern::Type { ty, declared: None }),
                    _ => Err(unsupported("type pattern", x.span())),
                }
            }
            syn::Pat::Lit(x) => Ok(Pattern::Constant(Box::new(self.literal(&x.lit)?))),
            syn::Pat::Paren(x) => self.pattern(&x.pat),
            other => Err(unsupported(other.discrim(), other.span())),
        }
    }

    /// `panic!(...)` throws; no other macro has a meaning.
    fn macro_op(&mut self, mac: &syn::Macro) -> Result<Operation> {
        let span = mac.span();
        if !mac.path.is_ident("panic") {
            return Err(unsupported("macro", span));
        }
        let args = mac.parse_body_with(Punctuated::<syn::Expr, Token![,]>::parse_terminated)?;
        let thrown = match args.first() {
            Some(e) => Some(Box::new(self.expr(e)?)),
            None => None,
        };
        Ok(self.op(OpKind::Throw(thrown), Type::void(), span))
    }

    /// Resolves `: this(...)` or `: base(...)` for the constructor being lowered.
    pub fn initializer(
        &self,
        kind: InitializerKind,
        arguments: Vec<Operation>,
        span: TokenSpan,
    ) -> Result<ConstructorInitializer> {
        let (keyword, target_type) = match kind {
            InitializerKind::This => ("this", Some(self.ty)),
            InitializerKind::Base => ("base", self.model.type_symbol(self.ty).and_then(|t| t.base)),
        };
        let target_type = target_type.ok_or_else(|| unresolved(keyword, span))?;
        if kind == InitializerKind::Base {
            let primary = self
                .model
                .type_symbol(target_type)
                .map(|t| t.primary_parameters.clone())
                .unwrap_or_default();
            if !primary.is_empty() && primary.len() == arguments.len() {
                return Ok(ConstructorInitializer {
                    kind,
                    target: None,
                    parameters: primary,
                    arguments,
                });
            }
        }
        let target = self
            .resolve_constructor(target_type, &arguments, Some(self.owner))
            .ok_or_else(|| unresolved(format!("{}/{}", keyword, arguments.len()), span))?;
        let parameters = self
            .model
            .method(target)
            .map(|m| m.parameters.clone())
            .unwrap_or_default();
        Ok(ConstructorInitializer {
            kind,
            target: Some(target),
            parameters,
            arguments,
        })
    }
}
