//! Rendering operation trees: compact debug trees, and C#-like source text.

use std::fmt::{self, Display, Formatter};

use crate::convert::ConversionPlan;
use crate::ir::names::Discrim;
use crate::ir::visit::{Visitable, Visitor};
use crate::ir::{
    BinaryOp, Body, Constant, ConversionKind, InitializerKind, OpKind, Operation, Pattern,
};
use crate::symbols::{Model, Symbol, SymbolId};
use crate::Options;

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Constant::Null => write!(f, "null"),
            Constant::Default => write!(f, "default"),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(n) => write!(f, "{}", n),
            Constant::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
        }
    }
}

pub(crate) trait Emitter {
    fn item(&mut self, s: impl Display);
    fn text_item(&mut self, s: impl Display);
    fn opener(&mut self, s: impl Display);
    fn closer(&mut self);
    fn maybe_break(&mut self) {}
    fn finish(self) -> String;
}

/// `Block{ Return{ Binary{ == MemberReference{ X } Literal{ 1 } } } }`
pub(crate) struct ReprEmitter {
    buf: String,
    sibling: bool,
}

impl ReprEmitter {
    pub fn new() -> Self {
        ReprEmitter {
            buf: String::new(),
            sibling: false,
        }
    }

    fn maybe_comma(&mut self) {
        if self.sibling {
            self.buf.push(' ');
        }
    }
}

impl Emitter for ReprEmitter {
    fn item(&mut self, s: impl Display) {
        self.maybe_comma();
        self.buf += &s.to_string();
        self.sibling = true;
    }

    fn text_item(&mut self, s: impl Display) {
        self.item(s);
    }

    fn opener(&mut self, s: impl Display) {
        self.maybe_comma();
        self.buf += &format!("{}{{", s);
        self.sibling = true;
    }

    fn closer(&mut self) {
        self.maybe_comma();
        self.buf.push('}');
        self.sibling = true;
    }

    fn maybe_break(&mut self) {
        if !self.buf.is_empty() {
            self.buf.push('\n');
            self.sibling = false;
        }
    }

    fn finish(self) -> String {
        self.buf
    }
}

/// `[["Block",["Return",["Binary","==",["MemberReference","X"],["Literal",1]]]]]`
pub(crate) struct JsonEmitter {
    buf: String,
    sibling: bool,
}

impl JsonEmitter {
    pub fn new() -> Self {
        JsonEmitter {
            buf: String::from("["),
            sibling: false,
        }
    }

    fn maybe_comma(&mut self) {
        if self.sibling {
            self.buf.push(',');
        }
    }
}

fn json_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out += "\\\"",
            '\\' => out += "\\\\",
            '\n' => out += "\\n",
            '\r' => out += "\\r",
            '\t' => out += "\\t",
            c if c < ' ' => out += &format!("\\u{:04x}", c as u32),
            c => out.push(c),
        }
    }
    out
}

impl Emitter for JsonEmitter {
    fn item(&mut self, s: impl Display) {
        self.maybe_comma();
        self.buf += &s.to_string();
        self.sibling = true;
    }

    fn text_item(&mut self, s: impl Display) {
        self.maybe_comma();
        self.buf += &format!("\"{}\"", json_escape(&s.to_string()));
        self.sibling = true;
    }

    fn opener(&mut self, s: impl Display) {
        self.maybe_comma();
        self.buf += &format!("[\"{}\"", s);
        self.sibling = true;
    }

    fn closer(&mut self) {
        self.buf.push(']');
        self.sibling = true;
    }

    fn finish(mut self) -> String {
        self.buf.push(']');
        self.buf
    }
}

/// Emits a tree of operation kinds, with names resolved through the model.
pub(crate) struct TreeRepr<'m, E> {
    model: &'m Model,
    emitter: E,
    /// Whether each open operation is a block; statements start on their own line.
    blocks: Vec<bool>,
}

impl<'m, E: Emitter> TreeRepr<'m, E> {
    pub fn new(model: &'m Model, emitter: E) -> Self {
        TreeRepr {
            model,
            emitter,
            blocks: Vec::new(),
        }
    }

    fn name(&mut self, id: SymbolId) {
        let name = self.model.name(id).to_owned();
        self.emitter.text_item(name);
    }
}

impl<'op, 'm, E: Emitter> Visitor<'op> for TreeRepr<'m, E> {
    type Output = String;

    fn finish(self) -> String {
        self.emitter.finish()
    }

    fn open_op(&mut self, op: &'op Operation) -> Result<(), ()> {
        if self.blocks.last() == Some(&true) {
            self.emitter.maybe_break();
        }
        self.emitter.opener(op.kind.discrim());
        match &op.kind {
            OpKind::Binary { op, .. } => self.emitter.text_item(op.token()),
            OpKind::Unary { op, .. } => self.emitter.text_item(op.token()),
            OpKind::Conversion { kind, .. } => {
                self.emitter.text_item(kind.discrim());
                self.emitter.text_item(&op.ty);
            }
            OpKind::Invocation { method, .. } => self.emitter.text_item(&method.name),
            OpKind::MemberReference { member: id, .. }
            | OpKind::ParameterReference(id)
            | OpKind::LocalReference(id)
            | OpKind::VariableDeclaration { local: id, .. } => self.name(*id),
            OpKind::ExternalReference(path) => self.emitter.text_item(path),
            OpKind::ObjectCreation { .. } => self.emitter.text_item(&op.ty),
            OpKind::Literal => match &op.constant {
                Some(c @ (Constant::Bool(_) | Constant::Int(_))) => self.emitter.item(c),
                Some(c) => self.emitter.text_item(c),
                None => (),
            },
            _ => (),
        }
        self.blocks.push(matches!(op.kind, OpKind::Block(_)));
        Ok(())
    }

    fn close_op(&mut self, _: &'op Operation) {
        self.blocks.pop();
        self.emitter.closer();
    }

    fn open_pattern(&mut self, p: &'op Pattern) {
        self.emitter.opener(p.discrim());
        if let Pattern::Type { ty, declared } = p {
            self.emitter.text_item(ty);
            if let Some(local) = declared {
                self.name(*local);
            }
        }
        self.blocks.push(false);
    }

    fn close_pattern(&mut self, _: &'op Pattern) {
        self.blocks.pop();
        self.emitter.closer();
    }
}

/// One line per statement, nodes as `Kind{ children }`.
pub fn flat_tree<'op, V: Visitable<'op> + ?Sized>(model: &Model, op: &'op V) -> String {
    TreeRepr::new(model, ReprEmitter::new()).visit(op)
}

/// The same tree as nested JSON arrays.
pub fn json_tree<'op, V: Visitable<'op> + ?Sized>(model: &Model, op: &'op V) -> String {
    TreeRepr::new(model, JsonEmitter::new()).visit(op)
}

// Expression precedence levels; binary operators sit at 2..=11.
const ASSIGNMENT: u8 = 0;
const CONDITIONAL: u8 = 1;
const RELATIONAL: u8 = 9;
const UNARY: u8 = 12;
const PRIMARY: u8 = 13;

fn binary_level(op: BinaryOp) -> u8 {
    op.precedence() + 1
}

/// Prints operations as C# source.
pub struct Printer<'m> {
    model: &'m Model,
    options: Options,
}

impl<'m> Printer<'m> {
    pub fn new(model: &'m Model) -> Self {
        Printer {
            model,
            options: Options::default(),
        }
    }

    pub fn with_options(self, options: Options) -> Self {
        Printer { options, ..self }
    }

    pub fn expression(&self, op: &Operation) -> String {
        self.expr(op, ASSIGNMENT)
    }

    fn level(&self, op: &Operation) -> u8 {
        match &op.kind {
            OpKind::Assignment { .. } | OpKind::Throw(_) => ASSIGNMENT,
            OpKind::Conditional { .. } => CONDITIONAL,
            OpKind::Binary { op, .. } => binary_level(*op),
            OpKind::IsPattern { .. } => RELATIONAL,
            OpKind::Conversion {
                kind: ConversionKind::TryCast,
                ..
            } => RELATIONAL,
            OpKind::Conversion {
                kind: ConversionKind::Implicit,
                operand,
            } => self.level(operand),
            OpKind::Unary { .. } | OpKind::Conversion { .. } => UNARY,
            _ => PRIMARY,
        }
    }

    /// `op` in a context that needs at least precedence `min`.
    fn expr(&self, op: &Operation, min: u8) -> String {
        let text = self.bare(op);
        if self.level(op) < min {
            format!("({})", text)
        } else {
            text
        }
    }

    fn arguments(&self, args: &[Operation]) -> String {
        args.iter()
            .map(|a| self.expr(a, ASSIGNMENT))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `receiver.` for a member access, or nothing for an implicit `this`.
    fn receiver(&self, instance: Option<&Operation>, member: Option<SymbolId>) -> String {
        match instance {
            Some(i) if matches!(i.kind, OpKind::InstanceReference) && i.implicit => String::new(),
            Some(i) => format!("{}.", self.expr(i, PRIMARY)),
            None => match member.and_then(|m| self.container(m)) {
                Some(ty) => format!("{}.", self.model.name(ty)),
                None => String::new(),
            },
        }
    }

    fn container(&self, member: SymbolId) -> Option<SymbolId> {
        match self.model.symbol(member) {
            Symbol::Field(f) => f.container,
            Symbol::Property(p) => p.container,
            Symbol::Method(m) => m.container,
            _ => None,
        }
    }

    fn bare(&self, op: &Operation) -> String {
        use self::OpKind::*;
        match &op.kind {
            Literal => match &op.constant {
                Some(c) => c.to_string(),
                None => "default".to_owned(),
            },
            Binary { op: bin, left, right } => {
                let level = binary_level(*bin);
                let (l, r) = match bin {
                    BinaryOp::Coalesce => (level + 1, level),
                    _ => (level, level + 1),
                };
                format!("{} {} {}", self.expr(left, l), bin.token(), self.expr(right, r))
            }
            Unary { op: un, operand } => format!("{}{}", un.token(), self.expr(operand, UNARY)),
            Conditional {
                condition,
                when_true,
                when_false,
                ..
            } => {
                let otherwise = when_false
                    .as_ref()
                    .map_or_else(|| "default".to_owned(), |x| self.expr(x, CONDITIONAL));
                format!(
                    "{} ? {} : {}",
                    self.expr(condition, CONDITIONAL + 1),
                    self.expr(when_true, CONDITIONAL),
                    otherwise
                )
            }
            Invocation {
                method,
                instance,
                arguments,
            } => {
                let receiver = match (instance, &method.qualifier) {
                    (None, Some(q)) => format!("{}.", q),
                    (instance, _) => self.receiver(instance.as_deref(), method.symbol),
                };
                format!("{}{}({})", receiver, method.name, self.arguments(arguments))
            }
            MemberReference { member, instance } => format!(
                "{}{}",
                self.receiver(instance.as_deref(), Some(*member)),
                self.model.name(*member)
            ),
            ParameterReference(id) | LocalReference(id) => self.model.name(*id).to_owned(),
            InstanceReference => "this".to_owned(),
            ExternalReference(path) => path.clone(),
            IsPattern { value, pattern } => {
                format!("{} is {}", self.expr(value, RELATIONAL), self.pattern(pattern))
            }
            Conversion { kind, operand } => match kind {
                ConversionKind::Implicit => self.bare(operand),
                ConversionKind::Explicit => format!("({}){}", op.ty, self.expr(operand, UNARY)),
                ConversionKind::TryCast => {
                    format!("{} as {}", self.expr(operand, RELATIONAL), op.ty.clone().non_nullable())
                }
            },
            Assignment { target, value } => {
                format!("{} = {}", self.expr(target, UNARY), self.expr(value, ASSIGNMENT))
            }
            Throw(x) => match x {
                Some(x) => format!("throw {}", self.expr(x, ASSIGNMENT)),
                None => "throw".to_owned(),
            },
            ObjectCreation {
                arguments,
                initializer,
                ..
            } => {
                let mut s = format!("new {}", op.ty.clone().non_nullable());
                if !arguments.is_empty() || initializer.is_none() {
                    s += &format!("({})", self.arguments(arguments));
                }
                if let Some(entries) = initializer {
                    s += &format!(" {{ {} }}", self.arguments(entries));
                }
                s
            }
            Switch { value, arms } => {
                let arms = arms
                    .iter()
                    .map(|a| format!("{} => {}", self.pattern(&a.pattern), self.expression(&a.value)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} switch {{ {} }}", self.expr(value, PRIMARY), arms)
            }
            VariableDeclaration { local, .. } => self.model.name(*local).to_owned(),
            Block(_) | Return(_) => self.statement(op, 0),
        }
    }

    pub fn pattern(&self, p: &Pattern) -> String {
        match p {
            Pattern::Type { ty, declared } => match declared {
                Some(local) => format!("{} {}", ty, self.model.name(*local)),
                None => ty.to_string(),
            },
            Pattern::Null => "null".to_owned(),
            Pattern::Not(p) => format!("not {}", self.pattern(p)),
            Pattern::Discard => "_".to_owned(),
            Pattern::Constant(op) => self.expr(op, RELATIONAL + 1),
        }
    }

    fn indent(&self, depth: usize) -> String {
        " ".repeat(depth * self.options.indent)
    }

    /// A statement at `depth`, without a trailing line ending.
    pub fn statement(&self, op: &Operation, depth: usize) -> String {
        let pad = self.indent(depth);
        let nl = self.options.line_ending.as_str();
        match &op.kind {
            OpKind::Block(stmts) if stmts.is_empty() => format!("{}{{ }}", pad),
            OpKind::Block(stmts) => {
                let mut s = format!("{}{{", pad);
                for stmt in stmts {
                    s += nl;
                    s += &self.statement(stmt, depth + 1);
                }
                s + nl + &pad + "}"
            }
            OpKind::Return(x) => match x {
                Some(x) => format!("{}return {};", pad, self.expression(x)),
                None => format!("{}return;", pad),
            },
            OpKind::Conditional {
                condition,
                when_true,
                when_false,
                is_expression: false,
            } => {
                let mut s = format!("{}if ({}){}", pad, self.expression(condition), nl);
                s += &self.nested(when_true, depth);
                if let Some(otherwise) = when_false {
                    s += &format!("{}{}else{}", nl, pad, nl);
                    s += &self.nested(otherwise, depth);
                }
                s
            }
            OpKind::VariableDeclaration { local, initializer } => {
                let name = self.model.name(*local);
                match initializer {
                    Some(init) => format!("{}var {} = {};", pad, name, self.expression(init)),
                    None => {
                        let ty = self.model.value_type(*local).map(|t| t.to_string());
                        format!("{}{} {};", pad, ty.as_deref().unwrap_or("var"), name)
                    }
                }
            }
            _ => format!("{}{};", pad, self.expression(op)),
        }
    }

    fn nested(&self, op: &Operation, depth: usize) -> String {
        match op.kind {
            OpKind::Block(_) => self.statement(op, depth),
            _ => self.statement(op, depth + 1),
        }
    }

    fn parameter_list(&self, parameters: &[SymbolId]) -> String {
        parameters
            .iter()
            .filter_map(|&p| self.model.parameter(p))
            .map(|p| match &p.default {
                Some(d) => format!("{} {} = {}", p.ty, p.name, self.expression(d)),
                None => format!("{} {}", p.ty, p.name),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// A constructor declaration with its initializer and body.
    pub fn constructor(&self, ctor: SymbolId, body: &Body) -> String {
        let nl = self.options.line_ending.as_str();
        let method = match self.model.method(ctor) {
            Some(m) => m,
            None => return self.statement(&body.block, 0),
        };
        let mut s = String::new();
        if let Some(kw) = method.accessibility.keyword() {
            s += kw;
            s.push(' ');
        }
        let ty = method.container.map_or("", |t| self.model.name(t));
        s += &format!("{}({})", ty, self.parameter_list(&method.parameters));
        if let Some(init) = &body.initializer {
            let kw = match init.kind {
                InitializerKind::This => "this",
                InitializerKind::Base => "base",
            };
            s += &format!(" : {}({})", kw, self.arguments(&init.arguments));
        }
        s + nl + &self.statement(&body.block, 0)
    }

    /// `public record C(int P, bool B = false) : B(Foo, Bar)`
    pub fn record_header(&self, plan: &ConversionPlan) -> String {
        let mut s = String::new();
        if let Some(kw) = plan.accessibility.keyword() {
            s += kw;
            s.push(' ');
        }
        let parameters = plan
            .parameters
            .iter()
            .map(|p| match &p.default {
                Some(d) => format!("{} {} = {}", p.ty, p.name, self.expression(d)),
                None => format!("{} {}", p.ty, p.name),
            })
            .collect::<Vec<_>>()
            .join(", ");
        s += &format!("{} {}({})", plan.kind.keyword(), plan.name, parameters);
        let mut bases = Vec::with_capacity(plan.interfaces.len() + 1);
        if let Some(base) = plan.base {
            let inherited: Vec<_> = plan.base_arguments().map(|p| p.name.as_str()).collect();
            if inherited.is_empty() {
                bases.push(self.model.name(base).to_owned());
            } else {
                bases.push(format!("{}({})", self.model.name(base), inherited.join(", ")));
            }
        }
        bases.extend(plan.interfaces.iter().map(|i| i.to_string()));
        if !bases.is_empty() {
            s += " : ";
            s += &bases.join(", ");
        }
        s
    }
}
