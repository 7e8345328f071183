//! A Rust-syntax encoding of classes, lowered to a [`Program`].
//!
//! Each source is a file of `struct` declarations and inherent `impl` blocks:
//!
//! ```text
//! #[kind = "class"]
//! pub struct Point {
//!     #[prop(get, set)]
//!     pub X: i32,
//!     #[prop(get, set(private))]
//!     pub Y: i32,
//!     count: i32,
//! }
//!
//! impl Point {
//!     pub fn new(X: i32, #[default = 0] Y: i32) {
//!         self.X = X;
//!         self.Y = Y;
//!     }
//!
//!     #[this(0, 0)]
//!     pub fn new() {}
//!
//!     pub fn Equals(&self, obj: Option<object>) -> bool {
//!         if let Point(other) = obj { X == other.X && Y == other.Y } else { false }
//!     }
//! }
//! ```
//!
//! Struct attributes: `#[kind = "..."]` takes any of `class`, `struct`, `readonly struct`,
//! `record`, `record struct` and `readonly record struct` (default `class`); `#[partial]`;
//! `#[base = "B"]`; and `#[implements(IEquatable<C>, IComparable)]` for the interface list.
//! Visibility maps as `pub` to `public`, `pub(crate)` to `internal`, `pub(super)` to
//! `protected`, `pub(self)` to `private`, and `pub(in protected_internal)` or
//! `pub(in private_protected)` to the combined modifiers. Types without one are `internal`;
//! members without one carry no modifier.
//!
//! A field with `#[prop(...)]` is a property; its options are the accessors `get`, `set` and
//! `init` (each optionally `get(private, body)`), `value = expr`, `expr` for an expression
//! body, `is_static`, `is_abstract`, and `positional` for a record's positional parameter. Other
//! fields are fields, with `#[field(is_static, is_const, value = expr)]`.
//!
//! In `impl` blocks `fn new` is a constructor, `op_Equality` and `op_Inequality` are the
//! `==` and `!=` operators, and a function without `self` is static. `#[this(args)]` and
//! `#[base(args)]` give a constructor initializer; `#[default = expr]` on a parameter gives its
//! default value.
//!
//! Types: `i32`, `i64`, `bool`, `String` and `object` are the builtins, `Option<T>` is `T?`,
//! `()` is `void`, and any declared struct may be named. In bodies, `T::new(a)` creates an
//! object, `T { P: v, ..T::new(a) }` adds a member initializer, `x as T` is an explicit cast
//! and `x as Option<T>` a try-cast, `let T(y) = x` is a type pattern, `match` is a switch
//! expression, and `panic!(e)` throws. Paths that name nothing declared, such as
//! `EqualityComparer::<i32>::Default`, are kept as external references.

mod lower;
mod names;

use log::{debug, trace};
use proc_macro2::Span as TokenSpan;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::Token;

use self::lower::Lowering;
use crate::ir::{Body, IdGen, InitializerKind, LineColumn, Span};
use crate::rewrite::{Document, DocumentId, Language, Program};
use crate::symbols::{
    Accessibility, Accessor, AccessorKind, FieldSymbol, MethodKind, MethodSymbol, Model,
    ParameterSymbol, PropertySymbol, SymbolId, Type, TypeKind, TypeSymbol,
};
use crate::{Error, Result};

impl From<syn::Error> for Error {
    fn from(e: syn::Error) -> Self {
        Error::Parse {
            message: e.to_string(),
            at: line_column(e.span().start()),
        }
    }
}

fn line_column(at: proc_macro2::LineColumn) -> LineColumn {
    LineColumn {
        line: at.line,
        column: at.column,
    }
}

pub(crate) fn span_of(span: TokenSpan) -> Span {
    Span::new(line_column(span.start()), line_column(span.end()))
}

pub(crate) fn unsupported(what: impl Into<String>, span: TokenSpan) -> Error {
    Error::Unsupported {
        what: what.into(),
        at: line_column(span.start()),
    }
}

pub(crate) fn unresolved(name: impl Into<String>, span: TokenSpan) -> Error {
    Error::Unresolved {
        name: name.into(),
        at: line_column(span.start()),
    }
}

fn builtin(name: &str) -> Option<Type> {
    Some(match name {
        "i32" | "int" => Type::int(),
        "i64" | "long" => Type::named("long", None, true),
        "bool" => Type::bool(),
        "String" | "string" | "str" => Type::string(),
        "object" => Type::object(),
        _ => return None,
    })
}

/// A builtin or declared type by name.
pub(crate) fn named_type(model: &Model, name: &str, span: TokenSpan) -> Result<Type> {
    if let Some(ty) = builtin(name) {
        return Ok(ty);
    }
    model
        .lookup_type(name)
        .map(|t| model.type_of_symbol(t))
        .ok_or_else(|| unresolved(name, span))
}

fn single_type_argument(args: &syn::PathArguments) -> Option<&syn::Type> {
    match args {
        syn::PathArguments::AngleBracketed(a) if a.args.len() == 1 => match a.args.first() {
            Some(syn::GenericArgument::Type(t)) => Some(t),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn resolve_type(model: &Model, ty: &syn::Type) -> Result<Type> {
    match ty {
        syn::Type::Path(p) if p.qself.is_none() && p.path.segments.len() == 1 => {
            let seg = &p.path.segments[0];
            let name = seg.ident.to_string();
            if name == "Option" {
                let inner = single_type_argument(&seg.arguments)
                    .ok_or_else(|| unsupported("Option without one type argument", p.span()))?;
                return Ok(resolve_type(model, inner)?.nullable());
            }
            if !seg.arguments.is_empty() {
                return Err(unsupported("generic type", p.span()));
            }
            named_type(model, &name, p.span())
        }
        syn::Type::Tuple(t) if t.elems.is_empty() => Ok(Type::void()),
        syn::Type::Reference(r) => resolve_type(model, &r.elem),
        syn::Type::Paren(p) => resolve_type(model, &p.elem),
        syn::Type::Group(g) => resolve_type(model, &g.elem),
        other => Err(unsupported("type", other.span())),
    }
}

/// `A::<T>::B` as `A<T>.B`.
pub(crate) fn path_text(model: &Model, path: &syn::Path) -> Result<String> {
    let mut parts = Vec::with_capacity(path.segments.len());
    for seg in &path.segments {
        let mut s = seg.ident.to_string();
        match &seg.arguments {
            syn::PathArguments::None => (),
            syn::PathArguments::AngleBracketed(a) => {
                let mut args = Vec::with_capacity(a.args.len());
                for arg in &a.args {
                    match arg {
                        syn::GenericArgument::Type(t) => args.push(resolve_type(model, t)?.to_string()),
                        other => return Err(unsupported("generic argument", other.span())),
                    }
                }
                s += &format!("<{}>", args.join(", "));
            }
            syn::PathArguments::Parenthesized(p) => {
                return Err(unsupported("parenthesized arguments", p.span()))
            }
        }
        parts.push(s);
    }
    Ok(parts.join("."))
}

fn accessibility_word(path: &syn::Path) -> Option<Accessibility> {
    let ident = path.get_ident()?.to_string();
    Some(match ident.as_str() {
        "public" => Accessibility::Public,
        "internal" => Accessibility::Internal,
        "protected" => Accessibility::Protected,
        "private" => Accessibility::Private,
        "protected_internal" => Accessibility::ProtectedInternal,
        "private_protected" => Accessibility::PrivateProtected,
        _ => return None,
    })
}

fn accessibility(vis: &syn::Visibility) -> Result<Accessibility> {
    match vis {
        syn::Visibility::Public(_) => Ok(Accessibility::Public),
        syn::Visibility::Inherited => Ok(Accessibility::NotApplicable),
        syn::Visibility::Restricted(r) => {
            let a = if r.path.is_ident("crate") {
                Some(Accessibility::Internal)
            } else if r.path.is_ident("super") {
                Some(Accessibility::Protected)
            } else if r.path.is_ident("self") {
                Some(Accessibility::Private)
            } else {
                accessibility_word(&r.path)
            };
            a.ok_or_else(|| unsupported("visibility", r.span()))
        }
    }
}

fn is_attr(attr: &syn::Attribute, name: &str) -> bool {
    attr.path().is_ident(name)
}

/// `#[name = "text"]` or `#[name = path]`.
fn name_value_text(attr: &syn::Attribute) -> Result<String> {
    let nv = attr.meta.require_name_value()?;
    match &nv.value {
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(s),
            ..
        }) => Ok(s.value()),
        syn::Expr::Path(p) => Ok(p
            .path
            .segments
            .iter()
            .map(|s| s.ident.to_string())
            .collect::<Vec<_>>()
            .join(".")),
        other => Err(unsupported("attribute value", other.span())),
    }
}

fn type_kind(text: &str, span: TokenSpan) -> Result<TypeKind> {
    Ok(match text {
        "class" => TypeKind::Class,
        "struct" => TypeKind::Struct,
        "readonly struct" => TypeKind::ReadonlyStruct,
        "record" => TypeKind::Record,
        "record struct" => TypeKind::RecordStruct,
        "readonly record struct" => TypeKind::ReadonlyRecordStruct,
        _ => return Err(unsupported(format!("type kind `{}`", text), span)),
    })
}

fn declare_type(model: &mut Model, s: &syn::ItemStruct, document: DocumentId) -> Result<SymbolId> {
    let name = s.ident.to_string();
    let mut decl = TypeSymbol::new(name.as_str(), TypeKind::Class);
    decl.accessibility = match accessibility(&s.vis)? {
        Accessibility::NotApplicable => Accessibility::Internal,
        a => a,
    };
    decl.document = Some(document);
    for attr in &s.attrs {
        if is_attr(attr, "kind") {
            decl.kind = type_kind(&name_value_text(attr)?, attr.span())?;
        } else if is_attr(attr, "partial") {
            decl.is_partial = true;
        } else if !is_attr(attr, "base") && !is_attr(attr, "implements") {
            return Err(unsupported("type attribute", attr.span()));
        }
    }
    if !s.generics.params.is_empty() {
        return Err(unsupported("generic type", s.generics.span()));
    }
    match model.lookup_type(&name) {
        Some(existing) => {
            let partial = model.type_symbol(existing).map_or(false, |t| t.is_partial);
            if partial && decl.is_partial {
                trace!("{}: another part", name);
                Ok(existing)
            } else {
                Err(unsupported(format!("duplicate type `{}`", name), s.ident.span()))
            }
        }
        None => Ok(model.add_type(decl)),
    }
}

fn declare_base(model: &mut Model, ty: SymbolId, s: &syn::ItemStruct) -> Result<()> {
    for attr in s.attrs.iter().filter(|a| is_attr(a, "base")) {
        let name = name_value_text(attr)?;
        let base = model
            .lookup_type(&name)
            .ok_or_else(|| unresolved(name.as_str(), attr.span()))?;
        if let Some(t) = model.type_symbol_mut(ty) {
            t.base = Some(base);
        }
    }
    for attr in s.attrs.iter().filter(|a| is_attr(a, "implements")) {
        let paths = attr.parse_args_with(Punctuated::<syn::Path, Token![,]>::parse_terminated)?;
        for path in &paths {
            let interface = Type::named(path_text(model, path)?, None, false);
            trace!("{} implements {}", model.name(ty), interface);
            if let Some(t) = model.type_symbol_mut(ty) {
                t.interfaces.push(interface);
            }
        }
    }
    Ok(())
}

/// `get`, `get(private)`, `get(body)`, or `get(private, body)`.
fn accessor(meta: &syn::meta::ParseNestedMeta, kind: AccessorKind) -> syn::Result<Accessor> {
    let mut acc = Accessor::auto(kind);
    if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| {
            if inner.path.is_ident("body") {
                acc.has_body = true;
                return Ok(());
            }
            match accessibility_word(&inner.path) {
                Some(a) => {
                    acc.accessibility = Some(a);
                    Ok(())
                }
                None => Err(inner.error("expected an accessibility or `body`")),
            }
        })?;
    }
    Ok(acc)
}

fn property(
    model: &mut Model,
    ty: SymbolId,
    name: String,
    vty: Type,
    access: Accessibility,
    attr: &syn::Attribute,
) -> Result<()> {
    let mut p = PropertySymbol {
        accessibility: access,
        getter: None,
        ..PropertySymbol::new(name, vty)
    };
    let mut positional = false;
    if !matches!(attr.meta, syn::Meta::Path(_)) {
        attr.parse_nested_meta(|meta| {
            let path = &meta.path;
            if path.is_ident("get") {
                p.getter = Some(accessor(&meta, AccessorKind::Get)?);
            } else if path.is_ident("set") {
                p.setter = Some(accessor(&meta, AccessorKind::Set)?);
            } else if path.is_ident("init") {
                p.setter = Some(accessor(&meta, AccessorKind::Init)?);
            } else if path.is_ident("value") {
                meta.value()?.parse::<syn::Expr>()?;
                p.has_initializer = true;
            } else if path.is_ident("expr") {
                p.expression_body = true;
            } else if path.is_ident("is_static") {
                p.is_static = true;
            } else if path.is_ident("is_abstract") {
                p.is_abstract = true;
            } else if path.is_ident("positional") {
                positional = true;
            } else {
                return Err(meta.error("unknown property option"));
            }
            Ok(())
        })?;
    }
    if positional {
        p.declared = false;
    }
    let id = model.add_property(ty, p);
    if positional {
        model.add_primary_parameter(ty, id);
    }
    Ok(())
}

fn field(model: &mut Model, ty: SymbolId, name: String, vty: Type, access: Accessibility, attrs: &[syn::Attribute]) -> Result<()> {
    let mut f = FieldSymbol {
        accessibility: access,
        ..FieldSymbol::new(name, vty)
    };
    for attr in attrs {
        if !is_attr(attr, "field") {
            return Err(unsupported("field attribute", attr.span()));
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("is_static") {
                f.is_static = true;
            } else if meta.path.is_ident("is_const") {
                f.is_const = true;
            } else if meta.path.is_ident("value") {
                meta.value()?.parse::<syn::Expr>()?;
                f.has_initializer = true;
            } else {
                return Err(meta.error("unknown field option"));
            }
            Ok(())
        })?;
    }
    model.add_field(ty, f);
    Ok(())
}

fn declare_members(model: &mut Model, ty: SymbolId, s: &syn::ItemStruct) -> Result<()> {
    let fields = match &s.fields {
        syn::Fields::Named(f) => &f.named,
        syn::Fields::Unit => return Ok(()),
        syn::Fields::Unnamed(f) => return Err(unsupported("tuple struct", f.span())),
    };
    for f in fields {
        let name = match &f.ident {
            Some(id) => id.to_string(),
            None => return Err(unsupported("unnamed field", f.span())),
        };
        let vty = resolve_type(model, &f.ty)?;
        let access = accessibility(&f.vis)?;
        match f.attrs.iter().find(|a| is_attr(a, "prop")) {
            Some(attr) => property(model, ty, name, vty, access, attr)?,
            None => field(model, ty, name, vty, access, &f.attrs)?,
        }
    }
    Ok(())
}

fn impl_target(model: &Model, imp: &syn::ItemImpl) -> Result<SymbolId> {
    if let Some((_, path, _)) = &imp.trait_ {
        return Err(unsupported("trait impl", path.span()));
    }
    match &*imp.self_ty {
        syn::Type::Path(p) => {
            let ident = p
                .path
                .get_ident()
                .ok_or_else(|| unsupported("impl target", p.span()))?;
            model
                .lookup_type(&ident.to_string())
                .ok_or_else(|| unresolved(ident.to_string(), ident.span()))
        }
        other => Err(unsupported("impl target", other.span())),
    }
}

fn declare_method(
    model: &mut Model,
    ty: SymbolId,
    f: &syn::ImplItemFn,
    document: DocumentId,
) -> Result<SymbolId> {
    let sig = &f.sig;
    let ident = sig.ident.to_string();
    let (name, kind) = match ident.as_str() {
        "new" => (".ctor", MethodKind::Constructor),
        "op_Equality" => ("op_Equality", MethodKind::Equality),
        "op_Inequality" => ("op_Inequality", MethodKind::Inequality),
        other => (other, MethodKind::Ordinary),
    };
    let return_type = match (&sig.output, kind) {
        (_, MethodKind::Constructor) | (syn::ReturnType::Default, _) => Type::void(),
        (syn::ReturnType::Type(_, t), _) => resolve_type(model, t)?,
    };
    let method = MethodSymbol {
        accessibility: accessibility(&f.vis)?,
        is_static: kind != MethodKind::Constructor && sig.receiver().is_none(),
        document: Some(document),
        ..MethodSymbol::new(name, kind, return_type)
    };
    let id = model.add_method(ty, method);
    for input in &sig.inputs {
        let pt = match input {
            syn::FnArg::Receiver(_) => continue,
            syn::FnArg::Typed(pt) => pt,
        };
        let pname = match &*pt.pat {
            syn::Pat::Ident(p) => p.ident.to_string(),
            other => return Err(unsupported("parameter pattern", other.span())),
        };
        let pty = resolve_type(model, &pt.ty)?;
        model.add_parameter(id, ParameterSymbol::new(pname, pty));
    }
    trace!("{}::{}/{}", model.name(ty), ident, model.parameter_types(id).len());
    Ok(id)
}

type InitializerAttr = (InitializerKind, Vec<syn::Expr>, TokenSpan);

/// `#[this(args)]` or `#[base(args)]`.
fn initializer_attr(f: &syn::ImplItemFn) -> Result<Option<InitializerAttr>> {
    let attr = match &f.attrs[..] {
        [] => return Ok(None),
        [attr] => attr,
        [_, extra, ..] => return Err(unsupported("second method attribute", extra.span())),
    };
    let kind = if is_attr(attr, "this") {
        InitializerKind::This
    } else if is_attr(attr, "base") {
        InitializerKind::Base
    } else {
        return Err(unsupported("method attribute", attr.span()));
    };
    let args = match &attr.meta {
        syn::Meta::Path(_) => Vec::new(),
        _ => attr
            .parse_args_with(Punctuated::<syn::Expr, Token![,]>::parse_terminated)?
            .into_iter()
            .collect(),
    };
    Ok(Some((kind, args, attr.span())))
}

fn default_attr(attrs: &[syn::Attribute]) -> Result<Option<&syn::Expr>> {
    match attrs {
        [] => Ok(None),
        [attr] if is_attr(attr, "default") => Ok(Some(&attr.meta.require_name_value()?.value)),
        [.., attr] => Err(unsupported("parameter attribute", attr.span())),
    }
}

/// Lowers the defaults, initializer and block of one method.
fn lower_method(
    model: &mut Model,
    ids: &mut IdGen,
    ty: SymbolId,
    method: SymbolId,
    f: &syn::ImplItemFn,
) -> Result<Body> {
    let parameters = model
        .method(method)
        .map(|m| m.parameters.clone())
        .unwrap_or_default();
    let mut lowering = Lowering::new(model, ids, ty, method);
    let typed = f.sig.inputs.iter().filter_map(|a| match a {
        syn::FnArg::Typed(pt) => Some(pt),
        syn::FnArg::Receiver(_) => None,
    });
    for (pt, &param) in typed.zip(&parameters) {
        if let Some(e) = default_attr(&pt.attrs)? {
            let value = lowering.expr(e)?;
            lowering.set_default(param, value);
        }
    }
    let initializer = match initializer_attr(f)? {
        Some((kind, args, span)) => {
            let mut arguments = Vec::with_capacity(args.len());
            for a in &args {
                arguments.push(lowering.expr(a)?);
            }
            Some(lowering.initializer(kind, arguments, span)?)
        }
        None => None,
    };
    let block = lowering.body(&f.block)?;
    Ok(Body {
        owner: method,
        initializer,
        block,
        span: span_of(f.span()),
    })
}

/// Collects sources and lowers them together, so types may refer to each other across files.
#[derive(Default, Debug)]
pub struct ProgramBuilder {
    sources: Vec<(String, Option<Language>, String)>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        ProgramBuilder::default()
    }

    /// Adds a source; its language is guessed from the name.
    pub fn document(mut self, name: impl Into<String>, src: impl Into<String>) -> Self {
        self.sources.push((name.into(), None, src.into()));
        self
    }

    pub fn document_in(
        mut self,
        name: impl Into<String>,
        language: Language,
        src: impl Into<String>,
    ) -> Self {
        self.sources.push((name.into(), Some(language), src.into()));
        self
    }

    pub fn build(self) -> Result<Program> {
        let mut program = Program::new();
        let mut files = Vec::with_capacity(self.sources.len());
        for (name, language, src) in self.sources {
            let file = syn::parse_file(&src)?;
            let language = language.unwrap_or_else(|| Language::from_path(&name));
            let doc = program.add_document(Document::new(name, language));
            files.push((doc, file));
        }

        let mut structs = Vec::new();
        let mut impls = Vec::new();
        for (doc, file) in &files {
            for item in &file.items {
                match item {
                    syn::Item::Struct(s) => {
                        let ty = declare_type(&mut program.model, s, *doc)?;
                        structs.push((ty, s));
                    }
                    syn::Item::Impl(i) => impls.push((*doc, i)),
                    syn::Item::Use(_) => (),
                    other => return Err(unsupported("item", other.span())),
                }
            }
        }
        for (ty, s) in &structs {
            declare_base(&mut program.model, *ty, s)?;
        }
        for (ty, s) in &structs {
            declare_members(&mut program.model, *ty, s)?;
        }

        let mut methods = Vec::new();
        for (doc, imp) in &impls {
            let ty = impl_target(&program.model, imp)?;
            for item in &imp.items {
                match item {
                    syn::ImplItem::Fn(f) => {
                        let m = declare_method(&mut program.model, ty, f, *doc)?;
                        methods.push((*doc, ty, m, f));
                    }
                    other => return Err(unsupported("impl item", other.span())),
                }
            }
        }

        let mut ids = IdGen::new();
        for (doc, ty, m, f) in methods {
            let body = lower_method(&mut program.model, &mut ids, ty, m, f)?;
            program
                .document_mut(doc)
                .ok_or_else(|| Error::MissingNode(format!("document {}", doc.index())))?
                .bodies
                .push(body);
        }
        debug!(
            "built {} documents, {} bodies",
            program.documents.len(),
            program.documents.iter().map(|d| d.bodies.len()).sum::<usize>()
        );
        Ok(program)
    }
}

/// A single-document program.
pub fn parse_program(src: &str) -> Result<Program> {
    ProgramBuilder::new().document("Program.cs", src).build()
}
