//! Converting a class or struct to a positional record.

use log::{debug, trace};

use crate::classify::{self, MemberCandidate};
use crate::ctor::{self, Argument, ConstructorMatch, Disposition};
use crate::equality::{self, DefaultHashCodeAnalyzer, HashCodeAnalyzer};
use crate::ir::{Body, ConstructorInitializer, IdGen, InitializerKind, Operation};
use crate::rewrite::{self, CancellationToken, Program, ProgramEdit, ReferenceFinder};
use crate::symbols::{
    Accessibility, Accessor, AccessorKind, FieldSet, MethodKind, Model, SymbolId, Type, TypeKind,
};
use crate::Result;

/// One parameter of the record's positional parameter list.
#[derive(Clone, PartialEq, Debug)]
pub struct PositionalParameter {
    pub property: SymbolId,
    pub name: String,
    pub ty: Type,
    pub default: Option<Operation>,
    /// Passed through to the base record.
    pub inherited: bool,
    /// The property declaration stays, initialized from the parameter.
    pub retain_declaration: bool,
}

/// Everything a conversion changes, before it is applied.
#[derive(Clone, PartialEq, Debug)]
pub struct ConversionPlan {
    pub ty: SymbolId,
    pub name: String,
    pub accessibility: Accessibility,
    pub kind: TypeKind,
    pub base: Option<SymbolId>,
    /// The interface list after conversion; `IEquatable<Self>` goes with the typed `Equals`.
    pub interfaces: Vec<Type>,
    pub parameters: Vec<PositionalParameter>,
    /// Members deleted outright: promoted properties, redundant equality members, `Clone`, and
    /// the primary and copy constructors.
    pub removed_members: Vec<SymbolId>,
    pub constructors: Vec<(SymbolId, Disposition)>,
}

impl ConversionPlan {
    /// Properties kept as explicit declarations.
    pub fn retained(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.parameters
            .iter()
            .filter(|p| p.retain_declaration)
            .map(|p| p.property)
    }

    pub fn base_arguments(&self) -> impl Iterator<Item = &PositionalParameter> {
        self.parameters.iter().filter(|p| p.inherited)
    }

    pub fn removes(&self, member: SymbolId) -> bool {
        self.removed_members.contains(&member)
    }

    /// The symbol model after conversion.
    pub fn apply_to_model(&self, model: &Model) -> Model {
        let mut out = model.clone();
        if let Some(t) = out.type_symbol_mut(self.ty) {
            t.kind = self.kind;
            t.interfaces = self.interfaces.clone();
        }
        let setter = if self.kind.is_mutable_struct() {
            AccessorKind::Set
        } else {
            AccessorKind::Init
        };
        for p in &self.parameters {
            if !p.inherited {
                if let Some(prop) = out.property_mut(p.property) {
                    if p.retain_declaration {
                        prop.has_initializer = true;
                    } else {
                        prop.declared = false;
                        prop.accessibility = Accessibility::Public;
                        prop.getter = Some(Accessor::auto(AccessorKind::Get));
                        prop.setter = Some(Accessor::auto(setter));
                    }
                }
            }
            let param = out.add_primary_parameter(self.ty, p.property);
            if let Some(param) = out.parameter_mut(param) {
                param.default = p.default.clone();
            }
        }
        for &m in &self.removed_members {
            if out.property(m).is_none() {
                out.remove_member(self.ty, m);
            }
        }
        out
    }
}

/// Drives classification, constructor matching, equality recognition and call-site rewriting.
pub struct Converter<'p> {
    program: &'p Program,
    hash: &'p dyn HashCodeAnalyzer,
}

impl<'p> Converter<'p> {
    pub fn new(program: &'p Program) -> Self {
        Converter {
            program,
            hash: &DefaultHashCodeAnalyzer,
        }
    }

    pub fn with_hash_analyzer(self, hash: &'p dyn HashCodeAnalyzer) -> Self {
        Converter { hash, ..self }
    }

    /// What converting `ty` would do; `None` if it has nothing to convert.
    pub fn plan(&self, ty: SymbolId) -> Option<ConversionPlan> {
        let model = &self.program.model;
        let decl = model.type_symbol(ty)?;
        let candidates = classify::candidates(model, ty);
        if candidates.is_empty() {
            return None;
        }
        let matched = ctor::match_constructors(self.program, ty, &candidates);
        let mut removed_members = self.redundant_members(ty, &matched);
        removed_members.extend(
            matched
                .parameters
                .iter()
                .map(|p| &p.candidate)
                .filter(|c| !c.is_inherited() && !c.retain_declaration)
                .map(|c| c.symbol),
        );
        let parameters = matched
            .parameters
            .iter()
            .map(|p| positional(model, &p.candidate, p.default.clone()))
            .collect();
        let interfaces = remaining_interfaces(model, ty, &removed_members);
        let plan = ConversionPlan {
            ty,
            name: decl.name.clone(),
            accessibility: decl.accessibility,
            kind: decl.kind.as_record(),
            base: decl.base,
            interfaces,
            parameters,
            removed_members,
            constructors: matched.constructors,
        };
        debug!(
            "{}: {} positional, {} removed",
            plan.name,
            plan.parameters.len(),
            plan.removed_members.len()
        );
        Some(plan)
    }

    fn redundant_members(&self, ty: SymbolId, matched: &ConstructorMatch) -> Vec<SymbolId> {
        let model = &self.program.model;
        let expected = FieldSet::of_instance_fields(model, ty);
        let mut removed = Vec::new();
        let (mut eq, mut ne) = (Vec::new(), Vec::new());
        for (id, m) in model.methods(ty) {
            let body = self.program.body(id);
            match (m.kind, body) {
                (MethodKind::Constructor, _) => {
                    if matches!(matched.disposition(id), Some(Disposition::Primary | Disposition::Copy)) {
                        removed.push(id);
                    }
                }
                (MethodKind::Equality, Some(body)) => eq.push((id, body)),
                (MethodKind::Inequality, Some(body)) => ne.push((id, body)),
                (MethodKind::Ordinary, Some(body)) if !m.is_static => {
                    let redundant = match (m.name.as_str(), m.parameters.len()) {
                        ("Equals", 1) => {
                            equality::is_redundant_equals(model, ty, id, body, &expected)
                        }
                        ("GetHashCode", 0) => equality::is_redundant_get_hash_code(
                            model, ty, body, &expected, self.hash,
                        ),
                        // records synthesize a hidden clone method
                        ("Clone", 0) => true,
                        _ => false,
                    };
                    if redundant {
                        trace!("{}: redundant", m.name);
                        removed.push(id);
                    }
                }
                _ => (),
            }
        }
        if let ([(eq, eq_body)], [(ne, ne_body)]) = (&eq[..], &ne[..]) {
            if equality::is_redundant_eq_operator(model, *eq, eq_body)
                && equality::is_redundant_ne_operator(model, *ne, ne_body)
            {
                removed.push(*eq);
                removed.push(*ne);
            } else {
                trace!("operators kept");
            }
        }
        removed
    }

    /// Converts `ty`, rewriting its call sites first and then its declaration, as one edit.
    pub fn convert(
        &self,
        ty: SymbolId,
        finder: &dyn ReferenceFinder,
        cancel: &CancellationToken,
    ) -> Result<Option<(ConversionPlan, ProgramEdit)>> {
        let plan = match self.plan(ty) {
            Some(plan) => plan,
            None => return Ok(None),
        };
        let program = self.program;
        let mut ids = program.id_gen();
        let order: Vec<_> = plan.parameters.iter().map(|p| p.property).collect();
        let mut edit = rewrite::rewrite_initializers(program, ty, &order, finder, cancel, &mut ids)?;

        cancel.check()?;
        let model = plan.apply_to_model(&program.model);
        let primary_parameters = model
            .type_symbol(ty)
            .map(|t| t.primary_parameters.clone())
            .unwrap_or_default();
        let mut declaration = ProgramEdit::new();
        for &member in &plan.removed_members {
            if let Some(doc) = program.document_of(member) {
                declaration.remove(doc, member);
            }
        }
        for (ctor, disposition) in &plan.constructors {
            let (arguments, removed) = match disposition {
                Disposition::Forwarding {
                    arguments,
                    removed_statements,
                } => (arguments, removed_statements),
                _ => continue,
            };
            let (doc, current) = match (program.document_of(*ctor), edit.current_body(program, *ctor)) {
                (Some(doc), Some(body)) => (doc, body),
                _ => continue,
            };
            let arguments = arguments
                .iter()
                .zip(&plan.parameters)
                .map(|(arg, p)| materialize(arg, current, &p.ty, &mut ids))
                .collect();
            declaration.replace(
                doc,
                Body {
                    initializer: Some(ConstructorInitializer {
                        kind: InitializerKind::This,
                        target: None,
                        parameters: primary_parameters.clone(),
                        arguments,
                    }),
                    block: current.block.without(removed),
                    ..current.clone()
                },
            );
        }
        edit.extend(declaration);
        edit.model = Some(model);
        Ok(Some((plan, edit)))
    }
}

/// The interfaces of `ty`, without `IEquatable<T>` once the typed `Equals(T)` is removed.
fn remaining_interfaces(model: &Model, ty: SymbolId, removed: &[SymbolId]) -> Vec<Type> {
    let decl = match model.type_symbol(ty) {
        Some(decl) => decl,
        None => return Vec::new(),
    };
    let typed_equals_removed = removed.iter().any(|&m| {
        model.method(m).map_or(false, |s| s.name == "Equals")
            && matches!(&model.parameter_types(m)[..], [p] if p.is(ty))
    });
    let equatable = format!("IEquatable<{}>", decl.name);
    decl.interfaces
        .iter()
        .filter(|i| {
            let name = i.name.strip_prefix("System.").unwrap_or(&i.name);
            let drop = typed_equals_removed && name == equatable;
            if drop {
                trace!("{}: dropping {}", decl.name, i);
            }
            !drop
        })
        .cloned()
        .collect()
}

fn positional(model: &Model, c: &MemberCandidate, default: Option<Operation>) -> PositionalParameter {
    PositionalParameter {
        property: c.symbol,
        name: model.name(c.symbol).to_owned(),
        ty: model.value_type(c.symbol).cloned().unwrap_or_else(Type::object),
        default,
        inherited: c.is_inherited(),
        retain_declaration: c.retain_declaration,
    }
}

/// An argument as it now stands in `body`, which may have been rewritten since matching.
fn materialize(arg: &Argument, body: &Body, ty: &Type, ids: &mut IdGen) -> Operation {
    match arg {
        Argument::Value(op) => body.find(op.id).unwrap_or(op).clone(),
        Argument::Null => rewrite::fill_value(ids, &ty.clone().nullable()),
        Argument::Default => rewrite::fill_value(ids, &ty.clone().non_nullable()),
    }
}
