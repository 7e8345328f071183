//! Which properties become positional parameters.

use log::trace;

use crate::symbols::{Accessibility, AccessorKind, Model, PropertySymbol, SymbolId, TypeKind};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Classification {
    /// The generated property behaves exactly like the declared one.
    AlwaysConvert,
    /// Convert, but keep the declaration to preserve its accessibility or mutability.
    Override,
    /// A plain `set`; converts only if no property of the type is `init`.
    OverrideIfConvertingSetToInit,
    DoNotConvert,
}

/// A property that becomes a positional parameter.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MemberCandidate {
    pub symbol: SymbolId,
    /// `None` for a positional parameter inherited from a base record.
    pub original_declaration: Option<SymbolId>,
    /// Keep the declaration as `P { ... } = P;` after conversion.
    pub retain_declaration: bool,
}

impl MemberCandidate {
    pub fn is_inherited(&self) -> bool {
        self.original_declaration.is_none()
    }
}

/// Classifies a single property, independent of its siblings.
pub fn classify_property(kind: TypeKind, p: &PropertySymbol) -> Classification {
    use self::Classification::*;
    if p.has_initializer || p.expression_body || p.is_abstract || p.is_static {
        trace!("{}: initializer, expression body, abstract or static", p.name);
        return DoNotConvert;
    }
    if p.accessibility.is_narrower_than_internal() {
        trace!("{}: accessibility {:?}", p.name, p.accessibility);
        return DoNotConvert;
    }
    let getter = match &p.getter {
        Some(g) => g,
        None => {
            trace!("{}: no getter", p.name);
            return DoNotConvert;
        }
    };
    if p.accessors().any(|a| a.has_body) {
        trace!("{}: accessor with a body", p.name);
        return DoNotConvert;
    }
    let get_access = getter.effective_accessibility(p.accessibility);
    if get_access.is_narrower_than_internal() || get_access < p.accessibility {
        trace!("{}: getter accessibility {:?}", p.name, get_access);
        return DoNotConvert;
    }
    // generated members are public
    let narrowed = p.accessibility != Accessibility::Public;
    let setter = p
        .setter
        .as_ref()
        .map(|s| (s.kind, s.effective_accessibility(p.accessibility) != Accessibility::Public));
    if kind.is_mutable_struct() {
        return match setter {
            Some((AccessorKind::Set, false)) if !narrowed => AlwaysConvert,
            _ => Override,
        };
    }
    match setter {
        _ if narrowed => Override,
        None | Some((AccessorKind::Init, false)) => AlwaysConvert,
        Some((AccessorKind::Set, false)) => OverrideIfConvertingSetToInit,
        Some(_) => Override,
    }
}

/// Whether a plain `set` may silently become `init`: no property of the type is `init` already.
pub fn allow_set_to_init_conversion(model: &Model, ty: SymbolId) -> bool {
    !model.properties(ty).any(|(_, p)| p.has_init_accessor())
}

/// The positional members of `ty` once converted: inherited base-record parameters first, in
/// the base's order, then the eligible declared properties in declaration order.
///
/// Empty when there is nothing to convert.
pub fn candidates(model: &Model, ty: SymbolId) -> Vec<MemberCandidate> {
    let decl = match model.type_symbol(ty) {
        Some(decl) => decl,
        None => return Vec::new(),
    };
    if decl.is_partial || decl.kind.is_record() {
        trace!("{}: partial or already a record", decl.name);
        return Vec::new();
    }
    // only a positional base record contributes parameters; any other base is kept as is
    let base = decl
        .base
        .and_then(|b| model.type_symbol(b))
        .filter(|b| b.kind.is_record());

    let allow_set_to_init = allow_set_to_init_conversion(model, ty);
    let local: Vec<_> = model
        .properties(ty)
        .filter(|(_, p)| p.declared)
        .filter_map(|(id, p)| {
            let retain = match classify_property(decl.kind, p) {
                Classification::AlwaysConvert => false,
                Classification::Override => true,
                Classification::OverrideIfConvertingSetToInit => !allow_set_to_init,
                Classification::DoNotConvert => return None,
            };
            Some(MemberCandidate {
                symbol: id,
                original_declaration: Some(id),
                retain_declaration: retain,
            })
        })
        .collect();
    if local.is_empty() {
        trace!("{}: no convertible properties", decl.name);
        return Vec::new();
    }

    let inherited = base
        .into_iter()
        .flat_map(|b| b.primary_parameters.iter())
        .filter_map(|&p| model.parameter(p).and_then(|p| p.promotes))
        .map(|symbol| MemberCandidate {
            symbol,
            original_declaration: None,
            retain_declaration: false,
        });
    inherited.chain(local).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{Accessor, Type, TypeSymbol};

    fn prop(setter: Option<(AccessorKind, Option<Accessibility>)>) -> PropertySymbol {
        PropertySymbol {
            setter: setter.map(|(kind, accessibility)| Accessor {
                kind,
                accessibility,
                has_body: false,
            }),
            ..PropertySymbol::new("P", Type::int())
        }
    }

    #[test]
    fn classes_convert_get_only_and_init() {
        use self::Classification::*;
        let class = TypeKind::Class;
        assert_eq!(classify_property(class, &prop(None)), AlwaysConvert);
        let init = Some((AccessorKind::Init, None));
        assert_eq!(classify_property(class, &prop(init)), AlwaysConvert);
        let set = Some((AccessorKind::Set, None));
        assert_eq!(classify_property(class, &prop(set)), OverrideIfConvertingSetToInit);
        let private_set = Some((AccessorKind::Set, Some(Accessibility::Private)));
        assert_eq!(classify_property(class, &prop(private_set)), Override);
    }

    #[test]
    fn mutable_structs_want_a_public_setter() {
        use self::Classification::*;
        let s = TypeKind::Struct;
        assert_eq!(classify_property(s, &prop(Some((AccessorKind::Set, None)))), AlwaysConvert);
        assert_eq!(classify_property(s, &prop(Some((AccessorKind::Init, None)))), Override);
        assert_eq!(classify_property(s, &prop(None)), Override);
        let ro = TypeKind::ReadonlyStruct;
        assert_eq!(classify_property(ro, &prop(Some((AccessorKind::Init, None)))), AlwaysConvert);
    }

    #[test]
    fn logic_and_hidden_getters_are_rejected() {
        use self::Classification::*;
        let class = TypeKind::Class;
        let mut p = prop(None);
        p.has_initializer = true;
        assert_eq!(classify_property(class, &p), DoNotConvert);

        let mut p = prop(None);
        p.accessibility = Accessibility::Private;
        assert_eq!(classify_property(class, &p), DoNotConvert);

        let mut p = prop(Some((AccessorKind::Set, None)));
        p.getter = Some(Accessor {
            accessibility: Some(Accessibility::Private),
            ..Accessor::auto(AccessorKind::Get)
        });
        assert_eq!(classify_property(class, &p), DoNotConvert);

        let mut p = prop(Some((AccessorKind::Set, None)));
        p.setter.as_mut().unwrap().has_body = true;
        assert_eq!(classify_property(class, &p), DoNotConvert);

        let mut p = prop(None);
        p.accessibility = Accessibility::Internal;
        assert_eq!(classify_property(class, &p), Override);
    }

    #[test]
    fn sibling_init_keeps_setters_as_overrides() {
        let mut model = Model::new();
        let ty = model.add_type(TypeSymbol::new("C", TypeKind::Class));
        let p = model.add_property(ty, prop(Some((AccessorKind::Set, None))));
        let found = candidates(&model, ty);
        assert_eq!(found.len(), 1);
        assert!(!found[0].retain_declaration);

        let q = model.add_property(
            ty,
            PropertySymbol {
                name: "Q".into(),
                ..prop(Some((AccessorKind::Init, None)))
            },
        );
        let found = candidates(&model, ty);
        let retained: Vec<_> = found.iter().map(|c| (c.symbol, c.retain_declaration)).collect();
        assert_eq!(retained, vec![(p, true), (q, false)]);
    }

    #[test]
    fn partial_types_and_records_have_no_candidates() {
        let mut model = Model::new();
        let ty = model.add_type(TypeSymbol {
            is_partial: true,
            ..TypeSymbol::new("C", TypeKind::Class)
        });
        model.add_property(ty, prop(None));
        assert!(candidates(&model, ty).is_empty());

        let rec = model.add_type(TypeSymbol::new("R", TypeKind::Record));
        model.add_property(rec, prop(None));
        assert!(candidates(&model, rec).is_empty());
    }

    #[test]
    fn inherited_parameters_come_first() {
        let mut model = Model::new();
        let base = model.add_type(TypeSymbol::new("B", TypeKind::Record));
        for name in &["Foo", "Bar"] {
            let p = model.add_property(
                base,
                PropertySymbol {
                    name: name.to_string(),
                    declared: false,
                    ..prop(Some((AccessorKind::Init, None)))
                },
            );
            model.add_primary_parameter(base, p);
        }
        let ty = model.add_type(TypeSymbol {
            base: Some(base),
            ..TypeSymbol::new("C", TypeKind::Class)
        });
        model.add_property(ty, prop(None));
        let names: Vec<_> = candidates(&model, ty)
            .into_iter()
            .map(|c| (model.name(c.symbol).to_owned(), c.is_inherited()))
            .collect();
        assert_eq!(
            names,
            vec![("Foo".into(), true), ("Bar".into(), true), ("P".into(), false)]
        );
    }

    #[test]
    fn plain_base_class_contributes_no_parameters() {
        let mut model = Model::new();
        let base = model.add_type(TypeSymbol::new("B", TypeKind::Class));
        model.add_property(
            base,
            PropertySymbol {
                name: "Inherited".into(),
                ..prop(None)
            },
        );
        let ty = model.add_type(TypeSymbol {
            base: Some(base),
            ..TypeSymbol::new("C", TypeKind::Class)
        });
        let p = model.add_property(ty, prop(Some((AccessorKind::Init, None))));
        let found = candidates(&model, ty);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].symbol, p);
        assert!(!found[0].is_inherited());
    }
}
