//! The symbol model: everything the matchers need to know about declarations.
//!
//! A host (or the `ast` front end) fills a [`Model`] with types and their members; operation
//! trees refer back into it by [`SymbolId`]. Symbols are never removed, so ids stay valid for
//! the lifetime of the model.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Display, Formatter};

use crate::ir::Operation;
use crate::rewrite::DocumentId;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for SymbolId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Declared accessibility, ordered from most to least restrictive.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Accessibility {
    /// No modifier written; members default to private.
    NotApplicable,
    Private,
    PrivateProtected,
    Protected,
    Internal,
    ProtectedInternal,
    Public,
}

impl Accessibility {
    /// Narrower than `internal`, i.e. not visible to an arbitrary caller in the same assembly.
    pub fn is_narrower_than_internal(self) -> bool {
        self < Accessibility::Internal
    }

    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Accessibility::NotApplicable => None,
            Accessibility::Private => Some("private"),
            Accessibility::PrivateProtected => Some("private protected"),
            Accessibility::Protected => Some("protected"),
            Accessibility::Internal => Some("internal"),
            Accessibility::ProtectedInternal => Some("protected internal"),
            Accessibility::Public => Some("public"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeKind {
    Class,
    Struct,
    ReadonlyStruct,
    Record,
    RecordStruct,
    ReadonlyRecordStruct,
}

impl TypeKind {
    pub fn is_record(self) -> bool {
        matches!(
            self,
            TypeKind::Record | TypeKind::RecordStruct | TypeKind::ReadonlyRecordStruct
        )
    }

    /// Structs whose positional members are generated as `{ get; set; }`.
    pub fn is_mutable_struct(self) -> bool {
        matches!(self, TypeKind::Struct | TypeKind::RecordStruct)
    }

    pub fn is_value_type(self) -> bool {
        !matches!(self, TypeKind::Class | TypeKind::Record)
    }

    /// The record flavour a type of this kind converts to.
    pub fn as_record(self) -> TypeKind {
        match self {
            TypeKind::Class | TypeKind::Record => TypeKind::Record,
            TypeKind::Struct | TypeKind::RecordStruct => TypeKind::RecordStruct,
            TypeKind::ReadonlyStruct | TypeKind::ReadonlyRecordStruct => {
                TypeKind::ReadonlyRecordStruct
            }
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Struct => "struct",
            TypeKind::ReadonlyStruct => "readonly struct",
            TypeKind::Record => "record",
            TypeKind::RecordStruct => "record struct",
            TypeKind::ReadonlyRecordStruct => "readonly record struct",
        }
    }
}

/// A resolved static type.
///
/// `symbol` is set for types declared in the model; builtins and external types only carry a
/// name. Nullability of reference types is an annotation and does not affect identity.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Type {
    pub name: String,
    pub symbol: Option<SymbolId>,
    pub nullable: bool,
    pub value_type: bool,
}

impl Type {
    pub fn named(name: impl Into<String>, symbol: Option<SymbolId>, value_type: bool) -> Self {
        Type {
            name: name.into(),
            symbol,
            nullable: false,
            value_type,
        }
    }

    pub fn int() -> Self {
        Type::named("int", None, true)
    }

    pub fn bool() -> Self {
        Type::named("bool", None, true)
    }

    pub fn string() -> Self {
        Type::named("string", None, false)
    }

    pub fn object() -> Self {
        Type::named("object", None, false)
    }

    pub fn void() -> Self {
        Type::named("void", None, true)
    }

    /// Type of the `null` literal.
    pub fn null() -> Self {
        Type::named("null", None, false).nullable()
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn non_nullable(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn is_object(&self) -> bool {
        self.symbol.is_none() && self.name == "object"
    }

    pub fn is_bool(&self) -> bool {
        self.symbol.is_none() && self.name == "bool" && !self.nullable
    }

    /// Whether this is (a possibly nullable reference to) the given declared type.
    pub fn is(&self, ty: SymbolId) -> bool {
        self.symbol == Some(ty)
    }

    /// Identity comparison: reference nullability is ignored, `int?` and `int` differ.
    pub fn same_as(&self, other: &Type) -> bool {
        self.name == other.name
            && self.symbol == other.symbol
            && (!self.value_type || self.nullable == other.nullable)
    }

    /// Canonical key for order-independent comparison of type lists.
    pub fn sort_key(&self) -> (&str, bool) {
        (&self.name, self.value_type && self.nullable)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AccessorKind {
    Get,
    Set,
    Init,
}

#[derive(Clone, Debug)]
pub struct Accessor {
    pub kind: AccessorKind,
    /// Explicit modifier on the accessor itself, e.g. `private set`.
    pub accessibility: Option<Accessibility>,
    /// Block or expression body; auto-accessors have neither.
    pub has_body: bool,
}

impl Accessor {
    pub fn auto(kind: AccessorKind) -> Self {
        Accessor {
            kind,
            accessibility: None,
            has_body: false,
        }
    }

    pub fn effective_accessibility(&self, property: Accessibility) -> Accessibility {
        self.accessibility.unwrap_or(property)
    }
}

#[derive(Clone, Debug)]
pub struct TypeSymbol {
    pub name: String,
    pub kind: TypeKind,
    pub accessibility: Accessibility,
    pub base: Option<SymbolId>,
    /// Implemented interfaces, e.g. `IEquatable<C>`, in base-list order.
    pub interfaces: Vec<Type>,
    pub is_partial: bool,
    /// Fields, properties and methods in declaration order.
    pub members: Vec<SymbolId>,
    /// Positional parameters of a record, in order.
    pub primary_parameters: Vec<SymbolId>,
    pub document: Option<DocumentId>,
}

impl TypeSymbol {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        TypeSymbol {
            name: name.into(),
            kind,
            accessibility: Accessibility::Public,
            base: None,
            interfaces: Vec::new(),
            is_partial: false,
            members: Vec::new(),
            primary_parameters: Vec::new(),
            document: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PropertySymbol {
    pub name: String,
    pub ty: Type,
    pub container: Option<SymbolId>,
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub getter: Option<Accessor>,
    pub setter: Option<Accessor>,
    /// `{ get; init; } = value;`
    pub has_initializer: bool,
    /// `int P => expr;`
    pub expression_body: bool,
    /// False for properties synthesized from a record's positional parameters.
    pub declared: bool,
    pub backing_field: Option<SymbolId>,
}

impl PropertySymbol {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        PropertySymbol {
            name: name.into(),
            ty,
            container: None,
            accessibility: Accessibility::Public,
            is_static: false,
            is_abstract: false,
            getter: Some(Accessor::auto(AccessorKind::Get)),
            setter: None,
            has_initializer: false,
            expression_body: false,
            declared: true,
            backing_field: None,
        }
    }

    pub fn accessors(&self) -> impl Iterator<Item = &Accessor> {
        self.getter.iter().chain(self.setter.iter())
    }

    /// Storage is compiler-generated: no accessor logic anywhere.
    pub fn is_auto(&self) -> bool {
        !self.is_abstract
            && !self.expression_body
            && self.getter.is_some()
            && self.accessors().all(|a| !a.has_body)
    }

    pub fn has_init_accessor(&self) -> bool {
        matches!(&self.setter, Some(a) if a.kind == AccessorKind::Init)
    }
}

#[derive(Clone, Debug)]
pub struct FieldSymbol {
    pub name: String,
    pub ty: Type,
    pub container: Option<SymbolId>,
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub is_const: bool,
    pub has_initializer: bool,
    /// Set for the backing field of an auto-property.
    pub associated_property: Option<SymbolId>,
}

impl FieldSymbol {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        FieldSymbol {
            name: name.into(),
            ty,
            container: None,
            accessibility: Accessibility::NotApplicable,
            is_static: false,
            is_const: false,
            has_initializer: false,
            associated_property: None,
        }
    }

    pub fn is_instance(&self) -> bool {
        !self.is_static && !self.is_const
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MethodKind {
    Constructor,
    Ordinary,
    /// `operator ==`
    Equality,
    /// `operator !=`
    Inequality,
}

#[derive(Clone, Debug)]
pub struct MethodSymbol {
    pub name: String,
    pub kind: MethodKind,
    pub container: Option<SymbolId>,
    pub parameters: Vec<SymbolId>,
    pub return_type: Type,
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub document: Option<DocumentId>,
}

impl MethodSymbol {
    pub fn new(name: impl Into<String>, kind: MethodKind, return_type: Type) -> Self {
        MethodSymbol {
            name: name.into(),
            kind,
            container: None,
            parameters: Vec::new(),
            return_type,
            accessibility: Accessibility::Public,
            is_static: false,
            document: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ParameterSymbol {
    pub name: String,
    pub ty: Type,
    pub ordinal: usize,
    pub owner: Option<SymbolId>,
    pub default: Option<Operation>,
    /// For a record's positional parameter, the property it becomes.
    pub promotes: Option<SymbolId>,
}

impl ParameterSymbol {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        ParameterSymbol {
            name: name.into(),
            ty,
            ordinal: 0,
            owner: None,
            default: None,
            promotes: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LocalSymbol {
    pub name: String,
    pub ty: Type,
    pub owner: Option<SymbolId>,
}

#[derive(Clone, Debug)]
pub enum Symbol {
    Type(TypeSymbol),
    Field(FieldSymbol),
    Property(PropertySymbol),
    Method(MethodSymbol),
    Parameter(ParameterSymbol),
    Local(LocalSymbol),
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Type(x) => &x.name,
            Symbol::Field(x) => &x.name,
            Symbol::Property(x) => &x.name,
            Symbol::Method(x) => &x.name,
            Symbol::Parameter(x) => &x.name,
            Symbol::Local(x) => &x.name,
        }
    }

    /// Static type of a value-carrying symbol.
    pub fn value_type(&self) -> Option<&Type> {
        match self {
            Symbol::Field(x) => Some(&x.ty),
            Symbol::Property(x) => Some(&x.ty),
            Symbol::Parameter(x) => Some(&x.ty),
            Symbol::Local(x) => Some(&x.ty),
            Symbol::Type(_) | Symbol::Method(_) => None,
        }
    }
}

#[derive(Clone, Default, Debug)]
pub struct Model {
    symbols: Vec<Symbol>,
    types: HashMap<String, SymbolId>,
}

macro_rules! accessor {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty) => {
        pub fn $get(&self, id: SymbolId) -> Option<&$ty> {
            match self.symbols.get(id.index()) {
                Some(Symbol::$variant(x)) => Some(x),
                _ => None,
            }
        }

        pub fn $get_mut(&mut self, id: SymbolId) -> Option<&mut $ty> {
            match self.symbols.get_mut(id.index()) {
                Some(Symbol::$variant(x)) => Some(x),
                _ => None,
            }
        }
    };
}

impl Model {
    pub fn new() -> Self {
        Model::default()
    }

    fn push(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn name(&self, id: SymbolId) -> &str {
        self.symbol(id).name()
    }

    accessor!(type_symbol, type_symbol_mut, Type, TypeSymbol);
    accessor!(property, property_mut, Property, PropertySymbol);
    accessor!(field, field_mut, Field, FieldSymbol);
    accessor!(method, method_mut, Method, MethodSymbol);
    accessor!(parameter, parameter_mut, Parameter, ParameterSymbol);
    accessor!(local, local_mut, Local, LocalSymbol);

    pub fn lookup_type(&self, name: &str) -> Option<SymbolId> {
        self.types.get(name).copied()
    }

    pub fn add_type(&mut self, ty: TypeSymbol) -> SymbolId {
        let name = ty.name.clone();
        let id = self.push(Symbol::Type(ty));
        self.types.insert(name, id);
        id
    }

    /// The `Type` referring to a declared type symbol.
    pub fn type_of_symbol(&self, ty: SymbolId) -> Type {
        match self.type_symbol(ty) {
            Some(decl) => Type::named(decl.name.clone(), Some(ty), decl.kind.is_value_type()),
            None => Type::named(self.name(ty), Some(ty), false),
        }
    }

    fn attach(&mut self, container: SymbolId, member: SymbolId) {
        if let Some(ty) = self.type_symbol_mut(container) {
            ty.members.push(member);
        }
    }

    /// Adds a property; auto-properties get a synthesized backing field.
    pub fn add_property(&mut self, container: SymbolId, mut property: PropertySymbol) -> SymbolId {
        property.container = Some(container);
        let is_auto = property.is_auto();
        let backing = FieldSymbol {
            name: format!("<{}>k__BackingField", property.name),
            ty: property.ty.clone(),
            container: Some(container),
            accessibility: Accessibility::Private,
            is_static: property.is_static,
            is_const: false,
            has_initializer: property.has_initializer,
            associated_property: None,
        };
        let id = self.push(Symbol::Property(property));
        self.attach(container, id);
        if is_auto {
            let field = self.push(Symbol::Field(FieldSymbol {
                associated_property: Some(id),
                ..backing
            }));
            self.attach(container, field);
            if let Some(p) = self.property_mut(id) {
                p.backing_field = Some(field);
            }
        }
        id
    }

    pub fn add_field(&mut self, container: SymbolId, mut field: FieldSymbol) -> SymbolId {
        field.container = Some(container);
        let id = self.push(Symbol::Field(field));
        self.attach(container, id);
        id
    }

    pub fn add_method(&mut self, container: SymbolId, mut method: MethodSymbol) -> SymbolId {
        method.container = Some(container);
        let id = self.push(Symbol::Method(method));
        self.attach(container, id);
        id
    }

    /// Adds a parameter to the end of a method's parameter list.
    pub fn add_parameter(&mut self, method: SymbolId, mut parameter: ParameterSymbol) -> SymbolId {
        parameter.owner = Some(method);
        parameter.ordinal = self.method(method).map_or(0, |m| m.parameters.len());
        let id = self.push(Symbol::Parameter(parameter));
        if let Some(m) = self.method_mut(method) {
            m.parameters.push(id);
        }
        id
    }

    /// Appends a positional parameter to a record, promoting `property`.
    pub fn add_primary_parameter(&mut self, ty: SymbolId, property: SymbolId) -> SymbolId {
        let (name, pty) = match self.property(property) {
            Some(p) => (p.name.clone(), p.ty.clone()),
            None => (self.name(property).to_owned(), Type::object()),
        };
        let ordinal = self
            .type_symbol(ty)
            .map_or(0, |t| t.primary_parameters.len());
        let id = self.push(Symbol::Parameter(ParameterSymbol {
            ordinal,
            owner: Some(ty),
            promotes: Some(property),
            ..ParameterSymbol::new(name, pty)
        }));
        if let Some(t) = self.type_symbol_mut(ty) {
            t.primary_parameters.push(id);
        }
        id
    }

    pub fn add_local(&mut self, local: LocalSymbol) -> SymbolId {
        self.push(Symbol::Local(local))
    }

    /// Detaches a member from its type. The symbol itself stays valid.
    pub fn remove_member(&mut self, ty: SymbolId, member: SymbolId) {
        if let Some(t) = self.type_symbol_mut(ty) {
            t.members.retain(|&m| m != member);
        }
    }

    pub fn members(&self, ty: SymbolId) -> &[SymbolId] {
        self.type_symbol(ty).map_or(&[], |t| &t.members[..])
    }

    pub fn properties(&self, ty: SymbolId) -> impl Iterator<Item = (SymbolId, &PropertySymbol)> {
        self.members(ty)
            .iter()
            .filter_map(move |&m| self.property(m).map(|p| (m, p)))
    }

    pub fn methods(&self, ty: SymbolId) -> impl Iterator<Item = (SymbolId, &MethodSymbol)> {
        self.members(ty)
            .iter()
            .filter_map(move |&m| self.method(m).map(|x| (m, x)))
    }

    pub fn constructors(&self, ty: SymbolId) -> Vec<SymbolId> {
        self.methods(ty)
            .filter(|(_, m)| m.kind == MethodKind::Constructor)
            .map(|(id, _)| id)
            .collect()
    }

    /// Every field that is part of an instance's state, backing fields included.
    pub fn instance_fields(&self, ty: SymbolId) -> Vec<SymbolId> {
        self.members(ty)
            .iter()
            .copied()
            .filter(|&m| matches!(self.field(m), Some(f) if f.is_instance()))
            .collect()
    }

    /// The field a member reads and writes: a property's backing field, or the field itself.
    pub fn storage_of(&self, member: SymbolId) -> SymbolId {
        match self.property(member) {
            Some(p) => p.backing_field.unwrap_or(member),
            None => member,
        }
    }

    /// `ty` followed by its base types.
    pub fn base_chain(&self, ty: SymbolId) -> Vec<SymbolId> {
        let mut chain = vec![ty];
        let mut cur = ty;
        while let Some(base) = self.type_symbol(cur).and_then(|t| t.base) {
            if chain.contains(&base) {
                break;
            }
            chain.push(base);
            cur = base;
        }
        chain
    }

    /// Finds a field or property by name, searching base types too.
    pub fn find_member(&self, ty: SymbolId, name: &str) -> Option<SymbolId> {
        self.base_chain(ty).into_iter().find_map(|t| {
            self.members(t).iter().copied().find(|&m| {
                matches!(self.symbol(m), Symbol::Field(_) | Symbol::Property(_))
                    && self.name(m) == name
            })
        })
    }

    pub fn find_method(&self, ty: SymbolId, name: &str, arity: usize) -> Option<SymbolId> {
        self.base_chain(ty).into_iter().find_map(|t| {
            self.methods(t)
                .find(|(_, m)| m.name == name && m.parameters.len() == arity)
                .map(|(id, _)| id)
        })
    }

    pub fn parameter_types(&self, method: SymbolId) -> Vec<Type> {
        self.method(method)
            .map(|m| {
                m.parameters
                    .iter()
                    .filter_map(|&p| self.parameter(p).map(|p| p.ty.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Static type of a field, property, parameter or local.
    pub fn value_type(&self, id: SymbolId) -> Option<&Type> {
        self.symbol(id).value_type()
    }
}

/// A set of storage locations, compared by identity.
///
/// Members are normalized through [`Model::storage_of`] on insertion, so an auto-property and
/// its backing field are the same element.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct FieldSet(BTreeSet<SymbolId>);

impl FieldSet {
    pub fn new() -> Self {
        FieldSet::default()
    }

    pub fn of_instance_fields(model: &Model, ty: SymbolId) -> Self {
        FieldSet(model.instance_fields(ty).into_iter().collect())
    }

    pub fn insert_member(&mut self, model: &Model, member: SymbolId) -> bool {
        self.0.insert(model.storage_of(member))
    }

    pub fn contains_member(&self, model: &Model, member: SymbolId) -> bool {
        self.0.contains(&model.storage_of(member))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.0.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(model: &mut Model) -> SymbolId {
        let ty = model.add_type(TypeSymbol::new("Point", TypeKind::Class));
        model.add_property(ty, PropertySymbol::new("X", Type::int()));
        model.add_field(ty, FieldSymbol::new("count", Type::int()));
        model.add_field(
            ty,
            FieldSymbol {
                is_const: true,
                ..FieldSymbol::new("Max", Type::int())
            },
        );
        ty
    }

    #[test]
    fn auto_property_storage_is_its_backing_field() {
        let mut model = Model::new();
        let ty = point(&mut model);
        let x = model.find_member(ty, "X").unwrap();
        let backing = model.property(x).unwrap().backing_field.unwrap();
        assert_eq!(model.storage_of(x), backing);
        assert_eq!(model.field(backing).unwrap().associated_property, Some(x));

        let mut set = FieldSet::new();
        set.insert_member(&model, x);
        assert!(!set.insert_member(&model, backing));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn instance_fields_skip_constants() {
        let mut model = Model::new();
        let ty = point(&mut model);
        let names: Vec<_> = model
            .instance_fields(ty)
            .into_iter()
            .map(|f| model.name(f).to_owned())
            .collect();
        assert_eq!(names, vec!["<X>k__BackingField", "count"]);
    }

    #[test]
    fn reference_nullability_does_not_affect_identity() {
        let c = Type::named("C", None, false);
        assert!(c.same_as(&c.clone().nullable()));
        assert!(!Type::int().same_as(&Type::int().nullable()));
        assert_eq!(Type::int().nullable().to_string(), "int?");
    }

    #[test]
    fn members_are_found_through_the_base_chain() {
        let mut model = Model::new();
        let base = point(&mut model);
        let derived = model.add_type(TypeSymbol {
            base: Some(base),
            ..TypeSymbol::new("Point3", TypeKind::Class)
        });
        model.add_property(derived, PropertySymbol::new("Z", Type::int()));
        assert!(model.find_member(derived, "X").is_some());
        assert!(model.find_member(derived, "Z").is_some());
        assert!(model.find_member(base, "Z").is_none());
        assert_eq!(model.base_chain(derived), vec![derived, base]);
    }
}
