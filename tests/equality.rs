mod common;

use common::*;
use recordize::equality::{self, DefaultHashCodeAnalyzer, HashCodeAnalyzer};
use recordize::symbols::FieldSet;
use recordize::Program;

const TYPE: &str = r#"
pub struct C {
    #[prop(get, set)]
    pub X: i32,
    #[prop(get, set)]
    pub Y: bool,
}
"#;

fn with_impl(methods: &str) -> Program {
    program(&format!("{}\nimpl C {{\n{}\n}}\n", TYPE, methods))
}

/// Whether the first `Equals` of the type compares exactly its instance fields.
fn equals_is_redundant(methods: &str) -> bool {
    let program = with_impl(methods);
    let c = ty(&program, "C");
    let m = method(&program, c, "Equals", 1);
    let expected = FieldSet::of_instance_fields(&program.model, c);
    equality::is_redundant_equals(&program.model, c, m, body(&program, m), &expected)
}

fn hash_is_redundant(methods: &str) -> bool {
    let program = with_impl(methods);
    let c = ty(&program, "C");
    let m = method(&program, c, "GetHashCode", 0);
    let expected = FieldSet::of_instance_fields(&program.model, c);
    equality::is_redundant_get_hash_code(
        &program.model,
        c,
        body(&program, m),
        &expected,
        &DefaultHashCodeAnalyzer,
    )
}

#[test]
fn typed_equals_with_null_check() {
    assert!(equals_is_redundant(
        "pub fn Equals(&self, other: Option<C>) -> bool {
            return other != None && X == other.X && Y == other.Y;
        }"
    ));
}

#[test]
fn early_return_on_null() {
    assert!(equals_is_redundant(
        "pub fn Equals(&self, other: Option<C>) -> bool {
            if other == None { return false; }
            X == other.X && self.Y == other.Y
        }"
    ));
}

#[test]
fn try_cast_binding() {
    assert!(equals_is_redundant(
        "pub fn Equals(&self, obj: Option<object>) -> bool {
            let other = obj as Option<C>;
            return other != None && X.Equals(other.X) && Y == other.Y;
        }"
    ));
}

#[test]
fn default_comparer_and_static_equals() {
    assert!(equals_is_redundant(
        "pub fn Equals(&self, obj: Option<object>) -> bool {
            return let C(other) = obj
                && EqualityComparer::<i32>::Default.Equals(X, other.X)
                && Equals(Y, other.Y);
        }"
    ));
}

#[test]
fn negated_disjunction() {
    assert!(equals_is_redundant(
        "pub fn Equals(&self, other: Option<C>) -> bool {
            return !(other == None || X != other.X || Y != other.Y);
        }"
    ));
}

fn compared_fields(methods: &str) -> Option<FieldSet> {
    let program = with_impl(methods);
    let c = ty(&program, "C");
    let m = method(&program, c, "Equals", 1);
    equality::equals_fields(&program.model, c, m, body(&program, m))
}

#[test]
fn comparison_order_does_not_matter() {
    let forward = "pub fn Equals(&self, other: Option<C>) -> bool {
        return other != None && X == other.X && Y == other.Y;
    }";
    let permuted = "pub fn Equals(&self, other: Option<C>) -> bool {
        return other.Y == Y && None != other && other.X == self.X;
    }";
    assert!(equals_is_redundant(forward));
    assert!(equals_is_redundant(permuted));
    let fields = compared_fields(forward).unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(compared_fields(permuted), Some(fields));
}

#[test]
fn explicit_cast_after_a_type_test() {
    assert!(equals_is_redundant(
        "pub fn Equals(&self, obj: Option<object>) -> bool {
            if let C(_) = obj {} else { return false; }
            let other = obj as C;
            return X == other.X && Y == other.Y;
        }"
    ));
    assert!(!equals_is_redundant(
        "pub fn Equals(&self, obj: Option<object>) -> bool {
            let other = obj as C;
            return X == other.X && Y == other.Y;
        }"
    ));
}

#[test]
fn chain_of_early_returns() {
    assert!(equals_is_redundant(
        "pub fn Equals(&self, other: Option<C>) -> bool {
            if other == None { return false; }
            if X != other.X { return false; }
            if Y != other.Y { return false; }
            return true;
        }"
    ));
    assert!(!equals_is_redundant(
        "pub fn Equals(&self, other: Option<C>) -> bool {
            if other == None { return false; }
            if X != other.X { return false; }
            return true;
        }"
    ));
}

#[test]
fn both_branches_failing_is_not_equality() {
    assert!(!equals_is_redundant(
        "pub fn Equals(&self, other: Option<C>) -> bool {
            if other == None { return false; } else { return false; }
        }"
    ));
    assert!(!equals_is_redundant(
        "pub fn Equals(&self, other: Option<C>) -> bool {
            if X == other.X { return false; } else { return false; }
            return Y == other.Y;
        }"
    ));
}

#[test]
fn object_equals_delegating_to_typed_overload() {
    let program = with_impl(
        "pub fn Equals(&self, obj: Option<object>) -> bool {
            Equals(obj as Option<C>)
        }
        pub fn Equals(&self, other: Option<C>) -> bool {
            return other != None && X == other.X && Y == other.Y;
        }",
    );
    let c = ty(&program, "C");
    let model = &program.model;
    let expected = FieldSet::of_instance_fields(model, c);
    let overloads: Vec<_> = model
        .methods(c)
        .filter(|(_, m)| m.name == "Equals")
        .map(|(id, _)| id)
        .collect();
    assert_eq!(overloads.len(), 2);
    assert!(equality::delegates_to_typed_equals(model, c, overloads[0], body(&program, overloads[0])));
    for m in overloads {
        assert!(equality::is_redundant_equals(model, c, m, body(&program, m), &expected));
    }
}

#[test]
fn partial_or_inverted_comparisons_are_kept() {
    assert!(!equals_is_redundant(
        "pub fn Equals(&self, other: Option<C>) -> bool {
            return other != None && X == other.X;
        }"
    ));
    assert!(!equals_is_redundant(
        "pub fn Equals(&self, other: Option<C>) -> bool {
            return other != None && X != other.X && Y == other.Y;
        }"
    ));
    assert!(!equals_is_redundant(
        "pub fn Equals(&self, other: Option<C>) -> bool {
            return other != None && X == other.X && Y == other.Y && X > 0;
        }"
    ));
    assert!(!equals_is_redundant(
        "pub fn Equals(&self, other: Option<C>) -> bool {
            return other != None && X == other.X && Y == Y;
        }"
    ));
}

#[test]
fn equals_fields_reports_what_was_compared() {
    let program = with_impl(
        "pub fn Equals(&self, other: Option<C>) -> bool {
            return other != None && Y == other.Y;
        }",
    );
    let c = ty(&program, "C");
    let m = method(&program, c, "Equals", 1);
    let fields = equality::equals_fields(&program.model, c, m, body(&program, m)).unwrap();
    assert_eq!(fields.len(), 1);
    assert!(fields.contains_member(&program.model, member(&program, c, "Y")));
}

#[test]
fn hash_code_shapes() {
    assert!(hash_is_redundant(
        "pub fn GetHashCode(&self) -> i32 { HashCode::Combine(X, Y) }"
    ));
    assert!(hash_is_redundant(
        "pub fn GetHashCode(&self) -> i32 { X.GetHashCode() ^ Y.GetHashCode() }"
    ));
    assert!(hash_is_redundant(
        "pub fn GetHashCode(&self) -> i32 {
            let mut hash = 339610899;
            hash = hash * -1521134295 + X.GetHashCode();
            hash = hash * -1521134295 + EqualityComparer::<bool>::Default.GetHashCode(Y);
            return hash;
        }"
    ));
    assert!(!hash_is_redundant(
        "pub fn GetHashCode(&self) -> i32 { HashCode::Combine(X) }"
    ));
    assert!(!hash_is_redundant(
        "pub fn GetHashCode(&self) -> i32 { HashCode::Combine(X, Y, 7) }"
    ));
}

#[test]
fn hash_analyzer_is_pluggable() {
    struct Nothing;
    impl HashCodeAnalyzer for Nothing {
        fn hashed_members(
            &self,
            _: &recordize::Model,
            _: recordize::SymbolId,
            _: &recordize::ir::Body,
        ) -> Option<Vec<recordize::SymbolId>> {
            None
        }
    }

    let program = with_impl(
        "pub fn new(x: i32, y: bool) { X = x; Y = y; }
        pub fn GetHashCode(&self) -> i32 { HashCode::Combine(X, Y) }",
    );
    let c = ty(&program, "C");
    let hash = method(&program, c, "GetHashCode", 0);
    let default = recordize::Converter::new(&program).plan(c).unwrap();
    assert!(default.removes(hash));
    let custom = recordize::Converter::new(&program)
        .with_hash_analyzer(&Nothing)
        .plan(c)
        .unwrap();
    assert!(!custom.removes(hash));
}

#[test]
fn operators() {
    let program = with_impl(
        "pub fn op_Equality(a: Option<C>, b: Option<C>) -> bool { a.Equals(b) }
        pub fn op_Inequality(a: Option<C>, b: Option<C>) -> bool { !a.Equals(b) }
        pub fn Equals(&self, obj: Option<object>) -> bool { false }",
    );
    let c = ty(&program, "C");
    let eq = method(&program, c, "op_Equality", 2);
    let ne = method(&program, c, "op_Inequality", 2);
    assert!(equality::is_redundant_eq_operator(&program.model, eq, body(&program, eq)));
    assert!(equality::is_redundant_ne_operator(&program.model, ne, body(&program, ne)));
    assert!(!equality::is_redundant_eq_operator(&program.model, ne, body(&program, ne)));

    let swapped = with_impl(
        "pub fn op_Inequality(a: Option<C>, b: Option<C>) -> bool { !(b == a) }
        pub fn op_Equality(a: Option<C>, b: Option<C>) -> bool { a.X == b.X }",
    );
    let c = ty(&swapped, "C");
    let eq = method(&swapped, c, "op_Equality", 2);
    let ne = method(&swapped, c, "op_Inequality", 2);
    assert!(equality::is_redundant_ne_operator(&swapped.model, ne, body(&swapped, ne)));
    assert!(!equality::is_redundant_eq_operator(&swapped.model, eq, body(&swapped, eq)));
}
