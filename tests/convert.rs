mod common;

use common::*;
use recordize::ast::ProgramBuilder;
use recordize::ctor::Disposition;
use recordize::repr::Printer;
use recordize::rewrite::{BodyScan, Language};
use recordize::symbols::{AccessorKind, TypeKind};
use recordize::{CancellationToken, Converter, Error};

const POINT: &str = r#"
pub struct C {
    #[prop(get, set)]
    pub X: i32,
    #[prop(get, set)]
    pub Y: bool,
}

impl C {
    pub fn new(x: i32, y: bool) {
        X = x;
        Y = y;
    }

    pub fn Equals(&self, obj: Option<object>) -> bool {
        if let C(other) = obj { X == other.X && Y == other.Y } else { false }
    }

    pub fn GetHashCode(&self) -> i32 {
        HashCode::Combine(X, Y)
    }

    pub fn op_Equality(a: Option<C>, b: Option<C>) -> bool {
        a.Equals(b)
    }

    pub fn op_Inequality(a: Option<C>, b: Option<C>) -> bool {
        !(a == b)
    }
}

pub struct Use {}

impl Use {
    pub fn Make() -> C {
        C { Y: true, X: 1 }
    }

    pub fn Partial() -> C {
        C { X: 2 }
    }
}
"#;

#[test]
fn class_becomes_positional_record() {
    let program = program(POINT);
    let c = ty(&program, "C");
    let plan = Converter::new(&program).plan(c).unwrap();

    let printer = Printer::new(&program.model);
    assert_eq!(printer.record_header(&plan), "public record C(int X, bool Y)");

    let removed: Vec<_> = plan
        .removed_members
        .iter()
        .map(|&m| program.model.name(m).to_owned())
        .collect();
    assert_eq!(
        removed,
        vec![".ctor", "Equals", "GetHashCode", "op_Equality", "op_Inequality", "X", "Y"]
    );
    assert_eq!(plan.constructors, vec![(method(&program, c, ".ctor", 2), Disposition::Primary)]);
}

#[test]
fn conversion_rewrites_call_sites_and_declaration() {
    let program = program(POINT);
    let c = ty(&program, "C");
    let u = ty(&program, "Use");
    let (_, edit) = Converter::new(&program)
        .convert(c, &BodyScan, &CancellationToken::new())
        .unwrap()
        .unwrap();
    let converted = edit.apply(&program).unwrap();

    let printer = Printer::new(&converted.model);
    let make = body(&converted, method(&converted, u, "Make", 0));
    assert_eq!(printer.expression(returned(make)), "new C(1, true)");
    let partial = body(&converted, method(&converted, u, "Partial", 0));
    assert_eq!(printer.expression(returned(partial)), "new C(2, default)");

    assert!(converted.body(method(&program, c, "Equals", 1)).is_none());
    assert!(converted.body(method(&program, c, "GetHashCode", 0)).is_none());

    let model = &converted.model;
    let decl = model.type_symbol(c).unwrap();
    assert_eq!(decl.kind, TypeKind::Record);
    assert_eq!(decl.primary_parameters.len(), 2);
    assert!(model.constructors(c).is_empty());
    let x = model.property(member(&converted, c, "X")).unwrap();
    assert!(!x.declared);
    assert_eq!(x.setter.as_ref().map(|s| s.kind), Some(AccessorKind::Init));
}

#[test]
fn converting_twice_finds_nothing() {
    let program = program(POINT);
    let c = ty(&program, "C");
    let converter = Converter::new(&program);
    let plan = converter.plan(c).unwrap();
    let once = recordize::Program {
        model: plan.apply_to_model(&program.model),
        ..program.clone()
    };
    assert!(Converter::new(&once).plan(c).is_none());
}

#[test]
fn other_languages_are_left_alone() {
    init();
    let program = ProgramBuilder::new()
        .document(
            "C.cs",
            r#"
            pub struct C {
                #[prop(get, set)]
                pub X: i32,
                #[prop(get, set)]
                pub Y: bool,
            }
            "#,
        )
        .document_in(
            "Use.vb",
            Language::VisualBasic,
            r#"
            pub struct Use {}
            impl Use {
                pub fn Make() -> C { C { X: 1, Y: true } }
            }
            "#,
        )
        .build()
        .unwrap();
    let c = ty(&program, "C");
    let u = ty(&program, "Use");
    let (_, edit) = Converter::new(&program)
        .convert(c, &BodyScan, &CancellationToken::new())
        .unwrap()
        .unwrap();
    let converted = edit.apply(&program).unwrap();
    let printer = Printer::new(&converted.model);
    let make = body(&converted, method(&converted, u, "Make", 0));
    assert_eq!(printer.expression(returned(make)), "new C { X = 1, Y = true }");
}

#[test]
fn cancellation_discards_the_edit() {
    let program = program(POINT);
    let c = ty(&program, "C");
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = Converter::new(&program).convert(c, &BodyScan, &cancel);
    assert_eq!(result.unwrap_err(), Error::Cancelled);
}

#[test]
fn structs_become_record_structs() {
    let program = program(
        r#"
        #[kind = "struct"]
        pub struct P {
            #[prop(get, set)]
            pub X: i32,
        }
        "#,
    );
    let p = ty(&program, "P");
    let plan = Converter::new(&program).plan(p).unwrap();
    assert_eq!(Printer::new(&program.model).record_header(&plan), "public record struct P(int X)");
    let model = plan.apply_to_model(&program.model);
    let x = model.property(member(&program, p, "X")).unwrap();
    assert_eq!(x.setter.as_ref().map(|s| s.kind), Some(AccessorKind::Set));
}

#[test]
fn init_sibling_keeps_set_declarations() {
    let program = program(
        r#"
        pub struct C {
            #[prop(get, set)]
            pub X: i32,
            #[prop(get, init)]
            pub Y: i32,
        }
        "#,
    );
    let c = ty(&program, "C");
    let plan = Converter::new(&program).plan(c).unwrap();
    let x = member(&program, c, "X");
    let y = member(&program, c, "Y");
    assert_eq!(plan.retained().collect::<Vec<_>>(), vec![x]);
    assert!(plan.removes(y) && !plan.removes(x));

    let model = plan.apply_to_model(&program.model);
    let x = model.property(x).unwrap();
    assert!(x.declared && x.has_initializer);
}

#[test]
fn derived_class_passes_base_parameters_through() {
    let program = program(
        r#"
        #[kind = "record"]
        pub struct B {
            #[prop(get, init, positional)]
            pub A: i32,
        }

        #[base = "B"]
        pub struct C {
            #[prop(get, init)]
            pub X: i32,
        }

        impl C {
            #[base(a)]
            pub fn new(a: i32, x: i32) {
                X = x;
            }
        }
        "#,
    );
    let c = ty(&program, "C");
    let plan = Converter::new(&program).plan(c).unwrap();
    assert_eq!(
        Printer::new(&program.model).record_header(&plan),
        "public record C(int A, int X) : B(A)"
    );
    assert!(plan.parameters[0].inherited);
}

#[test]
fn primary_parameter_defaults_carry_over() {
    let program = program(
        r#"
        pub struct C {
            #[prop(get)]
            pub X: i32,
            #[prop(get)]
            pub Y: bool,
        }

        impl C {
            pub fn new(x: i32, #[default = false] y: bool) {
                X = x;
                Y = y;
            }
        }
        "#,
    );
    let c = ty(&program, "C");
    let plan = Converter::new(&program).plan(c).unwrap();
    assert_eq!(
        Printer::new(&program.model).record_header(&plan),
        "public record C(int X, bool Y = false)"
    );
}

#[test]
fn hidden_state_blocks_conversion_but_plain_bases_do_not() {
    let program = program(
        r#"
        pub struct Plain {
            #[prop(get, set)]
            pub X: i32,
        }

        #[base = "Plain"]
        pub struct Derived {
            #[prop(get, set)]
            pub Y: i32,
        }

        pub struct Hidden {
            #[prop(get, set)]
            Z: i32,
            count: i32,
        }
        "#,
    );
    let converter = Converter::new(&program);
    assert!(converter.plan(ty(&program, "Hidden")).is_none());
    assert!(converter.plan(ty(&program, "Plain")).is_some());
    assert!(converter.plan(ty(&program, "Derived")).is_some());
}

#[test]
fn plain_base_class_stays_in_the_header() {
    let program = program(
        r#"
        pub struct B {}

        #[base = "B"]
        pub struct C {
            #[prop(get, init)]
            pub P: i32,
        }
        "#,
    );
    let c = ty(&program, "C");
    let plan = Converter::new(&program).plan(c).unwrap();
    assert_eq!(
        Printer::new(&program.model).record_header(&plan),
        "public record C(int P) : B"
    );
    assert_eq!(plan.base_arguments().count(), 0);
}

const EQUATABLE: &str = r#"
#[implements(IEquatable<C>, IComparable)]
pub struct C {
    #[prop(get, init)]
    pub P: i32,
    #[prop(get, init)]
    pub B: bool,
}
"#;

#[test]
fn equatable_goes_with_the_typed_equals() {
    let program = program(&format!(
        "{}\nimpl C {{
            pub fn Equals(&self, other: Option<C>) -> bool {{
                return other != None && P == other.P && B == other.B;
            }}
        }}\n",
        EQUATABLE
    ));
    let c = ty(&program, "C");
    let plan = Converter::new(&program).plan(c).unwrap();
    assert!(plan.removes(method(&program, c, "Equals", 1)));
    assert_eq!(
        Printer::new(&program.model).record_header(&plan),
        "public record C(int P, bool B) : IComparable"
    );
    let model = plan.apply_to_model(&program.model);
    let names: Vec<_> = model.type_symbol(c).unwrap().interfaces.iter().map(|i| i.to_string()).collect();
    assert_eq!(names, vec!["IComparable"]);
}

#[test]
fn interfaces_without_a_removed_equals_are_kept() {
    let program = program(EQUATABLE);
    let c = ty(&program, "C");
    let plan = Converter::new(&program).plan(c).unwrap();
    assert_eq!(
        Printer::new(&program.model).record_header(&plan),
        "public record C(int P, bool B) : IEquatable<C>, IComparable"
    );
}
