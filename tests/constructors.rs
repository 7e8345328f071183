mod common;

use common::*;
use recordize::classify;
use recordize::ctor::{self, Argument, Disposition};
use recordize::repr::Printer;
use recordize::rewrite::BodyScan;
use recordize::{CancellationToken, Converter, Program, SymbolId};

fn dispositions(program: &Program, ty: SymbolId) -> Vec<(usize, Disposition)> {
    let candidates = classify::candidates(&program.model, ty);
    ctor::match_constructors(program, ty, &candidates)
        .constructors
        .into_iter()
        .map(|(c, d)| (program.model.method(c).unwrap().parameters.len(), d))
        .collect()
}

const SHAPES: &str = r#"
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

    pub fn new(other: C) {
        X = other.X;
        Y = other.Y;
    }

    pub fn new(x: i32) {
        X = x;
        Y = true;
    }

    pub fn new() {
        let y = X > 0;
        Y = y;
    }
}
"#;

#[test]
fn constructor_shapes() {
    let program = program(SHAPES);
    let c = ty(&program, "C");
    let found = dispositions(&program, c);
    assert_eq!(found[0], (2, Disposition::Primary));
    assert_eq!(found[1], (1, Disposition::Copy));
    match &found[2] {
        (1, Disposition::Forwarding { arguments, removed_statements }) => {
            assert!(matches!(arguments[..], [Argument::Value(_), Argument::Value(_)]));
            assert_eq!(removed_statements.len(), 2);
        }
        other => panic!("{:?}", other),
    }
    match &found[3] {
        (0, Disposition::Forwarding { arguments, removed_statements }) => {
            assert_eq!(arguments[..], [Argument::Default, Argument::Default]);
            assert!(removed_statements.is_empty());
        }
        other => panic!("{:?}", other),
    }
}

#[test]
fn forwarding_constructors_chain_to_the_primary() {
    let program = program(SHAPES);
    let c = ty(&program, "C");
    let (_, edit) = Converter::new(&program)
        .convert(c, &BodyScan, &CancellationToken::new())
        .unwrap()
        .unwrap();
    let converted = edit.apply(&program).unwrap();
    let printer = Printer::new(&converted.model);

    let ctors = program.model.constructors(c);
    assert!(converted.body(ctors[0]).is_none());
    assert!(converted.body(ctors[1]).is_none());

    let one = body(&converted, ctors[2]);
    assert_eq!(printer.constructor(ctors[2], one), "public C(int x) : this(x, true)\n{ }");

    let none = body(&converted, ctors[3]);
    assert_eq!(
        printer.constructor(ctors[3], none),
        "public C() : this(default, default)\n{\n    var y = X > 0;\n    Y = y;\n}"
    );
}

#[test]
fn nullable_parameters_default_to_null() {
    let program = program(
        r#"
        pub struct C {
            #[prop(get)]
            pub Name: Option<String>,
            #[prop(get)]
            pub Count: i32,
        }

        impl C {
            pub fn new(name: Option<String>, count: i32) {
                Name = name;
                Count = count;
            }

            pub fn new(count: i32) {
                Count = count;
            }
        }
        "#,
    );
    let c = ty(&program, "C");
    match &dispositions(&program, c)[1] {
        (1, Disposition::Forwarding { arguments, .. }) => {
            assert_eq!(arguments[0], Argument::Null);
            assert!(matches!(arguments[1], Argument::Value(_)));
        }
        other => panic!("{:?}", other),
    }
}

#[test]
fn chained_and_signature_clashing_constructors_are_untouched() {
    let program = program(
        r#"
        pub struct C {
            #[prop(get)]
            pub X: i32,
            #[prop(get)]
            pub Y: i32,
        }

        impl C {
            pub fn new(y: i32, x: i32) {
                Y = y;
                X = x;
            }

            pub fn new(x: i32, y: i32, z: i32) {
                X = x + z;
                Y = y;
            }

            #[this(0, 0, 0)]
            pub fn new(s: String) {}
        }
        "#,
    );
    let c = ty(&program, "C");
    let found = dispositions(&program, c);
    assert_eq!(found[0], (2, Disposition::Primary));
    assert!(matches!(found[1], (3, Disposition::Forwarding { .. })));
    assert_eq!(found[2], (1, Disposition::Untouched));

    let candidates = classify::candidates(&program.model, c);
    let matched = ctor::match_constructors(&program, c, &candidates);
    let order: Vec<_> = matched
        .order()
        .into_iter()
        .map(|m| program.model.name(m).to_owned())
        .collect();
    assert_eq!(order, vec!["Y", "X"]);
}

#[test]
fn assignments_from_instance_state_stay_in_the_body() {
    let program = program(
        r#"
        pub struct C {
            #[prop(get)]
            pub X: i32,
            #[prop(get)]
            pub Y: i32,
            seed: i32,
        }

        impl C {
            pub fn new(x: i32, y: i32) {
                X = x;
                Y = y;
            }

            pub fn new(x: i32, flag: bool) {
                X = x;
                Y = self.seed;
            }
        }
        "#,
    );
    let c = ty(&program, "C");
    match &dispositions(&program, c)[1] {
        (2, Disposition::Forwarding { arguments, removed_statements }) => {
            assert!(matches!(arguments[0], Argument::Value(_)));
            assert_eq!(arguments[1], Argument::Default);
            assert_eq!(removed_statements.len(), 1);
        }
        other => panic!("{:?}", other),
    }
}
