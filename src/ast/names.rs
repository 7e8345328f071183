//! Names of syntax the encoding does not support, for error messages.

use crate::ir::names::Discrim;

impl Discrim for syn::Expr {
    fn discrim(&self) -> &'static str {
        use syn::Expr::*;
        match self {
            Array(..) => "array expression",
            Assign(..) => "assignment",
            Async(..) => "async block",
            Await(..) => "await",
            Binary(..) => "binary expression",
            Block(..) => "block",
            Break(..) => "break",
            Call(..) => "call",
            Cast(..) => "cast",
            Closure(..) => "closure",
            Const(..) => "const block",
            Continue(..) => "continue",
            Field(..) => "field access",
            ForLoop(..) => "for loop",
            Group(..) => "group",
            If(..) => "if",
            Index(..) => "index expression",
            Infer(..) => "`_` expression",
            Let(..) => "let expression",
            Lit(..) => "literal",
            Loop(..) => "loop",
            Macro(..) => "macro",
            Match(..) => "match",
            MethodCall(..) => "method call",
            Paren(..) => "parenthesized expression",
            Path(..) => "path",
            Range(..) => "range",
            Reference(..) => "reference",
            Repeat(..) => "array repeat",
            Return(..) => "return",
            Struct(..) => "struct literal",
            Try(..) => "`?` expression",
            TryBlock(..) => "try block",
            Tuple(..) => "tuple",
            Unary(..) => "unary expression",
            Unsafe(..) => "unsafe block",
            While(..) => "while loop",
            Yield(..) => "yield",
            _ => "expression",
        }
    }
}

impl Discrim for syn::Stmt {
    fn discrim(&self) -> &'static str {
        use syn::Stmt::*;
        match self {
            Local(..) => "let statement",
            Item(..) => "item",
            Expr(..) => "expression statement",
            Macro(..) => "macro statement",
            #[allow(unreachable_patterns)]
            _ => "statement",
        }
    }
}

impl Discrim for syn::Pat {
    fn discrim(&self) -> &'static str {
        use syn::Pat::*;
        match self {
            Const(..) => "const pattern",
            Ident(..) => "binding pattern",
            Lit(..) => "literal pattern",
            Macro(..) => "macro pattern",
            Or(..) => "or-pattern",
            Paren(..) => "parenthesized pattern",
            Path(..) => "path pattern",
            Range(..) => "range pattern",
            Reference(..) => "reference pattern",
            Rest(..) => "rest pattern",
            Slice(..) => "slice pattern",
            Struct(..) => "struct pattern",
            Tuple(..) => "tuple pattern",
            TupleStruct(..) => "tuple struct pattern",
            Type(..) => "typed pattern",
            Wild(..) => "wildcard pattern",
            _ => "pattern",
        }
    }
}
