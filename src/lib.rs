//! Structural-equivalence analysis for converting hand-written classes and structs into
//! positional records.
//!
//! The analysis runs over a typed operation tree ([`ir`]) and a symbol model ([`symbols`]):
//!
//! - [`classify`] decides which properties become positional parameters;
//! - [`ctor`] finds the primary and copy constructors and turns the rest into forwarding ones;
//! - [`equality`] proves hand-written `Equals`, `GetHashCode` and operators redundant;
//! - [`rewrite`] turns `new C { P = v }` call sites into `new C(v)`.
//!
//! [`convert::Converter`] drives all four and produces a single atomic [`rewrite::ProgramEdit`].
//! With the `syn` feature (on by default) the [`ast`] module lowers a Rust-syntax encoding of
//! classes into a [`rewrite::Program`].

#[cfg(feature = "syn")]
pub mod ast;
pub mod classify;
pub mod convert;
pub mod ctor;
pub mod equality;
pub mod ir;
pub mod repr;
pub mod rewrite;
pub mod symbols;

pub use proc_macro2;

pub use crate::convert::{ConversionPlan, Converter};
pub use crate::ir::LineColumn;
pub use crate::rewrite::{CancellationToken, Program, ProgramEdit, ReferenceFinder};
pub use crate::symbols::{Model, SymbolId};

use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Source text is not valid syntax.
    Parse { message: String, at: LineColumn },
    /// A name that resolves to nothing in the model.
    Unresolved { name: String, at: LineColumn },
    /// Valid syntax with no meaning in the class encoding.
    Unsupported { what: String, at: LineColumn },
    /// An edit refers to a document, body or node that does not exist.
    MissingNode(String),
    Cancelled,
}

impl Error {
    pub fn location(&self) -> Option<LineColumn> {
        match self {
            Error::Parse { at, .. } | Error::Unresolved { at, .. } | Error::Unsupported { at, .. } => {
                Some(*at)
            }
            Error::MissingNode(_) | Error::Cancelled => None,
        }
    }

    /// The message followed by the offending source line and a caret under the column.
    pub fn annotate(&self, src: &str) -> String {
        let at = match self.location() {
            Some(at) if at.line > 0 => at,
            _ => return self.to_string(),
        };
        match src.lines().nth(at.line - 1) {
            Some(line) => format!("{}\n{}\n{:>width$}", self, line, "^", width = at.column + 1),
            None => self.to_string(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Error::Parse { message, at } => {
                write!(f, "{}:{}: parse error: {}", at.line, at.column, message)
            }
            Error::Unresolved { name, at } => {
                write!(f, "{}:{}: cannot resolve `{}`", at.line, at.column, name)
            }
            Error::Unsupported { what, at } => {
                write!(f, "{}:{}: unsupported {}", at.line, at.column, what)
            }
            Error::MissingNode(what) => write!(f, "edit target not found: {}", what),
            Error::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Formatting preferences for rendered source text.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Options {
    pub line_ending: LineEnding,
    /// Spaces per nesting level.
    pub indent: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            line_ending: LineEnding::Lf,
            indent: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_points_at_the_column() {
        let err = Error::Unresolved {
            name: "Bar".into(),
            at: LineColumn { line: 2, column: 4 },
        };
        let src = "struct C {\n    Bar: i32,\n}";
        assert_eq!(
            err.annotate(src),
            "2:4: cannot resolve `Bar`\n    Bar: i32,\n    ^"
        );
        assert_eq!(Error::Cancelled.annotate(src), "cancelled");
    }
}
