//! dalkey-lexer: single-pass ES module syntax scanner
//!
//! Extracts import/export declarations from JavaScript source without
//! building an AST. One forward pass over the bytes with explicit stacks
//! for the two context-sensitive spots in the grammar:
//!
//! 1. **Regex vs division** — a `/` starts a regular expression only in
//!    expression position, decided from the last significant token plus
//!    a record of what preceded each still-open `(`/`{`.
//! 2. **Template substitutions** — `${ ... }` can nest arbitrary
//!    statements (including further templates), so a closing `}` resumes
//!    template scanning only when it matches the opener that suspended it.
//!
//! The scanner performs no semantic validation and never panics; input it
//! cannot lex comes back as an [`AnalyzeError`] value.

mod scanner;

pub use scanner::{
    analyze, AnalyzeError, AnalyzeErrorKind, ImportKind, ImportRecord, ModuleAnalysis,
};
