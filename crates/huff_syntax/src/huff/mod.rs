//! # Huff
//!
//! The grammar of the Huff EVM assembly language and a process-wide
//! compiled instance of it.
//!
//! ```rust
//! use huff_syntax::huff;
//!
//! let tree = huff::parse(b"#define macro MAIN() = takes(0) returns(0) { 0x01 0x00 mstore }");
//! assert!(!tree.has_errors());
//! assert!(tree.to_sexp().starts_with("(source_file (declaration (macro name: (identifier)"));
//! ```

mod grammar;
mod opcodes;

pub use grammar::grammar;
pub use opcodes::{OPCODES, is_opcode};

use crate::error::GrammarError;
use crate::language::Language;
use crate::parser::Parser;
use crate::syntax::SyntaxTree;
use crate::table::TableConfig;
use once_cell::sync::Lazy;
use std::sync::Arc;

static LANGUAGE: Lazy<Result<Arc<Language>, GrammarError>> = Lazy::new(|| {
    let compiled = grammar()?.compile(&TableConfig::default())?;
    for warning in &compiled.warnings {
        tracing::warn!(%warning, "huff grammar");
    }
    Ok(Arc::new(compiled.language))
});

/// The compiled Huff language, built on first use.
///
/// # Errors
///
/// Returns the compilation error if the built-in grammar does not compile.
pub fn try_language() -> Result<Arc<Language>, &'static GrammarError> {
    LANGUAGE.as_ref().map(Arc::clone)
}

/// The compiled Huff language, built on first use.
///
/// # Panics
///
/// Panics if the built-in grammar does not compile, which the crate's tests
/// rule out.
#[must_use]
pub fn language() -> Arc<Language> {
    match try_language() {
        Ok(language) => language,
        Err(err) => panic!("the Huff grammar failed to compile: {err}"),
    }
}

/// A parser for Huff with the default configuration.
#[must_use]
pub fn parser() -> Parser {
    Parser::new(language())
}

/// Parse Huff source from scratch.
#[must_use]
pub fn parse(source: &[u8]) -> SyntaxTree {
    parser().parse(source, None, &[])
}
