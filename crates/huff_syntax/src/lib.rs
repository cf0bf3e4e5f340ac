//! # huff-syntax
//!
//! An incremental parser for the Huff EVM assembly language, built from a
//! grammar compiled to a deterministic LALR(1) table.
//!
//! ## Overview
//!
//! - **Lexing**: byte-oriented maximal-munch DFAs with lexer modes
//! - **Grammars as data**: a rule DSL compiled into a [`Language`], an
//!   immutable bundle of lexer automata and parse table that can be saved
//!   as an artifact and shared between threads
//! - **Conflict resolution**: precedence, associativity, dynamic precedence
//!   and declared conflict groups; anything else fails the build
//! - **Incremental parsing**: edits re-lex only the damaged region, and
//!   untouched subtrees of the previous tree are reused
//! - **Error recovery**: syntax errors become `ERROR` nodes, so every parse
//!   yields a tree covering the whole input
//!
//! ## Quick Start
//!
//! ```rust
//! use huff_syntax::huff;
//! use huff_syntax::incremental::InputEdit;
//!
//! let parser = huff::parser();
//! let source = b"#define constant OWNER = FREE_STORAGE_POINTER()\n";
//! let tree = parser.parse(source, None, &[]);
//! assert!(tree.errors().is_empty());
//!
//! // Rename the constant and reparse incrementally
//! let (edited, edit) = InputEdit::splice(source, 17..22, b"ADMIN");
//! let new_tree = parser.parse(&edited, Some(&tree), &[edit]);
//! assert_eq!(new_tree, parser.parse(&edited, None, &[]));
//! ```
//!
//! ## Modules
//!
//! - [`lexer`] - Patterns, DFAs and the mode-aware lexer
//! - [`grammar`] - Grammar DSL, validation and normalization
//! - [`table`] - LR(1)/LALR(1) table construction and conflict resolution
//! - [`language`] - Compiled languages and their artifact format
//! - [`parser`] - The LR driver, error recovery and subtree reuse
//! - [`incremental`] - Edits and token reuse
//! - [`syntax`] - Green and red trees, text ranges and queries
//! - [`huff`] - The Huff grammar
//! - [`error`] - Error types

pub mod error;
pub mod grammar;
pub mod huff;
pub mod incremental;
pub mod language;
pub mod lexer;
pub mod parser;
pub mod syntax;
pub mod table;

#[cfg(feature = "serialize")]
pub use error::ArtifactError;
pub use error::{GrammarError, LexError, SyntaxError, SyntaxErrorKind};
pub use grammar::{CompiledGrammar, Expr, Grammar, GrammarBuilder, TokenDef};
pub use incremental::InputEdit;
pub use language::Language;
pub use parser::{ParseStats, Parser, ParserConfig};
pub use syntax::{
    FieldId, GreenNode, GreenToken, SyntaxElement, SyntaxKind, SyntaxNode, SyntaxToken, SyntaxTree,
    TextRange, TextSize,
};
pub use table::{Action, ParseTable, TableConfig};
