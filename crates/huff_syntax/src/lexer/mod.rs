//! # Lexer
//!
//! Byte-oriented tokenization driven by DFAs.
//!
//! Rules are regular [`Pattern`]s grouped into modes. Each mode compiles to
//! one automaton, and a token may switch the lexer to another mode (block
//! comments use this so their body is a separate token class). Matching is
//! maximal munch with priority and declaration order as tie-breaks.
//!
//! The lexer never fails as a whole: a byte no rule accepts is reported as a
//! [`LexError`](crate::error::LexError) by [`Lexer::next_token`] and becomes
//! a one-byte error token in [`Lexer::tokenize`].
//!
//! ```rust
//! use huff_syntax::lexer::{CharSet, LexerBuilder, Pattern};
//! use huff_syntax::syntax::SyntaxKind;
//!
//! let number = SyntaxKind::from_raw(2);
//! let ws = SyntaxKind::from_raw(3);
//! let lexer = LexerBuilder::new()
//!     .token(number, Pattern::class(CharSet::digits()).repeat1())
//!     .token(ws, Pattern::class(CharSet::whitespace()).repeat1())
//!     .build()?;
//!
//! let tokens = lexer.tokenize(b"12 34");
//! assert_eq!(tokens.len(), 3);
//! # Ok::<(), huff_syntax::error::LexerBuildError>(())
//! ```

pub mod builder;
pub mod dfa;
pub mod pattern;
pub mod token;

pub use builder::{LexRule, Lexer, LexerBuilder};
pub use dfa::{Dfa, DfaMatch};
pub use pattern::{CharSet, Pattern};
pub use token::{LexerState, ModeId, Token};
