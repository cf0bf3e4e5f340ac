//! # Error Types
//!
//! Errors fall in two groups.
//!
//! - **Build time**: [`GrammarError`] (including [`GrammarConflictError`])
//!   and [`LexerBuildError`] are fatal. No table is produced from a grammar
//!   that fails to compile. [`UnreachableRuleWarning`] is reported alongside
//!   a successful build.
//! - **Parse time**: nothing is thrown. [`LexError`] is recovered inline as
//!   an error token, and unparseable spans become `ERROR` nodes which
//!   [`SyntaxTree::errors`](crate::syntax::SyntaxTree::errors) enumerates
//!   as [`SyntaxError`] values.
//!
//! With the `diagnostics` feature every error also implements
//! [`miette::Diagnostic`].

use crate::lexer::{LexerState, ModeId, Token};
use crate::syntax::{LineCol, SyntaxKind, TextRange, TextSize, TokenFlags};
use compact_str::CompactString;
use std::fmt;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// No lexer rule matched at `offset`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::lex::unrecognized)))]
#[error("unrecognized byte 0x{byte:02x} at {point}")]
pub struct LexError {
    pub offset: TextSize,
    pub byte: u8,
    pub point: LineCol,
    pub mode: ModeId,
    /// Bytes after the offending one that the lexer read before giving up
    pub lookahead: u32,
}

impl LexError {
    /// `examined_end` is one past the last byte the failed match looked
    /// at, or `input.len() + 1` when it peeked at end of input.
    #[must_use]
    pub fn new(state: &LexerState, byte: u8, examined_end: usize) -> Self {
        let lookahead = examined_end.saturating_sub(state.pos + 1);
        Self {
            offset: state.offset(),
            byte,
            point: state.point,
            mode: state.mode,
            lookahead: u32::try_from(lookahead).unwrap_or(u32::MAX),
        }
    }

    #[must_use]
    pub fn span(&self) -> TextRange {
        TextRange::at(self.offset, TextSize::from(1))
    }

    /// The one-byte error token that stands in for the unmatched byte.
    #[must_use]
    pub fn into_token(self) -> Token {
        Token {
            kind: SyntaxKind::ERROR,
            range: self.span(),
            start: self.point,
            end: self.point.advance(&[self.byte]),
            mode: self.mode,
            next_mode: self.mode,
            lookahead: self.lookahead,
            flags: TokenFlags::ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum LexerBuildError {
    #[error("token {kind:?} has a pattern that matches the empty string")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::lexer::empty_pattern)))]
    EmptyPattern { kind: SyntaxKind },

    #[error("token {kind:?} refers to undeclared lexer mode {mode}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::lexer::unknown_mode)))]
    UnknownMode { kind: SyntaxKind, mode: usize },
}

/// Grammar validation and compilation failures
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GrammarError {
    #[error("grammar has no rules")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::grammar::empty)))]
    Empty,

    #[error("start rule `{0}` is not defined")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::grammar::start)))]
    UndefinedStart(CompactString),

    #[error("start rule `{0}` must be visible (its name cannot begin with `_`)")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::grammar::start)))]
    HiddenStart(CompactString),

    #[error("rule `{rule}` refers to undefined symbol `{symbol}`")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::grammar::undefined_symbol)))]
    UndefinedSymbol {
        rule: CompactString,
        symbol: CompactString,
    },

    #[error("`{0}` is defined more than once")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::grammar::duplicate)))]
    Duplicate(CompactString),

    #[error("`{0}` is used as an extra or word token but is not a token")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::grammar::not_a_token)))]
    NotAToken(CompactString),

    #[error("token `{token}` refers to undeclared lexer mode `{mode}`")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::grammar::unknown_mode)))]
    UnknownMode {
        token: CompactString,
        mode: CompactString,
    },

    #[error("token `{0}` matches the empty string")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::grammar::empty_token)))]
    EmptyToken(CompactString),

    #[error("rule `{rule}` expands to more than {limit} alternatives")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::grammar::too_many_alternatives)))]
    TooManyAlternatives { rule: CompactString, limit: usize },

    #[error("grammar has more than {0} symbols")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::grammar::too_many_symbols)))]
    TooManySymbols(usize),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Lexer(#[from] LexerBuildError),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Conflict(#[from] GrammarConflictError),
}

/// One or more parse table conflicts that no precedence rule resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[cfg_attr(
    feature = "diagnostics",
    diagnostic(
        code(huff_syntax::grammar::conflict),
        help("add prec/prec_left/prec_right or list the rules in the grammar's conflicts")
    )
)]
#[error("{} unresolved conflict(s):\n{}", .conflicts.len(), DisplayReports(.conflicts))]
pub struct GrammarConflictError {
    pub conflicts: Vec<ConflictReport>,
}

struct DisplayReports<'a>(&'a [ConflictReport]);

impl fmt::Display for DisplayReports<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in self.0 {
            writeln!(f, "{report}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ShiftReduce => "shift/reduce",
            Self::ReduceReduce => "reduce/reduce",
        })
    }
}

/// An unresolved conflict in one state under one lookahead
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    pub state: u32,
    /// Name of the lookahead symbol, unquoted
    pub lookahead: CompactString,
    pub kind: ConflictKind,
    /// Competing items, rendered as `lhs → a • b`
    pub items: Vec<String>,
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  {} conflict in state {} on `{}`:",
            self.kind, self.state, self.lookahead
        )?;
        for item in &self.items {
            write!(f, "\n    {item}")?;
        }
        Ok(())
    }
}

/// A rule that can never be reached from the start rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreachableRuleWarning {
    pub rule: CompactString,
}

impl fmt::Display for UnreachableRuleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule `{}` is unreachable from the start rule", self.rule)
    }
}

/// A syntax error recorded in a tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[error("{kind}")]
pub struct SyntaxError {
    #[cfg_attr(feature = "diagnostics", label("here"))]
    pub range: TextRange,
    pub kind: SyntaxErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// Bytes the lexer could not match
    Unrecognized { text: String },
    /// A token the grammar does not allow here
    Unexpected {
        found: CompactString,
        expected: Vec<CompactString>,
    },
    /// Input ended before the construct was complete
    UnexpectedEof { expected: Vec<CompactString> },
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecognized { text } => write!(f, "unrecognized input `{text}`"),
            Self::Unexpected { found, expected } => {
                write!(f, "unexpected `{found}`")?;
                write_expected(f, expected)
            }
            Self::UnexpectedEof { expected } => {
                write!(f, "unexpected end of input")?;
                write_expected(f, expected)
            }
        }
    }
}

fn write_expected(f: &mut fmt::Formatter<'_>, expected: &[CompactString]) -> fmt::Result {
    const SHOWN: usize = 8;
    if expected.is_empty() {
        return Ok(());
    }
    write!(f, ", expected ")?;
    for (i, name) in expected.iter().take(SHOWN).enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "`{name}`")?;
    }
    if expected.len() > SHOWN {
        write!(f, " or {} more", expected.len() - SHOWN)?;
    }
    Ok(())
}

/// Failure to load a serialized language
#[cfg(feature = "serialize")]
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum ArtifactError {
    #[error("malformed language artifact: {0}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::artifact::malformed)))]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported artifact format version {found} (expected {expected})")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(huff_syntax::artifact::version)))]
    UnsupportedVersion { found: u32, expected: u32 },
}
