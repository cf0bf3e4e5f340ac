use crate::syntax::{GreenToken, LineCol, SyntaxKind, TextRange, TextSize, TokenFlags};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Index of a lexer mode. Mode 0 is the default mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(transparent))]
pub struct ModeId(u16);

impl ModeId {
    pub const DEFAULT: Self = Self(0);

    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: SyntaxKind,
    pub range: TextRange,
    pub start: LineCol,
    pub end: LineCol,
    /// Mode the token was lexed in
    pub mode: ModeId,
    /// Mode the lexer continues in after this token
    pub next_mode: ModeId,
    /// Bytes past the end of the token the lexer inspected
    pub lookahead: u32,
    pub flags: TokenFlags,
}

impl Token {
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.flags.contains(TokenFlags::ERROR)
    }

    /// True when the token text also matches the grammar's word token.
    #[must_use]
    pub const fn is_word(&self) -> bool {
        self.flags.contains(TokenFlags::WORD)
    }

    #[must_use]
    pub fn text<'s>(&self, source: &'s [u8]) -> &'s [u8] {
        source.get(self.range.as_range()).unwrap_or_default()
    }

    /// Leaf for the green tree.
    #[must_use]
    pub const fn to_green(&self) -> GreenToken {
        GreenToken::new(self.kind, self.range.len()).with_lex_state(
            self.mode,
            self.lookahead,
            self.flags,
        )
    }
}

/// Position of the lexer between two tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexerState {
    pub pos: usize,
    pub point: LineCol,
    pub mode: ModeId,
}

impl LexerState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pos: 0,
            point: LineCol::new(0, 0),
            mode: ModeId::DEFAULT,
        }
    }

    #[must_use]
    pub const fn at(pos: usize, point: LineCol, mode: ModeId) -> Self {
        Self { pos, point, mode }
    }

    /// State after `token`.
    #[must_use]
    pub fn after(token: &Token) -> Self {
        Self {
            pos: token.range.end().to_usize(),
            point: token.end,
            mode: token.next_mode,
        }
    }

    #[must_use]
    pub fn offset(&self) -> TextSize {
        TextSize::from_usize(self.pos)
    }
}
