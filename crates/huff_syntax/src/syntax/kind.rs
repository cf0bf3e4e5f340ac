#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a grammar symbol.
///
/// Terminals come first in the symbol table, starting with the two built-in
/// kinds [`SyntaxKind::END`] and [`SyntaxKind::ERROR`]; non-terminals follow.
/// The name and visibility of a kind are owned by the
/// [`Language`](crate::language::Language) that produced it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(transparent))]
pub struct SyntaxKind(u16);

impl SyntaxKind {
    /// End of input. Never appears in a tree.
    pub const END: Self = Self(0);
    /// Error nodes and unrecognized tokens.
    pub const ERROR: Self = Self(1);

    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 == Self::ERROR.0
    }
}

impl fmt::Debug for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::END => f.write_str("SyntaxKind(END)"),
            Self::ERROR => f.write_str("SyntaxKind(ERROR)"),
            Self(raw) => write!(f, "SyntaxKind({raw})"),
        }
    }
}

/// Identifier of a field name such as `name` or `body`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(transparent))]
pub struct FieldId(u16);

impl FieldId {
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_kinds() {
        assert_eq!(SyntaxKind::END.raw(), 0);
        assert!(SyntaxKind::ERROR.is_error());
        assert!(!SyntaxKind::from_raw(7).is_error());
    }

    #[test]
    fn test_kind_debug() {
        assert_eq!(format!("{:?}", SyntaxKind::ERROR), "SyntaxKind(ERROR)");
        assert_eq!(format!("{:?}", SyntaxKind::from_raw(12)), "SyntaxKind(12)");
    }
}
