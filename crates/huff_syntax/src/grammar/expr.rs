//! Grammar expressions
//!
//! Rules are written as [`Expr`] trees in the style of tree-sitter grammar
//! DSLs: sequences, ordered choices, repetitions, optional parts, fields and
//! precedence annotations over token and rule references.

use crate::lexer::Pattern;
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Associativity used to settle shift/reduce conflicts at equal precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Assoc {
    /// Prefer reducing
    Left,
    /// Prefer shifting
    Right,
    /// Neither; the conflict falls through to later rules
    None,
}

/// Static precedence attached to grammar steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Precedence {
    /// Declared level; `None` when no `prec` wrapper applies
    pub level: Option<i32>,
    pub assoc: Option<Assoc>,
}

impl Precedence {
    #[must_use]
    pub const fn level(level: i32) -> Self {
        Self {
            level: Some(level),
            assoc: None,
        }
    }

    #[must_use]
    pub const fn with_assoc(level: i32, assoc: Assoc) -> Self {
        Self {
            level: Some(level),
            assoc: Some(assoc),
        }
    }

    /// Level used for comparisons, undeclared counting as zero.
    #[must_use]
    pub const fn value(self) -> i32 {
        match self.level {
            Some(level) => level,
            None => 0,
        }
    }

    #[must_use]
    pub const fn is_declared(self) -> bool {
        self.level.is_some() || self.assoc.is_some()
    }
}

/// A grammar rule body
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Matches nothing
    Blank,
    /// A literal token such as `"#define"`
    String(CompactString),
    /// A reference to a rule or a named token
    Symbol(CompactString),
    /// An anonymous token given by a pattern
    Pattern(Pattern),
    Seq(Vec<Expr>),
    /// Ordered choice. Earlier alternatives get lower production ids.
    Choice(Vec<Expr>),
    Repeat(Box<Expr>),
    Repeat1(Box<Expr>),
    Optional(Box<Expr>),
    Field {
        name: CompactString,
        expr: Box<Expr>,
    },
    Prec {
        precedence: Precedence,
        expr: Box<Expr>,
    },
    PrecDynamic {
        value: i32,
        expr: Box<Expr>,
    },
}

impl Expr {
    #[must_use]
    pub const fn blank() -> Self {
        Self::Blank
    }

    #[must_use]
    pub fn string(text: &str) -> Self {
        Self::String(CompactString::new(text))
    }

    #[must_use]
    pub fn sym(name: &str) -> Self {
        Self::Symbol(CompactString::new(name))
    }

    #[must_use]
    pub const fn pattern(pattern: Pattern) -> Self {
        Self::Pattern(pattern)
    }

    #[must_use]
    pub fn seq(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Seq(items.into_iter().collect())
    }

    #[must_use]
    pub fn choice(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Choice(items.into_iter().collect())
    }

    /// Choice between literal strings.
    #[must_use]
    pub fn keywords<'a>(words: impl IntoIterator<Item = &'a str>) -> Self {
        Self::choice(words.into_iter().map(Self::string))
    }

    #[must_use]
    pub fn repeat(self) -> Self {
        Self::Repeat(Box::new(self))
    }

    #[must_use]
    pub fn repeat1(self) -> Self {
        Self::Repeat1(Box::new(self))
    }

    #[must_use]
    pub fn optional(self) -> Self {
        Self::Optional(Box::new(self))
    }

    #[must_use]
    pub fn field(name: &str, expr: Self) -> Self {
        Self::Field {
            name: CompactString::new(name),
            expr: Box::new(expr),
        }
    }

    #[must_use]
    pub fn prec(level: i32, expr: Self) -> Self {
        Self::Prec {
            precedence: Precedence::level(level),
            expr: Box::new(expr),
        }
    }

    #[must_use]
    pub fn prec_left(level: i32, expr: Self) -> Self {
        Self::Prec {
            precedence: Precedence::with_assoc(level, Assoc::Left),
            expr: Box::new(expr),
        }
    }

    #[must_use]
    pub fn prec_right(level: i32, expr: Self) -> Self {
        Self::Prec {
            precedence: Precedence::with_assoc(level, Assoc::Right),
            expr: Box::new(expr),
        }
    }

    #[must_use]
    pub fn prec_dynamic(value: i32, expr: Self) -> Self {
        Self::PrecDynamic {
            value,
            expr: Box::new(expr),
        }
    }

    /// One or more `rule`, separated by `separator`.
    #[must_use]
    pub fn sep1(rule: Self, separator: Self) -> Self {
        Self::seq([rule.clone(), Self::seq([separator, rule]).repeat()])
    }

    /// Zero or more `rule`, separated by `separator`.
    #[must_use]
    pub fn sep(rule: Self, separator: Self) -> Self {
        Self::sep1(rule, separator).optional()
    }

    /// Visit every symbol name and literal in the expression, in order.
    pub(crate) fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        match self {
            Self::Seq(items) | Self::Choice(items) => {
                for item in items {
                    item.walk(visit);
                }
            }
            Self::Repeat(inner) | Self::Repeat1(inner) | Self::Optional(inner) => inner.walk(visit),
            Self::Field { expr, .. } | Self::Prec { expr, .. } | Self::PrecDynamic { expr, .. } => {
                expr.walk(visit);
            }
            Self::Blank | Self::String(_) | Self::Symbol(_) | Self::Pattern(_) => {}
        }
    }
}

impl From<&str> for Expr {
    fn from(text: &str) -> Self {
        Self::string(text)
    }
}
