//! Regular patterns over bytes
//!
//! Patterns are plain data. They are compiled to automata by
//! [`dfa`](super::dfa) when a [`Lexer`](super::Lexer) is built.

use compact_str::CompactString;

/// A set of bytes, stored as sorted, non-overlapping inclusive ranges
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharSet {
    ranges: Vec<(u8, u8)>,
}

impl CharSet {
    #[must_use]
    pub fn new(ranges: impl IntoIterator<Item = (u8, u8)>) -> Self {
        let mut set = Self {
            ranges: ranges.into_iter().filter(|(lo, hi)| lo <= hi).collect(),
        };
        set.normalize();
        set
    }

    #[must_use]
    pub fn single(byte: u8) -> Self {
        Self::new([(byte, byte)])
    }

    /// Bytes listed in `chars`, which must be ASCII.
    #[must_use]
    pub fn of(chars: &str) -> Self {
        Self::new(chars.bytes().map(|b| (b, b)))
    }

    #[must_use]
    pub fn range(lo: char, hi: char) -> Self {
        Self::new([(ascii(lo), ascii(hi))])
    }

    #[must_use]
    pub fn digits() -> Self {
        Self::range('0', '9')
    }

    #[must_use]
    pub fn hex_digits() -> Self {
        Self::new([(b'0', b'9'), (b'a', b'f'), (b'A', b'F')])
    }

    #[must_use]
    pub fn alphabetic() -> Self {
        Self::new([(b'a', b'z'), (b'A', b'Z')])
    }

    #[must_use]
    pub fn alphanumeric() -> Self {
        Self::alphabetic().union(&Self::digits())
    }

    #[must_use]
    pub fn whitespace() -> Self {
        Self::of(" \t\r\n\x0c")
    }

    /// Every byte except `\n`.
    #[must_use]
    pub fn not_newline() -> Self {
        Self::single(b'\n').negate()
    }

    #[must_use]
    pub fn any() -> Self {
        Self::new([(0, u8::MAX)])
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.ranges.iter().chain(&other.ranges).copied())
    }

    #[must_use]
    pub fn negate(&self) -> Self {
        let mut ranges = Vec::new();
        let mut next: u16 = 0;
        for &(lo, hi) in &self.ranges {
            if u16::from(lo) > next {
                ranges.push((narrow(next), lo - 1));
            }
            next = u16::from(hi) + 1;
        }
        if next <= u16::from(u8::MAX) {
            ranges.push((narrow(next), u8::MAX));
        }
        Self { ranges }
    }

    #[must_use]
    pub fn contains(&self, byte: u8) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if byte < lo {
                    std::cmp::Ordering::Greater
                } else if byte > hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    #[must_use]
    pub fn ranges(&self) -> &[(u8, u8)] {
        &self.ranges
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    fn normalize(&mut self) {
        self.ranges.sort_unstable();
        let mut merged: Vec<(u8, u8)> = Vec::with_capacity(self.ranges.len());
        for &(lo, hi) in &self.ranges {
            match merged.last_mut() {
                Some(last) if u16::from(lo) <= u16::from(last.1) + 1 => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }
        self.ranges = merged;
    }
}

fn ascii(c: char) -> u8 {
    u8::try_from(u32::from(c)).unwrap_or(u8::MAX)
}

fn narrow(value: u16) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

/// A regular pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// An exact byte string
    Literal(CompactString),
    /// One byte from a set
    Class(CharSet),
    Seq(Vec<Pattern>),
    Alt(Vec<Pattern>),
    Repeat {
        pattern: Box<Pattern>,
        min: u32,
        max: Option<u32>,
    },
}

impl Pattern {
    #[must_use]
    pub fn literal(text: &str) -> Self {
        Self::Literal(CompactString::new(text))
    }

    #[must_use]
    pub fn class(set: CharSet) -> Self {
        Self::Class(set)
    }

    #[must_use]
    pub fn seq(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Seq(items.into_iter().collect())
    }

    #[must_use]
    pub fn alt(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Alt(items.into_iter().collect())
    }

    /// Zero or more repetitions.
    #[must_use]
    pub fn repeat(self) -> Self {
        self.times(0, None)
    }

    /// One or more repetitions.
    #[must_use]
    pub fn repeat1(self) -> Self {
        self.times(1, None)
    }

    #[must_use]
    pub fn optional(self) -> Self {
        self.times(0, Some(1))
    }

    #[must_use]
    pub fn times(self, min: u32, max: Option<u32>) -> Self {
        Self::Repeat {
            pattern: Box::new(self),
            min,
            max,
        }
    }

    /// Alternation of the given literal words.
    #[must_use]
    pub fn words<'a>(words: impl IntoIterator<Item = &'a str>) -> Self {
        Self::alt(words.into_iter().map(Self::literal))
    }

    /// True if the pattern accepts the empty string.
    #[must_use]
    pub fn matches_empty(&self) -> bool {
        match self {
            Self::Literal(text) => text.is_empty(),
            Self::Class(_) => false,
            Self::Seq(items) => items.iter().all(Self::matches_empty),
            Self::Alt(items) => items.iter().any(Self::matches_empty),
            Self::Repeat { pattern, min, .. } => *min == 0 || pattern.matches_empty(),
        }
    }

    /// The literal text when the pattern is a plain byte string.
    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(text) => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_merges_ranges() {
        let set = CharSet::new([(b'a', b'c'), (b'd', b'f'), (b'x', b'x'), (b'b', b'e')]);
        assert_eq!(set.ranges(), &[(b'a', b'f'), (b'x', b'x')]);
    }

    #[test]
    fn test_charset_negate() {
        let set = CharSet::single(b'*').negate();
        assert!(set.contains(b'a'));
        assert!(set.contains(0));
        assert!(set.contains(0xff));
        assert!(!set.contains(b'*'));
        assert_eq!(set.negate(), CharSet::single(b'*'));
    }

    #[test]
    fn test_charset_negate_full_range() {
        assert!(CharSet::any().negate().is_empty());
        assert_eq!(CharSet::new([]).negate(), CharSet::any());
    }

    #[test]
    fn test_hex_digits() {
        let set = CharSet::hex_digits();
        assert!(set.contains(b'F'));
        assert!(set.contains(b'0'));
        assert!(!set.contains(b'g'));
    }

    #[test]
    fn test_matches_empty() {
        assert!(Pattern::literal("a").repeat().matches_empty());
        assert!(!Pattern::literal("a").repeat1().matches_empty());
        assert!(Pattern::seq([Pattern::literal("a").optional()]).matches_empty());
        assert!(!Pattern::alt([Pattern::class(CharSet::digits())]).matches_empty());
    }
}
