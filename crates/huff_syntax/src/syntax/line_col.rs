//! Line and column positions
//!
//! Rows count `\n` bytes and columns count bytes from the last line start,
//! the same convention edit descriptors use for their points.

use crate::syntax::TextSize;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A zero-based row/column position in source text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct LineCol {
    /// Zero-based line number
    pub line: u32,
    /// Zero-based column number (in bytes)
    pub column: u32,
}

impl LineCol {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Position reached after walking over `bytes` from `self`.
    #[must_use]
    pub fn advance(self, bytes: &[u8]) -> Self {
        match memchr::memrchr(b'\n', bytes) {
            Some(last) => {
                let newlines = memchr::memchr_iter(b'\n', bytes).count();
                Self {
                    line: self
                        .line
                        .saturating_add(u32::try_from(newlines).unwrap_or(u32::MAX)),
                    column: u32::try_from(bytes.len() - last - 1).unwrap_or(u32::MAX),
                }
            }
            None => Self {
                line: self.line,
                column: self
                    .column
                    .saturating_add(u32::try_from(bytes.len()).unwrap_or(u32::MAX)),
            },
        }
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Line start table for converting byte offsets to [`LineCol`] positions
///
/// Lookups are a binary search over the cached line starts.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<TextSize>,
    text_len: TextSize,
}

impl LineIndex {
    /// Build the index by scanning `text` once for newlines.
    ///
    /// ```rust
    /// use huff_syntax::syntax::{LineIndex, TextSize};
    ///
    /// let index = LineIndex::new(b"#define macro\n  MAIN()");
    /// let pos = index.line_col(TextSize::from(16));
    /// assert_eq!((pos.line, pos.column), (1, 2));
    /// ```
    #[must_use]
    pub fn new(text: &[u8]) -> Self {
        let mut line_starts = vec![TextSize::zero()];
        line_starts.extend(
            memchr::memchr_iter(b'\n', text).map(|i| TextSize::from_usize(i.saturating_add(1))),
        );

        Self {
            line_starts,
            text_len: TextSize::of(text),
        }
    }

    /// Convert a byte offset to a line/column position.
    ///
    /// Offsets past the end of the text are clamped to the end.
    #[must_use]
    pub fn line_col(&self, offset: TextSize) -> LineCol {
        let offset = offset.min(self.text_len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };

        let line_start = self.line_starts[line];
        LineCol {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column: (offset - line_start).into(),
        }
    }

    /// Convert a line/column position back to a byte offset.
    ///
    /// Returns `None` when the line does not exist or the column runs past it.
    #[must_use]
    pub fn offset(&self, pos: LineCol) -> Option<TextSize> {
        let start = *self.line_starts.get(pos.line as usize)?;
        let next = self
            .line_starts
            .get(pos.line as usize + 1)
            .copied()
            .unwrap_or(self.text_len + TextSize::from(1));
        let offset = start + TextSize::from(pos.column);
        (offset < next).then_some(offset)
    }

    #[must_use]
    pub fn line_count(&self) -> u32 {
        u32::try_from(self.line_starts.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn line_start(&self, line: u32) -> Option<TextSize> {
        self.line_starts.get(line as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_lookup() {
        let index = LineIndex::new(b"line 1\nline 2\nline 3");

        assert_eq!(index.line_col(TextSize::from(0)), LineCol::new(0, 0));
        assert_eq!(index.line_col(TextSize::from(6)), LineCol::new(0, 6));
        assert_eq!(index.line_col(TextSize::from(7)), LineCol::new(1, 0));
        assert_eq!(index.line_col(TextSize::from(14)), LineCol::new(2, 0));
        assert_eq!(index.line_col(TextSize::from(99)), LineCol::new(2, 6));
    }

    #[test]
    fn test_line_col_crlf_counts_bytes() {
        let index = LineIndex::new(b"a\r\nb");
        assert_eq!(index.line_col(TextSize::from(1)), LineCol::new(0, 1));
        assert_eq!(index.line_col(TextSize::from(3)), LineCol::new(1, 0));
    }

    #[test]
    fn test_line_col_empty_text() {
        let index = LineIndex::new(b"");
        assert_eq!(index.line_col(TextSize::from(0)), LineCol::new(0, 0));
        assert_eq!(index.line_count(), 1);
    }

    #[test]
    fn test_offset_round_trip() {
        let index = LineIndex::new(b"ab\ncd\n");
        assert_eq!(index.offset(LineCol::new(1, 1)), Some(TextSize::from(4)));
        assert_eq!(index.offset(LineCol::new(2, 0)), Some(TextSize::from(6)));
        assert_eq!(index.offset(LineCol::new(0, 5)), None);
        assert_eq!(index.offset(LineCol::new(7, 0)), None);
    }

    #[test]
    fn test_advance() {
        let start = LineCol::new(2, 4);
        assert_eq!(start.advance(b"abc"), LineCol::new(2, 7));
        assert_eq!(start.advance(b"a\nbc\nd"), LineCol::new(4, 1));
        assert_eq!(start.advance(b"\n"), LineCol::new(3, 0));
    }

    #[test]
    fn test_line_start() {
        let index = LineIndex::new(b"line 1\nline 2");
        assert_eq!(index.line_start(1), Some(TextSize::from(7)));
        assert_eq!(index.line_start(2), None);
    }

    #[test]
    fn test_display_is_one_based() {
        assert_eq!(LineCol::new(0, 0).to_string(), "1:1");
    }
}
