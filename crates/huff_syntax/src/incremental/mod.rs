//! # Incremental Parsing
//!
//! Reparsing after an edit reuses as much of the previous tree as is safe.
//!
//! 1. [`apply_edits`] moves the leaves of the old tree to their positions in
//!    the new source and marks every leaf whose examined bytes (its text plus
//!    the lexer's lookahead) overlap an edit as dirty.
//! 2. [`relex`] walks the new source. Where a clean old leaf starts at the
//!    current offset in the current lexer mode it is taken over unchanged;
//!    everywhere else the lexer runs. Untouched regions are never re-lexed.
//! 3. While parsing, a run of reused tokens that spells out an old subtree
//!    lets the parser push that subtree as a whole (see [`OldTreeIndex`]).
//!
//! ```rust
//! use huff_syntax::incremental::InputEdit;
//!
//! let old = b"#define macro A() = takes(0) returns(0) {}";
//! let (new, edit) = InputEdit::splice(old, 14..15, b"MAIN");
//! assert_eq!(&new[..], b"#define macro MAIN() = takes(0) returns(0) {}");
//! assert_eq!(edit.old_end_byte, 15);
//! assert_eq!(edit.new_end_byte, 18);
//! ```

use crate::language::Language;
use crate::lexer::{Lexer, LexerState, Token};
use crate::syntax::{GreenElement, GreenNode, GreenToken, LineCol, SyntaxTree};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::ops::Range;
use std::sync::Arc;

/// Description of one text edit
///
/// Byte offsets and points of an edit refer to the source as left by the
/// edits before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InputEdit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
    pub start_point: LineCol,
    pub old_end_point: LineCol,
    pub new_end_point: LineCol,
}

impl InputEdit {
    /// Edit replacing `range` of `old_source` with `replacement`. The range
    /// is clamped to the source.
    #[must_use]
    pub fn replace(old_source: &[u8], range: Range<usize>, replacement: &[u8]) -> Self {
        let end = range.end.min(old_source.len());
        let start = range.start.min(end);
        let start_point = LineCol::default().advance(&old_source[..start]);
        Self {
            start_byte: start,
            old_end_byte: end,
            new_end_byte: start + replacement.len(),
            start_point,
            old_end_point: start_point.advance(&old_source[start..end]),
            new_end_point: start_point.advance(replacement),
        }
    }

    #[must_use]
    pub fn insert(old_source: &[u8], at: usize, text: &[u8]) -> Self {
        Self::replace(old_source, at..at, text)
    }

    #[must_use]
    pub fn delete(old_source: &[u8], range: Range<usize>) -> Self {
        Self::replace(old_source, range, &[])
    }

    /// Apply a replacement to `old_source`, returning the new source and
    /// the matching edit.
    #[must_use]
    pub fn splice(old_source: &[u8], range: Range<usize>, replacement: &[u8]) -> (Vec<u8>, Self) {
        let edit = Self::replace(old_source, range, replacement);
        let mut new_source = Vec::with_capacity(old_source.len() + replacement.len());
        new_source.extend_from_slice(&old_source[..edit.start_byte]);
        new_source.extend_from_slice(replacement);
        new_source.extend_from_slice(&old_source[edit.old_end_byte..]);
        (new_source, edit)
    }

    /// Growth of the source in bytes; negative for deletions.
    #[must_use]
    pub fn delta(&self) -> isize {
        #[allow(clippy::cast_possible_wrap)]
        let delta = self.new_end_byte as isize - self.old_end_byte as isize;
        delta
    }

    /// True if an edit to this range can change a leaf spanning
    /// `[start, end)` whose lexing looked `lookahead` bytes further.
    fn touches(&self, start: usize, end: usize, lookahead: u32) -> bool {
        self.start_byte < end + lookahead as usize && self.old_end_byte >= start
    }
}

/// A leaf of the previous tree, moved to new-source coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OldLeaf {
    pub token: GreenToken,
    /// Offset in the new source
    pub start: usize,
    /// Offset in the previous source
    pub old_start: usize,
    pub dirty: bool,
}

/// Move the old tree's leaves through `edits` and mark the damaged ones.
pub(crate) fn apply_edits(previous: &SyntaxTree, edits: &[InputEdit]) -> Vec<OldLeaf> {
    let mut leaves: Vec<OldLeaf> = previous
        .leaves()
        .map(|token| {
            let start = token.text_range().start().to_usize();
            OldLeaf {
                token: token.green().clone(),
                start,
                old_start: start,
                dirty: false,
            }
        })
        .collect();

    for edit in edits {
        for leaf in &mut leaves {
            let end = leaf.start + leaf.token.text_len().to_usize();
            if edit.touches(leaf.start, end, leaf.token.lookahead()) {
                leaf.dirty = true;
            }
            if leaf.start >= edit.old_end_byte {
                leaf.start = leaf.start.saturating_add_signed(edit.delta());
            }
        }
    }

    let dirty = leaves.iter().filter(|leaf| leaf.dirty).count();
    tracing::trace!(leaves = leaves.len(), dirty, edits = edits.len(), "applied edits");
    leaves
}

/// A token of the new source and, when taken over unchanged, the index of
/// the old leaf it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StreamToken {
    pub token: GreenToken,
    pub origin: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RelexStats {
    pub relexed: usize,
    pub reused: usize,
}

/// Tokenize `source`, reusing clean old leaves where they line up.
///
/// `old_source` is the text the leaves were lexed from. A leaf whose bytes
/// differ from the new text at its shifted position is lexed again.
pub(crate) fn relex(
    lexer: &Lexer,
    source: &[u8],
    old_source: &[u8],
    old: &[OldLeaf],
) -> (Vec<StreamToken>, RelexStats) {
    let mut stream = Vec::new();
    let mut stats = RelexStats::default();
    let mut state = LexerState::new();
    let mut cursor = 0;

    while state.pos < source.len() {
        while old.get(cursor).is_some_and(|leaf| leaf.start < state.pos) {
            cursor += 1;
        }
        if let Some(leaf) = old.get(cursor) {
            let len = leaf.token.text_len().to_usize();
            let end = leaf.start + len;
            if leaf.start == state.pos
                && !leaf.dirty
                && leaf.token.mode() == state.mode
                && source.get(leaf.start..end) == old_source.get(leaf.old_start..leaf.old_start + len)
            {
                let token = leaf.token.clone().reinterpret(leaf.token.lexed_kind());
                stream.push(StreamToken {
                    token,
                    origin: u32::try_from(cursor).ok(),
                });
                state = LexerState::at(
                    end,
                    state.point.advance(&source[state.pos..end]),
                    lexer.mode_after(leaf.token.lexed_kind(), state.mode),
                );
                stats.reused += 1;
                cursor += 1;
                continue;
            }
        }

        let Some(result) = lexer.next_token(source, &state) else {
            break;
        };
        let token: Token = result.unwrap_or_else(|err| {
            tracing::debug!(%err, "lex error");
            err.into_token()
        });
        stream.push(StreamToken {
            token: token.to_green(),
            origin: None,
        });
        state = LexerState::after(&token);
        stats.relexed += 1;
    }

    (stream, stats)
}

/// Reusable subtrees of the previous tree, keyed by their first leaf
///
/// Only visible, error-free, non-empty nodes below the root are indexed.
/// Candidates for one leaf are listed outermost first.
pub(crate) struct OldTreeIndex {
    nodes_by_first_leaf: HashMap<u32, SmallVec<[Arc<GreenNode>; 4]>, ahash::RandomState>,
    /// For each leaf, the first significant leaf at or after it; the leaf
    /// count stands for end of input
    next_significant: Vec<u32>,
    /// Leaves that ended up inside an error node
    in_error: Vec<bool>,
}

impl OldTreeIndex {
    pub fn new(previous: &SyntaxTree, language: &Language) -> Self {
        let mut index = Self {
            nodes_by_first_leaf: HashMap::default(),
            next_significant: Vec::new(),
            in_error: Vec::new(),
        };
        let mut extras = Vec::new();
        let mut leaf = 0u32;
        for child in previous.green().children() {
            index.visit(child, language, &mut leaf, &mut extras, false);
        }

        let total = u32::try_from(extras.len()).unwrap_or(u32::MAX);
        let mut next = total;
        index.next_significant = vec![total; extras.len()];
        for i in (0..extras.len()).rev() {
            if !extras[i] {
                next = u32::try_from(i).unwrap_or(u32::MAX);
            }
            index.next_significant[i] = next;
        }
        index
    }

    fn visit(
        &mut self,
        element: &GreenElement,
        language: &Language,
        leaf: &mut u32,
        extras: &mut Vec<bool>,
        in_error: bool,
    ) {
        match element {
            GreenElement::Token(token) => {
                extras.push(language.is_extra(token.kind()));
                self.in_error.push(in_error || token.is_error());
                *leaf += 1;
            }
            GreenElement::Node(node) => {
                if !node.has_error() && node.leaf_count() > 0 && language.is_visible(node.kind()) {
                    self.nodes_by_first_leaf
                        .entry(*leaf)
                        .or_default()
                        .push(Arc::clone(node));
                }
                let in_error = in_error || node.is_error();
                for child in node.children() {
                    self.visit(child, language, leaf, extras, in_error);
                }
            }
        }
    }

    /// Candidate subtrees starting at old leaf `leaf`, outermost first.
    pub fn candidates(&self, leaf: u32) -> &[Arc<GreenNode>] {
        self.nodes_by_first_leaf.get(&leaf).map_or(&[], |nodes| nodes.as_slice())
    }

    /// First significant old leaf at or after `leaf`.
    pub fn next_significant(&self, leaf: u32) -> u32 {
        self.next_significant
            .get(leaf as usize)
            .copied()
            .unwrap_or_else(|| u32::try_from(self.next_significant.len()).unwrap_or(u32::MAX))
    }

    /// The first significant old leaf at or after `leaf` was skipped or
    /// wrapped by error recovery. A node followed by such a leaf may have
    /// been reduced on a later lookahead than the one after it.
    pub fn followed_by_error(&self, leaf: u32) -> bool {
        let next = self.next_significant(leaf);
        self.in_error.get(next as usize).copied().unwrap_or(false)
    }
}

/// Number of leaves of the old tree, used as the origin of end of input.
pub(crate) fn end_origin(old: &[OldLeaf]) -> u32 {
    u32::try_from(old.len()).unwrap_or(u32::MAX)
}
