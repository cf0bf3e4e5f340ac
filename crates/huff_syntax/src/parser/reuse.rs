//! Reuse of subtrees from the previous tree

use crate::incremental::{OldTreeIndex, StreamToken};
use crate::language::Language;
use crate::syntax::{GreenNode, SyntaxKind, TokenFlags};
use crate::table::{ParseTable, StateId};
use std::sync::Arc;

/// Decides which old subtrees can stand in for a run of reused tokens
///
/// An old node is pushed as a whole when
/// - it was reduced on top of the same state as the current top,
/// - every one of its leaves came over unchanged, in one unbroken run,
/// - the significant token after it is the same old token (or both are end
///   of input), so the reduction that closed it would be made again,
/// - that token was not skipped by error recovery in the old parse, and it
///   has an action once the node is pushed.
pub(crate) struct NodeReuse<'a> {
    language: &'a Language,
    index: &'a OldTreeIndex,
    stream: &'a [StreamToken],
    /// Length of the run of consecutive old leaves starting at each token
    runs: Vec<u32>,
    /// Old leaf behind the first significant token at or after each
    /// position; `None` for freshly lexed tokens
    next_significant: Vec<Option<u32>>,
}

impl<'a> NodeReuse<'a> {
    pub fn new(language: &'a Language, index: &'a OldTreeIndex, stream: &'a [StreamToken], end_origin: u32) -> Self {
        let mut runs = vec![0u32; stream.len() + 1];
        let mut next_significant = vec![Some(end_origin); stream.len() + 1];
        for i in (0..stream.len()).rev() {
            let token = &stream[i];
            runs[i] = match (token.origin, stream.get(i + 1).and_then(|next| next.origin)) {
                (Some(origin), Some(next)) if next == origin + 1 => runs[i + 1] + 1,
                (Some(_), _) => 1,
                (None, _) => 0,
            };
            next_significant[i] = if language.is_extra(token.token.kind()) {
                next_significant[i + 1]
            } else {
                token.origin
            };
        }
        Self {
            language,
            index,
            stream,
            runs,
            next_significant,
        }
    }

    /// A subtree to push at stream `position` with `top` on the stack, and
    /// the state to go to.
    pub fn candidate(&self, position: usize, top: StateId, table: &ParseTable) -> Option<(Arc<GreenNode>, StateId)> {
        let origin = self.stream.get(position)?.origin?;
        let run = self.runs[position];
        self.index.candidates(origin).iter().find_map(|node| {
            let leaves = node.leaf_count();
            if node.parse_state() != top || leaves > run {
                return None;
            }
            let end = position + leaves as usize;
            let after = self.next_significant[end];
            if after != Some(self.index.next_significant(origin + leaves))
                || self.index.followed_by_error(origin + leaves)
            {
                return None;
            }
            let next = table.goto(top, node.kind())?;
            if !self.has_action(next, end, table) {
                return None;
            }
            Some((Arc::clone(node), next))
        })
    }

    /// The first significant token at or after stream `position` has an
    /// action in `state`, directly or through the word token.
    fn has_action(&self, state: StateId, position: usize, table: &ParseTable) -> bool {
        let next = self.stream[position.min(self.stream.len())..]
            .iter()
            .find(|token| !self.language.is_extra(token.token.kind()));
        let Some(token) = next else {
            return table.action(state, SyntaxKind::END).is_some();
        };
        if table.action(state, token.token.kind()).is_some() {
            return true;
        }
        token.token.flags().contains(TokenFlags::WORD)
            && self
                .language
                .word()
                .is_some_and(|word| table.action(state, word).is_some())
    }
}
