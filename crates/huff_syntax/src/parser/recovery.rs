//! Panic-mode error recovery
//!
//! When the table has no action for the lookahead, the parser looks down
//! the stack for a state that does. If one exists, everything above it is
//! wrapped into an `ERROR` node and parsing resumes there. Otherwise the
//! token is skipped. Skipped tokens are collected here and emitted as one
//! `ERROR` node before the next shift.
//!
//! Error nodes remember the state the error was detected in, so the tree
//! can report what was expected there.

use super::engine::StackEntry;
use crate::syntax::{GreenElement, GreenNode};
use crate::table::StateId;

#[derive(Debug, Default)]
pub(super) struct ErrorRecovery {
    skipped: Vec<GreenElement>,
    /// State at the start of the current error streak
    error_state: Option<StateId>,
    errors: usize,
    attempts: usize,
    attempt_position: usize,
}

impl ErrorRecovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// No error streak is in progress.
    pub const fn is_idle(&self) -> bool {
        self.error_state.is_none()
    }

    /// Error streaks seen so far.
    pub const fn errors(&self) -> usize {
        self.errors
    }

    pub const fn error_state(&self) -> Option<StateId> {
        self.error_state
    }

    /// Record a failed action in `state` at token `position`. Returns false
    /// once `budget` attempts at this position are used up.
    pub fn fail(&mut self, state: StateId, position: usize, budget: usize) -> bool {
        if self.error_state.is_none() {
            self.error_state = Some(state);
            self.errors += 1;
            tracing::trace!(state, position, errors = self.errors, "syntax error");
        }
        if position != self.attempt_position {
            self.attempt_position = position;
            self.attempts = 0;
        }
        self.attempts += 1;
        self.attempts <= budget
    }

    pub fn skip(&mut self, elements: impl IntoIterator<Item = GreenElement>) {
        self.skipped.extend(elements);
    }

    /// Pop every entry from `keep` up, wrap their elements and the skipped
    /// tokens into an error node, and append it to the new top entry.
    pub fn unwind(&mut self, stack: &mut Vec<StackEntry>, keep: usize) {
        let resume = stack.get(keep.saturating_sub(1)).map_or(0, |entry| entry.state);
        let mut children: Vec<GreenElement> = stack
            .drain(keep..)
            .flat_map(|entry| entry.elements.into_iter().map(|(element, _)| element))
            .collect();
        children.append(&mut self.skipped);
        let state = self.error_state.take().unwrap_or(resume);
        if let Some(entry) = stack.last_mut() {
            entry
                .elements
                .push((GreenElement::Node(GreenNode::error(children, state)), None));
        }
    }

    /// End the error streak. Skipped tokens become an error node on the
    /// top entry.
    pub fn flush(&mut self, stack: &mut [StackEntry]) {
        let Some(state) = self.error_state.take() else {
            return;
        };
        if self.skipped.is_empty() {
            return;
        }
        let children = std::mem::take(&mut self.skipped);
        tracing::trace!(state, skipped = children.len(), "resuming after skipped tokens");
        if let Some(entry) = stack.last_mut() {
            entry
                .elements
                .push((GreenElement::Node(GreenNode::error(children, state)), None));
        }
    }

    pub fn take_skipped(&mut self) -> Vec<GreenElement> {
        std::mem::take(&mut self.skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{GreenToken, SyntaxKind, TextSize};
    use smallvec::smallvec;

    fn token(len: u32) -> GreenElement {
        GreenElement::Token(GreenToken::new(SyntaxKind::from_raw(2), TextSize::from(len)))
    }

    fn entry(state: StateId, len: u32) -> StackEntry {
        StackEntry {
            state,
            elements: smallvec![(token(len), None)],
        }
    }

    #[test]
    fn test_fail_counts_streaks() {
        let mut recovery = ErrorRecovery::new();
        assert!(recovery.is_idle());
        assert!(recovery.fail(4, 0, 2));
        assert!(recovery.fail(4, 0, 2));
        assert!(!recovery.fail(4, 0, 2));
        assert_eq!(recovery.errors(), 1);
        // a new position resets the budget
        assert!(recovery.fail(4, 1, 2));
        assert_eq!(recovery.error_state(), Some(4));
    }

    #[test]
    fn test_unwind_wraps_popped_entries() {
        let mut recovery = ErrorRecovery::new();
        let mut stack = vec![entry(0, 1), entry(3, 2), entry(7, 3)];
        recovery.fail(7, 2, 4);
        recovery.skip([token(4)]);
        recovery.unwind(&mut stack, 1);

        assert!(recovery.is_idle());
        assert_eq!(stack.len(), 1);
        let (GreenElement::Node(error), None) = &stack[0].elements[1] else {
            panic!("expected an error node");
        };
        assert!(error.is_error());
        assert_eq!(error.parse_state(), 7);
        assert_eq!(error.text_len(), TextSize::from(9));
    }

    #[test]
    fn test_flush_emits_skipped_tokens() {
        let mut recovery = ErrorRecovery::new();
        let mut stack = vec![entry(0, 1)];
        recovery.fail(0, 1, 4);
        recovery.skip([token(2), token(1)]);
        recovery.flush(&mut stack);
        assert!(recovery.is_idle());
        assert_eq!(stack[0].elements.len(), 2);
        assert!(stack[0].elements[1].0.has_error());

        // nothing skipped, nothing emitted
        recovery.flush(&mut stack);
        assert_eq!(stack[0].elements.len(), 2);
    }
}
