//! # Parse Tables
//!
//! Deterministic LR(1) action and goto tables built from a normalized
//! grammar. LALR(1) state merging is the default; canonical LR(1) can be
//! selected through [`TableConfig`].
//!
//! A missing action entry is an error. Rows are sorted by symbol so that
//! lookups are a binary search and two builds of the same grammar produce
//! identical tables.

mod automaton;
mod conflict;

pub(crate) use automaton::build_table;

use crate::syntax::{FieldId, SyntaxKind};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Index of a parser state
pub type StateId = u32;

/// Index of a production
pub type ProductionId = u32;

/// The state every parse starts in.
pub const INITIAL_STATE: StateId = 0;

/// Parser action for a state and lookahead terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Action {
    /// Push the token and move to the state
    Shift(StateId),
    /// Pop the production's right-hand side and push its left-hand side
    Reduce(ProductionId),
    /// The input is a complete start symbol
    Accept,
}

impl Action {
    #[must_use]
    pub const fn is_shift(self) -> bool {
        matches!(self, Self::Shift(_))
    }
}

/// Table construction options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    /// Merge states with equal cores (LALR(1)). Canonical LR(1) otherwise.
    pub lalr: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { lalr: true }
    }
}

impl TableConfig {
    #[must_use]
    pub const fn canonical() -> Self {
        Self { lalr: false }
    }
}

/// What the parser needs to know about a production at reduce time
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ProductionInfo {
    pub lhs: SyntaxKind,
    /// Field of each right-hand side step
    pub fields: Vec<Option<FieldId>>,
    pub dynamic_precedence: i32,
}

impl ProductionInfo {
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// LR(1) action and goto tables
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ParseTable {
    actions: Vec<Vec<(SyntaxKind, Action)>>,
    gotos: Vec<Vec<(SyntaxKind, StateId)>>,
    productions: Vec<ProductionInfo>,
}

impl ParseTable {
    pub(crate) fn new(
        mut actions: Vec<Vec<(SyntaxKind, Action)>>,
        mut gotos: Vec<Vec<(SyntaxKind, StateId)>>,
        productions: Vec<ProductionInfo>,
    ) -> Self {
        for row in &mut actions {
            row.sort_unstable_by_key(|(kind, _)| *kind);
        }
        for row in &mut gotos {
            row.sort_unstable_by_key(|(kind, _)| *kind);
        }
        Self {
            actions,
            gotos,
            productions,
        }
    }

    /// Action for `terminal` in `state`, `None` meaning a syntax error.
    #[must_use]
    pub fn action(&self, state: StateId, terminal: SyntaxKind) -> Option<Action> {
        let row = self.actions.get(state as usize)?;
        row.binary_search_by_key(&terminal, |(kind, _)| *kind)
            .ok()
            .map(|i| row[i].1)
    }

    #[must_use]
    pub fn goto(&self, state: StateId, nonterminal: SyntaxKind) -> Option<StateId> {
        let row = self.gotos.get(state as usize)?;
        row.binary_search_by_key(&nonterminal, |(kind, _)| *kind)
            .ok()
            .map(|i| row[i].1)
    }

    /// Terminals with an action in `state`, in symbol order.
    pub fn expected_terminals(&self, state: StateId) -> impl Iterator<Item = SyntaxKind> + '_ {
        self.actions
            .get(state as usize)
            .into_iter()
            .flatten()
            .map(|(kind, _)| *kind)
    }

    /// All actions of `state`, in symbol order.
    #[must_use]
    pub fn row(&self, state: StateId) -> &[(SyntaxKind, Action)] {
        self.actions.get(state as usize).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn production(&self, id: ProductionId) -> Option<&ProductionInfo> {
        self.productions.get(id as usize)
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn goto_count(&self) -> usize {
        self.gotos.iter().map(Vec::len).sum()
    }
}
