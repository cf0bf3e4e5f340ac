use super::ParserConfig;
use super::recovery::ErrorRecovery;
use super::reuse::NodeReuse;
use crate::incremental::StreamToken;
use crate::language::Language;
use crate::syntax::{FieldId, GreenElement, GreenNode, SyntaxKind, TokenFlags};
use crate::table::{Action, INITIAL_STATE, ParseTable, ProductionId, StateId};
use smallvec::SmallVec;
use std::sync::Arc;

/// Reductions allowed between two shifts before the parse is abandoned
const MAX_REDUCTIONS_WITHOUT_SHIFT: usize = 1 << 16;

/// Elements pushed by one stack entry, each with the field it was given
pub(super) type Elements = SmallVec<[(GreenElement, Option<FieldId>); 2]>;

/// One entry of the LR stack
///
/// An entry holds everything pushed in one step: a shifted token with the
/// trivia before it, a reduced node (or the children of a hidden rule), or
/// a reused subtree. Error nodes are appended to the entry they follow.
#[derive(Debug)]
pub(super) struct StackEntry {
    pub state: StateId,
    pub elements: Elements,
}

impl StackEntry {
    fn into_elements(self) -> impl Iterator<Item = GreenElement> {
        self.elements.into_iter().map(|(element, _)| element)
    }
}

pub(super) struct Outcome {
    pub root: Arc<GreenNode>,
    pub errors: usize,
    pub reused_nodes: usize,
}

/// State of one parse over a token stream
pub(super) struct ParseContext<'a> {
    language: &'a Language,
    table: &'a ParseTable,
    config: &'a ParserConfig,
    stream: &'a [StreamToken],
    reuse: Option<NodeReuse<'a>>,
    stack: Vec<StackEntry>,
    /// Trivia waiting for the next pushed element
    pending: Vec<GreenElement>,
    position: usize,
    recovery: ErrorRecovery,
    reused_nodes: usize,
}

impl<'a> ParseContext<'a> {
    pub fn new(
        language: &'a Language,
        config: &'a ParserConfig,
        stream: &'a [StreamToken],
        reuse: Option<NodeReuse<'a>>,
    ) -> Self {
        Self {
            language,
            table: language.table(),
            config,
            stream,
            reuse,
            stack: vec![StackEntry {
                state: INITIAL_STATE,
                elements: SmallVec::new(),
            }],
            pending: Vec::new(),
            position: 0,
            recovery: ErrorRecovery::new(),
            reused_nodes: 0,
        }
    }

    pub fn run(mut self) -> Outcome {
        let mut reductions = 0usize;
        loop {
            self.collect_trivia();

            if self.recovery.is_idle() && self.try_reuse() {
                reductions = 0;
                continue;
            }

            let top = self.top_state();
            let (kind, action) = self.action_for_lookahead(top);
            match action {
                Some(Action::Shift(next)) => {
                    self.recovery.flush(&mut self.stack);
                    if !self.shift(next, kind) {
                        return self.abandon();
                    }
                    reductions = 0;
                }
                Some(Action::Reduce(production)) => {
                    reductions += 1;
                    if reductions > MAX_REDUCTIONS_WITHOUT_SHIFT || !self.reduce(production) {
                        tracing::debug!(state = top, production, "reduction failed, abandoning parse");
                        return self.abandon();
                    }
                }
                Some(Action::Accept) => {
                    self.recovery.flush(&mut self.stack);
                    return self.accept();
                }
                None => {
                    if let Some(outcome) = self.recover(top) {
                        return outcome;
                    }
                }
            }
        }
    }

    fn top_state(&self) -> StateId {
        self.stack.last().map_or(INITIAL_STATE, |entry| entry.state)
    }

    fn lookahead(&self) -> Option<&'a StreamToken> {
        self.stream.get(self.position)
    }

    fn collect_trivia(&mut self) {
        while let Some(token) = self.lookahead() {
            if !self.language.is_extra(token.token.kind()) {
                break;
            }
            self.pending.push(GreenElement::Token(token.token.clone()));
            self.position += 1;
        }
    }

    /// Action for the current lookahead in `state`, with the kind the token
    /// is read as. A keyword with no action of its own is read as the word
    /// token when that has one.
    pub(super) fn action_for_lookahead(&self, state: StateId) -> (SyntaxKind, Option<Action>) {
        let Some(token) = self.lookahead() else {
            return (SyntaxKind::END, self.table.action(state, SyntaxKind::END));
        };
        let kind = token.token.kind();
        if let Some(action) = self.table.action(state, kind) {
            return (kind, Some(action));
        }
        if token.token.flags().contains(TokenFlags::WORD) {
            if let Some(word) = self.language.word() {
                if let Some(action) = self.table.action(state, word) {
                    return (word, Some(action));
                }
            }
        }
        (kind, None)
    }

    fn take_pending(&mut self) -> Elements {
        self.pending.drain(..).map(|element| (element, None)).collect()
    }

    fn shift(&mut self, next: StateId, kind: SyntaxKind) -> bool {
        let Some(token) = self.lookahead() else {
            return false;
        };
        let green = if token.token.kind() == kind {
            token.token.clone()
        } else {
            token.token.clone().reinterpret(kind)
        };
        let mut elements = self.take_pending();
        elements.push((GreenElement::Token(green), None));
        self.stack.push(StackEntry { state: next, elements });
        self.position += 1;
        true
    }

    fn reduce(&mut self, production: ProductionId) -> bool {
        let Some(info) = self.table.production(production) else {
            return false;
        };
        let Some(base) = self.stack.len().checked_sub(info.len()).filter(|&base| base > 0) else {
            return false;
        };
        let top = self.stack[base - 1].state;
        let Some(next) = self.table.goto(top, info.lhs) else {
            return false;
        };
        let popped = self.stack.split_off(base);

        let mut children: Vec<(GreenElement, Option<FieldId>)> = Vec::new();
        for (entry, step_field) in popped.into_iter().zip(&info.fields) {
            for (element, field) in entry.elements {
                let field = field.or_else(|| step_field.filter(|_| self.takes_field(&element)));
                children.push((element, field));
            }
        }

        let leading = children.iter().take_while(|(element, _)| self.is_trivia(element)).count();
        let mut elements: Elements = children.drain(..leading).collect();
        if self.language.is_visible(info.lhs) {
            let mut fields = SmallVec::new();
            let mut nodes = Vec::with_capacity(children.len());
            for (index, (element, field)) in children.into_iter().enumerate() {
                if let Some(field) = field {
                    fields.push((u32::try_from(index).unwrap_or(u32::MAX), field));
                }
                nodes.push(element);
            }
            let node = GreenNode::new(info.lhs, nodes, fields, top);
            elements.push((GreenElement::Node(node), None));
        } else {
            elements.extend(children);
        }

        self.stack.push(StackEntry { state: next, elements });
        true
    }

    fn is_trivia(&self, element: &GreenElement) -> bool {
        element
            .as_token()
            .is_some_and(|token| self.language.is_extra(token.kind()))
    }

    /// Fields name real children, never trivia or error spans.
    fn takes_field(&self, element: &GreenElement) -> bool {
        match element {
            GreenElement::Token(token) => !token.is_error() && !self.language.is_extra(token.kind()),
            GreenElement::Node(node) => !node.is_error(),
        }
    }

    fn try_reuse(&mut self) -> bool {
        let Some(reuse) = &self.reuse else {
            return false;
        };
        let top = self.top_state();
        let Some((node, next)) = reuse.candidate(self.position, top, self.table) else {
            return false;
        };
        tracing::trace!(
            kind = self.language.kind_name(node.kind()),
            state = top,
            leaves = node.leaf_count(),
            "reusing subtree"
        );
        self.position += node.leaf_count() as usize;
        let mut elements = self.take_pending();
        elements.push((GreenElement::Node(node), None));
        self.stack.push(StackEntry { state: next, elements });
        self.reused_nodes += 1;
        true
    }

    /// Handle a missing action in `state`. Returns the finished tree when
    /// the parse cannot continue.
    fn recover(&mut self, state: StateId) -> Option<Outcome> {
        let within_budget = self.recovery.fail(state, self.position, self.config.max_recovery_attempts);
        if !self.config.error_recovery || self.recovery.errors() > self.config.max_errors {
            return Some(self.abandon());
        }

        if within_budget {
            let found = (0..self.stack.len().saturating_sub(1))
                .rev()
                .find(|&depth| self.action_for_lookahead(self.stack[depth].state).1.is_some());
            if let Some(depth) = found {
                tracing::trace!(state, resume = self.stack[depth].state, "unwinding to recover");
                self.recovery.unwind(&mut self.stack, depth + 1);
                return None;
            }
        }

        if self.lookahead().is_none() {
            return Some(self.abandon());
        }
        let mut skipped: Vec<GreenElement> = self.pending.drain(..).collect();
        if let Some(token) = self.lookahead() {
            tracing::trace!(state, kind = self.language.kind_name(token.token.kind()), "skipping token");
            skipped.push(GreenElement::Token(token.token.clone()));
        }
        self.recovery.skip(skipped);
        self.position += 1;
        None
    }

    fn accept(mut self) -> Outcome {
        let start = self.language.start();
        let trailing = std::mem::take(&mut self.pending);
        let depth = self.stack.len();
        let mut children = Vec::new();
        let mut fields = SmallVec::new();

        for (i, entry) in std::mem::take(&mut self.stack).into_iter().enumerate() {
            let top = i + 1 == depth;
            let start_at = if top {
                entry.elements.iter().rposition(|(element, _)| {
                    element
                        .as_node()
                        .is_some_and(|node| node.kind() == start && !node.is_error())
                })
            } else {
                None
            };
            for (j, element) in entry.into_elements().enumerate() {
                match element {
                    GreenElement::Node(node) if Some(j) == start_at => {
                        for (index, child) in node.children().iter().enumerate() {
                            if let Some(field) = node.field_of(index) {
                                fields.push((u32::try_from(children.len()).unwrap_or(u32::MAX), field));
                            }
                            children.push(child.clone());
                        }
                    }
                    other => children.push(other),
                }
            }
        }
        children.extend(trailing);

        Outcome {
            root: GreenNode::new(start, children, fields, INITIAL_STATE),
            errors: self.recovery.errors(),
            reused_nodes: self.reused_nodes,
        }
    }

    /// Give up: keep what the stack holds and wrap the rest of the input,
    /// including skipped tokens, into one error node.
    fn abandon(&mut self) -> Outcome {
        let state = self.recovery.error_state().unwrap_or_else(|| self.top_state());
        let mut rest = self.recovery.take_skipped();
        rest.append(&mut self.pending);
        let remaining = self.stream.get(self.position..).unwrap_or_default();
        rest.extend(remaining.iter().map(|token| GreenElement::Token(token.token.clone())));

        let mut children: Vec<GreenElement> = std::mem::take(&mut self.stack)
            .into_iter()
            .flat_map(StackEntry::into_elements)
            .collect();
        if !rest.is_empty() {
            children.push(GreenElement::Node(GreenNode::error(rest, state)));
        }
        tracing::debug!(
            position = self.position,
            tokens = self.stream.len(),
            "wrapped remaining input in an error node"
        );

        Outcome {
            root: GreenNode::error_with_kind(self.language.start(), children),
            errors: self.recovery.errors().max(1),
            reused_nodes: self.reused_nodes,
        }
    }
}
