//! LR(1) automaton construction
//!
//! States are identified by their kernel items. In LALR mode two kernels
//! with the same cores are the same state and their lookaheads are merged;
//! a state whose lookaheads grew is queued again so the growth reaches its
//! successors. States are numbered in breadth-first discovery order with
//! successors visited in symbol order, so the numbering only depends on the
//! grammar.

use super::conflict::{ConflictResolver, Core, ShiftCandidate};
use super::{ParseTable, ProductionId, ProductionInfo, StateId, TableConfig};
use crate::error::{GrammarConflictError, GrammarError, UnreachableRuleWarning};
use crate::grammar::NormalizedGrammar;
use crate::syntax::SyntaxKind;
use compact_str::CompactString;
use hashbrown::HashMap;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Bit set over terminal symbols
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TerminalSet(Vec<u64>);

impl TerminalSet {
    pub fn new(terminal_count: usize) -> Self {
        Self(vec![0; terminal_count.div_ceil(64)])
    }

    pub fn insert(&mut self, kind: SyntaxKind) -> bool {
        let (word, bit) = (kind.index() / 64, kind.index() % 64);
        let Some(slot) = self.0.get_mut(word) else {
            return false;
        };
        let added = *slot & (1 << bit) == 0;
        *slot |= 1 << bit;
        added
    }

    /// Add every member of `other`, returning whether the set grew.
    pub fn union_with(&mut self, other: &Self) -> bool {
        let mut grew = false;
        for (mine, theirs) in self.0.iter_mut().zip(&other.0) {
            let merged = *mine | theirs;
            grew |= merged != *mine;
            *mine = merged;
        }
        grew
    }

    pub fn iter(&self) -> impl Iterator<Item = SyntaxKind> + '_ {
        self.0.iter().enumerate().flat_map(|(i, &word)| {
            (0..64).filter(move |bit| word & (1 << bit) != 0).map(move |bit| {
                SyntaxKind::from_raw(u16::try_from(i * 64 + bit).unwrap_or(u16::MAX))
            })
        })
    }
}

/// Nullability and FIRST sets of every symbol, plus FIRST of every
/// production suffix
struct FirstSets {
    /// `suffixes[p][d]` is FIRST and nullability of the steps of `p` from `d`
    suffixes: Vec<Vec<(TerminalSet, bool)>>,
}

impl FirstSets {
    fn compute(grammar: &NormalizedGrammar) -> Self {
        let n = grammar.terminal_count;
        let mut nullable = vec![false; grammar.symbols.len()];
        let mut first: Vec<TerminalSet> = (0..grammar.symbols.len())
            .map(|i| {
                let mut set = TerminalSet::new(n);
                if i < n {
                    set.insert(SyntaxKind::from_raw(u16::try_from(i).unwrap_or(u16::MAX)));
                }
                set
            })
            .collect();

        let mut changed = true;
        while changed {
            changed = false;
            for production in &grammar.productions {
                let lhs = production.lhs.index();
                let mut all_nullable = true;
                for step in &production.steps {
                    let symbol = step.symbol.index();
                    if symbol != lhs {
                        let (target, source) = if lhs < symbol {
                            let (a, b) = first.split_at_mut(symbol);
                            (&mut a[lhs], &b[0])
                        } else {
                            let (a, b) = first.split_at_mut(lhs);
                            (&mut b[0], &a[symbol])
                        };
                        changed |= target.union_with(source);
                    }
                    if !nullable[symbol] {
                        all_nullable = false;
                        break;
                    }
                }
                if all_nullable && !nullable[lhs] {
                    nullable[lhs] = true;
                    changed = true;
                }
            }
        }

        let suffixes = grammar
            .productions
            .iter()
            .map(|production| {
                let mut row = vec![(TerminalSet::new(n), true); production.steps.len() + 1];
                for d in (0..production.steps.len()).rev() {
                    let symbol = production.steps[d].symbol.index();
                    let mut set = first[symbol].clone();
                    let rest_nullable = nullable[symbol] && row[d + 1].1;
                    if nullable[symbol] {
                        set.union_with(&row[d + 1].0);
                    }
                    row[d] = (set, rest_nullable);
                }
                row
            })
            .collect();

        Self { suffixes }
    }

    fn suffix(&self, production: ProductionId, dot: usize) -> &(TerminalSet, bool) {
        &self.suffixes[production as usize][dot]
    }
}

type Kernel = BTreeMap<Core, TerminalSet>;

struct State {
    kernel: Kernel,
    transitions: BTreeMap<SyntaxKind, StateId>,
}

struct Automaton<'g> {
    grammar: &'g NormalizedGrammar,
    first: FirstSets,
    states: Vec<State>,
}

impl<'g> Automaton<'g> {
    fn build(grammar: &'g NormalizedGrammar, config: &TableConfig) -> Self {
        let mut automaton = Self {
            grammar,
            first: FirstSets::compute(grammar),
            states: Vec::new(),
        };

        let mut end = TerminalSet::new(grammar.terminal_count);
        end.insert(SyntaxKind::END);
        let initial: Kernel = BTreeMap::from([((0, 0), end)]);

        let mut index: HashMap<Vec<(Core, TerminalSet)>, StateId, ahash::RandomState> =
            HashMap::default();
        index.insert(Self::key(&initial, config.lalr), 0);
        automaton.states.push(State {
            kernel: initial,
            transitions: BTreeMap::new(),
        });

        let mut queue = VecDeque::from([0]);
        let mut queued = vec![true];
        let mut merges = 0usize;

        while let Some(id) = queue.pop_front() {
            queued[id as usize] = false;
            let closure = automaton.closure(&automaton.states[id as usize].kernel);

            let mut successors: BTreeMap<SyntaxKind, Kernel> = BTreeMap::new();
            for (&(p, dot), lookahead) in &closure {
                let production = &grammar.productions[p as usize];
                if let Some(step) = production.steps.get(dot as usize) {
                    successors
                        .entry(step.symbol)
                        .or_default()
                        .entry((p, dot + 1))
                        .or_insert_with(|| TerminalSet::new(grammar.terminal_count))
                        .union_with(lookahead);
                }
            }

            for (symbol, kernel) in successors {
                let key = Self::key(&kernel, config.lalr);
                let target = if let Some(&target) = index.get(&key) {
                    if config.lalr {
                        let existing = &mut automaton.states[target as usize].kernel;
                        let mut grew = false;
                        for (core, lookahead) in &kernel {
                            if let Some(slot) = existing.get_mut(core) {
                                grew |= slot.union_with(lookahead);
                            }
                        }
                        if grew {
                            merges += 1;
                        }
                        if grew && !queued[target as usize] {
                            queued[target as usize] = true;
                            queue.push_back(target);
                        }
                    }
                    target
                } else {
                    let target = StateId::try_from(automaton.states.len()).unwrap_or(StateId::MAX);
                    index.insert(key, target);
                    automaton.states.push(State {
                        kernel,
                        transitions: BTreeMap::new(),
                    });
                    queued.push(true);
                    queue.push_back(target);
                    target
                };
                automaton.states[id as usize]
                    .transitions
                    .insert(symbol, target);
            }
        }

        tracing::debug!(
            states = automaton.states.len(),
            merges,
            lalr = config.lalr,
            "built LR(1) automaton"
        );
        automaton
    }

    /// Identity of a kernel. LALR ignores lookaheads.
    fn key(kernel: &Kernel, lalr: bool) -> Vec<(Core, TerminalSet)> {
        kernel
            .iter()
            .map(|(core, lookahead)| {
                let lookahead = if lalr {
                    TerminalSet::default()
                } else {
                    lookahead.clone()
                };
                (*core, lookahead)
            })
            .collect()
    }

    fn closure(&self, kernel: &Kernel) -> Kernel {
        let grammar = self.grammar;
        let mut items = kernel.clone();
        let mut work: Vec<Core> = items.keys().copied().collect();

        while let Some((p, dot)) = work.pop() {
            let production = &grammar.productions[p as usize];
            let Some(step) = production.steps.get(dot as usize) else {
                continue;
            };
            if grammar.is_terminal(step.symbol) {
                continue;
            }

            let (first, nullable) = self.first.suffix(p, dot as usize + 1);
            let mut lookahead = first.clone();
            if *nullable {
                if let Some(parent) = items.get(&(p, dot)) {
                    lookahead.union_with(parent);
                }
            }

            for &q in grammar.productions_of(step.symbol) {
                match items.entry((q, 0)) {
                    Entry::Vacant(slot) => {
                        slot.insert(lookahead.clone());
                        work.push((q, 0));
                    }
                    Entry::Occupied(mut slot) => {
                        if slot.get_mut().union_with(&lookahead) {
                            work.push((q, 0));
                        }
                    }
                }
            }
        }

        items
    }
}

/// Output of table construction
#[derive(Debug)]
pub(crate) struct BuiltTable {
    pub table: ParseTable,
    pub warnings: Vec<UnreachableRuleWarning>,
}

/// Build the parse table for a normalized grammar.
pub(crate) fn build_table(
    grammar: &NormalizedGrammar,
    config: &TableConfig,
) -> Result<BuiltTable, GrammarError> {
    let automaton = Automaton::build(grammar, config);
    let resolver = ConflictResolver::new(grammar);

    let mut actions = Vec::with_capacity(automaton.states.len());
    let mut gotos = Vec::with_capacity(automaton.states.len());
    let mut conflicts = Vec::new();

    for (id, state) in automaton.states.iter().enumerate() {
        let id = StateId::try_from(id).unwrap_or(StateId::MAX);
        let closure = automaton.closure(&state.kernel);

        let mut shifts: BTreeMap<SyntaxKind, Vec<Core>> = BTreeMap::new();
        let mut reduces: BTreeMap<SyntaxKind, BTreeSet<ProductionId>> = BTreeMap::new();
        for (&(p, dot), lookahead) in &closure {
            let production = &grammar.productions[p as usize];
            match production.steps.get(dot as usize) {
                Some(step) if grammar.is_terminal(step.symbol) => {
                    shifts.entry(step.symbol).or_default().push((p, dot));
                }
                Some(_) => {}
                None => {
                    for terminal in lookahead.iter() {
                        reduces.entry(terminal).or_default().insert(p);
                    }
                }
            }
        }

        let terminals: BTreeSet<SyntaxKind> =
            shifts.keys().chain(reduces.keys()).copied().collect();
        let mut row = Vec::with_capacity(terminals.len());
        for terminal in terminals {
            let shift = shifts.get(&terminal).and_then(|items| {
                state
                    .transitions
                    .get(&terminal)
                    .map(|&target| ShiftCandidate { target, items })
            });
            let candidates: Vec<ProductionId> = reduces
                .get(&terminal)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default();
            match resolver.resolve(id, terminal, shift, &candidates) {
                Ok(Some(action)) => row.push((terminal, action)),
                Ok(None) => {}
                Err(report) => conflicts.push(report),
            }
        }
        actions.push(row);

        gotos.push(
            state
                .transitions
                .iter()
                .filter(|(symbol, _)| !grammar.is_terminal(**symbol))
                .map(|(&symbol, &target)| (symbol, target))
                .collect::<Vec<_>>(),
        );
    }

    if !conflicts.is_empty() {
        tracing::debug!(count = conflicts.len(), "unresolved conflicts");
        return Err(GrammarConflictError { conflicts }.into());
    }

    let productions = grammar
        .productions
        .iter()
        .map(|production| ProductionInfo {
            lhs: production.lhs,
            fields: production.steps.iter().map(|step| step.field).collect(),
            dynamic_precedence: production.dynamic_precedence,
        })
        .collect();

    let table = ParseTable::new(actions, gotos, productions);
    tracing::debug!(
        grammar = %grammar.name,
        lalr = config.lalr,
        states = table.state_count(),
        actions = table.action_count(),
        gotos = table.goto_count(),
        "built parse table"
    );

    Ok(BuiltTable {
        table,
        warnings: unreachable_rules(grammar),
    })
}

fn unreachable_rules(grammar: &NormalizedGrammar) -> Vec<UnreachableRuleWarning> {
    let mut reached = vec![false; grammar.symbols.len()];
    let mut stack = vec![grammar.start];
    reached[grammar.start.index()] = true;
    while let Some(symbol) = stack.pop() {
        for &p in grammar.productions_of(symbol) {
            for step in &grammar.productions[p as usize].steps {
                if !reached[step.symbol.index()] {
                    reached[step.symbol.index()] = true;
                    stack.push(step.symbol);
                }
            }
        }
    }

    grammar
        .declared_rules
        .iter()
        .filter(|rule| !reached[rule.index()])
        .map(|&rule| {
            let name = grammar.name(rule);
            tracing::warn!(rule = name, "rule is unreachable from the start rule");
            UnreachableRuleWarning {
                rule: CompactString::new(name),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder, normalize};
    use crate::table::Action;

    fn build(grammar: GrammarBuilder, config: TableConfig) -> Result<BuiltTable, GrammarError> {
        let normalized = normalize(&grammar.build().unwrap()).unwrap();
        build_table(&normalized, &config)
    }

    fn list() -> GrammarBuilder {
        GrammarBuilder::new("t")
            .rule("file", Expr::sym("item").repeat())
            .rule("item", Expr::seq([Expr::string("a"), Expr::string(";")]))
    }

    #[test]
    fn test_terminal_set() {
        let mut set = TerminalSet::new(70);
        assert_eq!(set.iter().count(), 0);
        assert!(set.insert(SyntaxKind::from_raw(3)));
        assert!(!set.insert(SyntaxKind::from_raw(3)));
        assert!(set.insert(SyntaxKind::from_raw(66)));

        let mut other = TerminalSet::new(70);
        other.insert(SyntaxKind::from_raw(5));
        assert!(set.union_with(&other));
        assert!(!set.union_with(&other));
        let members: Vec<_> = set.iter().map(SyntaxKind::raw).collect();
        assert_eq!(members, vec![3, 5, 66]);
    }

    #[test]
    fn test_initial_state_actions() {
        let built = build(list(), TableConfig::default()).unwrap();
        let table = built.table;
        // file may be empty, so `end` reduces and `a` shifts
        let a = SyntaxKind::from_raw(2);
        assert!(matches!(table.action(0, a), Some(Action::Shift(_))));
        assert!(matches!(table.action(0, SyntaxKind::END), Some(Action::Reduce(_))));
        assert_eq!(table.action(0, SyntaxKind::from_raw(3)), None);
        assert!(built.warnings.is_empty());
    }

    #[test]
    fn test_accept_after_start() {
        let table = build(list(), TableConfig::default()).unwrap().table;
        let file = SyntaxKind::from_raw(4);
        let after = table.goto(0, file).unwrap();
        assert_eq!(table.action(after, SyntaxKind::END), Some(Action::Accept));
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = build(list(), TableConfig::default()).unwrap().table;
        let b = build(list(), TableConfig::default()).unwrap().table;
        assert_eq!(a, b);
    }

    #[test]
    fn test_canonical_has_at_least_as_many_states() {
        let grammar = || {
            GrammarBuilder::new("t")
                .rule(
                    "s",
                    Expr::choice([
                        Expr::seq([Expr::sym("a"), Expr::string("a")]),
                        Expr::seq([Expr::string("b"), Expr::sym("a"), Expr::string("c")]),
                        Expr::seq([Expr::string("d"), Expr::string("c")]),
                        Expr::seq([Expr::string("b"), Expr::string("d"), Expr::string("a")]),
                    ]),
                )
                .rule("a", Expr::string("d"))
        };
        let lalr = build(grammar(), TableConfig::default()).unwrap().table;
        let canonical = build(grammar(), TableConfig::canonical()).unwrap().table;
        assert!(canonical.state_count() >= lalr.state_count());
    }

    #[test]
    fn test_reduce_reduce_conflict_reported() {
        let grammar = GrammarBuilder::new("t")
            .rule("file", Expr::choice([Expr::sym("a"), Expr::sym("b")]))
            .rule("a", Expr::string("x"))
            .rule("b", Expr::string("x"));
        let Err(GrammarError::Conflict(error)) = build(grammar, TableConfig::default()) else {
            panic!("expected a conflict");
        };
        assert_eq!(error.conflicts.len(), 1);
        assert_eq!(error.conflicts[0].lookahead, "end");
    }

    #[test]
    fn test_unreachable_rule_warning() {
        let built = build(list().rule("orphan", Expr::string("z")), TableConfig::default()).unwrap();
        assert_eq!(built.warnings.len(), 1);
        assert_eq!(built.warnings[0].rule, "orphan");
    }

    #[test]
    fn test_ambiguous_expression_conflicts_without_precedence() {
        let grammar = GrammarBuilder::new("t").rule(
            "expr",
            Expr::choice([
                Expr::seq([Expr::sym("expr"), Expr::string("+"), Expr::sym("expr")]),
                Expr::string("1"),
            ]),
        );
        let err = build(grammar, TableConfig::default()).unwrap_err();
        assert!(matches!(err, GrammarError::Conflict(_)));

        let resolved = GrammarBuilder::new("t").rule(
            "expr",
            Expr::choice([
                Expr::prec_left(
                    1,
                    Expr::seq([Expr::sym("expr"), Expr::string("+"), Expr::sym("expr")]),
                ),
                Expr::string("1"),
            ]),
        );
        assert!(build(resolved, TableConfig::default()).is_ok());
    }
}
