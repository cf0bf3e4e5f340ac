//! Pattern compilation: Thompson NFA construction followed by subset
//! construction over byte ranges.
//!
//! Every container that is iterated during construction is ordered, so the
//! same rule set always produces the same automaton, state numbering included.

use super::pattern::Pattern;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A DFA state id. State 0 is the start state.
pub type StateId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
struct Transition {
    lo: u8,
    hi: u8,
    target: StateId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
struct DfaState {
    /// Sorted by `lo`, non-overlapping
    transitions: Vec<Transition>,
    /// Index of the winning rule when the automaton stops here
    accept: Option<u32>,
}

/// Deterministic automaton over bytes
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Dfa {
    states: Vec<DfaState>,
}

/// Result of running a DFA from some position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfaMatch {
    /// Length and rule of the longest accepted prefix
    pub best: Option<(usize, u32)>,
    /// One past the last byte the walk inspected. Reaching end of input
    /// counts as inspecting one more byte.
    pub examined_end: usize,
}

impl Dfa {
    /// Compile `rules` into one automaton.
    ///
    /// When several rules accept in the same state, `rank` decides: the
    /// rule with the smallest rank wins.
    pub(crate) fn build<K: Ord + Copy>(rules: &[(&Pattern, u32)], rank: impl Fn(u32) -> K) -> Self {
        let mut nfa = Nfa::new();
        for &(pattern, rule) in rules {
            let start = nfa.add_state();
            let end = nfa.add_state();
            nfa.epsilon(0, start);
            nfa.build(pattern, start, end);
            nfa.states[end as usize].accept = Some(rule);
        }
        subset_construction(&nfa, &rank)
    }

    #[inline]
    #[must_use]
    pub fn step(&self, state: StateId, byte: u8) -> Option<StateId> {
        let transitions = &self.states.get(state as usize)?.transitions;
        let idx = transitions.partition_point(|t| t.hi < byte);
        transitions
            .get(idx)
            .filter(|t| t.lo <= byte)
            .map(|t| t.target)
    }

    #[inline]
    #[must_use]
    pub fn accept(&self, state: StateId) -> Option<u32> {
        self.states.get(state as usize).and_then(|s| s.accept)
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Maximal munch from `pos`. Empty matches are never reported.
    #[must_use]
    pub fn longest_match(&self, input: &[u8], pos: usize) -> DfaMatch {
        let mut state = 0;
        let mut best = None;
        let mut i = pos;
        loop {
            let Some(&byte) = input.get(i) else {
                return DfaMatch {
                    best,
                    examined_end: input.len() + 1,
                };
            };
            match self.step(state, byte) {
                Some(next) => {
                    state = next;
                    i += 1;
                    if let Some(rule) = self.accept(state) {
                        best = Some((i - pos, rule));
                    }
                }
                None => {
                    return DfaMatch {
                        best,
                        examined_end: i + 1,
                    };
                }
            }
        }
    }

    /// True if the whole of `text` is accepted.
    #[must_use]
    pub fn matches_exactly(&self, text: &[u8]) -> bool {
        let mut state = 0;
        for &byte in text {
            match self.step(state, byte) {
                Some(next) => state = next,
                None => return false,
            }
        }
        !text.is_empty() && self.accept(state).is_some()
    }
}

#[derive(Debug, Default)]
struct NfaState {
    transitions: Vec<(u8, u8, u32)>,
    epsilon: Vec<u32>,
    accept: Option<u32>,
}

struct Nfa {
    states: Vec<NfaState>,
}

impl Nfa {
    fn new() -> Self {
        Self {
            states: vec![NfaState::default()],
        }
    }

    fn add_state(&mut self) -> u32 {
        let id = u32::try_from(self.states.len()).unwrap_or(u32::MAX);
        self.states.push(NfaState::default());
        id
    }

    fn epsilon(&mut self, from: u32, to: u32) {
        self.states[from as usize].epsilon.push(to);
    }

    fn byte_range(&mut self, from: u32, lo: u8, hi: u8, to: u32) {
        self.states[from as usize].transitions.push((lo, hi, to));
    }

    fn build(&mut self, pattern: &Pattern, start: u32, end: u32) {
        match pattern {
            Pattern::Literal(text) => {
                let bytes = text.as_bytes();
                if bytes.is_empty() {
                    self.epsilon(start, end);
                    return;
                }
                let mut current = start;
                for (i, &byte) in bytes.iter().enumerate() {
                    let next = if i + 1 == bytes.len() {
                        end
                    } else {
                        self.add_state()
                    };
                    self.byte_range(current, byte, byte, next);
                    current = next;
                }
            }
            Pattern::Class(set) => {
                for &(lo, hi) in set.ranges() {
                    self.byte_range(start, lo, hi, end);
                }
            }
            Pattern::Seq(items) => {
                let mut current = start;
                for item in items {
                    let next = self.add_state();
                    self.build(item, current, next);
                    current = next;
                }
                self.epsilon(current, end);
            }
            Pattern::Alt(items) => {
                for item in items {
                    let (s, e) = (self.add_state(), self.add_state());
                    self.epsilon(start, s);
                    self.build(item, s, e);
                    self.epsilon(e, end);
                }
            }
            Pattern::Repeat { pattern, min, max } => {
                let mut current = start;
                for _ in 0..*min {
                    let next = self.add_state();
                    self.build(pattern, current, next);
                    current = next;
                }
                match max {
                    None => {
                        let (s, e) = (self.add_state(), self.add_state());
                        self.epsilon(current, s);
                        self.epsilon(current, end);
                        self.build(pattern, s, e);
                        self.epsilon(e, s);
                        self.epsilon(e, end);
                    }
                    Some(max) => {
                        for _ in *min..*max {
                            let next = self.add_state();
                            self.epsilon(current, end);
                            self.build(pattern, current, next);
                            current = next;
                        }
                        self.epsilon(current, end);
                    }
                }
            }
        }
    }

    fn closure(&self, seeds: impl IntoIterator<Item = u32>) -> BTreeSet<u32> {
        let mut set = BTreeSet::new();
        let mut stack: Vec<u32> = seeds.into_iter().collect();
        while let Some(state) = stack.pop() {
            if set.insert(state) {
                stack.extend(self.states[state as usize].epsilon.iter().copied());
            }
        }
        set
    }
}

fn subset_construction<K: Ord + Copy>(nfa: &Nfa, rank: &impl Fn(u32) -> K) -> Dfa {
    let start = nfa.closure([0]);
    let mut ids: BTreeMap<BTreeSet<u32>, StateId> = BTreeMap::new();
    let mut sets: Vec<BTreeSet<u32>> = Vec::new();
    let mut queue = VecDeque::new();

    ids.insert(start.clone(), 0);
    sets.push(start);
    queue.push_back(0u32);

    let mut states: Vec<DfaState> = vec![DfaState::default()];

    while let Some(id) = queue.pop_front() {
        let set = sets[id as usize].clone();

        let accept = set
            .iter()
            .filter_map(|&s| nfa.states[s as usize].accept)
            .min_by_key(|&rule| (rank(rule), rule));

        // Split the byte space at every range boundary so each segment maps
        // to one fixed set of NFA targets.
        let moves: Vec<(u8, u8, u32)> = set
            .iter()
            .flat_map(|&s| nfa.states[s as usize].transitions.iter().copied())
            .collect();
        let mut bounds: BTreeSet<u16> = BTreeSet::new();
        for &(lo, hi, _) in &moves {
            bounds.insert(u16::from(lo));
            bounds.insert(u16::from(hi) + 1);
        }
        let bounds: Vec<u16> = bounds.into_iter().collect();

        let mut transitions: Vec<Transition> = Vec::new();
        for window in bounds.windows(2) {
            let (seg_lo, seg_hi) = (window[0], window[1] - 1);
            let targets: Vec<u32> = moves
                .iter()
                .filter(|&&(lo, hi, _)| u16::from(lo) <= seg_lo && seg_hi <= u16::from(hi))
                .map(|&(_, _, t)| t)
                .collect();
            if targets.is_empty() {
                continue;
            }
            let target_set = nfa.closure(targets);
            let target = match ids.get(&target_set) {
                Some(&existing) => existing,
                None => {
                    let new_id = u32::try_from(sets.len()).unwrap_or(u32::MAX);
                    ids.insert(target_set.clone(), new_id);
                    sets.push(target_set);
                    states.push(DfaState::default());
                    queue.push_back(new_id);
                    new_id
                }
            };
            let (lo, hi) = (to_byte(seg_lo), to_byte(seg_hi));
            match transitions.last_mut() {
                Some(last) if last.target == target && u16::from(last.hi) + 1 == seg_lo => {
                    last.hi = hi;
                }
                _ => transitions.push(Transition { lo, hi, target }),
            }
        }

        states[id as usize] = DfaState {
            transitions,
            accept,
        };
    }

    Dfa { states }
}

fn to_byte(value: u16) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::pattern::CharSet;

    fn ident() -> Pattern {
        Pattern::seq([
            Pattern::class(CharSet::alphabetic().union(&CharSet::single(b'_'))),
            Pattern::class(CharSet::alphanumeric().union(&CharSet::single(b'_'))).repeat(),
        ])
    }

    #[test]
    fn test_literal_match() {
        let lit = Pattern::literal("macro");
        let dfa = Dfa::build(&[(&lit, 0)], |r| r);
        let m = dfa.longest_match(b"macro(", 0);
        assert_eq!(m.best, Some((5, 0)));
        assert_eq!(m.examined_end, 6);
    }

    #[test]
    fn test_longest_match_wins() {
        let kw = Pattern::literal("mac");
        let id = ident();
        let dfa = Dfa::build(&[(&kw, 0), (&id, 1)], |r| r);
        assert_eq!(dfa.longest_match(b"macro ", 0).best, Some((5, 1)));
        assert_eq!(dfa.longest_match(b"mac ", 0).best, Some((3, 0)));
    }

    #[test]
    fn test_rank_breaks_ties() {
        let kw = Pattern::literal("mac");
        let id = ident();
        let dfa = Dfa::build(&[(&kw, 0), (&id, 1)], |r| if r == 1 { 0 } else { 1 });
        assert_eq!(dfa.longest_match(b"mac", 0).best, Some((3, 1)));
    }

    #[test]
    fn test_examined_end_at_eof() {
        let id = ident();
        let dfa = Dfa::build(&[(&id, 0)], |r| r);
        let m = dfa.longest_match(b"abc", 0);
        assert_eq!(m.best, Some((3, 0)));
        assert_eq!(m.examined_end, 4);
    }

    #[test]
    fn test_bounded_repeat() {
        let p = Pattern::class(CharSet::digits()).times(2, Some(3));
        let dfa = Dfa::build(&[(&p, 0)], |r| r);
        assert_eq!(dfa.longest_match(b"1", 0).best, None);
        assert_eq!(dfa.longest_match(b"12", 0).best, Some((2, 0)));
        assert_eq!(dfa.longest_match(b"12345", 0).best, Some((3, 0)));
    }

    #[test]
    fn test_overlapping_classes_split() {
        let a = Pattern::seq([Pattern::class(CharSet::range('a', 'm')), Pattern::literal("1")]);
        let b = Pattern::seq([Pattern::class(CharSet::range('h', 'z')), Pattern::literal("2")]);
        let dfa = Dfa::build(&[(&a, 0), (&b, 1)], |r| r);
        assert_eq!(dfa.longest_match(b"j1", 0).best, Some((2, 0)));
        assert_eq!(dfa.longest_match(b"j2", 0).best, Some((2, 1)));
        assert_eq!(dfa.longest_match(b"b2", 0).best, None);
    }

    #[test]
    fn test_matches_exactly() {
        let dfa = Dfa::build(&[(&ident(), 0)], |r| r);
        assert!(dfa.matches_exactly(b"push1"));
        assert!(!dfa.matches_exactly(b"0x1"));
        assert!(!dfa.matches_exactly(b""));
    }

    #[test]
    fn test_construction_is_deterministic() {
        let id = ident();
        let num = Pattern::class(CharSet::digits()).repeat1();
        let a = Dfa::build(&[(&id, 0), (&num, 1)], |r| r);
        let b = Dfa::build(&[(&id, 0), (&num, 1)], |r| r);
        assert_eq!(a, b);
    }
}
