//! Conflict resolution for table construction
//!
//! Reductions are compared pairwise in production order first, then the
//! surviving reduction is weighed against the shift. Each comparison tries,
//! in order: static precedence, associativity (shift/reduce only), dynamic
//! precedence and finally declaration order for rules that share a
//! left-hand side or were listed together as expected conflicts.

use super::{Action, ProductionId, StateId};
use crate::error::{ConflictKind, ConflictReport};
use crate::grammar::{Assoc, NormalizedGrammar};
use crate::syntax::SyntaxKind;
use compact_str::CompactString;
use std::cmp::Ordering;

/// An LR item core: production and dot position
pub(crate) type Core = (ProductionId, u32);

/// The shift side of a table cell
pub(crate) struct ShiftCandidate<'a> {
    pub target: StateId,
    /// Items with the lookahead right after the dot
    pub items: &'a [Core],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Shift,
    Reduce,
}

pub(crate) struct ConflictResolver<'g> {
    grammar: &'g NormalizedGrammar,
}

impl<'g> ConflictResolver<'g> {
    pub fn new(grammar: &'g NormalizedGrammar) -> Self {
        Self { grammar }
    }

    /// Pick the action for one cell, `Ok(None)` meaning the cell stays empty.
    ///
    /// `reduces` must be sorted by production id.
    pub fn resolve(
        &self,
        state: StateId,
        lookahead: SyntaxKind,
        shift: Option<ShiftCandidate<'_>>,
        reduces: &[ProductionId],
    ) -> Result<Option<Action>, ConflictReport> {
        let Some((&first, rest)) = reduces.split_first() else {
            return Ok(shift.map(|s| Action::Shift(s.target)));
        };

        let mut winner = first;
        for &other in rest {
            winner = self.prefer_reduce(winner, other).ok_or_else(|| {
                let items = reduces.iter().map(|&p| (p, self.len(p))).collect::<Vec<_>>();
                self.report(state, lookahead, ConflictKind::ReduceReduce, &items)
            })?;
        }

        if !rest.is_empty() {
            tracing::trace!(
                state,
                lookahead = %self.grammar.display_symbol(lookahead),
                production = winner,
                "resolved reduce/reduce"
            );
        }

        let Some(shift) = shift else {
            return Ok(Some(Self::reduce_action(winner)));
        };

        match self.shift_or_reduce(&shift, winner) {
            Some(choice) => {
                tracing::trace!(
                    state,
                    lookahead = %self.grammar.display_symbol(lookahead),
                    production = winner,
                    ?choice,
                    "resolved shift/reduce"
                );
                Ok(Some(match choice {
                    Choice::Shift => Action::Shift(shift.target),
                    Choice::Reduce => Self::reduce_action(winner),
                }))
            }
            None => {
                let mut items = shift.items.to_vec();
                items.push((winner, self.len(winner)));
                Err(self.report(state, lookahead, ConflictKind::ShiftReduce, &items))
            }
        }
    }

    const fn reduce_action(production: ProductionId) -> Action {
        if production == 0 {
            Action::Accept
        } else {
            Action::Reduce(production)
        }
    }

    fn len(&self, production: ProductionId) -> u32 {
        let steps = self.grammar.productions[production as usize].steps.len();
        u32::try_from(steps).unwrap_or(u32::MAX)
    }

    fn prefer_reduce(&self, a: ProductionId, b: ProductionId) -> Option<ProductionId> {
        let pa = &self.grammar.productions[a as usize];
        let pb = &self.grammar.productions[b as usize];

        if pa.precedence.is_declared() || pb.precedence.is_declared() {
            match pa.precedence.value().cmp(&pb.precedence.value()) {
                Ordering::Greater => return Some(a),
                Ordering::Less => return Some(b),
                Ordering::Equal => {}
            }
        }
        match pa.dynamic_precedence.cmp(&pb.dynamic_precedence) {
            Ordering::Greater => return Some(a),
            Ordering::Less => return Some(b),
            Ordering::Equal => {}
        }
        if pa.lhs == pb.lhs || self.grammar.declared_conflict(pa.lhs, pb.lhs) {
            return Some(a.min(b));
        }
        None
    }

    fn shift_or_reduce(&self, shift: &ShiftCandidate<'_>, reduce: ProductionId) -> Option<Choice> {
        let productions = &self.grammar.productions;
        let reduced = &productions[reduce as usize];

        let shift_steps = shift
            .items
            .iter()
            .filter_map(|&(p, dot)| productions[p as usize].steps.get(dot as usize));
        let shift_declared = shift_steps.clone().any(|s| s.precedence.is_declared());
        let shift_level = shift_steps.map(|s| s.precedence.value()).max().unwrap_or(0);

        if shift_declared || reduced.precedence.is_declared() {
            match reduced.precedence.value().cmp(&shift_level) {
                Ordering::Greater => return Some(Choice::Reduce),
                Ordering::Less => return Some(Choice::Shift),
                Ordering::Equal => match reduced.precedence.assoc {
                    Some(Assoc::Left) => return Some(Choice::Reduce),
                    Some(Assoc::Right) => return Some(Choice::Shift),
                    Some(Assoc::None) | None => {}
                },
            }
        }

        let shift_dynamic = shift
            .items
            .iter()
            .map(|&(p, _)| productions[p as usize].dynamic_precedence)
            .max()
            .unwrap_or(0);
        match reduced.dynamic_precedence.cmp(&shift_dynamic) {
            Ordering::Greater => return Some(Choice::Reduce),
            Ordering::Less => return Some(Choice::Shift),
            Ordering::Equal => {}
        }

        let grouped = shift
            .items
            .iter()
            .any(|&(p, _)| self.grammar.declared_conflict(productions[p as usize].lhs, reduced.lhs));
        if grouped {
            let earliest_shift = shift.items.iter().map(|&(p, _)| p).min().unwrap_or(u32::MAX);
            return Some(if reduce < earliest_shift {
                Choice::Reduce
            } else {
                Choice::Shift
            });
        }
        None
    }

    fn report(
        &self,
        state: StateId,
        lookahead: SyntaxKind,
        kind: ConflictKind,
        items: &[Core],
    ) -> ConflictReport {
        ConflictReport {
            state,
            lookahead: CompactString::new(self.grammar.name(lookahead)),
            kind,
            items: items
                .iter()
                .map(|&(p, dot)| self.grammar.render_item(p, dot as usize))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder, normalize};

    fn arithmetic(left: bool) -> NormalizedGrammar {
        let sum = Expr::seq([Expr::sym("expr"), Expr::string("+"), Expr::sym("expr")]);
        let sum = if left {
            Expr::prec_left(1, sum)
        } else {
            Expr::prec_right(1, sum)
        };
        let grammar = GrammarBuilder::new("t")
            .rule("expr", Expr::choice([sum, Expr::string("1")]))
            .build()
            .unwrap();
        normalize(&grammar).unwrap()
    }

    fn sum_production(g: &NormalizedGrammar) -> ProductionId {
        g.productions_of(g.start)[0]
    }

    #[test]
    fn test_left_assoc_reduces() {
        let g = arithmetic(true);
        let resolver = ConflictResolver::new(&g);
        let p = sum_production(&g);
        let shift = ShiftCandidate {
            target: 7,
            items: &[(p, 1)],
        };
        let plus = g.productions[p as usize].steps[1].symbol;
        let action = resolver.resolve(3, plus, Some(shift), &[p]).unwrap();
        assert_eq!(action, Some(Action::Reduce(p)));
    }

    #[test]
    fn test_right_assoc_shifts() {
        let g = arithmetic(false);
        let resolver = ConflictResolver::new(&g);
        let p = sum_production(&g);
        let shift = ShiftCandidate {
            target: 7,
            items: &[(p, 1)],
        };
        let plus = g.productions[p as usize].steps[1].symbol;
        let action = resolver.resolve(3, plus, Some(shift), &[p]).unwrap();
        assert_eq!(action, Some(Action::Shift(7)));
    }

    #[test]
    fn test_accept_is_production_zero() {
        let g = arithmetic(true);
        let resolver = ConflictResolver::new(&g);
        let action = resolver.resolve(1, SyntaxKind::END, None, &[0]).unwrap();
        assert_eq!(action, Some(Action::Accept));
    }

    #[test]
    fn test_unrelated_reduces_conflict() {
        let grammar = GrammarBuilder::new("t")
            .rule("file", Expr::choice([Expr::sym("a"), Expr::sym("b")]))
            .rule("a", Expr::string("x"))
            .rule("b", Expr::string("x"))
            .build()
            .unwrap();
        let g = normalize(&grammar).unwrap();
        let resolver = ConflictResolver::new(&g);
        let a = SyntaxKind::from_raw(4);
        let b = SyntaxKind::from_raw(5);
        let pa = g.productions_of(a)[0];
        let pb = g.productions_of(b)[0];
        let report = resolver
            .resolve(2, SyntaxKind::END, None, &[pa, pb])
            .unwrap_err();
        assert_eq!(report.kind, ConflictKind::ReduceReduce);
        assert_eq!(report.lookahead, "end");
        assert_eq!(report.items, vec!["a → 'x' •", "b → 'x' •"]);
    }

    #[test]
    fn test_declared_group_resolves_by_order() {
        let grammar = GrammarBuilder::new("t")
            .rule("file", Expr::choice([Expr::sym("a"), Expr::sym("b")]))
            .rule("a", Expr::string("x"))
            .rule("b", Expr::string("x"))
            .conflict(["a", "b"])
            .build()
            .unwrap();
        let g = normalize(&grammar).unwrap();
        let resolver = ConflictResolver::new(&g);
        let pa = g.productions_of(SyntaxKind::from_raw(4))[0];
        let pb = g.productions_of(SyntaxKind::from_raw(5))[0];
        let action = resolver.resolve(2, SyntaxKind::END, None, &[pa, pb]).unwrap();
        assert_eq!(action, Some(Action::Reduce(pa)));
    }
}
