//! Lowering of [`Grammar`] rules into flat productions
//!
//! Choices and optional parts are expanded into separate alternatives,
//! repetitions become hidden left-recursive auxiliary rules, and fields and
//! precedences are pushed down onto the individual steps.

use super::builder::{DEFAULT_MODE, Grammar};
use super::expr::{Expr, Precedence};
use crate::error::GrammarError;
use crate::language::SymbolInfo;
use crate::lexer::{ModeId, Pattern};
use crate::syntax::{FieldId, SyntaxKind};
use compact_str::{CompactString, format_compact};
use hashbrown::HashMap;
use std::collections::BTreeSet;

/// Upper bound on the alternatives one rule may expand to.
const MAX_ALTERNATIVES: usize = 4096;

/// Name of the synthetic rule wrapping the start symbol.
pub(crate) const ACCEPT_RULE: &str = "$accept";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Step {
    pub symbol: SyntaxKind,
    pub field: Option<FieldId>,
    pub precedence: Precedence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Production {
    pub lhs: SyntaxKind,
    pub steps: Vec<Step>,
    pub precedence: Precedence,
    pub dynamic_precedence: i32,
}

#[derive(Debug, Clone)]
pub(crate) struct LexicalToken {
    pub kind: SyntaxKind,
    pub pattern: Pattern,
    pub priority: i32,
    pub mode: ModeId,
    pub next_mode: Option<ModeId>,
}

/// Grammar after lowering, in the form the table generator consumes
#[derive(Debug, Clone)]
pub(crate) struct NormalizedGrammar {
    pub name: CompactString,
    pub version: CompactString,
    pub symbols: Vec<SymbolInfo>,
    pub terminal_count: usize,
    /// `productions[0]` is `$accept → start`
    pub productions: Vec<Production>,
    pub by_lhs: Vec<Vec<u32>>,
    pub start: SyntaxKind,
    pub fields: Vec<CompactString>,
    pub extras: Vec<SyntaxKind>,
    pub word: Option<SyntaxKind>,
    pub word_pattern: Option<Pattern>,
    pub conflict_groups: Vec<Vec<SyntaxKind>>,
    pub declared_rules: Vec<SyntaxKind>,
    pub lexical: Vec<LexicalToken>,
    pub modes: Vec<CompactString>,
}

impl NormalizedGrammar {
    pub fn is_terminal(&self, kind: SyntaxKind) -> bool {
        kind.index() < self.terminal_count
    }

    pub fn name(&self, kind: SyntaxKind) -> &str {
        self.symbols
            .get(kind.index())
            .map_or("?", |s| s.name.as_str())
    }

    pub fn productions_of(&self, kind: SyntaxKind) -> &[u32] {
        self.by_lhs.get(kind.index()).map_or(&[], Vec::as_slice)
    }

    /// True if both rules appear together in a declared conflict group.
    pub fn declared_conflict(&self, a: SyntaxKind, b: SyntaxKind) -> bool {
        self.conflict_groups
            .iter()
            .any(|group| group.contains(&a) && group.contains(&b))
    }

    /// Render an LR item as `lhs → a • b`.
    pub fn render_item(&self, production: u32, dot: usize) -> String {
        let Some(prod) = self.productions.get(production as usize) else {
            return String::new();
        };
        let mut out = format!("{} →", self.name(prod.lhs));
        for (i, step) in prod.steps.iter().enumerate() {
            if i == dot {
                out.push_str(" •");
            }
            out.push(' ');
            out.push_str(&self.display_symbol(step.symbol));
        }
        if dot >= prod.steps.len() {
            out.push_str(" •");
        }
        out
    }

    pub fn display_symbol(&self, kind: SyntaxKind) -> String {
        match self.symbols.get(kind.index()) {
            Some(info) if info.terminal && !info.named => format!("'{}'", info.name),
            Some(info) => info.name.to_string(),
            None => "?".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Ctx {
    precedence: Precedence,
    field: Option<FieldId>,
    dynamic: Option<i32>,
}

#[derive(Debug, Clone)]
struct Alt {
    steps: Vec<Step>,
    dynamic: Option<i32>,
    empty_precedence: Precedence,
}

impl Alt {
    const fn empty(ctx: Ctx) -> Self {
        Self {
            steps: Vec::new(),
            dynamic: ctx.dynamic,
            empty_precedence: ctx.precedence,
        }
    }

    fn single(symbol: SyntaxKind, ctx: Ctx) -> Self {
        Self {
            steps: vec![Step {
                symbol,
                field: ctx.field,
                precedence: ctx.precedence,
            }],
            dynamic: ctx.dynamic,
            empty_precedence: ctx.precedence,
        }
    }
}

fn max_dynamic(a: Option<i32>, b: Option<i32>) -> Option<i32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

struct Normalizer<'g> {
    grammar: &'g Grammar,
    symbols: Vec<SymbolInfo>,
    names: HashMap<CompactString, SyntaxKind, ahash::RandomState>,
    literals: HashMap<CompactString, SyntaxKind, ahash::RandomState>,
    inline_patterns: HashMap<Pattern, SyntaxKind, ahash::RandomState>,
    fields: HashMap<CompactString, FieldId, ahash::RandomState>,
    productions: Vec<Production>,
    aux_counter: HashMap<SyntaxKind, u32, ahash::RandomState>,
    current_rule: SyntaxKind,
}

pub(crate) fn normalize(grammar: &Grammar) -> Result<NormalizedGrammar, GrammarError> {
    let mut n = Normalizer {
        grammar,
        symbols: Vec::new(),
        names: HashMap::default(),
        literals: HashMap::default(),
        inline_patterns: HashMap::default(),
        fields: HashMap::default(),
        productions: Vec::new(),
        aux_counter: HashMap::default(),
        current_rule: SyntaxKind::END,
    };

    n.push_symbol(SymbolInfo::terminal("end", false, false));
    n.push_symbol(SymbolInfo::terminal("ERROR", true, true));

    // Literal strings and inline patterns first, so that on equal match
    // length a literal beats a named pattern by declaration order.
    let mut literal_order: Vec<CompactString> = Vec::new();
    let mut pattern_order: Vec<Pattern> = Vec::new();
    let mut field_names: BTreeSet<CompactString> = BTreeSet::new();
    for (_, expr) in &grammar.rules {
        expr.walk(&mut |e| match e {
            Expr::String(text) => {
                let declared = grammar.tokens.iter().any(|t| t.name == *text && t.is_literal());
                if !declared && !literal_order.contains(text) {
                    literal_order.push(text.clone());
                }
            }
            Expr::Pattern(pattern) => {
                if !pattern_order.contains(pattern) {
                    pattern_order.push(pattern.clone());
                }
            }
            Expr::Field { name, .. } => {
                field_names.insert(name.clone());
            }
            _ => {}
        });
    }

    let mut lexical = Vec::new();
    for text in literal_order {
        let kind = n.push_symbol(SymbolInfo::terminal(&text, true, false));
        n.literals.insert(text.clone(), kind);
        lexical.push(LexicalToken {
            kind,
            pattern: Pattern::Literal(text),
            priority: 0,
            mode: ModeId::DEFAULT,
            next_mode: None,
        });
    }
    for (i, pattern) in pattern_order.into_iter().enumerate() {
        let kind = n.push_symbol(SymbolInfo::terminal(&format!("_token{}", i + 1), false, false));
        n.inline_patterns.insert(pattern.clone(), kind);
        lexical.push(LexicalToken {
            kind,
            pattern,
            priority: 0,
            mode: ModeId::DEFAULT,
            next_mode: None,
        });
    }
    for token in &grammar.tokens {
        let literal = token.is_literal();
        let info = SymbolInfo::terminal(&token.name, !token.name.starts_with('_'), !literal);
        let kind = n.push_symbol(info);
        n.names.insert(token.name.clone(), kind);
        if literal {
            n.literals.insert(token.name.clone(), kind);
        }
        lexical.push(LexicalToken {
            kind,
            pattern: token.pattern.clone(),
            priority: token.priority,
            mode: mode_id(grammar, token.mode.as_deref()),
            next_mode: token.enter.as_deref().map(|m| mode_id(grammar, Some(m))),
        });
    }
    let terminal_count = n.symbols.len();

    let mut declared_rules = Vec::with_capacity(grammar.rules.len());
    for (name, _) in &grammar.rules {
        let kind = n.push_symbol(SymbolInfo::nonterminal(name, !name.starts_with('_')));
        n.names.insert(name.clone(), kind);
        declared_rules.push(kind);
    }
    let accept = n.push_symbol(SymbolInfo::nonterminal(ACCEPT_RULE, false));

    for (i, name) in field_names.iter().enumerate() {
        n.fields
            .insert(name.clone(), FieldId::from_raw(u16::try_from(i).unwrap_or(u16::MAX)));
    }

    let start = n.lookup(&grammar.start)?;
    n.productions.push(Production {
        lhs: accept,
        steps: vec![Step {
            symbol: start,
            field: None,
            precedence: Precedence::default(),
        }],
        precedence: Precedence::default(),
        dynamic_precedence: 0,
    });

    for ((name, expr), &kind) in grammar.rules.iter().zip(&declared_rules) {
        n.current_rule = kind;
        let alts = n.flatten(expr, Ctx::default())?;
        if alts.len() > MAX_ALTERNATIVES {
            return Err(GrammarError::TooManyAlternatives {
                rule: name.clone(),
                limit: MAX_ALTERNATIVES,
            });
        }
        n.push_alternatives(kind, alts);
    }

    if n.symbols.len() > usize::from(u16::MAX) {
        return Err(GrammarError::TooManySymbols(usize::from(u16::MAX)));
    }

    let mut by_lhs = vec![Vec::new(); n.symbols.len()];
    for (id, production) in n.productions.iter().enumerate() {
        by_lhs[production.lhs.index()].push(u32::try_from(id).unwrap_or(u32::MAX));
    }

    let extras = grammar
        .extras
        .iter()
        .map(|name| n.lookup(name))
        .collect::<Result<Vec<_>, _>>()?;
    let word = grammar.word.as_ref().map(|name| n.lookup(name)).transpose()?;
    let word_pattern = grammar.word.as_ref().and_then(|name| {
        grammar
            .tokens
            .iter()
            .find(|t| t.name == *name)
            .map(|t| t.pattern.clone())
    });
    let conflict_groups = grammar
        .conflicts
        .iter()
        .map(|group| group.iter().map(|name| n.lookup(name)).collect())
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        grammar = %grammar.name,
        terminals = terminal_count,
        symbols = n.symbols.len(),
        productions = n.productions.len(),
        fields = field_names.len(),
        "normalized grammar"
    );

    Ok(NormalizedGrammar {
        name: grammar.name.clone(),
        version: grammar.version.clone(),
        symbols: n.symbols,
        terminal_count,
        productions: n.productions,
        by_lhs,
        start,
        fields: field_names.into_iter().collect(),
        extras,
        word,
        word_pattern,
        conflict_groups,
        declared_rules,
        lexical,
        modes: grammar.modes.clone(),
    })
}

fn mode_id(grammar: &Grammar, name: Option<&str>) -> ModeId {
    let name = name.unwrap_or(DEFAULT_MODE);
    let index = grammar.modes.iter().position(|m| m == name).unwrap_or(0);
    ModeId::from_raw(u16::try_from(index).unwrap_or(0))
}

impl Normalizer<'_> {
    fn push_symbol(&mut self, info: SymbolInfo) -> SyntaxKind {
        let kind = SyntaxKind::from_raw(u16::try_from(self.symbols.len()).unwrap_or(u16::MAX));
        self.symbols.push(info);
        kind
    }

    fn lookup(&self, name: &str) -> Result<SyntaxKind, GrammarError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| GrammarError::UndefinedSymbol {
                rule: CompactString::new(self.grammar.start.as_str()),
                symbol: CompactString::new(name),
            })
    }

    fn push_alternatives(&mut self, lhs: SyntaxKind, alts: Vec<Alt>) {
        let mut seen: Vec<Vec<Step>> = Vec::new();
        for alt in alts {
            if seen.contains(&alt.steps) {
                continue;
            }
            seen.push(alt.steps.clone());
            let precedence = alt
                .steps
                .last()
                .map_or(alt.empty_precedence, |s| s.precedence);
            self.productions.push(Production {
                lhs,
                steps: alt.steps,
                precedence,
                dynamic_precedence: alt.dynamic.unwrap_or(0),
            });
        }
    }

    fn flatten(&mut self, expr: &Expr, ctx: Ctx) -> Result<Vec<Alt>, GrammarError> {
        Ok(match expr {
            Expr::Blank => vec![Alt::empty(ctx)],
            Expr::String(text) => {
                let kind = self.literals.get(text).copied().unwrap_or(SyntaxKind::ERROR);
                vec![Alt::single(kind, ctx)]
            }
            Expr::Symbol(name) => vec![Alt::single(self.lookup(name)?, ctx)],
            Expr::Pattern(pattern) => {
                let kind = self
                    .inline_patterns
                    .get(pattern)
                    .copied()
                    .unwrap_or(SyntaxKind::ERROR);
                vec![Alt::single(kind, ctx)]
            }
            Expr::Seq(items) => {
                let mut acc = vec![Alt::empty(ctx)];
                for item in items {
                    let next = self.flatten(item, ctx)?;
                    let mut product = Vec::with_capacity(acc.len() * next.len());
                    for left in &acc {
                        for right in &next {
                            let mut steps = left.steps.clone();
                            steps.extend(right.steps.iter().cloned());
                            product.push(Alt {
                                steps,
                                dynamic: max_dynamic(left.dynamic, right.dynamic),
                                empty_precedence: left.empty_precedence,
                            });
                        }
                    }
                    if product.len() > MAX_ALTERNATIVES {
                        return Err(self.too_many());
                    }
                    acc = product;
                }
                acc
            }
            Expr::Choice(items) => {
                let mut alts = Vec::new();
                for item in items {
                    alts.extend(self.flatten(item, ctx)?);
                }
                alts
            }
            Expr::Optional(inner) => {
                let mut alts = self.flatten(inner, ctx)?;
                alts.push(Alt::empty(ctx));
                alts
            }
            Expr::Repeat1(inner) => self.repeat(inner, ctx)?,
            Expr::Repeat(inner) => {
                let mut alts = self.repeat(inner, ctx)?;
                if !alts.iter().any(|a| a.steps.is_empty()) {
                    alts.push(Alt::empty(ctx));
                }
                alts
            }
            Expr::Field { name, expr } => {
                let field = self.fields.get(name).copied();
                self.flatten(expr, Ctx { field, ..ctx })?
            }
            Expr::Prec { precedence, expr } => self.flatten(
                expr,
                Ctx {
                    precedence: *precedence,
                    ..ctx
                },
            )?,
            Expr::PrecDynamic { value, expr } => self.flatten(
                expr,
                Ctx {
                    dynamic: Some(*value),
                    ..ctx
                },
            )?,
        })
    }

    /// Lower `inner+` to a hidden rule `aux → aux inner | inner`.
    fn repeat(&mut self, inner: &Expr, ctx: Ctx) -> Result<Vec<Alt>, GrammarError> {
        let parent = self.current_rule;
        let counter = self.aux_counter.entry(parent).or_insert(0);
        *counter += 1;
        let name = format_compact!("{}_repeat{}", self.symbols[parent.index()].name, counter);
        let aux = self.push_symbol(SymbolInfo::nonterminal(&name, false));

        let alts = self.flatten(inner, ctx)?;
        let nullable = alts.iter().any(|a| a.steps.is_empty());
        let aux_step = Step {
            symbol: aux,
            field: None,
            precedence: ctx.precedence,
        };

        let mut lowered = Vec::new();
        for alt in alts.iter().filter(|a| !a.steps.is_empty()) {
            let mut steps = Vec::with_capacity(alt.steps.len() + 1);
            steps.push(aux_step.clone());
            steps.extend(alt.steps.iter().cloned());
            lowered.push(Alt {
                steps,
                dynamic: alt.dynamic,
                empty_precedence: alt.empty_precedence,
            });
        }
        lowered.extend(alts.into_iter().filter(|a| !a.steps.is_empty()));
        self.push_alternatives(aux, lowered);

        let mut result = vec![Alt::single(aux, Ctx { field: None, ..ctx })];
        if nullable {
            result.push(Alt::empty(ctx));
        }
        Ok(result)
    }

    fn too_many(&self) -> GrammarError {
        GrammarError::TooManyAlternatives {
            rule: self.symbols[self.current_rule.index()].name.clone(),
            limit: MAX_ALTERNATIVES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarBuilder, TokenDef};
    use crate::lexer::CharSet;

    fn grammar() -> Grammar {
        GrammarBuilder::new("t")
            .token(TokenDef::new("identifier", Pattern::class(CharSet::alphabetic()).repeat1()))
            .rule("file", Expr::sym("item").repeat())
            .rule(
                "item",
                Expr::seq([
                    Expr::string("macro"),
                    Expr::field("name", Expr::sym("identifier")),
                    Expr::string("(").optional(),
                ]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_symbol_layout() {
        let g = normalize(&grammar()).unwrap();
        let names: Vec<_> = g.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["end", "ERROR", "macro", "(", "identifier", "file", "item", "$accept", "file_repeat1"]
        );
        assert_eq!(g.terminal_count, 5);
        assert!(g.symbols[4].named);
        assert!(!g.symbols[2].named);
        assert!(!g.symbols[8].visible);
    }

    #[test]
    fn test_optional_expands_alternatives() {
        let g = normalize(&grammar()).unwrap();
        let item = SyntaxKind::from_raw(6);
        let rendered: Vec<_> = g
            .productions_of(item)
            .iter()
            .map(|&p| g.render_item(p, 0))
            .collect();
        assert_eq!(
            rendered,
            vec!["item → • 'macro' identifier '('", "item → • 'macro' identifier"]
        );
    }

    #[test]
    fn test_repeat_becomes_left_recursive_aux() {
        let g = normalize(&grammar()).unwrap();
        let aux = SyntaxKind::from_raw(8);
        let rendered: Vec<_> = g
            .productions_of(aux)
            .iter()
            .map(|&p| g.render_item(p, 2))
            .collect();
        assert_eq!(rendered, vec!["file_repeat1 → file_repeat1 item •", "file_repeat1 → item •"]);

        let file = SyntaxKind::from_raw(5);
        assert_eq!(g.productions_of(file).len(), 2);
    }

    #[test]
    fn test_fields_attach_to_steps() {
        let g = normalize(&grammar()).unwrap();
        assert_eq!(g.fields, vec![CompactString::new("name")]);
        let item = SyntaxKind::from_raw(6);
        let prod = &g.productions[g.productions_of(item)[0] as usize];
        assert_eq!(prod.steps[1].field, Some(FieldId::from_raw(0)));
        assert_eq!(prod.steps[0].field, None);
    }

    #[test]
    fn test_literals_lex_before_named_tokens() {
        let g = normalize(&grammar()).unwrap();
        let kinds: Vec<_> = g.lexical.iter().map(|t| t.kind.raw()).collect();
        assert_eq!(kinds, vec![2, 3, 4]);
    }

    #[test]
    fn test_precedence_comes_from_last_step() {
        let grammar = GrammarBuilder::new("t")
            .rule(
                "expr",
                Expr::choice([
                    Expr::prec_left(1, Expr::seq([Expr::sym("expr"), Expr::string("+"), Expr::sym("expr")])),
                    Expr::string("1"),
                ]),
            )
            .build()
            .unwrap();
        let g = normalize(&grammar).unwrap();
        let expr = g.start;
        let first = &g.productions[g.productions_of(expr)[0] as usize];
        assert_eq!(first.precedence, Precedence::with_assoc(1, crate::grammar::Assoc::Left));
        let second = &g.productions[g.productions_of(expr)[1] as usize];
        assert_eq!(second.precedence, Precedence::default());
    }

    #[test]
    fn test_nullable_repeat_body() {
        let grammar = GrammarBuilder::new("t")
            .rule("file", Expr::string("x").optional().repeat1())
            .build()
            .unwrap();
        let g = normalize(&grammar).unwrap();
        let file = g.start;
        // file → file_repeat1 | ε, and the aux rule never derives itself alone
        assert_eq!(g.productions_of(file).len(), 2);
        let aux = g.productions[g.productions_of(file)[0] as usize].steps[0].symbol;
        assert_eq!(g.name(aux), "file_repeat1");
        for &id in g.productions_of(aux) {
            let prod = &g.productions[id as usize];
            assert!(!(prod.steps.len() == 1 && prod.steps[0].symbol == aux));
        }
    }

    #[test]
    fn test_string_never_names_a_rule() {
        let grammar = GrammarBuilder::new("t")
            .rule("file", Expr::sym("macro").repeat())
            .rule("macro", Expr::seq([Expr::string("macro"), Expr::string(";")]))
            .build()
            .unwrap();
        let g = normalize(&grammar).unwrap();
        let rule = g.declared_rules[1];
        let prod = &g.productions[g.productions_of(rule)[0] as usize];
        assert!(g.is_terminal(prod.steps[0].symbol));
        assert_eq!(g.render_item(g.productions_of(rule)[0], 0), "macro → • 'macro' ';'");
    }
}
