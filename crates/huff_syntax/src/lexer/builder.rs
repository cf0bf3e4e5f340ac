use super::dfa::Dfa;
use super::pattern::Pattern;
use super::token::{LexerState, ModeId, Token};
use crate::error::{LexError, LexerBuildError};
use crate::syntax::{SyntaxKind, TextRange, TokenFlags};
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// A token rule: a pattern producing `kind` while the lexer is in `mode`
#[derive(Debug, Clone)]
pub struct LexRule {
    pub kind: SyntaxKind,
    pub pattern: Pattern,
    /// Higher priority wins between matches of equal length
    pub priority: i32,
    pub mode: ModeId,
    /// Mode to switch to after this token; `None` stays in `mode`
    pub next_mode: Option<ModeId>,
}

impl LexRule {
    #[must_use]
    pub const fn new(kind: SyntaxKind, pattern: Pattern) -> Self {
        Self {
            kind,
            pattern,
            priority: 0,
            mode: ModeId::DEFAULT,
            next_mode: None,
        }
    }

    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn in_mode(mut self, mode: ModeId) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn then_mode(mut self, mode: ModeId) -> Self {
        self.next_mode = Some(mode);
        self
    }
}

/// Collects token rules and compiles one automaton per mode
pub struct LexerBuilder {
    modes: Vec<CompactString>,
    rules: Vec<LexRule>,
    word: Option<Pattern>,
}

impl Default for LexerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LexerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            modes: vec![CompactString::const_new("default")],
            rules: Vec::new(),
            word: None,
        }
    }

    /// Declare a mode, or look up one already declared.
    pub fn mode(&mut self, name: &str) -> ModeId {
        if let Some(pos) = self.modes.iter().position(|m| m == name) {
            return ModeId::from_raw(u16::try_from(pos).unwrap_or(u16::MAX));
        }
        self.modes.push(CompactString::new(name));
        ModeId::from_raw(u16::try_from(self.modes.len() - 1).unwrap_or(u16::MAX))
    }

    /// Add a rule. Declaration order breaks ties between equal priorities.
    #[must_use]
    pub fn rule(mut self, rule: LexRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn push_rule(&mut self, rule: LexRule) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn token(self, kind: SyntaxKind, pattern: Pattern) -> Self {
        self.rule(LexRule::new(kind, pattern))
    }

    /// Pattern of the word token. Tokens whose whole text matches it are
    /// flagged so the parser can fall back to treating keywords as words.
    #[must_use]
    pub fn word(mut self, pattern: Pattern) -> Self {
        self.word = Some(pattern);
        self
    }

    pub fn set_word(&mut self, pattern: Pattern) {
        self.word = Some(pattern);
    }

    /// Compile the rules.
    ///
    /// # Errors
    ///
    /// Fails if a pattern accepts the empty string or a rule names a mode
    /// that was never declared.
    pub fn build(self) -> Result<Lexer, LexerBuildError> {
        for rule in &self.rules {
            if rule.pattern.matches_empty() {
                return Err(LexerBuildError::EmptyPattern { kind: rule.kind });
            }
            for mode in std::iter::once(rule.mode).chain(rule.next_mode) {
                if mode.index() >= self.modes.len() {
                    return Err(LexerBuildError::UnknownMode {
                        kind: rule.kind,
                        mode: mode.index(),
                    });
                }
            }
        }

        let rank = |rule: u32| {
            let priority = self.rules[rule as usize].priority;
            (std::cmp::Reverse(priority), rule)
        };

        let modes = self
            .modes
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let rules: Vec<(&Pattern, u32)> = self
                    .rules
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.mode.index() == index)
                    .map(|(i, r)| (&r.pattern, u32::try_from(i).unwrap_or(u32::MAX)))
                    .collect();
                let dfa = Dfa::build(&rules, rank);
                tracing::trace!(mode = %name, rules = rules.len(), states = dfa.state_count(), "compiled lexer mode");
                LexMode {
                    name: name.clone(),
                    dfa,
                }
            })
            .collect();

        let word = self.word.as_ref().map(|p| Dfa::build(&[(p, 0)], |r| r));

        Ok(Lexer {
            modes,
            rules: self
                .rules
                .iter()
                .map(|r| CompiledRule {
                    kind: r.kind,
                    mode: r.mode,
                    next_mode: r.next_mode,
                })
                .collect(),
            word,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
struct LexMode {
    name: CompactString,
    dfa: Dfa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
struct CompiledRule {
    kind: SyntaxKind,
    mode: ModeId,
    next_mode: Option<ModeId>,
}

/// Compiled, immutable lexer
///
/// Matching is maximal munch: the longest match wins, then the higher
/// priority, then the rule declared first.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Lexer {
    modes: Vec<LexMode>,
    rules: Vec<CompiledRule>,
    word: Option<Dfa>,
}

impl Lexer {
    /// Lex one token at `state`. Returns `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`LexError`] when no rule matches at the current byte. The
    /// error converts into a one-byte error token with
    /// [`LexError::into_token`].
    pub fn next_token(&self, input: &[u8], state: &LexerState) -> Option<Result<Token, LexError>> {
        let byte = *input.get(state.pos)?;
        let Some(mode) = self.modes.get(state.mode.index()) else {
            return Some(Err(LexError::new(state, byte, state.pos + 1)));
        };

        let found = mode.dfa.longest_match(input, state.pos);
        let Some((len, rule)) = found.best else {
            return Some(Err(LexError::new(state, byte, found.examined_end)));
        };
        let rule = self.rules[rule as usize];

        let end = state.pos + len;
        let text = &input[state.pos..end];
        let mut flags = TokenFlags::empty();
        if self.word.as_ref().is_some_and(|w| w.matches_exactly(text)) {
            flags = flags.union(TokenFlags::WORD);
        }

        Some(Ok(Token {
            kind: rule.kind,
            range: TextRange::new(state.offset(), crate::syntax::TextSize::from_usize(end)),
            start: state.point,
            end: state.point.advance(text),
            mode: state.mode,
            next_mode: rule.next_mode.unwrap_or(state.mode),
            lookahead: u32::try_from(found.examined_end.saturating_sub(end)).unwrap_or(u32::MAX),
            flags,
        }))
    }

    /// Lex the whole input. Unmatched bytes become error tokens, so the
    /// lengths of the returned tokens always add up to `input.len()`.
    #[must_use]
    pub fn tokenize(&self, input: &[u8]) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut state = LexerState::new();
        while let Some(result) = self.next_token(input, &state) {
            let token = result.unwrap_or_else(|err| {
                tracing::debug!(%err, "lex error");
                err.into_token()
            });
            state = LexerState::after(&token);
            tokens.push(token);
        }
        tokens
    }

    #[must_use]
    pub fn mode_count(&self) -> usize {
        self.modes.len()
    }

    #[must_use]
    pub fn mode_name(&self, mode: ModeId) -> Option<&str> {
        self.modes.get(mode.index()).map(|m| m.name.as_str())
    }

    #[must_use]
    pub fn mode_id(&self, name: &str) -> Option<ModeId> {
        self.modes
            .iter()
            .position(|m| m.name == name)
            .and_then(|pos| u16::try_from(pos).ok())
            .map(ModeId::from_raw)
    }

    /// Mode the lexer continues in after a token of `kind` lexed in `mode`.
    #[must_use]
    pub fn mode_after(&self, kind: SyntaxKind, mode: ModeId) -> ModeId {
        self.rules
            .iter()
            .find(|rule| rule.kind == kind && rule.mode == mode)
            .and_then(|rule| rule.next_mode)
            .unwrap_or(mode)
    }

    /// Total DFA states across all modes.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.modes.iter().map(|m| m.dfa.state_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::CharSet;

    const IDENT: SyntaxKind = SyntaxKind::from_raw(2);
    const NUMBER: SyntaxKind = SyntaxKind::from_raw(3);
    const MACRO: SyntaxKind = SyntaxKind::from_raw(4);
    const WS: SyntaxKind = SyntaxKind::from_raw(5);
    const OPEN: SyntaxKind = SyntaxKind::from_raw(6);
    const BODY: SyntaxKind = SyntaxKind::from_raw(7);
    const CLOSE: SyntaxKind = SyntaxKind::from_raw(8);

    fn ident() -> Pattern {
        Pattern::seq([
            Pattern::class(CharSet::alphabetic().union(&CharSet::single(b'_'))),
            Pattern::class(CharSet::alphanumeric().union(&CharSet::single(b'_'))).repeat(),
        ])
    }

    fn lexer() -> Lexer {
        let mut builder = LexerBuilder::new();
        let comment = builder.mode("comment");
        builder
            .rule(LexRule::new(MACRO, Pattern::literal("macro")))
            .rule(LexRule::new(OPEN, Pattern::literal("/*")).then_mode(comment))
            .rule(
                LexRule::new(
                    BODY,
                    Pattern::alt([
                        Pattern::class(CharSet::single(b'*').negate()),
                        Pattern::seq([
                            Pattern::literal("*").repeat1(),
                            Pattern::class(CharSet::of("*/").negate()),
                        ]),
                    ])
                    .repeat1(),
                )
                .in_mode(comment),
            )
            .rule(
                LexRule::new(CLOSE, Pattern::seq([Pattern::literal("*").repeat1(), Pattern::literal("/")]))
                    .in_mode(comment)
                    .then_mode(ModeId::DEFAULT),
            )
            .token(IDENT, ident())
            .token(NUMBER, Pattern::class(CharSet::digits()).repeat1())
            .token(WS, Pattern::class(CharSet::whitespace()).repeat1())
            .word(ident())
            .build()
            .unwrap()
    }

    fn kinds(tokens: &[Token]) -> Vec<SyntaxKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keyword_vs_identifier() {
        let tokens = lexer().tokenize(b"macro macros");
        assert_eq!(kinds(&tokens), vec![MACRO, WS, IDENT]);
        assert!(tokens[0].is_word());
        assert!(tokens[2].is_word());
    }

    #[test]
    fn test_priority_overrides_declaration_order() {
        let lexer = LexerBuilder::new()
            .token(MACRO, Pattern::literal("macro"))
            .rule(LexRule::new(IDENT, ident()).priority(1))
            .build()
            .unwrap();
        assert_eq!(kinds(&lexer.tokenize(b"macro")), vec![IDENT]);
    }

    #[test]
    fn test_modes() {
        let lexer = lexer();
        let tokens = lexer.tokenize(b"/* a * b **/x");
        assert_eq!(kinds(&tokens), vec![OPEN, BODY, CLOSE, IDENT]);
        assert_eq!(tokens[1].mode, lexer.mode_id("comment").unwrap());
        assert_eq!(tokens[3].mode, ModeId::DEFAULT);
    }

    #[test]
    fn test_mode_after() {
        let lexer = lexer();
        let comment = lexer.mode_id("comment").unwrap();
        assert_eq!(lexer.mode_after(OPEN, ModeId::DEFAULT), comment);
        assert_eq!(lexer.mode_after(BODY, comment), comment);
        assert_eq!(lexer.mode_after(CLOSE, comment), ModeId::DEFAULT);
        assert_eq!(lexer.mode_after(SyntaxKind::ERROR, comment), comment);
    }

    #[test]
    fn test_mode_after_depends_on_mode() {
        let mut builder = LexerBuilder::new();
        let inner = builder.mode("inner");
        let lexer = builder
            .rule(LexRule::new(OPEN, Pattern::literal("|")).then_mode(inner))
            .rule(LexRule::new(OPEN, Pattern::literal("|")).in_mode(inner).then_mode(ModeId::DEFAULT))
            .rule(LexRule::new(IDENT, ident()).in_mode(inner))
            .build()
            .unwrap();
        assert_eq!(lexer.mode_after(OPEN, ModeId::DEFAULT), inner);
        assert_eq!(lexer.mode_after(OPEN, inner), ModeId::DEFAULT);
        assert_eq!(kinds(&lexer.tokenize(b"|ab|")), vec![OPEN, IDENT, OPEN]);
    }

    #[test]
    fn test_unterminated_match_error_keeps_lookahead() {
        let lexer = LexerBuilder::new()
            .token(
                NUMBER,
                Pattern::seq([
                    Pattern::literal("\""),
                    Pattern::class(CharSet::alphabetic()).repeat(),
                    Pattern::literal("\""),
                ]),
            )
            .token(IDENT, ident())
            .build()
            .unwrap();
        let tokens = lexer.tokenize(b"\"abc");
        assert_eq!(kinds(&tokens), vec![SyntaxKind::ERROR, IDENT]);
        // the failed match read `abc` and peeked at end of input
        assert_eq!(tokens[0].lookahead, 4);
    }

    #[test]
    fn test_unrecognized_byte_becomes_error_token() {
        let lexer = lexer();
        let state = LexerState::new();
        let err = lexer.next_token(b"$x", &state).unwrap().unwrap_err();
        assert_eq!(err.byte, b'$');

        let tokens = lexer.tokenize(b"$x");
        assert_eq!(kinds(&tokens), vec![SyntaxKind::ERROR, IDENT]);
        assert!(tokens[0].is_error());
        assert_eq!(tokens[0].range.len(), 1.into());
    }

    #[test]
    fn test_tokens_cover_input() {
        let input = b"macro 12 /* c */ ?";
        let tokens = lexer().tokenize(input);
        let total: u32 = tokens.iter().map(|t| u32::from(t.range.len())).sum();
        assert_eq!(total as usize, input.len());
    }

    #[test]
    fn test_positions() {
        let tokens = lexer().tokenize(b"macro\n  x");
        let last = tokens.last().unwrap();
        assert_eq!(last.start, crate::syntax::LineCol::new(1, 2));
        assert_eq!(last.end, crate::syntax::LineCol::new(1, 3));
    }

    #[test]
    fn test_lookahead_recorded() {
        let tokens = lexer().tokenize(b"ab cd");
        assert_eq!(tokens[0].lookahead, 1);
        assert_eq!(tokens[2].lookahead, 1);
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let result = LexerBuilder::new()
            .token(NUMBER, Pattern::class(CharSet::digits()).repeat())
            .build();
        assert!(matches!(result, Err(LexerBuildError::EmptyPattern { .. })));
    }
}
