use super::expr::Expr;
use crate::error::GrammarError;
use crate::lexer::Pattern;
use compact_str::CompactString;
use hashbrown::HashSet;
use lasso::{Rodeo, Spur};

/// A named token definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDef {
    pub name: CompactString,
    pub pattern: Pattern,
    /// Higher priority wins between matches of equal length
    pub priority: i32,
    /// Mode the token is recognised in; `None` means the default mode
    pub mode: Option<CompactString>,
    /// Mode entered after the token; `None` stays in the current mode
    pub enter: Option<CompactString>,
}

impl TokenDef {
    #[must_use]
    pub fn new(name: &str, pattern: Pattern) -> Self {
        Self {
            name: CompactString::new(name),
            pattern,
            priority: 0,
            mode: None,
            enter: None,
        }
    }

    /// A token named by its own text. Rules can refer to it with
    /// [`Expr::string`], so mode switches can be attached to literals.
    #[must_use]
    pub fn literal(text: &str) -> Self {
        Self::new(text, Pattern::literal(text))
    }

    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn in_mode(mut self, mode: &str) -> Self {
        self.mode = Some(CompactString::new(mode));
        self
    }

    #[must_use]
    pub fn enter(mut self, mode: &str) -> Self {
        self.enter = Some(CompactString::new(mode));
        self
    }

    /// True for tokens declared with [`TokenDef::literal`].
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.pattern.as_literal() == Some(self.name.as_str())
    }
}

/// Name of the lexer mode every grammar starts in.
pub const DEFAULT_MODE: &str = "default";

/// Builder for [`Grammar`]
///
/// The first rule added is the start rule unless [`GrammarBuilder::start`]
/// names another one.
pub struct GrammarBuilder {
    name: CompactString,
    version: CompactString,
    interner: Rodeo,
    tokens: Vec<TokenDef>,
    rules: Vec<(Spur, Expr)>,
    extras: Vec<CompactString>,
    word: Option<CompactString>,
    start: Option<CompactString>,
    conflicts: Vec<Vec<CompactString>>,
    modes: Vec<CompactString>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: CompactString::new(name),
            version: CompactString::const_new("0.0.0"),
            interner: Rodeo::new(),
            tokens: Vec::new(),
            rules: Vec::new(),
            extras: Vec::new(),
            word: None,
            start: None,
            conflicts: Vec::new(),
            modes: vec![CompactString::const_new(DEFAULT_MODE)],
        }
    }

    #[must_use]
    pub fn version(mut self, version: &str) -> Self {
        self.version = CompactString::new(version);
        self
    }

    #[must_use]
    pub fn token(mut self, token: TokenDef) -> Self {
        self.tokens.push(token);
        self
    }

    #[must_use]
    pub fn rule(mut self, name: &str, expr: Expr) -> Self {
        let spur = self.interner.get_or_intern(name);
        self.rules.push((spur, expr));
        self
    }

    /// Mark a token as trivia: it may appear between any two tokens and is
    /// attached to the tree without taking part in parsing.
    #[must_use]
    pub fn extra(mut self, token: &str) -> Self {
        self.extras.push(CompactString::new(token));
        self
    }

    /// Name the identifier-like token keywords fall back to.
    #[must_use]
    pub fn word(mut self, token: &str) -> Self {
        self.word = Some(CompactString::new(token));
        self
    }

    #[must_use]
    pub fn start(mut self, rule: &str) -> Self {
        self.start = Some(CompactString::new(rule));
        self
    }

    /// Declare rules whose conflicts may be settled by declaration order.
    #[must_use]
    pub fn conflict<'a>(mut self, rules: impl IntoIterator<Item = &'a str>) -> Self {
        self.conflicts
            .push(rules.into_iter().map(CompactString::new).collect());
        self
    }

    #[must_use]
    pub fn mode(mut self, name: &str) -> Self {
        if !self.modes.iter().any(|m| m == name) {
            self.modes.push(CompactString::new(name));
        }
        self
    }

    /// Validate the grammar.
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarError`] for duplicate or undefined names, a
    /// missing or hidden start rule, extras or word tokens that are not
    /// tokens, unknown lexer modes and tokens matching the empty string.
    pub fn build(self) -> Result<Grammar, GrammarError> {
        if self.rules.is_empty() {
            return Err(GrammarError::Empty);
        }
        let start = self.validate()?;

        let rules = self
            .rules
            .iter()
            .map(|(spur, expr)| (CompactString::new(self.interner.resolve(spur)), expr.clone()))
            .collect();

        Ok(Grammar {
            name: self.name,
            version: self.version,
            tokens: self.tokens,
            rules,
            extras: self.extras,
            word: self.word,
            start,
            conflicts: self.conflicts,
            modes: self.modes,
        })
    }

    /// Name checks over the borrowed builder. Returns the start rule.
    fn validate(&self) -> Result<CompactString, GrammarError> {
        let mut names: HashSet<&str, ahash::RandomState> = HashSet::default();
        for token in &self.tokens {
            if !names.insert(token.name.as_str()) {
                return Err(GrammarError::Duplicate(token.name.clone()));
            }
            if token.pattern.matches_empty() {
                return Err(GrammarError::EmptyToken(token.name.clone()));
            }
            for mode in token.mode.iter().chain(&token.enter) {
                if !self.modes.contains(mode) {
                    return Err(GrammarError::UnknownMode {
                        token: token.name.clone(),
                        mode: mode.clone(),
                    });
                }
            }
        }
        let token_names = names.clone();
        for (spur, _) in &self.rules {
            let name = self.interner.resolve(spur);
            if !names.insert(name) {
                return Err(GrammarError::Duplicate(CompactString::new(name)));
            }
        }

        for (spur, expr) in &self.rules {
            let rule = self.interner.resolve(spur);
            let mut missing = None;
            expr.walk(&mut |e| {
                if let Expr::Symbol(symbol) = e {
                    if missing.is_none() && !names.contains(symbol.as_str()) {
                        missing = Some(symbol.clone());
                    }
                }
            });
            if let Some(symbol) = missing {
                return Err(GrammarError::UndefinedSymbol {
                    rule: CompactString::new(rule),
                    symbol,
                });
            }
        }

        for name in self.extras.iter().chain(&self.word) {
            if !token_names.contains(name.as_str()) {
                return Err(GrammarError::NotAToken(name.clone()));
            }
        }

        for group in &self.conflicts {
            for name in group {
                if self.interner.get(name.as_str()).is_none() {
                    return Err(GrammarError::UndefinedSymbol {
                        rule: CompactString::const_new("<conflicts>"),
                        symbol: name.clone(),
                    });
                }
            }
        }

        let start = match &self.start {
            Some(start) => start.clone(),
            None => CompactString::new(self.interner.resolve(&self.rules[0].0)),
        };
        if self.interner.get(start.as_str()).is_none() {
            return Err(GrammarError::UndefinedStart(start));
        }
        if start.starts_with('_') {
            return Err(GrammarError::HiddenStart(start));
        }
        Ok(start)
    }
}

/// A validated grammar, ready for [`Grammar::compile`]
#[derive(Debug, Clone)]
pub struct Grammar {
    pub(crate) name: CompactString,
    pub(crate) version: CompactString,
    pub(crate) tokens: Vec<TokenDef>,
    pub(crate) rules: Vec<(CompactString, Expr)>,
    pub(crate) extras: Vec<CompactString>,
    pub(crate) word: Option<CompactString>,
    pub(crate) start: CompactString,
    pub(crate) conflicts: Vec<Vec<CompactString>>,
    pub(crate) modes: Vec<CompactString>,
}

impl Grammar {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(name, _)| name.as_str())
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenDef> {
        self.tokens.iter()
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Expr> {
        self.rules
            .iter()
            .find(|(rule, _)| rule == name)
            .map(|(_, expr)| expr)
    }
}
