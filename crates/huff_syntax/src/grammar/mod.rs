//! # Grammar
//!
//! Grammars are declared with [`GrammarBuilder`]: named tokens, rules made
//! of [`Expr`] trees, extras (trivia), an optional word token for keyword
//! fallback and lexer modes. [`Grammar::compile`] lowers the rules to flat
//! productions, builds the lexer and the LR(1) table and returns the
//! resulting [`Language`].
//!
//! ```rust
//! use huff_syntax::grammar::{Expr, GrammarBuilder, TokenDef};
//! use huff_syntax::lexer::{CharSet, Pattern};
//! use huff_syntax::table::TableConfig;
//!
//! let grammar = GrammarBuilder::new("pairs")
//!     .token(TokenDef::new("number", Pattern::class(CharSet::digits()).repeat1()))
//!     .token(TokenDef::new("_ws", Pattern::class(CharSet::whitespace()).repeat1()))
//!     .extra("_ws")
//!     .rule("file", Expr::sym("pair").repeat())
//!     .rule("pair", Expr::seq([Expr::string("("), Expr::sym("number"), Expr::string(")")]))
//!     .build()?;
//!
//! let compiled = grammar.compile(&TableConfig::default())?;
//! assert!(compiled.warnings.is_empty());
//! assert!(compiled.language.kind_for_name("pair").is_some());
//! # Ok::<(), huff_syntax::error::GrammarError>(())
//! ```

mod builder;
mod expr;
pub(crate) mod normalize;

pub use builder::{DEFAULT_MODE, Grammar, GrammarBuilder, TokenDef};
pub use expr::{Assoc, Expr, Precedence};
pub(crate) use normalize::{NormalizedGrammar, normalize};

use crate::error::{GrammarError, UnreachableRuleWarning};
use crate::language::{FORMAT_VERSION, Language, LanguageMetadata};
use crate::lexer::{LexRule, LexerBuilder};
use crate::table::{TableConfig, build_table};

/// A compiled language together with non-fatal findings
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    pub language: Language,
    pub warnings: Vec<UnreachableRuleWarning>,
}

impl Grammar {
    /// Compile the grammar into a [`Language`].
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::Conflict`] listing every conflict that no
    /// precedence, associativity or declared conflict group settles, and
    /// the other [`GrammarError`] variants for grammars too large to lower
    /// or whose tokens do not compile.
    pub fn compile(&self, config: &TableConfig) -> Result<CompiledGrammar, GrammarError> {
        let _span = tracing::debug_span!("compile", grammar = %self.name).entered();
        let normalized = normalize(self)?;

        let mut lexer = LexerBuilder::new();
        for mode in &normalized.modes {
            lexer.mode(mode);
        }
        for token in &normalized.lexical {
            let mut rule = LexRule::new(token.kind, token.pattern.clone())
                .priority(token.priority)
                .in_mode(token.mode);
            if let Some(next) = token.next_mode {
                rule = rule.then_mode(next);
            }
            lexer.push_rule(rule);
        }
        if let Some(word) = &normalized.word_pattern {
            lexer.set_word(word.clone());
        }
        let lexer = lexer.build()?;

        let built = build_table(&normalized, config)?;

        let language = Language {
            metadata: LanguageMetadata {
                format_version: FORMAT_VERSION,
                name: normalized.name,
                version: normalized.version,
            },
            symbols: normalized.symbols,
            terminal_count: normalized.terminal_count,
            fields: normalized.fields,
            lexer,
            table: built.table,
            extras: normalized.extras,
            word: normalized.word,
            start: normalized.start,
        };
        tracing::info!(
            grammar = language.name(),
            symbols = language.symbol_count(),
            states = language.table().state_count(),
            lexer_states = language.lexer().state_count(),
            warnings = built.warnings.len(),
            "compiled grammar"
        );

        Ok(CompiledGrammar {
            language,
            warnings: built.warnings,
        })
    }
}
