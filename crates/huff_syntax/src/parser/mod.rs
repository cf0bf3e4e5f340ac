//! # Parser
//!
//! Table-driven LR parsing with panic-mode error recovery and incremental
//! reuse of a previous tree.
//!
//! A [`Parser`] is a cheap handle over an `Arc<Language>`. Every call to
//! [`Parser::parse`] owns its own stack, so one parser can be shared between
//! threads.
//!
//! ```rust
//! use huff_syntax::huff;
//! use huff_syntax::incremental::InputEdit;
//!
//! let parser = huff::parser();
//! let old = b"#define constant A = 0x01";
//! let tree = parser.parse(old, None, &[]);
//! assert!(!tree.has_errors());
//!
//! let (new, edit) = InputEdit::splice(old, 17..18, b"OWNER");
//! let edited = parser.parse(&new, Some(&tree), &[edit]);
//! assert_eq!(edited, parser.parse(&new, None, &[]));
//! assert!(edited.stats().reused_tokens > 0);
//! ```

mod engine;
mod recovery;
mod reuse;

use crate::incremental::{self, InputEdit, OldTreeIndex};
use crate::language::Language;
use crate::syntax::SyntaxTree;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Parser options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Recover from syntax errors. When off, the first error wraps the rest
    /// of the input into one error node.
    pub error_recovery: bool,

    /// Error nodes to create before giving up on recovery
    pub max_errors: usize,

    /// Recovery attempts at one input position before the token is skipped
    pub max_recovery_attempts: usize,

    /// Reuse whole subtrees of the previous tree. Token reuse is unaffected.
    pub reuse_nodes: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            error_recovery: true,
            max_errors: 100,
            max_recovery_attempts: 8,
            reuse_nodes: true,
        }
    }
}

/// Counters recorded by one parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Tokens in the input, trivia included
    pub tokens: usize,
    /// Tokens produced by running the lexer
    pub relexed_tokens: usize,
    /// Tokens taken over from the previous tree
    pub reused_tokens: usize,
    /// Subtrees taken over from the previous tree
    pub reused_nodes: usize,
    /// Error nodes created by recovery
    pub errors: usize,
    pub duration: Duration,
}

/// Parser for one language
#[derive(Debug, Clone)]
pub struct Parser {
    language: Arc<Language>,
    config: ParserConfig,
}

impl Parser {
    #[must_use]
    pub fn new(language: Arc<Language>) -> Self {
        Self::with_config(language, ParserConfig::default())
    }

    #[must_use]
    pub const fn with_config(language: Arc<Language>, config: ParserConfig) -> Self {
        Self { language, config }
    }

    #[must_use]
    pub const fn language(&self) -> &Arc<Language> {
        &self.language
    }

    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse `source`.
    ///
    /// With a `previous` tree, `edits` must describe how its source was
    /// turned into `source`. Unchanged tokens and subtrees of the previous
    /// tree are reused; the result equals a fresh parse of `source`.
    ///
    /// Parsing never fails. Syntax errors become `ERROR` nodes, and the
    /// root always spans the whole input.
    #[must_use]
    pub fn parse(&self, source: &[u8], previous: Option<&SyntaxTree>, edits: &[InputEdit]) -> SyntaxTree {
        let started = Instant::now();
        let previous = previous.filter(|tree| {
            let same = Arc::ptr_eq(tree.language(), &self.language);
            if !same {
                tracing::debug!("previous tree belongs to another language, parsing from scratch");
            }
            same
        });
        tracing::debug!(
            language = self.language.name(),
            bytes = source.len(),
            incremental = previous.is_some(),
            "parse started"
        );

        let old_leaves = previous.map(|tree| incremental::apply_edits(tree, edits)).unwrap_or_default();
        let old_source = previous.map_or(&[][..], |tree| tree.text());
        let (stream, relexed) = incremental::relex(self.language.lexer(), source, old_source, &old_leaves);

        let index = previous
            .filter(|_| self.config.reuse_nodes)
            .map(|tree| OldTreeIndex::new(tree, &self.language));
        let reuse = index.as_ref().map(|index| {
            reuse::NodeReuse::new(&self.language, index, &stream, incremental::end_origin(&old_leaves))
        });

        let outcome = engine::ParseContext::new(&self.language, &self.config, &stream, reuse).run();

        let stats = ParseStats {
            tokens: stream.len(),
            relexed_tokens: relexed.relexed,
            reused_tokens: relexed.reused,
            reused_nodes: outcome.reused_nodes,
            errors: outcome.errors,
            duration: started.elapsed(),
        };
        tracing::debug!(
            tokens = stats.tokens,
            relexed = stats.relexed_tokens,
            reused_tokens = stats.reused_tokens,
            reused_nodes = stats.reused_nodes,
            errors = stats.errors,
            duration = ?stats.duration,
            "parse finished"
        );

        SyntaxTree::new(outcome.root, Arc::from(source), Arc::clone(&self.language), stats)
    }

    /// Parse many buffers from scratch, in parallel with the `parallel`
    /// feature. Trees are returned in input order.
    #[must_use]
    pub fn parse_batch<S>(&self, sources: &[S]) -> Vec<SyntaxTree>
    where
        S: AsRef<[u8]> + Sync,
    {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            sources
                .par_iter()
                .map(|source| self.parse(source.as_ref(), None, &[]))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            sources
                .iter()
                .map(|source| self.parse(source.as_ref(), None, &[]))
                .collect()
        }
    }
}

#[cfg(test)]
pub(crate) mod test_grammar {
    use crate::grammar::{Expr, Grammar, GrammarBuilder, TokenDef};
    use crate::language::Language;
    use crate::lexer::{CharSet, Pattern};
    use crate::table::TableConfig;
    use std::sync::Arc;

    /// `program = (item)*`, `item = "let" name:ident "=" value:(num | ident) ";"`
    /// with whitespace as trivia and `ident` as the word token.
    pub fn statements() -> Arc<Language> {
        let word = Pattern::seq([
            Pattern::class(CharSet::alphabetic()),
            Pattern::class(CharSet::alphanumeric()).repeat(),
        ]);
        let grammar: Grammar = GrammarBuilder::new("statements")
            .token(TokenDef::new("ident", word.clone()))
            .token(TokenDef::new("num", Pattern::class(CharSet::digits()).repeat1()))
            .token(TokenDef::new("_ws", Pattern::class(CharSet::whitespace()).repeat1()))
            .extra("_ws")
            .word("ident")
            .rule("program", Expr::sym("item").repeat())
            .rule(
                "item",
                Expr::seq([
                    Expr::string("let"),
                    Expr::field("name", Expr::sym("ident")),
                    Expr::string("="),
                    Expr::field("value", Expr::choice([Expr::sym("num"), Expr::sym("ident")])),
                    Expr::string(";"),
                ]),
            )
            .start("program")
            .build()
            .unwrap();
        Arc::new(grammar.compile(&TableConfig::default()).unwrap().language)
    }
}
