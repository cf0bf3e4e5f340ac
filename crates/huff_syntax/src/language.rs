//! # Language
//!
//! A compiled grammar: symbol and field tables, the lexer and the parse
//! table. A [`Language`] is immutable once built and is shared between
//! parsers and trees behind an [`Arc`](std::sync::Arc).
//!
//! With the `serialize` feature a language can be written to and read back
//! from a self-describing JSON artifact, so the table does not have to be
//! regenerated at startup.

use crate::lexer::Lexer;
use crate::syntax::{FieldId, SyntaxKind};
use crate::table::ParseTable;
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Version of the artifact layout written by [`Language::to_artifact_bytes`].
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct LanguageMetadata {
    pub format_version: u32,
    pub name: CompactString,
    pub version: CompactString,
}

/// Name and display properties of a symbol
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SymbolInfo {
    pub name: CompactString,
    pub terminal: bool,
    /// Hidden symbols are spliced into their parent (rules) or left out of
    /// S-expressions (tokens).
    pub visible: bool,
    /// Named symbols were declared by name; anonymous ones are literals
    pub named: bool,
}

impl SymbolInfo {
    pub(crate) fn terminal(name: &str, visible: bool, named: bool) -> Self {
        Self {
            name: CompactString::new(name),
            terminal: true,
            visible,
            named,
        }
    }

    pub(crate) fn nonterminal(name: &str, visible: bool) -> Self {
        Self {
            name: CompactString::new(name),
            terminal: false,
            visible,
            named: true,
        }
    }
}

/// A compiled grammar
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Language {
    pub(crate) metadata: LanguageMetadata,
    pub(crate) symbols: Vec<SymbolInfo>,
    pub(crate) terminal_count: usize,
    pub(crate) fields: Vec<CompactString>,
    pub(crate) lexer: Lexer,
    pub(crate) table: ParseTable,
    pub(crate) extras: Vec<SyntaxKind>,
    pub(crate) word: Option<SyntaxKind>,
    pub(crate) start: SyntaxKind,
}

impl Language {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    #[must_use]
    pub const fn metadata(&self) -> &LanguageMetadata {
        &self.metadata
    }

    #[must_use]
    pub const fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    #[must_use]
    pub const fn table(&self) -> &ParseTable {
        &self.table
    }

    #[must_use]
    pub const fn start(&self) -> SyntaxKind {
        self.start
    }

    #[must_use]
    pub const fn word(&self) -> Option<SyntaxKind> {
        self.word
    }

    #[must_use]
    pub fn extras(&self) -> &[SyntaxKind] {
        &self.extras
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub const fn terminal_count(&self) -> usize {
        self.terminal_count
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SyntaxKind, &SymbolInfo)> {
        self.symbols.iter().enumerate().map(|(i, info)| {
            (
                SyntaxKind::from_raw(u16::try_from(i).unwrap_or(u16::MAX)),
                info,
            )
        })
    }

    #[must_use]
    pub fn symbol(&self, kind: SyntaxKind) -> Option<&SymbolInfo> {
        self.symbols.get(kind.index())
    }

    /// Name of a kind, or `"?"` for kinds from another language.
    #[must_use]
    pub fn kind_name(&self, kind: SyntaxKind) -> &str {
        self.symbol(kind).map_or("?", |s| s.name.as_str())
    }

    /// First kind with the given name, named symbols before literals.
    #[must_use]
    pub fn kind_for_name(&self, name: &str) -> Option<SyntaxKind> {
        let mut anonymous = None;
        for (kind, info) in self.symbols() {
            if info.name == name {
                if info.named {
                    return Some(kind);
                }
                anonymous.get_or_insert(kind);
            }
        }
        anonymous
    }

    #[must_use]
    pub fn field_name(&self, field: FieldId) -> Option<&str> {
        self.fields.get(field.index()).map(CompactString::as_str)
    }

    #[must_use]
    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|f| f == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(FieldId::from_raw)
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_extra(&self, kind: SyntaxKind) -> bool {
        self.extras.contains(&kind)
    }

    #[must_use]
    pub fn is_terminal(&self, kind: SyntaxKind) -> bool {
        kind.index() < self.terminal_count
    }

    #[must_use]
    pub fn is_visible(&self, kind: SyntaxKind) -> bool {
        self.symbol(kind).is_some_and(|s| s.visible)
    }

    #[must_use]
    pub fn is_named(&self, kind: SyntaxKind) -> bool {
        self.symbol(kind).is_some_and(|s| s.named)
    }

    /// Serialize the compiled language.
    ///
    /// # Errors
    ///
    /// Only fails if serialization itself fails.
    #[cfg(feature = "serialize")]
    pub fn to_artifact_bytes(&self) -> Result<Vec<u8>, crate::error::ArtifactError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Load a language written by [`Language::to_artifact_bytes`].
    ///
    /// # Errors
    ///
    /// Fails on malformed input or an artifact of another format version.
    #[cfg(feature = "serialize")]
    pub fn from_artifact_bytes(bytes: &[u8]) -> Result<Self, crate::error::ArtifactError> {
        #[derive(Deserialize)]
        struct Header {
            metadata: LanguageMetadata,
        }

        let header: Header = serde_json::from_slice(bytes)?;
        if header.metadata.format_version != FORMAT_VERSION {
            return Err(crate::error::ArtifactError::UnsupportedVersion {
                found: header.metadata.format_version,
                expected: FORMAT_VERSION,
            });
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder, TokenDef};
    use crate::lexer::{CharSet, Pattern};
    use crate::table::TableConfig;

    fn language() -> Language {
        GrammarBuilder::new("demo")
            .version("1.2.0")
            .token(TokenDef::new("identifier", Pattern::class(CharSet::alphabetic()).repeat1()))
            .token(TokenDef::new("_ws", Pattern::class(CharSet::whitespace()).repeat1()))
            .extra("_ws")
            .word("identifier")
            .rule("file", Expr::sym("_item").repeat())
            .rule(
                "_item",
                Expr::seq([Expr::string("let"), Expr::field("name", Expr::sym("identifier"))]),
            )
            .build()
            .unwrap()
            .compile(&TableConfig::default())
            .unwrap()
            .language
    }

    #[test]
    fn test_symbol_queries() {
        let lang = language();
        assert_eq!(lang.name(), "demo");
        assert_eq!(lang.version(), "1.2.0");
        let ident = lang.kind_for_name("identifier").unwrap();
        assert!(lang.is_terminal(ident));
        assert!(lang.is_named(ident));
        assert!(lang.is_visible(ident));

        let keyword = lang.kind_for_name("let").unwrap();
        assert!(!lang.is_named(keyword));

        let item = lang.kind_for_name("_item").unwrap();
        assert!(!lang.is_visible(item));
        assert!(!lang.is_terminal(item));

        let ws = lang.kind_for_name("_ws").unwrap();
        assert!(lang.is_extra(ws));
        assert_eq!(lang.word(), Some(ident));
        assert_eq!(lang.kind_name(lang.start()), "file");
        assert_eq!(lang.kind_name(SyntaxKind::from_raw(999)), "?");
    }

    #[test]
    fn test_fields() {
        let lang = language();
        let name = lang.field_id("name").unwrap();
        assert_eq!(lang.field_name(name), Some("name"));
        assert_eq!(lang.field_id("body"), None);
        assert_eq!(lang.field_count(), 1);
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn test_artifact_round_trip() {
        let lang = language();
        let bytes = lang.to_artifact_bytes().unwrap();
        let loaded = Language::from_artifact_bytes(&bytes).unwrap();
        assert_eq!(loaded, lang);
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn test_artifact_version_mismatch() {
        let mut lang = language();
        lang.metadata.format_version = FORMAT_VERSION + 1;
        let bytes = lang.to_artifact_bytes().unwrap();
        let err = Language::from_artifact_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ArtifactError::UnsupportedVersion { found, .. } if found == FORMAT_VERSION + 1
        ));
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn test_artifact_malformed() {
        let err = Language::from_artifact_bytes(b"{not json").unwrap_err();
        assert!(matches!(err, crate::error::ArtifactError::Malformed(_)));
    }
}
