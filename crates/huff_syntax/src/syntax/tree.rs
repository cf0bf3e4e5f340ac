use crate::error::{SyntaxError, SyntaxErrorKind};
use crate::language::Language;
use crate::parser::ParseStats;
use crate::syntax::{
    GreenElement, GreenNode, GreenToken, LineIndex, SyntaxKind, SyntaxNode, SyntaxTokens, TextRange,
    TextSize,
};
use compact_str::CompactString;
use std::fmt::{self, Write};
use std::sync::Arc;

/// A parsed source buffer
///
/// Owns the source bytes, the green root and the language that produced
/// it. Concatenating the text of all leaves gives back the source exactly.
/// Trees compare equal when their green roots are structurally equal.
#[derive(Clone)]
pub struct SyntaxTree {
    root: Arc<GreenNode>,
    source: Arc<[u8]>,
    language: Arc<Language>,
    stats: ParseStats,
}

impl SyntaxTree {
    pub(crate) fn new(
        root: Arc<GreenNode>,
        source: Arc<[u8]>,
        language: Arc<Language>,
        stats: ParseStats,
    ) -> Self {
        Self {
            root,
            source,
            language,
            stats,
        }
    }

    #[must_use]
    pub fn root_node(&self) -> SyntaxNode {
        SyntaxNode::new_root(Arc::clone(&self.root))
    }

    #[must_use]
    pub const fn green(&self) -> &Arc<GreenNode> {
        &self.root
    }

    /// The source text the tree was parsed from.
    #[must_use]
    pub fn text(&self) -> &[u8] {
        &self.source
    }

    #[must_use]
    pub const fn source(&self) -> &Arc<[u8]> {
        &self.source
    }

    #[must_use]
    pub const fn language(&self) -> &Arc<Language> {
        &self.language
    }

    #[must_use]
    pub const fn stats(&self) -> &ParseStats {
        &self.stats
    }

    #[must_use]
    pub fn len(&self) -> TextSize {
        self.root.text_len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.root.has_error()
    }

    /// Source slice covered by `range`, empty if out of bounds.
    #[must_use]
    pub fn slice(&self, range: TextRange) -> &[u8] {
        self.source.get(range.as_range()).unwrap_or_default()
    }

    /// All leaves in source order, trivia included.
    #[must_use]
    pub fn leaves(&self) -> SyntaxTokens {
        self.root_node().tokens()
    }

    #[must_use]
    pub fn line_index(&self) -> LineIndex {
        LineIndex::new(&self.source)
    }

    /// Syntax errors in source order.
    ///
    /// Unrecognized bytes are reported as [`SyntaxErrorKind::Unrecognized`].
    /// Each `ERROR` node is reported once, with the terminals its parse
    /// state would have accepted.
    #[must_use]
    pub fn errors(&self) -> Vec<SyntaxError> {
        if !self.root.has_error() {
            return Vec::new();
        }
        let mut errors = Vec::new();
        let mut offset = TextSize::zero();
        self.collect_errors(&self.root, &mut offset, &mut errors);
        errors
    }

    fn collect_errors(&self, node: &GreenNode, offset: &mut TextSize, out: &mut Vec<SyntaxError>) {
        let start = *offset;
        if node.is_error() && self.reportable(node) {
            let range = TextRange::at(start, node.text_len());
            let expected = self.expected(node.parse_state());
            let found = self
                .significant_leaves(node)
                .find(|token| !token.is_error())
                .map(|token| self.display_kind(token.kind()));
            let kind = match found {
                Some(found) => SyntaxErrorKind::Unexpected { found, expected },
                None => match self.next_significant_after(start + node.text_len()) {
                    Some(found) => SyntaxErrorKind::Unexpected { found, expected },
                    None => SyntaxErrorKind::UnexpectedEof { expected },
                },
            };
            out.push(SyntaxError { range, kind });
        }

        for child in node.children() {
            match child {
                GreenElement::Node(child) if child.has_error() => {
                    self.collect_errors(child, offset, out);
                }
                GreenElement::Token(token) if token.is_error() => {
                    let range = TextRange::at(*offset, token.text_len());
                    out.push(SyntaxError {
                        range,
                        kind: SyntaxErrorKind::Unrecognized {
                            text: String::from_utf8_lossy(self.slice(range)).into_owned(),
                        },
                    });
                    *offset += token.text_len();
                }
                other => *offset += other.text_len(),
            }
        }
        *offset = start + node.text_len();
    }

    /// Error nodes made only of unrecognized bytes are covered by the
    /// reports of those bytes.
    fn reportable(&self, node: &GreenNode) -> bool {
        let mut leaves = self.significant_leaves(node).peekable();
        leaves.peek().is_none() || leaves.any(|token| !token.is_error())
    }

    fn significant_leaves<'a>(
        &'a self,
        node: &'a GreenNode,
    ) -> impl Iterator<Item = &'a GreenToken> + 'a {
        let mut stack = vec![node.children().iter()];
        std::iter::from_fn(move || {
            loop {
                let top = stack.last_mut()?;
                match top.next() {
                    Some(GreenElement::Node(child)) => stack.push(child.children().iter()),
                    Some(GreenElement::Token(token)) => return Some(token),
                    None => {
                        stack.pop();
                    }
                }
            }
        })
        .filter(|token| !self.language.is_extra(token.kind()))
    }

    fn next_significant_after(&self, offset: TextSize) -> Option<CompactString> {
        self.leaves()
            .filter(|token| token.text_range().start() >= offset)
            .find(|token| !self.language.is_extra(token.kind()))
            .map(|token| self.display_kind(token.kind()))
    }

    fn expected(&self, state: u32) -> Vec<CompactString> {
        self.language
            .table()
            .expected_terminals(state)
            .filter(|kind| *kind != SyntaxKind::ERROR)
            .map(|kind| self.display_kind(kind))
            .collect()
    }

    fn display_kind(&self, kind: SyntaxKind) -> CompactString {
        if kind == SyntaxKind::END {
            return CompactString::const_new("end of input");
        }
        CompactString::new(self.language.kind_name(kind))
    }

    /// Render the tree as an S-expression of its visible named nodes, with
    /// field names, in the style of tree-sitter.
    #[must_use]
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        // Writing to a String never fails.
        let _ = self.write_sexp(&self.root, &mut out);
        out
    }

    fn write_sexp(&self, node: &GreenNode, out: &mut String) -> fmt::Result {
        write!(out, "({}", self.language.kind_name(node.kind()))?;
        for (index, child) in node.children().iter().enumerate() {
            let shown = match child {
                GreenElement::Node(_) => true,
                GreenElement::Token(token) => {
                    self.language.is_visible(token.kind()) && self.language.is_named(token.kind())
                }
            };
            if !shown {
                continue;
            }
            out.push(' ');
            if let Some(field) = node.field_of(index) {
                if let Some(name) = self.language.field_name(field) {
                    write!(out, "{name}: ")?;
                }
            }
            match child {
                GreenElement::Node(child) => self.write_sexp(child, out)?,
                GreenElement::Token(token) => {
                    write!(out, "({})", self.language.kind_name(token.kind()))?;
                }
            }
        }
        out.push(')');
        Ok(())
    }
}

impl PartialEq for SyntaxTree {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root) || self.root == other.root
    }
}

impl Eq for SyntaxTree {}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("language", &self.language.name())
            .field("len", &self.len())
            .field("errors", &self.has_errors())
            .field("stats", &self.stats)
            .finish()
    }
}

impl fmt::Display for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sexp())
    }
}
