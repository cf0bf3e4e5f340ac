use crate::lexer::ModeId;
use crate::syntax::{FieldId, SyntaxKind, TextSize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Immutable, shareable green tree node
///
/// Green nodes only know their length, never their absolute position, so a
/// subtree can be moved to a new offset and shared between trees without
/// copying.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GreenNode {
    kind: SyntaxKind,
    text_len: TextSize,
    leaf_count: u32,
    flags: NodeFlags,
    parse_state: u32,
    children: GreenChildren,
    fields: SmallVec<[(u32, FieldId); 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GreenChildren {
    Empty,
    One(GreenElement),
    Inline(SmallVec<[GreenElement; 4]>),
    Many(Arc<[GreenElement]>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
struct NodeFlags(u8);

impl NodeFlags {
    const IS_ERROR: u8 = 1;
    const HAS_ERROR: u8 = 1 << 1;

    const fn contains(self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

/// Flags carried by a leaf token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(transparent))]
pub struct TokenFlags(u8);

impl TokenFlags {
    /// The lexer could not match this byte.
    pub const ERROR: Self = Self(1);
    /// The token text is a complete match of the grammar's word token.
    pub const WORD: Self = Self(1 << 1);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

#[derive(Debug, Clone, Eq, Hash)]
pub enum GreenElement {
    Node(Arc<GreenNode>),
    Token(GreenToken),
}

impl PartialEq for GreenElement {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Node(a), Self::Node(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Token(a), Self::Token(b)) => a == b,
            _ => false,
        }
    }
}

/// A leaf of the green tree
///
/// Tokens carry no text. The text lives in the source buffer owned by
/// [`SyntaxTree`](crate::syntax::SyntaxTree), and the lexer state needed for
/// incremental re-lexing (mode and lookahead extent) is kept here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GreenToken {
    kind: SyntaxKind,
    lexed_kind: SyntaxKind,
    len: TextSize,
    lookahead: u32,
    mode: ModeId,
    flags: TokenFlags,
}

const INLINE_CHILDREN_THRESHOLD: usize = 4;

impl GreenNode {
    /// Create a node, computing its length and error state from `children`.
    ///
    /// `fields` pairs child indices with the field that names them.
    /// `parse_state` is the automaton state the node was reduced from.
    #[must_use]
    pub fn new(
        kind: SyntaxKind,
        children: Vec<GreenElement>,
        fields: SmallVec<[(u32, FieldId); 2]>,
        parse_state: u32,
    ) -> Arc<Self> {
        Self::build(kind, children, fields, parse_state, false)
    }

    /// Create an `ERROR` node wrapping a span the parser could not accept.
    #[must_use]
    pub fn error(children: Vec<GreenElement>, parse_state: u32) -> Arc<Self> {
        Self::build(SyntaxKind::ERROR, children, SmallVec::new(), parse_state, true)
    }

    /// Create an error node with a kind other than `ERROR`, used for the root
    /// when nothing could be parsed.
    #[must_use]
    pub fn error_with_kind(kind: SyntaxKind, children: Vec<GreenElement>) -> Arc<Self> {
        Self::build(kind, children, SmallVec::new(), 0, true)
    }

    fn build(
        kind: SyntaxKind,
        children: Vec<GreenElement>,
        mut fields: SmallVec<[(u32, FieldId); 2]>,
        parse_state: u32,
        is_error: bool,
    ) -> Arc<Self> {
        let mut text_len = TextSize::zero();
        let mut leaf_count = 0u32;
        let mut has_error = is_error;
        for child in &children {
            text_len += child.text_len();
            leaf_count = leaf_count.saturating_add(child.leaf_count());
            has_error |= child.has_error();
        }
        fields.sort_unstable();

        let mut flags = 0;
        if is_error {
            flags |= NodeFlags::IS_ERROR;
        }
        if has_error {
            flags |= NodeFlags::HAS_ERROR;
        }

        let children = match children.len() {
            0 => GreenChildren::Empty,
            1 => {
                let mut iter = children.into_iter();
                match iter.next() {
                    Some(child) => GreenChildren::One(child),
                    None => GreenChildren::Empty,
                }
            }
            2..=INLINE_CHILDREN_THRESHOLD => GreenChildren::Inline(children.into_iter().collect()),
            _ => GreenChildren::Many(Arc::from(children)),
        };

        Arc::new(Self {
            kind,
            text_len,
            leaf_count,
            flags: NodeFlags(flags),
            parse_state,
            children,
            fields,
        })
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> SyntaxKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn text_len(&self) -> TextSize {
        self.text_len
    }

    /// Number of tokens in this subtree.
    #[must_use]
    pub const fn leaf_count(&self) -> u32 {
        self.leaf_count
    }

    #[must_use]
    pub const fn parse_state(&self) -> u32 {
        self.parse_state
    }

    /// True for nodes produced by error recovery.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.flags.contains(NodeFlags::IS_ERROR)
    }

    /// True if this node or any descendant is an error.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.flags.contains(NodeFlags::HAS_ERROR)
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[GreenElement] {
        match &self.children {
            GreenChildren::Empty => &[],
            GreenChildren::One(child) => std::slice::from_ref(child),
            GreenChildren::Inline(children) => children,
            GreenChildren::Many(children) => children,
        }
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self.children, GreenChildren::Empty)
    }

    /// Field naming the child at `index`, if any.
    #[must_use]
    pub fn field_of(&self, index: usize) -> Option<FieldId> {
        let index = u32::try_from(index).ok()?;
        self.fields
            .binary_search_by_key(&index, |&(i, _)| i)
            .ok()
            .map(|pos| self.fields[pos].1)
    }

    /// `(child index, field)` pairs in child order.
    #[must_use]
    pub fn fields(&self) -> &[(u32, FieldId)] {
        &self.fields
    }

    pub fn child_kinds(&self) -> impl Iterator<Item = SyntaxKind> + '_ {
        self.children().iter().map(GreenElement::kind)
    }

    #[must_use]
    pub fn first_child_by_kind(&self, kind: SyntaxKind) -> Option<&GreenElement> {
        self.children().iter().find(|c| c.kind() == kind)
    }
}

impl GreenToken {
    #[must_use]
    pub const fn new(kind: SyntaxKind, len: TextSize) -> Self {
        Self {
            kind,
            lexed_kind: kind,
            len,
            lookahead: 0,
            mode: ModeId::DEFAULT,
            flags: TokenFlags::empty(),
        }
    }

    /// Attach the lexer state the token was produced in.
    #[must_use]
    pub const fn with_lex_state(mut self, mode: ModeId, lookahead: u32, flags: TokenFlags) -> Self {
        self.mode = mode;
        self.lookahead = lookahead;
        self.flags = flags;
        self
    }

    /// Reinterpret the token as `kind`, keeping the kind the lexer produced.
    #[must_use]
    pub const fn reinterpret(mut self, kind: SyntaxKind) -> Self {
        self.kind = kind;
        self
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> SyntaxKind {
        self.kind
    }

    /// Kind assigned by the lexer, before any keyword fallback.
    #[must_use]
    pub const fn lexed_kind(&self) -> SyntaxKind {
        self.lexed_kind
    }

    #[inline]
    #[must_use]
    pub const fn text_len(&self) -> TextSize {
        self.len
    }

    /// Bytes past the end of the token the lexer examined.
    #[must_use]
    pub const fn lookahead(&self) -> u32 {
        self.lookahead
    }

    #[must_use]
    pub const fn mode(&self) -> ModeId {
        self.mode
    }

    #[must_use]
    pub const fn flags(&self) -> TokenFlags {
        self.flags
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.flags.contains(TokenFlags::ERROR)
    }
}

impl GreenElement {
    #[must_use]
    pub fn kind(&self) -> SyntaxKind {
        match self {
            Self::Node(n) => n.kind(),
            Self::Token(t) => t.kind(),
        }
    }

    #[must_use]
    pub fn text_len(&self) -> TextSize {
        match self {
            Self::Node(n) => n.text_len(),
            Self::Token(t) => t.text_len(),
        }
    }

    #[must_use]
    pub fn leaf_count(&self) -> u32 {
        match self {
            Self::Node(n) => n.leaf_count(),
            Self::Token(_) => 1,
        }
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        match self {
            Self::Node(n) => n.has_error(),
            Self::Token(t) => t.is_error(),
        }
    }

    #[must_use]
    pub const fn as_node(&self) -> Option<&Arc<GreenNode>> {
        match self {
            Self::Node(n) => Some(n),
            Self::Token(_) => None,
        }
    }

    #[must_use]
    pub const fn as_token(&self) -> Option<&GreenToken> {
        match self {
            Self::Node(_) => None,
            Self::Token(t) => Some(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    const IDENT: SyntaxKind = SyntaxKind::from_raw(2);
    const NUMBER: SyntaxKind = SyntaxKind::from_raw(3);
    const EXPR: SyntaxKind = SyntaxKind::from_raw(10);

    fn token(kind: SyntaxKind, len: u32) -> GreenElement {
        GreenElement::Token(GreenToken::new(kind, TextSize::from(len)))
    }

    #[test]
    fn test_green_node_empty() {
        let node = GreenNode::new(EXPR, Vec::new(), SmallVec::new(), 0);
        assert_eq!(node.text_len(), TextSize::zero());
        assert_eq!(node.leaf_count(), 0);
        assert!(node.is_leaf());
    }

    #[test]
    fn test_green_node_computes_length() {
        let node = GreenNode::new(
            EXPR,
            vec![token(IDENT, 3), token(NUMBER, 4)],
            SmallVec::new(),
            5,
        );
        assert_eq!(node.text_len(), TextSize::from(7));
        assert_eq!(node.leaf_count(), 2);
        assert_eq!(node.parse_state(), 5);
        assert!(!node.has_error());
    }

    #[test]
    fn test_green_node_many_children() {
        let children = (0..9).map(|_| token(IDENT, 1)).collect();
        let node = GreenNode::new(EXPR, children, SmallVec::new(), 0);
        assert_eq!(node.child_count(), 9);
        assert_eq!(node.text_len(), TextSize::from(9));
    }

    #[test]
    fn test_fields_lookup() {
        let node = GreenNode::new(
            EXPR,
            vec![token(IDENT, 1), token(NUMBER, 1), token(IDENT, 1)],
            smallvec![(2, FieldId::from_raw(1)), (0, FieldId::from_raw(0))],
            0,
        );
        assert_eq!(node.field_of(0), Some(FieldId::from_raw(0)));
        assert_eq!(node.field_of(1), None);
        assert_eq!(node.field_of(2), Some(FieldId::from_raw(1)));
    }

    #[test]
    fn test_error_propagates() {
        let error = GreenNode::error(vec![token(IDENT, 1)], 3);
        assert!(error.is_error());

        let parent = GreenNode::new(EXPR, vec![GreenElement::Node(error)], SmallVec::new(), 0);
        assert!(!parent.is_error());
        assert!(parent.has_error());
    }

    #[test]
    fn test_error_token_propagates() {
        let bad = GreenToken::new(SyntaxKind::ERROR, TextSize::from(1)).with_lex_state(
            ModeId::DEFAULT,
            0,
            TokenFlags::ERROR,
        );
        let node = GreenNode::new(EXPR, vec![GreenElement::Token(bad)], SmallVec::new(), 0);
        assert!(node.has_error());
    }

    #[test]
    fn test_reinterpret_keeps_lexed_kind() {
        let tok = GreenToken::new(NUMBER, TextSize::from(2)).reinterpret(IDENT);
        assert_eq!(tok.kind(), IDENT);
        assert_eq!(tok.lexed_kind(), NUMBER);
    }

    #[test]
    fn test_green_node_equality() {
        let a = GreenNode::new(EXPR, vec![token(IDENT, 2)], SmallVec::new(), 1);
        let b = GreenNode::new(EXPR, vec![token(IDENT, 2)], SmallVec::new(), 1);
        let c = GreenNode::new(EXPR, vec![token(IDENT, 2)], SmallVec::new(), 2);
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }
}
