use crate::syntax::{FieldId, GreenElement, GreenNode, GreenToken, SyntaxKind, TextRange, TextSize};
use std::fmt;
use std::sync::Arc;

/// Positioned cursor over a green node
///
/// A `SyntaxNode` pairs a green node with its absolute offset and a link to
/// the cursor of its parent. Cursors are created on demand while walking the
/// tree and are cheap to clone.
#[derive(Clone)]
pub struct SyntaxNode(Arc<NodeData>);

struct NodeData {
    green: Arc<GreenNode>,
    offset: TextSize,
    index: u32,
    parent: Option<SyntaxNode>,
}

/// A positioned leaf
#[derive(Clone)]
pub struct SyntaxToken {
    green: GreenToken,
    offset: TextSize,
    index: u32,
    parent: SyntaxNode,
}

#[derive(Clone, Debug)]
pub enum SyntaxElement {
    Node(SyntaxNode),
    Token(SyntaxToken),
}

impl SyntaxNode {
    #[must_use]
    pub fn new_root(green: Arc<GreenNode>) -> Self {
        Self(Arc::new(NodeData {
            green,
            offset: TextSize::zero(),
            index: 0,
            parent: None,
        }))
    }

    fn new_child(green: Arc<GreenNode>, offset: TextSize, index: u32, parent: Self) -> Self {
        Self(Arc::new(NodeData {
            green,
            offset,
            index,
            parent: Some(parent),
        }))
    }

    #[must_use]
    pub fn kind(&self) -> SyntaxKind {
        self.0.green.kind()
    }

    #[must_use]
    pub fn green(&self) -> &Arc<GreenNode> {
        &self.0.green
    }

    #[must_use]
    pub fn text_range(&self) -> TextRange {
        TextRange::at(self.0.offset, self.0.green.text_len())
    }

    /// Position of this node among its parent's children.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0.index as usize
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0.parent.clone()
    }

    pub fn ancestors(&self) -> impl Iterator<Item = Self> + use<> {
        std::iter::successors(Some(self.clone()), Self::parent)
    }

    /// Field this node occupies in its parent.
    #[must_use]
    pub fn field(&self) -> Option<FieldId> {
        self.0
            .parent
            .as_ref()
            .and_then(|p| p.0.green.field_of(self.index()))
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.0.green.is_error()
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.0.green.has_error()
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.0.green.child_count()
    }

    #[must_use]
    pub fn children(&self) -> SyntaxChildren {
        SyntaxChildren {
            parent: self.clone(),
            index: 0,
            offset: self.0.offset,
        }
    }

    /// Child nodes, skipping tokens.
    pub fn child_nodes(&self) -> impl Iterator<Item = Self> + use<> {
        self.children().filter_map(SyntaxElement::into_node)
    }

    /// Child at `index`, counting both nodes and tokens.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<SyntaxElement> {
        let children = self.0.green.children();
        children.get(index)?;
        let offset = children[..index]
            .iter()
            .fold(self.0.offset, |acc, c| acc + c.text_len());
        Some(self.make_child(index, offset))
    }

    fn make_child(&self, index: usize, offset: TextSize) -> SyntaxElement {
        let index_u32 = u32::try_from(index).unwrap_or(u32::MAX);
        match &self.0.green.children()[index] {
            GreenElement::Node(node) => SyntaxElement::Node(Self::new_child(
                Arc::clone(node),
                offset,
                index_u32,
                self.clone(),
            )),
            GreenElement::Token(token) => SyntaxElement::Token(SyntaxToken {
                green: token.clone(),
                offset,
                index: index_u32,
                parent: self.clone(),
            }),
        }
    }

    #[must_use]
    pub fn first_child(&self) -> Option<SyntaxElement> {
        self.child(0)
    }

    #[must_use]
    pub fn last_child(&self) -> Option<SyntaxElement> {
        self.child(self.child_count().checked_sub(1)?)
    }

    /// First child labelled with `field`.
    #[must_use]
    pub fn child_by_field(&self, field: FieldId) -> Option<SyntaxElement> {
        self.children_by_field(field).next()
    }

    pub fn children_by_field(&self, field: FieldId) -> impl Iterator<Item = SyntaxElement> + use<> {
        let green = Arc::clone(&self.0.green);
        self.children()
            .filter(move |child| green.field_of(child.index()) == Some(field))
    }

    #[must_use]
    pub fn next_sibling(&self) -> Option<SyntaxElement> {
        let parent = self.parent()?;
        parent.child(self.index() + 1)
    }

    #[must_use]
    pub fn prev_sibling(&self) -> Option<SyntaxElement> {
        let parent = self.parent()?;
        parent.child(self.index().checked_sub(1)?)
    }

    /// Nodes in preorder, starting with `self`.
    #[must_use]
    pub fn descendants(&self) -> SyntaxDescendants {
        SyntaxDescendants {
            stack: vec![self.clone()],
        }
    }

    /// All leaf tokens of this subtree in source order.
    #[must_use]
    pub fn tokens(&self) -> SyntaxTokens {
        SyntaxTokens {
            stack: vec![self.children()],
        }
    }

    #[must_use]
    pub fn first_token(&self) -> Option<SyntaxToken> {
        self.tokens().next()
    }

    /// Smallest node whose range contains `range`.
    #[must_use]
    pub fn covering_node(&self, range: TextRange) -> Self {
        let mut node = self.clone();
        'descend: loop {
            for child in node.child_nodes() {
                let child_range = child.text_range();
                if child_range.contains_range(range) && !child_range.is_empty() {
                    node = child;
                    continue 'descend;
                }
            }
            return node;
        }
    }
}

impl PartialEq for SyntaxNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0.green, &other.0.green) && self.0.offset == other.0.offset
    }
}

impl Eq for SyntaxNode {}

impl fmt::Debug for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.kind(), self.text_range())
    }
}

impl SyntaxToken {
    #[must_use]
    pub fn kind(&self) -> SyntaxKind {
        self.green.kind()
    }

    #[must_use]
    pub const fn green(&self) -> &GreenToken {
        &self.green
    }

    #[must_use]
    pub fn text_range(&self) -> TextRange {
        TextRange::at(self.offset, self.green.text_len())
    }

    /// Slice of `source` covered by this token.
    #[must_use]
    pub fn text<'s>(&self, source: &'s [u8]) -> &'s [u8] {
        source.get(self.text_range().as_range()).unwrap_or_default()
    }

    #[must_use]
    pub fn parent(&self) -> SyntaxNode {
        self.parent.clone()
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index as usize
    }

    #[must_use]
    pub fn field(&self) -> Option<FieldId> {
        self.parent.0.green.field_of(self.index())
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.green.is_error()
    }
}

impl fmt::Debug for SyntaxToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.kind(), self.text_range())
    }
}

impl SyntaxElement {
    #[must_use]
    pub fn kind(&self) -> SyntaxKind {
        match self {
            Self::Node(n) => n.kind(),
            Self::Token(t) => t.kind(),
        }
    }

    #[must_use]
    pub fn text_range(&self) -> TextRange {
        match self {
            Self::Node(n) => n.text_range(),
            Self::Token(t) => t.text_range(),
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Node(n) => n.index(),
            Self::Token(t) => t.index(),
        }
    }

    #[must_use]
    pub fn into_node(self) -> Option<SyntaxNode> {
        match self {
            Self::Node(n) => Some(n),
            Self::Token(_) => None,
        }
    }

    #[must_use]
    pub fn into_token(self) -> Option<SyntaxToken> {
        match self {
            Self::Node(_) => None,
            Self::Token(t) => Some(t),
        }
    }

    #[must_use]
    pub const fn as_node(&self) -> Option<&SyntaxNode> {
        match self {
            Self::Node(n) => Some(n),
            Self::Token(_) => None,
        }
    }
}

/// Iterator over the direct children of a node
pub struct SyntaxChildren {
    parent: SyntaxNode,
    index: usize,
    offset: TextSize,
}

impl Iterator for SyntaxChildren {
    type Item = SyntaxElement;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.parent.0.green.children().get(self.index)?.text_len();
        let element = self.parent.make_child(self.index, self.offset);
        self.index += 1;
        self.offset += len;
        Some(element)
    }
}

pub struct SyntaxDescendants {
    stack: Vec<SyntaxNode>,
}

impl Iterator for SyntaxDescendants {
    type Item = SyntaxNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let start = self.stack.len();
        self.stack.extend(node.child_nodes());
        self.stack[start..].reverse();
        Some(node)
    }
}

pub struct SyntaxTokens {
    stack: Vec<SyntaxChildren>,
}

impl Iterator for SyntaxTokens {
    type Item = SyntaxToken;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(SyntaxElement::Token(token)) => return Some(token),
                Some(SyntaxElement::Node(node)) => self.stack.push(node.children()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::{SmallVec, smallvec};

    const IDENT: SyntaxKind = SyntaxKind::from_raw(2);
    const PAREN: SyntaxKind = SyntaxKind::from_raw(3);
    const CALL: SyntaxKind = SyntaxKind::from_raw(10);
    const ROOT: SyntaxKind = SyntaxKind::from_raw(11);

    fn token(kind: SyntaxKind, len: u32) -> GreenElement {
        GreenElement::Token(GreenToken::new(kind, TextSize::from(len)))
    }

    // ROOT [ CALL [ IDENT(4) PAREN(1) PAREN(1) ] IDENT(2) ]
    fn sample() -> SyntaxNode {
        let call = GreenNode::new(
            CALL,
            vec![token(IDENT, 4), token(PAREN, 1), token(PAREN, 1)],
            smallvec![(0, FieldId::from_raw(0))],
            7,
        );
        let root = GreenNode::new(
            ROOT,
            vec![GreenElement::Node(call), token(IDENT, 2)],
            SmallVec::new(),
            0,
        );
        SyntaxNode::new_root(root)
    }

    #[test]
    fn test_child_offsets() {
        let root = sample();
        let second = root.child(1).unwrap();
        assert_eq!(second.text_range(), TextRange::new(6.into(), 8.into()));
        assert!(root.child(2).is_none());
    }

    #[test]
    fn test_parent_and_siblings() {
        let root = sample();
        let call = root.child_nodes().next().unwrap();
        assert_eq!(call.parent(), Some(root.clone()));
        assert_eq!(call.next_sibling().map(|s| s.kind()), Some(IDENT));
        assert!(call.prev_sibling().is_none());
        assert_eq!(call.ancestors().count(), 2);
    }

    #[test]
    fn test_child_by_field() {
        let root = sample();
        let call = root.child_nodes().next().unwrap();
        let name = call.child_by_field(FieldId::from_raw(0)).unwrap();
        assert_eq!(name.kind(), IDENT);
        assert_eq!(name.text_range(), TextRange::new(0.into(), 4.into()));
        assert!(call.child_by_field(FieldId::from_raw(1)).is_none());
    }

    #[test]
    fn test_tokens_in_order() {
        let root = sample();
        let ranges: Vec<_> = root.tokens().map(|t| t.text_range().start().into()).collect();
        assert_eq!(ranges, vec![0, 4, 5, 6]);
    }

    #[test]
    fn test_descendants_preorder() {
        let root = sample();
        let kinds: Vec<_> = root.descendants().map(|n| n.kind()).collect();
        assert_eq!(kinds, vec![ROOT, CALL]);
    }

    #[test]
    fn test_covering_node() {
        let root = sample();
        let node = root.covering_node(TextRange::new(1.into(), 3.into()));
        assert_eq!(node.kind(), CALL);
        let node = root.covering_node(TextRange::new(5.into(), 7.into()));
        assert_eq!(node.kind(), ROOT);
    }

    #[test]
    fn test_token_text() {
        let root = sample();
        let source = b"MAIN()xy";
        let texts: Vec<_> = root.tokens().map(|t| t.text(source).to_vec()).collect();
        assert_eq!(texts, vec![b"MAIN".to_vec(), b"(".to_vec(), b")".to_vec(), b"xy".to_vec()]);
    }
}
