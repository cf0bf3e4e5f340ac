use crate::syntax::{FieldId, SyntaxKind, SyntaxNode};
use std::fmt;
use std::sync::Arc;

type NodePredicateFn = Arc<dyn Fn(&SyntaxNode) -> bool + Send + Sync>;

/// Predicate for matching nodes. Kind and field checks avoid boxing.
#[derive(Clone)]
enum NodePredicate {
    Kind(SyntaxKind),
    Field(FieldId),
    Custom(NodePredicateFn),
}

impl NodePredicate {
    fn matches(&self, node: &SyntaxNode) -> bool {
        match self {
            Self::Kind(kind) => node.kind() == *kind,
            Self::Field(field) => node.field() == Some(*field),
            Self::Custom(f) => f(node),
        }
    }
}

impl fmt::Debug for NodePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(kind) => write!(f, "Kind({kind:?})"),
            Self::Field(field) => write!(f, "Field({field:?})"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Builder for a [`Query`]. All predicates must hold for a node to match.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    predicates: Vec<NodePredicate>,
    max_results: Option<usize>,
}

impl QueryBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            predicates: Vec::new(),
            max_results: None,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: SyntaxKind) -> Self {
        self.predicates.push(NodePredicate::Kind(kind));
        self
    }

    /// Match nodes that their parent names with `field`.
    #[must_use]
    pub fn with_field(mut self, field: FieldId) -> Self {
        self.predicates.push(NodePredicate::Field(field));
        self
    }

    #[must_use]
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&SyntaxNode) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(NodePredicate::Custom(Arc::new(predicate)));
        self
    }

    #[must_use]
    pub const fn limit(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    #[must_use]
    pub fn build(self) -> Query {
        Query {
            predicates: self.predicates,
            max_results: self.max_results,
        }
    }
}

/// A compiled node query
#[derive(Debug, Clone)]
pub struct Query {
    predicates: Vec<NodePredicate>,
    max_results: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn matches(&self, node: &SyntaxNode) -> bool {
        self.predicates.iter().all(|p| p.matches(node))
    }

    /// Matching nodes under `root` (inclusive) in preorder.
    #[must_use]
    pub fn find_all(&self, root: &SyntaxNode) -> Vec<SyntaxNode> {
        root.descendants()
            .filter(|node| self.matches(node))
            .take(self.max_results.unwrap_or(usize::MAX))
            .collect()
    }

    #[must_use]
    pub fn find_first(&self, root: &SyntaxNode) -> Option<SyntaxNode> {
        root.descendants().find(|node| self.matches(node))
    }
}

impl SyntaxNode {
    /// All nodes of `kind` under this node, in preorder.
    #[must_use]
    pub fn find_by_kind(&self, kind: SyntaxKind) -> Vec<Self> {
        QueryBuilder::new().with_kind(kind).build().find_all(self)
    }

    #[must_use]
    pub fn find_first_by_kind(&self, kind: SyntaxKind) -> Option<Self> {
        QueryBuilder::new().with_kind(kind).build().find_first(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{GreenElement, GreenNode, GreenToken, TextSize};
    use smallvec::smallvec;

    const IDENT: SyntaxKind = SyntaxKind::from_raw(2);
    const NAME: SyntaxKind = SyntaxKind::from_raw(5);
    const ITEM: SyntaxKind = SyntaxKind::from_raw(6);
    const FILE: SyntaxKind = SyntaxKind::from_raw(7);

    fn tree() -> SyntaxNode {
        let name = |len: u32| {
            GreenElement::Node(GreenNode::new(
                NAME,
                vec![GreenElement::Token(GreenToken::new(IDENT, TextSize::from(len)))],
                smallvec![],
                0,
            ))
        };
        let item = |len: u32| {
            GreenElement::Node(GreenNode::new(
                ITEM,
                vec![name(len)],
                smallvec![(0, FieldId::from_raw(0))],
                0,
            ))
        };
        SyntaxNode::new_root(GreenNode::new(FILE, vec![item(3), item(4)], smallvec![], 0))
    }

    #[test]
    fn test_find_by_kind() {
        let root = tree();
        let names = root.find_by_kind(NAME);
        assert_eq!(names.len(), 2);
        assert_eq!(names[1].text_range().start(), TextSize::from(3));
        assert!(root.find_first_by_kind(IDENT).is_none());
    }

    #[test]
    fn test_field_and_predicate() {
        let root = tree();
        let query = QueryBuilder::new()
            .with_field(FieldId::from_raw(0))
            .with_predicate(|node| node.text_range().len() == TextSize::from(4))
            .build();
        let found = query.find_all(&root);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind(), NAME);
        assert!(!query.matches(&root));
    }

    #[test]
    fn test_limit() {
        let root = tree();
        let query = QueryBuilder::new().with_kind(ITEM).limit(1).build();
        assert_eq!(query.find_all(&root).len(), 1);
        assert_eq!(query.find_first(&root).map(|n| n.kind()), Some(ITEM));
    }
}
