//! # Syntax Trees
//!
//! Parsed trees are split in two layers. Green nodes ([`GreenNode`],
//! [`GreenToken`]) are immutable, position-free and shared through `Arc`, so
//! an incremental reparse can reuse whole subtrees of the previous tree.
//! Red cursors ([`SyntaxNode`], [`SyntaxToken`]) add absolute offsets and
//! parent links on demand.
//!
//! A [`SyntaxTree`] owns the source and the root, and provides the
//! S-expression view and the error list.

pub mod green;
pub mod kind;
pub mod line_col;
pub mod query;
pub mod red;
pub mod text;
pub mod tree;

pub use green::*;
pub use kind::*;
pub use line_col::*;
pub use query::*;
pub use red::*;
pub use text::*;
pub use tree::*;
