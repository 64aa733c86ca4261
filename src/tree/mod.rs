//! Build and manipulate multiply-labeled gene-family trees.
//!
//! This module defines the two essential structs used by the pruning engines:
//!  - The [`Node`] struct that represents a node of a gene tree.
//!  - The [`Tree`] struct that holds a collection of [`Node`] objects.

mod node;
mod tree_impl;

pub use self::node::{Node, NodeError};
pub use self::tree_impl::{NewickParseError, Tree, TreeError};

/// A type that represents identifiers of [`Node`] objects
/// within a [`Tree`] object.
pub type NodeId = usize;

/// A type that represents branch lengths between [`Node`] objects
/// within a [`Tree`] object.
pub type EdgeLength = f64;
