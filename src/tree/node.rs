use std::fmt::{Debug, Display};

use thiserror::Error;

use super::{EdgeLength, NodeId};

/// Errors that can occur when manipulating [`Node`] structs.
#[derive(Error, Debug)]
pub enum NodeError {
    /// We are trying to access an unexisting child of the node
    #[error("Node {parent} does not have child {child}.")]
    HasNoChild {
        /// Id of the parent node
        parent: NodeId,
        /// Id of the inexistant child node
        child: NodeId,
    },
    /// We are trying to access the parent of a parentless node
    #[error("Node {0} does not have a parent")]
    HasNoParent(NodeId),
}

/// A node of the [`super::Tree`].
///
/// Tip nodes carry a composite label of the form
/// `<taxon>.<copy>` (e.g. `376678.main`), where the taxon identifier is
/// everything before the first `.`.
#[derive(Clone)]
pub struct Node {
    /// Index of the node
    pub id: NodeId,
    /// Label of the node. Always present on tips, sometimes on internal
    /// nodes (support values written by the tree builder).
    pub name: Option<String>,
    /// Index of the parent node
    pub parent: Option<NodeId>,
    /// Indices of child nodes
    pub children: Vec<NodeId>,
    /// Length of the branch between parent and node
    pub parent_edge: Option<EdgeLength>,
    // Whether the node is deleted or not
    pub(crate) deleted: bool,
}

impl Node {
    /// Creates a new Node
    pub fn new() -> Self {
        Self {
            id: 0,
            name: None,
            parent: None,
            children: vec![],
            parent_edge: None,
            deleted: false,
        }
    }

    /// Creates a new named Node
    pub fn new_named(name: &str) -> Self {
        Self {
            name: Some(String::from(name)),
            ..Self::new()
        }
    }

    /// Sets the internal Node name
    pub fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    /// Sets the internal Node id
    pub fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    /// Set the parent node and the length of the branch leading to it
    pub fn set_parent(&mut self, parent: NodeId, parent_edge: Option<EdgeLength>) {
        self.parent = Some(parent);
        self.parent_edge = parent_edge;
    }

    /// Adds a child to the node
    pub fn add_child(&mut self, child: NodeId) {
        self.children.push(child);
    }

    /// Removes the child from the node
    pub fn remove_child(&mut self, child: &NodeId) -> Result<(), NodeError> {
        let vec_index = match self.children.iter().position(|node_id| node_id == child) {
            Some(idx) => idx,
            None => {
                return Err(NodeError::HasNoChild {
                    parent: self.id,
                    child: *child,
                })
            }
        };

        self.children.remove(vec_index);

        Ok(())
    }

    /// Check if the node is a tip node
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }

    /// Check if the node is a root node
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of children of this node
    pub fn nchildren(&self) -> usize {
        self.children.len()
    }

    /// Empties the node and sets it as deleted
    pub(crate) fn delete(&mut self) {
        *self = Self::new();
        self.deleted = true;
    }

    /// Returns the newick fragment for this node alone: its label and
    /// branch length, without children.
    pub(crate) fn to_newick(&self) -> String {
        let mut repr = self.name.clone().unwrap_or_default();
        if let Some(length) = self.parent_edge {
            repr += &format!(":{length}");
        }
        repr
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if self.parent.is_some() != other.parent.is_some() {
            return false;
        }

        let parent_edges_equal = match (self.parent_edge, other.parent_edge) {
            (None, None) => true,
            (Some(l1), Some(l2)) => (l1 - l2).abs() < f64::EPSILON,
            _ => false,
        };

        self.name == other.name && self.children.len() == other.children.len() && parent_edges_equal
    }
}

impl Eq for Node {}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.parent_edge {
            Some(l) => write!(f, "({l:.3}) {:?}", self.name),
            None => write!(f, "{:?}", self.name),
        }
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:?}) {:?} Id[{}] Parent[{:?}] Children({:?})",
            self.parent_edge, self.name, self.id, self.parent, self.children,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_child() {
        let mut parent = Node::new_named("parent");
        parent.set_id(0);
        parent.add_child(1);
        parent.add_child(2);
        assert_eq!(parent.nchildren(), 2);

        parent.remove_child(&1).unwrap();
        assert_eq!(parent.children, vec![2]);

        assert!(parent.remove_child(&1).is_err());
    }

    #[test]
    fn tip_and_root_predicates() {
        let mut node = Node::new_named("376678.main");
        assert!(node.is_tip());
        assert!(node.is_root());

        node.add_child(3);
        node.set_parent(1, Some(0.5));
        assert!(!node.is_tip());
        assert!(!node.is_root());
    }

    #[test]
    fn newick_fragment() {
        let mut node = Node::new_named("A.1");
        assert_eq!(node.to_newick(), "A.1");
        node.parent_edge = Some(0.5);
        assert_eq!(node.to_newick(), "A.1:0.5");
    }
}
