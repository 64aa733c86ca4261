use std::{fs, path::Path};

use ptree::{print_tree, TreeBuilder};
use thiserror::Error;

use super::node::{Node, NodeError};
use super::{EdgeLength, NodeId};

/// Errors that can occur when reading, writing and manipulating [`Tree`] structs.
#[derive(Error, Debug)]
pub enum TreeError {
    /// No root node was found in the tree and we are trying to do something
    /// that requires a root node
    #[error("No root node found")]
    RootNotFound,
    /// Some of the leaves in the tree have no label
    #[error("All your leaf nodes must be named.")]
    UnnamedLeaves,
    /// Some branches of the tree have no length where one is required
    #[error("The tree must have all branch lengths.")]
    MissingBranchLengths,
    /// The requested node with index [`NodeId`] does not exist in the tree
    #[error("There is no node with index: {0}")]
    NodeNotFound(NodeId),
    /// The node with index [`NodeId`] could not be compressed
    #[error("Could not compress node {0}, it does not have exactly one parent and one child")]
    CouldNotCompressNode(NodeId),
    /// A tip node cannot become the root of the tree
    #[error("Cannot place the root on tip node {0}")]
    CannotRerootOnTip(NodeId),
    /// There was a [`std::io::Error`] when writing the tree to a file
    #[error("Error writing tree to file")]
    IoError(#[from] std::io::Error),
    /// There was a [`NodeError`] when operating on a node
    #[error("Could not operate on Node")]
    NodeError(#[from] NodeError),
}

/// Errors that can occur when parsing newick strings.
#[derive(Error, Debug)]
pub enum NewickParseError {
    /// There is an unclosed bracket in the newick String
    #[error("Missing a closing bracket.")]
    UnclosedBracket,
    /// The newick string is missing a final semi-colon
    #[error("The tree is missing a semi colon at the end.")]
    NoClosingSemicolon,
    /// We are trying to close a subtree but have no parent node.
    #[error("Parent node of subtree not found")]
    NoSubtreeParent,
    /// There was a [`TreeError`] when building a tree from the newick string
    #[error("Problem with building the tree.")]
    TreeError(#[from] TreeError),
    /// There was a [`std::num::ParseFloatError`] when parsing branch lengths
    #[error("Could not parse a branch length")]
    FloatError(#[from] std::num::ParseFloatError),
    /// There was a [`std::io::Error`] when reading a newick file
    #[error("Problem reading file")]
    IoError(#[from] std::io::Error),
}

/// A rooted, multiply-labeled gene tree.
///
/// Nodes live in an arena indexed by [`NodeId`]; removed nodes are
/// tombstoned in place so identifiers remain stable across mutations.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

/// Base methods to add and get [`Node`] objects to and from the [`Tree`].
///
/// ----
/// ----
impl Tree {
    /// Create a new empty Tree object
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    // ############################
    // # ADDING AND GETTING NODES #
    // ############################

    /// Add a new node to the tree.
    pub fn add(&mut self, node: Node) -> NodeId {
        let idx = self.nodes.len();
        let mut node = node;
        node.id = idx;
        self.nodes.push(node);

        idx
    }

    /// Add a child to one of the tree's nodes.
    ///
    /// # Example
    /// ```
    /// use orthoprune::tree::{Tree, Node};
    ///
    /// // Create the tree and add a root node
    /// let mut tree = Tree::new();
    /// let root_id = tree.add(Node::new());
    ///
    /// // Add children to the root
    /// let left = tree.add_child(Node::new(), root_id, None).unwrap();
    /// let right = tree.add_child(Node::new(), root_id, Some(0.1)).unwrap();
    ///
    /// assert_eq!(tree.get(&root_id).unwrap().children.len(), 2);
    /// assert_eq!(tree.get(&right).unwrap().parent_edge, Some(0.1));
    /// ```
    pub fn add_child(
        &mut self,
        node: Node,
        parent: NodeId,
        edge: Option<EdgeLength>,
    ) -> Result<NodeId, TreeError> {
        if parent >= self.nodes.len() {
            return Err(TreeError::NodeNotFound(parent));
        }

        let mut node = node;
        node.set_parent(parent, edge);

        let id = self.add(node);

        self.get_mut(&id)?.set_id(id);
        self.get_mut(&parent)?.add_child(id);

        Ok(id)
    }

    /// Get a reference to a specific Node of the tree
    pub fn get(&self, id: &NodeId) -> Result<&Node, TreeError> {
        if *id >= self.nodes.len() {
            return Err(TreeError::NodeNotFound(*id));
        }
        let node = &self.nodes[*id];
        if node.deleted {
            return Err(TreeError::NodeNotFound(*id));
        }

        Ok(node)
    }

    /// Get a mutable reference to a specific Node of the tree
    pub fn get_mut(&mut self, id: &NodeId) -> Result<&mut Node, TreeError> {
        if *id >= self.nodes.len() {
            return Err(TreeError::NodeNotFound(*id));
        }
        let node = &mut self.nodes[*id];
        if node.deleted {
            return Err(TreeError::NodeNotFound(*id));
        }

        Ok(node)
    }

    /// Get a reference to a node in the tree by name.
    /// Note that this does not check for name unicity; if several nodes
    /// match a name this function will return the first match in the tree.
    pub fn get_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|node| !node.deleted && node.name.as_deref() == Some(name))
    }

    /// Gets the root node. In the case of unrooted trees this node is a
    /// "virtual root" that has exactly 3 children.
    pub fn get_root(&self) -> Result<NodeId, TreeError> {
        self.nodes
            .iter()
            .filter(|&node| !node.deleted && node.parent.is_none())
            .map(|node| node.id)
            .next()
            .ok_or(TreeError::RootNotFound)
    }

    /// Returns a [`Vec`] containing the Node IDs of the leaf nodes of the tree
    pub fn get_leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|&node| !node.deleted && node.is_tip())
            .map(|node| node.id)
            .collect()
    }

    /// Returns a [`Vec`] containing the labels of the leaf nodes of the tree
    pub fn get_leaf_names(&self) -> Vec<Option<String>> {
        self.get_leaves()
            .iter()
            .filter_map(|leaf_id| self.get(leaf_id).ok())
            .map(|leaf| leaf.name.clone())
            .collect()
    }

    /// Gets the node ids of all the leaves in the subtree rooted at the
    /// specified node, in pre-order.
    pub fn get_subtree_leaves(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        Ok(self
            .preorder(root)?
            .into_iter()
            .filter(|id| self.get(id).map(|node| node.is_tip()).unwrap_or(false))
            .collect())
    }

    /// Returns the number of live nodes in the tree
    pub fn size(&self) -> usize {
        self.nodes.iter().filter(|node| !node.deleted).count()
    }

    /// Returns the number of leaf nodes in the tree
    pub fn n_leaves(&self) -> usize {
        self.get_leaves().len()
    }
}

/// Methods to traverse the [`Tree`]
///
/// ----
/// ----
impl Tree {
    // ###################
    // # TREE TRAVERSALS #
    // ###################

    /// Returns a vector containing node ids in the same order as the
    /// [preorder](https://en.wikipedia.org/wiki/Tree_traversal#Pre-order,_NLR) tree traversal
    /// ```
    /// use orthoprune::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,(C,E)D)B,G)F;").unwrap();
    /// let preorder: Vec<_> = tree.preorder(&tree.get_root().unwrap())
    ///     .unwrap()
    ///     .iter()
    ///     .flat_map(|id| tree.get(id).unwrap().name.clone())
    ///     .collect();
    ///
    /// assert_eq!(preorder, vec!["F", "B", "A", "D", "C", "E", "G"])
    /// ```
    pub fn preorder(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut indices = vec![*root];
        for child in self.get(root)?.children.iter() {
            indices.extend(self.preorder(child)?)
        }

        Ok(indices)
    }
}

/// Methods that alter the topology of the [`Tree`]
///
/// ----
/// ----
impl Tree {
    // ##################
    // # ALTER THE TREE #
    // ##################

    /// Prune the subtree starting at a given root node: the subtree is
    /// detached from its parent and all its nodes are removed. The caller
    /// is responsible for collapsing any kink left above the prune point.
    /// # Example
    /// ```
    /// use orthoprune::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("((A,(C,E)D)B,(H,I)G)F;").unwrap();
    /// let root_idx = tree.get_by_name("G").unwrap().id;
    ///
    /// tree.prune(&root_idx).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "((A,(C,E)D)B)F;")
    /// ```
    pub fn prune(&mut self, root: &NodeId) -> Result<(), TreeError> {
        for child in self.get(root)?.children.clone() {
            self.prune(&child)?
        }

        if let Some(parent) = self.get(root)?.parent {
            self.get_mut(&parent)?.remove_child(root)?;
        }

        self.get_mut(root)?.delete();

        Ok(())
    }

    /// Copy the subtree rooted at a given node into a new standalone [`Tree`].
    /// The original tree is left untouched.
    pub fn extract_subtree(&self, root: &NodeId) -> Result<Tree, TreeError> {
        let node = self.get(root)?;

        let mut sub = Tree::new();
        let mut sub_root = Node::new();
        sub_root.name = node.name.clone();
        sub_root.parent_edge = node.parent_edge;
        let sub_root = sub.add(sub_root);

        self.copy_descendants(root, &mut sub, &sub_root)?;

        Ok(sub)
    }

    // Recursively copy the children of `src` under `dest_parent` in `dest`.
    fn copy_descendants(
        &self,
        src: &NodeId,
        dest: &mut Tree,
        dest_parent: &NodeId,
    ) -> Result<(), TreeError> {
        for child in self.get(src)?.children.clone() {
            let child_node = self.get(&child)?;
            let mut copy = Node::new();
            copy.name = child_node.name.clone();
            let copy = dest.add_child(copy, *dest_parent, child_node.parent_edge)?;
            self.copy_descendants(&child, dest, &copy)?;
        }

        Ok(())
    }

    // Removes a single-child node, merging its branch length into its child.
    fn compress_node(&mut self, id: &NodeId) -> Result<NodeId, TreeError> {
        let node = self.get(id)?;

        if node.parent.is_none() || node.children.len() != 1 {
            return Err(TreeError::CouldNotCompressNode(*id));
        }

        let parent = node.parent.unwrap();
        let child = node.children[0];
        let to_remove = node.id;

        let new_edge = match (node.parent_edge, self.get(&child)?.parent_edge) {
            (Some(p), Some(c)) => Some(p + c),
            (None, None) => None,
            _ => return Err(TreeError::MissingBranchLengths),
        };

        self.get_mut(&child)?.set_parent(parent, new_edge);
        self.get_mut(&parent)?.remove_child(&to_remove)?;
        self.get_mut(&parent)?.add_child(child);

        self.get_mut(&to_remove)?.delete();

        Ok(child)
    }

    /// Collapse a kink: a node with exactly one child is spliced out and the
    /// two branch lengths are summed onto the surviving child.
    ///
    /// Two root configurations are handled specially:
    ///  - a root with exactly two children is first rerooted onto one of its
    ///    non-tip children (a tip cannot become the root), which leaves the
    ///    old root as a kink to collapse and yields a trifurcating root;
    ///  - a root left with a single child has that child promoted to root.
    ///
    /// Returns the id of the merged node and the (possibly new) root id.
    /// # Example
    /// ```
    /// use orthoprune::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("((A:0.25)B:0.25,C:0.5)R;").unwrap();
    /// let kink = tree.get_by_name("B").unwrap().id;
    ///
    /// tree.remove_kink(&kink).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "(C:0.5,A:0.5)R;")
    /// ```
    pub fn remove_kink(&mut self, node: &NodeId) -> Result<(NodeId, NodeId), TreeError> {
        let node = *node;
        let mut root = self.get_root()?;

        if node == root {
            let children = self.get(&root)?.children.clone();
            match children.len() {
                2 => {
                    // move the root away to an adjacent non-tip
                    let target = if !self.get(&children[0])?.is_tip() {
                        children[0]
                    } else if !self.get(&children[1])?.is_tip() {
                        children[1]
                    } else {
                        return Err(TreeError::CannotRerootOnTip(children[0]));
                    };
                    root = self.reroot(&target)?;
                    // the old root is now a kink below the new root
                }
                1 => {
                    // the root itself is the kink: promote its only child
                    let child = children[0];
                    self.get_mut(&root)?.remove_child(&child)?;
                    {
                        let child_node = self.get_mut(&child)?;
                        child_node.parent = None;
                        child_node.parent_edge = None;
                    }
                    self.get_mut(&node)?.delete();
                    return Ok((child, child));
                }
                _ => return Err(TreeError::CouldNotCompressNode(node)),
            }
        }

        let merged = self.compress_node(&node)?;

        Ok((merged, root))
    }

    /// Restructure the tree so that `target` becomes the root.
    ///
    /// Every edge on the path from the old root down to `target` is flipped;
    /// a flipped edge keeps its branch length and internal label, both of
    /// which move from its lower endpoint to its upper endpoint so that
    /// support values stay attached to the edge they describe. The old root
    /// ends up as an extra child of `target`, so rerooting a binary internal
    /// node produces a trifurcation.
    ///
    /// Rerooting on the current root is a no-op; rerooting on any other tip
    /// is an error.
    /// # Example
    /// ```
    /// use orthoprune::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("(A:1,B:1,(C:1,D:1)cd:1)r;").unwrap();
    /// let target = tree.get_by_name("cd").unwrap().id;
    ///
    /// tree.reroot(&target).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "(C:1,D:1,(A:1,B:1)cd:1)cd;")
    /// ```
    pub fn reroot(&mut self, target: &NodeId) -> Result<NodeId, TreeError> {
        let target = *target;

        // Path from `target` up to the current root
        let mut path = vec![target];
        let mut current = target;
        while let Some(parent) = self.get(&current)?.parent {
            path.push(parent);
            current = parent;
        }

        if path.len() == 1 {
            return Ok(target); // already the root
        }
        if self.get(&target)?.is_tip() {
            return Err(TreeError::CannotRerootOnTip(target));
        }

        path.reverse();

        // Flip each edge on the path from the old root downwards; lengths
        // and labels of flipped edges move to their upper endpoint.
        for i in 0..path.len() - 1 {
            let upper = path[i];
            let lower = path[i + 1];

            let edge = self.get(&lower)?.parent_edge;
            let label = self.get(&lower)?.name.clone();

            self.get_mut(&upper)?.remove_child(&lower)?;
            self.get_mut(&lower)?.add_child(upper);
            let upper_node = self.get_mut(&upper)?;
            upper_node.set_parent(lower, edge);
            upper_node.name = label;
        }

        let new_root = self.get_mut(&target)?;
        new_root.parent = None;
        new_root.parent_edge = None;

        Ok(target)
    }
}

/// Methods to read and write [`Tree`] objects to and from files or strings.
///
/// ----
/// ----
impl Tree {
    // ########################
    // # READ AND WRITE TREES #
    // ########################

    // Generate the newick representation of the subtree rooted at `root`
    fn to_newick_impl(&self, root: &NodeId) -> Result<String, TreeError> {
        let root = self.get(root)?;
        if root.children.is_empty() {
            return Ok(root.to_newick());
        }

        let mut children = Vec::with_capacity(root.children.len());
        for child in root.children.iter() {
            children.push(self.to_newick_impl(child)?);
        }

        Ok("(".to_string() + &children.join(",") + ")" + &root.to_newick())
    }

    /// Writes the tree as a newick formatted string
    /// # Example
    /// ```
    /// use orthoprune::tree::Tree;
    ///
    /// let newick = "(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;";
    /// let tree = Tree::from_newick(newick).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), newick);
    /// ```
    pub fn to_newick(&self) -> Result<String, TreeError> {
        let root = self.get_root()?;
        Ok(self.to_newick_impl(&root)? + ";")
    }

    /// Read a newick formatted string and build a [`Tree`] struct from it.
    /// Whitespace and bracketed comments are ignored.
    /// # Example
    /// ```
    /// use orthoprune::tree::Tree;
    ///
    /// let newick = "(376678.main:0.1,376728.0:0.2,(4691.a:0.3,4691.b:0.4):0.5);";
    /// let tree = Tree::from_newick(newick).unwrap();
    ///
    /// assert_eq!(tree.size(), 6);
    /// assert_eq!(tree.n_leaves(), 4);
    /// ```
    pub fn from_newick(newick: &str) -> Result<Self, NewickParseError> {
        #[derive(Debug, PartialEq)]
        enum Field {
            Name,
            Length,
        }

        let mut tree = Tree::new();

        let mut parsing = Field::Name;
        let mut current_name: Option<String> = None;
        let mut current_length: Option<String> = None;
        let mut current_index: Option<NodeId> = None;
        let mut parent_stack: Vec<NodeId> = Vec::new();
        let mut within_comment = false;

        for c in newick.chars() {
            if within_comment {
                if c == ']' {
                    within_comment = false;
                }
                continue;
            }
            if c.is_whitespace() {
                continue;
            }

            match c {
                '[' => within_comment = true,
                '(' => {
                    // Start subtree
                    match parent_stack.last() {
                        None => parent_stack.push(tree.add(Node::new())),
                        Some(parent) => {
                            parent_stack.push(tree.add_child(Node::new(), *parent, None)?)
                        }
                    };
                }
                ':' => {
                    // Start parsing the branch length
                    parsing = Field::Length;
                }
                ',' => {
                    // Finish the current node and start a sibling
                    if parent_stack.is_empty() {
                        return Err(NewickParseError::NoSubtreeParent);
                    }
                    Self::finish_node(
                        &mut tree,
                        parent_stack.last(),
                        current_index.take(),
                        current_name.take(),
                        current_length.take(),
                    )?;
                    parsing = Field::Name;
                }
                ')' => {
                    // Close the subtree
                    Self::finish_node(
                        &mut tree,
                        parent_stack.last(),
                        current_index.take(),
                        current_name.take(),
                        current_length.take(),
                    )?;
                    parsing = Field::Name;

                    match parent_stack.pop() {
                        Some(parent) => current_index = Some(parent),
                        None => return Err(NewickParseError::NoSubtreeParent),
                    }
                }
                ';' => {
                    // Finish parsing the tree
                    if !parent_stack.is_empty() {
                        return Err(NewickParseError::UnclosedBracket);
                    }
                    Self::finish_node(
                        &mut tree,
                        None,
                        current_index.take(),
                        current_name.take(),
                        current_length.take(),
                    )?;
                    return Ok(tree);
                }
                _ => match parsing {
                    Field::Name => current_name.get_or_insert_with(String::new).push(c),
                    Field::Length => current_length.get_or_insert_with(String::new).push(c),
                },
            }
        }

        Err(NewickParseError::NoClosingSemicolon)
    }

    // Attach the buffered name and branch length to the node being closed,
    // creating it first if it has no subtree (i.e. it is a tip).
    fn finish_node(
        tree: &mut Tree,
        parent: Option<&NodeId>,
        index: Option<NodeId>,
        name: Option<String>,
        length: Option<String>,
    ) -> Result<NodeId, NewickParseError> {
        let id = match index {
            Some(id) => id,
            None => match parent {
                Some(parent) => tree.add_child(Node::new(), *parent, None)?,
                None => tree.add(Node::new()),
            },
        };

        let node = tree.get_mut(&id)?;
        if let Some(name) = name {
            node.set_name(name);
        }
        if let Some(length) = length {
            node.parent_edge = Some(length.parse()?);
        }

        Ok(id)
    }

    /// Writes the tree to a newick file, terminated by a trailing `;`
    pub fn to_file(&self, path: &Path) -> Result<(), TreeError> {
        match fs::write(path, self.to_newick()? + "\n") {
            Ok(_) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Creates a tree from a newick file
    pub fn from_file(path: &Path) -> Result<Self, NewickParseError> {
        let newick_string = fs::read_to_string(path)?;
        Self::from_newick(&newick_string)
    }

    fn print_nodes(
        &self,
        root_idx: &NodeId,
        output_tree: &mut TreeBuilder,
        debug: bool,
    ) -> Result<(), TreeError> {
        let root = self.get(root_idx)?;
        let label = if debug {
            format!("{root:?}")
        } else {
            format!("{root}")
        };

        if root.children.is_empty() {
            output_tree.add_empty_child(label);
        } else {
            output_tree.begin_child(label);
            for child_idx in root.children.iter() {
                self.print_nodes(child_idx, output_tree, debug)?;
            }
            output_tree.end_child();
        }

        Ok(())
    }

    /// Print a debug view of the tree to the console
    pub fn print_debug(&self) -> Result<(), TreeError> {
        let root = self.get_root()?;
        let mut builder = TreeBuilder::new(format!("{:?}", self.get(&root)?));
        for child_idx in self.get(&root)?.children.iter() {
            self.print_nodes(child_idx, &mut builder, true)?;
        }
        let tree = builder.build();
        print_tree(&tree)?;
        Ok(())
    }

    /// Print the tree to the console
    pub fn print(&self) -> Result<(), TreeError> {
        let root = self.get_root()?;
        let mut builder = TreeBuilder::new(format!("{}", self.get(&root)?));
        for child_idx in self.get(&root)?.children.iter() {
            self.print_nodes(child_idx, &mut builder, false)?;
        }
        let tree = builder.build();
        print_tree(&tree)?;
        Ok(())
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}
