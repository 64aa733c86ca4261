//! Taxon-level queries over gene trees.
//!
//! Tip labels are composite: `<taxon>.<copy>` (e.g. `376678.main`), where
//! everything before the first `.` identifies the taxon and the rest
//! distinguishes gene copies (paralogs). Both pruning engines share these
//! helpers to reason about which taxa sit in "front" of a node (below it)
//! and in "back" of it (the rest of the tree).

use std::collections::HashSet;

use itertools::Itertools;

use crate::tree::{NodeId, Tree, TreeError};

/// Extract the taxon identifier from a tip label: everything before the
/// first `.`.
/// ```
/// use orthoprune::taxa::taxon_name;
///
/// assert_eq!(taxon_name("376678.main"), "376678");
/// assert_eq!(taxon_name("376728"), "376728");
/// ```
pub fn taxon_name(label: &str) -> &str {
    label.split('.').next().unwrap_or(label)
}

/// Labels of all tips in the subtree rooted at `node`, in pre-order.
/// Unlabeled tips are an error.
pub fn front_labels(tree: &Tree, node: &NodeId) -> Result<Vec<String>, TreeError> {
    tree.get_subtree_leaves(node)?
        .iter()
        .map(|leaf| {
            tree.get(leaf)?
                .name
                .clone()
                .ok_or(TreeError::UnnamedLeaves)
        })
        .collect()
}

/// Taxon names of all tips in the subtree rooted at `node`. May contain
/// duplicates when the subtree holds paralogs.
pub fn front_names(tree: &Tree, node: &NodeId) -> Result<Vec<String>, TreeError> {
    Ok(front_labels(tree, node)?
        .iter()
        .map(|label| taxon_name(label).to_string())
        .collect())
}

/// Taxon names of all tips of `root`'s tree that are NOT under `node`.
///
/// Computed as a set difference on labels, so duplicate copies of a taxon on
/// the back side collapse to a single occurrence; only counts derived from
/// this are meaningful, not multiplicities.
pub fn back_names(tree: &Tree, node: &NodeId, root: &NodeId) -> Result<Vec<String>, TreeError> {
    let all_labels: HashSet<String> = front_labels(tree, root)?.into_iter().collect();
    let node_labels: HashSet<String> = front_labels(tree, node)?.into_iter().collect();

    Ok(all_labels
        .difference(&node_labels)
        .map(|label| taxon_name(label).to_string())
        .collect())
}

/// Front taxon names filtered to membership in the outgroup set.
pub fn front_outgroup_names(
    tree: &Tree,
    node: &NodeId,
    outgroups: &HashSet<String>,
) -> Result<Vec<String>, TreeError> {
    Ok(front_names(tree, node)?
        .into_iter()
        .filter(|name| outgroups.contains(name))
        .collect())
}

/// Number of unique taxa under `node`: all paralogs of a given taxon count
/// as one.
/// ```
/// use orthoprune::tree::Tree;
/// use orthoprune::taxa::count_taxa;
///
/// let tree = Tree::from_newick("((A.1,A.2),(B,C));").unwrap();
/// let root = tree.get_root().unwrap();
///
/// assert_eq!(count_taxa(&tree, &root).unwrap(), 3);
/// ```
pub fn count_taxa(tree: &Tree, node: &NodeId) -> Result<usize, TreeError> {
    Ok(front_names(tree, node)?.iter().unique().count())
}

/// Checks whether any taxon appears more than once under `node`.
pub fn has_duplicate_taxa(tree: &Tree, node: &NodeId) -> Result<bool, TreeError> {
    let names = front_names(tree, node)?;
    Ok(names.iter().unique().count() < names.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Tree {
        Tree::from_newick("((376678.main:1,376678.0:1):1,(376728.main:1,4691.a:1):1);").unwrap()
    }

    #[test]
    fn names_strip_copy_discriminators() {
        let tree = sample_tree();
        let root = tree.get_root().unwrap();

        assert_eq!(
            front_labels(&tree, &root).unwrap(),
            vec!["376678.main", "376678.0", "376728.main", "4691.a"]
        );
        assert_eq!(
            front_names(&tree, &root).unwrap(),
            vec!["376678", "376678", "376728", "4691"]
        );
    }

    #[test]
    fn unique_taxon_counts() {
        let tree = sample_tree();
        let root = tree.get_root().unwrap();

        // paralogs of 376678 count once, at the root and below it
        assert_eq!(count_taxa(&tree, &root).unwrap(), 3);
        let pair = tree.get(&root).unwrap().children[0];
        assert_eq!(count_taxa(&tree, &pair).unwrap(), 1);

        assert!(has_duplicate_taxa(&tree, &root).unwrap());
        assert!(!has_duplicate_taxa(&tree, &pair).unwrap());
    }

    #[test]
    fn back_names_complement_front() {
        let tree = sample_tree();
        let root = tree.get_root().unwrap();
        let pair = tree.get(&root).unwrap().children[0];

        let mut back = back_names(&tree, &pair, &root).unwrap();
        back.sort();
        assert_eq!(back, vec!["376728", "4691"]);
    }

    #[test]
    fn back_names_collapse_duplicates() {
        // both copies of A sit at the back of node (B,C): the set
        // difference on labels keeps them as two labels but they map to a
        // single name each, while duplicates of a label itself cannot occur
        let tree = Tree::from_newick("((A.1:1,A.2:1):1,(B.1:1,C.1:1):1);").unwrap();
        let root = tree.get_root().unwrap();
        let bc = tree.get(&root).unwrap().children[1];

        let mut back = back_names(&tree, &bc, &root).unwrap();
        back.sort();
        assert_eq!(back, vec!["A", "A"]);
    }

    #[test]
    fn outgroup_filtering() {
        let tree = sample_tree();
        let root = tree.get_root().unwrap();
        let outgroups: HashSet<String> = ["4691".to_string()].into_iter().collect();

        assert_eq!(
            front_outgroup_names(&tree, &root, &outgroups).unwrap(),
            vec!["4691"]
        );
    }

    #[test]
    fn unlabeled_tips_are_rejected() {
        let tree = Tree::from_newick("((A,),B);").unwrap();
        let root = tree.get_root().unwrap();

        assert!(matches!(
            front_names(&tree, &root),
            Err(TreeError::UnnamedLeaves)
        ));
    }
}
