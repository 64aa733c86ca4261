//! Deep-paralog cutting.
//!
//! Gene-family trees that mix ancient paralogs show very long internal
//! branches separating the copies. Cutting the tree at those branches
//! yields smaller subtrees that can each be resolved independently. The
//! engine repeatedly scans the tree, removes the first over-long internal
//! branch it finds, repairs the topology, and starts over until a full scan
//! finds nothing left to cut.

use std::collections::BTreeMap;

use log::debug;

use crate::taxa;
use crate::tree::{Tree, TreeError};

/// The result of cutting one input tree.
#[derive(Debug, Default)]
pub struct CutOutcome {
    /// Subtrees produced by cutting, in the order they were split off; the
    /// residue left after all cuts comes last.
    pub subtrees: Vec<Tree>,
    /// Newick representation of every subtree discarded during cutting,
    /// mapped to a human-readable reason.
    pub discarded: BTreeMap<String, String>,
}

/// Cut all internal branches strictly longer than `cutoff`.
///
/// Every scan walks the tree in pre-order, skipping tips and the root.
/// Kinks are collapsed as soon as they are seen. At the first branch longer
/// than the cutoff, the subtree hanging from it is split off: if the node
/// has exactly two internal children whose combined branch lengths also
/// exceed the cutoff, each child subtree is recovered on its own (children
/// with fewer than `min_taxa` unique taxa are discarded with a reason);
/// otherwise the whole subtree is recovered. The scan restarts after every
/// mutation and the engine stops when a full scan changes nothing.
///
/// The residue left after all cuts is itself kept when it holds at least
/// `min_taxa` unique taxa, and discarded with a reason otherwise.
///
/// A branch of length exactly `cutoff` is never cut.
pub fn cut_long_internal_branches(
    tree: Tree,
    cutoff: f64,
    min_taxa: usize,
) -> Result<CutOutcome, TreeError> {
    let mut tree = tree;
    let mut root = tree.get_root()?;

    let mut subtrees: Vec<Tree> = Vec::new();
    let mut discarded: BTreeMap<String, String> = BTreeMap::new();

    let mut going = true;
    while going {
        // only keep going if a long branch was found during the last round
        going = false;

        for node in tree.preorder(&root)? {
            if node == root || tree.get(&node)?.is_tip() {
                continue;
            }

            if tree.get(&node)?.nchildren() == 1 {
                let (_, new_root) = tree.remove_kink(&node)?;
                root = new_root;
                going = true;
                break;
            }

            let length = tree.get(&node)?.parent_edge.unwrap_or(0.0);
            if length <= cutoff {
                continue;
            }

            debug!(
                "internal branch of length {length} with {} tips exceeds the cutoff {cutoff}",
                tree.get_subtree_leaves(&node)?.len()
            );

            let children = tree.get(&node)?.children.clone();
            let combined = children
                .iter()
                .filter_map(|child| tree.get(child).ok())
                .filter_map(|child| child.parent_edge)
                .sum::<f64>();
            let both_internal = children.len() == 2
                && children
                    .iter()
                    .all(|child| tree.get(child).map(|n| !n.is_tip()).unwrap_or(false));

            if both_internal && combined > cutoff {
                // each child subtree is an independent candidate
                for child in children.iter() {
                    let subtree = tree.extract_subtree(child)?;
                    if taxa::count_taxa(&tree, child)? >= min_taxa {
                        subtrees.push(subtree);
                    } else {
                        debug!(
                            "discarding child subtree {}: fewer than {min_taxa} taxa",
                            subtree.to_newick()?
                        );
                        discarded.insert(
                            subtree.to_newick()?,
                            format!(
                                "branch length ({length}) > cutoff ({cutoff}); both child \
                                 subtrees internal and combined child branch lengths \
                                 ({combined}) > cutoff; subtree has fewer than {min_taxa} taxa"
                            ),
                        );
                    }
                }
            } else {
                // recover the entire subtree hanging from the long branch
                debug!(
                    "recovering whole subtree below branch of length {length} as one subtree"
                );
                subtrees.push(tree.extract_subtree(&node)?);
            }

            let parent = tree.get(&node)?.parent;
            tree.prune(&node)?;

            // no kink to repair if only two leaves are left
            if tree.n_leaves() > 2 {
                if let Some(parent) = parent {
                    let nchildren = tree.get(&parent)?.nchildren();
                    if nchildren == 1 || (parent == root && nchildren == 2) {
                        let (_, new_root) = tree.remove_kink(&parent)?;
                        root = new_root;
                    }
                }
            }

            going = true;
            break;
        }
    }

    // the residue after all cuts is a candidate subtree as well
    if taxa::count_taxa(&tree, &root)? >= min_taxa {
        subtrees.push(tree);
    } else {
        debug!("after cutting, remaining tree has fewer than {min_taxa} taxa");
        discarded.insert(
            tree.to_newick()?,
            format!("after cutting, remaining tree has fewer than {min_taxa} taxa"),
        );
    }

    Ok(CutOutcome {
        subtrees,
        discarded,
    })
}

/// Uniform minimum-taxa filter applied to every produced subtree before it
/// is written out. Kept subtrees with a bifurcating root (an artifact of
/// cutting) are repaired to a trifurcating root.
pub fn filter_min_taxa(
    subtrees: Vec<Tree>,
    min_taxa: usize,
) -> Result<(Vec<Tree>, BTreeMap<String, String>), TreeError> {
    let mut kept = Vec::new();
    let mut discarded = BTreeMap::new();

    for mut tree in subtrees {
        let root = tree.get_root()?;
        if taxa::count_taxa(&tree, &root)? < min_taxa {
            debug!(
                "post-cut filtering: discarding subtree {}",
                tree.to_newick()?
            );
            discarded.insert(
                tree.to_newick()?,
                format!("post-cut filtering: subtree has fewer than {min_taxa} taxa"),
            );
            continue;
        }

        let children = tree.get(&root)?.children.clone();
        let has_internal_child = children
            .iter()
            .any(|child| tree.get(child).map(|n| !n.is_tip()).unwrap_or(false));
        if children.len() == 2 && has_internal_child {
            tree.remove_kink(&root)?;
        }

        kept.push(tree);
    }

    Ok((kept, discarded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_tree_is_returned_whole() {
        let tree = Tree::from_newick("((A:1,B:1)ab:1,(C:1,D:1)cd:1,E:1);").unwrap();

        let outcome = cut_long_internal_branches(tree, 2.0, 4).unwrap();

        assert_eq!(outcome.subtrees.len(), 1);
        assert!(outcome.discarded.is_empty());
        assert_eq!(
            outcome.subtrees[0].to_newick().unwrap(),
            "((A:1,B:1)ab:1,(C:1,D:1)cd:1,E:1);"
        );
    }

    #[test]
    fn branch_equal_to_cutoff_is_not_cut() {
        let tree = Tree::from_newick("((A:1,B:1)ab:2,(C:1,D:1)cd:1,E:1);").unwrap();

        let outcome = cut_long_internal_branches(tree, 2.0, 3).unwrap();
        assert_eq!(outcome.subtrees.len(), 1);
        assert!(outcome.discarded.is_empty());

        // the same branch is cut as soon as it exceeds the cutoff
        let tree = Tree::from_newick("((A:1,B:1)ab:2,(C:1,D:1)cd:1,E:1);").unwrap();
        let outcome = cut_long_internal_branches(tree, 1.9, 3).unwrap();
        assert_eq!(outcome.subtrees.len(), 2);
    }

    #[test]
    fn caterpillar_split_discards_small_clade() {
        // one internal branch of length 5 splits 5 taxa from 3
        let newick =
            "((((T1:1,T2:1):1,(T3:1,T4:1):1):1,T5:1)big:1,(U1:1,(U2:1,U3:1):1)small:5);";
        let tree = Tree::from_newick(newick).unwrap();

        let outcome = cut_long_internal_branches(tree, 2.0, 4).unwrap();
        assert!(outcome.discarded.is_empty());
        assert_eq!(outcome.subtrees.len(), 2);

        let (kept, discarded) = filter_min_taxa(outcome.subtrees, 4).unwrap();
        assert_eq!(kept.len(), 1);
        let root = kept[0].get_root().unwrap();
        assert_eq!(taxa::count_taxa(&kept[0], &root).unwrap(), 5);

        assert_eq!(discarded.len(), 1);
        let reason = discarded.values().next().unwrap();
        assert!(reason.contains("fewer than 4 taxa"));
    }

    #[test]
    fn split_branch_keeps_large_children_and_discards_small_ones() {
        let newick = "((((a:1,b:1):1,(c:1,d:1):1):1.5,(e:1,f:1):1)x:3,(w:1,v:1):1,(y:1,z:1):1);";
        let tree = Tree::from_newick(newick).unwrap();

        let outcome = cut_long_internal_branches(tree, 2.0, 4).unwrap();

        // the 4-taxon child and the 4-taxon residue survive; the 2-taxon
        // child is discarded at cut time
        assert_eq!(outcome.subtrees.len(), 2);
        assert_eq!(outcome.discarded.len(), 1);

        let reason = outcome.discarded.values().next().unwrap();
        assert!(reason.contains("> cutoff"));
        assert!(reason.contains("fewer than 4 taxa"));

        for subtree in &outcome.subtrees {
            let root = subtree.get_root().unwrap();
            assert_eq!(taxa::count_taxa(subtree, &root).unwrap(), 4);
        }
    }

    #[test]
    fn residue_below_minimum_is_discarded_with_reason() {
        let tree = Tree::from_newick("((A:1,B:1)ab:3,C:1,D:1);").unwrap();

        let outcome = cut_long_internal_branches(tree, 2.0, 4).unwrap();

        // the whole (A,B) clade is recovered unconditionally, the residue
        // (C,D) has too few taxa
        assert_eq!(outcome.subtrees.len(), 1);
        assert_eq!(outcome.discarded.len(), 1);
        let reason = outcome.discarded.values().next().unwrap();
        assert!(reason.contains("after cutting"));
    }

    #[test]
    fn kept_subtrees_get_trifurcating_roots() {
        let subtree = Tree::from_newick("((A:1,B:1)ab:1,(C:1,D:1)cd:1);").unwrap();

        let (kept, discarded) = filter_min_taxa(vec![subtree], 4).unwrap();

        assert!(discarded.is_empty());
        assert_eq!(kept.len(), 1);
        let root = kept[0].get_root().unwrap();
        assert_eq!(kept[0].get(&root).unwrap().nchildren(), 3);
    }
}
