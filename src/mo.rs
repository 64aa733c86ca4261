//! Monophyletic-Outgroup (MO) rerooting and paralog pruning.
//!
//! The MO strategy roots each gene tree on its outgroup taxa, then
//! repeatedly discards the smaller of any two clades that share taxa, until
//! the ingroup is single-copy. It only applies when the outgroup taxa are
//! non-repeating and monophyletic; trees failing those checks are skipped
//! with a recorded reason rather than resolved.

use std::collections::HashSet;

use itertools::Itertools;
use log::{debug, warn};
use thiserror::Error;

use crate::groups::TaxonGroups;
use crate::taxa;
use crate::tree::{Tree, TreeError};

/// Errors that can occur while pruning a rerooted tree. These indicate a
/// bug in the rerooting logic rather than a data problem and must not be
/// swallowed.
#[derive(Error, Debug)]
pub enum MoError {
    /// More than one root clade carries outgroup taxa after rerooting
    #[error("more than one root clade carries outgroup taxa; rerooting produced an inconsistent tree")]
    MultipleOutgroupClades,
    /// The rerooted tree does not have the expected trifurcating root
    #[error("expected a trifurcating root after rerooting, found {0} children")]
    NotTrifurcating(usize),
    /// There was a [`TreeError`] while manipulating the tree
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// What happened to one input tree. Exactly one outcome is recorded per
/// processed tree.
#[derive(Debug)]
pub enum MoOutcome {
    /// A tip's taxon is in neither the ingroup nor the outgroup set
    UnrecognisedTaxa(Vec<String>),
    /// The tree has fewer unique taxa than the minimum
    BelowMinimumTaxa {
        /// Number of unique taxa found in the tree
        num_taxa: usize,
    },
    /// No taxon is duplicated: the tree is already single-copy
    OneToOneOrtholog(Tree),
    /// Duplication present but no outgroup tip to root on
    NoOutgroup,
    /// An outgroup taxon appears on more than one tip
    DuplicateOutgroupTaxa,
    /// The outgroup tips do not form a clade
    NonMonophyleticOutgroup,
    /// Rerooted and pruned; the rerooted tree met the taxon minimum
    PrunedAboveMinimum {
        /// Newick of the rerooted tree, captured before pruning
        rerooted: String,
        /// The pruned single-copy tree, outgroup tips included
        ortho: Tree,
    },
    /// Rerooted and pruned, but the rerooted tree was below the minimum
    PrunedBelowMinimum {
        /// Newick of the rerooted tree, captured before pruning
        rerooted: String,
        /// The pruned single-copy tree, outgroup tips included
        ortho: Tree,
    },
}

impl MoOutcome {
    /// Human-readable category name used in reports.
    pub fn category(&self) -> &'static str {
        match self {
            MoOutcome::UnrecognisedTaxa(_) => "unrecognised taxa",
            MoOutcome::BelowMinimumTaxa { .. } => "fewer than minimum taxa",
            MoOutcome::OneToOneOrtholog(_) => "1-to-1 orthologs",
            MoOutcome::NoOutgroup => "no outgroup taxa",
            MoOutcome::DuplicateOutgroupTaxa => "duplicate outgroup taxa",
            MoOutcome::NonMonophyleticOutgroup => "non-monophyletic outgroup",
            MoOutcome::PrunedAboveMinimum { .. } => "monophyletic outgroup, pruned above minimum",
            MoOutcome::PrunedBelowMinimum { .. } => "monophyletic outgroup, pruned below minimum",
        }
    }
}

/// Check that the outgroup tips are monophyletic and reroot the tree on
/// them; returns `None` when they are not.
///
/// With a single outgroup tip the tree is rerooted at that tip's parent
/// directly (a tip cannot become the root). With several, every non-root
/// node is tested for an edge that splits the tips into a pure-outgroup and
/// a pure-ingroup side; the first qualifying node wins and the tree is
/// rerooted at its parent.
pub fn reroot_with_monophyletic_outgroups(
    mut tree: Tree,
    outgroups: &HashSet<String>,
) -> Result<Option<Tree>, TreeError> {
    let root = tree.get_root()?;

    let mut outgroup_tips = Vec::new();
    for leaf in tree.get_leaves() {
        let label = tree
            .get(&leaf)?
            .name
            .clone()
            .ok_or(TreeError::UnnamedLeaves)?;
        if outgroups.contains(taxa::taxon_name(&label)) {
            outgroup_tips.push(leaf);
        }
    }

    if outgroup_tips.len() == 1 {
        // cannot root on a tip, go one node into the ingroup
        let tip = outgroup_tips[0];
        let parent = tree
            .get(&tip)?
            .parent
            .ok_or(TreeError::CannotRerootOnTip(tip))?;
        tree.reroot(&parent)?;
        return Ok(Some(tree));
    }

    let mut new_root = None;
    for node in tree.preorder(&root)? {
        if node == root {
            continue;
        }

        let front = taxa::front_names(&tree, &node)?;
        let back = taxa::back_names(&tree, &node, &root)?;

        let front_out = front
            .iter()
            .filter(|name| outgroups.contains(name.as_str()))
            .count();
        let front_in = front.len() - front_out;
        let back_out = back
            .iter()
            .filter(|name| outgroups.contains(name.as_str()))
            .count();
        let back_in = back.len() - back_out;

        // pure outgroup in front of the node and pure ingroup at its back,
        // or the other way around
        if (front_in == 0 && front_out > 0 && back_in > 0 && back_out == 0)
            || (front_in > 0 && front_out == 0 && back_in == 0 && back_out > 0)
        {
            new_root = tree.get(&node)?.parent;
            break;
        }
    }

    match new_root {
        Some(target) => {
            tree.reroot(&target)?;
            Ok(Some(tree))
        }
        None => Ok(None),
    }
}

/// Prune a rerooted tree down to an ingroup clade with non-repeating taxon
/// names. The returned tree still contains the outgroup tips.
///
/// Duplications are resolved greedily: whenever two sibling clades share a
/// taxon, the one with the smaller unique-taxon set is discarded (on a tie,
/// the first of the pair). The scan restarts from the root after every
/// removal and stops once a full pass finds no sharing siblings.
pub fn prune_paralogs_from_rerooted_homotree(
    mut tree: Tree,
    outgroups: &HashSet<String>,
) -> Result<Tree, MoError> {
    let root = tree.get_root()?;
    if !taxa::has_duplicate_taxa(&tree, &root)? {
        return Ok(tree); // already single-copy
    }

    // Check for duplications at the trifurcating root first: exactly one
    // pair of root clades must be outgroup-free (the ingroup pair), the
    // remaining clade carries all outgroup tips.
    let children = tree.get(&root)?.children.clone();
    let &[node0, node1, node2] = children.as_slice() else {
        return Err(MoError::NotTrifurcating(children.len()));
    };

    let out0 = taxa::front_outgroup_names(&tree, &node0, outgroups)?.len();
    let out1 = taxa::front_outgroup_names(&tree, &node1, outgroups)?.len();
    let out2 = taxa::front_outgroup_names(&tree, &node2, outgroups)?.len();
    debug!("outgroup taxon counts in root clades: {out0}, {out1}, {out2}");

    let (first, second) = if out0 == 0 && out1 == 0 {
        (node0, node1)
    } else if out1 == 0 && out2 == 0 {
        (node1, node2)
    } else if out0 == 0 && out2 == 0 {
        (node0, node2)
    } else {
        return Err(MoError::MultipleOutgroupClades);
    };

    let names_first: HashSet<String> = taxa::front_names(&tree, &first)?.into_iter().collect();
    let names_second: HashSet<String> = taxa::front_names(&tree, &second)?.into_iter().collect();

    if !names_first.is_disjoint(&names_second) {
        // discard the root clade with fewer unique taxa, ties discard the
        // first of the pair
        let cut = if names_first.len() > names_second.len() {
            second
        } else {
            first
        };
        debug!(
            "cutting root clade with {} unique taxa",
            taxa::count_taxa(&tree, &cut)?
        );
        tree.prune(&cut)?;
    }

    // Keep pruning the smaller of any two sibling clades that share taxa.
    loop {
        let root = tree.get_root()?;
        let mut changed = false;

        for node in tree.preorder(&root)? {
            if node == root || tree.get(&node)?.is_tip() {
                continue;
            }

            let children = tree.get(&node)?.children.clone();
            if children.len() < 2 {
                continue;
            }
            let (child0, child1) = (children[0], children[1]);

            let names0: HashSet<String> =
                taxa::front_names(&tree, &child0)?.into_iter().collect();
            let names1: HashSet<String> =
                taxa::front_names(&tree, &child1)?.into_iter().collect();
            if names0.is_disjoint(&names1) {
                continue;
            }

            let cut = if names0.len() > names1.len() {
                child1
            } else {
                child0
            };
            debug!("pruning duplicate sibling clade below node {node}");
            tree.prune(&cut)?;
            if tree.get(&node)?.nchildren() == 1 {
                // structural repair only, no re-rooting at this stage
                tree.remove_kink(&node)?;
            }
            changed = true;
            break;
        }

        if !changed {
            break;
        }
    }

    Ok(tree)
}

/// Run the full MO decision ladder on one tree and return its outcome.
///
/// The mutually exclusive pre-checks short-circuit in order: unrecognised
/// taxa, too few taxa, no duplication (1-to-1 ortholog), no outgroup tip,
/// repeated outgroup taxon. Only then is the tree rerooted (fixing a
/// strictly bifurcating root first) and pruned.
///
/// The final minimum-taxa classification deliberately counts the taxa of
/// the rerooted tree before any pruning.
pub fn resolve_tree(
    tree: Tree,
    groups: &TaxonGroups,
    min_taxa: usize,
) -> Result<MoOutcome, MoError> {
    let root = tree.get_root()?;
    let names = taxa::front_names(&tree, &root)?;
    let num_tips = names.len();
    let num_taxa = names.iter().unique().count();

    let unrecognised: Vec<String> = names
        .iter()
        .filter(|name| !groups.recognises(name.as_str()))
        .unique()
        .cloned()
        .collect();
    if !unrecognised.is_empty() {
        warn!(
            "taxa not found in ingroups or outgroups: {}",
            unrecognised.join(", ")
        );
        return Ok(MoOutcome::UnrecognisedTaxa(unrecognised));
    }

    if num_taxa < min_taxa {
        return Ok(MoOutcome::BelowMinimumTaxa { num_taxa });
    }

    if num_tips == num_taxa {
        // no taxon duplication, nothing to resolve
        return Ok(MoOutcome::OneToOneOrtholog(tree));
    }

    let outgroup_names = taxa::front_outgroup_names(&tree, &root, &groups.outgroups)?;
    if outgroup_names.is_empty() {
        return Ok(MoOutcome::NoOutgroup);
    }
    if outgroup_names.iter().unique().count() < outgroup_names.len() {
        return Ok(MoOutcome::DuplicateOutgroupTaxa);
    }

    // a strictly bifurcating root cannot be rerooted as-is
    let mut tree = tree;
    if tree.get(&root)?.nchildren() == 2 {
        tree.remove_kink(&root)?;
    }

    let Some(rerooted) = reroot_with_monophyletic_outgroups(tree, &groups.outgroups)? else {
        return Ok(MoOutcome::NonMonophyleticOutgroup);
    };

    let rerooted_newick = rerooted.to_newick()?;
    let new_root = rerooted.get_root()?;
    // the minimum-taxa filter counts the rerooted tree, not the pruned one
    let rerooted_taxa = taxa::count_taxa(&rerooted, &new_root)?;

    let ortho = prune_paralogs_from_rerooted_homotree(rerooted, &groups.outgroups)?;

    if rerooted_taxa >= min_taxa {
        Ok(MoOutcome::PrunedAboveMinimum {
            rerooted: rerooted_newick,
            ortho,
        })
    } else {
        Ok(MoOutcome::PrunedBelowMinimum {
            rerooted: rerooted_newick,
            ortho,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outgroup_set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn sample_groups() -> TaxonGroups {
        TaxonGroups::from_reader(
            "IN\tA\nIN\tB\nIN\tC\nOUT\tOUT1\nOUT\tOUT2\nOUT\tO1\nOUT\tO2\n".as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn single_outgroup_reroots_at_tip_parent() {
        let tree = Tree::from_newick("((A.1:1,A.2:1)a:1,(B:1,OUT1:1)x:1,C:1)r;").unwrap();
        let mut before: Vec<_> = tree.get_leaf_names().into_iter().flatten().collect();
        before.sort();

        let rerooted = reroot_with_monophyletic_outgroups(tree, &outgroup_set(&["OUT1"]))
            .unwrap()
            .unwrap();

        // the outgroup tip hangs directly below the new root
        let root = rerooted.get_root().unwrap();
        let out_tip = rerooted.get_by_name("OUT1").unwrap();
        assert_eq!(out_tip.parent, Some(root));

        // no tips were lost
        let mut after: Vec<_> = rerooted.get_leaf_names().into_iter().flatten().collect();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn monophyletic_outgroup_is_found_and_rerooted() {
        let tree =
            Tree::from_newick("(((O1:1,O2:1)o:1,A.1:1)x:1,B:1,(A.2:1,C:1)y:1)r;").unwrap();

        let rerooted = reroot_with_monophyletic_outgroups(tree, &outgroup_set(&["O1", "O2"]))
            .unwrap()
            .unwrap();

        let root = rerooted.get_root().unwrap();
        assert_eq!(rerooted.get(&root).unwrap().nchildren(), 3);

        // one root clade holds exactly the outgroup tips
        let o = rerooted.get_by_name("o").unwrap().id;
        let mut front = taxa::front_names(&rerooted, &o).unwrap();
        front.sort();
        assert_eq!(front, vec!["O1", "O2"]);
    }

    #[test]
    fn scattered_outgroups_are_non_monophyletic() {
        let tree = Tree::from_newick("((A.1:1,O1.a:1)x:1,(A.2:1,O2.a:1)y:1,B:1)r;").unwrap();

        let rerooted =
            reroot_with_monophyletic_outgroups(tree, &outgroup_set(&["O1", "O2"])).unwrap();

        assert!(rerooted.is_none());
    }

    #[test]
    fn pruning_reduces_to_single_copy() {
        let tree = Tree::from_newick(
            "((O1:1,O2:1)o:1,(A.1:1,(B.1:1,A.2:1)ba:1)p:1,(B.2:1,C:1)q:1)r;",
        )
        .unwrap();
        let outgroups = outgroup_set(&["O1", "O2"]);

        let ortho = prune_paralogs_from_rerooted_homotree(tree, &outgroups).unwrap();

        let root = ortho.get_root().unwrap();
        let names = taxa::front_names(&ortho, &root).unwrap();
        assert_eq!(names.iter().unique().count(), names.len());

        // the root-level tie discarded the first clade of the ingroup pair
        assert!(ortho.get_by_name("B.1").is_none());
        assert!(ortho.get_by_name("B.2").is_some());
    }

    #[test]
    fn multiple_outgroup_clades_is_fatal() {
        let tree = Tree::from_newick("((O1:1,A.1:1)x:1,(O2:1,A.2:1)y:1,B:1)r;").unwrap();

        let err = prune_paralogs_from_rerooted_homotree(tree, &outgroup_set(&["O1", "O2"]))
            .unwrap_err();

        assert!(matches!(err, MoError::MultipleOutgroupClades));
    }

    #[test]
    fn non_trifurcating_root_is_fatal() {
        let tree = Tree::from_newick("((A.1:1,A.2:1):1,B:1);").unwrap();

        let err = prune_paralogs_from_rerooted_homotree(tree, &outgroup_set(&["O1"]))
            .unwrap_err();

        assert!(matches!(err, MoError::NotTrifurcating(2)));
    }

    #[test]
    fn resolve_flags_unrecognised_taxa() {
        let tree = Tree::from_newick("((A.1:1,A.2:1):1,(B:1,Z:1):1);").unwrap();

        let outcome = resolve_tree(tree, &sample_groups(), 3).unwrap();

        match outcome {
            MoOutcome::UnrecognisedTaxa(names) => assert_eq!(names, vec!["Z"]),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn resolve_flags_small_trees() {
        let tree = Tree::from_newick("((A.1:1,A.2:1):1,B:1);").unwrap();

        let outcome = resolve_tree(tree, &sample_groups(), 4).unwrap();

        assert!(matches!(
            outcome,
            MoOutcome::BelowMinimumTaxa { num_taxa: 2 }
        ));
    }

    #[test]
    fn resolve_passes_one_to_one_trees_through() {
        let tree = Tree::from_newick("((A:1,B:1):1,(C:1,OUT1:1):1);").unwrap();

        let outcome = resolve_tree(tree, &sample_groups(), 3).unwrap();

        match outcome {
            MoOutcome::OneToOneOrtholog(tree) => assert_eq!(tree.n_leaves(), 4),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn resolve_skips_trees_without_outgroups() {
        let tree = Tree::from_newick("((A.1:1,A.2:1):1,(B:1,C:1):1);").unwrap();

        let outcome = resolve_tree(tree, &sample_groups(), 3).unwrap();

        assert!(matches!(outcome, MoOutcome::NoOutgroup));
    }

    #[test]
    fn resolve_skips_duplicated_outgroups() {
        let tree = Tree::from_newick("((A.1:1,OUT1.a:1):1,(OUT1.b:1,B:1):1);").unwrap();

        let outcome = resolve_tree(tree, &sample_groups(), 3).unwrap();

        assert!(matches!(outcome, MoOutcome::DuplicateOutgroupTaxa));
    }

    #[test]
    fn resolve_flags_non_monophyletic_outgroups() {
        let tree = Tree::from_newick("((A.1:1,O1.a:1)x:1,(A.2:1,O2.a:1)y:1,B:1)r;").unwrap();

        let outcome = resolve_tree(tree, &sample_groups(), 3).unwrap();

        assert!(matches!(outcome, MoOutcome::NonMonophyleticOutgroup));
    }

    #[test]
    fn end_to_end_monophyletic_outgroup_scenario() {
        let tree = Tree::from_newick(
            "((A.1:0.1,A.2:0.1):0.05,(B:0.2,(OUT1:0.1,OUT2:0.1):0.05):0.3);",
        )
        .unwrap();
        let groups = TaxonGroups::from_reader(
            "IN\tA\nIN\tB\nOUT\tOUT1\nOUT\tOUT2\n".as_bytes(),
        )
        .unwrap();

        let outcome = resolve_tree(tree, &groups, 3).unwrap();

        let MoOutcome::PrunedAboveMinimum { rerooted, ortho } = outcome else {
            panic!("expected pruned-above-minimum");
        };

        // the rerooted tree was captured before pruning and still holds
        // every tip
        let reparsed = Tree::from_newick(&rerooted).unwrap();
        assert_eq!(reparsed.n_leaves(), 5);

        // one of the A copies was discarded, deterministically the first
        assert!(ortho.get_by_name("A.1").is_none());
        assert!(ortho.get_by_name("A.2").is_some());

        let root = ortho.get_root().unwrap();
        let mut names = taxa::front_names(&ortho, &root).unwrap();
        names.sort();
        assert_eq!(names, vec!["A", "B", "OUT1", "OUT2"]);
        assert_eq!(taxa::count_taxa(&ortho, &root).unwrap(), 4);
    }

    #[test]
    fn rerooted_tree_below_minimum_is_classified_as_such() {
        let tree = Tree::from_newick(
            "((A.1:0.1,A.2:0.1):0.05,(B:0.2,(OUT1:0.1,OUT2:0.1):0.05):0.3);",
        )
        .unwrap();
        let groups = TaxonGroups::from_reader(
            "IN\tA\nIN\tB\nOUT\tOUT1\nOUT\tOUT2\n".as_bytes(),
        )
        .unwrap();

        let outcome = resolve_tree(tree, &groups, 5).unwrap();

        // four unique taxa in the rerooted tree, below the minimum of five
        assert!(matches!(outcome, MoOutcome::PrunedBelowMinimum { .. }));
    }
}
