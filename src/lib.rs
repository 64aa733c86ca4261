//! `orthoprune` decomposes multiply-labeled gene-family trees into
//! single-copy (ortholog) subtrees for downstream species-tree inference.
//!
//! Two engines operate on the mutable rooted [`tree::Tree`] structure:
//!  - [`cut::cut_long_internal_branches`] splits a tree at over-long
//!    internal branches (deep paralogs), discarding fragments with too few
//!    taxa.
//!  - [`mo::resolve_tree`] roots a tree on a monophyletic outgroup and
//!    greedily removes duplicate-taxon clades until the ingroup is
//!    single-copy.
//!
//! Trees are read and written in newick notation; ingroup/outgroup
//! membership comes from a tab-separated `IN`/`OUT` list (see [`groups`]).
//! Every skip or discard decision carries a reason and is collected into
//! the TSV reports of [`report`].

#![warn(missing_docs)]

pub mod cut;
pub mod groups;
pub mod mo;
pub mod report;
pub mod taxa;
pub mod tree;
