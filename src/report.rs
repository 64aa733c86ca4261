//! Per-tree decision records and TSV report writing.
//!
//! Every input tree ends up in the audit trail: each cut or skip decision
//! is recorded with its tree identifier and a human-readable reason, and
//! the collected records are written as a TSV report at the end of a run.

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::mo::MoOutcome;

/// Cutting decisions for one input tree.
#[derive(Debug, Default)]
pub struct CutRecord {
    /// Identifier of the input tree (usually the file name)
    pub tree_name: String,
    /// Number of subtrees retained after cutting and filtering
    pub retained: usize,
    /// Subtrees discarded while cutting, newick to reason
    pub discarded_during_cutting: BTreeMap<String, String>,
    /// Subtrees discarded by the post-cut minimum-taxa filter
    pub discarded_min_taxa: BTreeMap<String, String>,
}

/// Collected cutting decisions for a whole run.
#[derive(Debug, Default)]
pub struct CutReport {
    records: Vec<CutRecord>,
}

impl CutReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the record of one input tree
    pub fn record(&mut self, record: CutRecord) {
        self.records.push(record);
    }

    /// Number of recorded input trees
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether any tree was recorded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the report as TSV: per-tree counts first, then one detail row
    /// per discarded subtree.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(
            writer,
            "Tree_name\tSubtrees retained after cutting\tSubtrees discarded during cutting\t\
             Subtrees discarded as below minimum taxa"
        )?;
        for record in &self.records {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                record.tree_name,
                record.retained,
                record.discarded_during_cutting.len(),
                record.discarded_min_taxa.len()
            )?;
        }

        writeln!(writer, "\t\t\t")?;

        writeln!(writer, "Tree_name\tDiscarded subtree\tReason")?;
        for record in &self.records {
            for (newick, reason) in record
                .discarded_during_cutting
                .iter()
                .chain(record.discarded_min_taxa.iter())
            {
                writeln!(writer, "{}\t{}\t{}", record.tree_name, newick, reason)?;
            }
        }

        Ok(())
    }
}

/// Collected MO decisions for a whole run, one category per input tree.
#[derive(Debug, Default)]
pub struct MoReport {
    unrecognised: BTreeMap<String, Vec<String>>,
    below_minimum: Vec<String>,
    one_to_one: Vec<String>,
    no_outgroup: Vec<String>,
    duplicate_outgroup: Vec<String>,
    non_monophyletic: Vec<String>,
    pruned_above_minimum: Vec<String>,
    pruned_below_minimum: Vec<String>,
}

impl MoReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one input tree
    pub fn record(&mut self, tree_name: &str, outcome: &MoOutcome) {
        let tree_name = tree_name.to_string();
        match outcome {
            MoOutcome::UnrecognisedTaxa(names) => {
                self.unrecognised.insert(tree_name, names.clone());
            }
            MoOutcome::BelowMinimumTaxa { .. } => self.below_minimum.push(tree_name),
            MoOutcome::OneToOneOrtholog(_) => self.one_to_one.push(tree_name),
            MoOutcome::NoOutgroup => self.no_outgroup.push(tree_name),
            MoOutcome::DuplicateOutgroupTaxa => self.duplicate_outgroup.push(tree_name),
            MoOutcome::NonMonophyleticOutgroup => self.non_monophyletic.push(tree_name),
            MoOutcome::PrunedAboveMinimum { .. } => self.pruned_above_minimum.push(tree_name),
            MoOutcome::PrunedBelowMinimum { .. } => self.pruned_below_minimum.push(tree_name),
        }
    }

    /// Number of trees that were rerooted and pruned
    pub fn n_pruned(&self) -> usize {
        self.pruned_above_minimum.len() + self.pruned_below_minimum.len()
    }

    fn join(names: &[String]) -> String {
        if names.is_empty() {
            "None".to_string()
        } else {
            names.join(", ")
        }
    }

    /// Write the report as TSV: one column per category with tree counts
    /// and tree name lists.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(
            writer,
            "\tInput trees with unrecognised taxa (skipped)\t\
             Input trees with fewer than minimum taxa (skipped)\t\
             Input trees with 1-to-1 orthologs\t\
             Input trees with no outgroup taxa\t\
             Input trees with duplicate taxa in the outgroup\t\
             Input trees with putative paralogs and monophyletic outgroup\t\
             Input trees with putative paralogs and non-monophyletic outgroup\t\
             MO pruned trees with greater than minimum taxa\t\
             MO pruned trees with fewer than minimum taxa"
        )?;

        writeln!(
            writer,
            "Number of trees\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.unrecognised.len(),
            self.below_minimum.len(),
            self.one_to_one.len(),
            self.no_outgroup.len(),
            self.duplicate_outgroup.len(),
            self.n_pruned(),
            self.non_monophyletic.len(),
            self.pruned_above_minimum.len(),
            self.pruned_below_minimum.len(),
        )?;

        let unrecognised = if self.unrecognised.is_empty() {
            "None".to_string()
        } else {
            self.unrecognised
                .iter()
                .map(|(tree, names)| format!("{}: {}", tree, names.join(", ")))
                .collect::<Vec<_>>()
                .join("; ")
        };

        let monophyletic: Vec<String> = self
            .pruned_above_minimum
            .iter()
            .chain(self.pruned_below_minimum.iter())
            .cloned()
            .collect();

        writeln!(
            writer,
            "Tree names\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            unrecognised,
            Self::join(&self.below_minimum),
            Self::join(&self.one_to_one),
            Self::join(&self.no_outgroup),
            Self::join(&self.duplicate_outgroup),
            Self::join(&monophyletic),
            Self::join(&self.non_monophyletic),
            Self::join(&self.pruned_above_minimum),
            Self::join(&self.pruned_below_minimum),
        )?;

        Ok(())
    }
}
