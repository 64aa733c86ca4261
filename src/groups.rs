//! Ingroup/outgroup membership lists.
//!
//! The membership file is line-oriented and tab-separated: each line is
//! either `IN<TAB>taxon_id` or `OUT<TAB>taxon_id`. Lines under 3 characters
//! are skipped. Any other leading token, and any taxon claimed by both
//! lists, is a fatal configuration error caught before any tree is
//! processed.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use itertools::Itertools;
use log::{debug, info};
use thiserror::Error;

/// Errors that can occur when reading a membership file.
#[derive(Error, Debug)]
pub enum GroupsError {
    /// A line starts with something other than `IN` or `OUT`
    #[error("Line {lineno} does not start with IN or OUT: {line:?}")]
    UnknownPrefix {
        /// 1-based line number of the offending line
        lineno: usize,
        /// The offending line
        line: String,
    },
    /// A line has no taxon identifier after its `IN`/`OUT` token
    #[error("Line {lineno} is missing a taxon identifier: {line:?}")]
    MissingTaxon {
        /// 1-based line number of the offending line
        lineno: usize,
        /// The offending line
        line: String,
    },
    /// The same taxon is declared both as ingroup and outgroup
    #[error("Taxa declared as both ingroup and outgroup: {}", .0.join(", "))]
    OverlappingTaxa(Vec<String>),
    /// There was a [`std::io::Error`] when reading the file
    #[error("Problem reading membership file")]
    IoError(#[from] std::io::Error),
}

/// The ingroup and outgroup taxon sets, validated to be disjoint.
#[derive(Debug, Clone, Default)]
pub struct TaxonGroups {
    /// Taxa under study
    pub ingroups: HashSet<String>,
    /// Reference taxa used to root the trees
    pub outgroups: HashSet<String>,
}

impl TaxonGroups {
    /// Read a membership file from disk.
    pub fn from_file(path: &Path) -> Result<Self, GroupsError> {
        let reader = BufReader::new(File::open(path)?);
        let groups = Self::from_reader(reader)?;
        info!(
            "{} ingroup and {} outgroup taxa in {}",
            groups.ingroups.len(),
            groups.outgroups.len(),
            path.display()
        );
        Ok(groups)
    }

    /// Read a membership list from any buffered reader.
    /// ```
    /// use orthoprune::groups::TaxonGroups;
    ///
    /// let groups = TaxonGroups::from_reader("IN\tA\nIN\tB\nOUT\tOUT1\n".as_bytes()).unwrap();
    ///
    /// assert!(groups.is_ingroup("A"));
    /// assert!(groups.is_outgroup("OUT1"));
    /// assert!(!groups.recognises("Z"));
    /// ```
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, GroupsError> {
        let mut ingroups = HashSet::new();
        let mut outgroups = HashSet::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let lineno = lineno + 1;

            if line.len() < 3 {
                debug!("skipping line {lineno}: too short");
                continue;
            }

            let trimmed = line.trim();
            let mut fields = trimmed.split('\t');
            let prefix = fields.next().unwrap_or_default();
            let taxon = match fields.next() {
                Some(taxon) if !taxon.is_empty() => taxon.to_string(),
                _ => {
                    if prefix == "IN" || prefix == "OUT" {
                        return Err(GroupsError::MissingTaxon {
                            lineno,
                            line: line.clone(),
                        });
                    }
                    return Err(GroupsError::UnknownPrefix {
                        lineno,
                        line: line.clone(),
                    });
                }
            };

            match prefix {
                "IN" => {
                    ingroups.insert(taxon);
                }
                "OUT" => {
                    outgroups.insert(taxon);
                }
                _ => {
                    return Err(GroupsError::UnknownPrefix {
                        lineno,
                        line: line.clone(),
                    })
                }
            }
        }

        let overlap: Vec<String> = ingroups.intersection(&outgroups).cloned().sorted().collect();
        if !overlap.is_empty() {
            return Err(GroupsError::OverlappingTaxa(overlap));
        }

        Ok(Self {
            ingroups,
            outgroups,
        })
    }

    /// Whether the taxon is declared as ingroup
    pub fn is_ingroup(&self, name: &str) -> bool {
        self.ingroups.contains(name)
    }

    /// Whether the taxon is declared as outgroup
    pub fn is_outgroup(&self, name: &str) -> bool {
        self.outgroups.contains(name)
    }

    /// Whether the taxon is declared at all
    pub fn recognises(&self, name: &str) -> bool {
        self.is_ingroup(name) || self.is_outgroup(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_in_and_out_lines() {
        let groups =
            TaxonGroups::from_reader("IN\t376678\nIN\t376728\nOUT\t4691\n".as_bytes()).unwrap();

        assert_eq!(groups.ingroups.len(), 2);
        assert_eq!(groups.outgroups.len(), 1);
        assert!(groups.is_ingroup("376678"));
        assert!(groups.is_outgroup("4691"));
        assert!(!groups.recognises("9999"));
    }

    #[test]
    fn short_lines_are_skipped() {
        let groups = TaxonGroups::from_reader("IN\t376678\n\nXY\nOUT\t4691\n".as_bytes()).unwrap();

        assert_eq!(groups.ingroups.len(), 1);
        assert_eq!(groups.outgroups.len(), 1);
    }

    #[test]
    fn unknown_prefix_is_fatal() {
        let err = TaxonGroups::from_reader("INGROUP\t376678\n".as_bytes()).unwrap_err();
        assert!(matches!(err, GroupsError::UnknownPrefix { lineno: 1, .. }));
    }

    #[test]
    fn missing_taxon_is_fatal() {
        let err = TaxonGroups::from_reader("OUT\t\n".as_bytes()).unwrap_err();
        assert!(matches!(err, GroupsError::MissingTaxon { lineno: 1, .. }));
    }

    #[test]
    fn overlapping_taxa_are_fatal() {
        let err =
            TaxonGroups::from_reader("IN\t376678\nOUT\t376678\nOUT\t4691\n".as_bytes()).unwrap_err();

        match err {
            GroupsError::OverlappingTaxa(taxa) => assert_eq!(taxa, vec!["376678"]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
