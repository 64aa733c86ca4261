#![warn(missing_docs)]
//! The `orthoprune` binary batches the branch-cutting and MO pruning
//! engines over collections of gene tree files, writing output trees and
//! TSV decision reports.

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use indicatif::ProgressIterator;
use log::{info, warn};
use simplelog::{CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode};
use std::{
    collections::HashSet,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use orthoprune::{
    cut::{cut_long_internal_branches, filter_min_taxa},
    groups::TaxonGroups,
    mo::{resolve_tree, MoOutcome},
    report::{CutRecord, CutReport, MoReport},
    taxa,
    tree::Tree,
};

/// contains the struct representing the command line arguments
/// parsed by [`clap`] and used to execute this binary
pub mod cli;

fn initialise_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
    )])
    .unwrap();
}

/// First field of the tree file name, up to the first `.`
fn cluster_id(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("tree")
        .split('.')
        .next()
        .unwrap_or("tree")
}

fn tree_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}

fn read_tree(path: &Path) -> Tree {
    Tree::from_file(path)
        .unwrap_or_else(|e| panic!("could not parse tree file {}: {e}", path.display()))
}

fn run_cut(
    trees: Vec<PathBuf>,
    cutoff: f64,
    min_taxa: usize,
    output_dir: PathBuf,
    report_path: Option<PathBuf>,
) {
    assert!(!trees.is_empty(), "no input tree files given");
    fs::create_dir_all(&output_dir).unwrap();

    info!("cutting internal branches longer than {cutoff}");

    let mut report = CutReport::new();

    for path in trees.into_iter().progress() {
        let name = tree_name(&path);
        let tree = read_tree(&path);

        let root = tree.get_root().unwrap();
        let raw_size = tree.n_leaves();
        let num_taxa = taxa::count_taxa(&tree, &root).unwrap();

        if num_taxa < min_taxa {
            warn!(
                "tree {name} has {num_taxa} unique taxa, fewer than the minimum of \
                 {min_taxa}; skipping"
            );
            continue;
        }
        info!("tree {name}: {raw_size} tips, {num_taxa} unique taxa");

        let outcome = cut_long_internal_branches(tree, cutoff, min_taxa).unwrap();
        let (kept, discarded_min_taxa) = filter_min_taxa(outcome.subtrees, min_taxa).unwrap();

        if kept.is_empty() {
            warn!("tree {name}: no subtree with at least {min_taxa} taxa was produced");
        }

        let mut sizes = Vec::new();
        for (count, subtree) in kept.iter().enumerate() {
            let output = output_dir.join(format!("{}_{}.subtree", cluster_id(&path), count + 1));
            subtree.to_file(&output).unwrap();
            sizes.push(subtree.n_leaves().to_string());
        }
        info!(
            "tree {name}: {} subtree(s) written, sizes: {}",
            kept.len(),
            sizes.join(", ")
        );

        report.record(CutRecord {
            tree_name: name,
            retained: kept.len(),
            discarded_during_cutting: outcome.discarded,
            discarded_min_taxa,
        });
    }

    let report_path = report_path.unwrap_or_else(|| output_dir.join("cut_report.tsv"));
    let mut writer = BufWriter::new(File::create(&report_path).unwrap());
    report.write_tsv(&mut writer).unwrap();
    info!("cut report written to {}", report_path.display());
}

fn run_prune_mo(
    trees: Vec<PathBuf>,
    groups_path: PathBuf,
    min_taxa: usize,
    ignore_1to1: bool,
    output_dir: PathBuf,
    report_path: Option<PathBuf>,
) {
    assert!(!trees.is_empty(), "no input tree files given");

    // configuration errors abort before any tree is processed
    let groups = TaxonGroups::from_file(&groups_path)
        .unwrap_or_else(|e| panic!("invalid membership file {}: {e}", groups_path.display()));

    fs::create_dir_all(&output_dir).unwrap();

    let mut report = MoReport::new();

    for path in trees.into_iter().progress() {
        let name = tree_name(&path);
        let tree = read_tree(&path);

        info!("analysing tree {name}");

        let outcome = resolve_tree(tree, &groups, min_taxa)
            .unwrap_or_else(|e| panic!("pruning tree {} failed: {e}", path.display()));

        match &outcome {
            MoOutcome::OneToOneOrtholog(tree) => {
                if ignore_1to1 {
                    info!("tree {name} has no paralogs; skipping (--ignore-1to1-orthologs)");
                } else {
                    let output = output_dir.join(format!("{}.1to1ortho.tre", cluster_id(&path)));
                    tree.to_file(&output).unwrap();
                }
            }
            MoOutcome::PrunedAboveMinimum { rerooted, ortho } => {
                let reroot_file = output_dir.join(format!("{}.reroot", cluster_id(&path)));
                fs::write(&reroot_file, format!("{rerooted}\n")).unwrap();

                let output = output_dir.join(format!("{}.ortho.tre", cluster_id(&path)));
                ortho.to_file(&output).unwrap();
            }
            MoOutcome::PrunedBelowMinimum { rerooted, .. } => {
                let reroot_file = output_dir.join(format!("{}.reroot", cluster_id(&path)));
                fs::write(&reroot_file, format!("{rerooted}\n")).unwrap();

                warn!(
                    "tree {name}: rerooted tree has fewer than {min_taxa} taxa; \
                     no ortho tree written"
                );
            }
            other => info!("tree {name}: {}", other.category()),
        }

        report.record(&name, &outcome);
    }

    let report_path = report_path.unwrap_or_else(|| output_dir.join("mo_report.tsv"));
    let mut writer = BufWriter::new(File::create(&report_path).unwrap());
    report.write_tsv(&mut writer).unwrap();
    info!("MO report written to {}", report_path.display());
}

fn run_subset(tree: PathBuf, alignment: PathBuf, output: Option<PathBuf>) {
    let tree = read_tree(&tree);
    let tips: HashSet<String> = tree.get_leaf_names().into_iter().flatten().collect();

    let mut writer = BufWriter::new(match output {
        Some(path) => Box::new(File::create(&path).unwrap()) as Box<dyn Write>,
        None => Box::new(io::stdout()) as Box<dyn Write>,
    });

    let mut reader = needletail::parse_fastx_file(&alignment).unwrap();
    let (mut total, mut kept) = (0usize, 0usize);

    while let Some(record) = reader.next() {
        let record = record.unwrap();
        let id = String::from_utf8(record.id().to_vec()).unwrap();
        let label = id.split_whitespace().next().unwrap_or_default();
        total += 1;

        if tips.contains(label) {
            let seq = String::from_utf8(record.seq().to_vec()).unwrap();
            writer
                .write_all(format!(">{id}\n{seq}\n").as_bytes())
                .unwrap();
            kept += 1;
        }
    }

    info!(
        "{} tree tips, {total} sequences in alignment, {kept} sequences retained",
        tips.len()
    );
}

fn main() {
    let args = cli::Args::parse();
    initialise_logging(args.verbose);

    match args.command {
        cli::Commands::Cut {
            trees,
            cutoff,
            min_taxa,
            output_dir,
            report,
        } => run_cut(trees, cutoff, min_taxa, output_dir, report),
        cli::Commands::PruneMo {
            trees,
            groups,
            min_taxa,
            ignore_1to1_orthologs,
            output_dir,
            report,
        } => run_prune_mo(
            trees,
            groups,
            min_taxa,
            ignore_1to1_orthologs,
            output_dir,
            report,
        ),
        cli::Commands::Subset {
            tree,
            alignment,
            output,
        } => run_subset(tree, alignment, output),
        cli::Commands::View { tree, debug } => {
            let tree = read_tree(&tree);
            info!("{} nodes, {} tips", tree.size(), tree.n_leaves());
            if debug {
                tree.print_debug().unwrap()
            } else {
                tree.print().unwrap()
            }
        }
        cli::Commands::Completion { shell } => {
            let mut cmd = cli::Args::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }
}
