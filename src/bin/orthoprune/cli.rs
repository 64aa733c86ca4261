use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// A command line tool to decompose multiply-labeled gene-family trees
/// into single-copy ortholog trees
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Print debug-level logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    /// The command to execute
    pub command: Commands,
}

/// The available commands in the `orthoprune` tool
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cut internal branches longer than a cutoff and write the resulting
    /// subtrees
    Cut {
        /// Input newick tree file(s)
        trees: Vec<PathBuf>,

        /// Internal branches strictly longer than this value are cut
        #[arg(short, long)]
        cutoff: f64,

        /// Minimum number of unique taxa a subtree must keep
        #[arg(short, long, default_value_t = 4)]
        min_taxa: usize,

        /// Directory to write .subtree files to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// File to write the TSV cut report to (default: <output-dir>/cut_report.tsv)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Root trees on a monophyletic outgroup and prune paralogs (MO
    /// algorithm)
    PruneMo {
        /// Input newick tree file(s)
        trees: Vec<PathBuf>,

        /// Tab-separated membership file with IN<TAB>taxon and OUT<TAB>taxon lines
        #[arg(short, long)]
        groups: PathBuf,

        /// Minimum number of unique taxa a pruned tree must keep
        #[arg(short, long, default_value_t = 4)]
        min_taxa: usize,

        /// Do not write trees that are already 1-to-1 orthologs
        #[arg(long)]
        ignore_1to1_orthologs: bool,

        /// Directory to write pruned trees to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// File to write the TSV MO report to (default: <output-dir>/mo_report.tsv)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Subset a FASTA alignment to the sequences matching a tree's tip labels
    Subset {
        /// The tree whose tip labels select the sequences
        tree: PathBuf,

        /// The FASTA alignment to subset
        alignment: PathBuf,

        /// File to save the subset alignment to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display a tree in the terminal
    View {
        /// The tree to display
        tree: PathBuf,

        /// Show node ids and parent links
        #[arg(short, long)]
        debug: bool,
    },

    /// Generate shell completions
    Completion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
