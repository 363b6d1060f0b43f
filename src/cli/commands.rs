//! CLI command definitions for metabin.
//!
//! Argument parsing is the only process-level concern here; everything else
//! is ordinary calls into the pipeline, so the orchestrator is testable
//! without process side effects.

use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use tracing::info;

use crate::pipeline::config::{
    default_workers, NoAccelerator, RunOptions, DEFAULT_BATCH_SIZE, DEFAULT_CAPACITY,
    DEFAULT_EPOCHS, DEFAULT_HIDDEN_WIDTHS, DEFAULT_LATENT_DIMS, DEFAULT_MIN_ALIGN_SCORE,
    DEFAULT_MIN_CONTIG_LENGTH, DEFAULT_WEIGHT_RATIO,
};
use crate::pipeline::PipelineDriver;

/// Metagenomic contig binning pipeline.
#[derive(Parser)]
#[command(name = "metabin")]
#[command(about = "Bin assembled contigs into putative genomes")]
#[command(version)]
#[command(
    long_about = "metabin runs a four-stage binning pipeline over assembled contigs and \
their alignment files: composition features, per-sample coverage, a joint latent \
embedding, and clustering.\n\nExample usage:\n  \
metabin run out/ contigs.fna sample1.sam sample2.sam -m 2000"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the full binning pipeline.
    Run(RunArgs),
}

/// Arguments for `metabin run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Output directory to create.
    pub outdir: PathBuf,

    /// Path to the contig sequence file (FASTA, optionally gzipped).
    pub contigs: PathBuf,

    /// Paths to alignment files (SAM), one per sample.
    #[arg(required = true)]
    pub alignments: Vec<PathBuf>,

    /// Ignore contigs shorter than this (floor 100).
    #[arg(short = 'm', long = "minlength", default_value_t = DEFAULT_MIN_CONTIG_LENGTH)]
    pub min_length: u32,

    /// Ignore alignments with a score below this.
    #[arg(short = 'a', long = "minascore", default_value_t = DEFAULT_MIN_ALIGN_SCORE)]
    pub min_align_score: u32,

    /// Worker count for alignment parsing [default: min(8, cpus)].
    #[arg(short = 'p', long = "subprocesses", default_value_t = default_workers())]
    pub workers: usize,

    /// Hidden layer widths.
    #[arg(short = 'n', long = "nhiddens", num_args = 1.., default_values_t = DEFAULT_HIDDEN_WIDTHS)]
    pub hidden_widths: Vec<usize>,

    /// Latent dimensionality.
    #[arg(short = 'l', long = "nlatent", default_value_t = DEFAULT_LATENT_DIMS)]
    pub latent_dims: usize,

    /// Training epochs.
    #[arg(short = 'e', long = "nepochs", default_value_t = DEFAULT_EPOCHS)]
    pub epochs: usize,

    /// Training batch size.
    #[arg(short = 'b', long = "batchsize", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Model capacity.
    #[arg(short = 's', long = "capacity", default_value_t = DEFAULT_CAPACITY)]
    pub capacity: f64,

    /// Composition versus abundance weighting, strictly between 0 and 1.
    #[arg(short = 'r', long = "weightratio", default_value_t = DEFAULT_WEIGHT_RATIO)]
    pub weight_ratio: f64,

    /// Request accelerated execution; fails fast if unavailable.
    #[arg(long)]
    pub cuda: bool,

    /// Minimum cluster size to report.
    #[arg(short = 'i', long = "minsize", default_value_t = 1)]
    pub min_cluster_size: usize,

    /// Stop reporting after this many clusters; -1 = unbounded.
    #[arg(short = 'c', long = "maxclusters", default_value_t = -1, allow_hyphen_values = true)]
    pub max_clusters: i64,
}

impl RunArgs {
    /// Maps parsed arguments onto raw run options.
    pub fn to_options(&self) -> RunOptions {
        RunOptions::new(&self.outdir, &self.contigs, self.alignments.clone())
            .with_min_contig_length(self.min_length)
            .with_min_align_score(self.min_align_score)
            .with_workers(self.workers)
            .with_hidden_widths(self.hidden_widths.clone())
            .with_latent_dims(self.latent_dims)
            .with_epochs(self.epochs)
            .with_batch_size(self.batch_size)
            .with_capacity(self.capacity)
            .with_weight_ratio(self.weight_ratio)
            .with_cuda(self.cuda)
            .with_min_cluster_size(self.min_cluster_size)
            .with_max_clusters(if self.max_clusters < 1 {
                None
            } else {
                Some(self.max_clusters as usize)
            })
    }
}

/// Parses the command line, printing help and exiting cleanly when invoked
/// with no arguments at all.
pub fn parse_cli() -> Cli {
    if std::env::args().len() == 1 {
        let _ = Cli::command().print_help();
        std::process::exit(0);
    }
    Cli::parse()
}

/// Executes the parsed command.
///
/// # Errors
///
/// Any validation failure or pipeline error propagates out; `main` prints it
/// and exits non-zero.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => {
            let config = args.to_options().validate(&NoAccelerator)?;
            let assignment = PipelineDriver::new().execute(&config)?;

            let placed: usize = assignment.iter().map(|b| b.members.len()).sum();
            info!(
                bins = assignment.len(),
                contigs = placed,
                report = %config.outdir().join("clusters.tsv").display(),
                "binning complete"
            );
            Ok(())
        }
    }
}
