//! Pipeline driver: fixed stage order and cross-stage contracts.
//!
//! The driver owns the one thing no stage can see: the whole run. It invokes
//! feature extraction, coverage estimation, embedding, and clustering in
//! strict order, persists each stage's output before the next stage starts,
//! enforces the contig-count contract between the feature and coverage
//! stages, and decides which matrices stay in memory versus get released.
//! Execution is fully sequential; any parallelism lives inside the coverage
//! collaborator.

use std::collections::HashSet;

use ndarray::Array2;

use crate::error::PipelineError;
use crate::stages::StageSet;
use crate::types::{Bin, ClusterAssignment, ContigSet};

use super::artifacts::{artifact_names, ArtifactStore};
use super::config::RunConfig;
use super::runner::{RunLog, StageRunner};

/// Fixed stage names, in execution order. These appear verbatim in the run
/// log, so they are part of the output contract.
pub const STAGE_FEATURES: &str = "features";
pub const STAGE_COVERAGE: &str = "coverage";
pub const STAGE_EMBEDDING: &str = "embedding";
pub const STAGE_CLUSTERING: &str = "clustering";

/// Coordinates the four pipeline stages over a validated configuration.
pub struct PipelineDriver {
    stages: StageSet,
}

impl Default for PipelineDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineDriver {
    /// Driver over the baseline stage implementations.
    pub fn new() -> Self {
        Self {
            stages: StageSet::default(),
        }
    }

    /// Driver over caller-supplied collaborators.
    pub fn with_stages(stages: StageSet) -> Self {
        Self { stages }
    }

    /// Runs the full pipeline and returns the final cluster assignment.
    ///
    /// Creates the output directory (validation already guaranteed it does
    /// not exist), then runs each stage wrapped by the stage runner. No
    /// stage begins until the previous stage's artifact is durably
    /// committed, which makes every handoff point a clean restart point.
    pub fn execute(&self, config: &RunConfig) -> Result<ClusterAssignment, PipelineError> {
        let store = ArtifactStore::create(config.outdir())?;
        let log = RunLog::open(&store.path_for(artifact_names::RUN_LOG))?;
        let mut runner = StageRunner::new(log);
        runner.log_line(&format!(
            "metabin {} binning {} with {} alignment file(s)",
            env!("CARGO_PKG_VERSION"),
            config.contigs().display(),
            config.alignments().len()
        ))?;

        // Stage 1: composition features.
        let contigs = runner.run(STAGE_FEATURES, || {
            let set = self
                .stages
                .features
                .extract(config.contigs(), config.min_contig_length())?;
            set.check()?;
            Ok(set)
        })?;
        store.put(
            artifact_names::FEATURES,
            matrix_tsv(&contigs.names, &contigs.features).as_bytes(),
        )?;
        runner.note_count("contigs", contigs.len() as u64);
        runner.note_count("bases", contigs.total_bases());

        // Stage 2: coverage. The row-count gate below is the most important
        // correctness check in the pipeline: a silent mismatch would
        // misalign every downstream feature row with the wrong contig.
        let coverage = runner.run(STAGE_COVERAGE, || {
            self.stages.coverage.estimate(
                config.alignments(),
                config.min_align_score(),
                config.min_contig_length(),
                config.workers(),
            )
        })?;
        if coverage.nrows() != contigs.len() {
            return Err(PipelineError::ContigCountMismatch {
                contigs: contigs.len(),
                coverage_rows: coverage.nrows(),
            });
        }
        store.put(
            artifact_names::COVERAGE,
            matrix_tsv(&contigs.names, &coverage.0).as_bytes(),
        )?;
        runner.note_count("samples", coverage.nsamples() as u64);

        // Stage 3: embedding. Names and lengths are retained for labeling;
        // the feature and coverage matrices are released afterwards to bound
        // peak memory during clustering.
        let ContigSet {
            names,
            lengths,
            features,
        } = contigs;
        let hyperparams = config.hyperparams();
        let trained = runner.run(STAGE_EMBEDDING, || {
            self.stages.embedding.train(&coverage, &features, &hyperparams)
        })?;
        store.put(artifact_names::MODEL, &trained.checkpoint)?;
        store.put(
            artifact_names::LATENT,
            matrix_tsv(&names, &trained.embedding.0).as_bytes(),
        )?;
        runner.note_count("latent_dims", trained.embedding.ndims() as u64);
        drop(features);
        drop(coverage);

        // Stage 4: clustering, then size/count post-filters.
        let raw_bins = runner.run(STAGE_CLUSTERING, || {
            self.stages.clustering.cluster(&trained.embedding, &names)
        })?;
        let assignment =
            apply_post_filters(raw_bins, config.max_clusters(), config.min_cluster_size());
        store.put(
            artifact_names::CLUSTERS,
            cluster_tsv(&assignment).as_bytes(),
        )?;
        let placed: usize = assignment.iter().map(|b| b.members.len()).sum();
        runner.note_count("bins", assignment.len() as u64);
        runner.note_count("contigs_placed", placed as u64);
        runner.note_count("bases_placed", placed_bases(&assignment, &names, &lengths));

        runner.finish()?;
        Ok(assignment)
    }
}

/// Drops bins below the minimum reported size, then truncates to the maximum
/// bin count. Post-filters only: the clustering collaborator's own behavior
/// is untouched.
fn apply_post_filters(
    bins: ClusterAssignment,
    max_clusters: Option<usize>,
    min_size: usize,
) -> ClusterAssignment {
    let mut kept: Vec<Bin> = bins
        .into_iter()
        .filter(|b| b.members.len() >= min_size)
        .collect();
    if let Some(max) = max_clusters {
        kept.truncate(max);
    }
    kept
}

/// Total bases across the contigs the assignment placed.
fn placed_bases(assignment: &ClusterAssignment, names: &[String], lengths: &[u32]) -> u64 {
    let placed: HashSet<&str> = assignment
        .iter()
        .flat_map(|b| b.members.iter().map(String::as_str))
        .collect();
    names
        .iter()
        .zip(lengths)
        .filter(|(name, _)| placed.contains(name.as_str()))
        .map(|(_, &len)| u64::from(len))
        .sum()
}

/// Renders a labeled matrix as TSV: identifier, then one value per column.
fn matrix_tsv(names: &[String], matrix: &Array2<f32>) -> String {
    let mut out = String::new();
    for (name, row) in names.iter().zip(matrix.rows()) {
        out.push_str(name);
        for v in row {
            out.push('\t');
            out.push_str(&format!("{v:.6}"));
        }
        out.push('\n');
    }
    out
}

/// Renders the cluster report: one `bin<TAB>contig` line per member.
fn cluster_tsv(assignment: &ClusterAssignment) -> String {
    let mut out = String::new();
    for bin in assignment {
        for member in &bin.members {
            out.push_str(&bin.id);
            out.push('\t');
            out.push_str(member);
            out.push('\n');
        }
    }
    out
}
