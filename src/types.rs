//! Core data types passed between pipeline stages.
//!
//! Every type here is produced by exactly one stage and consumed read-only by
//! later stages. The row-alignment invariants (`ContigSet::check`,
//! `CoverageMatrix::nrows` vs. contig count) are what make the cross-stage
//! contracts in the driver enforceable.

use anyhow::{ensure, Result};
use ndarray::Array2;

/// Ordered contig identifiers with parallel feature rows and lengths.
///
/// Produced by the composition stage. Identifiers and lengths outlive the
/// feature matrix: the driver drops `features` after the embedding stage but
/// keeps the names for labeling the cluster report.
#[derive(Debug)]
pub struct ContigSet {
    /// Contig identifiers, in input order.
    pub names: Vec<String>,
    /// Contig lengths in bases, parallel to `names`.
    pub lengths: Vec<u32>,
    /// Composition feature matrix, one row per contig.
    pub features: Array2<f32>,
}

impl ContigSet {
    /// Builds a contig set, rejecting misaligned parallel arrays.
    pub fn new(names: Vec<String>, lengths: Vec<u32>, features: Array2<f32>) -> Result<Self> {
        let set = Self {
            names,
            lengths,
            features,
        };
        set.check()?;
        Ok(set)
    }

    /// Verifies the parallel-array invariant. Called at construction and at
    /// every stage boundary.
    pub fn check(&self) -> Result<()> {
        ensure!(
            self.names.len() == self.lengths.len() && self.names.len() == self.features.nrows(),
            "contig set misaligned: {} names, {} lengths, {} feature rows",
            self.names.len(),
            self.lengths.len(),
            self.features.nrows()
        );
        Ok(())
    }

    /// Number of contigs.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Total number of bases across all contigs.
    pub fn total_bases(&self) -> u64 {
        self.lengths.iter().map(|&l| u64::from(l)).sum()
    }
}

/// Per-contig, per-sample sequencing depth. Rows must align with the
/// `ContigSet` that the same run extracted; the driver enforces this.
#[derive(Debug)]
pub struct CoverageMatrix(pub Array2<f32>);

impl CoverageMatrix {
    /// Number of contig rows.
    pub fn nrows(&self) -> usize {
        self.0.nrows()
    }

    /// Number of sample columns.
    pub fn nsamples(&self) -> usize {
        self.0.ncols()
    }
}

/// Low-dimensional latent representation, row-aligned with the contig set.
#[derive(Debug)]
pub struct Embedding(pub Array2<f32>);

impl Embedding {
    /// Number of contig rows.
    pub fn nrows(&self) -> usize {
        self.0.nrows()
    }

    /// Latent dimensionality.
    pub fn ndims(&self) -> usize {
        self.0.ncols()
    }
}

/// One bin: a named cluster of contig identifiers.
#[derive(Debug, Clone)]
pub struct Bin {
    /// Bin identifier, unique within a run.
    pub id: String,
    /// Member contig identifiers, in assignment order.
    pub members: Vec<String>,
}

/// The terminal pipeline artifact: bins partitioning a subset of the input
/// contigs. No contig appears in more than one bin.
pub type ClusterAssignment = Vec<Bin>;
