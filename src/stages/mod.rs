//! Pipeline stage collaborators.
//!
//! The orchestrator depends on the four stages only through the narrow traits
//! defined here; the algorithms behind them are deliberately replaceable.
//! `StageSet::default` wires up the baseline implementations shipped with the
//! crate: tetranucleotide composition, SAM depth estimation, a linear
//! autoencoder, and density-seeded clustering.

pub mod clustering;
pub mod composition;
pub mod coverage;
pub mod encoder;

use std::path::{Path, PathBuf};

use anyhow::Result;
use ndarray::Array2;

use crate::pipeline::config::ModelHyperparams;
use crate::types::{ClusterAssignment, ContigSet, CoverageMatrix, Embedding};

pub use clustering::DensityClusterEngine;
pub use composition::TetranucleotideExtractor;
pub use coverage::AlignmentDepthEstimator;
pub use encoder::LinearAutoencoderTrainer;

/// Extracts a fixed-length composition feature vector per contig.
pub trait FeatureExtractor {
    /// Reads contigs from `path`, skipping those shorter than `min_length`.
    fn extract(&self, path: &Path, min_length: u32) -> Result<ContigSet>;
}

/// Estimates per-contig, per-sample coverage from alignment files.
pub trait CoverageEstimator {
    /// Produces one matrix column per alignment file. Any parallelism is
    /// internal and bounded by `workers`.
    fn estimate(
        &self,
        paths: &[PathBuf],
        min_score: u32,
        min_length: u32,
        workers: usize,
    ) -> Result<CoverageMatrix>;
}

/// A trained embedding model plus the latent matrix it produced.
#[derive(Debug)]
pub struct TrainedModel {
    /// Serialized model checkpoint, persisted as-is by the driver.
    pub checkpoint: Vec<u8>,
    /// Latent embedding, row-aligned with the contig set.
    pub embedding: Embedding,
}

/// Trains the joint composition/abundance embedding model.
pub trait EmbeddingTrainer {
    /// Trains on the coverage and feature matrices and encodes every contig.
    fn train(
        &self,
        coverage: &CoverageMatrix,
        features: &Array2<f32>,
        hyperparams: &ModelHyperparams,
    ) -> Result<TrainedModel>;
}

/// Clusters the latent embedding into bins.
pub trait ClusterEngine {
    /// Returns raw bins labeled with contig identifiers. Size and count
    /// limits are applied by the driver afterwards, not here.
    fn cluster(&self, embedding: &Embedding, names: &[String]) -> Result<ClusterAssignment>;
}

/// The four collaborators a pipeline run is built from.
pub struct StageSet {
    /// Composition feature extraction.
    pub features: Box<dyn FeatureExtractor>,
    /// Coverage estimation.
    pub coverage: Box<dyn CoverageEstimator>,
    /// Embedding training.
    pub embedding: Box<dyn EmbeddingTrainer>,
    /// Clustering.
    pub clustering: Box<dyn ClusterEngine>,
}

impl Default for StageSet {
    fn default() -> Self {
        Self {
            features: Box::new(TetranucleotideExtractor),
            coverage: Box::new(AlignmentDepthEstimator),
            embedding: Box::new(LinearAutoencoderTrainer::default()),
            clustering: Box::new(DensityClusterEngine),
        }
    }
}
