//! metabin: metagenomic contig binning pipeline.
//!
//! Converts assembled contigs and their alignment files into a partition of
//! contigs into bins, via composition features, per-sample coverage, a joint
//! latent embedding, and clustering.

pub mod cli;
pub mod error;
pub mod pipeline;
pub mod stages;
pub mod types;

pub use error::PipelineError;
