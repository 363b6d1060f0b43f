//! Pipeline orchestration for contig binning.
//!
//! This module is the coordination core of the crate:
//!
//! - **Config**: raw option validation into a frozen run configuration
//! - **Artifacts**: durable, atomically committed per-stage outputs
//! - **Runner**: uniform stage timing, logging, and failure attribution
//! - **Driver**: the fixed stage order and the cross-stage contracts
//!
//! # Pipeline Flow
//!
//! 1. **Validation**: every parameter is checked before any work starts;
//!    a failed validation leaves nothing on disk
//! 2. **Features**: composition feature vectors are extracted per contig
//! 3. **Coverage**: per-sample depth is estimated from alignment files,
//!    and its row count is checked against the contig count
//! 4. **Embedding**: both matrices are jointly reduced to a latent space,
//!    then released from memory
//! 5. **Clustering**: the latent space is partitioned into bins and the
//!    tab-separated report is written
//!
//! Each stage's output is persisted before the next stage begins, so a run
//! directory always holds a consistent prefix of the pipeline's artifacts.

pub mod artifacts;
pub mod config;
pub mod driver;
pub mod runner;

pub use artifacts::{artifact_names, ArtifactHandle, ArtifactStore};
pub use config::{AcceleratorProbe, ModelHyperparams, NoAccelerator, RunConfig, RunOptions};
pub use driver::PipelineDriver;
pub use runner::{RunLog, RunReport, StageRunner};
