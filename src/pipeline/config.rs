//! Run configuration and parameter validation.
//!
//! `RunOptions` holds the raw, CLI-shaped user input. `RunOptions::validate`
//! checks every rule up front (performing no I/O beyond existence checks) and
//! returns a frozen `RunConfig` that is never mutated for the rest of the run.
//! Validation happens before the output directory is created, so a failed
//! validation leaves nothing behind on disk.

use std::path::PathBuf;

use crate::error::PipelineError;

/// Hard floor on the minimum contig length. Composition statistics on shorter
/// sequences are too noisy to embed.
pub const MIN_CONTIG_LENGTH_FLOOR: u32 = 100;

/// Default minimum contig length.
pub const DEFAULT_MIN_CONTIG_LENGTH: u32 = 100;

/// Default minimum alignment score.
pub const DEFAULT_MIN_ALIGN_SCORE: u32 = 50;

/// Default hidden layer widths for the embedding model.
pub const DEFAULT_HIDDEN_WIDTHS: [usize; 3] = [325, 325, 325];

/// Default latent dimensionality.
pub const DEFAULT_LATENT_DIMS: usize = 40;

/// Default training epochs.
pub const DEFAULT_EPOCHS: usize = 400;

/// Default training batch size.
pub const DEFAULT_BATCH_SIZE: usize = 128;

/// Default model capacity.
pub const DEFAULT_CAPACITY: f64 = 1000.0;

/// Default composition/abundance loss weighting ratio.
pub const DEFAULT_WEIGHT_RATIO: f64 = 0.2;

/// Default worker count for alignment parsing: min(8, available cpus).
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(8)
}

/// Capability query for accelerated execution.
///
/// Injected into validation rather than queried from a global hardware
/// singleton so tests can simulate presence and absence deterministically.
pub trait AcceleratorProbe {
    /// Whether an accelerator is actually usable for this run.
    fn is_available(&self) -> bool;
}

/// Default probe: the baseline embedding trainer is CPU-only, so no
/// accelerator is ever available.
#[derive(Debug, Default)]
pub struct NoAccelerator;

impl AcceleratorProbe for NoAccelerator {
    fn is_available(&self) -> bool {
        false
    }
}

/// Raw, unvalidated run parameters as supplied by the user.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Output directory to create. Must not already exist.
    pub outdir: PathBuf,
    /// Path to the contig sequence file.
    pub contigs: PathBuf,
    /// Paths to alignment files, one per sample.
    pub alignments: Vec<PathBuf>,
    /// Ignore contigs shorter than this.
    pub min_contig_length: u32,
    /// Ignore alignments scoring below this.
    pub min_align_score: u32,
    /// Worker count for alignment parsing.
    pub workers: usize,
    /// Hidden layer widths for the embedding model.
    pub hidden_widths: Vec<usize>,
    /// Latent dimensionality.
    pub latent_dims: usize,
    /// Training epochs.
    pub epochs: usize,
    /// Training batch size.
    pub batch_size: usize,
    /// Model capacity.
    pub capacity: f64,
    /// Composition/abundance loss weighting, strictly between 0 and 1.
    pub weight_ratio: f64,
    /// Request accelerated execution.
    pub cuda: bool,
    /// Minimum cluster size to report.
    pub min_cluster_size: usize,
    /// Maximum number of clusters to report; `None` = unbounded.
    pub max_clusters: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            outdir: PathBuf::new(),
            contigs: PathBuf::new(),
            alignments: Vec::new(),
            min_contig_length: DEFAULT_MIN_CONTIG_LENGTH,
            min_align_score: DEFAULT_MIN_ALIGN_SCORE,
            workers: default_workers(),
            hidden_widths: DEFAULT_HIDDEN_WIDTHS.to_vec(),
            latent_dims: DEFAULT_LATENT_DIMS,
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            capacity: DEFAULT_CAPACITY,
            weight_ratio: DEFAULT_WEIGHT_RATIO,
            cuda: false,
            min_cluster_size: 1,
            max_clusters: None,
        }
    }
}

impl RunOptions {
    /// Creates options with default values and the given paths.
    pub fn new(
        outdir: impl Into<PathBuf>,
        contigs: impl Into<PathBuf>,
        alignments: Vec<PathBuf>,
    ) -> Self {
        Self {
            outdir: outdir.into(),
            contigs: contigs.into(),
            alignments,
            ..Self::default()
        }
    }

    /// Sets the minimum contig length.
    pub fn with_min_contig_length(mut self, len: u32) -> Self {
        self.min_contig_length = len;
        self
    }

    /// Sets the minimum alignment score.
    pub fn with_min_align_score(mut self, score: u32) -> Self {
        self.min_align_score = score;
        self
    }

    /// Sets the alignment-parsing worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the hidden layer widths.
    pub fn with_hidden_widths(mut self, widths: Vec<usize>) -> Self {
        self.hidden_widths = widths;
        self
    }

    /// Sets the latent dimensionality.
    pub fn with_latent_dims(mut self, dims: usize) -> Self {
        self.latent_dims = dims;
        self
    }

    /// Sets the training epoch count.
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Sets the training batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the model capacity.
    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the composition/abundance weighting ratio.
    pub fn with_weight_ratio(mut self, ratio: f64) -> Self {
        self.weight_ratio = ratio;
        self
    }

    /// Requests accelerated execution.
    pub fn with_cuda(mut self, cuda: bool) -> Self {
        self.cuda = cuda;
        self
    }

    /// Sets the minimum reported cluster size.
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    /// Sets the maximum reported cluster count.
    pub fn with_max_clusters(mut self, max: Option<usize>) -> Self {
        self.max_clusters = max;
        self
    }

    /// Validates every parameter and freezes the configuration.
    ///
    /// Path rules: the output directory must not exist and its parent must;
    /// the contig file and every alignment file must exist. Numeric rules
    /// mirror the floors documented on the CLI. If `cuda` was requested the
    /// injected probe must report an available accelerator; there is no
    /// silent CPU fallback.
    ///
    /// # Errors
    ///
    /// Returns a `PipelineError` naming the offending field or path. No
    /// directory or file is created on any failure path.
    pub fn validate(self, probe: &dyn AcceleratorProbe) -> Result<RunConfig, PipelineError> {
        if self.outdir.exists() {
            return Err(PipelineError::PathConflict(self.outdir));
        }
        match self.outdir.parent() {
            // An empty parent means a relative path in the working directory.
            Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
                return Err(PipelineError::PathNotFound(parent.to_path_buf()));
            }
            _ => {}
        }

        if !self.contigs.is_file() {
            return Err(PipelineError::PathNotFound(self.contigs));
        }
        for path in &self.alignments {
            if !path.is_file() {
                return Err(PipelineError::PathNotFound(path.clone()));
            }
        }
        if self.alignments.is_empty() {
            return Err(PipelineError::invalid(
                "alignments",
                "at least one alignment file is required",
            ));
        }

        if self.min_contig_length < MIN_CONTIG_LENGTH_FLOOR {
            return Err(PipelineError::invalid(
                "minlength",
                format!(
                    "minimum contig length must be at least {}, not {}",
                    MIN_CONTIG_LENGTH_FLOOR, self.min_contig_length
                ),
            ));
        }
        if self.workers < 1 {
            return Err(PipelineError::invalid(
                "workers",
                "zero or negative worker count requested",
            ));
        }

        if self.hidden_widths.is_empty() || self.hidden_widths.iter().any(|&w| w < 1) {
            return Err(PipelineError::invalid(
                "nhiddens",
                "every hidden layer needs at least 1 unit",
            ));
        }
        if self.latent_dims < 1 {
            return Err(PipelineError::invalid(
                "nlatent",
                format!("minimum 1 latent dimension, not {}", self.latent_dims),
            ));
        }
        if self.epochs < 1 {
            return Err(PipelineError::invalid(
                "nepochs",
                format!("minimum 1 epoch, not {}", self.epochs),
            ));
        }
        if self.batch_size < 1 {
            return Err(PipelineError::invalid(
                "batchsize",
                format!("minimum batch size of 1, not {}", self.batch_size),
            ));
        }
        if self.capacity < 0.0 {
            return Err(PipelineError::invalid(
                "capacity",
                "capacity cannot be negative",
            ));
        }
        if self.weight_ratio <= 0.0 || self.weight_ratio >= 1.0 {
            return Err(PipelineError::invalid(
                "weightratio",
                format!(
                    "weighting ratio must be above 0 and below 1, not {}",
                    self.weight_ratio
                ),
            ));
        }

        if self.min_cluster_size < 1 {
            return Err(PipelineError::invalid(
                "minsize",
                "minimum cluster size must be at least 1",
            ));
        }

        if self.cuda && !probe.is_available() {
            return Err(PipelineError::AcceleratorUnavailable);
        }

        Ok(RunConfig { opts: self })
    }
}

/// A frozen, validated run configuration.
///
/// Created exactly once per run; fields are only readable after validation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    opts: RunOptions,
}

impl RunConfig {
    /// Output directory the run will create.
    pub fn outdir(&self) -> &PathBuf {
        &self.opts.outdir
    }

    /// Contig sequence file.
    pub fn contigs(&self) -> &PathBuf {
        &self.opts.contigs
    }

    /// Alignment files, one per sample.
    pub fn alignments(&self) -> &[PathBuf] {
        &self.opts.alignments
    }

    /// Minimum contig length.
    pub fn min_contig_length(&self) -> u32 {
        self.opts.min_contig_length
    }

    /// Minimum alignment score.
    pub fn min_align_score(&self) -> u32 {
        self.opts.min_align_score
    }

    /// Alignment-parsing worker count.
    pub fn workers(&self) -> usize {
        self.opts.workers
    }

    /// Embedding model hyperparameters.
    pub fn hyperparams(&self) -> ModelHyperparams {
        ModelHyperparams {
            hidden_widths: self.opts.hidden_widths.clone(),
            latent_dims: self.opts.latent_dims,
            epochs: self.opts.epochs,
            batch_size: self.opts.batch_size,
            capacity: self.opts.capacity,
            weight_ratio: self.opts.weight_ratio,
            cuda: self.opts.cuda,
        }
    }

    /// Minimum reported cluster size.
    pub fn min_cluster_size(&self) -> usize {
        self.opts.min_cluster_size
    }

    /// Maximum reported cluster count, `None` = unbounded.
    pub fn max_clusters(&self) -> Option<usize> {
        self.opts.max_clusters
    }
}

/// Hyperparameters handed to the embedding trainer.
#[derive(Debug, Clone)]
pub struct ModelHyperparams {
    /// Hidden layer widths.
    pub hidden_widths: Vec<usize>,
    /// Latent dimensionality.
    pub latent_dims: usize,
    /// Training epochs.
    pub epochs: usize,
    /// Batch size.
    pub batch_size: usize,
    /// Model capacity.
    pub capacity: f64,
    /// Composition/abundance loss weighting.
    pub weight_ratio: f64,
    /// Whether accelerated execution was requested (and verified available).
    pub cuda: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct StubProbe(bool);

    impl AcceleratorProbe for StubProbe {
        fn is_available(&self) -> bool {
            self.0
        }
    }

    /// Scratch layout with an existing contig file and one alignment file.
    fn valid_options(dir: &tempfile::TempDir) -> RunOptions {
        let contigs = dir.path().join("contigs.fna");
        let bam = dir.path().join("sample.sam");
        fs::write(&contigs, ">c1\nACGT\n").unwrap();
        fs::write(&bam, "@SQ\tSN:c1\tLN:150\n").unwrap();
        RunOptions::new(dir.path().join("out"), contigs, vec![bam])
    }

    #[test]
    fn test_valid_options_freeze() {
        let dir = tempfile::tempdir().unwrap();
        let config = valid_options(&dir).validate(&NoAccelerator).unwrap();
        assert_eq!(config.min_contig_length(), 100);
        assert_eq!(config.hyperparams().latent_dims, 40);
        assert_eq!(config.max_clusters(), None);
    }

    #[test]
    fn test_rejects_existing_outdir() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = valid_options(&dir);
        opts.outdir = dir.path().to_path_buf();
        assert!(matches!(
            opts.validate(&NoAccelerator),
            Err(PipelineError::PathConflict(_))
        ));
    }

    #[test]
    fn test_rejects_missing_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = valid_options(&dir);
        opts.outdir = dir.path().join("no/such/parent/out");
        assert!(matches!(
            opts.validate(&NoAccelerator),
            Err(PipelineError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_missing_contig_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = valid_options(&dir);
        opts.contigs = dir.path().join("missing.fna");
        assert!(matches!(
            opts.validate(&NoAccelerator),
            Err(PipelineError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_missing_alignment_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = valid_options(&dir);
        opts.alignments.push(dir.path().join("missing.sam"));
        assert!(matches!(
            opts.validate(&NoAccelerator),
            Err(PipelineError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_short_min_contig_length() {
        let dir = tempfile::tempdir().unwrap();
        let opts = valid_options(&dir).with_min_contig_length(99);
        let err = opts.validate(&NoAccelerator).unwrap_err();
        assert!(err.to_string().contains("minlength"));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let dir = tempfile::tempdir().unwrap();
        let opts = valid_options(&dir).with_workers(0);
        let err = opts.validate(&NoAccelerator).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_rejects_zero_width_hidden_layer() {
        let dir = tempfile::tempdir().unwrap();
        let opts = valid_options(&dir).with_hidden_widths(vec![325, 0, 325]);
        let err = opts.validate(&NoAccelerator).unwrap_err();
        assert!(err.to_string().contains("nhiddens"));
    }

    #[test]
    fn test_rejects_zero_latent_dims() {
        let dir = tempfile::tempdir().unwrap();
        let opts = valid_options(&dir).with_latent_dims(0);
        let err = opts.validate(&NoAccelerator).unwrap_err();
        assert!(err.to_string().contains("nlatent"));
    }

    #[test]
    fn test_rejects_zero_epochs() {
        let dir = tempfile::tempdir().unwrap();
        let opts = valid_options(&dir).with_epochs(0);
        let err = opts.validate(&NoAccelerator).unwrap_err();
        assert!(err.to_string().contains("nepochs"));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let opts = valid_options(&dir).with_batch_size(0);
        let err = opts.validate(&NoAccelerator).unwrap_err();
        assert!(err.to_string().contains("batchsize"));
    }

    #[test]
    fn test_rejects_negative_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let opts = valid_options(&dir).with_capacity(-1.0);
        let err = opts.validate(&NoAccelerator).unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn test_weight_ratio_bounds_are_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        for bad in [0.0, 1.0, -0.1, 1.5] {
            let opts = valid_options(&dir).with_weight_ratio(bad);
            let err = opts.validate(&NoAccelerator).unwrap_err();
            assert!(err.to_string().contains("weightratio"), "ratio {bad}");
        }
        let opts = valid_options(&dir).with_weight_ratio(0.5);
        assert!(opts.validate(&NoAccelerator).is_ok());
    }

    #[test]
    fn test_rejects_zero_min_cluster_size() {
        let dir = tempfile::tempdir().unwrap();
        let opts = valid_options(&dir).with_min_cluster_size(0);
        let err = opts.validate(&NoAccelerator).unwrap_err();
        assert!(err.to_string().contains("minsize"));
    }

    #[test]
    fn test_cuda_requires_available_accelerator() {
        let dir = tempfile::tempdir().unwrap();
        let opts = valid_options(&dir).with_cuda(true);
        assert!(matches!(
            opts.validate(&StubProbe(false)),
            Err(PipelineError::AcceleratorUnavailable)
        ));

        let opts = valid_options(&dir).with_cuda(true);
        assert!(opts.validate(&StubProbe(true)).is_ok());
    }

    #[test]
    fn test_validation_failure_creates_no_outdir() {
        let dir = tempfile::tempdir().unwrap();
        let opts = valid_options(&dir).with_min_contig_length(10);
        let outdir = opts.outdir.clone();
        assert!(!outdir.exists());
        assert!(opts.validate(&NoAccelerator).is_err());
        assert!(!outdir.exists());
    }
}
