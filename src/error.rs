//! Error types for pipeline operations.
//!
//! All failures are fatal to the run: there is no retry and no partial-result
//! recovery. A misaligned or corrupted intermediate artifact is worse than an
//! aborted run, so every error identifies the offending parameter, path, or
//! quantity precisely.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur before or during a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A user-supplied parameter failed validation. Raised before any stage
    /// runs and before the output directory is created.
    #[error("Invalid parameter '{field}': {message}")]
    InvalidParameter { field: &'static str, message: String },

    /// An input path does not exist or is not a regular file/directory.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The output directory already exists. Two runs must never target the
    /// same directory.
    #[error("Output directory already exists: {0}")]
    PathConflict(PathBuf),

    /// The coverage matrix row count does not match the contig count from
    /// feature extraction. This means the alignment files do not originate
    /// from the same contig universe as the contig file.
    #[error(
        "Contig count mismatch: feature extraction found {contigs} contigs but the \
         coverage matrix has {coverage_rows} rows. Are you sure the alignment files \
         originate from the same contig file and have headers?"
    )]
    ContigCountMismatch { contigs: usize, coverage_rows: usize },

    /// Accelerated execution was requested but no accelerator is available.
    #[error("Accelerated execution requested but no accelerator is available")]
    AcceleratorUnavailable,

    /// A stage collaborator failed. The underlying error is propagated
    /// unchanged with the stage name attached for context.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// IO error while persisting artifacts or writing the run log.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Shorthand for a field-named validation failure.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_names_field() {
        let err = PipelineError::invalid("minlength", "must be at least 100");
        let msg = err.to_string();
        assert!(msg.contains("minlength"));
        assert!(msg.contains("at least 100"));
    }

    #[test]
    fn test_contig_count_mismatch_names_both_counts() {
        let err = PipelineError::ContigCountMismatch {
            contigs: 10,
            coverage_rows: 8,
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains('8'));
    }

    #[test]
    fn test_stage_failure_names_stage() {
        let err = PipelineError::Stage {
            stage: "coverage",
            source: anyhow::anyhow!("truncated record"),
        };
        let msg = err.to_string();
        assert!(msg.contains("coverage"));
        assert!(msg.contains("truncated record"));
    }
}
