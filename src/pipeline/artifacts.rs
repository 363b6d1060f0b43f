//! Durable artifact storage for pipeline stage outputs.
//!
//! The `ArtifactStore` is the only component that knows the on-disk layout of
//! a run directory. Stage outputs are persisted under fixed, stage-specific
//! names so downstream tooling can locate them deterministically. Writes are
//! atomic: data lands in a temporary file in the run directory, is synced,
//! and is renamed into place only then, so a partially written artifact can
//! never be mistaken for a complete one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::PipelineError;

/// Fixed artifact names, stable contracts for downstream tooling.
pub mod artifact_names {
    /// Composition feature matrix, TSV.
    pub const FEATURES: &str = "features.tsv";
    /// Coverage matrix, TSV, one column per sample.
    pub const COVERAGE: &str = "coverage.tsv";
    /// Latent embedding matrix, TSV.
    pub const LATENT: &str = "latent.tsv";
    /// Trained model checkpoint, JSON.
    pub const MODEL: &str = "model.json";
    /// Final cluster report, tab-separated bin → contig lines.
    pub const CLUSTERS: &str = "clusters.tsv";
    /// Plain-text run log with timestamped stage lines.
    pub const RUN_LOG: &str = "log.txt";
}

/// Opaque reference to a persisted artifact.
///
/// Only the store constructs these; the orchestrator never assembles raw
/// paths itself.
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    /// Stable artifact name within the run directory.
    pub name: &'static str,
    /// Absolute location of the committed artifact.
    pub path: PathBuf,
    /// SHA-256 checksum of the committed bytes.
    pub checksum: String,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// File-based artifact storage scoped to one run directory.
pub struct ArtifactStore {
    outdir: PathBuf,
}

impl ArtifactStore {
    /// Creates the run directory and a store scoped to it.
    ///
    /// Fails with `PathConflict` if the directory already exists; this is
    /// what keeps two concurrent runs from targeting the same directory.
    pub fn create(outdir: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let outdir = outdir.into();
        if outdir.exists() {
            return Err(PipelineError::PathConflict(outdir));
        }
        fs::create_dir(&outdir)?;
        Ok(Self { outdir })
    }

    /// The run directory this store writes into.
    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    /// Location an artifact will be (or was) committed under.
    ///
    /// Exposed for external collaborators that write their own formats and
    /// for tooling that reads committed artifacts.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.outdir.join(name)
    }

    /// Persists `data` under `name`, atomically, and returns a handle.
    ///
    /// The caller may treat the artifact as durably committed once this
    /// returns: the bytes are synced to disk before the rename.
    pub fn put(&self, name: &'static str, data: &[u8]) -> Result<ArtifactHandle, PipelineError> {
        let path = self.path_for(name);

        let mut tmp = NamedTempFile::new_in(&self.outdir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| PipelineError::Io(e.error))?;

        Ok(ArtifactHandle {
            name,
            path,
            checksum: checksum(data),
            size_bytes: data.len() as u64,
        })
    }
}

/// SHA-256 checksum, hex encoded.
fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_refuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactStore::create(dir.path());
        assert!(matches!(err, Err(PipelineError::PathConflict(_))));
    }

    #[test]
    fn test_create_makes_run_directory() {
        let dir = tempfile::tempdir().unwrap();
        let outdir = dir.path().join("run");
        let store = ArtifactStore::create(&outdir).unwrap();
        assert!(outdir.is_dir());
        assert_eq!(store.outdir(), outdir);
    }

    #[test]
    fn test_put_commits_complete_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::create(dir.path().join("run")).unwrap();

        let handle = store.put(artifact_names::FEATURES, b"c1\t0.5\n").unwrap();
        assert_eq!(handle.name, "features.tsv");
        assert_eq!(handle.size_bytes, 7);
        assert_eq!(handle.checksum.len(), 64);

        let read = fs::read(&handle.path).unwrap();
        assert_eq!(read, b"c1\t0.5\n");
    }

    #[test]
    fn test_put_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::create(dir.path().join("run")).unwrap();
        store.put(artifact_names::COVERAGE, b"1.0\n").unwrap();

        let entries: Vec<_> = fs::read_dir(store.outdir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![artifact_names::COVERAGE]);
    }

    #[test]
    fn test_path_for_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::create(dir.path().join("run")).unwrap();
        assert_eq!(
            store.path_for(artifact_names::CLUSTERS),
            store.outdir().join("clusters.tsv")
        );
    }

    #[test]
    fn test_checksum_is_content_addressed() {
        assert_eq!(checksum(b"abc"), checksum(b"abc"));
        assert_ne!(checksum(b"abc"), checksum(b"abd"));
    }
}
