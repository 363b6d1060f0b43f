//! Coverage estimation from alignment files.
//!
//! Parses SAM-format alignment files. The `@SQ` header lines define the
//! reference universe; references shorter than the contig length floor are
//! skipped so the row universe matches the composition stage's filter.
//! Alignments are counted per reference when they pass the score threshold
//! (the `AS` tag when present, MAPQ otherwise), and each file contributes a
//! depth-per-kilobase column. Files are parsed on a worker pool bounded by
//! the configured worker count; no shared mutable state crosses the stage
//! boundary.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use rayon::prelude::*;

use super::CoverageEstimator;
use crate::types::CoverageMatrix;

/// Baseline coverage estimator over SAM text files.
#[derive(Debug, Default)]
pub struct AlignmentDepthEstimator;

impl CoverageEstimator for AlignmentDepthEstimator {
    fn estimate(
        &self,
        paths: &[PathBuf],
        min_score: u32,
        min_length: u32,
        workers: usize,
    ) -> Result<CoverageMatrix> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .context("building alignment parser pool")?;

        let columns: Vec<DepthColumn> = pool.install(|| {
            paths
                .par_iter()
                .map(|p| depth_column(p, min_score, min_length))
                .collect::<Result<_>>()
        })?;

        let first = match columns.first() {
            Some(c) => c,
            None => bail!("no alignment files given"),
        };
        for col in &columns[1..] {
            if col.refs != first.refs {
                bail!(
                    "alignment files disagree on their reference headers \
                     ({} vs {})",
                    col.path.display(),
                    first.path.display()
                );
            }
        }

        let nrows = first.refs.len();
        let mut matrix = Array2::zeros((nrows, columns.len()));
        for (j, col) in columns.iter().enumerate() {
            for (i, &v) in col.depths.iter().enumerate() {
                matrix[[i, j]] = v;
            }
        }
        Ok(CoverageMatrix(matrix))
    }
}

/// One file's reference universe and per-reference depth.
struct DepthColumn {
    path: PathBuf,
    refs: Vec<String>,
    depths: Vec<f32>,
}

/// Parses one SAM file into a depth column.
fn depth_column(path: &Path, min_score: u32, min_length: u32) -> Result<DepthColumn> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut refs: Vec<String> = Vec::new();
    let mut ref_lengths: Vec<u32> = Vec::new();
    let mut counts: Vec<u64> = Vec::new();
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for line in reader.lines() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if let Some(header) = line.strip_prefix("@SQ") {
            let mut name = None;
            let mut length = None;
            for field in header.split('\t') {
                if let Some(v) = field.strip_prefix("SN:") {
                    name = Some(v.to_string());
                } else if let Some(v) = field.strip_prefix("LN:") {
                    length = Some(v.parse::<u32>().with_context(|| {
                        format!("bad LN field in {}: {v}", path.display())
                    })?);
                }
            }
            let (name, length) = match (name, length) {
                (Some(n), Some(l)) => (n, l),
                _ => bail!("malformed @SQ line in {}", path.display()),
            };
            if length >= min_length {
                index.insert(name.clone(), refs.len());
                refs.push(name);
                ref_lengths.push(length);
                counts.push(0);
            }
            continue;
        }
        if line.starts_with('@') || line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            bail!("truncated alignment record in {}", path.display());
        }
        let flag: u16 = fields[1]
            .parse()
            .with_context(|| format!("bad FLAG field in {}", path.display()))?;
        // 0x4 = segment unmapped.
        if flag & 0x4 != 0 || fields[2] == "*" {
            continue;
        }
        if alignment_score(&fields)? < i64::from(min_score) {
            continue;
        }
        if let Some(&i) = index.get(fields[2]) {
            counts[i] += 1;
        }
    }

    if refs.is_empty() {
        bail!(
            "{} has no usable @SQ header lines; alignment files must carry headers",
            path.display()
        );
    }

    let depths = counts
        .iter()
        .zip(ref_lengths.iter())
        .map(|(&c, &l)| c as f32 * 1000.0 / l as f32)
        .collect();

    Ok(DepthColumn {
        path: path.to_path_buf(),
        refs,
        depths,
    })
}

/// The `AS` tag when the aligner emitted one, MAPQ otherwise. Kept signed:
/// aligners emit negative scores for poor alignments, and those must still
/// fail a threshold of zero.
fn alignment_score(fields: &[&str]) -> Result<i64> {
    for tag in &fields[11..] {
        if let Some(v) = tag.strip_prefix("AS:i:") {
            return v.parse().context("bad AS tag");
        }
    }
    if fields[4] == "255" {
        // 255 means MAPQ unavailable; treat as passing.
        return Ok(i64::MAX);
    }
    let mapq: u32 = fields[4].parse().context("bad MAPQ field")?;
    Ok(i64::from(mapq))
}
