//! Composition feature extraction from contig sequences.
//!
//! Reads FASTA input (plain or gzipped) and computes a 256-dimensional
//! tetranucleotide frequency vector per contig. K-mers containing ambiguous
//! bases are skipped; frequencies are normalized by the number of counted
//! k-mers so contigs of different lengths are comparable.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use ndarray::Array2;

use super::FeatureExtractor;
use crate::types::ContigSet;

/// Number of distinct tetranucleotides over the ACGT alphabet.
pub const TNF_DIMS: usize = 256;

/// Baseline composition extractor: tetranucleotide frequencies.
#[derive(Debug, Default)]
pub struct TetranucleotideExtractor;

impl FeatureExtractor for TetranucleotideExtractor {
    fn extract(&self, path: &Path, min_length: u32) -> Result<ContigSet> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let reader: Box<dyn BufRead> = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        extract_from_reader(reader, min_length)
    }
}

/// Parses FASTA records and builds the contig set.
fn extract_from_reader(reader: impl BufRead, min_length: u32) -> Result<ContigSet> {
    let mut names = Vec::new();
    let mut lengths = Vec::new();
    let mut rows: Vec<[f32; TNF_DIMS]> = Vec::new();

    let mut name: Option<String> = None;
    let mut seq: Vec<u8> = Vec::new();

    let mut flush = |name: &mut Option<String>, seq: &mut Vec<u8>| {
        if let Some(n) = name.take() {
            if seq.len() >= min_length as usize {
                names.push(n);
                lengths.push(seq.len() as u32);
                rows.push(tetranucleotide_frequencies(seq));
            }
        }
        seq.clear();
    };

    for line in reader.lines() {
        let line = line.context("reading contig file")?;
        if let Some(header) = line.strip_prefix('>') {
            flush(&mut name, &mut seq);
            let id = header.split_whitespace().next().unwrap_or_default();
            if id.is_empty() {
                bail!("contig record with empty identifier");
            }
            name = Some(id.to_string());
        } else if name.is_some() {
            seq.extend(line.trim_end().bytes());
        } else if !line.trim().is_empty() {
            bail!("sequence data before the first FASTA header");
        }
    }
    flush(&mut name, &mut seq);

    let n = names.len();
    let mut features = Array2::zeros((n, TNF_DIMS));
    for (i, row) in rows.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            features[[i, j]] = v;
        }
    }

    ContigSet::new(names, lengths, features)
}

/// Rolling 4-mer counting. The 8-bit code is rebuilt after any non-ACGT base.
fn tetranucleotide_frequencies(seq: &[u8]) -> [f32; TNF_DIMS] {
    let mut counts = [0u32; TNF_DIMS];
    let mut code: usize = 0;
    let mut valid = 0usize;
    let mut total = 0u32;

    for &base in seq {
        let b = match base {
            b'A' | b'a' => 0,
            b'C' | b'c' => 1,
            b'G' | b'g' => 2,
            b'T' | b't' => 3,
            _ => {
                valid = 0;
                continue;
            }
        };
        code = ((code << 2) | b) & 0xFF;
        valid += 1;
        if valid >= 4 {
            counts[code] += 1;
            total += 1;
        }
    }

    let mut freqs = [0.0f32; TNF_DIMS];
    if total > 0 {
        for (f, &c) in freqs.iter_mut().zip(counts.iter()) {
            *f = c as f32 / total as f32;
        }
    }
    freqs
}
