//! Clustering of the latent embedding into bins.
//!
//! Baseline engine: deterministic density-seeded greedy clustering over
//! cosine distance. Each round picks the unassigned point with the most
//! unassigned neighbors inside the radius, forms a bin from that
//! neighborhood, and removes it. Every contig is assigned at most once; the
//! driver applies size and count limits afterwards.

use anyhow::{ensure, Result};
use ndarray::Array2;

use super::ClusterEngine;
use crate::types::{Bin, ClusterAssignment, Embedding};

/// Multiplier on the median nearest-neighbor distance used as the
/// neighborhood radius.
const RADIUS_FACTOR: f32 = 1.5;

/// Baseline clustering engine.
#[derive(Debug, Default)]
pub struct DensityClusterEngine;

impl ClusterEngine for DensityClusterEngine {
    fn cluster(&self, embedding: &Embedding, names: &[String]) -> Result<ClusterAssignment> {
        ensure!(
            embedding.nrows() == names.len(),
            "embedding rows ({}) and identifiers ({}) disagree",
            embedding.nrows(),
            names.len()
        );
        let n = names.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        let unit = normalize_rows(&embedding.0);
        let radius = neighborhood_radius(&unit);

        let mut assigned = vec![false; n];
        let mut remaining = n;
        let mut bins = Vec::new();

        while remaining > 0 {
            let seed = pick_seed(&unit, &assigned, radius);
            let mut members = Vec::new();
            for j in 0..n {
                // The seed joins unconditionally: its f32 self-distance is
                // not exactly zero, and a zero row sits at distance 1 from
                // everything, itself included.
                if j == seed || (!assigned[j] && cosine_distance(&unit, seed, j) <= radius) {
                    members.push(j);
                }
            }
            for &j in &members {
                assigned[j] = true;
            }
            remaining -= members.len();

            bins.push(Bin {
                id: format!("bin_{}", bins.len() + 1),
                members: members.iter().map(|&j| names[j].clone()).collect(),
            });
        }

        Ok(bins)
    }
}

/// Unassigned point with the most unassigned neighbors; lowest index on
/// ties, which keeps the whole procedure deterministic.
fn pick_seed(unit: &Array2<f32>, assigned: &[bool], radius: f32) -> usize {
    let n = assigned.len();
    let mut best = usize::MAX;
    let mut best_neighbors = 0usize;
    for i in 0..n {
        if assigned[i] {
            continue;
        }
        let neighbors = (0..n)
            .filter(|&j| j != i && !assigned[j] && cosine_distance(unit, i, j) <= radius)
            .count();
        if best == usize::MAX || neighbors > best_neighbors {
            best = i;
            best_neighbors = neighbors;
        }
    }
    best
}

/// Median nearest-neighbor cosine distance, scaled. Zero when only one
/// point exists, which degenerates to singleton bins.
fn neighborhood_radius(unit: &Array2<f32>) -> f32 {
    let n = unit.nrows();
    if n < 2 {
        return 0.0;
    }
    let mut nearest: Vec<f32> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| j != i)
                .map(|j| cosine_distance(unit, i, j))
                .fold(f32::INFINITY, f32::min)
        })
        .collect();
    nearest.sort_by(|a, b| a.total_cmp(b));
    nearest[n / 2] * RADIUS_FACTOR
}

fn cosine_distance(unit: &Array2<f32>, i: usize, j: usize) -> f32 {
    let dot: f32 = unit.row(i).dot(&unit.row(j));
    (1.0 - dot).max(0.0)
}

/// Rows scaled to unit norm; zero rows stay zero.
fn normalize_rows(x: &Array2<f32>) -> Array2<f32> {
    let mut out = x.clone();
    for mut row in out.rows_mut() {
        let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 1e-12 {
            row.mapv_inplace(|v| v / norm);
        }
    }
    out
}
