//! Joint composition/abundance embedding.
//!
//! Baseline trainer: a tied-weight linear autoencoder over the concatenated,
//! column-normalized composition and coverage blocks. The weighting ratio
//! splits reconstruction emphasis between the two blocks; capacity acts as an
//! inverse L2 penalty. Training is plain minibatch gradient descent with a
//! fixed seed, so runs are reproducible. The checkpoint is the learned
//! projection, serialized as JSON.

use anyhow::{ensure, Context, Result};
use ndarray::{s, Array2, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{EmbeddingTrainer, TrainedModel};
use crate::pipeline::config::ModelHyperparams;
use crate::types::{CoverageMatrix, Embedding};

const SEED: u64 = 0x6d65_7461_6269;
const LEARNING_RATE: f32 = 0.01;

/// Baseline embedding trainer.
#[derive(Debug, Default)]
pub struct LinearAutoencoderTrainer;

/// Persisted model state.
#[derive(Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Input dimensionality (composition + coverage columns).
    pub input_dims: usize,
    /// Latent dimensionality.
    pub latent_dims: usize,
    /// Hidden widths as configured. The linear baseline records but does not
    /// consume them; a deeper trainer behind the same trait would.
    pub hidden_widths: Vec<usize>,
    /// Epochs trained.
    pub epochs: usize,
    /// Batch size used.
    pub batch_size: usize,
    /// Configured capacity.
    pub capacity: f64,
    /// Composition/abundance weighting ratio.
    pub weight_ratio: f64,
    /// Projection weights, row-major, `input_dims * latent_dims` entries.
    pub weights: Vec<f32>,
}

impl EmbeddingTrainer for LinearAutoencoderTrainer {
    fn train(
        &self,
        coverage: &CoverageMatrix,
        features: &Array2<f32>,
        hyperparams: &ModelHyperparams,
    ) -> Result<TrainedModel> {
        ensure!(
            coverage.nrows() == features.nrows(),
            "coverage rows ({}) and feature rows ({}) disagree",
            coverage.nrows(),
            features.nrows()
        );
        let n = features.nrows();
        ensure!(n > 0, "cannot train on an empty contig set");

        let x = build_input(coverage, features, hyperparams.weight_ratio as f32);
        let dims = x.ncols();
        let k = hyperparams.latent_dims;

        let mut rng = ChaCha8Rng::seed_from_u64(SEED);
        let mut w = Array2::from_shape_fn((dims, k), |_| rng.gen_range(-0.05f32..0.05));

        // L2 strength; capacity 0 disables learning pressure entirely.
        let lambda = if hyperparams.capacity > 0.0 {
            (1.0 / hyperparams.capacity) as f32
        } else {
            0.0
        };

        let mut order: Vec<usize> = (0..n).collect();
        for _ in 0..hyperparams.epochs {
            order.shuffle(&mut rng);
            for batch in order.chunks(hyperparams.batch_size) {
                let xb = x.select(Axis(0), batch);
                let m = batch.len() as f32;

                let h = xb.dot(&w);
                let r = &xb - &h.dot(&w.t());
                let grad =
                    -(xb.t().dot(&r.dot(&w)) + r.t().dot(&xb.dot(&w))) / m + &w * (2.0 * lambda);
                w = &w - &(grad * LEARNING_RATE);
            }
        }

        let latent = x.dot(&w);
        let checkpoint = Checkpoint {
            input_dims: dims,
            latent_dims: k,
            hidden_widths: hyperparams.hidden_widths.clone(),
            epochs: hyperparams.epochs,
            batch_size: hyperparams.batch_size,
            capacity: hyperparams.capacity,
            weight_ratio: hyperparams.weight_ratio,
            weights: w.iter().copied().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&checkpoint).context("serializing checkpoint")?;

        Ok(TrainedModel {
            checkpoint: bytes,
            embedding: Embedding(latent),
        })
    }
}

/// Concatenates the normalized composition and coverage blocks, scaled so the
/// weighting ratio splits total reconstruction emphasis between them.
fn build_input(coverage: &CoverageMatrix, features: &Array2<f32>, ratio: f32) -> Array2<f32> {
    let n = features.nrows();
    let d = features.ncols();
    let s_cols = coverage.nsamples();

    let mut x = Array2::zeros((n, d + s_cols));
    x.slice_mut(s![.., ..d]).assign(features);
    x.slice_mut(s![.., d..]).assign(&coverage.0);
    normalize_columns(&mut x);

    let comp_scale = (ratio / d as f32).sqrt();
    let abund_scale = ((1.0 - ratio) / s_cols as f32).sqrt();
    x.slice_mut(s![.., ..d]).mapv_inplace(|v| v * comp_scale);
    x.slice_mut(s![.., d..]).mapv_inplace(|v| v * abund_scale);
    x
}

/// Zero-mean, unit-variance per column; constant columns stay zero.
fn normalize_columns(x: &mut Array2<f32>) {
    let n = x.nrows() as f32;
    for mut col in x.columns_mut() {
        let mean = col.sum() / n;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        let std = var.sqrt();
        if std > 1e-8 {
            col.mapv_inplace(|v| (v - mean) / std);
        } else {
            col.fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hyperparams(latent: usize) -> ModelHyperparams {
        ModelHyperparams {
            hidden_widths: vec![16],
            latent_dims: latent,
            epochs: 5,
            batch_size: 4,
            capacity: 1000.0,
            weight_ratio: 0.2,
            cuda: false,
        }
    }

    fn toy_data(n: usize) -> (CoverageMatrix, Array2<f32>) {
        let coverage = CoverageMatrix(Array2::from_shape_fn((n, 2), |(i, j)| {
            (i * 2 + j) as f32 * 0.5
        }));
        let features = Array2::from_shape_fn((n, 8), |(i, j)| ((i + j) % 3) as f32);
        (coverage, features)
    }

    #[test]
    fn test_embedding_has_requested_shape() {
        let (coverage, features) = toy_data(10);
        let model = LinearAutoencoderTrainer
            .train(&coverage, &features, &hyperparams(3))
            .unwrap();
        assert_eq!(model.embedding.nrows(), 10);
        assert_eq!(model.embedding.ndims(), 3);
    }

    #[test]
    fn test_checkpoint_is_parseable_json() {
        let (coverage, features) = toy_data(6);
        let model = LinearAutoencoderTrainer
            .train(&coverage, &features, &hyperparams(2))
            .unwrap();
        let parsed: Checkpoint = serde_json::from_slice(&model.checkpoint).unwrap();
        assert_eq!(parsed.latent_dims, 2);
        assert_eq!(parsed.weights.len(), parsed.input_dims * 2);
    }

    #[test]
    fn test_training_is_deterministic() {
        let (coverage, features) = toy_data(8);
        let a = LinearAutoencoderTrainer
            .train(&coverage, &features, &hyperparams(2))
            .unwrap();
        let b = LinearAutoencoderTrainer
            .train(&coverage, &features, &hyperparams(2))
            .unwrap();
        assert_eq!(a.embedding.0, b.embedding.0);
    }

    #[test]
    fn test_rejects_misaligned_inputs() {
        let coverage = CoverageMatrix(Array2::zeros((4, 1)));
        let features = Array2::zeros((5, 8));
        let err = LinearAutoencoderTrainer.train(&coverage, &features, &hyperparams(2));
        assert!(err.is_err());
    }

    #[test]
    fn test_normalize_columns_centers_data() {
        let mut x = Array2::from_shape_vec((3, 1), vec![1.0, 2.0, 3.0]).unwrap();
        normalize_columns(&mut x);
        let mean: f32 = x.column(0).sum() / 3.0;
        assert!(mean.abs() < 1e-6);
    }
}
