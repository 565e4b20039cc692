//! Mini-batch training with Adam.
//!
//! Loss per batch of `B` samples with `P` pixels and `J` latent units:
//!
//! ```text
//! L = Σ (out − x)² / (B·P)  −  λ · mean_j var_b(z_bj)
//! ```
//!
//! The second term rewards latent vectors that spread out across the batch,
//! which keeps the latent from collapsing to a constant.

use std::time::Duration;

use rand::{SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::{
    error::LatentError,
    network::{ENC1, Network},
};

/// Weight of the latent variance regularizer.
pub const VARIANCE_WEIGHT: f32 = 0.01;

/// Default mini-batch size.
pub const BATCH_SIZE: usize = 32;

const ADAM_BETA1: f32 = 0.9;
const ADAM_BETA2: f32 = 0.999;
const ADAM_EPSILON: f32 = 1e-7;

/// Hyperparameters for one call to [`crate::Encoder::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    /// Passes over the dataset
    pub epochs: usize,
    /// Samples per gradient step
    pub batch_size: usize,
    /// Adam step size
    pub learning_rate: f32,
    /// λ for the latent variance term
    pub variance_weight: f32,
    /// Keep the first encoder layer fixed
    pub freeze_first_layer: bool,
    /// Seed for the per-epoch shuffle
    pub shuffle_seed: u64,
}

impl TrainingOptions {
    /// Startup training: all layers trainable.
    pub fn startup(epochs: usize) -> Self {
        Self {
            epochs,
            batch_size: BATCH_SIZE,
            learning_rate: 1e-3,
            variance_weight: VARIANCE_WEIGHT,
            freeze_first_layer: false,
            shuffle_seed: 0,
        }
    }

    /// Background fine-tune: first layer frozen, smaller step.
    pub fn fine_tune(epochs: usize) -> Self {
        Self { learning_rate: 1e-4, freeze_first_layer: true, ..Self::startup(epochs) }
    }
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self::startup(2)
    }
}

/// Outcome of a completed fit.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Epochs run
    pub epochs: usize,
    /// Samples in the dataset
    pub samples: usize,
    /// Reconstruction MSE over the dataset after training
    pub final_mse: f32,
    /// Wall time spent training
    pub duration: Duration,
    /// Weights generation published by this fit
    pub generation: u64,
}

/// Adam moment estimates, shaped like the network.
struct Adam {
    learning_rate: f32,
    step: i32,
    m: Network,
    v: Network,
}

impl Adam {
    fn new(network: &Network, learning_rate: f32) -> Self {
        Self {
            learning_rate,
            step: 0,
            m: Network::zeros(network.topology()),
            v: Network::zeros(network.topology()),
        }
    }

    fn apply(&mut self, network: &mut Network, grads: &Network, freeze_first: bool) {
        self.step += 1;
        let correction1 = 1.0 - ADAM_BETA1.powi(self.step);
        let correction2 = 1.0 - ADAM_BETA2.powi(self.step);
        let lr = self.learning_rate;

        for (index, layer) in network.layers.iter_mut().enumerate() {
            if freeze_first && index == ENC1 {
                continue;
            }
            let layer_grads = &grads.layers[index];
            let first = &mut self.m.layers[index];
            let second = &mut self.v.layers[index];

            let params = layer.weights.iter_mut().chain(layer.bias.iter_mut());
            let gs = layer_grads.weights.iter().chain(&layer_grads.bias);
            let ms = first.weights.iter_mut().chain(first.bias.iter_mut());
            let vs = second.weights.iter_mut().chain(second.bias.iter_mut());

            for (((p, &g), m), v) in params.zip(gs).zip(ms).zip(vs) {
                *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
                let m_hat = *m / correction1;
                let v_hat = *v / correction2;
                *p -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
            }
        }
    }
}

/// Train `network` in place. Returns the final reconstruction MSE.
///
/// # Errors
///
/// - `EmptyDataset` if there are no samples
/// - `Diverged` if an epoch's loss or the resulting weights are not finite;
///   `network` is then in an unspecified state and must be discarded
pub(crate) fn train(
    network: &mut Network,
    samples: &[&[f32]],
    options: &TrainingOptions,
) -> Result<f32, LatentError> {
    if samples.is_empty() {
        return Err(LatentError::EmptyDataset);
    }

    let mut adam = Adam::new(network, options.learning_rate);
    let mut rng = ChaCha8Rng::seed_from_u64(options.shuffle_seed);
    let mut order: Vec<usize> = (0..samples.len()).collect();
    let batch_size = options.batch_size.max(1);

    for epoch in 0..options.epochs {
        order.shuffle(&mut rng);
        let mut epoch_loss = 0.0f64;

        for chunk in order.chunks(batch_size) {
            let batch: Vec<&[f32]> = chunk.iter().map(|&i| samples[i]).collect();
            let (loss, grads) = batch_gradients(
                network,
                &batch,
                options.variance_weight,
                options.freeze_first_layer,
            );
            epoch_loss += loss * batch.len() as f64;
            adam.apply(network, &grads, options.freeze_first_layer);
        }

        let epoch_loss = epoch_loss / samples.len() as f64;
        if !epoch_loss.is_finite() || !network.is_finite() {
            tracing::error!(epoch, "encoder training diverged");
            return Err(LatentError::Diverged { epoch });
        }
        tracing::debug!(epoch, loss = epoch_loss, "epoch complete");
    }

    Ok(reconstruction_mse(network, samples))
}

/// Mean squared reconstruction error over `samples`.
pub(crate) fn reconstruction_mse(network: &Network, samples: &[&[f32]]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let (sum, count) = samples
        .par_iter()
        .map(|x| (squared_error(&network.reconstruct(x), x), x.len()))
        .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    (sum / count.max(1) as f64) as f32
}

fn squared_error(out: &[f32], target: &[f32]) -> f64 {
    out.iter().zip(target).map(|(o, t)| f64::from(o - t).powi(2)).sum()
}

/// Batch loss and its gradient with respect to every parameter.
pub(crate) fn batch_gradients(
    network: &Network,
    batch: &[&[f32]],
    variance_weight: f32,
    freeze_first: bool,
) -> (f64, Network) {
    let topology = network.topology();
    let b = batch.len() as f32;
    let caches: Vec<_> = batch.par_iter().map(|x| network.forward_cached(x)).collect();

    let latents: Vec<&[f32]> = caches.iter().map(|c| c.z.as_slice()).collect();
    let (variance_term, latent_grads) = variance_regularizer(&latents, variance_weight);

    let out_scale = 2.0 / (b * topology.input as f32);
    let grads = batch
        .par_iter()
        .zip(&caches)
        .zip(&latent_grads)
        .fold(
            || Network::zeros(topology),
            |mut acc, ((x, cache), lg)| {
                network.backward(x, cache, out_scale, lg, freeze_first, &mut acc);
                acc
            },
        )
        .reduce(
            || Network::zeros(topology),
            |mut acc, other| {
                acc.add_assign(&other);
                acc
            },
        );

    let squared: f64 = batch.iter().zip(&caches).map(|(x, c)| squared_error(&c.out, x)).sum();
    let mse = squared / f64::from(b * topology.input as f32);

    (mse + variance_term, grads)
}

/// `−λ · mean_j var_b(z_bj)` and its gradient per sample.
fn variance_regularizer(latents: &[&[f32]], weight: f32) -> (f64, Vec<Vec<f32>>) {
    let batch = latents.len();
    let Some(width) = latents.first().map(|z| z.len()) else {
        return (0.0, Vec::new());
    };
    let b = batch as f32;
    let j = width as f32;

    let mut mean = vec![0.0f32; width];
    for z in latents {
        for (m, v) in mean.iter_mut().zip(z.iter()) {
            *m += v / b;
        }
    }

    let mut variance_sum = 0.0f64;
    let grads: Vec<Vec<f32>> = latents
        .iter()
        .map(|z| {
            z.iter()
                .zip(&mean)
                .map(|(v, m)| {
                    let d = v - m;
                    variance_sum += f64::from(d * d) / f64::from(b);
                    -weight * 2.0 * d / (b * j)
                })
                .collect::<Vec<f32>>()
        })
        .collect();

    (-f64::from(weight) * variance_sum / f64::from(j), grads)
}
