//! Shared encoder with lock-free reads and atomic weight replacement.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use arc_swap::ArcSwap;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::{
    error::LatentError,
    image::PseudoImage,
    network::{Network, Topology},
    train::{self, TrainingOptions, TrainingReport},
};

/// Encoder output: one `f32` per latent unit.
#[derive(Debug, Clone, PartialEq)]
pub struct LatentVector(Vec<f32>);

impl LatentVector {
    /// Latent values.
    pub fn values(&self) -> &[f32] {
        &self.0
    }

    /// Number of latent units.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-width latent.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Little-endian `f32` concatenation.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Euclidean distance to another latent of the same width.
    pub fn distance(&self, other: &LatentVector) -> f32 {
        self.0.iter().zip(&other.0).map(|(a, b)| (a - b) * (a - b)).sum::<f32>().sqrt()
    }
}

/// The session's encoder.
///
/// # Invariants
///
/// - Readers always see one complete set of weights; a fit trains a private
///   clone and publishes it with a single pointer swap
/// - `generation` increases by one per published fit
/// - At most one fit runs at a time, so no trained weights are lost to a
///   concurrent publish
pub struct Encoder {
    network: ArcSwap<Network>,
    generation: AtomicU64,
    training: Mutex<()>,
}

impl Encoder {
    /// Freshly initialized encoder for 28×28 images, weights drawn from a
    /// ChaCha20 stream keyed by `seed`.
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        Self::from_network(Network::initialize(Topology::default(), &mut rng))
    }

    /// Encoder around existing weights.
    pub fn from_network(network: Network) -> Self {
        Self {
            network: ArcSwap::from_pointee(network),
            generation: AtomicU64::new(0),
            training: Mutex::new(()),
        }
    }

    /// Map an image to its latent vector using the current weights.
    pub fn encode(&self, image: &PseudoImage) -> LatentVector {
        LatentVector(self.network.load().encode(image.pixels()))
    }

    /// Decoder output for an image using the current weights.
    pub fn reconstruct(&self, image: &PseudoImage) -> Vec<f32> {
        self.network.load().reconstruct(image.pixels())
    }

    /// Mean squared reconstruction error over `images`.
    pub fn reconstruction_mse(&self, images: &[PseudoImage]) -> f32 {
        let samples: Vec<&[f32]> = images.iter().map(PseudoImage::pixels).collect();
        train::reconstruction_mse(&self.network.load(), &samples)
    }

    /// Number of fits published so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Current weights.
    pub fn snapshot(&self) -> Arc<Network> {
        self.network.load_full()
    }

    /// Train a copy of the current weights on `images`, then publish it.
    ///
    /// Blocks for the duration of training; call from a blocking thread.
    /// On error the published weights are unchanged.
    pub fn fit(
        &self,
        images: &[PseudoImage],
        options: &TrainingOptions,
    ) -> Result<TrainingReport, LatentError> {
        let _training = self.training.lock().expect("training mutex poisoned");
        let started = Instant::now();

        let mut candidate = Network::clone(&self.network.load());
        let samples: Vec<&[f32]> = images.iter().map(PseudoImage::pixels).collect();
        let final_mse = train::train(&mut candidate, &samples, options)?;

        self.network.store(Arc::new(candidate));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        let report = TrainingReport {
            epochs: options.epochs,
            samples: images.len(),
            final_mse,
            duration: started.elapsed(),
            generation,
        };
        tracing::info!(
            generation,
            samples = report.samples,
            epochs = report.epochs,
            final_mse,
            duration_ms = report.duration.as_millis() as u64,
            frozen = options.freeze_first_layer,
            "encoder weights published"
        );

        Ok(report)
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("topology", &self.network.load().topology())
            .field("generation", &self.generation())
            .finish()
    }
}
