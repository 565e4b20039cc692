//! chaoskey Latent Source
//!
//! Turns pseudo-images into latent vectors that feed key derivation.
//!
//! ```text
//! OS bytes ──► ImageFactory (dedup) ──► PseudoImage ──► Encoder ──► LatentVector
//!                                                          ▲
//! logistic map ──► training dataset ──► fit ──► ArcSwap ───┘
//! ```
//!
//! The encoder is a small fixed-topology autoencoder with a chaotic
//! activation. Its forward pass is pure; training runs on a private copy of
//! the weights and publishes the result atomically, so encoding never waits
//! on a retrain and never observes half-updated weights.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chaos;
pub mod encoder;
pub mod error;
pub mod image;
pub mod network;
pub mod train;

pub use chaos::{
    FIXED_INITIAL, InitialValue, LOGISTIC_R, LogisticMap, arnold_cat, chained_images,
    logistic_bytes, logistic_dataset, logistic_image, logistic_step, random_initial,
};
pub use encoder::{Encoder, LatentVector};
pub use error::LatentError;
pub use image::{IMAGE_PIXELS, IMAGE_SIDE, ImageFactory, PseudoImage};
pub use network::{HIDDEN_DIM, LATENT_DIM, Network, Topology, chaos_activation};
pub use train::{TrainingOptions, TrainingReport, VARIANCE_WEIGHT};
