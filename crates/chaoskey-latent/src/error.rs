//! Error types for images and the encoder.

use thiserror::Error;

/// Errors from image construction and encoder training.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LatentError {
    /// Pixel buffer has the wrong length.
    #[error("expected {expected} pixels, got {actual}")]
    PixelCount {
        /// Required pixel count
        expected: usize,
        /// Supplied pixel count
        actual: usize,
    },

    /// A pixel is outside `[0, 1]` or not finite.
    #[error("pixel {index} out of range: {value}")]
    PixelOutOfRange {
        /// Flat pixel index
        index: usize,
        /// Offending value
        value: f32,
    },

    /// Training was asked to fit an empty dataset.
    #[error("training dataset is empty")]
    EmptyDataset,

    /// Loss stopped being finite. Weights are left unpublished.
    #[error("training diverged at epoch {epoch}")]
    Diverged {
        /// Epoch (zero-based) in which the loss became non-finite
        epoch: usize,
    },

    /// Could not draw a never-seen image within the attempt limit.
    #[error("no unused image after {attempts} attempts")]
    ImagesExhausted {
        /// Attempts made
        attempts: usize,
    },
}
