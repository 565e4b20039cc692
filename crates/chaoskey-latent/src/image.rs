//! Pseudo-images and the session-wide dedup factory.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{collections::HashSet, sync::Mutex};

use sha2::{Digest, Sha256};

use crate::error::LatentError;

/// Side length of a pseudo-image.
pub const IMAGE_SIDE: usize = 28;

/// Pixels per pseudo-image.
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;

/// Draw attempts before [`ImageFactory`] gives up on finding an unused image.
const MAX_DRAW_ATTEMPTS: usize = 1024;

/// 28×28 grid of intensities in `[0, 1]`, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct PseudoImage {
    pixels: Vec<f32>,
}

impl PseudoImage {
    /// Validate and wrap a pixel buffer.
    ///
    /// # Errors
    ///
    /// - `PixelCount` unless exactly [`IMAGE_PIXELS`] values are given
    /// - `PixelOutOfRange` for any value outside `[0, 1]` (NaN included)
    pub fn from_pixels(pixels: Vec<f32>) -> Result<Self, LatentError> {
        if pixels.len() != IMAGE_PIXELS {
            return Err(LatentError::PixelCount { expected: IMAGE_PIXELS, actual: pixels.len() });
        }
        if let Some((index, &value)) =
            pixels.iter().enumerate().find(|(_, v)| !(0.0..=1.0).contains(*v))
        {
            return Err(LatentError::PixelOutOfRange { index, value });
        }

        Ok(Self { pixels })
    }

    /// Image from raw bytes, each scaled by `1/255`.
    pub fn from_bytes(bytes: &[u8; IMAGE_PIXELS]) -> Self {
        Self { pixels: bytes.iter().map(|&b| f32::from(b) / 255.0).collect() }
    }

    /// Row-major pixel values.
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// Pixel at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= IMAGE_SIDE || col >= IMAGE_SIDE {
            return None;
        }
        Some(self.pixels[row * IMAGE_SIDE + col])
    }

    /// Copy with one pixel shifted by `delta`, clamped to `[0, 1]`.
    pub fn perturbed(&self, index: usize, delta: f32) -> Self {
        let mut pixels = self.pixels.clone();
        if let Some(p) = pixels.get_mut(index) {
            *p = (*p + delta).clamp(0.0, 1.0);
        }
        Self { pixels }
    }

    /// SHA-256 over the little-endian pixel bytes.
    pub fn content_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for p in &self.pixels {
            hasher.update(p.to_le_bytes());
        }

        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        out
    }

    pub(crate) fn from_pixels_unchecked(pixels: Vec<f32>) -> Self {
        debug_assert_eq!(pixels.len(), IMAGE_PIXELS);
        Self { pixels }
    }
}

/// Source of never-before-seen uniform images.
///
/// Holds the content hashes of every image it has handed out for the
/// lifetime of the factory. Shared across threads; the hash set sits behind
/// a single lock.
#[derive(Debug, Default)]
pub struct ImageFactory {
    seen: Mutex<HashSet<[u8; 32]>>,
}

impl ImageFactory {
    /// Create a factory with an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a uniform image whose content has not been issued before.
    ///
    /// `fill` supplies random bytes; each becomes one pixel (`byte / 255`).
    ///
    /// # Errors
    ///
    /// - `ImagesExhausted` if every draw within the attempt limit collided
    ///   (only possible with a broken random source)
    pub fn fresh_uniform(
        &self,
        mut fill: impl FnMut(&mut [u8]),
    ) -> Result<PseudoImage, LatentError> {
        let mut bytes = [0u8; IMAGE_PIXELS];
        for _ in 0..MAX_DRAW_ATTEMPTS {
            fill(&mut bytes);
            let image = PseudoImage::from_bytes(&bytes);
            if self.mark_used(&image) {
                return Ok(image);
            }
            tracing::debug!("discarding previously issued image");
        }

        Err(LatentError::ImagesExhausted { attempts: MAX_DRAW_ATTEMPTS })
    }

    /// Draw `count` unused uniform images.
    pub fn fresh_batch(
        &self,
        count: usize,
        mut fill: impl FnMut(&mut [u8]),
    ) -> Result<Vec<PseudoImage>, LatentError> {
        (0..count).map(|_| self.fresh_uniform(&mut fill)).collect()
    }

    /// Record an image as issued. Returns `false` if it was already seen.
    pub fn mark_used(&self, image: &PseudoImage) -> bool {
        let hash = image.content_hash();
        self.seen.lock().expect("image set mutex poisoned").insert(hash)
    }

    /// Number of distinct images issued so far.
    pub fn issued(&self) -> usize {
        self.seen.lock().expect("image set mutex poisoned").len()
    }
}
