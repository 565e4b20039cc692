//! Logistic-map chaos source.
//!
//! Iterates `x ← r·x·(1−x)` with `r = 3.99`, deep in the chaotic regime.
//! Each pixel of an image is the next iterate, so the first pixel is already
//! one step past the initial value.

use rand::Rng;

use crate::image::{IMAGE_PIXELS, IMAGE_SIDE, PseudoImage};

/// Growth parameter of the logistic map.
pub const LOGISTIC_R: f64 = 3.99;

/// Initial value used for reproducible datasets.
pub const FIXED_INITIAL: f64 = 0.4;

/// One logistic step.
pub fn logistic_step(x: f64, r: f64) -> f64 {
    r * x * (1.0 - x)
}

/// Iterator over successive logistic iterates (excluding the initial value).
#[derive(Debug, Clone)]
pub struct LogisticMap {
    x: f64,
    r: f64,
}

impl LogisticMap {
    /// Start a trajectory at `initial` with the default `r`.
    pub fn new(initial: f64) -> Self {
        Self { x: initial, r: LOGISTIC_R }
    }

    /// Start a trajectory with an explicit growth parameter.
    pub fn with_r(initial: f64, r: f64) -> Self {
        Self { x: initial, r }
    }
}

impl Iterator for LogisticMap {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        self.x = logistic_step(self.x, self.r);
        Some(self.x)
    }
}

/// How each image in a dataset chooses its starting point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialValue {
    /// Every image starts at the same value.
    Fixed(f64),
    /// Each image draws a fresh value uniformly from `(0, 1)`.
    Random,
}

impl Default for InitialValue {
    fn default() -> Self {
        Self::Fixed(FIXED_INITIAL)
    }
}

/// One 28×28 image from the trajectory starting at `initial`.
///
/// `initial` must lie in `[0, 1]`; the map keeps every iterate there.
pub fn logistic_image(initial: f64) -> PseudoImage {
    let pixels = LogisticMap::new(initial)
        .take(IMAGE_PIXELS)
        .map(|x| x.clamp(0.0, 1.0) as f32)
        .collect();
    PseudoImage::from_pixels_unchecked(pixels)
}

/// `count` logistic images. `rng` is only consulted for
/// [`InitialValue::Random`].
pub fn logistic_dataset<R: Rng + ?Sized>(
    count: usize,
    initial: InitialValue,
    rng: &mut R,
) -> Vec<PseudoImage> {
    (0..count)
        .map(|_| match initial {
            InitialValue::Fixed(x0) => logistic_image(x0),
            InitialValue::Random => logistic_image(random_initial(rng)),
        })
        .collect()
}

/// Images whose starting points follow the map itself: image `k + 1` starts
/// one logistic step after image `k`'s starting point.
pub fn chained_images(count: usize, initial: f64) -> Vec<PseudoImage> {
    std::iter::successors(Some(initial), |&x| Some(logistic_step(x, LOGISTIC_R)))
        .take(count)
        .map(logistic_image)
        .collect()
}

/// Quantize `len` iterates starting at `initial` to bytes.
///
/// Each byte is `floor(x · 256)` clamped to 255.
pub fn logistic_bytes(initial: f64, len: usize) -> Vec<u8> {
    LogisticMap::new(initial).take(len).map(|x| (x * 256.0).clamp(0.0, 255.0) as u8).collect()
}

/// Uniform draw from the open interval `(0, 1)`.
///
/// The endpoints are fixed points of the map at zero and would produce
/// constant images.
pub fn random_initial<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(f64::EPSILON..1.0)
}

/// Arnold cat map on the image grid, applied `iterations` times.
///
/// Moves pixel `(x, y)` to `((2x + y) mod N, (x + y) mod N)`. A bijection, so
/// pixel content is preserved while spatial structure is scrambled.
pub fn arnold_cat(image: &PseudoImage, iterations: usize) -> PseudoImage {
    let mut current = image.pixels().to_vec();
    let mut next = vec![0.0f32; IMAGE_PIXELS];

    for _ in 0..iterations {
        for y in 0..IMAGE_SIDE {
            for x in 0..IMAGE_SIDE {
                let nx = (2 * x + y) % IMAGE_SIDE;
                let ny = (x + y) % IMAGE_SIDE;
                next[ny * IMAGE_SIDE + nx] = current[y * IMAGE_SIDE + x];
            }
        }
        std::mem::swap(&mut current, &mut next);
    }

    PseudoImage::from_pixels_unchecked(current)
}
