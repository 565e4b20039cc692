//! Entropy sources for symmetric key material.
//!
//! ```text
//! System   : OS RNG ─────────────────────────────────► bytes
//! Logistic : OS RNG → x0 → trajectory → quantize ─────► bytes
//! Arnold   : OS RNG → x0 → image → cat map → quantize ► bytes
//! Latent   : image → encoder → HKDF(salt = OS RNG) ───► bytes
//! ```
//!
//! Only `System` and `Latent` are suitable for production keys; the chaotic
//! sources are deterministic in their starting point and exist for
//! experimentation.

use std::{fmt, str::FromStr, sync::Arc};

use chaoskey_crypto::{SALT_SIZE, expand_key_material};
use chaoskey_latent::{
    Encoder, IMAGE_PIXELS, ImageFactory, LatentVector, arnold_cat, logistic_bytes, logistic_image,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{env::Environment, error::ServiceError};

/// Cat-map rounds applied by [`EntropySource::Arnold`].
pub const ARNOLD_ITERATIONS: usize = 3;

const LATENT_INFO: &[u8] = b"chaoskey symmetric key";

/// Where symmetric key bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntropySource {
    /// OS cryptographic RNG
    #[default]
    System,
    /// Quantized logistic-map trajectory from a random starting point
    Logistic,
    /// Arnold cat map over logistic images
    Arnold,
    /// HKDF over a fresh latent vector
    Latent,
}

impl EntropySource {
    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Logistic => "logistic",
            Self::Arnold => "arnold",
            Self::Latent => "latent",
        }
    }

    /// Draw `len` bytes from this source.
    ///
    /// # Errors
    ///
    /// - `Latent` if no unused image could be drawn (latent source only)
    /// - `Crypto(KeyMaterialTooLong)` if `len` exceeds the HKDF limit
    ///   (latent source only)
    pub fn draw<E: Environment>(
        self,
        len: usize,
        env: &E,
        latent: &LatentSource,
    ) -> Result<Zeroizing<Vec<u8>>, ServiceError> {
        let bytes = match self {
            Self::System => {
                let mut bytes = Zeroizing::new(vec![0u8; len]);
                env.random_bytes(&mut bytes);
                bytes
            },
            Self::Logistic => Zeroizing::new(logistic_bytes(unit_interval(env.random_u64()), len)),
            Self::Arnold => arnold_bytes(len, env),
            Self::Latent => {
                let vector = latent.fresh_latent(env)?;
                let mut salt = [0u8; SALT_SIZE];
                env.random_bytes(&mut salt);
                expand_key_material(&vector.to_bytes(), &salt, LATENT_INFO, len)?
            },
        };

        tracing::debug!(source = self.as_str(), len, "drew key material");
        Ok(bytes)
    }
}

impl fmt::Display for EntropySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntropySource {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "logistic" => Ok(Self::Logistic),
            "arnold" => Ok(Self::Arnold),
            "latent" => Ok(Self::Latent),
            other => Err(ServiceError::UnknownEntropySource(other.to_string())),
        }
    }
}

/// Map 64 random bits into the open interval `(0, 1)`.
fn unit_interval(bits: u64) -> f64 {
    ((bits >> 11) as f64 + 0.5) / (1u64 << 53) as f64
}

fn arnold_bytes<E: Environment>(len: usize, env: &E) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(len));
    while out.len() < len {
        let seed_image = logistic_image(unit_interval(env.random_u64()));
        let image = arnold_cat(&seed_image, ARNOLD_ITERATIONS);
        let take = (len - out.len()).min(IMAGE_PIXELS);
        out.extend(image.pixels()[..take].iter().map(|p| (p * 256.0).clamp(0.0, 255.0) as u8));
    }
    out
}

/// Session encoder plus the used-image set, shared by key generation and the
/// latent entropy source.
#[derive(Debug, Clone)]
pub struct LatentSource {
    encoder: Arc<Encoder>,
    images: Arc<ImageFactory>,
}

impl LatentSource {
    /// Wrap an encoder and image factory.
    pub fn new(encoder: Arc<Encoder>, images: Arc<ImageFactory>) -> Self {
        Self { encoder, images }
    }

    /// Session encoder.
    pub fn encoder(&self) -> &Arc<Encoder> {
        &self.encoder
    }

    /// Used-image set.
    pub fn images(&self) -> &Arc<ImageFactory> {
        &self.images
    }

    /// Encode one never-before-issued uniform image.
    pub fn fresh_latent<E: Environment>(&self, env: &E) -> Result<LatentVector, ServiceError> {
        let image = self.images.fresh_uniform(|buf| env.random_bytes(buf))?;
        Ok(self.encoder.encode(&image))
    }
}
