//! The chaoskey service facade.
//!
//! [`CryptoService`] owns the session state that outlives configuration
//! changes (the environment, the encoder and its used-image set, the RSA key
//! store) and swaps everything configuration-dependent as one
//! [`ServiceComponents`] value. Every operation loads the current components
//! once, so a concurrent [`CryptoService::reconfigure`] never mixes old and
//! new settings within one call.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chaoskey_crypto::{
    IV_SIZE, PRIME_BITS, PrimePool, RsaPrivateKey, SymmetricKey, decrypt_cbc, encrypt_cbc,
};
use chaoskey_latent::{Encoder, ImageFactory};
use chaoskey_proto::encode_container;
use zeroize::Zeroizing;

use crate::{
    config::{CoreKind, CryptoConfig},
    entropy::LatentSource,
    env::Environment,
    error::ServiceError,
    key_manager::{KeyManager, RsaKeyManager},
    keygen::{GeneratedKeyPair, KeyGenerator},
    retrain::{RetrainHandle, RetrainSchedule, fine_tune_round, spawn_retrainer, startup_fit},
    secure::SecureDecryptor,
    system_env::SystemEnv,
};

/// What a caller must hand back to [`CryptoService::decrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionMetadata {
    /// AES-256-CBC under the caller's key
    Symmetric {
        /// CBC initialization vector
        iv: [u8; IV_SIZE],
    },
    /// RSA container under an ephemeral key held by the RSA key store
    Rsa {
        /// RSA key store identifier of the ephemeral key
        key_id: String,
    },
}

/// Everything rebuilt when the configuration changes.
#[derive(Debug)]
pub struct ServiceComponents<E: Environment> {
    config: CryptoConfig,
    keys: KeyManager<E>,
    keygen: KeyGenerator<E>,
    decryptor: SecureDecryptor<E>,
}

impl<E: Environment> ServiceComponents<E> {
    /// Wire a key manager, key generator and decryptor for `config`.
    ///
    /// The key manager starts empty.
    ///
    /// # Errors
    ///
    /// - `Crypto(Pool)` if the prime search pool cannot be started
    pub fn build(
        config: CryptoConfig,
        env: &E,
        latent: &LatentSource,
    ) -> Result<Self, ServiceError> {
        let pool = Arc::new(PrimePool::new(config.prime_workers, PRIME_BITS)?);

        Ok(Self {
            keys: KeyManager::new(env.clone(), config.entropy_source, latent.clone()),
            keygen: KeyGenerator::new(env.clone(), latent.clone(), pool),
            decryptor: SecureDecryptor::new(env.clone(), config.tag_keying, config.latency_floor()),
            config,
        })
    }

    /// Configuration these components were built from.
    pub fn config(&self) -> &CryptoConfig {
        &self.config
    }

    /// Symmetric key store.
    pub fn keys(&self) -> &KeyManager<E> {
        &self.keys
    }

    /// Key generation pipeline.
    pub fn keygen(&self) -> &KeyGenerator<E> {
        &self.keygen
    }

    /// Secure decrypt.
    pub fn decryptor(&self) -> &SecureDecryptor<E> {
        &self.decryptor
    }
}

/// chaoskey service.
///
/// All methods take `&self` and are safe to call from many threads. Key
/// generation and decryption block; call them from blocking contexts when
/// running inside an async runtime.
pub struct CryptoService<E: Environment = SystemEnv> {
    env: E,
    latent: LatentSource,
    components: ArcSwap<ServiceComponents<E>>,
    rsa_keys: RsaKeyManager<E>,
}

impl<E: Environment> CryptoService<E> {
    /// Start a service: initialize the encoder, run the startup fit, wire
    /// components for `config`.
    ///
    /// The startup fit is skipped when `startup_images` or `startup_epochs`
    /// is zero.
    pub fn new(env: E, config: CryptoConfig) -> Result<Self, ServiceError> {
        let seed = config.encoder_seed.unwrap_or_else(|| env.random_u64());
        let encoder = Arc::new(Encoder::new(seed));

        if config.startup_images > 0 && config.startup_epochs > 0 {
            let report =
                startup_fit(&encoder, &env, config.startup_images, config.startup_epochs)?;
            tracing::info!(
                samples = report.samples,
                epochs = report.epochs,
                final_mse = report.final_mse,
                duration_ms = report.duration.as_millis() as u64,
                "startup training complete"
            );
        }

        let latent = LatentSource::new(encoder, Arc::new(ImageFactory::new()));
        Self::with_latent_source(env, config, latent)
    }

    /// Service around an existing encoder and used-image set.
    pub fn with_latent_source(
        env: E,
        config: CryptoConfig,
        latent: LatentSource,
    ) -> Result<Self, ServiceError> {
        let components = ServiceComponents::build(config, &env, &latent)?;
        tracing::info!(
            core = %components.config.core,
            entropy_source = %components.config.entropy_source,
            "crypto service configured"
        );

        Ok(Self {
            rsa_keys: RsaKeyManager::new(env.clone()),
            components: ArcSwap::from_pointee(components),
            latent,
            env,
        })
    }

    /// Current configuration.
    pub fn config(&self) -> CryptoConfig {
        self.components.load().config.clone()
    }

    /// Replace the configuration.
    ///
    /// Rebuilds the symmetric key manager (dropping its keys), key generator
    /// and decryptor. The encoder, used-image set and RSA key store carry
    /// over. Calls already in flight finish under the old components.
    pub fn reconfigure(&self, config: CryptoConfig) -> Result<(), ServiceError> {
        let components = ServiceComponents::build(config, &self.env, &self.latent)?;
        tracing::info!(
            core = %components.config.core,
            entropy_source = %components.config.entropy_source,
            "crypto service reconfigured"
        );
        self.components.store(Arc::new(components));
        Ok(())
    }

    /// Session encoder.
    pub fn encoder(&self) -> &Arc<Encoder> {
        self.latent.encoder()
    }

    /// Encoder plus used-image set.
    pub fn latent_source(&self) -> &LatentSource {
        &self.latent
    }

    /// Spawn the background fine-tune loop using the current configuration's
    /// schedule.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn_retrainer(&self) -> RetrainHandle {
        let components = self.components.load();
        let config = &components.config;
        let schedule = RetrainSchedule {
            interval: config.retrain_interval(),
            images: config.retrain_images,
            epochs: config.retrain_epochs,
        };
        spawn_retrainer(Arc::clone(self.latent.encoder()), self.env.clone(), schedule)
    }

    /// Generate an RSA key pair from a fresh latent vector.
    pub fn generate_keypair(&self) -> Result<GeneratedKeyPair, ServiceError> {
        self.components.load_full().keygen.generate()
    }

    /// Raw-RSA encrypt under `pair` and pack the result into a container.
    ///
    /// # Errors
    ///
    /// - `Crypto(PlaintextOutOfRange)` if the plaintext is empty, starts with
    ///   a zero byte, or is not below the modulus
    pub fn encrypt_asymmetric(
        &self,
        pair: &GeneratedKeyPair,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, ServiceError> {
        let keying = self.components.load().config.tag_keying;
        let ciphertext = pair.public.encrypt_raw(plaintext)?;

        let container = encode_container(
            pair.public.n(),
            pair.public.e(),
            &ciphertext,
            pair.timestamp.as_bytes(),
            &pair.system_entropy,
            keying,
        )?;
        tracing::debug!(len = container.len(), "sealed RSA container");
        Ok(container)
    }

    /// Verify and decrypt a container. See [`SecureDecryptor::decrypt`].
    pub fn decrypt_asymmetric(
        &self,
        container: &[u8],
        private_key: Option<&RsaPrivateKey>,
    ) -> Result<Vec<u8>, ServiceError> {
        self.components.load_full().decryptor.decrypt(container, private_key)
    }

    /// AES-256-CBC encrypt under the stored key `key_id` with a fresh IV.
    ///
    /// `retrain` overrides the configured retrain-on-encrypt default; when
    /// set, one fine-tune round runs before encrypting.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound` if no key is stored under `key_id`
    /// - `Crypto(InvalidKeyLength)` if the stored key is not 32 bytes
    /// - `Latent` if the fine-tune round failed
    pub fn encrypt_symmetric(
        &self,
        key_id: &str,
        plaintext: &[u8],
        retrain: Option<bool>,
    ) -> Result<(Vec<u8>, [u8; IV_SIZE]), ServiceError> {
        let components = self.components.load_full();
        let key = SymmetricKey::from_slice(&components.keys.get(key_id)?)?;

        if retrain.unwrap_or(components.config.retrain_on_encrypt) {
            let config = &components.config;
            let report = fine_tune_round(
                self.latent.encoder(),
                &self.env,
                config.retrain_images,
                config.retrain_epochs,
            )?;
            tracing::debug!(generation = report.generation, "retrained before encrypt");
        }

        let mut iv = [0u8; IV_SIZE];
        self.env.random_bytes(&mut iv);
        Ok((encrypt_cbc(&key, &iv, plaintext), iv))
    }

    /// AES-256-CBC decrypt under the stored key `key_id`.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound` if no key is stored under `key_id`
    /// - `Crypto(InvalidIvLength)` if `iv` is not 16 bytes
    /// - `Crypto(InvalidPadding)` if the ciphertext does not unpad
    pub fn decrypt_symmetric(
        &self,
        key_id: &str,
        ciphertext: &[u8],
        iv: &[u8],
    ) -> Result<Vec<u8>, ServiceError> {
        let key = SymmetricKey::from_slice(&self.components.load().keys.get(key_id)?)?;
        Ok(decrypt_cbc(&key, iv, ciphertext)?)
    }

    /// Create a symmetric key of `len` bytes from the configured source.
    pub fn create_key(&self, len: usize) -> Result<String, ServiceError> {
        self.components.load_full().keys.create(len)
    }

    /// Insert or replace a symmetric key.
    pub fn store_key(&self, key_id: &str, key: &[u8]) {
        self.components.load().keys.store(key_id, key);
    }

    /// Symmetric key bytes.
    pub fn get_key(&self, key_id: &str) -> Result<Zeroizing<Vec<u8>>, ServiceError> {
        self.components.load().keys.get(key_id)
    }

    /// Remove a symmetric key.
    pub fn delete_key(&self, key_id: &str) -> Result<(), ServiceError> {
        self.components.load().keys.delete(key_id)
    }

    /// Symmetric key identifiers, sorted.
    pub fn list_keys(&self) -> Vec<String> {
        self.components.load().keys.list()
    }

    /// Generate an RSA key pair and keep it in the RSA key store.
    pub fn create_rsa_key(&self) -> Result<String, ServiceError> {
        let pair = self.generate_keypair()?;
        Ok(self.rsa_keys.insert(pair))
    }

    /// RSA key pair stored under `key_id`.
    pub fn rsa_key(&self, key_id: &str) -> Result<Arc<GeneratedKeyPair>, ServiceError> {
        self.rsa_keys.get(key_id)
    }

    /// Remove an RSA key pair.
    pub fn delete_rsa_key(&self, key_id: &str) -> Result<(), ServiceError> {
        self.rsa_keys.delete(key_id)
    }

    /// RSA key identifiers, sorted.
    pub fn list_rsa_keys(&self) -> Vec<String> {
        self.rsa_keys.list()
    }

    /// Encrypt under a stored RSA key.
    pub fn encrypt_with_rsa_key(
        &self,
        key_id: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, ServiceError> {
        let pair = self.rsa_keys.get(key_id)?;
        self.encrypt_asymmetric(&pair, plaintext)
    }

    /// Decrypt a container under a stored RSA key.
    pub fn decrypt_with_rsa_key(
        &self,
        key_id: &str,
        container: &[u8],
    ) -> Result<Vec<u8>, ServiceError> {
        let pair = self.rsa_keys.get(key_id)?;
        self.decrypt_asymmetric(container, Some(&pair.private))
    }

    /// Encrypt with the configured core.
    ///
    /// The symmetric core encrypts under `key_id`. The RSA core ignores
    /// `key_id` and `retrain`, generates an ephemeral key pair, stores it in
    /// the RSA key store and returns its identifier in the metadata.
    pub fn encrypt(
        &self,
        key_id: &str,
        plaintext: &[u8],
        retrain: Option<bool>,
    ) -> Result<(Vec<u8>, EncryptionMetadata), ServiceError> {
        match self.components.load().config.core {
            CoreKind::Symmetric => {
                let (ciphertext, iv) = self.encrypt_symmetric(key_id, plaintext, retrain)?;
                Ok((ciphertext, EncryptionMetadata::Symmetric { iv }))
            },
            CoreKind::Rsa => {
                let pair = self.generate_keypair()?;
                let container = self.encrypt_asymmetric(&pair, plaintext)?;
                let key_id = self.rsa_keys.insert(pair);
                Ok((container, EncryptionMetadata::Rsa { key_id }))
            },
        }
    }

    /// Decrypt output of [`CryptoService::encrypt`].
    ///
    /// Follows the core recorded in `metadata`, so ciphertext produced before
    /// a core switch still decrypts.
    pub fn decrypt(
        &self,
        key_id: &str,
        payload: &[u8],
        metadata: &EncryptionMetadata,
    ) -> Result<Vec<u8>, ServiceError> {
        match metadata {
            EncryptionMetadata::Symmetric { iv } => self.decrypt_symmetric(key_id, payload, iv),
            EncryptionMetadata::Rsa { key_id: rsa_key_id } => {
                self.decrypt_with_rsa_key(rsa_key_id, payload)
            },
        }
    }
}

impl<E: Environment> std::fmt::Debug for CryptoService<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoService")
            .field("config", &self.components.load().config)
            .field("encoder_generation", &self.latent.encoder().generation())
            .field("rsa_keys", &self.rsa_keys.len())
            .finish_non_exhaustive()
    }
}
