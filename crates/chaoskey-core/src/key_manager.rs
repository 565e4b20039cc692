//! In-memory stores for symmetric keys and RSA key pairs.
//!
//! Both stores sit behind one coarse `Mutex` each. Operations are short map
//! lookups and inserts; key material is drawn before the lock is taken, so
//! no entropy source or encoder call runs under the lock.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chaoskey_crypto::{RsaPrivateKey, RsaPublicKey, SYSTEM_ENTROPY_SIZE};
use zeroize::Zeroizing;

use crate::{
    entropy::{EntropySource, LatentSource},
    env::Environment,
    error::ServiceError,
    keygen::GeneratedKeyPair,
};

/// Fresh UUID v4 identifier drawn from the environment's RNG.
pub fn new_key_id<E: Environment>(env: &E) -> String {
    let mut bytes = [0u8; 16];
    env.random_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
}

/// Symmetric key store.
///
/// # Invariants
///
/// - Identifiers are unique UUID v4 strings
/// - Key bytes are zeroized when overwritten, deleted or dropped
pub struct KeyManager<E: Environment> {
    env: E,
    source: EntropySource,
    latent: LatentSource,
    keys: Mutex<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl<E: Environment> KeyManager<E> {
    /// Empty store drawing new keys from `source`.
    pub fn new(env: E, source: EntropySource, latent: LatentSource) -> Self {
        Self { env, source, latent, keys: Mutex::new(HashMap::new()) }
    }

    /// Entropy source used by [`KeyManager::create`].
    pub fn source(&self) -> EntropySource {
        self.source
    }

    /// Generate a `len`-byte key and store it under a fresh identifier.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn create(&self, len: usize) -> Result<String, ServiceError> {
        let key = self.source.draw(len, &self.env, &self.latent)?;

        let mut keys = self.keys.lock().expect("Mutex poisoned");
        let id = loop {
            let candidate = new_key_id(&self.env);
            if !keys.contains_key(&candidate) {
                break candidate;
            }
        };
        keys.insert(id.clone(), key);
        drop(keys);

        tracing::info!(key_id = %id, len, source = %self.source, "created symmetric key");
        Ok(id)
    }

    /// Insert or replace the key stored under `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn store(&self, id: &str, key: &[u8]) {
        let replaced = self
            .keys
            .lock()
            .expect("Mutex poisoned")
            .insert(id.to_string(), Zeroizing::new(key.to_vec()))
            .is_some();
        tracing::debug!(key_id = %id, len = key.len(), replaced, "stored symmetric key");
    }

    /// Copy of the key stored under `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn get(&self, id: &str) -> Result<Zeroizing<Vec<u8>>, ServiceError> {
        self.keys
            .lock()
            .expect("Mutex poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::KeyNotFound(id.to_string()))
    }

    /// Remove the key stored under `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn delete(&self, id: &str) -> Result<(), ServiceError> {
        if self.keys.lock().expect("Mutex poisoned").remove(id).is_none() {
            return Err(ServiceError::KeyNotFound(id.to_string()));
        }
        tracing::info!(key_id = %id, "deleted symmetric key");
        Ok(())
    }

    /// Stored identifiers, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> =
            self.keys.lock().expect("Mutex poisoned").keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of stored keys.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        self.keys.lock().expect("Mutex poisoned").len()
    }

    /// True if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Environment> std::fmt::Debug for KeyManager<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("source", &self.source)
            .field("keys", &self.len())
            .finish_non_exhaustive()
    }
}

/// RSA key pair store.
///
/// Records are immutable once stored and handed out behind `Arc`, so a
/// decrypt in flight keeps its key even if the record is deleted.
#[derive(Debug)]
pub struct RsaKeyManager<E: Environment> {
    env: E,
    keys: Mutex<HashMap<String, Arc<GeneratedKeyPair>>>,
}

impl<E: Environment> RsaKeyManager<E> {
    /// Empty store.
    pub fn new(env: E) -> Self {
        Self { env, keys: Mutex::new(HashMap::new()) }
    }

    /// Take ownership of a key pair and its generation metadata.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn create(
        &self,
        private: RsaPrivateKey,
        public: RsaPublicKey,
        system_entropy: [u8; SYSTEM_ENTROPY_SIZE],
        timestamp: String,
    ) -> String {
        let record = Arc::new(GeneratedKeyPair { private, public, system_entropy, timestamp });

        let mut keys = self.keys.lock().expect("Mutex poisoned");
        let id = loop {
            let candidate = new_key_id(&self.env);
            if !keys.contains_key(&candidate) {
                break candidate;
            }
        };
        keys.insert(id.clone(), record);
        drop(keys);

        tracing::info!(key_id = %id, "stored RSA key pair");
        id
    }

    /// Store an already generated pair.
    pub fn insert(&self, pair: GeneratedKeyPair) -> String {
        let GeneratedKeyPair { private, public, system_entropy, timestamp } = pair;
        self.create(private, public, system_entropy, timestamp)
    }

    /// Record stored under `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn get(&self, id: &str) -> Result<Arc<GeneratedKeyPair>, ServiceError> {
        self.keys
            .lock()
            .expect("Mutex poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::KeyNotFound(id.to_string()))
    }

    /// Remove the record stored under `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn delete(&self, id: &str) -> Result<(), ServiceError> {
        if self.keys.lock().expect("Mutex poisoned").remove(id).is_none() {
            return Err(ServiceError::KeyNotFound(id.to_string()));
        }
        tracing::info!(key_id = %id, "deleted RSA key pair");
        Ok(())
    }

    /// Stored identifiers, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> =
            self.keys.lock().expect("Mutex poisoned").keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of stored pairs.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        self.keys.lock().expect("Mutex poisoned").len()
    }

    /// True if no pairs are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use chaoskey_crypto::{RsaPrivateKey, prime_from_seed};
    use chaoskey_latent::{Encoder, ImageFactory};

    use super::*;
    use crate::seeded_env::SeededEnv;

    fn manager(source: EntropySource) -> KeyManager<SeededEnv> {
        let latent = LatentSource::new(Arc::new(Encoder::new(0)), Arc::new(ImageFactory::new()));
        KeyManager::new(SeededEnv::new(1), source, latent)
    }

    fn small_pair(seed: u8) -> GeneratedKeyPair {
        let p = prime_from_seed(&[seed; 32], 256).unwrap();
        let q = prime_from_seed(&[seed + 1; 32], 256).unwrap();
        let private = RsaPrivateKey::from_primes(p, q).unwrap();
        let public = private.to_public_key();
        GeneratedKeyPair {
            private,
            public,
            system_entropy: [seed; SYSTEM_ENTROPY_SIZE],
            timestamp: "2025-01-01T00:00:00.000000".into(),
        }
    }

    #[test]
    fn key_ids_are_uuid_v4() {
        let id = new_key_id(&SeededEnv::new(0));
        let parsed = uuid::Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn create_get_delete() {
        let keys = manager(EntropySource::System);
        let id = keys.create(32).unwrap();

        assert_eq!(keys.get(&id).unwrap().len(), 32);
        assert_eq!(keys.list(), vec![id.clone()]);

        keys.delete(&id).unwrap();
        assert_eq!(keys.get(&id), Err(ServiceError::KeyNotFound(id.clone())));
        assert_eq!(keys.delete(&id), Err(ServiceError::KeyNotFound(id)));
        assert!(keys.is_empty());
    }

    #[test]
    fn store_upserts() {
        let keys = manager(EntropySource::System);
        keys.store("fixed", &[1; 32]);
        keys.store("fixed", &[2; 16]);

        assert_eq!(*keys.get("fixed").unwrap(), vec![2; 16]);
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn create_uses_configured_source() {
        let keys = manager(EntropySource::Latent);
        keys.create(32).unwrap();
        assert_eq!(keys.latent.images().issued(), 1);
        assert_eq!(keys.source(), EntropySource::Latent);
    }

    #[test]
    fn concurrent_creates_lose_nothing() {
        let keys = Arc::new(manager(EntropySource::System));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let keys = Arc::clone(&keys);
                thread::spawn(move || {
                    (0..25).map(|_| keys.create(32).unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut created: Vec<String> =
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        created.sort_unstable();
        created.dedup();

        assert_eq!(created.len(), 200);
        assert_eq!(keys.list(), created);
    }

    #[test]
    fn rsa_store_lifecycle() {
        let store = RsaKeyManager::new(SeededEnv::new(2));
        let pair = small_pair(1);
        let n = pair.public.n().clone();

        let id = store.insert(pair);
        assert_eq!(store.get(&id).unwrap().public.n(), &n);
        assert_eq!(store.list(), vec![id.clone()]);
        assert_eq!(store.len(), 1);

        let held = store.get(&id).unwrap();
        store.delete(&id).unwrap();
        assert_eq!(held.public.n(), &n);
        assert!(matches!(store.get(&id), Err(ServiceError::KeyNotFound(_))));
        assert!(store.is_empty());
    }
}
