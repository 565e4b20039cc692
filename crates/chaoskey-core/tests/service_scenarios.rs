//! End-to-end scenarios through the service facade

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use chaoskey_core::{
    CoreKind, CryptoConfig, CryptoService, EncryptionMetadata, EntropySource, ErrorKind,
    GeneratedKeyPair, LatentSource, SeededEnv, ServiceError, TagKeying,
};
use chaoskey_crypto::{BigUint, CryptoError, MODULUS_BITS, PUBLIC_EXPONENT};
use chaoskey_latent::{Encoder, ImageFactory};
use chaoskey_proto::{Container, ContainerError};

const TEST_FLOOR: Duration = Duration::from_millis(20);

fn service(seed: u64, config: CryptoConfig) -> CryptoService<SeededEnv> {
    let latent = LatentSource::new(Arc::new(Encoder::new(seed)), Arc::new(ImageFactory::new()));
    CryptoService::with_latent_source(SeededEnv::new(seed), config, latent)
        .expect("service should start")
}

fn default_service(seed: u64) -> CryptoService<SeededEnv> {
    service(seed, CryptoConfig::default().with_latency_floor(TEST_FLOOR))
}

/// One full-width pair shared by every RSA scenario; generation dominates
/// test time.
fn shared() -> &'static (CryptoService<SeededEnv>, GeneratedKeyPair) {
    static SHARED: OnceLock<(CryptoService<SeededEnv>, GeneratedKeyPair)> = OnceLock::new();
    SHARED.get_or_init(|| {
        let service = default_service(100);
        let pair = service.generate_keypair().expect("key generation should succeed");
        (service, pair)
    })
}

#[test]
fn rsa_hello_world() {
    let (service, pair) = shared();

    assert_eq!(pair.public.n().bits(), MODULUS_BITS);
    assert_eq!(pair.public.e(), &BigUint::from(PUBLIC_EXPONENT));

    let container = service.encrypt_asymmetric(pair, b"hello world").unwrap();
    let decoded = Container::decode(&container).unwrap();
    assert_eq!(&decoded.n, pair.public.n());
    assert_eq!(decoded.timestamp, pair.timestamp.as_bytes());

    let plaintext = service.decrypt_asymmetric(&container, Some(&pair.private)).unwrap();
    assert_eq!(plaintext, b"hello world");
}

#[test]
fn rsa_bit_flip_fails_integrity() {
    let (service, pair) = shared();
    let container = service.encrypt_asymmetric(pair, b"hello world").unwrap();

    // Last byte is inside the tag.
    let mut tampered = container.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;

    let err = service.decrypt_asymmetric(&tampered, Some(&pair.private)).unwrap_err();
    assert_eq!(err, ServiceError::Container(ContainerError::IntegrityCheckFailed));
    assert_eq!(err.kind(), ErrorKind::IntegrityCheckFailed);
    assert!(err.is_client_error());
}

#[test]
fn rsa_missing_private_key() {
    let (service, pair) = shared();
    let container = service.encrypt_asymmetric(pair, b"no key").unwrap();

    let err = service.decrypt_asymmetric(&container, None).unwrap_err();
    assert_eq!(err, ServiceError::MissingPrivateKey);
}

#[test]
fn rsa_rejects_unrepresentable_plaintext() {
    let (service, pair) = shared();

    let empty = service.encrypt_asymmetric(pair, b"").unwrap_err();
    assert_eq!(empty.kind(), ErrorKind::PlaintextOutOfRange);

    let oversized = vec![0xFF; pair.public.size() + 1];
    let err = service.encrypt_asymmetric(pair, &oversized).unwrap_err();
    assert!(matches!(err, ServiceError::Crypto(CryptoError::PlaintextOutOfRange { .. })));
}

#[test]
fn rsa_garbage_is_malformed() {
    let (service, pair) = shared();
    let err = service.decrypt_asymmetric(b"not a container", Some(&pair.private)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedContainer);
}

#[test]
fn stored_rsa_key_round_trip() {
    let (service, _) = shared();
    let key_id = service.create_rsa_key().unwrap();
    assert!(service.list_rsa_keys().contains(&key_id));

    let container = service.encrypt_with_rsa_key(&key_id, b"stored").unwrap();
    assert_eq!(service.decrypt_with_rsa_key(&key_id, &container).unwrap(), b"stored");

    service.delete_rsa_key(&key_id).unwrap();
    let err = service.decrypt_with_rsa_key(&key_id, &container).unwrap_err();
    assert_eq!(err, ServiceError::KeyNotFound(key_id));
}

#[test]
fn symmetric_secret() {
    let service = default_service(1);
    let key_id = service.create_key(32).unwrap();

    let (ciphertext, iv) = service.encrypt_symmetric(&key_id, b"secret", None).unwrap();
    assert_eq!(ciphertext.len(), 16);
    assert_eq!(service.decrypt_symmetric(&key_id, &ciphertext, &iv).unwrap(), b"secret");
}

#[test]
fn symmetric_wrong_iv_never_yields_plaintext() {
    let service = default_service(2);
    let key_id = service.create_key(32).unwrap();
    let (ciphertext, iv) = service.encrypt_symmetric(&key_id, b"secret", None).unwrap();

    let mut wrong = iv;
    wrong[0] ^= 0xFF;
    match service.decrypt_symmetric(&key_id, &ciphertext, &wrong) {
        Ok(plaintext) => assert_ne!(plaintext, b"secret"),
        Err(err) => assert_eq!(err.kind(), ErrorKind::InvalidPadding),
    }

    let err = service.decrypt_symmetric(&key_id, &ciphertext, &iv[..8]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidIvLength);
}

#[test]
fn symmetric_key_lifecycle() {
    let service = default_service(3);

    service.store_key("short", &[7; 16]);
    let err = service.encrypt_symmetric("short", b"x", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidKeyLength);

    let err = service.encrypt_symmetric("absent", b"x", None).unwrap_err();
    assert_eq!(err, ServiceError::KeyNotFound("absent".into()));

    service.store_key("short", &[7; 32]);
    assert!(service.encrypt_symmetric("short", b"x", None).is_ok());

    service.delete_key("short").unwrap();
    assert!(service.list_keys().is_empty());
}

#[test]
fn every_entropy_source_yields_usable_keys() {
    for source in [
        EntropySource::System,
        EntropySource::Logistic,
        EntropySource::Arnold,
        EntropySource::Latent,
    ] {
        let service = service(4, CryptoConfig::default().with_entropy_source(source));
        let key_id = service.create_key(32).unwrap();
        assert_eq!(service.get_key(&key_id).unwrap().len(), 32, "{source}");

        let (ciphertext, iv) = service.encrypt_symmetric(&key_id, b"payload", None).unwrap();
        let plaintext = service.decrypt_symmetric(&key_id, &ciphertext, &iv).unwrap();
        assert_eq!(plaintext, b"payload", "{source}");
    }
}

#[test]
fn retrain_before_encrypt_advances_encoder() {
    let config = CryptoConfig::default()
        .with_retrain(true)
        .with_retrain_schedule(Duration::from_secs(60), 4, 1);
    let service = service(5, config);
    let key_id = service.create_key(32).unwrap();

    service.encrypt_symmetric(&key_id, b"a", None).unwrap();
    assert_eq!(service.encoder().generation(), 1);

    service.encrypt_symmetric(&key_id, b"b", Some(false)).unwrap();
    assert_eq!(service.encoder().generation(), 1);
}

#[test]
fn dispatch_follows_core_and_metadata() {
    let (shared_service, _) = shared();
    let service = default_service(6);
    let key_id = service.create_key(32).unwrap();

    let (ciphertext, metadata) = service.encrypt(&key_id, b"dispatch", None).unwrap();
    assert!(matches!(metadata, EncryptionMetadata::Symmetric { .. }));
    assert_eq!(service.decrypt(&key_id, &ciphertext, &metadata).unwrap(), b"dispatch");

    // Core switch on a service that has already paid for one generation.
    let config = shared_service.config();
    shared_service.reconfigure(config.clone().with_core(CoreKind::Rsa)).unwrap();
    let (container, metadata) = shared_service.encrypt("", b"dispatch", None).unwrap();
    shared_service.reconfigure(config).unwrap();

    let EncryptionMetadata::Rsa { key_id: rsa_key_id } = &metadata else {
        panic!("RSA core should return RSA metadata");
    };
    assert!(shared_service.list_rsa_keys().contains(rsa_key_id));
    assert_eq!(shared_service.decrypt("", &container, &metadata).unwrap(), b"dispatch");
}

#[test]
fn reconfigure_drops_symmetric_keys_and_keeps_encoder() {
    let service = default_service(7);
    let key_id = service.create_key(32).unwrap();
    service.latent_source().fresh_latent(&SeededEnv::new(0)).unwrap();
    let issued = service.latent_source().images().issued();

    service
        .reconfigure(
            CryptoConfig::default()
                .with_entropy_source(EntropySource::Logistic)
                .with_tag_keying(TagKeying::TimestampPrefix),
        )
        .unwrap();

    assert_eq!(service.config().entropy_source, EntropySource::Logistic);
    assert_eq!(service.config().tag_keying, TagKeying::TimestampPrefix);
    assert_eq!(service.get_key(&key_id), Err(ServiceError::KeyNotFound(key_id)));
    assert_eq!(service.latent_source().images().issued(), issued);
}

#[test]
fn unknown_names_are_rejected() {
    let err = "quantum".parse::<EntropySource>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownEntropySource);

    let err = "python".parse::<CoreKind>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownCore);
}
