//! chaoskey command-line driver.
//!
//! # Usage
//!
//! ```bash
//! # RSA and AES round trips with default settings
//! chaoskey demo
//!
//! # Three key pairs, skipping the startup fit
//! chaoskey --startup-images 0 keygen --count 3
//!
//! # 16 key generations, 4 at a time
//! chaoskey bench --count 16 --concurrency 4
//!
//! # Keep fine-tuning the encoder in the background until Ctrl-C
//! chaoskey --retrain-interval-secs 30 serve
//! ```

#![allow(clippy::print_stdout, reason = "command output goes to stdout")]

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chaoskey_core::{
    CoreKind, CryptoConfig, CryptoService, EncryptionMetadata, EntropySource, SystemEnv,
    TagKeying,
};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// chaoskey crypto service
#[derive(Parser, Debug)]
#[command(name = "chaoskey")]
#[command(about = "Chaos-seeded RSA and AES key generation and encryption")]
#[command(version)]
struct Args {
    /// Engine used by the dispatching encrypt/decrypt
    #[arg(long, value_enum, default_value_t = CoreArg::Aes)]
    core: CoreArg,

    /// Source of symmetric key bytes (system, logistic, arnold, latent)
    #[arg(long, default_value = "system")]
    entropy_source: EntropySource,

    /// Which container field keys the integrity tag
    #[arg(long, value_enum, default_value_t = KeyingArg::Entropy)]
    tag_keying: KeyingArg,

    /// Minimum duration of an RSA decrypt past the integrity gate
    #[arg(long, default_value = "100")]
    latency_floor_ms: u64,

    /// Prime search workers
    #[arg(long, default_value = "2")]
    prime_workers: usize,

    /// Logistic images in the startup training set (0 skips the fit)
    #[arg(long, default_value = "1000")]
    startup_images: usize,

    /// Startup training epochs
    #[arg(long, default_value = "3")]
    startup_epochs: usize,

    /// Fine-tune the encoder before every symmetric encrypt
    #[arg(long)]
    retrain_on_encrypt: bool,

    /// Seconds between background fine-tune rounds
    #[arg(long, default_value = "300")]
    retrain_interval_secs: u64,

    /// Fixed encoder initialization seed
    #[arg(long)]
    encoder_seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an RSA and a symmetric round trip
    Demo {
        /// Message for the RSA round trip
        #[arg(long, default_value = "hello world")]
        rsa_message: String,

        /// Message for the symmetric round trip
        #[arg(long, default_value = "secret")]
        aes_message: String,
    },
    /// Generate RSA key pairs and print their public parts
    Keygen {
        /// Number of key pairs
        #[arg(short, long, default_value = "1")]
        count: usize,
    },
    /// Time concurrent key generation
    Bench {
        /// Total key generations
        #[arg(short, long, default_value = "8")]
        count: usize,

        /// Generations in flight at once
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
    /// Run the background retrainer until interrupted
    Serve,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CoreArg {
    Aes,
    Rsa,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KeyingArg {
    Entropy,
    TimestampPrefix,
}

impl Args {
    fn config(&self) -> CryptoConfig {
        let core = match self.core {
            CoreArg::Aes => CoreKind::Symmetric,
            CoreArg::Rsa => CoreKind::Rsa,
        };
        let keying = match self.tag_keying {
            KeyingArg::Entropy => TagKeying::Entropy,
            KeyingArg::TimestampPrefix => TagKeying::TimestampPrefix,
        };

        let mut config = CryptoConfig::default()
            .with_core(core)
            .with_entropy_source(self.entropy_source)
            .with_tag_keying(keying)
            .with_retrain(self.retrain_on_encrypt)
            .with_latency_floor(Duration::from_millis(self.latency_floor_ms))
            .with_startup_training(self.startup_images, self.startup_epochs);
        config.prime_workers = self.prime_workers;
        config.retrain_interval_secs = self.retrain_interval_secs;
        config.encoder_seed = self.encoder_seed;
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = args.config();
    tracing::info!(
        core = %config.core,
        entropy_source = %config.entropy_source,
        "chaoskey starting"
    );

    let service = tokio::task::spawn_blocking(move || CryptoService::new(SystemEnv::new(), config))
        .await??;
    let service = Arc::new(service);

    match args.command {
        Command::Demo { rsa_message, aes_message } => {
            tokio::task::spawn_blocking(move || demo(&service, &rsa_message, &aes_message))
                .await??;
        },
        Command::Keygen { count } => {
            tokio::task::spawn_blocking(move || keygen(&service, count)).await??;
        },
        Command::Bench { count, concurrency } => bench(service, count, concurrency).await?,
        Command::Serve => serve(&service).await?,
    }

    Ok(())
}

fn demo(
    service: &CryptoService,
    rsa_message: &str,
    aes_message: &str,
) -> Result<(), chaoskey_core::ServiceError> {
    let pair = service.generate_keypair()?;
    let container = service.encrypt_asymmetric(&pair, rsa_message.as_bytes())?;
    let started = Instant::now();
    let recovered = service.decrypt_asymmetric(&container, Some(&pair.private))?;
    println!("rsa modulus bits: {}", pair.public.n().bits());
    println!("rsa container:    {} bytes", container.len());
    println!("rsa decrypted:    {}", String::from_utf8_lossy(&recovered));
    println!("rsa decrypt time: {:?}", started.elapsed());

    let key_id = service.create_key(32)?;
    let (ciphertext, iv) = service.encrypt_symmetric(&key_id, aes_message.as_bytes(), None)?;
    let recovered = service.decrypt_symmetric(&key_id, &ciphertext, &iv)?;
    println!("aes key id:       {key_id}");
    println!("aes iv:           {}", hex::encode(iv));
    println!("aes ciphertext:   {}", hex::encode(&ciphertext));
    println!("aes decrypted:    {}", String::from_utf8_lossy(&recovered));

    let (payload, metadata) = service.encrypt(&key_id, aes_message.as_bytes(), None)?;
    let recovered = service.decrypt(&key_id, &payload, &metadata)?;
    let core = match metadata {
        EncryptionMetadata::Symmetric { .. } => "aes",
        EncryptionMetadata::Rsa { .. } => "rsa",
    };
    println!("dispatch ({core}):   {}", String::from_utf8_lossy(&recovered));
    Ok(())
}

fn keygen(service: &CryptoService, count: usize) -> Result<(), chaoskey_core::ServiceError> {
    for _ in 0..count {
        let key_id = service.create_rsa_key()?;
        let pair = service.rsa_key(&key_id)?;
        println!("{key_id}");
        println!("  generated: {}", pair.timestamp);
        println!("  n ({} bits): {}", pair.public.n().bits(), pair.public.n().to_str_radix(16));
        println!("  e: {}", pair.public.e());
    }
    Ok(())
}

async fn bench(
    service: Arc<CryptoService>,
    count: usize,
    concurrency: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let started = Instant::now();

    for _ in 0..count {
        let permit = Arc::clone(&permits).acquire_owned().await?;
        let service = Arc::clone(&service);
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let started = Instant::now();
            service.generate_keypair().map(|_| started.elapsed())
        });
    }

    let mut timings = Vec::with_capacity(count);
    while let Some(joined) = tasks.join_next().await {
        timings.push(joined??);
    }
    let total = started.elapsed();

    timings.sort_unstable();
    let mean = timings.iter().sum::<Duration>() / count.max(1) as u32;
    println!("key generations: {count} ({concurrency} in flight)");
    println!("total:           {total:?}");
    println!("mean:            {mean:?}");
    if let (Some(min), Some(max)) = (timings.first(), timings.last()) {
        println!("min / max:       {min:?} / {max:?}");
    }
    println!("throughput:      {:.2} keys/s", count as f64 / total.as_secs_f64());
    Ok(())
}

async fn serve(service: &CryptoService) -> Result<(), Box<dyn std::error::Error>> {
    let handle = service.spawn_retrainer();
    tracing::info!("retrainer running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down after the current round");
    handle.shutdown().await;
    Ok(())
}
