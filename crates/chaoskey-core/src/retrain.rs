//! Encoder training: the startup fit and the background fine-tune loop.
//!
//! Training never blocks encoding. Each round trains a private copy of the
//! weights on a blocking thread and publishes it with one atomic swap (see
//! [`Encoder::fit`]). The loop only checks for shutdown between rounds; a
//! round in progress always runs to completion.

use std::{sync::Arc, time::Duration};

use chaoskey_latent::{
    Encoder, InitialValue, LatentError, TrainingOptions, TrainingReport, logistic_dataset,
};
use rand_chacha::{ChaCha20Rng, rand_core::SeedableRng};
use tokio::{sync::watch, task::JoinHandle};

use crate::env::Environment;

/// Fine-tune schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrainSchedule {
    /// Delay between the end of one round and the start of the next
    pub interval: Duration,
    /// Logistic images per round
    pub images: usize,
    /// Epochs per round
    pub epochs: usize,
}

/// Full-network fit on a fresh logistic dataset with random starting points.
pub fn startup_fit<E: Environment>(
    encoder: &Encoder,
    env: &E,
    images: usize,
    epochs: usize,
) -> Result<TrainingReport, LatentError> {
    let mut rng = ChaCha20Rng::seed_from_u64(env.random_u64());
    let dataset = logistic_dataset(images, InitialValue::Random, &mut rng);
    let options =
        TrainingOptions { shuffle_seed: env.random_u64(), ..TrainingOptions::startup(epochs) };
    encoder.fit(&dataset, &options)
}

/// One fine-tune round: first layer frozen, fresh logistic dataset.
pub fn fine_tune_round<E: Environment>(
    encoder: &Encoder,
    env: &E,
    images: usize,
    epochs: usize,
) -> Result<TrainingReport, LatentError> {
    let mut rng = ChaCha20Rng::seed_from_u64(env.random_u64());
    let dataset = logistic_dataset(images, InitialValue::Random, &mut rng);
    let options =
        TrainingOptions { shuffle_seed: env.random_u64(), ..TrainingOptions::fine_tune(epochs) };
    encoder.fit(&dataset, &options)
}

/// Handle to a running background retrainer.
///
/// Dropping the handle stops the loop after the current round without
/// waiting for it.
#[derive(Debug)]
pub struct RetrainHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RetrainHandle {
    /// Stop the loop and wait for any round in progress to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "retrainer task failed");
        }
    }

    /// True once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn the fine-tune loop on the current tokio runtime.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn_retrainer<E: Environment>(
    encoder: Arc<Encoder>,
    env: E,
    schedule: RetrainSchedule,
) -> RetrainHandle {
    let (shutdown, mut stop) = watch::channel(false);

    let task = tokio::spawn(async move {
        tracing::info!(interval_ms = schedule.interval.as_millis() as u64, "retrainer started");
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                () = tokio::time::sleep(schedule.interval) => {},
            }

            let round_encoder = Arc::clone(&encoder);
            let round_env = env.clone();
            let round = tokio::task::spawn_blocking(move || {
                fine_tune_round(&round_encoder, &round_env, schedule.images, schedule.epochs)
            })
            .await;

            match round {
                Ok(Ok(report)) => tracing::info!(
                    generation = report.generation,
                    final_mse = report.final_mse,
                    duration_ms = report.duration.as_millis() as u64,
                    "fine-tune round complete"
                ),
                Ok(Err(err)) => tracing::error!(error = %err, "fine-tune round failed"),
                Err(err) => tracing::error!(error = %err, "fine-tune task panicked"),
            }

            if *stop.borrow() {
                break;
            }
        }
        tracing::info!("retrainer stopped");
    });

    RetrainHandle { shutdown, task }
}
