use crate::configuration::Configuration;
use crate::dispatcher::{BatchReport, Dispatcher};
use crate::repository::PostgresStore;
use crate::startup::{build_dispatcher, get_connection_pool};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::time::Duration;

const MAX_BACKOFF_SECS: u64 = 60;

/// What the loop should do after one cycle.
#[derive(Debug, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Wait for the next daily trigger.
    BatchDelivered,
    /// A campaign was closed without sending, so the next one can start right away.
    CampaignClosed,
    EmptyQueue,
}

impl From<&BatchReport> for ExecutionOutcome {
    fn from(report: &BatchReport) -> Self {
        match report.campaign_id {
            None => Self::EmptyQueue,
            Some(_) if report.sent + report.failed + report.remaining == 0 => Self::CampaignClosed,
            Some(_) => Self::BatchDelivered,
        }
    }
}

pub async fn run_worker_until_stopped(config: Configuration) -> Result<(), anyhow::Error> {
    let connection_pool = get_connection_pool(&config.database);
    let store = Arc::new(PostgresStore::new(connection_pool));
    let dispatcher = build_dispatcher(&config, store)?;
    worker_loop(dispatcher).await
}

async fn worker_loop(dispatcher: Dispatcher) -> Result<(), anyhow::Error> {
    let cadence = dispatcher.settings().daily_trigger();
    let mut rng = StdRng::from_entropy();
    let mut backoff = Backoff::default();

    loop {
        match dispatcher.run_batch_cycle().await {
            Ok(report) => {
                backoff.reset();
                match ExecutionOutcome::from(&report) {
                    ExecutionOutcome::CampaignClosed => continue,
                    ExecutionOutcome::BatchDelivered | ExecutionOutcome::EmptyQueue => {
                        tracing::info!(
                            sent = report.sent,
                            failed = report.failed,
                            remaining = report.remaining,
                            "Delivery cycle finished, sleeping until the next trigger"
                        );
                        tokio::time::sleep(cadence).await;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error.cause_chain = ?e, "Delivery cycle failed");
                // Add 0–20% random jitter to avoid sync storms
                let jitter = rng.gen_range(0.0..=0.2);
                tokio::time::sleep(backoff.next_delay(jitter)).await;
            }
        }
    }
}

/// Exponential backoff starting at 1s and capped at a minute.
#[derive(Debug)]
struct Backoff {
    secs: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { secs: 1 }
    }
}

impl Backoff {
    fn reset(&mut self) {
        self.secs = 1;
    }

    fn next_delay(&mut self, jitter: f64) -> Duration {
        let delay = Duration::from_secs_f64(self.secs as f64 * (1.0 + jitter));
        self.secs = (self.secs * 2).min(MAX_BACKOFF_SECS);
        delay
    }
}
