//! Queue-driven worker loop.
//!
//! Pulls deliveries with at most `concurrency` in flight. Each delivery runs
//! [`AnalysisService::execute`] to completion and is then acknowledged. A job
//! that failed after its claim is already recorded as `ERROR`. A failure before
//! the claim leaves the job `PENDING`, so that delivery is released for
//! redelivery instead.
//!
//! With the Postgres queue every in-flight delivery holds one pool connection
//! for its claim, and `execute` needs at least one more. Concurrency is
//! therefore kept below the pool size.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pulse_core::AppConfig;
use tokio::task::JoinSet;

use crate::queue::{Delivery, JobConsumer, JobMessage};
use crate::service::{AnalysisService, ExecuteOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub concurrency: usize,
    /// Delay before polling again after an empty claim.
    pub poll_interval: Duration,
}

impl WorkerConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            concurrency: pool_bounded(config.worker_concurrency, config.db_max_connections),
            poll_interval: Duration::from_millis(config.worker_poll_interval_ms),
        }
    }

    /// Replace the concurrency, keeping it below `max_connections`.
    #[must_use]
    pub fn with_concurrency(self, requested: usize, max_connections: u32) -> Self {
        Self {
            concurrency: pool_bounded(requested, max_connections),
            ..self
        }
    }
}

/// Largest concurrency that leaves one pool connection free for `execute`.
fn pool_bounded(requested: usize, max_connections: u32) -> usize {
    let ceiling = usize::try_from(max_connections.saturating_sub(1))
        .unwrap_or(usize::MAX)
        .max(1);
    if requested > ceiling {
        tracing::warn!(
            requested,
            max_connections,
            concurrency = ceiling,
            "worker concurrency capped by database pool size"
        );
    }
    requested.clamp(1, ceiling)
}

/// How a single delivery was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
    Executed(ExecuteOutcome),
    Failed,
    /// Returned to the queue unacknowledged; the job is still `PENDING`.
    Released,
    Malformed,
}

/// Totals for one worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub released: usize,
    pub malformed: usize,
}

impl WorkerStats {
    fn record(&mut self, result: DeliveryResult) {
        match result {
            DeliveryResult::Executed(ExecuteOutcome::Completed { .. }) => self.completed += 1,
            DeliveryResult::Executed(_) => self.skipped += 1,
            DeliveryResult::Failed => self.failed += 1,
            DeliveryResult::Released => self.released += 1,
            DeliveryResult::Malformed => self.malformed += 1,
        }
    }
}

/// Decode, execute and acknowledge one delivery.
pub async fn handle_delivery(service: &AnalysisService, delivery: Delivery) -> DeliveryResult {
    let result = match JobMessage::decode(&delivery.payload) {
        Ok(message) => match service.execute(message.job_id).await {
            Ok(outcome) => DeliveryResult::Executed(outcome),
            Err(e) if e.is_redeliverable() => {
                tracing::warn!(job_id = message.job_id, error = %e, "releasing delivery for retry");
                if let Err(e) = delivery.release().await {
                    tracing::error!(job_id = message.job_id, error = %e, "failed to release delivery");
                }
                return DeliveryResult::Released;
            }
            Err(_) => DeliveryResult::Failed,
        },
        Err(e) => {
            tracing::warn!(payload = %delivery.payload, error = %e, "dropping malformed queue payload");
            DeliveryResult::Malformed
        }
    };

    if let Err(e) = delivery.ack().await {
        tracing::error!(error = %e, "failed to acknowledge delivery");
    }
    result
}

/// Run until `shutdown` resolves, then finish in-flight deliveries.
pub async fn run_worker<S>(
    service: Arc<AnalysisService>,
    consumer: Arc<dyn JobConsumer>,
    config: WorkerConfig,
    shutdown: S,
) -> WorkerStats
where
    S: Future<Output = ()> + Send,
{
    let concurrency = config.concurrency.max(1);
    let mut in_flight: JoinSet<DeliveryResult> = JoinSet::new();
    let mut stats = WorkerStats::default();
    tokio::pin!(shutdown);

    tracing::info!(concurrency, "worker started");

    loop {
        while let Some(joined) = in_flight.try_join_next() {
            record_joined(&mut stats, joined);
        }

        if in_flight.len() >= concurrency {
            tokio::select! {
                () = &mut shutdown => break,
                Some(joined) = in_flight.join_next() => record_joined(&mut stats, joined),
            }
            continue;
        }

        let idle = match consumer.next_delivery().await {
            Ok(Some(delivery)) => {
                let service = Arc::clone(&service);
                in_flight.spawn(async move { handle_delivery(&service, delivery).await });
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::error!(error = %e, "queue claim failed");
                true
            }
        };

        if idle {
            tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep(config.poll_interval) => {}
            }
        }
    }

    tracing::info!(in_flight = in_flight.len(), "worker stopping; draining in-flight deliveries");
    while let Some(joined) = in_flight.join_next().await {
        record_joined(&mut stats, joined);
    }
    tracing::info!(?stats, "worker stopped");
    stats
}

fn record_joined(stats: &mut WorkerStats, joined: Result<DeliveryResult, tokio::task::JoinError>) {
    match joined {
        Ok(result) => stats.record(result),
        Err(e) => {
            tracing::error!(error = %e, "delivery task panicked");
            stats.failed += 1;
        }
    }
}
