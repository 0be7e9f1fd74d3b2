//! Job hand-off between submit and execute.
//!
//! The payload is the job id alone, serialized as `{"job_id": N}`. Delivery
//! is at-least-once; the executor's status guard absorbs duplicates.

use async_trait::async_trait;
use pulse_db::ClaimedMessage;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::{mpsc, Mutex};

use crate::error::QueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_id: i64,
}

impl JobMessage {
    /// # Errors
    ///
    /// Returns [`QueueError::Encode`] if serialization fails.
    pub fn encode(&self) -> Result<String, QueueError> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] for a payload that is not `{"job_id": N}`.
    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Producer side.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn publish(&self, message: JobMessage) -> Result<(), QueueError>;
}

/// Consumer side. `Ok(None)` means nothing is available right now.
#[async_trait]
pub trait JobConsumer: Send + Sync {
    async fn next_delivery(&self) -> Result<Option<Delivery>, QueueError>;
}

/// One delivered message. Dropping it without [`Delivery::ack`] leaves the
/// message eligible for redelivery where the backend supports it.
#[derive(Debug)]
pub struct Delivery {
    pub payload: String,
    receipt: Receipt,
}

#[derive(Debug)]
enum Receipt {
    Postgres(ClaimedMessage),
    Channel(Option<mpsc::UnboundedSender<String>>),
}

impl Delivery {
    /// A delivery with no backend behind it; ack and release are no-ops.
    #[must_use]
    pub fn detached(payload: String) -> Self {
        Self {
            payload,
            receipt: Receipt::Channel(None),
        }
    }

    /// # Errors
    ///
    /// Returns [`QueueError::Db`] if the backend fails to delete the message.
    pub async fn ack(self) -> Result<(), QueueError> {
        match self.receipt {
            Receipt::Postgres(claimed) => Ok(claimed.ack().await?),
            Receipt::Channel(_) => Ok(()),
        }
    }

    /// Return the message to the queue unacknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Db`] if the rollback fails, or
    /// [`QueueError::Closed`] if an in-process queue is gone.
    pub async fn release(self) -> Result<(), QueueError> {
        match self.receipt {
            Receipt::Postgres(claimed) => Ok(claimed.release().await?),
            Receipt::Channel(Some(requeue)) => {
                requeue.send(self.payload).map_err(|_| QueueError::Closed)
            }
            Receipt::Channel(None) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// Queue backed by the `analysis_queue` table.
#[derive(Debug, Clone)]
pub struct PgJobQueue {
    pool: PgPool,
    queue_name: String,
}

impl PgJobQueue {
    #[must_use]
    pub fn new(pool: PgPool, queue_name: impl Into<String>) -> Self {
        Self {
            pool,
            queue_name: queue_name.into(),
        }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn publish(&self, message: JobMessage) -> Result<(), QueueError> {
        let payload = message.encode()?;
        let id = pulse_db::publish_queue_message(&self.pool, &self.queue_name, &payload).await?;
        tracing::debug!(
            queue = %self.queue_name,
            message_id = id,
            job_id = message.job_id,
            "message published"
        );
        Ok(())
    }
}

#[async_trait]
impl JobConsumer for PgJobQueue {
    async fn next_delivery(&self) -> Result<Option<Delivery>, QueueError> {
        let claimed = pulse_db::claim_queue_message(&self.pool, &self.queue_name).await?;
        Ok(claimed.map(|claimed| Delivery {
            payload: claimed.payload.clone(),
            receipt: Receipt::Postgres(claimed),
        }))
    }
}

// ---------------------------------------------------------------------------
// In-process
// ---------------------------------------------------------------------------

/// Unbounded in-process queue for single-process runs and tests. Messages are
/// removed on receipt; a released delivery goes to the back of the queue.
#[derive(Debug)]
pub struct ChannelQueue {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl Default for ChannelQueue {
    fn default() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

impl ChannelQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw payload, bypassing [`JobMessage`] encoding.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the receiver is gone.
    pub fn push_raw(&self, payload: impl Into<String>) -> Result<(), QueueError> {
        self.tx.send(payload.into()).map_err(|_| QueueError::Closed)
    }
}

#[async_trait]
impl JobQueue for ChannelQueue {
    async fn publish(&self, message: JobMessage) -> Result<(), QueueError> {
        self.push_raw(message.encode()?)
    }
}

#[async_trait]
impl JobConsumer for ChannelQueue {
    async fn next_delivery(&self) -> Result<Option<Delivery>, QueueError> {
        let mut rx = self.rx.lock().await;
        match rx.try_recv() {
            Ok(payload) => Ok(Some(Delivery {
                payload,
                receipt: Receipt::Channel(Some(self.tx.clone())),
            })),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(QueueError::Closed),
        }
    }
}
