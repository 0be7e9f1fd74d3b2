//! Postgres-backed delivery queue for job hand-off.
//!
//! A claimed message stays row-locked inside its own transaction until it is
//! acknowledged. Acknowledging deletes the row and commits; dropping the
//! [`ClaimedMessage`] rolls back, which makes the row visible to the next
//! claimer again.

use std::fmt;

use sqlx::{PgPool, Postgres, Transaction};

use crate::DbError;

/// A message locked by this consumer.
pub struct ClaimedMessage {
    pub id: i64,
    pub payload: String,
    tx: Transaction<'static, Postgres>,
}

impl fmt::Debug for ClaimedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimedMessage")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

impl ClaimedMessage {
    /// Delete the message and release the lock.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the delete or commit fails. The message is
    /// then redelivered.
    pub async fn ack(mut self) -> Result<(), DbError> {
        sqlx::query("DELETE FROM analysis_queue WHERE id = $1")
            .bind(self.id)
            .execute(&mut *self.tx)
            .await?;
        self.tx.commit().await?;
        Ok(())
    }

    /// Release the lock without deleting, making the message claimable again.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the rollback fails.
    pub async fn release(self) -> Result<(), DbError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Append a message to `queue_name`. Returns the message id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn publish_queue_message(
    pool: &PgPool,
    queue_name: &str,
    payload: &str,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO analysis_queue (queue_name, payload) VALUES ($1, $2) RETURNING id",
    )
    .bind(queue_name)
    .bind(payload)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Lock the oldest unclaimed message on `queue_name`, skipping rows other
/// consumers hold. Returns `None` when nothing is available.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the transaction or query fails.
pub async fn claim_queue_message(
    pool: &PgPool,
    queue_name: &str,
) -> Result<Option<ClaimedMessage>, DbError> {
    let mut tx = pool.begin().await?;

    let row: Option<(i64, String)> = sqlx::query_as(
        "SELECT id, payload FROM analysis_queue \
         WHERE queue_name = $1 \
         ORDER BY id \
         LIMIT 1 \
         FOR UPDATE SKIP LOCKED",
    )
    .bind(queue_name)
    .fetch_optional(&mut *tx)
    .await?;

    match row {
        Some((id, payload)) => Ok(Some(ClaimedMessage { id, payload, tx })),
        None => {
            tx.rollback().await?;
            Ok(None)
        }
    }
}
