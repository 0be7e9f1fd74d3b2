use pulse_core::CoreError;
use pulse_db::DbError;
use pulse_sentiment::SentimentError;
use thiserror::Error;

/// Failure class of an [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    AccessDenied,
    NotFound,
    Enqueue,
    Classification,
    Configuration,
    Persistence,
}

/// Tagged outcome of a failed submit, execute or read.
///
/// The `Display` text of the execution-time variants is what lands in a job's
/// `error` column, so each carries a class prefix.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid scope: {0}")]
    Validation(String),

    #[error("no documents match the requested scope")]
    NoDocumentsInScope,

    #[error("source {source_id} is not accessible to this tenant")]
    AccessDenied { source_id: i64 },

    #[error("analysis job not found")]
    NotFound,

    #[error("queue publish failed: {reason}")]
    Enqueue { job_id: i64, reason: String },

    #[error("classification failed: {0}")]
    Classification(#[source] SentimentError),

    #[error("sentiment configuration error: {0}")]
    Configuration(#[source] SentimentError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] DbError),

    /// A store failure before the job was moved to `RUNNING`. The job is
    /// untouched and the delivery should be returned to the queue.
    #[error("job {job_id} not claimed: {source}")]
    Unclaimed {
        job_id: i64,
        #[source]
        source: DbError,
    },
}

impl AnalysisError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            AnalysisError::Validation(_) | AnalysisError::NoDocumentsInScope => {
                FailureKind::Validation
            }
            AnalysisError::AccessDenied { .. } => FailureKind::AccessDenied,
            AnalysisError::NotFound => FailureKind::NotFound,
            AnalysisError::Enqueue { .. } => FailureKind::Enqueue,
            AnalysisError::Classification(_) => FailureKind::Classification,
            AnalysisError::Configuration(_) => FailureKind::Configuration,
            AnalysisError::Persistence(_) | AnalysisError::Unclaimed { .. } => {
                FailureKind::Persistence
            }
        }
    }

    /// The job never left `PENDING`, so its delivery must not be acknowledged.
    #[must_use]
    pub fn is_redeliverable(&self) -> bool {
        matches!(self, AnalysisError::Unclaimed { .. })
    }

    /// Only a failed queue hand-off is worth a fresh submit.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::Enqueue { .. })
    }
}

impl From<CoreError> for AnalysisError {
    fn from(err: CoreError) -> Self {
        AnalysisError::Validation(err.to_string())
    }
}

impl From<SentimentError> for AnalysisError {
    fn from(err: SentimentError) -> Self {
        if err.is_configuration() {
            AnalysisError::Configuration(err)
        } else {
            AnalysisError::Classification(err)
        }
    }
}

/// Failure to hand a message to, or take one from, a job queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("queue is closed")]
    Closed,

    #[error("{0}")]
    Unavailable(String),
}
