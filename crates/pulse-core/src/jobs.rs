//! Analysis jobs and the documents they read.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AnalysisScope, CoreError};

/// Job lifecycle: `PENDING → RUNNING → DONE | ERROR`.
///
/// `DONE` and `ERROR` are terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Error => "ERROR",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "DONE" => Ok(JobStatus::Done),
            "ERROR" => Ok(JobStatus::Error),
            other => Err(CoreError::UnknownJobStatus(other.to_string())),
        }
    }
}

/// Informational reference to the model a job was requested with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: i64,
    pub tenant_id: i64,
    pub scope: AnalysisScope,
    pub model: ModelRef,
    pub status: JobStatus,
    /// Opaque caller parameters, stored and echoed but never interpreted.
    pub params: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    /// Stamped on the `PENDING → RUNNING` transition.
    pub started_at: Option<DateTime<Utc>>,
    /// Stamped once, on `DONE` or `ERROR`.
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// A read-only ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub source_id: i64,
    pub published_at: DateTime<Utc>,
    pub title: Option<String>,
    pub text: String,
    pub topic: Option<String>,
}
