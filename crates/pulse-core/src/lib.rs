//! Domain types and pure analysis routines for the pulse analysis pipeline.
//!
//! Nothing in this crate performs I/O: scopes, jobs, reports and the trend
//! detector are shared by the persistence, sentiment and orchestration crates.

mod app_config;
mod config;
pub mod jobs;
pub mod report;
pub mod scope;
pub mod trends;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use app_config::{AppConfig, Environment, SentimentBackend};
pub use config::{load_app_config, load_app_config_from_env};
pub use jobs::{AnalysisJob, Document, JobStatus, ModelRef};
pub use report::{CanonicalLabel, OverviewReport, ReportMetrics, SentimentMode, SentimentShare};
pub use scope::{AnalysisScope, DateRange};
pub use trends::{
    build_daily_series, detect_trends, DailyCountPoint, TrendEvent, TrendKind, TrendParams,
    TrendSignal,
};

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("scope must reference at least one source")]
    EmptySourceList,
    #[error("invalid date range: end {end} is not after start {start}")]
    EmptyDateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("unknown job status: {0}")]
    UnknownJobStatus(String),
    #[error("unknown sentiment label: {0}")]
    UnknownLabel(String),
    #[error("unknown sentiment mode: {0}")]
    UnknownSentimentMode(String),
    #[error("unknown trend kind: {0}")]
    UnknownTrendKind(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
