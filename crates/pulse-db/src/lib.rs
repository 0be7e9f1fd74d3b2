//! Postgres storage for sources, documents, analysis jobs, reports, trend
//! events and the job queue.
//!
//! Query functions take a `&PgPool` (or any `PgExecutor` where they must run
//! inside a caller's transaction) and return [`DbError`].

use std::time::Duration;

use pulse_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

// Relative to crates/pulse-db/Cargo.toml.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections.min(config.db_max_connections),
            acquire_timeout: Duration::from_secs(config.db_acquire_timeout_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("record not found")]
    NotFound,
    #[error("analysis job {id} is not in {expected_status} state")]
    InvalidJobTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error("invalid stored row: {0}")]
    InvalidRow(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<pulse_core::CoreError> for DbError {
    fn from(err: pulse_core::CoreError) -> Self {
        DbError::InvalidRow(err.to_string())
    }
}

/// Open a pool against `database_url`.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if no connection can be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await
}

/// Open a pool from the loaded application config.
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] for a blank URL, or
/// [`DbError::Sqlx`] if no connection can be established.
pub async fn connect(config: &AppConfig) -> Result<PgPool, DbError> {
    let url = config.database_url.trim();
    if url.is_empty() {
        return Err(DbError::MissingDatabaseUrl);
    }
    let pool = connect_pool(url, PoolConfig::from_app_config(config)).await?;
    tracing::debug!(
        max_connections = config.db_max_connections,
        "database pool connected"
    );
    Ok(pool)
}

/// Apply pending migrations and return how many ran.
///
/// # Errors
///
/// Returns [`DbError::Migration`] if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, DbError> {
    let before = applied_migrations(pool).await;
    MIGRATOR.run(pool).await?;
    let after = applied_migrations(pool).await;
    Ok(after.saturating_sub(before))
}

// Zero on a fresh database, before the bookkeeping table exists.
async fn applied_migrations(pool: &PgPool) -> usize {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success")
        .fetch_one(pool)
        .await
        .ok()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

/// Round-trip a trivial query.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}


pub mod analysis_jobs;
pub mod documents;
pub mod queue;
pub mod reports;
pub mod sources;

pub use analysis_jobs::{
    complete_analysis_job, create_analysis_job, fail_analysis_job, get_analysis_job,
    get_tenant_analysis_job, list_tenant_analysis_jobs, mark_analysis_job_running,
    reap_stale_running_jobs, AnalysisJobRow, NewAnalysisJob,
};
pub use documents::{
    count_documents_in_scope, insert_document, list_documents_in_scope, DocumentRow,
};
pub use queue::{claim_queue_message, publish_queue_message, ClaimedMessage};
pub use reports::{
    get_overview_report, insert_trend_events, list_trend_events, upsert_overview_report,
    OverviewReportRow, TrendEventRow,
};
pub use sources::{
    grant_tenant_source, insert_source, insert_tenant, is_source_accessible, list_tenant_sources,
    source_stats, SourceRow, SourceStats,
};
