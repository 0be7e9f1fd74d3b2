//! Database operations for `analysis_jobs`.
//!
//! Every status change is a conditional `UPDATE ... WHERE status = ...`, so a
//! transition that lost a race affects zero rows instead of moving a job
//! backwards or out of a terminal state.

use chrono::{DateTime, Utc};
use pulse_core::{AnalysisJob, AnalysisScope, JobStatus, ModelRef, OverviewReport, TrendEvent};
use serde_json::{Map, Value};
use sqlx::{PgExecutor, PgPool};

use crate::reports::{insert_trend_events, upsert_overview_report};
use crate::DbError;

const JOB_COLUMNS: &str = "id, tenant_id, status, model_name, model_version, scope, params, \
                           error, created_at, started_at, finished_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `analysis_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalysisJobRow {
    pub id: i64,
    pub tenant_id: i64,
    pub status: String,
    pub model_name: String,
    pub model_version: String,
    pub scope: Value,
    pub params: Value,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<AnalysisJobRow> for AnalysisJob {
    type Error = DbError;

    fn try_from(row: AnalysisJobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row.status.parse()?;
        let scope: AnalysisScope = serde_json::from_value(row.scope)?;
        let params = match row.params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(DbError::InvalidRow(format!(
                    "job {} params is not an object: {other}",
                    row.id
                )))
            }
        };

        Ok(AnalysisJob {
            id: row.id,
            tenant_id: row.tenant_id,
            scope,
            model: ModelRef {
                name: row.model_name,
                version: row.model_version,
            },
            status,
            params,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            error: row.error,
        })
    }
}

/// Insert payload for a new job.
#[derive(Debug, Clone)]
pub struct NewAnalysisJob<'a> {
    pub tenant_id: i64,
    pub model: &'a ModelRef,
    pub scope: &'a AnalysisScope,
    pub params: &'a Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Creates a new job in `PENDING` status and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Json`] if the scope cannot be serialized, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn create_analysis_job(
    pool: &PgPool,
    job: &NewAnalysisJob<'_>,
) -> Result<AnalysisJobRow, DbError> {
    let scope = serde_json::to_value(job.scope)?;
    let sql = format!(
        "INSERT INTO analysis_jobs (tenant_id, status, model_name, model_version, scope, params) \
         VALUES ($1, 'PENDING', $2, $3, $4, $5) \
         RETURNING {JOB_COLUMNS}"
    );

    let row = sqlx::query_as::<_, AnalysisJobRow>(&sql)
        .bind(job.tenant_id)
        .bind(&job.model.name)
        .bind(&job.model.version)
        .bind(scope)
        .bind(Value::Object(job.params.clone()))
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Fetches a job by id regardless of tenant. Used by the executor, which is
/// addressed by job id alone.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_analysis_job(pool: &PgPool, id: i64) -> Result<Option<AnalysisJobRow>, DbError> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM analysis_jobs WHERE id = $1");
    let row = sqlx::query_as::<_, AnalysisJobRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Fetches a job by id, only if it belongs to `tenant_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_tenant_analysis_job(
    pool: &PgPool,
    tenant_id: i64,
    id: i64,
) -> Result<Option<AnalysisJobRow>, DbError> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM analysis_jobs WHERE id = $1 AND tenant_id = $2");
    let row = sqlx::query_as::<_, AnalysisJobRow>(&sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Returns a tenant's most recent `limit` jobs, ordered by `created_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_tenant_analysis_jobs(
    pool: &PgPool,
    tenant_id: i64,
    limit: i64,
) -> Result<Vec<AnalysisJobRow>, DbError> {
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM analysis_jobs \
         WHERE tenant_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, AnalysisJobRow>(&sql)
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// `PENDING → RUNNING`, stamping `started_at`. Commits on its own.
///
/// Returns `false` when the job was not `PENDING` (another delivery claimed it
/// first, or it is already terminal).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_analysis_job_running(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE analysis_jobs \
         SET status = 'RUNNING', started_at = NOW() \
         WHERE id = $1 AND status = 'PENDING'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Moves a non-terminal job to `ERROR`, stamping `finished_at` and `error`.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is already terminal or
/// missing, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_analysis_job<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analysis_jobs \
         SET status = 'ERROR', finished_at = NOW(), error = $1 \
         WHERE id = $2 AND status IN ('PENDING', 'RUNNING')",
    )
    .bind(error_message)
    .bind(id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "PENDING or RUNNING",
        });
    }

    Ok(())
}

/// Records a finished run in one transaction: upsert the overview report,
/// append the trend events, and move the job `RUNNING → DONE` with `error`
/// cleared and `finished_at` stamped.
///
/// If the job is no longer `RUNNING` nothing is written.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `RUNNING`, or
/// [`DbError::Sqlx`]/[`DbError::Json`] if any write fails. On error the
/// transaction is rolled back.
pub async fn complete_analysis_job(
    pool: &PgPool,
    report: &OverviewReport,
    events: &[TrendEvent],
) -> Result<(), DbError> {
    let id = report.job_id;
    let mut tx = pool.begin().await?;

    upsert_overview_report(&mut *tx, report).await?;
    insert_trend_events(&mut *tx, events).await?;

    let result = sqlx::query(
        "UPDATE analysis_jobs \
         SET status = 'DONE', finished_at = NOW(), error = NULL \
         WHERE id = $1 AND status = 'RUNNING'",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "RUNNING",
        });
    }

    tx.commit().await?;
    Ok(())
}

/// Force `RUNNING` jobs whose `started_at` is older than `started_before` into
/// `ERROR`. Returns the ids that were reaped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn reap_stale_running_jobs(
    pool: &PgPool,
    started_before: DateTime<Utc>,
    error_message: &str,
) -> Result<Vec<i64>, DbError> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "UPDATE analysis_jobs \
         SET status = 'ERROR', finished_at = NOW(), error = $1 \
         WHERE status = 'RUNNING' AND started_at < $2 \
         RETURNING id",
    )
    .bind(error_message)
    .bind(started_before)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
