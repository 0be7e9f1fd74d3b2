//! Database operations for `overview_reports` and `trend_events`.
//!
//! Writes take any [`PgExecutor`] so [`crate::complete_analysis_job`] can run
//! them inside its transaction.

use chrono::{DateTime, Utc};
use pulse_core::{OverviewReport, ReportMetrics, SentimentShare, TrendEvent, TrendKind};
use serde_json::Value;
use sqlx::{PgExecutor, PgPool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `overview_reports` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OverviewReportRow {
    pub job_id: i64,
    pub total_documents: i64,
    pub sentiment_share: Value,
    pub metrics: Value,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OverviewReportRow> for OverviewReport {
    type Error = DbError;

    fn try_from(row: OverviewReportRow) -> Result<Self, Self::Error> {
        let sentiment_share: SentimentShare = serde_json::from_value(row.sentiment_share)?;
        let metrics: ReportMetrics = serde_json::from_value(row.metrics)?;
        Ok(OverviewReport {
            job_id: row.job_id,
            total_documents: row.total_documents,
            sentiment_share,
            metrics,
            created_at: row.created_at,
        })
    }
}

/// A row from the `trend_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrendEventRow {
    pub id: i64,
    pub job_id: i64,
    pub ts: DateTime<Utc>,
    pub kind: String,
    pub value: f64,
    pub baseline: f64,
    pub z: f64,
}

impl TryFrom<TrendEventRow> for TrendEvent {
    type Error = DbError;

    fn try_from(row: TrendEventRow) -> Result<Self, Self::Error> {
        let kind: TrendKind = row.kind.parse()?;
        Ok(TrendEvent {
            job_id: row.job_id,
            ts: row.ts,
            kind,
            value: row.value,
            baseline: row.baseline,
            z: row.z,
        })
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Insert or replace the overview report keyed by `job_id`.
///
/// # Errors
///
/// Returns [`DbError::Json`] if the share or metrics cannot be serialized, or
/// [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_overview_report<'e>(
    executor: impl PgExecutor<'e>,
    report: &OverviewReport,
) -> Result<(), DbError> {
    let share = serde_json::to_value(report.sentiment_share)?;
    let metrics = serde_json::to_value(&report.metrics)?;

    sqlx::query(
        "INSERT INTO overview_reports (job_id, total_documents, sentiment_share, metrics, created_at) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (job_id) DO UPDATE SET \
             total_documents = EXCLUDED.total_documents, \
             sentiment_share = EXCLUDED.sentiment_share, \
             metrics         = EXCLUDED.metrics, \
             created_at      = EXCLUDED.created_at",
    )
    .bind(report.job_id)
    .bind(report.total_documents)
    .bind(share)
    .bind(metrics)
    .bind(report.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Append trend events in a single statement. An empty slice is a no-op.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_trend_events<'e>(
    executor: impl PgExecutor<'e>,
    events: &[TrendEvent],
) -> Result<u64, DbError> {
    if events.is_empty() {
        return Ok(0);
    }

    let job_ids: Vec<i64> = events.iter().map(|e| e.job_id).collect();
    let timestamps: Vec<DateTime<Utc>> = events.iter().map(|e| e.ts).collect();
    let kinds: Vec<&str> = events.iter().map(|e| e.kind.as_str()).collect();
    let values: Vec<f64> = events.iter().map(|e| e.value).collect();
    let baselines: Vec<f64> = events.iter().map(|e| e.baseline).collect();
    let zs: Vec<f64> = events.iter().map(|e| e.z).collect();

    let result = sqlx::query(
        "INSERT INTO trend_events (job_id, ts, kind, value, baseline, z) \
         SELECT * FROM UNNEST($1::BIGINT[], $2::TIMESTAMPTZ[], $3::TEXT[], \
                              $4::FLOAT8[], $5::FLOAT8[], $6::FLOAT8[])",
    )
    .bind(job_ids)
    .bind(timestamps)
    .bind(kinds)
    .bind(values)
    .bind(baselines)
    .bind(zs)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetch the report for a job, if one exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_overview_report(
    pool: &PgPool,
    job_id: i64,
) -> Result<Option<OverviewReportRow>, DbError> {
    let row = sqlx::query_as::<_, OverviewReportRow>(
        "SELECT job_id, total_documents, sentiment_share, metrics, created_at \
         FROM overview_reports \
         WHERE job_id = $1",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// List a job's trend events in chronological order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_trend_events(pool: &PgPool, job_id: i64) -> Result<Vec<TrendEventRow>, DbError> {
    let rows = sqlx::query_as::<_, TrendEventRow>(
        "SELECT id, job_id, ts, kind, value, baseline, z \
         FROM trend_events \
         WHERE job_id = $1 \
         ORDER BY ts ASC, id ASC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
