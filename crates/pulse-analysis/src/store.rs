//! Persistence seam for the orchestrator.
//!
//! [`PgAnalysisStore`] delegates to `pulse-db`; tests substitute an in-memory
//! implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::{AnalysisJob, AnalysisScope, Document, ModelRef, OverviewReport, TrendEvent};
use pulse_db::{DbError, NewAnalysisJob, SourceRow, SourceStats};
use serde_json::{Map, Value};
use sqlx::PgPool;

/// Fields of a job about to be created.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub tenant_id: i64,
    pub model: ModelRef,
    pub scope: AnalysisScope,
    pub params: Map<String, Value>,
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn is_source_accessible(&self, tenant_id: i64, source_id: i64) -> Result<bool, DbError>;

    /// Count documents matching `scope`. Must agree with [`Self::fetch_documents`].
    async fn count_documents(&self, scope: &AnalysisScope) -> Result<i64, DbError>;

    /// Documents matching `scope`, ordered by `published_at`.
    async fn fetch_documents(&self, scope: &AnalysisScope) -> Result<Vec<Document>, DbError>;

    /// Persist a new job in `PENDING`.
    async fn create_job(&self, job: &NewJob) -> Result<AnalysisJob, DbError>;

    async fn get_job(&self, job_id: i64) -> Result<Option<AnalysisJob>, DbError>;

    async fn get_tenant_job(
        &self,
        tenant_id: i64,
        job_id: i64,
    ) -> Result<Option<AnalysisJob>, DbError>;

    async fn list_tenant_jobs(&self, tenant_id: i64, limit: i64)
        -> Result<Vec<AnalysisJob>, DbError>;

    /// `PENDING → RUNNING`, committed on its own. `false` if not `PENDING`.
    async fn mark_running(&self, job_id: i64) -> Result<bool, DbError>;

    /// Upsert the report, append events and move `RUNNING → DONE` atomically.
    async fn complete_job(
        &self,
        report: &OverviewReport,
        events: &[TrendEvent],
    ) -> Result<(), DbError>;

    /// Move a non-terminal job to `ERROR`.
    async fn fail_job(&self, job_id: i64, message: &str) -> Result<(), DbError>;

    async fn get_report(&self, job_id: i64) -> Result<Option<OverviewReport>, DbError>;

    async fn list_trend_events(&self, job_id: i64) -> Result<Vec<TrendEvent>, DbError>;

    async fn list_sources(&self, tenant_id: i64) -> Result<Vec<SourceRow>, DbError>;

    /// [`DbError::NotFound`] if the source is not accessible to the tenant.
    async fn source_stats(&self, tenant_id: i64, source_id: i64) -> Result<SourceStats, DbError>;

    /// Force `RUNNING` jobs started before `started_before` into `ERROR`.
    async fn reap_stale_running(
        &self,
        started_before: DateTime<Utc>,
        message: &str,
    ) -> Result<Vec<i64>, DbError>;
}

/// [`AnalysisStore`] over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn is_source_accessible(&self, tenant_id: i64, source_id: i64) -> Result<bool, DbError> {
        pulse_db::is_source_accessible(&self.pool, tenant_id, source_id).await
    }

    async fn count_documents(&self, scope: &AnalysisScope) -> Result<i64, DbError> {
        pulse_db::count_documents_in_scope(&self.pool, scope).await
    }

    async fn fetch_documents(&self, scope: &AnalysisScope) -> Result<Vec<Document>, DbError> {
        let rows = pulse_db::list_documents_in_scope(&self.pool, scope).await?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn create_job(&self, job: &NewJob) -> Result<AnalysisJob, DbError> {
        let row = pulse_db::create_analysis_job(
            &self.pool,
            &NewAnalysisJob {
                tenant_id: job.tenant_id,
                model: &job.model,
                scope: &job.scope,
                params: &job.params,
            },
        )
        .await?;
        AnalysisJob::try_from(row)
    }

    async fn get_job(&self, job_id: i64) -> Result<Option<AnalysisJob>, DbError> {
        pulse_db::get_analysis_job(&self.pool, job_id)
            .await?
            .map(AnalysisJob::try_from)
            .transpose()
    }

    async fn get_tenant_job(
        &self,
        tenant_id: i64,
        job_id: i64,
    ) -> Result<Option<AnalysisJob>, DbError> {
        pulse_db::get_tenant_analysis_job(&self.pool, tenant_id, job_id)
            .await?
            .map(AnalysisJob::try_from)
            .transpose()
    }

    async fn list_tenant_jobs(
        &self,
        tenant_id: i64,
        limit: i64,
    ) -> Result<Vec<AnalysisJob>, DbError> {
        pulse_db::list_tenant_analysis_jobs(&self.pool, tenant_id, limit)
            .await?
            .into_iter()
            .map(AnalysisJob::try_from)
            .collect()
    }

    async fn mark_running(&self, job_id: i64) -> Result<bool, DbError> {
        pulse_db::mark_analysis_job_running(&self.pool, job_id).await
    }

    async fn complete_job(
        &self,
        report: &OverviewReport,
        events: &[TrendEvent],
    ) -> Result<(), DbError> {
        pulse_db::complete_analysis_job(&self.pool, report, events).await
    }

    async fn fail_job(&self, job_id: i64, message: &str) -> Result<(), DbError> {
        pulse_db::fail_analysis_job(&self.pool, job_id, message).await
    }

    async fn get_report(&self, job_id: i64) -> Result<Option<OverviewReport>, DbError> {
        pulse_db::get_overview_report(&self.pool, job_id)
            .await?
            .map(OverviewReport::try_from)
            .transpose()
    }

    async fn list_trend_events(&self, job_id: i64) -> Result<Vec<TrendEvent>, DbError> {
        pulse_db::list_trend_events(&self.pool, job_id)
            .await?
            .into_iter()
            .map(TrendEvent::try_from)
            .collect()
    }

    async fn list_sources(&self, tenant_id: i64) -> Result<Vec<SourceRow>, DbError> {
        pulse_db::list_tenant_sources(&self.pool, tenant_id).await
    }

    async fn source_stats(&self, tenant_id: i64, source_id: i64) -> Result<SourceStats, DbError> {
        pulse_db::source_stats(&self.pool, tenant_id, source_id).await
    }

    async fn reap_stale_running(
        &self,
        started_before: DateTime<Utc>,
        message: &str,
    ) -> Result<Vec<i64>, DbError> {
        pulse_db::reap_stale_running_jobs(&self.pool, started_before, message).await
    }
}
