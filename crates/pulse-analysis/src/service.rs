//! Job orchestrator: submit, execute and the read surface.
//!
//! State machine: `PENDING → RUNNING → DONE | ERROR`. `DONE` and `ERROR` are
//! terminal. The `PENDING → RUNNING` claim commits before any work starts so a
//! redelivered copy of the same message sees `RUNNING` and backs off.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pulse_core::{
    build_daily_series, detect_trends, AnalysisJob, AnalysisScope, JobStatus, ModelRef,
    OverviewReport, SentimentMode, TrendEvent, TrendParams,
};
use pulse_db::{DbError, SourceRow, SourceStats};
use pulse_sentiment::SentimentAggregator;
use serde_json::{Map, Value};

use crate::error::AnalysisError;
use crate::queue::{JobMessage, JobQueue};
use crate::report::{build_report, ReportInputs};
use crate::resolver::ScopeResolver;
use crate::store::{AnalysisStore, NewJob};

/// A caller's request to analyse a scope.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub tenant_id: i64,
    pub model: ModelRef,
    pub scope: AnalysisScope,
    pub params: Map<String, Value>,
}

/// What a single delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// The job ran and is now `DONE`.
    Completed {
        total_documents: i64,
        trends_found: usize,
        sentiment_mode: SentimentMode,
    },
    /// The job was already `DONE` or `ERROR`; nothing changed.
    SkippedTerminal(JobStatus),
    /// The job was already `RUNNING`, or another delivery claimed it first.
    SkippedRunning,
    /// No job with that id exists.
    Missing,
}

pub struct AnalysisService {
    store: Arc<dyn AnalysisStore>,
    queue: Arc<dyn JobQueue>,
    sentiment: Arc<SentimentAggregator>,
    trend_params: TrendParams,
}

impl AnalysisService {
    #[must_use]
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        queue: Arc<dyn JobQueue>,
        sentiment: Arc<SentimentAggregator>,
        trend_params: TrendParams,
    ) -> Self {
        Self {
            store,
            queue,
            sentiment,
            trend_params,
        }
    }

    fn resolver(&self) -> ScopeResolver<'_> {
        ScopeResolver::new(self.store.as_ref())
    }

    // -----------------------------------------------------------------------
    // Submit
    // -----------------------------------------------------------------------

    /// Validate and count the scope, persist a `PENDING` job and enqueue it.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::AccessDenied`] / [`AnalysisError::NoDocumentsInScope`]
    ///   before any job is created.
    /// - [`AnalysisError::Enqueue`] if the hand-off failed; the job has already
    ///   been moved to `ERROR`.
    /// - [`AnalysisError::Persistence`] on a store failure.
    pub async fn submit(&self, request: SubmitRequest) -> Result<AnalysisJob, AnalysisError> {
        let tenant_id = request.tenant_id;
        let count = self
            .resolver()
            .count_in_scope(tenant_id, &request.scope)
            .await
            .inspect_err(|e| tracing::info!(tenant_id, error = %e, "submit rejected"))?;

        if count == 0 {
            tracing::info!(tenant_id, "submit rejected: no documents in scope");
            return Err(AnalysisError::NoDocumentsInScope);
        }

        let job = self
            .store
            .create_job(&NewJob {
                tenant_id,
                model: request.model,
                scope: request.scope,
                params: request.params,
            })
            .await?;

        if let Err(e) = self.queue.publish(JobMessage { job_id: job.id }).await {
            let err = AnalysisError::Enqueue {
                job_id: job.id,
                reason: e.to_string(),
            };
            tracing::error!(job_id = job.id, tenant_id, error = %e, "queue publish failed");
            self.fail_best_effort(job.id, &err.to_string()).await;
            return Err(err);
        }

        tracing::info!(job_id = job.id, tenant_id, documents = count, "analysis job submitted");
        Ok(job)
    }

    // -----------------------------------------------------------------------
    // Execute
    // -----------------------------------------------------------------------

    /// Run a delivered job. Duplicate deliveries are no-ops.
    ///
    /// # Errors
    ///
    /// Returns the failure that moved the job to `ERROR`. If recording `ERROR`
    /// itself fails that is logged and the original failure is still returned.
    ///
    /// A store failure before the `PENDING → RUNNING` claim returns
    /// [`AnalysisError::Unclaimed`] and leaves the job as it was.
    pub async fn execute(&self, job_id: i64) -> Result<ExecuteOutcome, AnalysisError> {
        let unclaimed = |source: DbError| AnalysisError::Unclaimed { job_id, source };

        let Some(job) = self.store.get_job(job_id).await.map_err(unclaimed)? else {
            tracing::warn!(job_id, "delivery for unknown job");
            return Ok(ExecuteOutcome::Missing);
        };

        match job.status {
            JobStatus::Done | JobStatus::Error => {
                tracing::info!(job_id, status = %job.status, "duplicate delivery skipped");
                return Ok(ExecuteOutcome::SkippedTerminal(job.status));
            }
            JobStatus::Running => {
                tracing::info!(job_id, "job already running; delivery skipped");
                return Ok(ExecuteOutcome::SkippedRunning);
            }
            JobStatus::Pending => {}
        }

        if !self.store.mark_running(job_id).await.map_err(unclaimed)? {
            tracing::info!(job_id, "job claimed by another delivery");
            return Ok(ExecuteOutcome::SkippedRunning);
        }
        tracing::info!(job_id, tenant_id = job.tenant_id, "job running");

        match self.run(&job).await {
            Ok(outcome) => {
                tracing::info!(job_id, ?outcome, "job done");
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(job_id, kind = ?e.kind(), error = %e, "job failed");
                self.fail_best_effort(job_id, &e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn run(&self, job: &AnalysisJob) -> Result<ExecuteOutcome, AnalysisError> {
        let documents = self
            .resolver()
            .fetch_in_scope(job.tenant_id, &job.scope)
            .await?;

        let series = build_daily_series(&documents);
        let events: Vec<TrendEvent> = detect_trends(&series, &self.trend_params)
            .into_iter()
            .map(|signal| signal.into_event(job.id))
            .collect();

        let texts: Vec<&str> = documents
            .iter()
            .map(|doc| doc.text.as_str())
            .filter(|text| !text.is_empty())
            .collect();
        let sentiment = self.sentiment.aggregate(&texts).await?;
        if let Some(reason) = &sentiment.degrade_reason {
            tracing::warn!(job_id = job.id, reason = %reason, "sentiment degraded to fallback");
        }

        let report = build_report(
            &ReportInputs {
                job_id: job.id,
                scope: &job.scope,
                documents_used: texts.len(),
                sentiment: &sentiment,
                series: &series,
                events: &events,
            },
            Utc::now(),
        );

        self.store.complete_job(&report, &events).await?;

        Ok(ExecuteOutcome::Completed {
            total_documents: report.total_documents,
            trends_found: events.len(),
            sentiment_mode: sentiment.mode,
        })
    }

    async fn fail_best_effort(&self, job_id: i64, message: &str) {
        if let Err(e) = self.store.fail_job(job_id, message).await {
            tracing::error!(job_id, error = %e, "failed to record job error");
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns [`AnalysisError::NotFound`] if the job does not exist for this tenant.
    pub async fn get_job(&self, tenant_id: i64, job_id: i64) -> Result<AnalysisJob, AnalysisError> {
        self.store
            .get_tenant_job(tenant_id, job_id)
            .await?
            .ok_or(AnalysisError::NotFound)
    }

    /// The tenant's most recent jobs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Persistence`] on a store failure.
    pub async fn list_recent(
        &self,
        tenant_id: i64,
        limit: i64,
    ) -> Result<Vec<AnalysisJob>, AnalysisError> {
        Ok(self.store.list_tenant_jobs(tenant_id, limit.max(0)).await?)
    }

    /// The report of a `DONE` job.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::NotFound`] unless the job exists for this
    /// tenant, is `DONE`, and has a report.
    pub async fn get_overview(
        &self,
        tenant_id: i64,
        job_id: i64,
    ) -> Result<OverviewReport, AnalysisError> {
        let job = self.get_job(tenant_id, job_id).await?;
        if job.status != JobStatus::Done {
            return Err(AnalysisError::NotFound);
        }
        self.store
            .get_report(job_id)
            .await?
            .ok_or(AnalysisError::NotFound)
    }

    /// Trend events of a tenant's job, in chronological order.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::NotFound`] if the job does not exist for this tenant.
    pub async fn list_trend_events(
        &self,
        tenant_id: i64,
        job_id: i64,
    ) -> Result<Vec<TrendEvent>, AnalysisError> {
        self.get_job(tenant_id, job_id).await?;
        Ok(self.store.list_trend_events(job_id).await?)
    }

    /// # Errors
    ///
    /// Returns [`AnalysisError::Persistence`] on a store failure.
    pub async fn list_sources(&self, tenant_id: i64) -> Result<Vec<SourceRow>, AnalysisError> {
        Ok(self.store.list_sources(tenant_id).await?)
    }

    /// # Errors
    ///
    /// Returns [`AnalysisError::AccessDenied`] if the tenant cannot use the source.
    pub async fn source_stats(
        &self,
        tenant_id: i64,
        source_id: i64,
    ) -> Result<SourceStats, AnalysisError> {
        match self.store.source_stats(tenant_id, source_id).await {
            Ok(stats) => Ok(stats),
            Err(DbError::NotFound) => Err(AnalysisError::AccessDenied { source_id }),
            Err(e) => Err(e.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Operator recovery
    // -----------------------------------------------------------------------

    /// Move `RUNNING` jobs started before `started_before` to `ERROR`.
    /// Reaped jobs are not re-queued.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Persistence`] on a store failure.
    pub async fn reap_stale(
        &self,
        started_before: DateTime<Utc>,
    ) -> Result<Vec<i64>, AnalysisError> {
        let message = format!(
            "stale run reaped: still RUNNING, started before {}",
            started_before.to_rfc3339()
        );
        let reaped = self.store.reap_stale_running(started_before, &message).await?;
        for job_id in &reaped {
            tracing::warn!(job_id, "stale running job moved to ERROR");
        }
        Ok(reaped)
    }
}
