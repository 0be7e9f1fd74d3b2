//! In-memory `AnalysisStore`, test classifiers and queues shared by the
//! orchestrator tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pulse_analysis::{
    AnalysisService, AnalysisStore, ChannelQueue, JobMessage, JobQueue, NewJob, QueueError,
};
use pulse_core::{
    AnalysisJob, AnalysisScope, Document, JobStatus, ModelRef, OverviewReport, TrendEvent,
    TrendParams,
};
use pulse_db::{DbError, SourceRow, SourceStats};
use pulse_sentiment::{
    AggregatorSettings, LabelMap, SentimentAggregator, SentimentError, TextClassifier,
};
use serde_json::Map;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    next_job_id: i64,
    next_doc_id: i64,
    grants: HashSet<(i64, i64)>,
    documents: Vec<Document>,
    jobs: BTreeMap<i64, AnalysisJob>,
    reports: Vec<OverviewReport>,
    events: Vec<TrendEvent>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_completion: AtomicBool,
    fail_error_write: AtomicBool,
    fail_next_claim: AtomicBool,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    pub fn grant(&self, tenant_id: i64, source_id: i64) {
        self.lock().grants.insert((tenant_id, source_id));
    }

    pub fn add_document(
        &self,
        source_id: i64,
        published_at: DateTime<Utc>,
        title: Option<&str>,
        text: &str,
    ) -> i64 {
        let mut inner = self.lock();
        inner.next_doc_id += 1;
        let id = inner.next_doc_id;
        inner.documents.push(Document {
            id,
            source_id,
            published_at,
            title: title.map(str::to_string),
            text: text.to_string(),
            topic: None,
        });
        id
    }

    pub fn job(&self, job_id: i64) -> Option<AnalysisJob> {
        self.lock().jobs.get(&job_id).cloned()
    }

    pub fn job_count(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn report(&self, job_id: i64) -> Option<OverviewReport> {
        self.lock()
            .reports
            .iter()
            .find(|r| r.job_id == job_id)
            .cloned()
    }

    pub fn report_rows(&self, job_id: i64) -> usize {
        self.lock()
            .reports
            .iter()
            .filter(|r| r.job_id == job_id)
            .count()
    }

    pub fn events(&self, job_id: i64) -> Vec<TrendEvent> {
        self.lock()
            .events
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect()
    }

    pub fn force_status(&self, job_id: i64, status: JobStatus, started_at: Option<DateTime<Utc>>) {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(&job_id).expect("job exists");
        job.status = status;
        job.started_at = started_at;
    }

    pub fn fail_completion(&self, on: bool) {
        self.fail_completion.store(on, Ordering::SeqCst);
    }

    pub fn fail_error_write(&self, on: bool) {
        self.fail_error_write.store(on, Ordering::SeqCst);
    }

    /// The next `mark_running` call fails with a store error.
    pub fn fail_next_claim(&self) {
        self.fail_next_claim.store(true, Ordering::SeqCst);
    }

    fn matching(inner: &Inner, scope: &AnalysisScope) -> Vec<Document> {
        let mut docs: Vec<Document> = inner
            .documents
            .iter()
            .filter(|d| scope.matches(d))
            .cloned()
            .collect();
        docs.sort_by_key(|d| (d.published_at, d.id));
        docs
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn is_source_accessible(&self, tenant_id: i64, source_id: i64) -> Result<bool, DbError> {
        Ok(self.lock().grants.contains(&(tenant_id, source_id)))
    }

    async fn count_documents(&self, scope: &AnalysisScope) -> Result<i64, DbError> {
        let count = Self::matching(&self.lock(), scope).len();
        Ok(i64::try_from(count).expect("count fits"))
    }

    async fn fetch_documents(&self, scope: &AnalysisScope) -> Result<Vec<Document>, DbError> {
        Ok(Self::matching(&self.lock(), scope))
    }

    async fn create_job(&self, job: &NewJob) -> Result<AnalysisJob, DbError> {
        let mut inner = self.lock();
        inner.next_job_id += 1;
        let id = inner.next_job_id;
        let created = AnalysisJob {
            id,
            tenant_id: job.tenant_id,
            scope: job.scope.clone(),
            model: job.model.clone(),
            status: JobStatus::Pending,
            params: job.params.clone(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
        };
        inner.jobs.insert(id, created.clone());
        Ok(created)
    }

    async fn get_job(&self, job_id: i64) -> Result<Option<AnalysisJob>, DbError> {
        Ok(self.job(job_id))
    }

    async fn get_tenant_job(
        &self,
        tenant_id: i64,
        job_id: i64,
    ) -> Result<Option<AnalysisJob>, DbError> {
        Ok(self.job(job_id).filter(|j| j.tenant_id == tenant_id))
    }

    async fn list_tenant_jobs(
        &self,
        tenant_id: i64,
        limit: i64,
    ) -> Result<Vec<AnalysisJob>, DbError> {
        let mut jobs: Vec<AnalysisJob> = self
            .lock()
            .jobs
            .values()
            .filter(|j| j.tenant_id == tenant_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        jobs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(jobs)
    }

    async fn mark_running(&self, job_id: i64) -> Result<bool, DbError> {
        if self.fail_next_claim.swap(false, Ordering::SeqCst) {
            return Err(DbError::InvalidRow("simulated claim failure".to_string()));
        }
        let mut inner = self.lock();
        match inner.jobs.get_mut(&job_id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::Running;
                job.started_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_job(
        &self,
        report: &OverviewReport,
        events: &[TrendEvent],
    ) -> Result<(), DbError> {
        if self.fail_completion.load(Ordering::SeqCst) {
            return Err(DbError::InvalidRow("simulated write failure".to_string()));
        }
        let mut inner = self.lock();
        let job_id = report.job_id;
        match inner.jobs.get(&job_id) {
            Some(job) if job.status == JobStatus::Running => {}
            _ => {
                return Err(DbError::InvalidJobTransition {
                    id: job_id,
                    expected_status: "RUNNING",
                })
            }
        }
        // One row per job, replaced on conflict.
        match inner.reports.iter_mut().find(|r| r.job_id == job_id) {
            Some(existing) => *existing = report.clone(),
            None => inner.reports.push(report.clone()),
        }
        inner.events.extend_from_slice(events);
        let job = inner.jobs.get_mut(&job_id).expect("checked above");
        job.status = JobStatus::Done;
        job.error = None;
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn fail_job(&self, job_id: i64, message: &str) -> Result<(), DbError> {
        if self.fail_error_write.load(Ordering::SeqCst) {
            return Err(DbError::InvalidRow("simulated write failure".to_string()));
        }
        let mut inner = self.lock();
        match inner.jobs.get_mut(&job_id) {
            Some(job) if !job.status.is_terminal() => {
                job.status = JobStatus::Error;
                job.error = Some(message.to_string());
                job.finished_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(DbError::InvalidJobTransition {
                id: job_id,
                expected_status: "PENDING or RUNNING",
            }),
        }
    }

    async fn get_report(&self, job_id: i64) -> Result<Option<OverviewReport>, DbError> {
        Ok(self.report(job_id))
    }

    async fn list_trend_events(&self, job_id: i64) -> Result<Vec<TrendEvent>, DbError> {
        Ok(self.events(job_id))
    }

    async fn list_sources(&self, tenant_id: i64) -> Result<Vec<SourceRow>, DbError> {
        let inner = self.lock();
        let mut ids: Vec<i64> = inner
            .grants
            .iter()
            .filter(|(t, _)| *t == tenant_id)
            .map(|(_, s)| *s)
            .collect();
        ids.sort_unstable();
        Ok(ids
            .into_iter()
            .map(|id| SourceRow {
                id,
                name: format!("source-{id}"),
                source_type: "rss".to_string(),
                ingestion_mode: "historical".to_string(),
                config: serde_json::json!({}),
                created_at: Utc::now(),
            })
            .collect())
    }

    async fn source_stats(&self, tenant_id: i64, source_id: i64) -> Result<SourceStats, DbError> {
        let inner = self.lock();
        if !inner.grants.contains(&(tenant_id, source_id)) {
            return Err(DbError::NotFound);
        }
        let docs: Vec<&Document> = inner
            .documents
            .iter()
            .filter(|d| d.source_id == source_id)
            .collect();
        Ok(SourceStats {
            source_id,
            total_documents: i64::try_from(docs.len()).expect("count fits"),
            date_min: docs.iter().map(|d| d.published_at).min(),
            date_max: docs.iter().map(|d| d.published_at).max(),
        })
    }

    async fn reap_stale_running(
        &self,
        started_before: DateTime<Utc>,
        message: &str,
    ) -> Result<Vec<i64>, DbError> {
        let mut inner = self.lock();
        let mut reaped = Vec::new();
        for job in inner.jobs.values_mut() {
            if job.status == JobStatus::Running
                && job.started_at.is_some_and(|s| s < started_before)
            {
                job.status = JobStatus::Error;
                job.error = Some(message.to_string());
                job.finished_at = Some(Utc::now());
                reaped.push(job.id);
            }
        }
        Ok(reaped)
    }
}

// ---------------------------------------------------------------------------
// Queues
// ---------------------------------------------------------------------------

pub struct FailingQueue;

#[async_trait]
impl JobQueue for FailingQueue {
    async fn publish(&self, _message: JobMessage) -> Result<(), QueueError> {
        Err(QueueError::Unavailable("broker unreachable".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Classifiers
// ---------------------------------------------------------------------------

/// Labels each text by keyword: "good" → positive, "bad" → negative.
pub struct KeywordClassifier {
    labels: Vec<String>,
    emit_unmapped: bool,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self {
            labels: vec![
                "negative".to_string(),
                "neutral".to_string(),
                "positive".to_string(),
            ],
            emit_unmapped: false,
        }
    }

    /// Declares the canonical labels but emits `mixed` for every text.
    pub fn unmapped() -> Self {
        Self {
            emit_unmapped: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl TextClassifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    fn raw_labels(&self) -> &[String] {
        &self.labels
    }

    async fn classify_batch(&self, texts: &[&str]) -> Result<Vec<String>, SentimentError> {
        Ok(texts
            .iter()
            .map(|t| {
                if self.emit_unmapped {
                    "mixed"
                } else if t.contains("good") {
                    "positive"
                } else if t.contains("bad") {
                    "negative"
                } else {
                    "neutral"
                }
                .to_string()
            })
            .collect())
    }
}

pub struct BrokenClassifier {
    labels: Vec<String>,
}

impl BrokenClassifier {
    pub fn new() -> Self {
        Self {
            labels: vec!["neutral".to_string()],
        }
    }
}

#[async_trait]
impl TextClassifier for BrokenClassifier {
    fn name(&self) -> &str {
        "broken"
    }

    fn raw_labels(&self) -> &[String] {
        &self.labels
    }

    async fn classify_batch(&self, _texts: &[&str]) -> Result<Vec<String>, SentimentError> {
        Err(SentimentError::Classifier("CUDA out of memory".to_string()))
    }
}

pub fn aggregator(classifier: Arc<dyn TextClassifier>, fail_open: bool) -> SentimentAggregator {
    SentimentAggregator::new(
        classifier,
        LabelMap::default(),
        AggregatorSettings {
            enabled: true,
            fail_open,
            batch_size: 2,
        },
    )
    .expect("aggregator")
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const TENANT: i64 = 1;
pub const OTHER_TENANT: i64 = 2;
pub const SOURCE: i64 = 10;

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap()
}

pub fn january(query: Option<&str>) -> AnalysisScope {
    AnalysisScope::new(
        [SOURCE],
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap(),
        query,
    )
    .unwrap()
}

pub fn model() -> ModelRef {
    ModelRef {
        name: "rubert-tiny2".to_string(),
        version: "v1".to_string(),
    }
}

pub fn request(scope: AnalysisScope) -> pulse_analysis::SubmitRequest {
    pulse_analysis::SubmitRequest {
        tenant_id: TENANT,
        model: model(),
        scope,
        params: Map::new(),
    }
}

/// Store with `TENANT` granted `SOURCE`.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::default());
    store.grant(TENANT, SOURCE);
    store
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub queue: Arc<ChannelQueue>,
    pub service: Arc<AnalysisService>,
}

pub fn harness(store: Arc<MemoryStore>, sentiment: SentimentAggregator) -> Harness {
    let queue = Arc::new(ChannelQueue::new());
    let service = Arc::new(AnalysisService::new(
        store.clone(),
        queue.clone(),
        Arc::new(sentiment),
        TrendParams::default(),
    ));
    Harness {
        store,
        queue,
        service,
    }
}
