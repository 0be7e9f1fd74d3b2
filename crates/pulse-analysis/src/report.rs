//! Assembly of the overview report for a finished run.

use chrono::{DateTime, Utc};
use pulse_core::{
    AnalysisScope, DailyCountPoint, OverviewReport, ReportMetrics, SentimentMode, TrendEvent,
};
use pulse_sentiment::SentimentOutcome;

/// Everything a report is derived from.
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub job_id: i64,
    pub scope: &'a AnalysisScope,
    /// Number of documents that fed the sentiment computation.
    pub documents_used: usize,
    pub sentiment: &'a SentimentOutcome,
    pub series: &'a [DailyCountPoint],
    pub events: &'a [TrendEvent],
}

/// Build the report. The failure reason is kept only in `fallback` mode.
#[must_use]
pub fn build_report(inputs: &ReportInputs<'_>, created_at: DateTime<Utc>) -> OverviewReport {
    let range = inputs.scope.date_range();
    let sentiment_error = match inputs.sentiment.mode {
        SentimentMode::Fallback => inputs.sentiment.degrade_reason.clone(),
        SentimentMode::Empty | SentimentMode::Disabled | SentimentMode::Model => None,
    };

    OverviewReport {
        job_id: inputs.job_id,
        total_documents: i64::try_from(inputs.documents_used).unwrap_or(i64::MAX),
        sentiment_share: inputs.sentiment.share,
        metrics: ReportMetrics {
            source_ids: inputs.scope.source_ids().to_vec(),
            date_from: range.start.to_rfc3339(),
            date_to: range.end.to_rfc3339(),
            query: inputs.scope.query().unwrap_or_default().to_string(),
            timeseries_days: inputs.series.len(),
            trends_found: inputs.events.len(),
            sentiment_mode: inputs.sentiment.mode,
            sentiment_error,
        },
        created_at,
    }
}
