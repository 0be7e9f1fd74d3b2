//! Overview report: the persisted result of a `DONE` job.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalLabel {
    Negative,
    Neutral,
    Positive,
}

impl CanonicalLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalLabel::Negative => "negative",
            CanonicalLabel::Neutral => "neutral",
            CanonicalLabel::Positive => "positive",
        }
    }
}

impl fmt::Display for CanonicalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalLabel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "negative" => Ok(CanonicalLabel::Negative),
            "neutral" => Ok(CanonicalLabel::Neutral),
            "positive" => Ok(CanonicalLabel::Positive),
            other => Err(CoreError::UnknownLabel(other.to_string())),
        }
    }
}

/// Label share over the classified documents. Fractions sum to 1 up to rounding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentShare {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl SentimentShare {
    /// Fixed distribution used whenever no genuine model output exists.
    #[must_use]
    pub fn neutral_stub() -> Self {
        Self {
            negative: 0.0,
            neutral: 1.0,
            positive: 0.0,
        }
    }

    /// Normalize per-label counts into fractions. Zero counts yield the stub.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_counts(negative: usize, neutral: usize, positive: usize) -> Self {
        let total = negative + neutral + positive;
        if total == 0 {
            return Self::neutral_stub();
        }
        let total = total as f64;
        Self {
            negative: negative as f64 / total,
            neutral: neutral as f64 / total,
            positive: positive as f64 / total,
        }
    }

    #[must_use]
    pub fn get(&self, label: CanonicalLabel) -> f64 {
        match label {
            CanonicalLabel::Negative => self.negative,
            CanonicalLabel::Neutral => self.neutral,
            CanonicalLabel::Positive => self.positive,
        }
    }
}

/// Why a report's sentiment share is, or is not, genuine model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentMode {
    /// No texts to classify.
    Empty,
    /// Feature flag off; the classifier was not called.
    Disabled,
    /// Classifier ran successfully.
    Model,
    /// Classifier failed and fail-open substituted the stub.
    Fallback,
}

impl SentimentMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentMode::Empty => "empty",
            SentimentMode::Disabled => "disabled",
            SentimentMode::Model => "model",
            SentimentMode::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SentimentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(SentimentMode::Empty),
            "disabled" => Ok(SentimentMode::Disabled),
            "model" => Ok(SentimentMode::Model),
            "fallback" => Ok(SentimentMode::Fallback),
            other => Err(CoreError::UnknownSentimentMode(other.to_string())),
        }
    }
}

/// Audit metrics stored alongside a report, enough to reconstruct the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetrics {
    pub source_ids: Vec<i64>,
    /// ISO-8601 lower date bound.
    pub date_from: String,
    /// ISO-8601 upper date bound.
    pub date_to: String,
    /// Empty when the scope has no query.
    pub query: String,
    pub timeseries_days: usize,
    pub trends_found: usize,
    pub sentiment_mode: SentimentMode,
    /// Present only when `sentiment_mode` is `fallback`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewReport {
    pub job_id: i64,
    pub total_documents: i64,
    pub sentiment_share: SentimentShare,
    pub metrics: ReportMetrics,
    pub created_at: DateTime<Utc>,
}
