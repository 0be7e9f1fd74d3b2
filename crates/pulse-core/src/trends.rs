//! Rolling z-score trend detection over a daily document-count series.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CoreError, Document};

const MIN_HISTORY_FLOOR: usize = 3;
const DEGENERATE_STD: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendParams {
    /// Number of preceding points in the rolling history.
    pub window: usize,
    pub z_threshold: f64,
    /// Series shorter than this produce no events.
    pub min_points: usize,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            window: 5,
            z_threshold: 2.0,
            min_points: 8,
        }
    }
}

/// Document count for one UTC calendar day. Days without documents are absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCountPoint {
    pub day: NaiveDate,
    pub value: u64,
}

impl DailyCountPoint {
    /// UTC midnight of `day`.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        utc_midnight(self.day)
    }
}

fn utc_midnight(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendKind {
    Spike,
    Drop,
}

impl TrendKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TrendKind::Spike => "spike",
            TrendKind::Drop => "drop",
        }
    }
}

impl fmt::Display for TrendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spike" => Ok(TrendKind::Spike),
            "drop" => Ok(TrendKind::Drop),
            other => Err(CoreError::UnknownTrendKind(other.to_string())),
        }
    }
}

/// Detector output for one anomalous day, before it is attached to a job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSignal {
    /// Index into the input series.
    pub index: usize,
    pub day: NaiveDate,
    pub kind: TrendKind,
    pub value: f64,
    /// Mean of the history window.
    pub baseline: f64,
    pub z: f64,
}

impl TrendSignal {
    #[must_use]
    pub fn into_event(self, job_id: i64) -> TrendEvent {
        TrendEvent {
            job_id,
            ts: utc_midnight(self.day),
            kind: self.kind,
            value: self.value,
            baseline: self.baseline,
            z: self.z,
        }
    }
}

/// A persisted trend event, permanently attached to its job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendEvent {
    pub job_id: i64,
    pub ts: DateTime<Utc>,
    pub kind: TrendKind,
    pub value: f64,
    pub baseline: f64,
    pub z: f64,
}

/// Group documents by the UTC calendar day of `published_at`.
///
/// The result is sorted strictly ascending by day.
#[must_use]
pub fn build_daily_series(docs: &[Document]) -> Vec<DailyCountPoint> {
    let mut buckets: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for doc in docs {
        *buckets.entry(doc.published_at.date_naive()).or_insert(0) += 1;
    }
    buckets
        .into_iter()
        .map(|(day, value)| DailyCountPoint { day, value })
        .collect()
}

/// Detect spikes and drops with a rolling z-score.
///
/// For each index `i` the history is the up-to-`window` points strictly before
/// `i`. An index is skipped when the history is shorter than
/// `max(3, window / 2)` or its sample standard deviation is below `1e-9`.
/// Otherwise `z = (value - mean) / std` and an event is emitted when
/// `|z| >= z_threshold`. Events come out in series order, at most one per index.
///
/// `series` must be sorted strictly ascending by day.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn detect_trends(series: &[DailyCountPoint], params: &TrendParams) -> Vec<TrendSignal> {
    debug_assert!(
        series.windows(2).all(|w| w[0].day < w[1].day),
        "daily series must be strictly ascending"
    );

    if series.len() < params.min_points {
        return Vec::new();
    }

    let values: Vec<f64> = series.iter().map(|p| p.value as f64).collect();
    let min_history = MIN_HISTORY_FLOOR.max(params.window / 2);
    let mut events = Vec::new();

    for (i, point) in series.iter().enumerate() {
        let history = &values[i.saturating_sub(params.window)..i];
        if history.len() < min_history {
            continue;
        }

        let n = history.len() as f64;
        let mean = history.iter().sum::<f64>() / n;
        let denom = history.len().saturating_sub(1).max(1) as f64;
        let variance = history.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / denom;
        let std = variance.sqrt();
        if std < DEGENERATE_STD {
            continue;
        }

        let value = values[i];
        let z = (value - mean) / std;
        let kind = if z >= params.z_threshold {
            TrendKind::Spike
        } else if z <= -params.z_threshold {
            TrendKind::Drop
        } else {
            continue;
        };

        events.push(TrendSignal {
            index: i,
            day: point.day,
            kind,
            value,
            baseline: mean,
            z,
        });
    }

    events
}
