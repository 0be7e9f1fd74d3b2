//! Analysis scope: which documents a job is allowed to see.
//!
//! A scope is normalized once, at construction, and is immutable afterwards.
//! Deserialization goes through the same constructor, so a scope read back
//! from a job row carries the same guarantees as one built from a request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CoreError, Document};

/// Inclusive `[start, end]` bound on `published_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyDateRange`] when `end` is not strictly after `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CoreError> {
        if end <= start {
            return Err(CoreError::EmptyDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Both ends are inclusive.
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScopeRecord", into = "ScopeRecord")]
pub struct AnalysisScope {
    source_ids: Vec<i64>,
    date_range: DateRange,
    query: Option<String>,
}

/// Wire/storage shape of a scope: `{source_ids, date_range: {start, end}, query}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScopeRecord {
    source_ids: Vec<i64>,
    date_range: DateRange,
    #[serde(default)]
    query: Option<String>,
}

impl AnalysisScope {
    /// Build a normalized scope.
    ///
    /// Duplicate source ids are dropped (first occurrence wins), the query is
    /// trimmed and a blank query becomes `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptySourceList`] for an empty source list, or
    /// [`CoreError::EmptyDateRange`] when the range is empty.
    pub fn new(
        source_ids: impl IntoIterator<Item = i64>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        query: Option<&str>,
    ) -> Result<Self, CoreError> {
        let mut ids: Vec<i64> = Vec::new();
        for id in source_ids {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Err(CoreError::EmptySourceList);
        }

        let date_range = DateRange::new(start, end)?;
        let query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        Ok(Self {
            source_ids: ids,
            date_range,
            query,
        })
    }

    #[must_use]
    pub fn source_ids(&self) -> &[i64] {
        &self.source_ids
    }

    #[must_use]
    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The scope predicate: source membership, inclusive date bounds, and a
    /// case-insensitive substring match of the query against title or body.
    ///
    /// The SQL in `pulse-db` encodes the same predicate; both must agree.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        self.source_ids.contains(&doc.source_id)
            && self.date_range.contains(doc.published_at)
            && self.matches_query(doc)
    }

    fn matches_query(&self, doc: &Document) -> bool {
        let Some(query) = &self.query else {
            return true;
        };
        let needle = fold_case(query);
        doc.title
            .as_deref()
            .is_some_and(|t| fold_case(t).contains(&needle))
            || fold_case(&doc.text).contains(&needle)
    }
}

/// Per-character lowercasing, as Postgres `lower()` does. Unlike
/// `str::to_lowercase` there is no context rule for a word-final sigma.
fn fold_case(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

impl TryFrom<ScopeRecord> for AnalysisScope {
    type Error = CoreError;

    fn try_from(record: ScopeRecord) -> Result<Self, Self::Error> {
        Self::new(
            record.source_ids,
            record.date_range.start,
            record.date_range.end,
            record.query.as_deref(),
        )
    }
}

impl From<AnalysisScope> for ScopeRecord {
    fn from(scope: AnalysisScope) -> Self {
        Self {
            source_ids: scope.source_ids,
            date_range: scope.date_range,
            query: scope.query,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn doc(source_id: i64, published_at: DateTime<Utc>, title: Option<&str>, text: &str) -> Document {
        Document {
            id: 1,
            source_id,
            published_at,
            title: title.map(str::to_string),
            text: text.to_string(),
            topic: None,
        }
    }

    #[test]
    fn rejects_empty_source_list() {
        let err = AnalysisScope::new(Vec::new(), ts(1, 0), ts(2, 0), None).unwrap_err();
        assert_eq!(err, CoreError::EmptySourceList);
    }

    #[test]
    fn rejects_end_not_after_start() {
        let err = AnalysisScope::new([1], ts(2, 0), ts(2, 0), None).unwrap_err();
        assert!(matches!(err, CoreError::EmptyDateRange { .. }));
    }

    #[test]
    fn dedups_sources_and_blanks_query() {
        let scope = AnalysisScope::new([3, 1, 3], ts(1, 0), ts(2, 0), Some("   ")).unwrap();
        assert_eq!(scope.source_ids(), &[3, 1]);
        assert!(scope.query().is_none());
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let scope = AnalysisScope::new([1], ts(1, 0), ts(5, 0), None).unwrap();
        assert!(scope.matches(&doc(1, ts(1, 0), None, "x")));
        assert!(scope.matches(&doc(1, ts(5, 0), None, "x")));
        assert!(!scope.matches(&doc(1, ts(5, 1), None, "x")));
    }

    #[test]
    fn foreign_source_never_matches() {
        let scope = AnalysisScope::new([1], ts(1, 0), ts(5, 0), None).unwrap();
        assert!(!scope.matches(&doc(2, ts(2, 0), None, "x")));
    }

    #[test]
    fn query_matches_title_or_body_case_insensitively() {
        let scope = AnalysisScope::new([1], ts(1, 0), ts(5, 0), Some(" Ruble ")).unwrap();
        assert!(scope.matches(&doc(1, ts(2, 0), Some("RUBLE falls"), "nothing")));
        assert!(scope.matches(&doc(1, ts(2, 0), None, "the ruble rallied")));
        assert!(!scope.matches(&doc(1, ts(2, 0), Some("oil"), "gas prices")));
    }

    #[test]
    fn query_folding_has_no_final_sigma_rule() {
        let scope = AnalysisScope::new([1], ts(1, 0), ts(5, 0), Some("οδοσ")).unwrap();
        assert!(scope.matches(&doc(1, ts(2, 0), Some("ΟΔΟΣ"), "")));
        assert!(scope.matches(&doc(1, ts(2, 0), None, "ΝΕΑ ΟΔΟΣ ΑΘΗΝΑ")));
    }

    #[test]
    fn serializes_to_storage_shape_and_back() {
        let scope = AnalysisScope::new([7], ts(1, 0), ts(3, 0), Some("grain")).unwrap();
        let value = serde_json::to_value(&scope).unwrap();
        assert_eq!(value["source_ids"], serde_json::json!([7]));
        assert_eq!(value["date_range"]["start"], "2024-03-01T00:00:00Z");
        assert_eq!(value["query"], "grain");

        let back: AnalysisScope = serde_json::from_value(value).unwrap();
        assert_eq!(back, scope);
    }

    #[test]
    fn deserializing_invalid_range_fails() {
        let value = serde_json::json!({
            "source_ids": [1],
            "date_range": { "start": "2024-03-02T00:00:00Z", "end": "2024-03-01T00:00:00Z" },
            "query": null
        });
        assert!(serde_json::from_value::<AnalysisScope>(value).is_err());
    }
}
