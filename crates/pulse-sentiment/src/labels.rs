//! Explicit raw-label → canonical-label table.
//!
//! Every raw label a classifier can emit must have an entry. Lookups are
//! exact; there is no fuzzy matching and no default bucket.

use std::collections::BTreeMap;

use pulse_core::CanonicalLabel;

use crate::error::SentimentError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    entries: BTreeMap<String, CanonicalLabel>,
}

impl Default for LabelMap {
    /// Identity table for classifiers that already emit canonical names.
    fn default() -> Self {
        let entries = [
            CanonicalLabel::Negative,
            CanonicalLabel::Neutral,
            CanonicalLabel::Positive,
        ]
        .into_iter()
        .map(|label| (label.as_str().to_string(), label))
        .collect();
        Self { entries }
    }
}

impl LabelMap {
    /// Build a table from `(raw, canonical)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`SentimentError::InvalidLabelMap`] if the table is empty, a raw
    /// label is blank, or the same raw label maps to two canonical labels.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, SentimentError>
    where
        I: IntoIterator<Item = (S, CanonicalLabel)>,
        S: Into<String>,
    {
        let mut entries = BTreeMap::new();
        for (raw, canonical) in pairs {
            let raw: String = raw.into();
            if raw.trim().is_empty() {
                return Err(SentimentError::InvalidLabelMap(
                    "raw label must not be blank".to_string(),
                ));
            }
            if let Some(existing) = entries.insert(raw.clone(), canonical) {
                if existing != canonical {
                    return Err(SentimentError::InvalidLabelMap(format!(
                        "raw label `{raw}` maps to both {existing} and {canonical}"
                    )));
                }
            }
        }
        if entries.is_empty() {
            return Err(SentimentError::InvalidLabelMap(
                "label map has no entries".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    /// Parse the `raw=canonical,raw=canonical` override format.
    ///
    /// # Errors
    ///
    /// Returns [`SentimentError::InvalidLabelMap`] on a malformed entry or an
    /// unknown canonical label.
    pub fn parse(table: &str) -> Result<Self, SentimentError> {
        let mut pairs = Vec::new();
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (raw, canonical) = entry.split_once('=').ok_or_else(|| {
                SentimentError::InvalidLabelMap(format!("entry `{entry}` is not raw=canonical"))
            })?;
            let canonical: CanonicalLabel = canonical
                .trim()
                .parse()
                .map_err(|e| SentimentError::InvalidLabelMap(format!("entry `{entry}`: {e}")))?;
            pairs.push((raw.trim().to_string(), canonical));
        }
        Self::from_pairs(pairs)
    }

    #[must_use]
    pub fn get(&self, raw: &str) -> Option<CanonicalLabel> {
        self.entries.get(raw).copied()
    }

    /// # Errors
    ///
    /// Returns [`SentimentError::UnmappedLabel`] if `raw` has no entry.
    pub fn resolve(&self, raw: &str) -> Result<CanonicalLabel, SentimentError> {
        self.get(raw)
            .ok_or_else(|| SentimentError::UnmappedLabel(raw.to_string()))
    }

    /// Check at load time that every label a classifier declares is mapped.
    ///
    /// # Errors
    ///
    /// Returns [`SentimentError::InvalidLabelMap`] naming the missing labels.
    pub fn validate_covers(&self, raw_labels: &[String]) -> Result<(), SentimentError> {
        let missing: Vec<&str> = raw_labels
            .iter()
            .filter(|raw| !self.entries.contains_key(raw.as_str()))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SentimentError::InvalidLabelMap(format!(
                "no entry for classifier label(s): {}",
                missing.join(", ")
            )))
        }
    }

    pub fn raw_labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
