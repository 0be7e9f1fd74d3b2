//! Batching, normalization and the degrade policy around a [`TextClassifier`].

use std::sync::Arc;

use pulse_core::{AppConfig, CanonicalLabel, SentimentBackend, SentimentMode, SentimentShare};

use crate::classifier::{HttpClassifier, TextClassifier};
use crate::error::SentimentError;
use crate::labels::LabelMap;
use crate::lexicon::LexiconClassifier;

const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorSettings {
    /// Feature flag. When off the classifier is never called.
    pub enabled: bool,
    /// Substitute the neutral stub on classifier failure instead of failing.
    pub fail_open: bool,
    pub batch_size: usize,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            fail_open: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl AggregatorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            enabled: config.sentiment_enabled,
            fail_open: config.sentiment_fail_open,
            batch_size: config.sentiment_batch_size,
        }
    }
}

/// Result of one aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentOutcome {
    pub share: SentimentShare,
    pub mode: SentimentMode,
    /// Set only in [`SentimentMode::Fallback`].
    pub degrade_reason: Option<String>,
}

impl SentimentOutcome {
    fn stub(mode: SentimentMode) -> Self {
        Self {
            share: SentimentShare::neutral_stub(),
            mode,
            degrade_reason: None,
        }
    }
}

pub struct SentimentAggregator {
    classifier: Option<Arc<dyn TextClassifier>>,
    labels: LabelMap,
    settings: AggregatorSettings,
}

impl SentimentAggregator {
    /// Wrap a classifier, validating up front that `labels` covers every raw
    /// label it declares.
    ///
    /// # Errors
    ///
    /// Returns [`SentimentError::InvalidSettings`] if `batch_size` is zero, or
    /// [`SentimentError::InvalidLabelMap`] if a declared label is unmapped.
    pub fn new(
        classifier: Arc<dyn TextClassifier>,
        labels: LabelMap,
        settings: AggregatorSettings,
    ) -> Result<Self, SentimentError> {
        if settings.batch_size == 0 {
            return Err(SentimentError::InvalidSettings(
                "batch size must be greater than zero".to_string(),
            ));
        }
        labels.validate_covers(classifier.raw_labels())?;
        Ok(Self {
            classifier: Some(classifier),
            labels,
            settings,
        })
    }

    /// An aggregator with no classifier; every non-empty input is `disabled`.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            classifier: None,
            labels: LabelMap::default(),
            settings: AggregatorSettings::default(),
        }
    }

    /// Build the aggregator the configuration describes. With the feature
    /// flag off no classifier is constructed at all.
    ///
    /// # Errors
    ///
    /// Returns [`SentimentError`] if the label table is malformed or does not
    /// cover the classifier, or the HTTP client cannot be built.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, SentimentError> {
        if !config.sentiment_enabled {
            return Ok(Self::disabled());
        }

        let labels = match config.sentiment_label_map.as_deref() {
            Some(table) => LabelMap::parse(table)?,
            None => LabelMap::default(),
        };

        let classifier: Arc<dyn TextClassifier> = match config.sentiment_backend {
            SentimentBackend::Lexicon => Arc::new(LexiconClassifier::new()),
            SentimentBackend::Http => {
                let url = config.classifier_url.as_deref().ok_or_else(|| {
                    SentimentError::InvalidSettings("no classifier URL configured".to_string())
                })?;
                let client = HttpClassifier::new(url, config.classifier_timeout_secs)?;
                // A custom table declares the deployed model's label set.
                let client = if config.sentiment_label_map.is_some() {
                    let raw = labels.raw_labels().map(str::to_string).collect();
                    client.with_raw_labels(raw)
                } else {
                    client
                };
                Arc::new(client)
            }
        };

        Self::new(
            classifier,
            labels,
            AggregatorSettings::from_app_config(config),
        )
    }

    #[must_use]
    pub fn settings(&self) -> AggregatorSettings {
        self.settings
    }

    /// Classify `texts` and reduce them to a label share.
    ///
    /// Degrade modes are checked in order: `empty`, `disabled`, then the
    /// classifier runs and yields `model`, or `fallback` if it failed and
    /// fail-open is on.
    ///
    /// # Errors
    ///
    /// Returns the classifier's error when fail-open is off, and always
    /// returns [`SentimentError::UnmappedLabel`] for an unmapped raw label.
    pub async fn aggregate(&self, texts: &[&str]) -> Result<SentimentOutcome, SentimentError> {
        if texts.is_empty() {
            return Ok(SentimentOutcome::stub(SentimentMode::Empty));
        }

        let Some(classifier) = self.classifier.as_deref().filter(|_| self.settings.enabled) else {
            return Ok(SentimentOutcome::stub(SentimentMode::Disabled));
        };

        match self.classify_all(classifier, texts).await {
            Ok(share) => Ok(SentimentOutcome {
                share,
                mode: SentimentMode::Model,
                degrade_reason: None,
            }),
            Err(e) if e.is_configuration() => Err(e),
            Err(e) if self.settings.fail_open => {
                tracing::warn!(
                    classifier = classifier.name(),
                    error = %e,
                    "classification failed; substituting neutral stub"
                );
                Ok(SentimentOutcome {
                    share: SentimentShare::neutral_stub(),
                    mode: SentimentMode::Fallback,
                    degrade_reason: Some(e.to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn classify_all(
        &self,
        classifier: &dyn TextClassifier,
        texts: &[&str],
    ) -> Result<SentimentShare, SentimentError> {
        let (mut negative, mut neutral, mut positive) = (0_usize, 0_usize, 0_usize);

        for chunk in texts.chunks(self.settings.batch_size) {
            let raw = classifier.classify_batch(chunk).await?;
            if raw.len() != chunk.len() {
                return Err(SentimentError::Classifier(format!(
                    "classifier returned {} labels for {} inputs",
                    raw.len(),
                    chunk.len()
                )));
            }
            for label in &raw {
                match self.labels.resolve(label)? {
                    CanonicalLabel::Negative => negative += 1,
                    CanonicalLabel::Neutral => neutral += 1,
                    CanonicalLabel::Positive => positive += 1,
                }
            }
        }

        tracing::debug!(
            classifier = classifier.name(),
            texts = texts.len(),
            negative,
            neutral,
            positive,
            "classification complete"
        );
        Ok(SentimentShare::from_counts(negative, neutral, positive))
    }
}
