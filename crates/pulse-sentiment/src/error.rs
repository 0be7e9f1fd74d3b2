use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentimentError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The classification capability failed or returned an unusable response.
    #[error("classifier error: {0}")]
    Classifier(String),

    /// The classifier emitted a raw label with no entry in the label table.
    #[error("unmapped classifier label: {0}")]
    UnmappedLabel(String),

    /// The label table could not be parsed or does not cover the classifier.
    #[error("invalid label map: {0}")]
    InvalidLabelMap(String),

    /// Aggregator settings that cannot produce a working classifier.
    #[error("invalid sentiment settings: {0}")]
    InvalidSettings(String),
}

impl SentimentError {
    /// Configuration faults are never absorbed by the fail-open policy.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SentimentError::UnmappedLabel(_)
                | SentimentError::InvalidLabelMap(_)
                | SentimentError::InvalidSettings(_)
        )
    }
}
