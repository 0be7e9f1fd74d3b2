//! Text-classification capability and its HTTP implementation.
//!
//! The HTTP client speaks the text-embeddings-inference `/predict` contract:
//! a batch request `{"inputs": [..]}` answered with one list of
//! `{label, score}` candidates per input.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::SentimentError;

/// Labels emitted by the default three-class sentiment head.
pub const DEFAULT_RAW_LABELS: [&str; 3] = ["negative", "neutral", "positive"];

/// A capability that assigns one raw label per input text.
///
/// Constructed once at process start and shared by reference.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Every raw label this classifier may emit.
    fn raw_labels(&self) -> &[String];

    /// Classify one batch. Must return exactly one label per input, in order.
    async fn classify_batch(&self, texts: &[&str]) -> Result<Vec<String>, SentimentError>;
}

/// Client for a remote sequence-classification endpoint.
pub struct HttpClassifier {
    client: Client,
    url: String,
    raw_labels: Vec<String>,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    inputs: &'a [&'a str],
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    label: String,
    score: f64,
}

impl HttpClassifier {
    /// Create a client posting to `{base_url}/predict`, declaring the default
    /// three-class label set.
    ///
    /// # Errors
    ///
    /// Returns [`SentimentError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, SentimentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("pulse/0.1 (sentiment)")
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/predict", base_url.trim_end_matches('/')),
            raw_labels: DEFAULT_RAW_LABELS.iter().map(ToString::to_string).collect(),
        })
    }

    /// Declare the raw label set the deployed model emits.
    #[must_use]
    pub fn with_raw_labels(mut self, labels: Vec<String>) -> Self {
        self.raw_labels = labels;
        self
    }
}

#[async_trait]
impl TextClassifier for HttpClassifier {
    fn name(&self) -> &str {
        "http"
    }

    fn raw_labels(&self) -> &[String] {
        &self.raw_labels
    }

    async fn classify_batch(&self, texts: &[&str]) -> Result<Vec<String>, SentimentError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = PredictRequest {
            inputs: texts,
            truncate: true,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SentimentError::Classifier(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(SentimentError::Classifier(format!(
                "endpoint returned status {}",
                response.status()
            )));
        }

        let predictions: Vec<Vec<Prediction>> = response
            .json()
            .await
            .map_err(|e| SentimentError::Classifier(format!("response parse error: {e}")))?;

        if predictions.len() != texts.len() {
            return Err(SentimentError::Classifier(format!(
                "endpoint returned {} predictions for {} inputs",
                predictions.len(),
                texts.len()
            )));
        }

        predictions
            .into_iter()
            .enumerate()
            .map(|(i, candidates)| {
                top_label(candidates).ok_or_else(|| {
                    SentimentError::Classifier(format!("no candidates for input {i}"))
                })
            })
            .collect()
    }
}

fn top_label(candidates: Vec<Prediction>) -> Option<String> {
    candidates
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|p| p.label)
}
