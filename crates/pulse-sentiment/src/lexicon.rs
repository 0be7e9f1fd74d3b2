//! Offline word-weight classifier for deployments without an inference endpoint.

use async_trait::async_trait;

use crate::classifier::{TextClassifier, DEFAULT_RAW_LABELS};
use crate::error::SentimentError;

/// Word weights.
///
/// Keys are lowercase single words. Values in `(0.0, 1.0]` are positive,
/// in `[-1.0, 0.0)` are negative. The final score is clamped to `[-1.0, 1.0]`.
pub(crate) const LEXICON: &[(&str, f32)] = &[
    // Positive
    ("good", 0.3),
    ("great", 0.4),
    ("excellent", 0.5),
    ("positive", 0.4),
    ("success", 0.4),
    ("successful", 0.4),
    ("growth", 0.3),
    ("growing", 0.3),
    ("gain", 0.3),
    ("gains", 0.3),
    ("improve", 0.3),
    ("improved", 0.3),
    ("record", 0.2),
    ("win", 0.4),
    ("wins", 0.4),
    ("agreement", 0.3),
    ("support", 0.2),
    ("recovery", 0.3),
    ("best", 0.5),
    ("love", 0.5),
    // Negative
    ("bad", -0.4),
    ("terrible", -0.6),
    ("worst", -0.6),
    ("negative", -0.4),
    ("crisis", -0.6),
    ("collapse", -0.6),
    ("decline", -0.4),
    ("loss", -0.4),
    ("losses", -0.4),
    ("fraud", -0.7),
    ("scandal", -0.6),
    ("lawsuit", -0.5),
    ("ban", -0.5),
    ("banned", -0.5),
    ("failed", -0.4),
    ("failure", -0.4),
    ("problem", -0.3),
    ("concern", -0.3),
    ("warning", -0.4),
    ("attack", -0.6),
];

/// Score a text by summing matching word weights, clamped to `[-1.0, 1.0]`.
/// Returns `0.0` for empty or unknown text.
#[must_use]
pub fn lexicon_score(text: &str) -> f32 {
    let mut score = 0.0_f32;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        if let Some(&(_, weight)) = LEXICON.iter().find(|(lex_word, _)| *lex_word == w) {
            score += weight;
        }
    }
    score.clamp(-1.0, 1.0)
}

/// [`TextClassifier`] over [`lexicon_score`]: `> 0` is `positive`, `< 0` is
/// `negative`, anything else `neutral`.
pub struct LexiconClassifier {
    raw_labels: Vec<String>,
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self {
            raw_labels: DEFAULT_RAW_LABELS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl LexiconClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn label_for(text: &str) -> &'static str {
        let score = lexicon_score(text);
        if score > 0.0 {
            "positive"
        } else if score < 0.0 {
            "negative"
        } else {
            "neutral"
        }
    }
}

#[async_trait]
impl TextClassifier for LexiconClassifier {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn raw_labels(&self) -> &[String] {
        &self.raw_labels
    }

    async fn classify_batch(&self, texts: &[&str]) -> Result<Vec<String>, SentimentError> {
        Ok(texts
            .iter()
            .map(|text| Self::label_for(text).to_string())
            .collect())
    }
}
