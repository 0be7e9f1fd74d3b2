//! Sentiment aggregation for analysis jobs.
//!
//! Wraps a text-classification capability (a remote inference endpoint or the
//! built-in lexicon) with batching, an explicit raw-to-canonical label table
//! and the `empty`/`disabled`/`model`/`fallback` degrade policy.

pub mod aggregator;
pub mod classifier;
pub mod error;
pub mod labels;
pub mod lexicon;

pub use aggregator::{AggregatorSettings, SentimentAggregator, SentimentOutcome};
pub use classifier::{HttpClassifier, TextClassifier, DEFAULT_RAW_LABELS};
pub use error::SentimentError;
pub use labels::LabelMap;
pub use lexicon::{lexicon_score, LexiconClassifier};
