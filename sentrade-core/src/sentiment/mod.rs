//! Sentiment estimation over a batch of headlines.
//!
//! The estimator owns the aggregation rule; the classifier behind it is a
//! collaborator that turns text into per-class logits. Two classifiers ship
//! with the crate:
//! - [`InferenceClient`]: HTTP client for a hosted text-classification model
//! - [`LexiconClassifier`]: offline word-list scorer for demos and tests

pub mod estimator;
pub mod inference;
pub mod lexicon;

pub use estimator::{softmax, SentimentEstimator};
pub use inference::InferenceClient;
pub use lexicon::LexiconClassifier;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of classes produced by the classifier.
pub const NUM_CLASSES: usize = 3;

/// Per-headline logits, indexed in [`SentimentLabel::ALL`] order.
pub type Logits = [f64; NUM_CLASSES];

/// Classifier output class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Class order of the logit vector.
    pub const ALL: [SentimentLabel; NUM_CLASSES] = [
        SentimentLabel::Positive,
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
    ];

    pub fn index(&self) -> usize {
        match self {
            SentimentLabel::Positive => 0,
            SentimentLabel::Negative => 1,
            SentimentLabel::Neutral => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = SentimentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            other => Err(SentimentError::UnknownLabel(other.to_string())),
        }
    }
}

/// Aggregate sentiment of a headline batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    /// Probability of `label` under the aggregated distribution, in `[0, 1]`.
    pub probability: f64,
    pub label: SentimentLabel,
}

impl SentimentResult {
    /// Result for an empty batch.
    pub fn neutral() -> Self {
        Self {
            probability: 0.0,
            label: SentimentLabel::Neutral,
        }
    }
}

/// Errors from the classifier or the aggregation step.
#[derive(Debug, Error)]
pub enum SentimentError {
    #[error("inference request failed: {0}")]
    Request(String),

    #[error("inference server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed classifier output: {0}")]
    Malformed(String),

    #[error("unknown sentiment label '{0}'")]
    UnknownLabel(String),
}

/// Tokenizer + sequence-classification model.
///
/// Implementations receive the whole batch at once (padding is theirs to
/// handle) and return one logit row per input, in input order.
pub trait SequenceClassifier: Send + Sync {
    /// Human-readable model name.
    fn name(&self) -> &str;

    /// Classify a non-empty batch of texts.
    fn logits(&self, texts: &[String]) -> Result<Vec<Logits>, SentimentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_order_matches_index() {
        for (i, label) in SentimentLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
        }
    }

    #[test]
    fn label_parses_case_insensitively() {
        assert_eq!("POSITIVE".parse::<SentimentLabel>().unwrap(), SentimentLabel::Positive);
        assert_eq!(" neutral ".parse::<SentimentLabel>().unwrap(), SentimentLabel::Neutral);
        assert!("bullish".parse::<SentimentLabel>().is_err());
    }
}
