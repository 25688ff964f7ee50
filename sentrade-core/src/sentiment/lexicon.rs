//! Offline lexicon classifier.
//!
//! Scores each headline against a small financial word list and emits
//! pseudo-logits `[gain * pos, gain * neg, neutral_bias]`. A headline with no
//! sentiment-bearing words therefore leans neutral. Negations ("not", "no",
//! "never", ...) flip the polarity of the next scored word.

use super::{Logits, SentimentError, SequenceClassifier};
use std::collections::HashMap;

const POSITIVE: &[(&str, f64)] = &[
    ("beat", 0.7),
    ("beats", 0.7),
    ("boost", 0.6),
    ("boosts", 0.6),
    ("bullish", 0.8),
    ("gain", 0.6),
    ("gains", 0.6),
    ("growth", 0.5),
    ("higher", 0.4),
    ("jump", 0.6),
    ("jumps", 0.6),
    ("outperform", 0.7),
    ("profit", 0.6),
    ("rally", 0.8),
    ("rallies", 0.8),
    ("record", 0.5),
    ("rebound", 0.6),
    ("rise", 0.5),
    ("rises", 0.5),
    ("soar", 0.9),
    ("soars", 0.9),
    ("strong", 0.5),
    ("surge", 0.8),
    ("surges", 0.8),
    ("upgrade", 0.7),
    ("upgraded", 0.7),
];

const NEGATIVE: &[(&str, f64)] = &[
    ("bearish", 0.8),
    ("crash", 0.9),
    ("crashes", 0.9),
    ("cut", 0.5),
    ("cuts", 0.5),
    ("decline", 0.6),
    ("declines", 0.6),
    ("default", 0.8),
    ("downgrade", 0.7),
    ("downgraded", 0.7),
    ("drop", 0.6),
    ("drops", 0.6),
    ("fall", 0.5),
    ("falls", 0.5),
    ("fear", 0.6),
    ("fears", 0.6),
    ("layoffs", 0.7),
    ("loss", 0.6),
    ("losses", 0.6),
    ("lower", 0.4),
    ("miss", 0.7),
    ("misses", 0.7),
    ("plunge", 0.9),
    ("plunges", 0.9),
    ("recession", 0.8),
    ("selloff", 0.8),
    ("slump", 0.8),
    ("weak", 0.5),
];

const NEGATIONS: &[&str] = &["not", "no", "never", "without", "nor"];

/// Word-list classifier producing pseudo-logits.
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    weights: HashMap<&'static str, f64>,
    gain: f64,
    neutral_bias: f64,
}

impl LexiconClassifier {
    pub fn new() -> Self {
        let mut weights = HashMap::new();
        for &(word, w) in POSITIVE {
            weights.insert(word, w);
        }
        for &(word, w) in NEGATIVE {
            weights.insert(word, -w);
        }
        Self {
            weights,
            gain: 3.0,
            neutral_bias: 1.0,
        }
    }

    /// Scale applied to the polarity sums.
    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    /// Returns (positive mass, negative mass) for one text.
    fn polarity(&self, text: &str) -> (f64, f64) {
        let mut pos = 0.0;
        let mut neg = 0.0;
        let mut negate = false;

        for token in text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|t| !t.is_empty())
        {
            let word = token.to_lowercase();
            if NEGATIONS.contains(&word.as_str()) || word.ends_with("n't") {
                negate = true;
                continue;
            }
            if let Some(&w) = self.weights.get(word.as_str()) {
                let w = if negate { -w } else { w };
                if w > 0.0 {
                    pos += w;
                } else {
                    neg -= w;
                }
                negate = false;
            }
        }
        (pos, neg)
    }
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceClassifier for LexiconClassifier {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn logits(&self, texts: &[String]) -> Result<Vec<Logits>, SentimentError> {
        Ok(texts
            .iter()
            .map(|t| {
                let (pos, neg) = self.polarity(t);
                [self.gain * pos, self.gain * neg, self.neutral_bias]
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logits_of(text: &str) -> Logits {
        LexiconClassifier::new()
            .logits(&[text.to_string()])
            .unwrap()[0]
    }

    #[test]
    fn positive_headline_leans_positive() {
        let l = logits_of("Stocks surge to record as earnings beat");
        assert!(l[0] > l[1]);
        assert!(l[0] > l[2]);
    }

    #[test]
    fn negative_headline_leans_negative() {
        let l = logits_of("Shares plunge after guidance miss");
        assert!(l[1] > l[0]);
        assert!(l[1] > l[2]);
    }

    #[test]
    fn plain_headline_leans_neutral() {
        let l = logits_of("Company schedules annual shareholder meeting");
        assert_eq!(l, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn negation_flips_next_word() {
        let l = logits_of("Analysts do not expect a rally");
        assert_eq!(l[0], 0.0);
        assert!(l[1] > 0.0);
        let l = logits_of("Revenue didn't decline");
        assert!(l[0] > 0.0);
        assert_eq!(l[1], 0.0);
    }

    #[test]
    fn one_row_per_text() {
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(LexiconClassifier::new().logits(&texts).unwrap().len(), 3);
    }
}
