//! Batch aggregation: sum logits across headlines, softmax, arg-max.
//!
//! Summing (rather than averaging or voting) means confidence grows with the
//! number of same-direction headlines. Trading outcomes depend on this, so
//! the rule is kept as is.

use super::{Logits, SentimentError, SentimentLabel, SentimentResult, SequenceClassifier, NUM_CLASSES};
use std::sync::Arc;
use tracing::debug;

/// Turns a headline batch into one `(probability, label)` pair.
#[derive(Clone)]
pub struct SentimentEstimator {
    classifier: Arc<dyn SequenceClassifier>,
}

impl SentimentEstimator {
    pub fn new(classifier: Arc<dyn SequenceClassifier>) -> Self {
        Self { classifier }
    }

    /// Name of the underlying classifier.
    pub fn model_name(&self) -> &str {
        self.classifier.name()
    }

    /// Estimate aggregate sentiment.
    ///
    /// An empty batch returns `(0.0, neutral)` without calling the classifier.
    pub fn estimate(&self, headlines: &[String]) -> Result<SentimentResult, SentimentError> {
        if headlines.is_empty() {
            return Ok(SentimentResult::neutral());
        }

        let rows = self.classifier.logits(headlines)?;
        if rows.len() != headlines.len() {
            return Err(SentimentError::Malformed(format!(
                "expected {} logit rows, got {}",
                headlines.len(),
                rows.len()
            )));
        }

        let summed = sum_logits(&rows)?;
        let probs = softmax(&summed);
        let best = argmax(&probs);
        let result = SentimentResult {
            probability: probs[best],
            label: SentimentLabel::ALL[best],
        };

        debug!(
            model = self.classifier.name(),
            headlines = headlines.len(),
            label = %result.label,
            probability = result.probability,
            "estimated sentiment"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for SentimentEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentimentEstimator")
            .field("classifier", &self.classifier.name())
            .finish()
    }
}

/// Element-wise sum of the logit rows.
fn sum_logits(rows: &[Logits]) -> Result<Logits, SentimentError> {
    let mut summed = [0.0; NUM_CLASSES];
    for (i, row) in rows.iter().enumerate() {
        if row.iter().any(|v| !v.is_finite()) {
            return Err(SentimentError::Malformed(format!(
                "non-finite logit in row {i}"
            )));
        }
        for (acc, v) in summed.iter_mut().zip(row) {
            *acc += v;
        }
    }
    Ok(summed)
}

/// Numerically stable softmax.
pub fn softmax(logits: &Logits) -> Logits {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut out = [0.0; NUM_CLASSES];
    let mut total = 0.0;
    for (o, &l) in out.iter_mut().zip(logits) {
        *o = (l - max).exp();
        total += *o;
    }
    for o in &mut out {
        *o /= total;
    }
    out
}

/// Index of the largest value; ties go to the lowest index.
fn argmax(values: &Logits) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed rows and counts calls.
    struct FixedClassifier {
        rows: Vec<Logits>,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn new(rows: Vec<Logits>) -> Self {
            Self {
                rows,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SequenceClassifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        fn logits(&self, texts: &[String]) -> Result<Vec<Logits>, SentimentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.iter().cycle().take(texts.len()).copied().collect())
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("headline {i}")).collect()
    }

    #[test]
    fn empty_batch_is_neutral_without_inference() {
        let clf = Arc::new(FixedClassifier::new(vec![[5.0, 0.0, 0.0]]));
        let est = SentimentEstimator::new(clf.clone());
        let result = est.estimate(&[]).unwrap();
        assert_eq!(result, SentimentResult::neutral());
        assert_eq!(clf.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn sums_logits_before_softmax() {
        // One mildly positive and one strongly negative headline: the sum
        // [1, 3, 0] is negative-dominant.
        struct TwoRows;
        impl SequenceClassifier for TwoRows {
            fn name(&self) -> &str {
                "two_rows"
            }
            fn logits(&self, _texts: &[String]) -> Result<Vec<Logits>, SentimentError> {
                Ok(vec![[1.0, 0.0, 0.0], [0.0, 3.0, 0.0]])
            }
        }
        let est = SentimentEstimator::new(Arc::new(TwoRows));
        let result = est.estimate(&texts(2)).unwrap();
        assert_eq!(result.label, SentimentLabel::Negative);
        let expected = softmax(&[1.0, 3.0, 0.0])[1];
        assert!((result.probability - expected).abs() < 1e-12);
    }

    #[test]
    fn more_agreeing_headlines_raise_confidence() {
        let clf = Arc::new(FixedClassifier::new(vec![[2.0, 0.0, 1.0]]));
        let est = SentimentEstimator::new(clf);
        let one = est.estimate(&texts(1)).unwrap();
        let five = est.estimate(&texts(5)).unwrap();
        assert_eq!(one.label, SentimentLabel::Positive);
        assert_eq!(five.label, SentimentLabel::Positive);
        assert!(five.probability > one.probability);
    }

    #[test]
    fn row_count_mismatch_is_malformed() {
        struct Short;
        impl SequenceClassifier for Short {
            fn name(&self) -> &str {
                "short"
            }
            fn logits(&self, _texts: &[String]) -> Result<Vec<Logits>, SentimentError> {
                Ok(vec![[0.0, 0.0, 1.0]])
            }
        }
        let est = SentimentEstimator::new(Arc::new(Short));
        let err = est.estimate(&texts(3)).unwrap_err();
        assert!(matches!(err, SentimentError::Malformed(_)));
    }

    #[test]
    fn non_finite_logit_is_malformed() {
        let clf = Arc::new(FixedClassifier::new(vec![[f64::NAN, 0.0, 0.0]]));
        let est = SentimentEstimator::new(clf);
        assert!(matches!(
            est.estimate(&texts(1)),
            Err(SentimentError::Malformed(_))
        ));
    }

    #[test]
    fn classifier_error_propagates() {
        struct Down;
        impl SequenceClassifier for Down {
            fn name(&self) -> &str {
                "down"
            }
            fn logits(&self, _texts: &[String]) -> Result<Vec<Logits>, SentimentError> {
                Err(SentimentError::Request("connection refused".into()))
            }
        }
        let est = SentimentEstimator::new(Arc::new(Down));
        assert!(matches!(
            est.estimate(&texts(1)),
            Err(SentimentError::Request(_))
        ));
    }

    #[test]
    fn argmax_ties_prefer_lowest_index() {
        assert_eq!(argmax(&[1.0, 1.0, 1.0]), 0);
        assert_eq!(argmax(&[0.0, 2.0, 2.0]), 1);
    }

    #[test]
    fn softmax_sums_to_one_for_large_logits() {
        let probs = softmax(&[1000.0, 999.0, -1000.0]);
        let total: f64 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(probs.iter().all(|p| p.is_finite()));
    }
}
