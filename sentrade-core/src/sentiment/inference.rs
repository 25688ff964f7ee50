//! HTTP client for a hosted sequence-classification model.
//!
//! Speaks the text-embeddings-inference `/predict` contract: the server
//! tokenizes and pads the batch, runs the model, and with `raw_scores`
//! set returns un-normalized logits per label:
//!
//! ```text
//! POST {base_url}/predict
//! {"inputs": [["headline 1"], ["headline 2"]], "raw_scores": true, "truncate": true}
//! → [[{"label": "positive", "score": 1.7}, ...], ...]
//! ```

use super::{Logits, SentimentError, SentimentLabel, SequenceClassifier, NUM_CLASSES};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default model served behind the endpoint.
pub const DEFAULT_MODEL: &str = "ProsusAI/finbert";

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    inputs: Vec<[&'a str; 1]>,
    raw_scores: bool,
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Blocking client for a `/predict` endpoint.
pub struct InferenceClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    token: Option<String>,
}

impl InferenceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SentimentError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SentimentError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            token: None,
        })
    }

    /// Name reported for the model behind the endpoint.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Bearer token for hosted endpoints.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn predict_url(&self) -> String {
        format!("{}/predict", self.base_url)
    }

    /// Map one response row onto the fixed class order by label name.
    fn parse_row(index: usize, row: Vec<LabelScore>) -> Result<Logits, SentimentError> {
        let mut logits = [f64::NAN; NUM_CLASSES];
        for entry in row {
            // Extra labels some checkpoints expose are ignored.
            if let Ok(label) = entry.label.parse::<SentimentLabel>() {
                logits[label.index()] = entry.score;
            }
        }
        if let Some(missing) = SentimentLabel::ALL
            .iter()
            .find(|l| logits[l.index()].is_nan())
        {
            return Err(SentimentError::Malformed(format!(
                "row {index} has no score for '{missing}'"
            )));
        }
        Ok(logits)
    }
}

impl SequenceClassifier for InferenceClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn logits(&self, texts: &[String]) -> Result<Vec<Logits>, SentimentError> {
        let body = PredictRequest {
            inputs: texts.iter().map(|t| [t.as_str()]).collect(),
            raw_scores: true,
            truncate: true,
        };

        let mut request = self.client.post(self.predict_url()).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!(model = %self.model, batch = texts.len(), "inference request");
        let resp = request
            .send()
            .map_err(|e| SentimentError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SentimentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<Vec<LabelScore>> = resp
            .json()
            .map_err(|e| SentimentError::Malformed(format!("invalid predict response: {e}")))?;

        rows.into_iter()
            .enumerate()
            .map(|(i, row)| Self::parse_row(i, row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(entries: &[(&str, f64)]) -> Vec<LabelScore> {
        entries
            .iter()
            .map(|(label, score)| LabelScore {
                label: label.to_string(),
                score: *score,
            })
            .collect()
    }

    #[test]
    fn parse_row_orders_by_label_name() {
        let logits = InferenceClient::parse_row(
            0,
            row(&[("neutral", 0.1), ("Positive", 2.5), ("negative", -1.0)]),
        )
        .unwrap();
        assert_eq!(logits, [2.5, -1.0, 0.1]);
    }

    #[test]
    fn parse_row_rejects_missing_class() {
        let err = InferenceClient::parse_row(3, row(&[("positive", 1.0), ("negative", 0.0)]))
            .unwrap_err();
        assert!(err.to_string().contains("row 3"));
    }

    #[test]
    fn request_body_shape() {
        let texts = ["a".to_string(), "b".to_string()];
        let body = PredictRequest {
            inputs: texts.iter().map(|t| [t.as_str()]).collect(),
            raw_scores: true,
            truncate: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["inputs"], serde_json::json!([["a"], ["b"]]));
        assert_eq!(json["raw_scores"], true);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = InferenceClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.predict_url(), "http://localhost:8080/predict");
        assert_eq!(client.name(), DEFAULT_MODEL);
    }
}
