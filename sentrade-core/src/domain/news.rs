//! News events as returned by the retrieval boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single news item about one or more symbols.
///
/// Only `headline` feeds the sentiment estimator; the rest is kept so cached
/// entries stay useful for inspection (`sentrade news`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsEvent {
    pub id: u64,
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub author: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Headline text of each event, in order.
pub fn headlines(events: &[NewsEvent]) -> Vec<String> {
    events.iter().map(|e| e.headline.clone()).collect()
}
