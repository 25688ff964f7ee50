//! Alpaca market-data news client.
//!
//! `GET {data_url}/v1beta1/news?symbols=..&start=..&end=..&limit=..&sort=desc`
//! with key headers. Follows `next_page_token` until `limit` events have been
//! collected or the feed is exhausted. No retries: a failed call surfaces as
//! an error to the caller.

use super::{date_key, NewsError, NewsSource};
use crate::domain::NewsEvent;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_DATA_URL: &str = "https://data.alpaca.markets";

/// Largest page the API serves.
const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct NewsPage {
    news: Vec<serde_json::Value>,
    next_page_token: Option<String>,
}

/// Blocking Alpaca news client.
pub struct AlpacaNewsClient {
    client: reqwest::blocking::Client,
    data_url: String,
    key_id: String,
    secret_key: String,
    limit: usize,
}

impl AlpacaNewsClient {
    pub fn new(key_id: impl Into<String>, secret_key: impl Into<String>) -> Result<Self, NewsError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NewsError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            data_url: DEFAULT_DATA_URL.to_string(),
            key_id: key_id.into(),
            secret_key: secret_key.into(),
            limit: 10,
        })
    }

    pub fn with_data_url(mut self, url: impl Into<String>) -> Self {
        self.data_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Maximum number of events returned per lookup.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    fn news_url(&self) -> String {
        format!("{}/v1beta1/news", self.data_url)
    }

    /// Validate raw records into typed events.
    fn parse_events(raw: Vec<serde_json::Value>) -> Result<Vec<NewsEvent>, NewsError> {
        raw.into_iter()
            .map(|v| {
                let id = v.get("id").cloned().unwrap_or(serde_json::Value::Null);
                serde_json::from_value::<NewsEvent>(v)
                    .map_err(|e| NewsError::Malformed(format!("record {id}: {e}")))
            })
            .collect()
    }

    fn fetch_page(
        &self,
        symbol: &str,
        start: &str,
        end: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<NewsPage, NewsError> {
        let mut query = vec![
            ("symbols", symbol.to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("limit", page_size.to_string()),
            ("sort", "desc".to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("page_token", token.to_string()));
        }

        let resp = self
            .client
            .get(self.news_url())
            .header("APCA-API-KEY-ID", &self.key_id)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
            .query(&query)
            .send()
            .map_err(|e| NewsError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(NewsError::AuthenticationRequired(format!(
                "Alpaca rejected credentials (HTTP {status})"
            )));
        }
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(NewsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json()
            .map_err(|e| NewsError::Malformed(format!("invalid news page for {symbol}: {e}")))
    }
}

impl NewsSource for AlpacaNewsClient {
    fn name(&self) -> &str {
        "alpaca_news"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsEvent>, NewsError> {
        let start = date_key(start);
        let end = date_key(end);
        let mut events = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page_size = (self.limit - events.len()).min(MAX_PAGE_SIZE);
            let page = self.fetch_page(symbol, &start, &end, page_size, token.as_deref())?;
            events.extend(Self::parse_events(page.news)?);

            token = page.next_page_token.filter(|t| !t.is_empty());
            if events.len() >= self.limit || token.is_none() {
                break;
            }
        }

        events.truncate(self.limit);
        debug!(symbol, %start, %end, count = events.len(), "fetched news");
        Ok(events)
    }
}
