//! Alpaca trading REST API.
//!
//! Bracket orders go out as market entries with `order_class = "bracket"`.
//! `sell_all` closes positions with `cancel_orders=true` and then polls the
//! positions endpoint until the account is flat, since Alpaca liquidates
//! asynchronously.

use super::{Broker, BrokerError, OrderAck};
use crate::domain::BracketOrder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const PAPER_URL: &str = "https://paper-api.alpaca.markets";
pub const LIVE_URL: &str = "https://api.alpaca.markets";
pub const DATA_URL: &str = "https://data.alpaca.markets";

#[derive(Debug, Serialize)]
struct OrderRequest {
    symbol: String,
    qty: String,
    side: String,
    #[serde(rename = "type")]
    order_type: String,
    time_in_force: String,
    order_class: String,
    take_profit: TakeProfit,
    stop_loss: StopLoss,
}

#[derive(Debug, Serialize)]
struct TakeProfit {
    limit_price: String,
}

#[derive(Debug, Serialize)]
struct StopLoss {
    stop_price: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    cash: String,
}

#[derive(Debug, Deserialize)]
struct LatestTradeResponse {
    trade: LatestTrade,
}

#[derive(Debug, Deserialize)]
struct LatestTrade {
    #[serde(rename = "p")]
    price: f64,
}

#[derive(Debug, Deserialize)]
struct PositionSummary {
    #[allow(dead_code)]
    symbol: String,
}

/// Market clock as reported by the broker.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketClock {
    pub timestamp: DateTime<Utc>,
    pub is_open: bool,
    pub next_open: DateTime<Utc>,
    pub next_close: DateTime<Utc>,
}

/// Blocking Alpaca trading client.
pub struct AlpacaBroker {
    client: reqwest::blocking::Client,
    base_url: String,
    data_url: String,
    key_id: String,
    secret_key: String,
    settle_timeout: Duration,
    poll_interval: Duration,
}

impl AlpacaBroker {
    pub fn new(
        key_id: impl Into<String>,
        secret_key: impl Into<String>,
        paper: bool,
    ) -> Result<Self, BrokerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                BrokerError::NetworkUnreachable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: if paper { PAPER_URL } else { LIVE_URL }.to_string(),
            data_url: DATA_URL.to_string(),
            key_id: key_id.into(),
            secret_key: secret_key.into(),
            settle_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        })
    }

    /// How long `sell_all` waits for positions to close.
    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_data_url(mut self, url: impl Into<String>) -> Self {
        self.data_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn get(&self, url: String) -> reqwest::blocking::RequestBuilder {
        self.client
            .get(url)
            .header("APCA-API-KEY-ID", &self.key_id)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
    }

    /// Map non-success statuses onto broker errors.
    fn check(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, BrokerError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        Err(match status {
            reqwest::StatusCode::UNAUTHORIZED => BrokerError::AuthenticationRequired(body),
            // 403 is how Alpaca reports insufficient buying power
            reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::UNPROCESSABLE_ENTITY => {
                BrokerError::Rejected(body)
            }
            _ => BrokerError::Status {
                status: status.as_u16(),
                body,
            },
        })
    }

    fn send(req: reqwest::blocking::RequestBuilder) -> Result<reqwest::blocking::Response, BrokerError> {
        let resp = req
            .send()
            .map_err(|e| BrokerError::NetworkUnreachable(e.to_string()))?;
        Self::check(resp)
    }

    fn json<T: serde::de::DeserializeOwned>(resp: reqwest::blocking::Response) -> Result<T, BrokerError> {
        resp.json()
            .map_err(|e| BrokerError::Malformed(e.to_string()))
    }

    /// Market clock; the live loop uses it to wait for the open.
    pub fn clock(&self) -> Result<MarketClock, BrokerError> {
        let resp = Self::send(self.get(format!("{}/v2/clock", self.base_url)))?;
        Self::json(resp)
    }

    fn open_positions(&self) -> Result<usize, BrokerError> {
        let resp = Self::send(self.get(format!("{}/v2/positions", self.base_url)))?;
        let positions: Vec<PositionSummary> = Self::json(resp)?;
        Ok(positions.len())
    }

    fn order_request(order: &BracketOrder) -> OrderRequest {
        OrderRequest {
            symbol: order.symbol.clone(),
            qty: order.quantity.to_string(),
            side: order.side.as_str().to_string(),
            order_type: "market".to_string(),
            time_in_force: "gtc".to_string(),
            order_class: "bracket".to_string(),
            take_profit: TakeProfit {
                limit_price: format_price(order.take_profit_price),
            },
            stop_loss: StopLoss {
                stop_price: format_price(order.stop_loss_price),
            },
        }
    }
}

/// Alpaca rejects sub-penny prices above $1.
fn format_price(price: f64) -> String {
    format!("{price:.2}")
}

fn parse_cash(raw: &str) -> Result<f64, BrokerError> {
    raw.parse::<f64>()
        .map_err(|e| BrokerError::Malformed(format!("account cash '{raw}': {e}")))
}

impl Broker for AlpacaBroker {
    fn name(&self) -> &str {
        "alpaca"
    }

    fn cash(&self) -> Result<f64, BrokerError> {
        let resp = Self::send(self.get(format!("{}/v2/account", self.base_url)))?;
        let account: Account = Self::json(resp)?;
        parse_cash(&account.cash)
    }

    fn last_price(&self, symbol: &str) -> Result<f64, BrokerError> {
        let url = format!("{}/v2/stocks/{symbol}/trades/latest", self.data_url);
        let resp = Self::send(self.get(url))?;
        let latest: LatestTradeResponse = Self::json(resp)?;
        if !latest.trade.price.is_finite() || latest.trade.price <= 0.0 {
            return Err(BrokerError::NoPrice {
                symbol: symbol.to_string(),
            });
        }
        Ok(latest.trade.price)
    }

    fn now(&self) -> Result<DateTime<Utc>, BrokerError> {
        Ok(self.clock()?.timestamp)
    }

    fn submit_order(&mut self, order: &BracketOrder) -> Result<OrderAck, BrokerError> {
        if order.quantity == 0 {
            // Alpaca rejects qty=0; the policy treats it as a no-op order
            warn!(symbol = %order.symbol, side = %order.side, "skipping zero-quantity order");
            return Ok(OrderAck {
                id: String::new(),
                status: "skipped".to_string(),
            });
        }

        let body = Self::order_request(order);
        let req = self
            .client
            .post(format!("{}/v2/orders", self.base_url))
            .header("APCA-API-KEY-ID", &self.key_id)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
            .json(&body);
        let resp: OrderResponse = Self::json(Self::send(req)?)?;

        info!(
            id = %resp.id,
            status = %resp.status,
            symbol = %order.symbol,
            side = %order.side,
            qty = order.quantity,
            "bracket order submitted"
        );
        Ok(OrderAck {
            id: resp.id,
            status: resp.status,
        })
    }

    fn sell_all(&mut self) -> Result<(), BrokerError> {
        let req = self
            .client
            .delete(format!("{}/v2/positions", self.base_url))
            .header("APCA-API-KEY-ID", &self.key_id)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
            .query(&[("cancel_orders", "true")]);
        Self::send(req)?;

        let started = Instant::now();
        loop {
            let open = self.open_positions()?;
            if open == 0 {
                debug!(elapsed_ms = started.elapsed().as_millis() as u64, "liquidation settled");
                return Ok(());
            }
            if started.elapsed() >= self.settle_timeout {
                return Err(BrokerError::LiquidationUnconfirmed {
                    open_positions: open,
                });
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_request_body() {
        let order = BracketOrder::long("SPY", 12, 400.0, 1.2, 0.95);
        let json = serde_json::to_value(AlpacaBroker::order_request(&order)).unwrap();
        assert_eq!(json["symbol"], "SPY");
        assert_eq!(json["qty"], "12");
        assert_eq!(json["side"], "buy");
        assert_eq!(json["type"], "market");
        assert_eq!(json["order_class"], "bracket");
        assert_eq!(json["take_profit"]["limit_price"], "480.00");
        assert_eq!(json["stop_loss"]["stop_price"], "380.00");
    }

    #[test]
    fn short_bracket_request_body() {
        let order = BracketOrder::short("SPY", 3, 401.13, 0.8, 1.05);
        let json = serde_json::to_value(AlpacaBroker::order_request(&order)).unwrap();
        assert_eq!(json["side"], "sell");
        assert_eq!(json["take_profit"]["limit_price"], "320.90");
        assert_eq!(json["stop_loss"]["stop_price"], "421.19");
    }

    #[test]
    fn parses_account_cash() {
        assert_eq!(parse_cash("100000.50").unwrap(), 100_000.5);
        assert!(matches!(parse_cash("n/a"), Err(BrokerError::Malformed(_))));
    }

    #[test]
    fn parses_clock() {
        let json = r#"{
            "timestamp": "2024-01-02T14:35:00Z",
            "is_open": true,
            "next_open": "2024-01-03T14:30:00Z",
            "next_close": "2024-01-02T21:00:00Z"
        }"#;
        let clock: MarketClock = serde_json::from_str(json).unwrap();
        assert!(clock.is_open);
        assert_eq!(clock.timestamp.date_naive().to_string(), "2024-01-02");
    }

    #[test]
    fn zero_quantity_is_skipped_without_network() {
        let mut broker = AlpacaBroker::new("k", "s", true)
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let order = BracketOrder::long("SPY", 0, 400.0, 1.2, 0.95);
        let ack = broker.submit_order(&order).unwrap();
        assert_eq!(ack.status, "skipped");
    }
}
