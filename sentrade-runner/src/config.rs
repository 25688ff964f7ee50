//! Bot configuration: a TOML file plus credentials from the environment.
//!
//! Every section has defaults, so an empty file is a valid config that
//! trades SPY at 50% cash at risk over 2020-2023.

use chrono::NaiveDate;
use sentrade_core::policy::{PolicyConfig, PolicyConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_KEY_ID: &str = "APCA_API_KEY_ID";
pub const ENV_SECRET_KEY: &str = "APCA_API_SECRET_KEY";
pub const ENV_INFERENCE_TOKEN: &str = "SENTRADE_INFERENCE_TOKEN";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid strategy: {0}")]
    Strategy(#[from] PolicyConfigError),

    #[error("backtest start {start} is after end {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },

    #[error("initial cash must be positive, got {0}")]
    InitialCash(f64),

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    /// Root of the on-disk caches (news memo and bars).
    pub cache_dir: PathBuf,
    pub strategy: PolicyConfig,
    pub backtest: BacktestSection,
    pub news: NewsSection,
    pub sentiment: SentimentSection,
    pub broker: BrokerSection,
    pub live: LiveSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacktestSection {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub initial_cash: f64,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default(),
            initial_cash: 100_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewsSection {
    /// Maximum events per lookup.
    pub limit: usize,
    pub data_url: String,
}

impl Default for NewsSection {
    fn default() -> Self {
        Self {
            limit: 10,
            data_url: "https://data.alpaca.markets".to_string(),
        }
    }
}

/// Which classifier backs the estimator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SentimentBackend {
    /// Hosted text-classification model over HTTP.
    #[default]
    Inference,
    /// Offline word list.
    Lexicon,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SentimentSection {
    pub backend: SentimentBackend,
    pub endpoint: String,
    pub model: String,
}

impl Default for SentimentSection {
    fn default() -> Self {
        Self {
            backend: SentimentBackend::Inference,
            endpoint: "http://localhost:8080".to_string(),
            model: sentrade_core::sentiment::inference::DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrokerSection {
    pub paper: bool,
    /// Overrides the trading API base URL.
    pub base_url: Option<String>,
    pub settle_timeout_secs: u64,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            paper: true,
            base_url: None,
            settle_timeout_secs: 30,
        }
    }
}

impl BrokerSection {
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.settle_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LiveSection {
    /// Time between iterations.
    pub interval_secs: u64,
}

impl Default for LiveSection {
    fn default() -> Self {
        Self {
            interval_secs: 24 * 60 * 60,
        }
    }
}

impl LiveSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl BotConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;
        if self.backtest.start > self.backtest.end {
            return Err(ConfigError::DateRange {
                start: self.backtest.start,
                end: self.backtest.end,
            });
        }
        if !(self.backtest.initial_cash.is_finite() && self.backtest.initial_cash > 0.0) {
            return Err(ConfigError::InitialCash(self.backtest.initial_cash));
        }
        Ok(())
    }

    /// Cache root, defaulting to `.sentrade/cache` when unset.
    pub fn cache_root(&self) -> PathBuf {
        if self.cache_dir.as_os_str().is_empty() {
            PathBuf::from(".sentrade/cache")
        } else {
            self.cache_dir.clone()
        }
    }
}

/// Alpaca credentials.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub key_id: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read `APCA_API_KEY_ID` and `APCA_API_SECRET_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve credentials through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };
        Ok(Self {
            key_id: get(ENV_KEY_ID)?,
            secret_key: get(ENV_SECRET_KEY)?,
        })
    }
}

/// Optional bearer token for the inference endpoint.
pub fn inference_token_from_env() -> Option<String> {
    std::env::var(ENV_INFERENCE_TOKEN)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = BotConfig::from_toml("").unwrap();
        assert_eq!(config.strategy.symbol, "SPY");
        assert_eq!(config.strategy.cash_at_risk, 0.5);
        assert_eq!(config.backtest.start.to_string(), "2020-01-01");
        assert_eq!(config.backtest.end.to_string(), "2023-12-31");
        assert_eq!(config.news.limit, 10);
        assert_eq!(config.sentiment.backend, SentimentBackend::Inference);
        assert!(config.broker.paper);
        assert_eq!(config.live.interval(), Duration::from_secs(86_400));
        assert_eq!(config.cache_root(), PathBuf::from(".sentrade/cache"));
    }

    #[test]
    fn sections_override_defaults() {
        let toml = r#"
cache_dir = "/tmp/sentrade"

[strategy]
symbol = "QQQ"
cash_at_risk = 0.25

[backtest]
start = "2022-01-01"
end = "2022-06-30"
initial_cash = 50000.0

[sentiment]
backend = "lexicon"

[broker]
paper = false
settle_timeout_secs = 5
"#;
        let config = BotConfig::from_toml(toml).unwrap();
        assert_eq!(config.strategy.symbol, "QQQ");
        assert_eq!(config.strategy.cash_at_risk, 0.25);
        // Untouched strategy fields keep their defaults.
        assert_eq!(config.strategy.confidence_threshold, 0.999);
        assert_eq!(config.backtest.initial_cash, 50_000.0);
        assert_eq!(config.sentiment.backend, SentimentBackend::Lexicon);
        assert!(!config.broker.paper);
        assert_eq!(config.broker.settle_timeout(), Duration::from_secs(5));
        assert_eq!(config.cache_root(), PathBuf::from("/tmp/sentrade"));
    }

    #[test]
    fn invalid_strategy_is_rejected() {
        let err = BotConfig::from_toml("[strategy]\ncash_at_risk = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Strategy(_)));
    }

    #[test]
    fn inverted_dates_are_rejected() {
        let toml = "[backtest]\nstart = \"2023-01-01\"\nend = \"2022-01-01\"\n";
        assert!(matches!(
            BotConfig::from_toml(toml),
            Err(ConfigError::DateRange { .. })
        ));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            BotConfig::from_toml("[strategy\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn credentials_require_both_variables() {
        let creds = Credentials::from_lookup(|name| match name {
            ENV_KEY_ID => Some("key".into()),
            ENV_SECRET_KEY => Some("secret".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(creds.key_id, "key");
        assert!(!format!("{creds:?}").contains("\"secret\""));

        let err = Credentials::from_lookup(|name| match name {
            ENV_KEY_ID => Some("key".into()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ENV_SECRET_KEY)));
    }

    #[test]
    fn blank_credentials_count_as_missing() {
        let err = Credentials::from_lookup(|_| Some("  ".into())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ENV_KEY_ID)));
    }

    #[test]
    fn shipped_config_parses() {
        let config = BotConfig::from_toml(include_str!("../../sentrade.toml")).unwrap();
        assert_eq!(config.strategy, PolicyConfig::default());
        assert_eq!(config.sentiment.backend, SentimentBackend::Inference);
        assert_eq!(config.live.interval(), Duration::from_secs(86_400));
    }
}
