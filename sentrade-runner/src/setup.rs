//! Builds the policy's collaborators from configuration.

use std::sync::Arc;

use sentrade_core::broker::AlpacaBroker;
use sentrade_core::news::{AlpacaNewsClient, CachedNews, NewsSource, OfflineNews};
use sentrade_core::sentiment::{InferenceClient, LexiconClassifier, SentimentEstimator};
use tracing::info;

use crate::config::{BotConfig, Credentials, SentimentBackend, SentimentSection};
use crate::runner::RunError;

/// Estimator over the configured classifier.
pub fn build_estimator(
    section: &SentimentSection,
    token: Option<String>,
) -> Result<SentimentEstimator, RunError> {
    let estimator = match section.backend {
        SentimentBackend::Lexicon => SentimentEstimator::new(Arc::new(LexiconClassifier::new())),
        SentimentBackend::Inference => {
            let client = InferenceClient::new(&section.endpoint)
                .map_err(|e| RunError::Setup(e.to_string()))?
                .with_model(&section.model)
                .with_token(token);
            SentimentEstimator::new(Arc::new(client))
        }
    };
    info!(model = estimator.model_name(), "sentiment estimator ready");
    Ok(estimator)
}

/// The memoized news source.
///
/// Without credentials (or when `offline`), only memoized windows are served.
pub fn build_news(
    config: &BotConfig,
    credentials: Option<&Credentials>,
    offline: bool,
) -> Result<Arc<dyn NewsSource>, RunError> {
    let cache_dir = config.cache_root();
    let inner: Arc<dyn NewsSource> = match credentials {
        Some(creds) if !offline => Arc::new(
            AlpacaNewsClient::new(&creds.key_id, &creds.secret_key)
                .map_err(|e| RunError::Setup(e.to_string()))?
                .with_data_url(&config.news.data_url)
                .with_limit(config.news.limit),
        ),
        _ => {
            info!("news source is offline; only cached windows are available");
            Arc::new(OfflineNews)
        }
    };
    Ok(Arc::new(CachedNews::new(inner, cache_dir)))
}

/// Live or paper Alpaca broker.
pub fn build_broker(config: &BotConfig, credentials: &Credentials) -> Result<AlpacaBroker, RunError> {
    let mut broker = AlpacaBroker::new(
        &credentials.key_id,
        &credentials.secret_key,
        config.broker.paper,
    )
    .map_err(|e| RunError::Setup(e.to_string()))?
    .with_settle_timeout(config.broker.settle_timeout())
    .with_data_url(&config.news.data_url);
    if let Some(url) = &config.broker.base_url {
        broker = broker.with_base_url(url);
    }
    Ok(broker)
}
