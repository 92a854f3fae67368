//! Reliability-ordered, first-success-wins retrieval.
//!
//! Every operation walks the providers in descending reliability, skips those
//! without a usable credential or endpoint, and returns the first payload that
//! normalizes cleanly. Failures are logged and never surface to the caller;
//! exhaustion yields the documented neutral value.

pub mod rate_limit;

pub use rate_limit::ProviderRateLimiter;

use crate::api::{self, ProviderRequest};
use crate::credentials::CredentialStore;
use crate::error::FetchError;
use crate::models::{
    HistoricalPoint, MarketOverview, MarketSummary, NormalizedQuote, SentimentSnapshot, Timeframe,
};
use crate::registry::{AssetCatalog, EndpointKind, ProviderId, SourceRegistry};
use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_QUOTE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SENTIMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Knobs for the live fetch path
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Bound for quote, history and overview requests
    pub quote_timeout: Duration,
    pub sentiment_timeout: Duration,
    pub enforce_rate_limits: bool,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            quote_timeout: DEFAULT_QUOTE_TIMEOUT,
            sentiment_timeout: DEFAULT_SENTIMENT_TIMEOUT,
            enforce_rate_limits: false,
            user_agent: format!("marketfeed/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Registry entry plus whether it can be used right now
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub id: ProviderId,
    pub name: String,
    pub reliability: u8,
    pub rate_limit: u32,
    pub requires_key: bool,
    pub available: bool,
    pub endpoints: BTreeMap<EndpointKind, String>,
}

/// A live result and the provider that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub source: Option<ProviderId>,
    pub data: T,
}

impl<T> Sourced<T> {
    pub fn from_provider(source: ProviderId, data: T) -> Self {
        Self {
            source: Some(source),
            data,
        }
    }

    /// Answered without asking any provider
    pub fn unsourced(data: T) -> Self {
        Self { source: None, data }
    }
}

/// Multi-source market data fetcher
///
/// Cloneable; clones share the HTTP client and the read-only tables.
#[derive(Clone)]
pub struct MarketDataFetcher {
    client: Client,
    registry: Arc<SourceRegistry>,
    credentials: Arc<CredentialStore>,
    catalog: Arc<AssetCatalog>,
    settings: FetchSettings,
    rate_limiter: Option<Arc<ProviderRateLimiter>>,
}

impl MarketDataFetcher {
    pub fn new(
        registry: Arc<SourceRegistry>,
        credentials: Arc<CredentialStore>,
        catalog: Arc<AssetCatalog>,
        settings: FetchSettings,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        let rate_limiter = settings
            .enforce_rate_limits
            .then(|| Arc::new(ProviderRateLimiter::from_registry(&registry)));

        Ok(Self {
            client,
            registry,
            credentials,
            catalog,
            settings,
            rate_limiter,
        })
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    pub fn providers(&self) -> Vec<ProviderStatus> {
        self.registry
            .list_providers_by_reliability()
            .into_iter()
            .filter_map(|id| self.registry.descriptor(id))
            .map(|d| ProviderStatus {
                id: d.id,
                name: d.name.clone(),
                reliability: d.reliability,
                rate_limit: d.rate_limit,
                requires_key: d.requires_key,
                available: self.credentials.is_available(d.id),
                endpoints: d.endpoints.clone(),
            })
            .collect()
    }

    /// Display name of a provider, e.g. "CryptoCompare"
    pub fn provider_name(&self, id: ProviderId) -> Option<&str> {
        self.registry.descriptor(id).map(|d| d.name.as_str())
    }

    // ============== Public operations ==============

    /// Quotes for the requested pairs. Unknown pairs are absent; total
    /// failure gives an empty map.
    pub async fn get_quotes<S: AsRef<str>>(&self, pairs: &[S]) -> HashMap<String, NormalizedQuote> {
        self.try_quotes(pairs)
            .await
            .map(|sourced| sourced.data)
            .unwrap_or_default()
    }

    pub async fn get_sentiment(&self) -> SentimentSnapshot {
        self.try_sentiment()
            .await
            .map_or_else(SentimentSnapshot::neutral, |sourced| sourced.data)
    }

    /// Global aggregates with an embedded sentiment reading
    pub async fn get_overview(&self) -> MarketOverview {
        self.try_overview()
            .await
            .map_or_else(MarketOverview::empty, |sourced| sourced.data)
    }

    /// Candles for one pair, oldest first, at most `limit`. Empty on failure.
    pub async fn get_history(
        &self,
        pair: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Vec<HistoricalPoint> {
        self.try_history(pair, timeframe, limit)
            .await
            .map(|sourced| sourced.data)
            .unwrap_or_default()
    }

    /// Gainers, losers and volume over the requested pairs
    pub async fn get_summary<S: AsRef<str>>(&self, pairs: &[S]) -> MarketSummary {
        match self.try_quotes(pairs).await {
            Some(Sourced { source, data }) => MarketSummary::from_quotes(
                data.values(),
                source.and_then(|id| self.provider_name(id)),
            ),
            None => MarketSummary::from_quotes(std::iter::empty(), None),
        }
    }

    // ============== Live attempts (None on exhaustion) ==============

    /// `source` is `None` when no provider had to be asked
    pub async fn try_quotes<S: AsRef<str>>(
        &self,
        pairs: &[S],
    ) -> Option<Sourced<HashMap<String, NormalizedQuote>>> {
        let assets = self.catalog.resolve(pairs);
        if assets.is_empty() {
            return Some(Sourced::unsourced(HashMap::new()));
        }

        self.first_success(
            EndpointKind::Price,
            self.settings.quote_timeout,
            |provider, template, credential| {
                api::quotes_request(provider, template, &assets, credential)
            },
            |provider, body| api::parse_quotes(provider, body, &assets),
        )
        .await
    }

    pub async fn try_sentiment(&self) -> Option<Sourced<SentimentSnapshot>> {
        self.first_success(
            EndpointKind::Sentiment,
            self.settings.sentiment_timeout,
            api::sentiment_request,
            api::parse_sentiment,
        )
        .await
    }

    /// Global aggregates only; `fear_greed` is left neutral
    pub async fn try_global(&self) -> Option<Sourced<MarketOverview>> {
        self.first_success(
            EndpointKind::Global,
            self.settings.quote_timeout,
            api::overview_request,
            api::parse_overview,
        )
        .await
    }

    pub async fn try_overview(&self) -> Option<Sourced<MarketOverview>> {
        let mut overview = self.try_global().await?;
        // has its own neutral fallback, so the overview survives a sentiment outage
        overview.data.fear_greed = self.get_sentiment().await;
        Some(overview)
    }

    pub async fn try_history(
        &self,
        pair: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Option<Sourced<Vec<HistoricalPoint>>> {
        let Some(asset) = self.catalog.get(pair).cloned() else {
            tracing::debug!(pair = %pair, "Unknown pair, no history");
            return Some(Sourced::unsourced(Vec::new()));
        };

        self.first_success(
            EndpointKind::Historical,
            self.settings.quote_timeout,
            |provider, template, credential| {
                api::history_request(provider, template, &asset, timeframe, limit, credential)
            },
            |provider, body| api::parse_history(provider, body, limit),
        )
        .await
    }

    // ============== Fallback protocol ==============

    /// Available providers with an endpoint for `kind`, in reliability order
    fn candidates(&self, kind: EndpointKind) -> Vec<(ProviderId, &str)> {
        self.registry
            .list_providers_by_reliability()
            .into_iter()
            .filter(|id| {
                let available = self.credentials.is_available(*id);
                if !available {
                    tracing::debug!(provider = %id, "Skipping provider without required credential");
                }
                available
            })
            .filter_map(|id| {
                let template = self.registry.get_endpoint(id, kind);
                (!template.is_empty()).then_some((id, template))
            })
            .collect()
    }

    async fn first_success<T, B, P>(
        &self,
        kind: EndpointKind,
        timeout: Duration,
        build: B,
        parse: P,
    ) -> Option<Sourced<T>>
    where
        B: Fn(ProviderId, &str, &str) -> Option<ProviderRequest>,
        P: Fn(ProviderId, &[u8]) -> Result<T, FetchError>,
    {
        for (provider, template) in self.candidates(kind) {
            let credential = self.credentials.get_credential(provider);
            let Some(request) = build(provider, template, credential) else {
                tracing::debug!(provider = %provider, kind = %kind, "No request for provider, skipping");
                continue;
            };

            tracing::debug!(provider = %provider, kind = %kind, url = %request.url, "Attempting fetch");

            let result = match self.execute(provider, &request, timeout).await {
                Ok(body) => parse(provider, &body),
                Err(e) => Err(e),
            };

            match result {
                Ok(record) => {
                    tracing::info!(provider = %provider, kind = %kind, "Fetched market data");
                    return Some(Sourced::from_provider(provider, record));
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %provider,
                        kind = %kind,
                        error = %e,
                        "Provider attempt failed, trying next"
                    );
                }
            }
        }

        tracing::warn!(kind = %kind, "All providers exhausted");
        None
    }

    async fn execute(
        &self,
        provider: ProviderId,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<Vec<u8>, FetchError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.check(provider)?;
        }

        let mut builder = self
            .client
            .get(&request.url)
            .query(&request.query)
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(provider, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { provider, status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(provider, e))?;

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProviderDescriptor;

    // Nothing listens on port 1, so every attempt is a fast transport failure
    const DEAD: &str = "http://127.0.0.1:1";

    fn dead_registry() -> SourceRegistry {
        SourceRegistry::new(vec![
            ProviderDescriptor::new(ProviderId::CryptoCompare, "CryptoCompare", 95, 100)
                .with_endpoint(EndpointKind::Price, &format!("{}/cc/price", DEAD))
                .with_endpoint(EndpointKind::Historical, &format!("{}/cc/hist", DEAD)),
            ProviderDescriptor::new(ProviderId::CoinGecko, "CoinGecko", 80, 30)
                .with_endpoint(EndpointKind::Price, &format!("{}/cg/price", DEAD))
                .with_endpoint(EndpointKind::Global, &format!("{}/cg/global", DEAD)),
            ProviderDescriptor::new(ProviderId::AlternativeMe, "Alternative.me", 70, 10)
                .with_endpoint(EndpointKind::Sentiment, &format!("{}/fng", DEAD)),
        ])
        .unwrap()
    }

    fn fetcher(registry: SourceRegistry, keys: HashMap<ProviderId, String>) -> MarketDataFetcher {
        let credentials = CredentialStore::from_map(&registry, keys);
        let settings = FetchSettings {
            quote_timeout: Duration::from_secs(2),
            sentiment_timeout: Duration::from_secs(2),
            ..FetchSettings::default()
        };
        MarketDataFetcher::new(
            Arc::new(registry),
            Arc::new(credentials),
            Arc::new(AssetCatalog::default()),
            settings,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_all_sources_down_gives_neutral_defaults() {
        let fetcher = fetcher(dead_registry(), HashMap::new());

        assert!(fetcher.get_quotes(&["BTC/USDT", "ETH/USDT"]).await.is_empty());
        assert_eq!(fetcher.get_sentiment().await, SentimentSnapshot::neutral());
        assert_eq!(fetcher.get_overview().await, MarketOverview::empty());
        assert!(fetcher.get_history("BTC/USDT", Timeframe::D1, 7).await.is_empty());

        let summary = fetcher.get_summary(&["BTC/USDT"]).await;
        assert_eq!(summary.total_symbols, 0);
        assert_eq!(summary.data_source, MarketSummary::NO_DATA_SOURCE);
    }

    #[tokio::test]
    async fn test_try_variants_report_exhaustion() {
        let fetcher = fetcher(dead_registry(), HashMap::new());

        assert!(fetcher.try_quotes(&["BTC/USDT"]).await.is_none());
        assert!(fetcher.try_sentiment().await.is_none());
        assert!(fetcher.try_overview().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_pairs_need_no_network() {
        let fetcher = fetcher(dead_registry(), HashMap::new());

        let quotes = fetcher.try_quotes(&["DOGE/USDT"]).await;
        assert_eq!(quotes, Some(Sourced::unsourced(HashMap::new())));
        let history = fetcher.try_history("DOGE/USDT", Timeframe::H1, 7).await;
        assert_eq!(history, Some(Sourced::unsourced(Vec::new())));
    }

    #[test]
    fn test_candidates_skip_missing_endpoint_and_credential() {
        let registry = SourceRegistry::new(vec![
            ProviderDescriptor::new(ProviderId::CryptoCompare, "CryptoCompare", 95, 100)
                .with_endpoint(EndpointKind::Price, "https://cc/price")
                .requiring_key(),
            ProviderDescriptor::new(ProviderId::Binance, "Binance", 90, 1200)
                .with_endpoint(EndpointKind::Historical, "https://bn/klines"),
            ProviderDescriptor::new(ProviderId::CoinGecko, "CoinGecko", 80, 30)
                .with_endpoint(EndpointKind::Price, "https://cg/price"),
        ])
        .unwrap();

        let without_key = fetcher(registry.clone(), HashMap::new());
        let ids: Vec<ProviderId> = without_key
            .candidates(EndpointKind::Price)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![ProviderId::CoinGecko]);

        let keys = HashMap::from([(ProviderId::CryptoCompare, "cc-key".to_string())]);
        let with_key = fetcher(registry, keys);
        let ids: Vec<ProviderId> = with_key
            .candidates(EndpointKind::Price)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![ProviderId::CryptoCompare, ProviderId::CoinGecko]);
    }

    #[test]
    fn test_provider_status_listing() {
        let fetcher = fetcher(SourceRegistry::default(), HashMap::new());
        let statuses = fetcher.providers();

        assert_eq!(statuses.len(), 5);
        assert_eq!(statuses[0].id, ProviderId::CryptoCompare);
        assert!(statuses.iter().all(|s| s.available));
        assert_eq!(fetcher.provider_name(ProviderId::AlternativeMe), Some("Alternative.me"));
    }
}
