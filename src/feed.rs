use crate::cache::TieredCache;
use crate::fetcher::{MarketDataFetcher, Sourced};
use crate::models::{
    HistoricalPoint, MarketOverview, MarketSummary, NormalizedQuote, SentimentSnapshot, Timeframe,
};
use crate::registry::ProviderId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;

const SENTIMENT_KEY: &str = "sentiment";
const OVERVIEW_KEY: &str = "overview";

/// Where a returned record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Hot,
    Warm,
    Live,
    /// Served from the cold tier because every source failed
    Stale,
    /// Neutral placeholder, nothing was available
    Default,
}

/// A record plus its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fetched<T> {
    pub data: T,
    pub freshness: Freshness,
    /// Provider that produced the data, cached copies included
    pub source: Option<ProviderId>,
}

impl<T> Fetched<T> {
    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }

    fn from_sourced(sourced: Sourced<T>, freshness: Freshness) -> Self {
        Self {
            data: sourced.data,
            freshness,
            source: sourced.source,
        }
    }
}

/// Fetcher behind the tiered cache
///
/// Lookup order: hot, warm, live fallback, cold, neutral default. Only live
/// results are cached, together with the provider that answered.
pub struct MarketFeed {
    fetcher: MarketDataFetcher,
    cache: Option<TieredCache>,
}

impl MarketFeed {
    pub fn new(fetcher: MarketDataFetcher, cache: TieredCache) -> Self {
        Self {
            fetcher,
            cache: Some(cache),
        }
    }

    /// Every call goes to the providers
    pub fn uncached(fetcher: MarketDataFetcher) -> Self {
        Self {
            fetcher,
            cache: None,
        }
    }

    pub fn fetcher(&self) -> &MarketDataFetcher {
        &self.fetcher
    }

    pub fn cache(&self) -> Option<&TieredCache> {
        self.cache.as_ref()
    }

    pub async fn quotes<S: AsRef<str>>(
        &self,
        pairs: &[S],
    ) -> Fetched<HashMap<String, NormalizedQuote>> {
        let key = quotes_key(pairs);
        self.resolve(&key, self.fetcher.try_quotes(pairs), HashMap::new)
            .await
    }

    pub async fn sentiment(&self) -> Fetched<SentimentSnapshot> {
        self.resolve(
            SENTIMENT_KEY,
            self.fetcher.try_sentiment(),
            SentimentSnapshot::neutral,
        )
        .await
    }

    /// Global aggregates; the embedded sentiment goes through its own cache entry
    pub async fn overview(&self) -> Fetched<MarketOverview> {
        let mut overview = self
            .resolve(OVERVIEW_KEY, self.fetcher.try_global(), MarketOverview::empty)
            .await;

        if overview.freshness != Freshness::Default {
            overview.data.fear_greed = self.sentiment().await.data;
        }
        overview
    }

    pub async fn history(
        &self,
        pair: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Fetched<Vec<HistoricalPoint>> {
        let key = format!("history:{}:{}:{}", pair.to_ascii_uppercase(), timeframe, limit);
        self.resolve(&key, self.fetcher.try_history(pair, timeframe, limit), Vec::new)
            .await
    }

    /// Gainers, losers and volume over the quotes for `pairs`
    pub async fn summary<S: AsRef<str>>(&self, pairs: &[S]) -> Fetched<MarketSummary> {
        let quotes = self.quotes(pairs).await;
        let source_name = quotes.source.and_then(|id| self.fetcher.provider_name(id));

        Fetched {
            data: MarketSummary::from_quotes(quotes.data.values(), source_name),
            freshness: quotes.freshness,
            source: quotes.source,
        }
    }

    async fn resolve<T, F>(&self, key: &str, live: F, fallback: fn() -> T) -> Fetched<T>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = Option<Sourced<T>>>,
    {
        let neutral = || Fetched {
            data: fallback(),
            freshness: Freshness::Default,
            source: None,
        };

        let Some(cache) = &self.cache else {
            return match live.await {
                Some(sourced) => Fetched::from_sourced(sourced, Freshness::Live),
                None => neutral(),
            };
        };

        if let Some(sourced) = cache.get_hot(key) {
            tracing::debug!(key = %key, "Hot cache hit");
            return Fetched::from_sourced(sourced, Freshness::Hot);
        }
        if let Some(sourced) = cache.get_warm(key).await {
            tracing::debug!(key = %key, "Warm cache hit");
            return Fetched::from_sourced(sourced, Freshness::Warm);
        }

        if let Some(sourced) = live.await {
            cache.insert(key, &sourced).await;
            return Fetched::from_sourced(sourced, Freshness::Live);
        }

        if let Some(sourced) = cache.get_stale(key) {
            tracing::warn!(key = %key, "All providers failed, serving stale data");
            return Fetched::from_sourced(sourced, Freshness::Stale);
        }

        tracing::warn!(key = %key, "No data available, returning neutral default");
        neutral()
    }
}

/// Order-insensitive key for a set of pairs
fn quotes_key<S: AsRef<str>>(pairs: &[S]) -> String {
    let mut normalized: Vec<String> = pairs
        .iter()
        .map(|p| {
            let p: &str = p.as_ref();
            p.to_ascii_uppercase()
        })
        .collect();
    normalized.sort();
    normalized.dedup();
    format!("quotes:{}", normalized.join(","))
}
