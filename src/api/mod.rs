//! Provider adapters: request construction and payload normalization.
//!
//! Each submodule knows one upstream's URL parameters and JSON shapes.
//! The functions here dispatch on [`ProviderId`] so the fetcher can stay
//! provider-agnostic.

pub mod alternative_me;
pub mod binance;
pub mod coingecko;
pub mod coinpaprika;
pub mod cryptocompare;

use crate::error::FetchError;
use crate::models::{
    HistoricalPoint, MarketOverview, NormalizedQuote, SentimentSnapshot, Timeframe,
};
use crate::registry::{render_template, Asset, ProviderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// Quote currency used for every provider
pub const VS_CURRENCY: &str = "usd";

/// A fully resolved outbound GET request
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(&'static str, String)>,
}

impl ProviderRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Attach the provider's API key the way that provider expects it
    fn with_credential(self, provider: ProviderId, credential: &str) -> Self {
        if credential.is_empty() {
            return self;
        }
        match provider {
            ProviderId::CryptoCompare => self.header("authorization", format!("Apikey {}", credential)),
            ProviderId::Binance => self.header("X-MBX-APIKEY", credential),
            ProviderId::CoinGecko => self.query("x_cg_demo_api_key", credential),
            ProviderId::CoinPaprika | ProviderId::AlternativeMe => self,
        }
    }
}

// ============== Quotes ==============

pub fn quotes_request(
    provider: ProviderId,
    template: &str,
    assets: &[Asset],
    credential: &str,
) -> Option<ProviderRequest> {
    let request = match provider {
        ProviderId::CryptoCompare => cryptocompare::quotes_request(template, assets),
        ProviderId::Binance => binance::quotes_request(template),
        ProviderId::CoinPaprika => coinpaprika::quotes_request(template),
        ProviderId::CoinGecko => coingecko::quotes_request(template, assets),
        ProviderId::AlternativeMe => return None,
    };
    Some(request.with_credential(provider, credential))
}

/// Normalize a quote payload. A payload that matches none of the requested
/// assets is treated as a failed attempt.
pub fn parse_quotes(
    provider: ProviderId,
    body: &[u8],
    assets: &[Asset],
) -> Result<HashMap<String, NormalizedQuote>, FetchError> {
    let quotes = match provider {
        ProviderId::CryptoCompare => cryptocompare::parse_quotes(body, assets),
        ProviderId::Binance => binance::parse_quotes(body, assets),
        ProviderId::CoinPaprika => coinpaprika::parse_quotes(body, assets),
        ProviderId::CoinGecko => coingecko::parse_quotes(body, assets),
        ProviderId::AlternativeMe => Err("quotes not supported".to_string()),
    }
    .map_err(|message| FetchError::malformed(provider, message))?;

    if quotes.is_empty() && !assets.is_empty() {
        return Err(FetchError::malformed(
            provider,
            "payload contained none of the requested assets",
        ));
    }

    Ok(quotes)
}

// ============== History ==============

pub fn history_request(
    provider: ProviderId,
    template: &str,
    asset: &Asset,
    timeframe: Timeframe,
    limit: u32,
    credential: &str,
) -> Option<ProviderRequest> {
    let id = asset.id_for(provider);
    if id.is_empty() {
        return None;
    }
    let url = render_template(template, id);
    let limit = limit.max(1);

    let request = match provider {
        ProviderId::CryptoCompare => cryptocompare::history_request(url, asset, timeframe, limit),
        ProviderId::Binance => binance::history_request(url, asset, timeframe, limit),
        ProviderId::CoinPaprika => coinpaprika::history_request(url, timeframe, limit, Utc::now())?,
        ProviderId::CoinGecko => coingecko::history_request(url, timeframe, limit)?,
        ProviderId::AlternativeMe => return None,
    };
    Some(request.with_credential(provider, credential))
}

/// Normalize a candle series: ascending by timestamp, at most the newest `limit` candles
pub fn parse_history(
    provider: ProviderId,
    body: &[u8],
    limit: u32,
) -> Result<Vec<HistoricalPoint>, FetchError> {
    let mut points = match provider {
        ProviderId::CryptoCompare => cryptocompare::parse_history(body),
        ProviderId::Binance => binance::parse_history(body),
        ProviderId::CoinPaprika => coinpaprika::parse_history(body),
        ProviderId::CoinGecko => coingecko::parse_history(body),
        ProviderId::AlternativeMe => Err("history not supported".to_string()),
    }
    .map_err(|message| FetchError::malformed(provider, message))?;

    points.sort_by_key(|p| p.timestamp);

    let limit = limit.max(1) as usize;
    if points.len() > limit {
        points.drain(..points.len() - limit);
    }
    Ok(points)
}

// ============== Overview ==============

pub fn overview_request(
    provider: ProviderId,
    template: &str,
    credential: &str,
) -> Option<ProviderRequest> {
    match provider {
        ProviderId::CoinGecko => {
            Some(ProviderRequest::new(template).with_credential(provider, credential))
        }
        _ => None,
    }
}

/// Normalize global market data; sentiment is left neutral for the caller to fill
pub fn parse_overview(provider: ProviderId, body: &[u8]) -> Result<MarketOverview, FetchError> {
    match provider {
        ProviderId::CoinGecko => coingecko::parse_overview(body),
        _ => Err("overview not supported".to_string()),
    }
    .map_err(|message| FetchError::malformed(provider, message))
}

// ============== Sentiment ==============

pub fn sentiment_request(
    provider: ProviderId,
    template: &str,
    credential: &str,
) -> Option<ProviderRequest> {
    match provider {
        ProviderId::AlternativeMe => {
            Some(alternative_me::sentiment_request(template).with_credential(provider, credential))
        }
        _ => None,
    }
}

pub fn parse_sentiment(provider: ProviderId, body: &[u8]) -> Result<SentimentSnapshot, FetchError> {
    match provider {
        ProviderId::AlternativeMe => alternative_me::parse_sentiment(body),
        _ => Err("sentiment not supported".to_string()),
    }
    .map_err(|message| FetchError::malformed(provider, message))
}

// ============== Shared helpers ==============

/// Accepts a JSON number, a numeric string, or null. Null, missing and
/// unparsable values all become `None`.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

pub(crate) fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn from_unix_secs(secs: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("invalid timestamp {}", secs))
}

pub(crate) fn from_unix_millis(millis: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| format!("invalid timestamp {}ms", millis))
}

pub(crate) fn decode<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, String> {
    serde_json::from_slice(body).map_err(|e| e.to_string())
}
