use super::{decode, lenient_f64, ProviderRequest};
use crate::models::{HistoricalPoint, NormalizedQuote, Timeframe};
use crate::registry::Asset;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;

const QUOTE_KEY: &str = "USD";

#[derive(Debug, Deserialize)]
struct Ticker {
    id: String,
    #[serde(default)]
    quotes: HashMap<String, TickerQuote>,
}

#[derive(Debug, Deserialize)]
struct TickerQuote {
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    volume_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    percent_change_24h: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OhlcvBar {
    time_open: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_f64")]
    open: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    high: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    low: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    volume: Option<f64>,
}

pub fn quotes_request(template: &str) -> ProviderRequest {
    ProviderRequest::new(template).query("quotes", QUOTE_KEY)
}

pub fn parse_quotes(
    body: &[u8],
    assets: &[Asset],
) -> Result<HashMap<String, NormalizedQuote>, String> {
    let tickers: Vec<Ticker> = decode(body)?;
    let by_id: HashMap<&str, &Ticker> = tickers.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut quotes = HashMap::new();
    for asset in assets {
        let Some(quote) = by_id
            .get(asset.coinpaprika_id.as_str())
            .and_then(|t| t.quotes.get(QUOTE_KEY))
        else {
            continue;
        };
        quotes.insert(
            asset.pair.clone(),
            NormalizedQuote {
                name: asset.name.clone(),
                price: quote.price.unwrap_or(0.0),
                change_24h: quote.percent_change_24h.unwrap_or(0.0),
                volume_24h: quote.volume_24h.unwrap_or(0.0),
                market_cap: quote.market_cap.unwrap_or(0.0),
            },
        );
    }

    Ok(quotes)
}

/// GET coins/{coin_id}/ohlcv/historical?start=YYYY-MM-DD. Daily candles only.
pub fn history_request(
    url: String,
    timeframe: Timeframe,
    limit: u32,
    now: DateTime<Utc>,
) -> Option<ProviderRequest> {
    if timeframe != Timeframe::D1 {
        return None;
    }
    let start = now - Duration::days(i64::from(limit));
    Some(
        ProviderRequest::new(url)
            .query("start", start.format("%Y-%m-%d"))
            .query("limit", limit)
            .query("quote", QUOTE_KEY.to_lowercase()),
    )
}

pub fn parse_history(body: &[u8]) -> Result<Vec<HistoricalPoint>, String> {
    let bars: Vec<OhlcvBar> = decode(body)?;
    Ok(bars
        .into_iter()
        .map(|bar| {
            let close = bar.close.unwrap_or(0.0);
            HistoricalPoint {
                timestamp: bar.time_open,
                open: bar.open.unwrap_or(close),
                high: bar.high.unwrap_or(close),
                low: bar.low.unwrap_or(close),
                close,
                volume: bar.volume.unwrap_or(0.0),
            }
        })
        .collect())
}
