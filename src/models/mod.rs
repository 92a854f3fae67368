use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical per-asset quote. Fields missing upstream are zero, never absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedQuote {
    pub name: String,
    pub price: f64,
    pub change_24h: f64, // percent
    pub volume_24h: f64,
    pub market_cap: f64,
}

/// Fear & greed style sentiment reading
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentSnapshot {
    pub value: u8, // 0-100
    pub classification: String,
    pub timestamp: String, // as reported by the source
}

impl SentimentSnapshot {
    pub const NEUTRAL_VALUE: u8 = 50;
    pub const NEUTRAL_CLASSIFICATION: &'static str = "Neutral";

    /// Placeholder used when no sentiment source is reachable
    pub fn neutral() -> Self {
        Self {
            value: Self::NEUTRAL_VALUE,
            classification: Self::NEUTRAL_CLASSIFICATION.to_string(),
            timestamp: String::new(),
        }
    }

    pub fn is_neutral_default(&self) -> bool {
        *self == Self::neutral()
    }
}

impl Default for SentimentSnapshot {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Whole-market aggregates
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarketOverview {
    pub total_market_cap: f64,
    pub total_volume: f64,
    pub market_cap_change_24h: f64, // percent
    pub active_cryptocurrencies: u64,
    pub bitcoin_dominance: f64,
    pub ethereum_dominance: f64,
    pub fear_greed: SentimentSnapshot,
}

impl MarketOverview {
    /// Overview returned when every source failed
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.total_market_cap == 0.0
            && self.total_volume == 0.0
            && self.market_cap_change_24h == 0.0
            && self.active_cryptocurrencies == 0
            && self.bitcoin_dominance == 0.0
            && self.ethereum_dominance == 0.0
    }

    /// Equality ignoring source timestamps
    pub fn same_data(&self, other: &Self) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        a.fear_greed.timestamp.clear();
        b.fear_greed.timestamp.clear();
        a == b
    }
}

/// Candle width for historical series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[default]
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
        Timeframe::W1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    /// Parse "1m".."1w"; anything else falls back to 1h
    pub fn parse_lenient(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or_else(|| {
                tracing::debug!(timeframe = %s, "Unknown timeframe, using 1h");
                Timeframe::default()
            })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OHLCV candle. Sources without OHLC report the price in all four fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalPoint {
    pub timestamp: DateTime<Utc>, // candle open
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64, // quote currency
}

impl HistoricalPoint {
    /// Candle from a single price sample
    pub fn from_price(timestamp: DateTime<Utc>, price: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }
}

/// Gainers, losers and volume across a set of quotes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSummary {
    pub total_symbols: usize,
    pub gainers: usize,
    pub losers: usize,
    pub total_volume: f64,
    pub data_source: String,
    pub last_update: DateTime<Utc>,
}

impl MarketSummary {
    pub const NO_DATA_SOURCE: &'static str = "No Data Available";

    /// Flat quotes count as neither gainers nor losers
    pub fn from_quotes<'a, I>(quotes: I, data_source: Option<&str>) -> Self
    where
        I: IntoIterator<Item = &'a NormalizedQuote>,
    {
        let mut summary = Self {
            total_symbols: 0,
            gainers: 0,
            losers: 0,
            total_volume: 0.0,
            data_source: Self::NO_DATA_SOURCE.to_string(),
            last_update: Utc::now(),
        };

        for quote in quotes {
            summary.total_symbols += 1;
            if quote.change_24h > 0.0 {
                summary.gainers += 1;
            } else if quote.change_24h < 0.0 {
                summary.losers += 1;
            }
            summary.total_volume += quote.volume_24h;
        }

        if summary.total_symbols > 0 {
            if let Some(source) = data_source {
                summary.data_source = source.to_string();
            }
        }
        summary
    }
}
