use super::{decode, from_unix_millis, lenient_f64, value_as_f64, ProviderRequest};
use crate::models::{HistoricalPoint, NormalizedQuote, Timeframe};
use crate::registry::Asset;
use serde::Deserialize;
use std::collections::HashMap;

const MAX_KLINES: u32 = 1000;

// kline row layout: [openTime, open, high, low, close, volume, closeTime, quoteVolume, ...]
const KLINE_OPEN_TIME: usize = 0;
const KLINE_OPEN: usize = 1;
const KLINE_HIGH: usize = 2;
const KLINE_LOW: usize = 3;
const KLINE_CLOSE: usize = 4;
const KLINE_QUOTE_VOLUME: usize = 7;

/// Entry of /api/v3/ticker/24hr. Decimals come back as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    last_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_change_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    quote_volume: Option<f64>,
}

/// All tickers in one call, filtered locally. Passing `symbols=` would make
/// one delisted pair fail the whole request.
pub fn quotes_request(template: &str) -> ProviderRequest {
    ProviderRequest::new(template)
}

pub fn parse_quotes(
    body: &[u8],
    assets: &[Asset],
) -> Result<HashMap<String, NormalizedQuote>, String> {
    let tickers: Vec<Ticker24h> = decode(body)?;
    let by_symbol: HashMap<&str, &Ticker24h> =
        tickers.iter().map(|t| (t.symbol.as_str(), t)).collect();

    let mut quotes = HashMap::new();
    for asset in assets {
        let Some(ticker) = by_symbol.get(asset.binance_symbol.as_str()) else {
            continue;
        };
        quotes.insert(
            asset.pair.clone(),
            NormalizedQuote {
                name: asset.name.clone(),
                price: ticker.last_price.unwrap_or(0.0),
                change_24h: ticker.price_change_percent.unwrap_or(0.0),
                volume_24h: ticker.quote_volume.unwrap_or(0.0),
                // not reported by Binance
                market_cap: 0.0,
            },
        );
    }

    Ok(quotes)
}

/// GET klines?symbol=BTCUSDT&interval=1h&limit=N. Interval names match [`Timeframe`].
pub fn history_request(
    url: String,
    asset: &Asset,
    timeframe: Timeframe,
    limit: u32,
) -> ProviderRequest {
    ProviderRequest::new(url)
        .query("symbol", &asset.binance_symbol)
        .query("interval", timeframe.as_str())
        .query("limit", limit.min(MAX_KLINES))
}

pub fn parse_history(body: &[u8]) -> Result<Vec<HistoricalPoint>, String> {
    let rows: Vec<Vec<serde_json::Value>> = decode(body)?;

    rows.iter()
        .map(|row| -> Result<HistoricalPoint, String> {
            if row.len() <= KLINE_QUOTE_VOLUME {
                return Err(format!("kline row has {} columns", row.len()));
            }
            let open_time = row[KLINE_OPEN_TIME]
                .as_i64()
                .ok_or("kline open time is not an integer")?;
            let column = |i: usize| value_as_f64(&row[i]).unwrap_or(0.0);
            Ok(HistoricalPoint {
                timestamp: from_unix_millis(open_time)?,
                open: column(KLINE_OPEN),
                high: column(KLINE_HIGH),
                low: column(KLINE_LOW),
                close: column(KLINE_CLOSE),
                volume: column(KLINE_QUOTE_VOLUME),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AssetCatalog;

    #[test]
    fn test_parse_quotes_filters_symbols() {
        let assets = AssetCatalog::default().resolve(&["BTC/USDT", "ATOM/USDT"]);
        let body = br#"[
            {"symbol":"BTCUSDT","lastPrice":"64000.10","priceChangePercent":"-0.50","quoteVolume":"2000000000.0"},
            {"symbol":"ETHBTC","lastPrice":"0.05","priceChangePercent":"1.0","quoteVolume":"10.0"}
        ]"#;

        let quotes = parse_quotes(body, &assets).unwrap();
        assert_eq!(quotes.len(), 1);
        let btc = &quotes["BTC/USDT"];
        assert_eq!(btc.price, 64000.10);
        assert_eq!(btc.change_24h, -0.5);
        assert_eq!(btc.volume_24h, 2_000_000_000.0);
        assert_eq!(btc.market_cap, 0.0);
    }

    #[test]
    fn test_parse_history() {
        let body = br#"[
            [1700000000000,"35000","36000","34000","35500","100.5",1700086399999,"3500000.0",10,"1","1","0"]
        ]"#;
        let points = parse_history(body).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp.timestamp(), 1700000000);
        assert_eq!(points[0].open, 35000.0);
        assert_eq!(points[0].high, 36000.0);
        assert_eq!(points[0].low, 34000.0);
        assert_eq!(points[0].close, 35500.0);
        assert_eq!(points[0].volume, 3_500_000.0);
    }

    #[test]
    fn test_history_request_interval() {
        let btc = &AssetCatalog::default().resolve(&["BTC/USDT"])[0];
        let request = history_request("https://bn/klines".into(), btc, Timeframe::M15, 5000);
        assert_eq!(
            request.query,
            vec![
                ("symbol".to_string(), "BTCUSDT".to_string()),
                ("interval".to_string(), "15m".to_string()),
                ("limit".to_string(), "1000".to_string()),
            ]
        );
    }

    #[test]
    fn test_short_kline_row_rejected() {
        let body = br#"[[1700000000000,"1","2"]]"#;
        assert!(parse_history(body).is_err());
    }

    #[test]
    fn test_error_object_rejected() {
        let assets = AssetCatalog::default().resolve(&["BTC/USDT"]);
        let body = br#"{"code":-1121,"msg":"Invalid symbol."}"#;
        assert!(parse_quotes(body, &assets).is_err());
    }
}
