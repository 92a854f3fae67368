use super::{decode, from_unix_secs, lenient_f64, ProviderRequest};
use crate::models::{HistoricalPoint, NormalizedQuote, Timeframe};
use crate::registry::{Asset, RESOLUTION_PLACEHOLDER};
use serde::Deserialize;
use std::collections::HashMap;

const TO_SYMBOL: &str = "USD";

/// Envelope shared by CryptoCompare endpoints. Errors come back as HTTP 200
/// with `Response: "Error"`.
#[derive(Debug, Deserialize)]
struct PriceMultiFull {
    #[serde(rename = "RAW", default)]
    raw: Option<HashMap<String, HashMap<String, RawQuote>>>,
    #[serde(rename = "Response", default)]
    response: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    #[serde(rename = "PRICE", default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(rename = "CHANGEPCT24HOUR", default, deserialize_with = "lenient_f64")]
    change_pct_24h: Option<f64>,
    #[serde(rename = "VOLUME24HOURTO", default, deserialize_with = "lenient_f64")]
    volume_24h_to: Option<f64>,
    #[serde(rename = "MKTCAP", default, deserialize_with = "lenient_f64")]
    market_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HistoDay {
    #[serde(rename = "Response", default)]
    response: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "Data", default)]
    data: Option<HistoData>,
}

#[derive(Debug, Deserialize)]
struct HistoData {
    #[serde(rename = "Data", default)]
    data: Vec<HistoBar>,
}

#[derive(Debug, Deserialize)]
struct HistoBar {
    time: i64,
    #[serde(default, deserialize_with = "lenient_f64")]
    open: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    high: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    low: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    volumeto: Option<f64>,
}

fn check_response(response: &Option<String>, message: &Option<String>) -> Result<(), String> {
    if response.as_deref() == Some("Error") {
        return Err(format!(
            "CryptoCompare error: {}",
            message.as_deref().unwrap_or("unknown")
        ));
    }
    Ok(())
}

/// GET pricemultifull?fsyms=BTC,ETH&tsyms=USD
pub fn quotes_request(template: &str, assets: &[Asset]) -> ProviderRequest {
    let symbols: Vec<&str> = assets.iter().map(|a| a.symbol.as_str()).collect();
    ProviderRequest::new(template)
        .query("fsyms", symbols.join(","))
        .query("tsyms", TO_SYMBOL)
}

pub fn parse_quotes(
    body: &[u8],
    assets: &[Asset],
) -> Result<HashMap<String, NormalizedQuote>, String> {
    let payload: PriceMultiFull = decode(body)?;
    check_response(&payload.response, &payload.message)?;
    let raw = payload.raw.ok_or("missing RAW section")?;

    let mut quotes = HashMap::new();
    for asset in assets {
        let Some(quote) = raw.get(&asset.symbol).and_then(|q| q.get(TO_SYMBOL)) else {
            continue;
        };
        quotes.insert(
            asset.pair.clone(),
            NormalizedQuote {
                name: asset.name.clone(),
                price: quote.price.unwrap_or(0.0),
                change_24h: quote.change_pct_24h.unwrap_or(0.0),
                volume_24h: quote.volume_24h_to.unwrap_or(0.0),
                market_cap: quote.market_cap.unwrap_or(0.0),
            },
        );
    }

    Ok(quotes)
}

/// Endpoint suffix and bar aggregation for a candle width
fn resolution(timeframe: Timeframe) -> (&'static str, u32) {
    match timeframe {
        Timeframe::M1 => ("minute", 1),
        Timeframe::M5 => ("minute", 5),
        Timeframe::M15 => ("minute", 15),
        Timeframe::M30 => ("minute", 30),
        Timeframe::H1 => ("hour", 1),
        Timeframe::H4 => ("hour", 4),
        Timeframe::D1 => ("day", 1),
        Timeframe::W1 => ("day", 7),
    }
}

/// GET histo{minute,hour,day}?fsym=BTC&tsym=USD&limit=N[&aggregate=K]
pub fn history_request(
    url: String,
    asset: &Asset,
    timeframe: Timeframe,
    limit: u32,
) -> ProviderRequest {
    let (resolution, aggregate) = resolution(timeframe);
    let request = ProviderRequest::new(url.replace(RESOLUTION_PLACEHOLDER, resolution))
        .query("fsym", &asset.symbol)
        .query("tsym", TO_SYMBOL)
        // the current bar comes on top of `limit`
        .query("limit", limit.saturating_sub(1).max(1));

    if aggregate > 1 {
        request.query("aggregate", aggregate)
    } else {
        request
    }
}

pub fn parse_history(body: &[u8]) -> Result<Vec<HistoricalPoint>, String> {
    let payload: HistoDay = decode(body)?;
    check_response(&payload.response, &payload.message)?;
    let data = payload.data.ok_or("missing Data section")?;

    data.data
        .into_iter()
        .map(|bar| -> Result<HistoricalPoint, String> {
            let close = bar.close.unwrap_or(0.0);
            Ok(HistoricalPoint {
                timestamp: from_unix_secs(bar.time)?,
                open: bar.open.unwrap_or(close),
                high: bar.high.unwrap_or(close),
                low: bar.low.unwrap_or(close),
                close,
                volume: bar.volumeto.unwrap_or(0.0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AssetCatalog;

    #[test]
    fn test_parse_quotes() {
        let assets = AssetCatalog::default().resolve(&["BTC/USDT", "ETH/USDT"]);
        let body = br#"{
            "RAW": {
                "BTC": {"USD": {"PRICE": 65000.5, "CHANGEPCT24HOUR": 1.2, "VOLUME24HOURTO": 1.5e9, "MKTCAP": 1.28e12}},
                "ETH": {"USD": {"PRICE": 3200.0}}
            }
        }"#;

        let quotes = parse_quotes(body, &assets).unwrap();
        let btc = &quotes["BTC/USDT"];
        assert_eq!(btc.name, "Bitcoin");
        assert_eq!(btc.price, 65000.5);
        assert_eq!(btc.change_24h, 1.2);
        assert_eq!(btc.market_cap, 1.28e12);

        let eth = &quotes["ETH/USDT"];
        assert_eq!(eth.price, 3200.0);
        assert_eq!(eth.volume_24h, 0.0);
        assert_eq!(eth.market_cap, 0.0);
    }

    #[test]
    fn test_error_envelope_rejected() {
        let assets = AssetCatalog::default().resolve(&["BTC/USDT"]);
        let body = br#"{"Response":"Error","Message":"rate limit","HasWarning":false}"#;
        let err = parse_quotes(body, &assets).unwrap_err();
        assert!(err.contains("rate limit"));
    }

    #[test]
    fn test_parse_history() {
        let body = br#"{"Response":"Success","Data":{"Data":[
            {"time":1700000000,"open":34000.0,"high":35500.0,"low":33900.0,"close":35000.0,"volumeto":1000.0},
            {"time":1700086400,"close":36000.0}
        ]}}"#;
        let points = parse_history(body).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp.timestamp(), 1700000000);
        assert_eq!(points[0].open, 34000.0);
        assert_eq!(points[0].high, 35500.0);
        assert_eq!(points[0].low, 33900.0);
        assert_eq!(points[0].close, 35000.0);
        // missing OHLC collapses onto the close
        assert_eq!(points[1].open, 36000.0);
        assert_eq!(points[1].volume, 0.0);
    }

    #[test]
    fn test_history_request_per_timeframe() {
        let btc = &AssetCatalog::default().resolve(&["BTC/USDT"])[0];
        let template = "https://cc/data/v2/histo{resolution}".to_string();

        let four_hour = history_request(template.clone(), btc, Timeframe::H4, 100);
        assert_eq!(four_hour.url, "https://cc/data/v2/histohour");
        assert!(four_hour.query.contains(&("limit".to_string(), "99".to_string())));
        assert!(four_hour.query.contains(&("aggregate".to_string(), "4".to_string())));

        let daily = history_request(template.clone(), btc, Timeframe::D1, 30);
        assert_eq!(daily.url, "https://cc/data/v2/histoday");
        assert!(!daily.query.iter().any(|(k, _)| k == "aggregate"));

        let minute = history_request(template, btc, Timeframe::M1, 1);
        assert_eq!(minute.url, "https://cc/data/v2/histominute");
        assert!(minute.query.contains(&("limit".to_string(), "1".to_string())));
    }

    #[test]
    fn test_quotes_request_params() {
        let assets = AssetCatalog::default().resolve(&["BTC/USDT", "SOL/USDT"]);
        let request = quotes_request("https://cc/pricemultifull", &assets);
        assert_eq!(request.query[0], ("fsyms".to_string(), "BTC,SOL".to_string()));
        assert_eq!(request.query[1], ("tsyms".to_string(), "USD".to_string()));
    }
}
