use super::{decode, from_unix_millis, lenient_f64, ProviderRequest, VS_CURRENCY};
use crate::models::{HistoricalPoint, MarketOverview, NormalizedQuote, Timeframe};
use crate::registry::Asset;
use serde::Deserialize;
use std::collections::HashMap;

/// Entry of /simple/price keyed by coin id
#[derive(Debug, Deserialize)]
struct SimplePrice {
    #[serde(default, deserialize_with = "lenient_f64")]
    usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    usd_24h_change: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    usd_24h_vol: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    usd_market_cap: Option<f64>,
}

/// Response from /market_chart endpoint
#[derive(Debug, Deserialize)]
struct MarketChartData {
    prices: Vec<[f64; 2]>, // [timestamp_ms, price]
    #[serde(default)]
    total_volumes: Vec<[f64; 2]>, // [timestamp_ms, volume_24h]
}

#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    #[serde(default)]
    total_market_cap: HashMap<String, f64>,
    #[serde(default)]
    total_volume: HashMap<String, f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap_change_percentage_24h_usd: Option<f64>,
    #[serde(default)]
    active_cryptocurrencies: Option<u64>,
    #[serde(default)]
    market_cap_percentage: HashMap<String, f64>,
}

/// GET simple/price?ids=...&vs_currencies=usd with change, volume and cap
pub fn quotes_request(template: &str, assets: &[Asset]) -> ProviderRequest {
    let ids: Vec<&str> = assets.iter().map(|a| a.coingecko_id.as_str()).collect();
    ProviderRequest::new(template)
        .query("ids", ids.join(","))
        .query("vs_currencies", VS_CURRENCY)
        .query("include_24hr_change", "true")
        .query("include_24hr_vol", "true")
        .query("include_market_cap", "true")
}

pub fn parse_quotes(
    body: &[u8],
    assets: &[Asset],
) -> Result<HashMap<String, NormalizedQuote>, String> {
    let payload: HashMap<String, SimplePrice> = decode(body)?;

    let mut quotes = HashMap::new();
    for asset in assets {
        let Some(coin) = payload.get(&asset.coingecko_id) else {
            continue;
        };
        quotes.insert(
            asset.pair.clone(),
            NormalizedQuote {
                name: asset.name.clone(),
                price: coin.usd.unwrap_or(0.0),
                change_24h: coin.usd_24h_change.unwrap_or(0.0),
                volume_24h: coin.usd_24h_vol.unwrap_or(0.0),
                market_cap: coin.usd_market_cap.unwrap_or(0.0),
            },
        );
    }

    Ok(quotes)
}

/// GET coins/{coin_id}/market_chart?vs_currency=usd&days=N&interval=daily.
/// Daily samples only; other widths are left to the candle sources.
pub fn history_request(url: String, timeframe: Timeframe, limit: u32) -> Option<ProviderRequest> {
    if timeframe != Timeframe::D1 {
        return None;
    }
    Some(
        ProviderRequest::new(url)
            .query("vs_currency", VS_CURRENCY)
            .query("days", limit)
            .query("interval", "daily"),
    )
}

pub fn parse_history(body: &[u8]) -> Result<Vec<HistoricalPoint>, String> {
    let chart: MarketChartData = decode(body)?;

    chart
        .prices
        .iter()
        .enumerate()
        .map(|(i, [ts, price])| -> Result<HistoricalPoint, String> {
            let volume = chart.total_volumes.get(i).map(|v| v[1]).unwrap_or(0.0);
            Ok(HistoricalPoint::from_price(
                from_unix_millis(*ts as i64)?,
                *price,
                volume,
            ))
        })
        .collect()
}

pub fn parse_overview(body: &[u8]) -> Result<MarketOverview, String> {
    let GlobalResponse { data } = decode(body)?;

    let usd = |map: &HashMap<String, f64>| map.get(VS_CURRENCY).copied().unwrap_or(0.0);

    Ok(MarketOverview {
        total_market_cap: usd(&data.total_market_cap),
        total_volume: usd(&data.total_volume),
        market_cap_change_24h: data.market_cap_change_percentage_24h_usd.unwrap_or(0.0),
        active_cryptocurrencies: data.active_cryptocurrencies.unwrap_or(0),
        bitcoin_dominance: data.market_cap_percentage.get("btc").copied().unwrap_or(0.0),
        ethereum_dominance: data.market_cap_percentage.get("eth").copied().unwrap_or(0.0),
        fear_greed: Default::default(),
    })
}
