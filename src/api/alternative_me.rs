use super::{decode, value_as_f64, ProviderRequest};
use crate::models::SentimentSnapshot;
use serde::Deserialize;

/// Response from the Fear & Greed Index endpoint
#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: serde_json::Value, // "54" on the wire
    value_classification: String,
    #[serde(default)]
    timestamp: serde_json::Value,
}

/// GET fng/?limit=1
pub fn sentiment_request(template: &str) -> ProviderRequest {
    ProviderRequest::new(template).query("limit", 1)
}

pub fn parse_sentiment(body: &[u8]) -> Result<SentimentSnapshot, String> {
    let payload: FngResponse = decode(body)?;
    let entry = payload.data.first().ok_or("empty data array")?;

    let value = value_as_f64(&entry.value).ok_or("non-numeric index value")?;
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("index value {} out of range", value));
    }

    let timestamp = match &entry.timestamp {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    };

    Ok(SentimentSnapshot {
        value: value.round() as u8,
        classification: entry.value_classification.clone(),
        timestamp,
    })
}
