// Static provider table and reliability ordering
pub mod assets;

pub use assets::{Asset, AssetCatalog};

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Rate limit reported for providers the registry does not know
pub const DEFAULT_RATE_LIMIT: u32 = 10;

/// Placeholder substituted with the provider-specific asset id
pub const COIN_ID_PLACEHOLDER: &str = "{coin_id}";

/// Placeholder for providers that split candle widths across endpoints
/// (CryptoCompare histominute/histohour/histoday)
pub const RESOLUTION_PLACEHOLDER: &str = "{resolution}";

/// Upstream market data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "cryptocompare")]
    CryptoCompare,
    #[serde(rename = "binance")]
    Binance,
    #[serde(rename = "coinpaprika")]
    CoinPaprika,
    #[serde(rename = "coingecko")]
    CoinGecko,
    #[serde(rename = "alternative_me")]
    AlternativeMe,
}

impl ProviderId {
    pub const ALL: [ProviderId; 5] = [
        ProviderId::CryptoCompare,
        ProviderId::Binance,
        ProviderId::CoinPaprika,
        ProviderId::CoinGecko,
        ProviderId::AlternativeMe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::CryptoCompare => "cryptocompare",
            ProviderId::Binance => "binance",
            ProviderId::CoinPaprika => "coinpaprika",
            ProviderId::CoinGecko => "coingecko",
            ProviderId::AlternativeMe => "alternative_me",
        }
    }

    /// Endpoint kinds this provider's payloads can be normalized from
    pub fn supported_kinds(&self) -> &'static [EndpointKind] {
        match self {
            ProviderId::CryptoCompare | ProviderId::Binance | ProviderId::CoinPaprika => {
                &[EndpointKind::Price, EndpointKind::Historical]
            }
            ProviderId::CoinGecko => &[
                EndpointKind::Price,
                EndpointKind::Historical,
                EndpointKind::Global,
            ],
            ProviderId::AlternativeMe => &[EndpointKind::Sentiment],
        }
    }

    /// Environment variable holding this provider's API key, if it takes one
    pub fn credential_env(&self) -> Option<&'static str> {
        match self {
            ProviderId::CryptoCompare => Some("CRYPTOCOMPARE_API_KEY"),
            ProviderId::Binance => Some("BINANCE_API_KEY"),
            ProviderId::CoinGecko => Some("COINGECKO_API_KEY"),
            ProviderId::CoinPaprika | ProviderId::AlternativeMe => None,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RegistryError::UnknownProvider(s.to_string()))
    }
}

/// Kind of data an endpoint serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Price,
    Historical,
    Global,
    Sentiment,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Price => "price",
            EndpointKind::Historical => "historical",
            EndpointKind::Global => "global",
            EndpointKind::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "price" => Ok(EndpointKind::Price),
            // Binance calls its candle endpoint "klines"
            "historical" | "klines" => Ok(EndpointKind::Historical),
            "global" => Ok(EndpointKind::Global),
            "sentiment" => Ok(EndpointKind::Sentiment),
            other => Err(RegistryError::UnknownEndpointKind(other.to_string())),
        }
    }
}

/// Static description of one upstream provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub name: String,
    /// 0-100, higher is tried first
    pub reliability: u8,
    /// Requests per second, informational unless enforcement is enabled
    pub rate_limit: u32,
    pub requires_key: bool,
    pub endpoints: BTreeMap<EndpointKind, String>,
}

impl ProviderDescriptor {
    pub fn new(id: ProviderId, name: &str, reliability: u8, rate_limit: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            reliability,
            rate_limit,
            requires_key: false,
            endpoints: BTreeMap::new(),
        }
    }

    pub fn with_endpoint(mut self, kind: EndpointKind, template: &str) -> Self {
        self.endpoints.insert(kind, template.to_string());
        self
    }

    pub fn requiring_key(mut self) -> Self {
        self.requires_key = true;
        self
    }

    fn validate(&self) -> Result<(), RegistryError> {
        if self.reliability > 100 {
            return Err(RegistryError::InvalidReliability {
                provider: self.id,
                score: self.reliability,
            });
        }

        for (kind, template) in &self.endpoints {
            if !self.id.supported_kinds().contains(kind) {
                return Err(RegistryError::UnsupportedEndpoint {
                    provider: self.id,
                    kind: *kind,
                });
            }

            let trimmed = template.trim();
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                return Err(RegistryError::InvalidTemplate {
                    provider: self.id,
                    kind: *kind,
                    template: template.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Immutable lookup table of providers, built once at start-up
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl SourceRegistry {
    /// Validate and load a provider table. Registration order is kept and
    /// breaks reliability ties.
    pub fn new(providers: Vec<ProviderDescriptor>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();

        for descriptor in &providers {
            if !seen.insert(descriptor.id) {
                return Err(RegistryError::DuplicateProvider(descriptor.id));
            }
            descriptor.validate()?;
        }

        tracing::debug!("Loaded {} market data providers", providers.len());

        Ok(Self { providers })
    }

    /// Built-in provider table
    pub fn builtin_descriptors() -> Vec<ProviderDescriptor> {
        vec![
            ProviderDescriptor::new(ProviderId::CryptoCompare, "CryptoCompare", 95, 100)
                .with_endpoint(
                    EndpointKind::Price,
                    "https://min-api.cryptocompare.com/data/pricemultifull",
                )
                .with_endpoint(
                    EndpointKind::Historical,
                    "https://min-api.cryptocompare.com/data/v2/histo{resolution}",
                ),
            ProviderDescriptor::new(ProviderId::CoinPaprika, "CoinPaprika", 85, 25)
                .with_endpoint(EndpointKind::Price, "https://api.coinpaprika.com/v1/tickers")
                .with_endpoint(
                    EndpointKind::Historical,
                    "https://api.coinpaprika.com/v1/coins/{coin_id}/ohlcv/historical",
                ),
            ProviderDescriptor::new(ProviderId::Binance, "Binance", 90, 1200)
                .with_endpoint(EndpointKind::Price, "https://api.binance.com/api/v3/ticker/24hr")
                .with_endpoint(EndpointKind::Historical, "https://api.binance.com/api/v3/klines"),
            ProviderDescriptor::new(ProviderId::CoinGecko, "CoinGecko", 80, 30)
                .with_endpoint(
                    EndpointKind::Price,
                    "https://api.coingecko.com/api/v3/simple/price",
                )
                .with_endpoint(
                    EndpointKind::Historical,
                    "https://api.coingecko.com/api/v3/coins/{coin_id}/market_chart",
                )
                .with_endpoint(EndpointKind::Global, "https://api.coingecko.com/api/v3/global"),
            ProviderDescriptor::new(
                ProviderId::AlternativeMe,
                "Alternative.me",
                70,
                DEFAULT_RATE_LIMIT,
            )
            .with_endpoint(EndpointKind::Sentiment, "https://api.alternative.me/fng/"),
        ]
    }

    /// Provider ids sorted by descending reliability, ties in registration order
    pub fn list_providers_by_reliability(&self) -> Vec<ProviderId> {
        let mut ordered: Vec<&ProviderDescriptor> = self.providers.iter().collect();
        // sort_by_key is stable
        ordered.sort_by_key(|d| std::cmp::Reverse(d.reliability));
        ordered.into_iter().map(|d| d.id).collect()
    }

    /// URL template for an endpoint, or "" when the provider or kind is unknown
    pub fn get_endpoint(&self, provider: ProviderId, kind: EndpointKind) -> &str {
        self.descriptor(provider)
            .and_then(|d| d.endpoints.get(&kind))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn get_rate_limit(&self, provider: ProviderId) -> u32 {
        self.descriptor(provider)
            .map(|d| d.rate_limit)
            .unwrap_or(DEFAULT_RATE_LIMIT)
    }

    pub fn requires_key(&self, provider: ProviderId) -> bool {
        self.descriptor(provider)
            .map(|d| d.requires_key)
            .unwrap_or(false)
    }

    pub fn descriptor(&self, provider: ProviderId) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|d| d.id == provider)
    }

    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self {
            providers: Self::builtin_descriptors(),
        }
    }
}

/// Substitute `{coin_id}` in a URL template
pub fn render_template(template: &str, coin_id: &str) -> String {
    template.replace(COIN_ID_PLACEHOLDER, coin_id)
}
