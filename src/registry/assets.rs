use super::ProviderId;
use serde::{Deserialize, Serialize};

/// A tracked trading pair and its identifiers at each provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Dashboard pair, e.g. "BTC/USDT"
    pub pair: String,
    pub name: String,
    /// Base symbol, e.g. "BTC"
    pub symbol: String,
    pub coingecko_id: String,
    pub coinpaprika_id: String,
    pub binance_symbol: String,
}

impl Asset {
    fn new(pair: &str, name: &str, coingecko_id: &str, coinpaprika_id: &str) -> Self {
        let symbol = pair.split('/').next().unwrap_or(pair).to_string();
        Self {
            pair: pair.to_string(),
            name: name.to_string(),
            binance_symbol: pair.replace('/', ""),
            symbol,
            coingecko_id: coingecko_id.to_string(),
            coinpaprika_id: coinpaprika_id.to_string(),
        }
    }

    /// Identifier used in this provider's URLs and payloads
    pub fn id_for(&self, provider: ProviderId) -> &str {
        match provider {
            ProviderId::CryptoCompare => &self.symbol,
            ProviderId::Binance => &self.binance_symbol,
            ProviderId::CoinPaprika => &self.coinpaprika_id,
            ProviderId::CoinGecko => &self.coingecko_id,
            ProviderId::AlternativeMe => "",
        }
    }
}

/// Known pairs. Anything else is an unknown pair and never queried.
#[derive(Debug, Clone)]
pub struct AssetCatalog {
    assets: Vec<Asset>,
}

impl AssetCatalog {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self { assets }
    }

    pub fn get(&self, pair: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.pair.eq_ignore_ascii_case(pair))
    }

    /// Resolve requested pairs, dropping unknown ones and duplicates
    pub fn resolve<S: AsRef<str>>(&self, pairs: &[S]) -> Vec<Asset> {
        let mut resolved: Vec<Asset> = Vec::new();
        for pair in pairs {
            let pair: &str = pair.as_ref();
            match self.get(pair) {
                Some(asset) if !resolved.iter().any(|a| a.pair == asset.pair) => {
                    resolved.push(asset.clone())
                }
                Some(_) => {}
                None => tracing::debug!(pair = %pair, "Skipping unknown pair"),
            }
        }
        resolved
    }

    pub fn pairs(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.pair.clone()).collect()
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }
}

impl Default for AssetCatalog {
    fn default() -> Self {
        Self::new(vec![
            Asset::new("BTC/USDT", "Bitcoin", "bitcoin", "btc-bitcoin"),
            Asset::new("ETH/USDT", "Ethereum", "ethereum", "eth-ethereum"),
            Asset::new("SOL/USDT", "Solana", "solana", "sol-solana"),
            Asset::new("ADA/USDT", "Cardano", "cardano", "ada-cardano"),
            Asset::new("DOT/USDT", "Polkadot", "polkadot", "dot-polkadot"),
            Asset::new("LINK/USDT", "Chainlink", "chainlink", "link-chainlink"),
            Asset::new("AVAX/USDT", "Avalanche", "avalanche-2", "avax-avalanche"),
            Asset::new("MATIC/USDT", "Polygon", "matic-network", "matic-polygon"),
            Asset::new("UNI/USDT", "Uniswap", "uniswap", "uni-uniswap"),
            Asset::new("ATOM/USDT", "Cosmos", "cosmos", "atom-cosmos"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = AssetCatalog::default();
        assert_eq!(catalog.assets().len(), 10);

        let btc = catalog.get("BTC/USDT").unwrap();
        assert_eq!(btc.symbol, "BTC");
        assert_eq!(btc.binance_symbol, "BTCUSDT");
        assert_eq!(btc.id_for(ProviderId::CoinGecko), "bitcoin");
        assert_eq!(btc.id_for(ProviderId::CoinPaprika), "btc-bitcoin");
    }

    #[test]
    fn test_resolve_drops_unknown_and_duplicates() {
        let catalog = AssetCatalog::default();
        let resolved = catalog.resolve(&["eth/usdt", "DOGE/USDT", "ETH/USDT", "SOL/USDT"]);

        let pairs: Vec<&str> = resolved.iter().map(|a| a.pair.as_str()).collect();
        assert_eq!(pairs, vec!["ETH/USDT", "SOL/USDT"]);
    }
}
