//! Runtime settings.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. `marketfeed.toml` in the working directory (or an explicit path)
//! 3. `MARKETFEED__SECTION__KEY` environment variables
//!
//! Fetch timeouts must lie in 1..=10s for quotes and 1..=5s for sentiment.
//!
//! API keys are deliberately absent: they only come from the provider
//! credential variables read by [`CredentialStore`](crate::credentials::CredentialStore).
//!
//! ```toml
//! [fetch]
//! quote_timeout_secs = 8
//!
//! [cache]
//! redis_url = "redis://127.0.0.1:6379"
//!
//! [providers.coingecko]
//! reliability = 99
//! requires_key = true
//!
//! [providers.binance]
//! enabled = false
//! ```

use crate::cache::CachePolicy;
use crate::error::RegistryError;
use crate::fetcher::{FetchSettings, DEFAULT_QUOTE_TIMEOUT, DEFAULT_SENTIMENT_TIMEOUT};
use crate::registry::{EndpointKind, ProviderId, SourceRegistry};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "marketfeed";
pub const ENV_PREFIX: &str = "MARKETFEED";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
    /// Keyed by provider id, e.g. "coingecko"
    pub providers: HashMap<String, ProviderOverride>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub quote_timeout_secs: u64,
    pub sentiment_timeout_secs: u64,
    pub enforce_rate_limits: bool,
    pub user_agent: Option<String>,
}

impl FetchConfig {
    /// Timeouts must be non-zero and no longer than the defaults
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_timeout(
            "fetch.quote_timeout_secs",
            self.quote_timeout_secs,
            DEFAULT_QUOTE_TIMEOUT,
        )?;
        check_timeout(
            "fetch.sentiment_timeout_secs",
            self.sentiment_timeout_secs,
            DEFAULT_SENTIMENT_TIMEOUT,
        )
    }
}

fn check_timeout(key: &str, secs: u64, max: Duration) -> Result<(), ConfigError> {
    if secs == 0 || secs > max.as_secs() {
        return Err(ConfigError::Message(format!(
            "{} must be between 1 and {} seconds, got {}",
            key,
            max.as_secs(),
            secs
        )));
    }
    Ok(())
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            quote_timeout_secs: 10,
            sentiment_timeout_secs: 5,
            enforce_rate_limits: false,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub hot_ttl_secs: u64,
    pub warm_ttl_secs: u64,
    pub cold_ttl_secs: u64,
    pub max_entries: usize,
    /// Persist the warm tier in Redis when set
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hot_ttl_secs: 10,
            warm_ttl_secs: 300,
            cold_ttl_secs: 3600,
            max_entries: 1000,
            redis_url: None,
        }
    }
}

/// Per-provider changes applied over the built-in table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderOverride {
    pub enabled: Option<bool>,
    pub reliability: Option<u8>,
    pub rate_limit: Option<u32>,
    pub requires_key: Option<bool>,
    /// Endpoint kind ("price", "historical", "global", "sentiment") to URL template
    pub endpoints: HashMap<String, String>,
}

impl Settings {
    /// Load from the default file (optional) or `path` (required), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()
            .and_then(|settings| {
                settings.fetch.validate()?;
                Ok(settings)
            })
    }

    /// Built-in provider table with overrides applied, validated
    pub fn registry(&self) -> Result<SourceRegistry, RegistryError> {
        let mut descriptors = SourceRegistry::builtin_descriptors();

        for (name, overrides) in &self.providers {
            let id: ProviderId = name.parse()?;

            if overrides.enabled == Some(false) {
                tracing::info!(provider = %id, "Provider disabled by configuration");
                descriptors.retain(|d| d.id != id);
                continue;
            }

            let Some(descriptor) = descriptors.iter_mut().find(|d| d.id == id) else {
                continue;
            };
            if let Some(reliability) = overrides.reliability {
                descriptor.reliability = reliability;
            }
            if let Some(rate_limit) = overrides.rate_limit {
                descriptor.rate_limit = rate_limit;
            }
            if let Some(requires_key) = overrides.requires_key {
                descriptor.requires_key = requires_key;
            }
            for (kind, template) in &overrides.endpoints {
                let kind: EndpointKind = kind.parse()?;
                descriptor.endpoints.insert(kind, template.clone());
            }
        }

        SourceRegistry::new(descriptors)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        let defaults = FetchSettings::default();
        FetchSettings {
            quote_timeout: Duration::from_secs(self.fetch.quote_timeout_secs),
            sentiment_timeout: Duration::from_secs(self.fetch.sentiment_timeout_secs),
            enforce_rate_limits: self.fetch.enforce_rate_limits,
            user_agent: self.fetch.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            hot_ttl: Duration::from_secs(self.cache.hot_ttl_secs),
            warm_ttl: Duration::from_secs(self.cache.warm_ttl_secs),
            cold_ttl: Duration::from_secs(self.cache.cold_ttl_secs),
            max_entries: self.cache.max_entries,
        }
    }
}
