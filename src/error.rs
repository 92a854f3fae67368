use crate::registry::{EndpointKind, ProviderId};
use thiserror::Error;

/// Failure of a single provider attempt.
///
/// These never leave the fetcher: each one is logged and the next provider
/// in reliability order is tried.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Network unreachable, DNS, connection refused
    #[error("transport failure from {provider}: {source}")]
    Transport {
        provider: ProviderId,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {provider} timed out")]
    Timeout { provider: ProviderId },

    /// Non-2xx HTTP status
    #[error("{provider} rejected request with status {status}")]
    Status {
        provider: ProviderId,
        status: reqwest::StatusCode,
    },

    /// Payload could not be normalized into a canonical record
    #[error("malformed payload from {provider}: {message}")]
    Malformed {
        provider: ProviderId,
        message: String,
    },

    /// Local quota for the provider is exhausted
    #[error("local rate limit reached for {provider}")]
    RateLimited { provider: ProviderId },
}

impl FetchError {
    pub fn malformed(provider: ProviderId, message: impl Into<String>) -> Self {
        FetchError::Malformed {
            provider,
            message: message.into(),
        }
    }

    pub fn from_reqwest(provider: ProviderId, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { provider }
        } else if err.is_decode() {
            FetchError::malformed(provider, err.to_string())
        } else {
            FetchError::Transport {
                provider,
                source: err,
            }
        }
    }
}

/// Provider table rejected while loading
#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("provider {0} registered more than once")]
    DuplicateProvider(ProviderId),

    #[error("provider {provider} has reliability score {score}, expected 0-100")]
    InvalidReliability { provider: ProviderId, score: u8 },

    #[error("provider {provider} cannot serve {kind} data")]
    UnsupportedEndpoint {
        provider: ProviderId,
        kind: EndpointKind,
    },

    #[error("provider {provider} has an invalid {kind} URL template: {template:?}")]
    InvalidTemplate {
        provider: ProviderId,
        kind: EndpointKind,
        template: String,
    },

    #[error("unknown provider id: {0}")]
    UnknownProvider(String),

    #[error("unknown endpoint kind: {0}")]
    UnknownEndpointKind(String),
}

/// Warm-store failure. Logged and treated as a cache miss.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("warm store connection timed out")]
    ConnectTimeout,
}
