// Core modules
pub mod api;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod models;
pub mod persistence;
pub mod registry;

// Re-export commonly used types
pub use cache::{CachePolicy, TieredCache, WarmStore};
pub use credentials::CredentialStore;
pub use feed::{Fetched, Freshness, MarketFeed};
pub use fetcher::{FetchSettings, MarketDataFetcher, Sourced};
pub use models::*;
pub use registry::{AssetCatalog, EndpointKind, ProviderDescriptor, ProviderId, SourceRegistry};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
