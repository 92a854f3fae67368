use clap::{Parser, Subcommand};
use marketfeed::config::Settings;
use marketfeed::persistence::RedisWarmStore;
use marketfeed::{
    AssetCatalog, CredentialStore, Fetched, MarketDataFetcher, MarketFeed, Result, TieredCache,
    Timeframe,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Crypto market data from several public APIs, most reliable source first
#[derive(Parser)]
#[command(name = "marketfeed", version)]
struct Cli {
    /// Config file (defaults to ./marketfeed.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip the cache and always query providers
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List providers in fallback order with availability
    Providers,
    /// Spot quotes; all tracked pairs when none are given
    Quotes { pairs: Vec<String> },
    /// Fear & greed index
    Sentiment,
    /// Global market aggregates
    Overview,
    /// Gainers, losers and total volume; all tracked pairs when none are given
    Summary { pairs: Vec<String> },
    /// OHLCV candles for one pair
    History {
        pair: String,
        /// 1m, 5m, 15m, 30m, 1h, 4h, 1d or 1w; anything else means 1h
        #[arg(long, default_value = "1h")]
        timeframe: String,
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let registry = Arc::new(settings.registry()?);
    let credentials = Arc::new(CredentialStore::from_env(&registry));
    let fetcher = MarketDataFetcher::new(
        registry,
        credentials,
        Arc::new(AssetCatalog::default()),
        settings.fetch_settings(),
    )?;

    let feed = build_feed(fetcher, &settings, cli.no_cache).await;

    match cli.command {
        Command::Providers => print_json(&feed.fetcher().providers())?,
        Command::Quotes { pairs } => {
            let pairs = or_all_pairs(&feed, pairs);
            let Fetched {
                data,
                freshness,
                source,
            } = feed.quotes(&pairs).await;
            // stable output order
            let data: BTreeMap<_, _> = data.into_iter().collect();
            print_json(&Fetched {
                data,
                freshness,
                source,
            })?
        }
        Command::Sentiment => print_json(&feed.sentiment().await)?,
        Command::Overview => print_json(&feed.overview().await)?,
        Command::Summary { pairs } => {
            let pairs = or_all_pairs(&feed, pairs);
            print_json(&feed.summary(&pairs).await)?
        }
        Command::History {
            pair,
            timeframe,
            limit,
        } => {
            let timeframe = Timeframe::parse_lenient(&timeframe);
            print_json(&feed.history(&pair, timeframe, limit).await)?
        }
    }

    Ok(())
}

fn or_all_pairs(feed: &MarketFeed, pairs: Vec<String>) -> Vec<String> {
    if pairs.is_empty() {
        feed.fetcher().catalog().pairs()
    } else {
        pairs
    }
}

fn setup_logging() {
    // stdout carries the JSON output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("marketfeed=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn build_feed(fetcher: MarketDataFetcher, settings: &Settings, no_cache: bool) -> MarketFeed {
    if no_cache || !settings.cache.enabled {
        tracing::info!("Cache disabled, every request goes to providers");
        return MarketFeed::uncached(fetcher);
    }

    let mut cache = TieredCache::new(settings.cache_policy());

    if let Some(redis_url) = &settings.cache.redis_url {
        match RedisWarmStore::new(redis_url).await {
            Ok(store) => cache = cache.with_warm_store(Arc::new(store)),
            Err(e) => {
                tracing::warn!(
                    "Failed to connect to Redis ({}), continuing with in-memory cache only",
                    e
                );
            }
        }
    }

    MarketFeed::new(fetcher, cache)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
