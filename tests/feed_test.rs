use marketfeed::*;
use mockito::{Matcher, Server, ServerGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const FNG: &str = r#"{"data":[{"value":"31","value_classification":"Fear","timestamp":"1700006400"}]}"#;

fn sentiment_fetcher(server: &ServerGuard) -> MarketDataFetcher {
    let registry = SourceRegistry::new(vec![ProviderDescriptor::new(
        ProviderId::AlternativeMe,
        "Alternative.me",
        70,
        10,
    )
    .with_endpoint(EndpointKind::Sentiment, &format!("{}/fng", server.url()))])
    .unwrap();
    let credentials = CredentialStore::from_map(&registry, HashMap::new());

    MarketDataFetcher::new(
        Arc::new(registry),
        Arc::new(credentials),
        Arc::new(AssetCatalog::default()),
        FetchSettings::default(),
    )
    .unwrap()
}

fn fear() -> SentimentSnapshot {
    SentimentSnapshot {
        value: 31,
        classification: "Fear".to_string(),
        timestamp: "1700006400".to_string(),
    }
}

#[tokio::test]
async fn test_second_read_served_from_hot_tier() {
    let mut server = Server::new_async().await;
    let fng = server
        .mock("GET", "/fng")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(FNG)
        .expect(1)
        .create_async()
        .await;

    let feed = MarketFeed::new(sentiment_fetcher(&server), TieredCache::default());

    let first = feed.sentiment().await;
    let second = feed.sentiment().await;

    assert_eq!(first.data, fear());
    assert_eq!(first.freshness, Freshness::Live);
    assert_eq!(first.source, Some(ProviderId::AlternativeMe));
    assert_eq!(second.data, fear());
    assert_eq!(second.freshness, Freshness::Hot);
    // cached copies keep their provider
    assert_eq!(second.source, Some(ProviderId::AlternativeMe));
    fng.assert_async().await;
}

#[tokio::test]
async fn test_warm_tier_serves_after_hot_expiry() {
    let mut server = Server::new_async().await;
    let fng = server
        .mock("GET", "/fng")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(FNG)
        .expect(1)
        .create_async()
        .await;

    let policy = CachePolicy {
        hot_ttl: Duration::ZERO,
        ..CachePolicy::default()
    };
    let feed = MarketFeed::new(sentiment_fetcher(&server), TieredCache::new(policy));

    assert_eq!(feed.sentiment().await.freshness, Freshness::Live);
    let second = feed.sentiment().await;

    assert_eq!(second.freshness, Freshness::Warm);
    assert_eq!(second.data, fear());
    assert_eq!(second.source, Some(ProviderId::AlternativeMe));
    fng.assert_async().await;
}

#[tokio::test]
async fn test_stale_entry_served_when_sources_fail() {
    let mut server = Server::new_async().await;
    let ok = server
        .mock("GET", "/fng")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(FNG)
        .create_async()
        .await;

    // fresh tiers expire immediately so the second read goes live
    let policy = CachePolicy {
        hot_ttl: Duration::ZERO,
        warm_ttl: Duration::ZERO,
        ..CachePolicy::default()
    };
    let feed = MarketFeed::new(sentiment_fetcher(&server), TieredCache::new(policy));

    assert_eq!(feed.sentiment().await.freshness, Freshness::Live);

    ok.remove_async().await;
    server
        .mock("GET", "/fng")
        .match_query(Matcher::Any)
        .with_status(502)
        .create_async()
        .await;

    let stale = feed.sentiment().await;
    assert!(stale.is_stale());
    assert_eq!(stale.data, fear());
    assert_eq!(stale.source, Some(ProviderId::AlternativeMe));
}

#[tokio::test]
async fn test_neutral_default_when_nothing_cached() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/fng")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let feed = MarketFeed::new(sentiment_fetcher(&server), TieredCache::default());
    let result = feed.sentiment().await;

    assert_eq!(result.freshness, Freshness::Default);
    assert_eq!(result.source, None);
    assert!(result.data.is_neutral_default());
    // defaults are never cached
    assert!(feed.cache().unwrap().is_empty());
}

#[tokio::test]
async fn test_uncached_feed_always_goes_live() {
    let mut server = Server::new_async().await;
    let fng = server
        .mock("GET", "/fng")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(FNG)
        .expect(2)
        .create_async()
        .await;

    let feed = MarketFeed::uncached(sentiment_fetcher(&server));

    assert_eq!(feed.sentiment().await.freshness, Freshness::Live);
    assert_eq!(feed.sentiment().await.freshness, Freshness::Live);
    assert!(feed.cache().is_none());
    fng.assert_async().await;
}

#[tokio::test]
async fn test_unknown_pairs_return_empty_live_result() {
    let server = Server::new_async().await;
    let feed = MarketFeed::new(sentiment_fetcher(&server), TieredCache::default());

    let result = feed.quotes(&["FOO/BAR"]).await;
    assert!(result.data.is_empty());
    assert_eq!(result.freshness, Freshness::Live);
    assert_eq!(result.source, None);
}

fn market_fetcher(server: &ServerGuard) -> MarketDataFetcher {
    let url = server.url();
    let registry = SourceRegistry::new(vec![
        ProviderDescriptor::new(ProviderId::CoinGecko, "CoinGecko", 80, 30)
            .with_endpoint(EndpointKind::Price, &format!("{}/cg/price", url))
            .with_endpoint(EndpointKind::Global, &format!("{}/cg/global", url)),
        ProviderDescriptor::new(ProviderId::AlternativeMe, "Alternative.me", 70, 10)
            .with_endpoint(EndpointKind::Sentiment, &format!("{}/fng", url)),
    ])
    .unwrap();
    let credentials = CredentialStore::from_map(&registry, HashMap::new());

    MarketDataFetcher::new(
        Arc::new(registry),
        Arc::new(credentials),
        Arc::new(AssetCatalog::default()),
        FetchSettings::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_summary_over_mixed_quotes() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/cg/price")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"bitcoin":{"usd":64000.0,"usd_24h_change":2.0,"usd_24h_vol":300.0},
                "ethereum":{"usd":3000.0,"usd_24h_change":-1.0,"usd_24h_vol":200.0},
                "cardano":{"usd":0.5,"usd_24h_change":-0.2,"usd_24h_vol":100.0}}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let feed = MarketFeed::new(market_fetcher(&server), TieredCache::default());
    let pairs = ["BTC/USDT", "ETH/USDT", "ADA/USDT"];

    let summary = feed.summary(&pairs).await;
    assert_eq!(summary.freshness, Freshness::Live);
    assert_eq!(summary.source, Some(ProviderId::CoinGecko));
    assert_eq!(summary.data.total_symbols, 3);
    assert_eq!(summary.data.gainers, 1);
    assert_eq!(summary.data.losers, 2);
    assert_eq!(summary.data.total_volume, 600.0);
    assert_eq!(summary.data.data_source, "CoinGecko");

    // shares the quotes cache entry
    let again = feed.summary(&pairs).await;
    assert_eq!(again.freshness, Freshness::Hot);
    assert_eq!(again.data.data_source, "CoinGecko");
}

#[tokio::test]
async fn test_summary_without_data() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/cg/price")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let feed = MarketFeed::new(market_fetcher(&server), TieredCache::default());
    let summary = feed.summary(&["BTC/USDT"]).await;

    assert_eq!(summary.freshness, Freshness::Default);
    assert_eq!(summary.data.total_symbols, 0);
    assert_eq!(summary.data.gainers, 0);
    assert_eq!(summary.data.losers, 0);
    assert_eq!(summary.data.total_volume, 0.0);
    assert_eq!(summary.data.data_source, "No Data Available");
}

#[tokio::test]
async fn test_overview_sentiment_comes_from_cache() {
    let mut server = Server::new_async().await;
    let global = server
        .mock("GET", "/cg/global")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"data":{"active_cryptocurrencies":13500,"total_market_cap":{"usd":2.4e12}}}"#)
        .expect(1)
        .create_async()
        .await;
    let fng = server
        .mock("GET", "/fng")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(FNG)
        .expect(1)
        .create_async()
        .await;

    let feed = MarketFeed::new(market_fetcher(&server), TieredCache::default());

    // warms the sentiment entry first
    assert_eq!(feed.sentiment().await.freshness, Freshness::Live);
    let overview = feed.overview().await;

    assert_eq!(overview.freshness, Freshness::Live);
    assert_eq!(overview.source, Some(ProviderId::CoinGecko));
    assert_eq!(overview.data.total_market_cap, 2.4e12);
    assert_eq!(overview.data.fear_greed, fear());
    global.assert_async().await;
    fng.assert_async().await;
}
