//! Tests for the quote fallback chain.

use std::sync::Arc;

use rust_decimal_macros::dec;

use vnmarket_market_data::{AssetCategory, QuoteSnapshot};

use super::fallback::FallbackChain;
use super::model::QuoteTier;
use crate::config::{FallbackConfig, HistoricalConfig};
use crate::errors::Error;
use crate::history::HistoricalCacheCoordinator;
use crate::singleflight::SingleFlight;
use crate::test_support::{date, protected, record, Failure, MockProvider, MockStore};

fn chain(store: &MockStore, provider: &Arc<MockProvider>) -> FallbackChain {
    let upstream = protected(provider.clone());
    let coordinator = Arc::new(HistoricalCacheCoordinator::new(
        Arc::new(store.clone()),
        upstream.clone(),
        Arc::new(SingleFlight::new()),
        HistoricalConfig::default(),
    ));
    FallbackChain::new(
        upstream,
        Arc::new(store.clone()),
        coordinator,
        FallbackConfig::default(),
    )
}

#[tokio::test]
async fn test_live_quote_wins() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());
    provider.set_quote(QuoteSnapshot::flat(
        "VNM",
        AssetCategory::Stock,
        date(2025, 11, 5),
        dec!(61000),
        "VCI",
    ));
    store.insert_record(record("VNM", AssetCategory::Stock, date(2025, 11, 3), dec!(60000)));

    let result = chain(&store, &provider)
        .resolve_as_of("VNM", AssetCategory::Stock, date(2025, 11, 5))
        .await
        .unwrap();

    assert_eq!(result.tier, QuoteTier::Live);
    assert_eq!(result.quote.close, dec!(61000));
}

#[tokio::test]
async fn test_recent_record_served_without_recovery() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());
    store.insert_record(record("VNM", AssetCategory::Stock, date(2025, 11, 3), dec!(60000)));

    let result = chain(&store, &provider)
        .resolve_as_of("VNM", AssetCategory::Stock, date(2025, 11, 5))
        .await
        .unwrap();

    assert_eq!(result.tier, QuoteTier::CachedRecency);
    assert_eq!(result.quote.close, dec!(60000));
    assert_eq!(result.quote.source, "CACHE");
    assert_eq!(provider.quote_calls().len(), 1);
    assert!(provider.history_calls().is_empty());
}

#[tokio::test]
async fn test_zero_priced_live_quote_falls_through() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());
    provider.set_quote(QuoteSnapshot::flat(
        "FPT",
        AssetCategory::Stock,
        date(2025, 11, 5),
        dec!(0),
        "VCI",
    ));
    store.insert_record(record("FPT", AssetCategory::Stock, date(2025, 10, 20), dec!(95000)));

    let result = chain(&store, &provider)
        .resolve_as_of("FPT", AssetCategory::Stock, date(2025, 11, 5))
        .await
        .unwrap();

    assert_eq!(result.tier, QuoteTier::CachedRecency);
}

#[tokio::test]
async fn test_recovery_backfills_recent_history() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());
    provider.set_history(
        "VESAF",
        vec![
            record("VESAF", AssetCategory::Fund, date(2025, 11, 3), dec!(25000)),
            record("VESAF", AssetCategory::Fund, date(2025, 11, 4), dec!(25100)),
        ],
    );

    let result = chain(&store, &provider)
        .resolve_as_of("VESAF", AssetCategory::Fund, date(2025, 11, 5))
        .await
        .unwrap();

    assert_eq!(result.tier, QuoteTier::Recovery);
    assert_eq!(result.quote.close, dec!(25100));
    assert_eq!(provider.history_calls().len(), 1);
    // Recovered records were persisted
    assert_eq!(store.record_count(), 2);
}

#[tokio::test]
async fn test_record_outside_lookback_is_ignored() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());
    provider.fail_with(Failure::Unavailable);
    store.insert_record(record("VNM", AssetCategory::Stock, date(2025, 9, 1), dec!(58000)));

    let result = chain(&store, &provider)
        .resolve_as_of("VNM", AssetCategory::Stock, date(2025, 11, 5))
        .await;

    assert!(matches!(result, Err(Error::NoDataAvailable { .. })));
}
