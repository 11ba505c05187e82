//! Tests for HistoricalCacheCoordinator against in-memory fakes.

use std::sync::Arc;

use rust_decimal_macros::dec;

use vnmarket_market_data::AssetCategory;

use super::coordinator::HistoricalCacheCoordinator;
use crate::config::HistoricalConfig;
use crate::errors::Error;
use crate::singleflight::SingleFlight;
use crate::test_support::{date, protected, record, Failure, MockProvider, MockStore};

fn coordinator(store: &MockStore, provider: &Arc<MockProvider>) -> HistoricalCacheCoordinator {
    HistoricalCacheCoordinator::new(
        Arc::new(store.clone()),
        protected(provider.clone()),
        Arc::new(SingleFlight::new()),
        HistoricalConfig::default(),
    )
}

#[tokio::test]
async fn test_cached_month_fetches_only_the_missing_day() {
    let store = MockStore::new();
    store.insert_range("VNM", AssetCategory::Stock, date(2025, 10, 1), date(2025, 10, 31));
    let provider = Arc::new(MockProvider::new());
    provider.set_history(
        "VNM",
        vec![record("VNM", AssetCategory::Stock, date(2025, 11, 1), dec!(61500))],
    );

    let records = coordinator(&store, &provider)
        .get_range_as_of(
            "VNM",
            AssetCategory::Stock,
            date(2025, 10, 1),
            date(2025, 11, 1),
            date(2025, 11, 5),
        )
        .await
        .unwrap();

    assert_eq!(
        provider.history_calls(),
        vec![("VNM".to_string(), date(2025, 11, 1), date(2025, 11, 1))]
    );
    assert_eq!(records.len(), 32);
    assert_eq!(records.last().unwrap().close, dec!(61500));
    assert!(records.windows(2).all(|w| w[0].date < w[1].date));
}

#[tokio::test]
async fn test_fully_covered_range_makes_no_calls() {
    let store = MockStore::new();
    store.insert_range("FPT", AssetCategory::Stock, date(2025, 10, 1), date(2025, 10, 10));
    let provider = Arc::new(MockProvider::new());

    let records = coordinator(&store, &provider)
        .get_range_as_of(
            "FPT",
            AssetCategory::Stock,
            date(2025, 10, 1),
            date(2025, 10, 10),
            date(2025, 11, 5),
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 10);
    assert!(provider.history_calls().is_empty());
}

#[tokio::test]
async fn test_empty_days_are_marked_and_not_refetched() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());
    // Fri 2025-10-03 and Mon 2025-10-06 trade; the weekend does not
    provider.set_history(
        "VNM",
        vec![
            record("VNM", AssetCategory::Stock, date(2025, 10, 3), dec!(60000)),
            record("VNM", AssetCategory::Stock, date(2025, 10, 6), dec!(60500)),
        ],
    );
    let coordinator = coordinator(&store, &provider);

    let first = coordinator
        .get_range_as_of(
            "VNM",
            AssetCategory::Stock,
            date(2025, 10, 3),
            date(2025, 10, 6),
            date(2025, 11, 5),
        )
        .await
        .unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(store.marker_count(), 2);

    let second = coordinator
        .get_range_as_of(
            "VNM",
            AssetCategory::Stock,
            date(2025, 10, 3),
            date(2025, 10, 6),
            date(2025, 11, 5),
        )
        .await
        .unwrap();
    assert_eq!(second, first);
    assert_eq!(provider.history_calls().len(), 1);
}

#[tokio::test]
async fn test_today_is_never_marked_absent() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());

    let records = coordinator(&store, &provider)
        .get_range_as_of(
            "VNM",
            AssetCategory::Stock,
            date(2025, 11, 4),
            date(2025, 11, 5),
            date(2025, 11, 5),
        )
        .await
        .unwrap();

    assert!(records.is_empty());
    // Only the 4th is in the past
    assert_eq!(store.marker_count(), 1);
}

#[tokio::test]
async fn test_future_range_returns_empty_without_calls() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());

    let records = coordinator(&store, &provider)
        .get_range_as_of(
            "VNM",
            AssetCategory::Stock,
            date(2025, 12, 1),
            date(2025, 12, 31),
            date(2025, 11, 5),
        )
        .await
        .unwrap();

    assert!(records.is_empty());
    assert!(provider.history_calls().is_empty());
}

#[tokio::test]
async fn test_end_is_clamped_to_today() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());

    coordinator(&store, &provider)
        .get_range_as_of(
            "VNM",
            AssetCategory::Stock,
            date(2025, 11, 3),
            date(2025, 12, 31),
            date(2025, 11, 5),
        )
        .await
        .unwrap();

    assert_eq!(
        provider.history_calls(),
        vec![("VNM".to_string(), date(2025, 11, 3), date(2025, 11, 5))]
    );
}

#[tokio::test]
async fn test_failed_fetch_serves_cached_records() {
    let store = MockStore::new();
    store.insert_range("VNM", AssetCategory::Stock, date(2025, 10, 1), date(2025, 10, 5));
    let provider = Arc::new(MockProvider::new());
    provider.fail_with(Failure::Unavailable);

    let records = coordinator(&store, &provider)
        .get_range_as_of(
            "VNM",
            AssetCategory::Stock,
            date(2025, 10, 1),
            date(2025, 10, 7),
            date(2025, 11, 5),
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 5);
    // Failed windows leave no markers behind
    assert_eq!(store.marker_count(), 0);
}

#[tokio::test]
async fn test_nothing_cached_and_all_fetches_failed() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());
    provider.fail_with(Failure::Throttled);

    let result = coordinator(&store, &provider)
        .get_range_as_of(
            "VNM",
            AssetCategory::Stock,
            date(2025, 10, 1),
            date(2025, 10, 7),
            date(2025, 11, 5),
        )
        .await;

    assert!(matches!(result, Err(Error::NoDataAvailable { .. })));
}

#[tokio::test]
async fn test_conflicting_provider_value_keeps_stored_record() {
    let store = MockStore::new();
    store.insert_record(record("VNM", AssetCategory::Stock, date(2025, 10, 1), dec!(60000)));
    let provider = Arc::new(MockProvider::new());
    provider.set_history(
        "VNM",
        vec![
            record("VNM", AssetCategory::Stock, date(2025, 10, 1), dec!(99999)),
            record("VNM", AssetCategory::Stock, date(2025, 10, 2), dec!(60100)),
        ],
    );

    // Refetch the whole range so the stored day comes back from the provider
    let coordinator = HistoricalCacheCoordinator::new(
        Arc::new(store.clone()),
        protected(provider.clone()),
        Arc::new(SingleFlight::new()),
        HistoricalConfig {
            small_gap_days: 0,
            large_gap_days: 1,
        },
    );

    let records = coordinator
        .get_range_as_of(
            "VNM",
            AssetCategory::Stock,
            date(2025, 10, 1),
            date(2025, 10, 2),
            date(2025, 11, 5),
        )
        .await
        .unwrap();

    assert_eq!(provider.history_calls()[0].1, date(2025, 10, 1));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].close, dec!(60000));
    assert_eq!(records[1].close, dec!(60100));
}

#[tokio::test]
async fn test_store_unavailable_returns_provider_records() {
    let store = MockStore::new();
    store.set_unavailable(true);
    let provider = Arc::new(MockProvider::new());
    provider.set_history(
        "VESAF",
        vec![
            record("VESAF", AssetCategory::Fund, date(2025, 10, 2), dec!(25100)),
            record("VESAF", AssetCategory::Fund, date(2025, 10, 1), dec!(25000)),
        ],
    );

    let records = coordinator(&store, &provider)
        .get_range_as_of(
            "VESAF",
            AssetCategory::Fund,
            date(2025, 10, 1),
            date(2025, 10, 2),
            date(2025, 11, 5),
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].date, date(2025, 10, 1));
}

#[tokio::test]
async fn test_concurrent_identical_requests_fetch_once() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());
    provider.set_delay(std::time::Duration::from_millis(20));
    provider.set_history(
        "VNM",
        vec![record("VNM", AssetCategory::Stock, date(2025, 10, 1), dec!(60000))],
    );
    let coordinator = Arc::new(coordinator(&store, &provider));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .get_range_as_of(
                    "VNM",
                    AssetCategory::Stock,
                    date(2025, 10, 1),
                    date(2025, 10, 2),
                    date(2025, 11, 5),
                )
                .await
        }));
    }
    for handle in handles {
        let records = handle.await.unwrap().unwrap();
        assert_eq!(records.len(), 1);
    }

    assert_eq!(provider.history_calls().len(), 1);
}

#[tokio::test]
async fn test_todays_bar_is_refetched_until_the_day_closes() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());
    let coordinator = coordinator(&store, &provider);
    let intraday = |close| vec![record("VNM", AssetCategory::Stock, date(2025, 11, 5), close)];

    provider.set_history("VNM", intraday(dec!(60000)));
    let morning = coordinator
        .get_range_as_of("VNM", AssetCategory::Stock, date(2025, 11, 5), date(2025, 11, 5), date(2025, 11, 5))
        .await
        .unwrap();
    assert_eq!(morning[0].close, dec!(60000));
    assert_eq!(store.record_count(), 0);

    provider.set_history("VNM", intraday(dec!(61500)));
    let afternoon = coordinator
        .get_range_as_of("VNM", AssetCategory::Stock, date(2025, 11, 5), date(2025, 11, 5), date(2025, 11, 5))
        .await
        .unwrap();
    assert_eq!(afternoon[0].close, dec!(61500));

    let next_day = coordinator
        .get_range_as_of("VNM", AssetCategory::Stock, date(2025, 11, 5), date(2025, 11, 5), date(2025, 11, 6))
        .await
        .unwrap();
    assert_eq!(next_day[0].close, dec!(61500));
    assert_eq!(provider.history_calls().len(), 3);
    assert_eq!(store.record_count(), 1);

    // Settled now, served locally
    coordinator
        .get_range_as_of("VNM", AssetCategory::Stock, date(2025, 11, 5), date(2025, 11, 5), date(2025, 11, 7))
        .await
        .unwrap();
    assert_eq!(provider.history_calls().len(), 3);
}

#[tokio::test]
async fn test_paged_history_keeps_failed_day_unknown() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());
    provider.set_history_span(1);
    provider.set_history(
        "VN.GOLD",
        vec![
            record("VN.GOLD", AssetCategory::Gold, date(2025, 11, 3), dec!(150000000)),
            record("VN.GOLD", AssetCategory::Gold, date(2025, 11, 5), dec!(151000000)),
        ],
    );
    provider.fail_on(date(2025, 11, 4));
    let coordinator = coordinator(&store, &provider);

    let first = coordinator
        .get_range_as_of("VN.GOLD", AssetCategory::Gold, date(2025, 11, 3), date(2025, 11, 5), date(2025, 11, 10))
        .await
        .unwrap();

    // One call per day, stopping at the failed one
    assert_eq!(
        provider.history_calls(),
        vec![
            ("VN.GOLD".to_string(), date(2025, 11, 3), date(2025, 11, 3)),
            ("VN.GOLD".to_string(), date(2025, 11, 4), date(2025, 11, 4)),
        ]
    );
    assert_eq!(first.len(), 1);
    assert_eq!(store.record_count(), 1);
    assert_eq!(store.marker_count(), 0);

    provider.recover(date(2025, 11, 4));
    let second = coordinator
        .get_range_as_of("VN.GOLD", AssetCategory::Gold, date(2025, 11, 3), date(2025, 11, 5), date(2025, 11, 10))
        .await
        .unwrap();

    assert_eq!(second.len(), 2);
    assert_eq!(provider.history_calls().len(), 4);
    assert_eq!(provider.history_calls()[2].1, date(2025, 11, 4));
    // The 4th was answered empty this time
    assert_eq!(store.marker_count(), 1);
}

#[tokio::test]
async fn test_closed_days_are_marked_without_calls() {
    let store = MockStore::new();
    let provider = Arc::new(MockProvider::new());
    provider.set_history_span(1);
    provider.close_weekends();
    provider.set_history(
        "VN.GOLD",
        vec![
            record("VN.GOLD", AssetCategory::Gold, date(2025, 10, 31), dec!(150000000)),
            record("VN.GOLD", AssetCategory::Gold, date(2025, 11, 3), dec!(151000000)),
        ],
    );

    let records = coordinator(&store, &provider)
        .get_range_as_of("VN.GOLD", AssetCategory::Gold, date(2025, 10, 31), date(2025, 11, 3), date(2025, 11, 10))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(
        provider.history_calls(),
        vec![
            ("VN.GOLD".to_string(), date(2025, 10, 31), date(2025, 10, 31)),
            ("VN.GOLD".to_string(), date(2025, 11, 3), date(2025, 11, 3)),
        ]
    );
    // Saturday and Sunday
    assert_eq!(store.marker_count(), 2);
}
