//! The cache service over a real SQLite store: history written by one
//! instance is served by the next without touching the provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal_macros::dec;

use vnmarket_core::{CacheConfig, MarketCacheService, MarketCacheServiceTrait};
use vnmarket_market_data::{
    AssetCategory, AssetSummary, HistoricalRecord, MarketDataError, QuoteSnapshot,
    UpstreamProvider,
};
use vnmarket_storage_sqlite::{create_pool, init, run_migrations, spawn_writer, store_handles};

#[derive(Default)]
struct WeekdayProvider {
    history_calls: AtomicUsize,
}

#[async_trait]
impl UpstreamProvider for WeekdayProvider {
    fn id(&self) -> &'static str {
        "WEEKDAY"
    }

    async fn fetch_quote(
        &self,
        _symbol: &str,
        _category: AssetCategory,
    ) -> Result<Option<QuoteSnapshot>, MarketDataError> {
        Ok(None)
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>, MarketDataError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        Ok(start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .map(|d| HistoricalRecord::flat(symbol, category, d, dec!(61000)))
            .collect())
    }

    async fn search_assets(&self, _query: &str) -> Result<Vec<AssetSummary>, MarketDataError> {
        Ok(vec![])
    }

    async fn list_assets(
        &self,
        _category: AssetCategory,
    ) -> Result<Vec<AssetSummary>, MarketDataError> {
        Ok(vec![])
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_history_survives_restart_without_refetch() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = init(&dir.path().join("cache.db").to_string_lossy()).unwrap();
    let pool = create_pool(&db_path).unwrap();
    run_migrations(&pool).unwrap();
    let writer = spawn_writer((*pool).clone());

    let mut config = CacheConfig::default();
    config.rate_limit.slot_wait_timeout_secs = 0;
    let provider = Arc::new(WeekdayProvider::default());

    let first = MarketCacheService::new(
        config.clone(),
        store_handles(pool.clone(), writer.clone()),
        provider.clone(),
    )
    .unwrap();
    // 2025-10-01 is a Wednesday; 10 days hold 2 weekend days
    let records = first
        .get_history("VNM", date(2025, 10, 1), date(2025, 10, 10))
        .await
        .unwrap();
    assert_eq!(records.len(), 8);
    assert_eq!(provider.history_calls.load(Ordering::SeqCst), 1);
    first.shutdown();

    let restarted =
        MarketCacheService::new(config, store_handles(pool, writer), provider.clone()).unwrap();
    let again = restarted
        .get_history("VNM", date(2025, 10, 1), date(2025, 10, 10))
        .await
        .unwrap();
    assert_eq!(again, records);
    assert_eq!(provider.history_calls.load(Ordering::SeqCst), 1);

    let stats = restarted.stats().await.unwrap();
    let store = stats.store.unwrap();
    let history = &store.history;
    assert_eq!(history[0].records, 8);
    assert_eq!(history[0].markers, 2);
}
