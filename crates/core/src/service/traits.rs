use async_trait::async_trait;
use chrono::NaiveDate;

use vnmarket_market_data::{AssetSummary, HistoricalRecord};

use super::model::{CleanupReport, RefreshReport, ServiceStats};
use crate::errors::Result;
use crate::history::BackfillReport;
use crate::quotes::CachedQuote;
use crate::seeder::SeedReport;

/// Operations the cache layer exposes to its hosts.
#[async_trait]
pub trait MarketCacheServiceTrait: Send + Sync {
    /// Latest quote for a symbol, from the cheapest tier that has one.
    async fn get_quote(&self, symbol: &str) -> Result<CachedQuote>;

    /// Daily history for `[start, end]`, ascending by date.
    async fn get_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>>;

    async fn search(&self, query: &str) -> Result<Vec<AssetSummary>>;

    async fn stats(&self) -> Result<ServiceStats>;

    /// Drop expired accelerator entries and purge expired store rows.
    async fn cleanup(&self) -> Result<CleanupReport>;

    async fn seed(&self, force_refresh: bool) -> Result<SeedReport>;

    /// Re-fetch quotes for `symbols` whose cached quote has expired.
    async fn refresh_quotes(&self, symbols: &[String]) -> Result<RefreshReport>;

    /// Run one backfill cycle for every configured symbol.
    async fn backfill_history(&self) -> Result<Vec<BackfillReport>>;
}
