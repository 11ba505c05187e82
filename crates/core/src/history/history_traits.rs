use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use vnmarket_market_data::{AssetCategory, HistoricalRecord};

use super::history_model::{DateCoverage, HistoryCategoryStats};
use crate::errors::Result;

/// Storage interface for immutable daily history.
///
/// # Invariants
///
/// - A stored record never changes. Re-inserting an identical record is a
///   no-op; a differing one is a `DataIntegrityConflict` and the stored row
///   wins.
/// - Marker rows (`ConfirmedAbsent`) are invisible to `get_records` and
///   `latest_record_within`. A real record may replace a marker.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Records in `[start, end]`, ascending by date. Markers excluded.
    async fn get_records(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>>;

    /// Gap-filling upsert. Non-conflicting records are written even when
    /// others conflict; the call then returns `DataIntegrityConflict`.
    ///
    /// Returns the number of rows inserted (or markers replaced).
    async fn upsert_records(
        &self,
        symbol: &str,
        category: AssetCategory,
        records: &[HistoricalRecord],
    ) -> Result<usize>;

    /// Coverage of every date in `[start, end]`.
    async fn date_coverage(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, DateCoverage>>;

    /// Record that the provider has nothing for `dates`. Only dates without
    /// any row get a marker. Returns the number of markers written.
    async fn mark_absent(
        &self,
        symbol: &str,
        category: AssetCategory,
        dates: &[NaiveDate],
    ) -> Result<usize>;

    /// Most recent real record in `[lookback_start, end]`.
    async fn latest_record_within(
        &self,
        symbol: &str,
        category: AssetCategory,
        lookback_start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<HistoricalRecord>>;

    async fn history_stats(&self) -> Result<Vec<HistoryCategoryStats>>;
}
