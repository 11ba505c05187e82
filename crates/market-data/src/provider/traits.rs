//! Upstream provider trait definition.
//!
//! This module defines the `UpstreamProvider` trait that the caching layer
//! consumes. The provider is slow, rate-limited and sometimes unavailable;
//! everything above it assumes so.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::MarketDataError;
use crate::models::{AssetCategory, AssetSummary, HistoricalRecord, QuoteSnapshot};

use super::logged::CallStats;

/// Trait for upstream market data providers.
///
/// Every method may fail with [`MarketDataError::Throttled`] when the provider
/// rejects calls for cadence reasons. Callers gate calls through the
/// rate-limit protector and feed throttle errors back into it.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use vnmarket_market_data::provider::UpstreamProvider;
///
/// struct StaticProvider;
///
/// #[async_trait]
/// impl UpstreamProvider for StaticProvider {
///     fn id(&self) -> &'static str {
///         "STATIC"
///     }
///
///     // ... implement fetch methods
/// }
/// ```
#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    /// Unique identifier used in logs and stats (e.g., "VN_MARKET").
    fn id(&self) -> &'static str;

    /// Call counters, when the provider is wrapped in call-logging middleware.
    fn call_stats(&self) -> Option<CallStats> {
        None
    }

    /// Longest range, in days, one `fetch_history` call should cover.
    ///
    /// `None` means any range is fine. Sources that answer one date per
    /// request return `Some(1)` so callers can gate and persist each day.
    fn max_history_span(&self, _category: AssetCategory) -> Option<u32> {
        None
    }

    /// Whether the source publishes a bar for `date` at all.
    ///
    /// Dates it never publishes are absent without asking.
    fn publishes_on(&self, _category: AssetCategory, _date: NaiveDate) -> bool {
        true
    }

    /// Fetch the latest quote.
    ///
    /// `Ok(None)` means the provider answered but has no usable quote
    /// (holiday, suspended symbol).
    async fn fetch_quote(
        &self,
        symbol: &str,
        category: AssetCategory,
    ) -> Result<Option<QuoteSnapshot>, MarketDataError>;

    /// Fetch daily history for the inclusive range `[start, end]`.
    ///
    /// Records should be ordered by date ascending. An empty vector is a
    /// valid answer for a range with no trading days.
    async fn fetch_history(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>, MarketDataError>;

    /// Search for assets matching the query across all categories.
    async fn search_assets(&self, query: &str) -> Result<Vec<AssetSummary>, MarketDataError>;

    /// List every asset the provider knows in a category.
    async fn list_assets(
        &self,
        category: AssetCategory,
    ) -> Result<Vec<AssetSummary>, MarketDataError>;
}
