//! Persistent quote cache storage trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vnmarket_market_data::AssetCategory;

use super::model::QuoteCacheEntry;
use crate::errors::Result;

#[async_trait]
pub trait QuoteCacheStore: Send + Sync {
    /// Returns `None` when no row exists or when `expires_at <= now`.
    async fn get_quote(
        &self,
        symbol: &str,
        category: AssetCategory,
        now: DateTime<Utc>,
    ) -> Result<Option<QuoteCacheEntry>>;

    /// Replace the row for `(symbol, category)` atomically.
    async fn set_quote(&self, entry: QuoteCacheEntry) -> Result<()>;

    /// Delete expired rows, returning how many were removed.
    async fn purge_expired_quotes(&self, now: DateTime<Utc>) -> Result<usize>;

    async fn count_valid_quotes(&self, now: DateTime<Utc>) -> Result<u64>;
}
