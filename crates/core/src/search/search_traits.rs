use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::search_model::SearchCacheEntry;
use crate::errors::Result;

/// Storage interface for cached search results, keyed by normalized query.
#[async_trait]
pub trait SearchCacheStore: Send + Sync {
    /// Returns `None` when no row exists or when `expires_at <= now`.
    async fn get_search(&self, query: &str, now: DateTime<Utc>) -> Result<Option<SearchCacheEntry>>;

    async fn set_search(&self, entry: SearchCacheEntry) -> Result<()>;

    async fn purge_expired_searches(&self, now: DateTime<Utc>) -> Result<usize>;

    async fn count_valid_searches(&self, now: DateTime<Utc>) -> Result<u64>;
}
