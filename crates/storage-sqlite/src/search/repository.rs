use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::warn;

use vnmarket_core::search::{normalize_query, SearchCacheEntry, SearchCacheStore};
use vnmarket_core::Result;

use super::model::SearchResultDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::search_results;
use crate::utils::format_timestamp;

pub struct SearchCacheRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SearchCacheRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SearchCacheStore for SearchCacheRepository {
    async fn get_search(&self, query: &str, now: DateTime<Utc>) -> Result<Option<SearchCacheEntry>> {
        let key = normalize_query(query);
        let mut conn = get_connection(&self.pool)?;
        let row = search_results::table
            .find(&key)
            .filter(search_results::expires_at.gt(format_timestamp(now)))
            .select(SearchResultDB::as_select())
            .first::<SearchResultDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;

        Ok(row.and_then(|row| {
            SearchCacheEntry::try_from(row)
                .map_err(|e| warn!("Ignoring unreadable search cache row {}: {}", key, e))
                .ok()
        }))
    }

    async fn set_search(&self, entry: SearchCacheEntry) -> Result<()> {
        let row = SearchResultDB::try_from(&entry)?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::replace_into(search_results::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn purge_expired_searches(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = format_timestamp(now);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                Ok(
                    diesel::delete(search_results::table.filter(search_results::expires_at.le(cutoff)))
                        .execute(conn)
                        .map_err(StorageError::from)?,
                )
            })
            .await
    }

    async fn count_valid_searches(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut conn = get_connection(&self.pool)?;
        let count: i64 = search_results::table
            .filter(search_results::expires_at.gt(format_timestamp(now)))
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup;
    use chrono::Duration;
    use vnmarket_market_data::{AssetCategory, AssetSummary};

    #[tokio::test]
    async fn test_search_is_keyed_by_normalized_query() {
        let db = setup();
        let repo = SearchCacheRepository::new(db.pool.clone(), db.writer.clone());
        let now = Utc::now();
        let results = vec![AssetSummary::new("VNM", "Vinamilk", AssetCategory::Stock, "HOSE")];
        repo.set_search(SearchCacheEntry::new("vina", results.clone(), now, now + Duration::hours(1)))
            .await
            .unwrap();

        let hit = repo.get_search("  VINA ", now).await.unwrap().unwrap();
        assert_eq!(hit.results, results);
        assert_eq!(repo.count_valid_searches(now).await.unwrap(), 1);

        let later = now + Duration::hours(1);
        assert!(repo.get_search("vina", later).await.unwrap().is_none());
        assert_eq!(repo.purge_expired_searches(later).await.unwrap(), 1);
        assert_eq!(repo.count_valid_searches(now).await.unwrap(), 0);
    }
}
