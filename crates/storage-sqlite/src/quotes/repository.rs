use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::warn;

use vnmarket_core::quotes::{QuoteCacheEntry, QuoteCacheStore};
use vnmarket_core::Result;
use vnmarket_market_data::AssetCategory;

use super::model::QuoteDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::quotes;
use crate::utils::format_timestamp;

pub struct QuoteCacheRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl QuoteCacheRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl QuoteCacheStore for QuoteCacheRepository {
    async fn get_quote(
        &self,
        symbol: &str,
        category: AssetCategory,
        now: DateTime<Utc>,
    ) -> Result<Option<QuoteCacheEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let row = quotes::table
            .filter(quotes::symbol.eq(symbol))
            .filter(quotes::asset_type.eq(category.as_str()))
            .filter(quotes::expires_at.gt(format_timestamp(now)))
            .select(QuoteDB::as_select())
            .first::<QuoteDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;

        // An undecodable payload is treated as a miss; the next write replaces it.
        Ok(row.and_then(|row| {
            QuoteCacheEntry::try_from(row)
                .map_err(|e| warn!("Ignoring unreadable cached quote for {}: {}", symbol, e))
                .ok()
        }))
    }

    async fn set_quote(&self, entry: QuoteCacheEntry) -> Result<()> {
        let row = QuoteDB::try_from(&entry)?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::replace_into(quotes::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn purge_expired_quotes(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = format_timestamp(now);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                Ok(diesel::delete(quotes::table.filter(quotes::expires_at.le(cutoff)))
                    .execute(conn)
                    .map_err(StorageError::from)?)
            })
            .await
    }

    async fn count_valid_quotes(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut conn = get_connection(&self.pool)?;
        let count: i64 = quotes::table
            .filter(quotes::expires_at.gt(format_timestamp(now)))
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count as u64)
    }
}
