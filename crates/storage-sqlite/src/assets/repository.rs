use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::warn;

use vnmarket_core::assets::{AssetRecord, AssetStore};
use vnmarket_core::Result;
use vnmarket_market_data::AssetCategory;

use super::model::{AssetDB, AssetUpdateDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::assets;
use crate::utils::format_timestamp;

pub struct AssetRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl AssetRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    fn upsert_row(conn: &mut SqliteConnection, row: &AssetDB) -> Result<usize> {
        Ok(diesel::insert_into(assets::table)
            .values(row)
            .on_conflict(assets::symbol)
            .do_update()
            .set(AssetUpdateDB::from(row))
            .execute(conn)
            .map_err(StorageError::from)?)
    }

    /// Rows that fail to decode are logged and skipped.
    fn decode(rows: Vec<AssetDB>) -> Vec<AssetRecord> {
        rows.into_iter()
            .filter_map(|row| {
                let symbol = row.symbol.clone();
                AssetRecord::try_from(row)
                    .map_err(|e| warn!("Skipping unreadable asset row {}: {}", symbol, e))
                    .ok()
            })
            .collect()
    }
}

#[async_trait]
impl AssetStore for AssetRepository {
    async fn get_asset(&self, symbol: &str) -> Result<Option<AssetRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let row = assets::table
            .find(symbol.to_uppercase())
            .select(AssetDB::as_select())
            .first::<AssetDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(AssetRecord::try_from).transpose()
    }

    async fn upsert_asset(&self, asset: AssetRecord) -> Result<AssetRecord> {
        let mut row = AssetDB::from(&asset);
        row.updated_at = format_timestamp(Utc::now());
        let key = row.symbol.clone();

        let stored = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<AssetDB> {
                Self::upsert_row(conn, &row)?;
                Ok(assets::table
                    .find(key)
                    .select(AssetDB::as_select())
                    .first::<AssetDB>(conn)
                    .map_err(StorageError::from)?)
            })
            .await?;
        AssetRecord::try_from(stored)
    }

    async fn upsert_assets(&self, records: Vec<AssetRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let now = format_timestamp(Utc::now());
        let rows: Vec<AssetDB> = records
            .iter()
            .map(|r| {
                let mut row = AssetDB::from(r);
                row.updated_at = now.clone();
                row
            })
            .collect();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut written = 0;
                for row in &rows {
                    written += Self::upsert_row(conn, row)?;
                }
                Ok(written)
            })
            .await
    }

    async fn search_assets(&self, query: &str, limit: usize) -> Result<Vec<AssetRecord>> {
        let needle = query.trim();
        if needle.is_empty() {
            return Ok(vec![]);
        }
        // LIKE is case-insensitive for ASCII in SQLite
        let pattern = format!("%{}%", needle.replace('%', "").replace('_', ""));

        let mut conn = get_connection(&self.pool)?;
        let rows = assets::table
            .filter(assets::symbol.like(&pattern).or(assets::name.like(&pattern)))
            .order(assets::symbol.asc())
            .limit(limit as i64)
            .select(AssetDB::as_select())
            .load::<AssetDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(Self::decode(rows))
    }

    async fn count_assets(&self) -> Result<u64> {
        let mut conn = get_connection(&self.pool)?;
        let count: i64 = assets::table
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count as u64)
    }

    async fn count_assets_by_category(&self) -> Result<Vec<(AssetCategory, u64)>> {
        let mut conn = get_connection(&self.pool)?;
        let rows: Vec<(String, i64)> = assets::table
            .group_by(assets::asset_type)
            .select((assets::asset_type, count_star()))
            .order(assets::asset_type.asc())
            .load(&mut conn)
            .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .filter_map(|(raw, count)| {
                raw.parse::<AssetCategory>()
                    .map(|category| (category, count as u64))
                    .ok()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup;
    use vnmarket_market_data::AssetSummary;

    fn record(symbol: &str, name: &str, category: AssetCategory) -> AssetRecord {
        AssetRecord::from_summary(&AssetSummary::new(symbol, name, category, "HOSE"), Utc::now())
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at() {
        let db = setup();
        let repo = AssetRepository::new(db.pool.clone(), db.writer.clone());

        let first = repo
            .upsert_asset(record("VNM", "Vinamilk", AssetCategory::Stock))
            .await
            .unwrap();

        let mut renamed = record("VNM", "Vinamilk JSC", AssetCategory::Stock);
        renamed.created_at = Utc::now() + chrono::Duration::days(1);
        let second = repo
            .upsert_asset(renamed.with_metadata(serde_json::json!({"board": "HOSE"})))
            .await
            .unwrap();

        assert_eq!(second.name, "Vinamilk JSC");
        assert_eq!(second.created_at.timestamp_millis(), first.created_at.timestamp_millis());
        assert_eq!(second.metadata, Some(serde_json::json!({"board": "HOSE"})));
        assert_eq!(repo.count_assets().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_matches_symbol_or_name() {
        let db = setup();
        let repo = AssetRepository::new(db.pool.clone(), db.writer.clone());
        repo.upsert_assets(vec![
            record("VNM", "Vinamilk", AssetCategory::Stock),
            record("FPT", "FPT Corp", AssetCategory::Stock),
            record("VESAF", "VinaCapital ESAF", AssetCategory::Fund),
        ])
        .await
        .unwrap();

        let hits = repo.search_assets("vina", 10).await.unwrap();
        let symbols: Vec<_> = hits.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["VESAF", "VNM"]);

        let hits = repo.search_assets("fpt", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(repo.search_assets("  ", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counts_by_category() {
        let db = setup();
        let repo = AssetRepository::new(db.pool.clone(), db.writer.clone());
        repo.upsert_assets(vec![
            record("VNM", "Vinamilk", AssetCategory::Stock),
            record("FPT", "FPT Corp", AssetCategory::Stock),
            record("VESAF", "VinaCapital ESAF", AssetCategory::Fund),
        ])
        .await
        .unwrap();

        let counts = repo.count_assets_by_category().await.unwrap();
        assert_eq!(
            counts,
            vec![(AssetCategory::Fund, 1), (AssetCategory::Stock, 2)]
        );
        assert!(repo.get_asset("vesaf").await.unwrap().is_some());
        assert!(repo.get_asset("XYZ").await.unwrap().is_none());
    }
}
