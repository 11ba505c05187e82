use async_trait::async_trait;

use vnmarket_market_data::AssetCategory;

use super::assets_model::AssetRecord;
use crate::errors::Result;

/// Storage interface for the asset registry.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn get_asset(&self, symbol: &str) -> Result<Option<AssetRecord>>;

    /// Insert or update by symbol. `created_at` of an existing row is kept.
    async fn upsert_asset(&self, asset: AssetRecord) -> Result<AssetRecord>;

    /// Batch form of [`upsert_asset`](Self::upsert_asset). Returns the number of rows written.
    async fn upsert_assets(&self, assets: Vec<AssetRecord>) -> Result<usize>;

    /// Case-insensitive match on symbol or name.
    async fn search_assets(&self, query: &str, limit: usize) -> Result<Vec<AssetRecord>>;

    async fn count_assets(&self) -> Result<u64>;

    async fn count_assets_by_category(&self) -> Result<Vec<(AssetCategory, u64)>>;
}
