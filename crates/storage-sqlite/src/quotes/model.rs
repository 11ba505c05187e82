use diesel::prelude::*;

use vnmarket_core::errors::{Error, Result};
use vnmarket_core::quotes::QuoteCacheEntry;
use vnmarket_market_data::QuoteSnapshot;

use crate::utils::{format_timestamp, parse_timestamp};

/// One cached quote. `quote_data` is the JSON-encoded snapshot and
/// `created_at` is when it was cached.
#[derive(Queryable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::quotes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QuoteDB {
    pub symbol: String,
    pub asset_type: String,
    pub quote_data: String,
    pub expires_at: String,
    pub created_at: String,
}

impl TryFrom<&QuoteCacheEntry> for QuoteDB {
    type Error = Error;

    fn try_from(entry: &QuoteCacheEntry) -> Result<Self> {
        Ok(Self {
            symbol: entry.symbol.clone(),
            asset_type: entry.category.as_str().to_string(),
            quote_data: serde_json::to_string(&entry.quote)?,
            expires_at: format_timestamp(entry.expires_at),
            created_at: format_timestamp(entry.cached_at),
        })
    }
}

impl TryFrom<QuoteDB> for QuoteCacheEntry {
    type Error = Error;

    fn try_from(db: QuoteDB) -> Result<Self> {
        let quote: QuoteSnapshot = serde_json::from_str(&db.quote_data)?;
        Ok(QuoteCacheEntry {
            symbol: db.symbol,
            category: db.asset_type.parse().map_err(Error::Validation)?,
            quote,
            cached_at: parse_timestamp(&db.created_at)?,
            expires_at: parse_timestamp(&db.expires_at)?,
        })
    }
}
