use diesel::prelude::*;

use vnmarket_core::errors::{Error, Result};
use vnmarket_core::search::SearchCacheEntry;

use crate::utils::{format_timestamp, parse_timestamp};

#[derive(Queryable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::search_results)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SearchResultDB {
    pub query: String,
    pub results: String, // JSON array of AssetSummary
    pub expires_at: String,
    pub created_at: String,
}

impl TryFrom<&SearchCacheEntry> for SearchResultDB {
    type Error = Error;

    fn try_from(entry: &SearchCacheEntry) -> Result<Self> {
        Ok(Self {
            query: entry.query.clone(),
            results: serde_json::to_string(&entry.results)?,
            expires_at: format_timestamp(entry.expires_at),
            created_at: format_timestamp(entry.cached_at),
        })
    }
}

impl TryFrom<SearchResultDB> for SearchCacheEntry {
    type Error = Error;

    fn try_from(db: SearchResultDB) -> Result<Self> {
        Ok(SearchCacheEntry {
            query: db.query,
            results: serde_json::from_str(&db.results)?,
            cached_at: parse_timestamp(&db.created_at)?,
            expires_at: parse_timestamp(&db.expires_at)?,
        })
    }
}
