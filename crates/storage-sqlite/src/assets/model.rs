//! Database model for assets.

use diesel::prelude::*;

use vnmarket_core::assets::AssetRecord;
use vnmarket_core::errors::{Error, Result};
use vnmarket_market_data::AssetCategory;

use crate::utils::{format_timestamp, parse_timestamp};

#[derive(Queryable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::assets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AssetDB {
    pub symbol: String,
    pub name: String,
    pub asset_type: String,
    pub asset_class: String,
    pub asset_sub_class: String,
    pub exchange: String,
    pub currency: String,
    pub data_source: String,
    pub metadata: Option<String>, // JSON text
    pub created_at: String,
    pub updated_at: String,
}

/// Columns rewritten on re-discovery. `created_at` is not among them.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::assets)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct AssetUpdateDB<'a> {
    pub name: &'a str,
    pub asset_type: &'a str,
    pub asset_class: &'a str,
    pub asset_sub_class: &'a str,
    pub exchange: &'a str,
    pub currency: &'a str,
    pub data_source: &'a str,
    pub metadata: Option<&'a str>,
    pub updated_at: &'a str,
}

impl<'a> From<&'a AssetDB> for AssetUpdateDB<'a> {
    fn from(db: &'a AssetDB) -> Self {
        Self {
            name: &db.name,
            asset_type: &db.asset_type,
            asset_class: &db.asset_class,
            asset_sub_class: &db.asset_sub_class,
            exchange: &db.exchange,
            currency: &db.currency,
            data_source: &db.data_source,
            metadata: db.metadata.as_deref(),
            updated_at: &db.updated_at,
        }
    }
}

impl From<&AssetRecord> for AssetDB {
    fn from(record: &AssetRecord) -> Self {
        Self {
            symbol: record.symbol.clone(),
            name: record.name.clone(),
            asset_type: record.category.as_str().to_string(),
            asset_class: record.asset_class.clone(),
            asset_sub_class: record.asset_sub_class.clone(),
            exchange: record.exchange.clone(),
            currency: record.currency.clone(),
            data_source: record.data_source.clone(),
            metadata: record.metadata.as_ref().map(|m| m.to_string()),
            created_at: format_timestamp(record.created_at),
            updated_at: format_timestamp(record.updated_at),
        }
    }
}

impl TryFrom<AssetDB> for AssetRecord {
    type Error = Error;

    fn try_from(db: AssetDB) -> Result<Self> {
        let category: AssetCategory = db.asset_type.parse().map_err(Error::Validation)?;
        let metadata = match db.metadata.as_deref() {
            Some(raw) if !raw.is_empty() => Some(serde_json::from_str(raw)?),
            _ => None,
        };

        Ok(AssetRecord {
            symbol: db.symbol,
            name: db.name,
            category,
            asset_class: db.asset_class,
            asset_sub_class: db.asset_sub_class,
            exchange: db.exchange,
            currency: db.currency,
            data_source: db.data_source,
            metadata,
            created_at: parse_timestamp(&db.created_at)?,
            updated_at: parse_timestamp(&db.updated_at)?,
        })
    }
}
