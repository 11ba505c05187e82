//! Database model for historical records.

use diesel::prelude::*;
use rust_decimal::Decimal;

use vnmarket_core::errors::{Error, Result};
use vnmarket_market_data::{AssetCategory, HistoricalRecord};

use crate::utils::{decimal_to_real, format_date, parse_date, real_to_decimal, same_price};

/// `data_json` payload of a marker row.
pub const MARKER_JSON: &str = "{}";

#[derive(Queryable, Insertable, Selectable, AsChangeset, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::historical_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct HistoricalRecordDB {
    pub symbol: String,
    pub asset_type: String,
    pub date: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adjclose: Option<f64>,
    pub volume: Option<f64>,
    pub nav: Option<f64>,
    pub buy_price: Option<f64>,
    pub sell_price: Option<f64>,
    pub data_json: String,
    pub created_at: String,
    pub updated_at: String,
}

impl HistoricalRecordDB {
    /// Row for a real record, stored under the given key.
    pub fn from_record(
        symbol: &str,
        category: AssetCategory,
        record: &HistoricalRecord,
        now: &str,
    ) -> Result<Self> {
        Ok(Self {
            symbol: symbol.to_string(),
            asset_type: category.as_str().to_string(),
            date: format_date(record.date),
            open: Some(decimal_to_real(record.open)),
            high: Some(decimal_to_real(record.high)),
            low: Some(decimal_to_real(record.low)),
            close: Some(decimal_to_real(record.close)),
            adjclose: Some(decimal_to_real(record.adjclose)),
            volume: Some(decimal_to_real(record.volume)),
            nav: record.nav.map(decimal_to_real),
            buy_price: record.buy_price.map(decimal_to_real),
            sell_price: record.sell_price.map(decimal_to_real),
            data_json: serde_json::to_string(record)?,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        })
    }

    /// Marker row: every price column NULL.
    pub fn marker(symbol: &str, category: AssetCategory, date: &str, now: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            asset_type: category.as_str().to_string(),
            date: date.to_string(),
            open: None,
            high: None,
            low: None,
            close: None,
            adjclose: None,
            volume: None,
            nav: None,
            buy_price: None,
            sell_price: None,
            data_json: MARKER_JSON.to_string(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    pub fn is_marker(&self) -> bool {
        self.close.is_none()
    }

    /// Names of the price columns whose values differ, with both values.
    pub fn differences(&self, other: &Self) -> Vec<String> {
        [
            ("open", self.open, other.open),
            ("high", self.high, other.high),
            ("low", self.low, other.low),
            ("close", self.close, other.close),
            ("adjclose", self.adjclose, other.adjclose),
            ("volume", self.volume, other.volume),
            ("nav", self.nav, other.nav),
            ("buy_price", self.buy_price, other.buy_price),
            ("sell_price", self.sell_price, other.sell_price),
        ]
        .into_iter()
        .filter(|(_, stored, incoming)| !same_price(*stored, *incoming))
        .map(|(column, stored, incoming)| format!("{} stored={:?} incoming={:?}", column, stored, incoming))
        .collect()
    }
}

impl TryFrom<HistoricalRecordDB> for HistoricalRecord {
    type Error = Error;

    fn try_from(db: HistoricalRecordDB) -> Result<Self> {
        let close = match db.close {
            Some(close) => real_to_decimal(close)?,
            None => {
                return Err(Error::Validation(format!(
                    "{} {} is an absence marker",
                    db.symbol, db.date
                )))
            }
        };
        let price = |value: Option<f64>| -> Result<Option<Decimal>> {
            value.map(real_to_decimal).transpose()
        };

        Ok(HistoricalRecord {
            symbol: db.symbol,
            category: db.asset_type.parse().map_err(Error::Validation)?,
            date: parse_date(&db.date)?,
            open: price(db.open)?.unwrap_or(close),
            high: price(db.high)?.unwrap_or(close),
            low: price(db.low)?.unwrap_or(close),
            close,
            adjclose: price(db.adjclose)?.unwrap_or(close),
            volume: price(db.volume)?.unwrap_or_default(),
            nav: price(db.nav)?,
            buy_price: price(db.buy_price)?,
            sell_price: price(db.sell_price)?,
        })
    }
}

/// Row shape of the per-category stats query.
#[derive(QueryableByName, Debug)]
pub(crate) struct HistoryStatsRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub asset_type: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub symbols: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub records: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub markers: i64,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub earliest: Option<String>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub latest: Option<String>,
}
