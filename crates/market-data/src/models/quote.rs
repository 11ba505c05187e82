use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::category::AssetCategory;
use super::history::HistoricalRecord;

/// Default quote currency for every Vietnamese market asset.
pub const DEFAULT_CURRENCY: &str = "VND";

/// Point-in-time quote as returned by a provider or rebuilt from history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub symbol: String,
    pub category: AssetCategory,
    /// Trading date the prices belong to
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,

    /// Net asset value per unit (funds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nav: Option<Decimal>,

    /// Dealer buy price (gold)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_price: Option<Decimal>,

    /// Dealer sell price (gold)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_price: Option<Decimal>,

    pub currency: String,

    /// Source of the quote (VCI, FMARKET, SJC, CACHE, ...)
    pub source: String,
}

impl QuoteSnapshot {
    /// Create a snapshot whose OHLC collapse onto a single price.
    pub fn flat(
        symbol: impl Into<String>,
        category: AssetCategory,
        date: NaiveDate,
        price: Decimal,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            category,
            date,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ZERO,
            nav: None,
            buy_price: None,
            sell_price: None,
            currency: DEFAULT_CURRENCY.to_string(),
            source: source.into(),
        }
    }

    /// A snapshot without a positive close carries no usable price.
    pub fn has_price(&self) -> bool {
        self.close > Decimal::ZERO
    }

    /// Rebuild a snapshot from a stored historical record.
    pub fn from_record(record: &HistoricalRecord, source: impl Into<String>) -> Self {
        Self {
            symbol: record.symbol.clone(),
            category: record.category,
            date: record.date,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
            nav: record.nav,
            buy_price: record.buy_price,
            sell_price: record.sell_price,
            currency: DEFAULT_CURRENCY.to_string(),
            source: source.into(),
        }
    }
}
