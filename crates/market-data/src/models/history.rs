use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::category::AssetCategory;

/// One day of history for a `(symbol, category)` key.
///
/// Historical facts never change once recorded; the storage layer rejects
/// any attempt to overwrite a stored date with a different value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub symbol: String,
    pub category: AssetCategory,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub adjclose: Decimal,
    pub volume: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nav: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_price: Option<Decimal>,
}

impl HistoricalRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn ohlcv(
        symbol: impl Into<String>,
        category: AssetCategory,
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            category,
            date,
            open,
            high,
            low,
            close,
            adjclose: close,
            volume,
            nav: None,
            buy_price: None,
            sell_price: None,
        }
    }

    /// Record for assets that publish a single price per day (NAV, gold).
    pub fn flat(
        symbol: impl Into<String>,
        category: AssetCategory,
        date: NaiveDate,
        price: Decimal,
    ) -> Self {
        Self::ohlcv(symbol, category, date, price, price, price, price, Decimal::ZERO)
    }

    pub fn with_nav(mut self, nav: Decimal) -> Self {
        self.nav = Some(nav);
        self
    }

    pub fn with_gold_prices(mut self, buy: Decimal, sell: Decimal) -> Self {
        self.buy_price = Some(buy);
        self.sell_price = Some(sell);
        self
    }
}
