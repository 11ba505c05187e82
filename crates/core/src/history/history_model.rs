use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use vnmarket_market_data::AssetCategory;

/// What the store knows about one calendar date of one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateCoverage {
    /// A real record is stored.
    Present,
    /// The provider was asked and had nothing (weekend, holiday). Stored as
    /// a marker row; never returned as a record.
    ConfirmedAbsent,
    /// Never fetched.
    Unknown,
}

impl DateCoverage {
    pub fn is_known(&self) -> bool {
        !matches!(self, DateCoverage::Unknown)
    }
}

/// Stored history for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryCategoryStats {
    pub category: AssetCategory,
    pub symbols: u64,
    pub records: u64,
    pub markers: u64,
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
}
