//! Wire payloads of the VCI, FMarket and SJC endpoints.

use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Convert a provider float to `Decimal`, treating non-finite values as zero.
pub(crate) fn decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

// VCI

/// Entry of the VCI symbol listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VciSymbol {
    pub symbol: String,
    /// "HSX", "HNX", "UPCOM" or "DELISTED"
    pub board: String,
    /// "STOCK", "ETF", "BOND", ...
    #[serde(rename = "type")]
    pub asset_type: String,
    #[serde(default)]
    pub organ_name: Option<String>,
    #[serde(default)]
    pub en_organ_name: Option<String>,
}

impl VciSymbol {
    pub fn exchange(&self) -> &str {
        match self.board.as_str() {
            "HSX" => "HOSE",
            other => other,
        }
    }

    pub fn is_listed_stock(&self) -> bool {
        self.asset_type == "STOCK" && self.board != "DELISTED"
    }

    pub fn display_name(&self) -> &str {
        self.organ_name
            .as_deref()
            .or(self.en_organ_name.as_deref())
            .unwrap_or(&self.symbol)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OhlcRequest {
    pub time_frame: &'static str,
    pub symbols: Vec<String>,
    pub to: i64,
    pub count_back: i64,
}

/// Column-oriented OHLC series. Prices are in thousands of VND.
#[derive(Debug, Clone, Deserialize)]
pub struct VciOhlcSeries {
    #[serde(deserialize_with = "lenient_timestamps")]
    pub t: Vec<i64>,
    pub o: Vec<f64>,
    pub h: Vec<f64>,
    pub l: Vec<f64>,
    pub c: Vec<f64>,
    pub v: Vec<f64>,
}

impl VciOhlcSeries {
    pub fn len(&self) -> usize {
        [self.t.len(), self.o.len(), self.h.len(), self.l.len(), self.c.len(), self.v.len()]
            .into_iter()
            .min()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Number(i64),
    Text(String),
}

/// VCI sends timestamps either as numbers or as numeric strings.
fn lenient_timestamps<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Timestamp>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|ts| match ts {
            Timestamp::Number(n) => Ok(n),
            Timestamp::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid timestamp: {}", s))),
        })
        .collect()
}

// FMarket

#[derive(Debug, Clone, Deserialize)]
pub struct FMarketEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundPage {
    pub rows: Vec<FundInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundInfo {
    pub id: i64,
    pub short_name: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub nav: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundFilterRequest {
    pub types: Vec<&'static str>,
    pub issuer_ids: Vec<i64>,
    pub sort_order: &'static str,
    pub sort_field: &'static str,
    pub page: u32,
    pub page_size: u32,
    pub is_ipo: bool,
    pub fund_asset_types: Vec<String>,
    pub bond_remain_periods: Vec<String>,
    pub search_field: String,
    pub is_buy_by_reward: bool,
    pub third_app_ids: Vec<i64>,
}

impl FundFilterRequest {
    pub fn search(field: impl Into<String>) -> Self {
        Self {
            types: vec!["NEW_FUND", "TRADING_FUND"],
            issuer_ids: vec![],
            sort_order: "DESC",
            sort_field: "navTo6Months",
            page: 1,
            page_size: 100,
            is_ipo: false,
            fund_asset_types: vec![],
            bond_remain_periods: vec![],
            search_field: field.into(),
            is_buy_by_reward: false,
            third_app_ids: vec![],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavHistoryRequest {
    pub is_all_data: u8,
    pub product_id: i64,
    /// `YYYYMMDD`
    pub from_date: String,
    /// `YYYYMMDD`
    pub to_date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavRecord {
    /// `YYYY-MM-DD` or `YYYYMMDD`
    pub nav_date: String,
    pub nav: f64,
}

impl NavRecord {
    pub fn date(&self) -> Option<NaiveDate> {
        let raw = self.nav_date.trim();
        let raw = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(raw.get(..8).unwrap_or(raw), "%Y%m%d"))
            .ok()
    }
}

// SJC

#[derive(Debug, Clone, Deserialize)]
pub struct SjcEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<SjcGoldPrice>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SjcGoldPrice {
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub branch_name: String,
    pub buy_value: f64,
    pub sell_value: f64,
}

impl SjcGoldPrice {
    pub fn buy(&self) -> Decimal {
        decimal(self.buy_value)
    }

    pub fn sell(&self) -> Decimal {
        decimal(self.sell_value)
    }

    /// Reference price: the dealer sell price, or the buy price when sell is missing.
    pub fn close(&self) -> Decimal {
        let sell = self.sell();
        if sell > Decimal::ZERO {
            sell
        } else {
            self.buy()
        }
    }
}
