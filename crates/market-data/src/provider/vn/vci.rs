//! VCI (Vietcap) client for stocks and indices.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use rust_decimal::Decimal;

use super::headers::vci_headers;
use super::models::{decimal, OhlcRequest, VciOhlcSeries, VciSymbol};
use super::decode_response;
use crate::errors::MarketDataError;
use crate::models::{AssetCategory, AssetSummary, HistoricalRecord};
use crate::throttle::ThrottleClassifier;

pub const VCI_BASE_URL: &str = "https://trading.vietcap.com.vn/api";
const PROVIDER: &str = "VCI";

/// Stock prices arrive in thousands of VND. Index points are not scaled.
const STOCK_PRICE_MULTIPLIER: f64 = 1000.0;

/// Indices known to the service, with display name and exchange.
pub const INDICES: &[(&str, &str, &str)] = &[
    ("VNINDEX", "VNINDEX - Vietnam All Share Index", "HOSE"),
    ("VN30", "VN30 - Vietnam 30 Index", "HOSE"),
    ("HNX", "HNX - Hanoi Stock Exchange Index", "HNX"),
    ("HNX30", "HNX30 - Hanoi 30 Index", "HNX"),
    ("UPCOM", "UPCOM - Unlisted Public Company Market Index", "HNX"),
];

/// Map an index symbol to the code the chart endpoint expects.
pub fn index_chart_code(symbol: &str) -> Option<&'static str> {
    match symbol.to_uppercase().as_str() {
        "VNINDEX" => Some("VNINDEX"),
        "VN30" => Some("VN30"),
        "HNX" | "HNXINDEX" => Some("HNXIndex"),
        "HNX30" => Some("HNX30"),
        "UPCOM" | "UPCOMINDEX" => Some("HNXUpcomIndex"),
        _ => None,
    }
}

pub fn index_summaries() -> Vec<AssetSummary> {
    INDICES
        .iter()
        .map(|(symbol, name, exchange)| AssetSummary::new(*symbol, *name, AssetCategory::Index, *exchange))
        .collect()
}

#[derive(Clone)]
pub struct VciClient {
    client: Client,
    base_url: String,
    classifier: Arc<dyn ThrottleClassifier>,
}

impl VciClient {
    pub fn new(
        classifier: Arc<dyn ThrottleClassifier>,
        timeout: Duration,
    ) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .default_headers(vci_headers())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: VCI_BASE_URL.to_string(),
            classifier,
        })
    }

    pub async fn list_symbols(&self) -> Result<Vec<VciSymbol>, MarketDataError> {
        let url = format!("{}/price/symbols/getAll", self.base_url);
        let response = self.client.get(&url).send().await?;
        decode_response(PROVIDER, self.classifier.as_ref(), response).await
    }

    /// Listed stocks as summaries.
    pub async fn list_stocks(&self) -> Result<Vec<AssetSummary>, MarketDataError> {
        let symbols = self.list_symbols().await?;
        Ok(symbols
            .iter()
            .filter(|s| s.is_listed_stock())
            .map(|s| AssetSummary::new(&s.symbol, s.display_name(), AssetCategory::Stock, s.exchange()))
            .collect())
    }

    /// Daily bars for `[start, end]`, as historical records.
    pub async fn daily_history(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>, MarketDataError> {
        let chart_symbol = match category {
            AssetCategory::Index => index_chart_code(symbol)
                .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?
                .to_string(),
            AssetCategory::Stock => symbol.to_uppercase(),
            other => return Err(MarketDataError::UnsupportedCategory(other.to_string())),
        };

        let to = end
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| MarketDataError::Parse(format!("invalid end date {}", end)))?;

        let payload = OhlcRequest {
            time_frame: "ONE_DAY",
            symbols: vec![chart_symbol],
            to,
            count_back: (end - start).num_days().max(0) + 1,
        };

        let url = format!("{}/chart/OHLCChart/gap-chart", self.base_url);
        let response = self.client.post(&url).json(&payload).send().await?;
        let series: Vec<VciOhlcSeries> =
            decode_response(PROVIDER, self.classifier.as_ref(), response).await?;

        let Some(series) = series.into_iter().next() else {
            return Ok(vec![]);
        };

        let multiplier = match category {
            AssetCategory::Stock => STOCK_PRICE_MULTIPLIER,
            _ => 1.0,
        };
        Ok(series_to_records(symbol, category, &series, multiplier, start, end))
    }
}

fn series_to_records(
    symbol: &str,
    category: AssetCategory,
    series: &VciOhlcSeries,
    multiplier: f64,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<HistoricalRecord> {
    let price = |value: f64| decimal(value * multiplier).round_dp(2);

    let mut records: Vec<HistoricalRecord> = (0..series.len())
        .filter_map(|i| {
            let date = DateTime::from_timestamp(series.t[i], 0)?.date_naive();
            if date < start || date > end {
                return None;
            }
            Some(HistoricalRecord::ohlcv(
                symbol.to_uppercase(),
                category,
                date,
                price(series.o[i]),
                price(series.h[i]),
                price(series.l[i]),
                price(series.c[i]),
                decimal(series.v[i]).max(Decimal::ZERO),
            ))
        })
        .collect();

    records.sort_by_key(|r| r.date);
    records.dedup_by_key(|r| r.date);
    records
}
