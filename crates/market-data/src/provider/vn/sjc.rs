//! SJC gold price client.
//!
//! SJC only answers one date per call, so history is fetched day by day and
//! weekends are skipped. Callers page gold history one day at a time so each
//! request is rate-gated and persisted on its own.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use tracing::{debug, warn};

use super::decode_response;
use super::headers::sjc_headers;
use super::models::{SjcEnvelope, SjcGoldPrice};
use crate::errors::MarketDataError;
use crate::models::{AssetCategory, AssetSummary, HistoricalRecord};
use crate::throttle::ThrottleClassifier;

const SJC_URL: &str = "https://sjc.com.vn/GoldPrice/Services/PriceService.ashx";
const PROVIDER: &str = "SJC";

/// Canonical gold symbol.
pub const GOLD_SYMBOL: &str = "VN.GOLD";

/// Earliest date SJC serves.
pub fn min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2016, 1, 2).unwrap_or(NaiveDate::MIN)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    date.weekday().num_days_from_monday() >= 5
}

pub fn gold_summary() -> AssetSummary {
    AssetSummary::new(GOLD_SYMBOL, "SJC Gold Bar (1 lượng)", AssetCategory::Gold, "SJC")
}

#[derive(Clone)]
pub struct SjcClient {
    client: Client,
    classifier: Arc<dyn ThrottleClassifier>,
    url: String,
}

impl SjcClient {
    pub fn new(
        classifier: Arc<dyn ThrottleClassifier>,
        timeout: Duration,
    ) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .default_headers(sjc_headers())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            classifier,
            url: SJC_URL.to_string(),
        })
    }

    #[cfg(test)]
    fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Price of the standard SJC bar on `date`, `None` when SJC has nothing.
    pub async fn price_on(&self, date: NaiveDate) -> Result<Option<SjcGoldPrice>, MarketDataError> {
        if date < min_date() {
            return Ok(None);
        }

        let body = format!(
            "method=GetSJCGoldPriceByDate&toDate={}",
            date.format("%d/%m/%Y")
        );
        let response = self.client.post(self.url.as_str()).body(body).send().await?;
        let envelope: SjcEnvelope = decode_response(PROVIDER, self.classifier.as_ref(), response).await?;

        if !envelope.success {
            return Ok(None);
        }
        Ok(envelope.data.into_iter().next())
    }

    /// Day-by-day history for `[start, end]`.
    ///
    /// Any failed day aborts the walk. A partial answer would let callers
    /// treat the failed days as having no price.
    pub async fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>, MarketDataError> {
        let mut records = Vec::new();

        for date in trading_days(start.max(min_date()), end) {
            match self.price_on(date).await {
                Ok(Some(price)) => records.push(to_record(symbol, date, &price)),
                Ok(None) => debug!(%date, "no SJC price"),
                Err(e) => {
                    warn!(%date, error = %e, "failed to fetch SJC price");
                    return Err(e);
                }
            }
        }

        Ok(records)
    }

    /// Most recent price within the last `lookback_days`.
    pub async fn latest(
        &self,
        symbol: &str,
        today: NaiveDate,
        lookback_days: i64,
    ) -> Result<Option<HistoricalRecord>, MarketDataError> {
        let start = today - chrono::Duration::days(lookback_days);
        for date in trading_days(start, today).into_iter().rev() {
            if let Some(price) = self.price_on(date).await? {
                return Ok(Some(to_record(symbol, date, &price)));
            }
        }
        Ok(None)
    }
}

fn trading_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !is_weekend(*d))
        .collect()
}

fn to_record(symbol: &str, date: NaiveDate, price: &SjcGoldPrice) -> HistoricalRecord {
    HistoricalRecord::flat(symbol.to_uppercase(), AssetCategory::Gold, date, price.close())
        .with_gold_prices(price.buy(), price.sell())
}
