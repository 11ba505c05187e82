//! FMarket client for mutual fund listings and NAV history.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::debug;

use super::decode_response;
use super::headers::fmarket_headers;
use super::models::{decimal, FMarketEnvelope, FundFilterRequest, FundInfo, FundPage, NavHistoryRequest, NavRecord};
use crate::errors::MarketDataError;
use crate::models::{AssetCategory, AssetSummary, HistoricalRecord};
use crate::throttle::ThrottleClassifier;

const FILTER_URL: &str = "https://api.fmarket.vn/res/products/filter";
const NAV_HISTORY_URL: &str = "https://api.fmarket.vn/res/product/get-nav-history";
const PROVIDER: &str = "FMARKET";

pub struct FMarketClient {
    client: Client,
    classifier: Arc<dyn ThrottleClassifier>,
    /// short name or code (upper-case) -> product id
    fund_ids: RwLock<HashMap<String, i64>>,
}

impl FMarketClient {
    pub fn new(
        classifier: Arc<dyn ThrottleClassifier>,
        timeout: Duration,
    ) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .default_headers(fmarket_headers())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            classifier,
            fund_ids: RwLock::new(HashMap::new()),
        })
    }

    async fn filter(&self, search_field: &str) -> Result<Vec<FundInfo>, MarketDataError> {
        let payload = FundFilterRequest::search(search_field);
        let response = self.client.post(FILTER_URL).json(&payload).send().await?;
        let page: FMarketEnvelope<FundPage> =
            decode_response(PROVIDER, self.classifier.as_ref(), response).await?;

        self.remember(&page.data.rows).await;
        Ok(page.data.rows)
    }

    async fn remember(&self, funds: &[FundInfo]) {
        let mut ids = self.fund_ids.write().await;
        for fund in funds {
            ids.insert(fund.short_name.to_uppercase(), fund.id);
            if let Some(code) = &fund.code {
                ids.insert(code.to_uppercase(), fund.id);
            }
        }
    }

    pub async fn list_funds(&self) -> Result<Vec<AssetSummary>, MarketDataError> {
        let funds = self.filter("").await?;
        Ok(funds.iter().map(to_summary).collect())
    }

    pub async fn search_funds(&self, query: &str) -> Result<Vec<AssetSummary>, MarketDataError> {
        let funds = self.filter(&query.trim().to_uppercase()).await?;
        Ok(funds.iter().map(to_summary).collect())
    }

    /// Resolve a fund symbol to its product id, refreshing the map on a miss.
    pub async fn fund_id(&self, symbol: &str) -> Result<i64, MarketDataError> {
        let key = symbol.trim().to_uppercase();
        if let Some(id) = self.fund_ids.read().await.get(&key) {
            return Ok(*id);
        }

        debug!(symbol = %key, "fund id not cached, querying listing");
        self.filter(&key).await?;

        self.fund_ids
            .read()
            .await
            .get(&key)
            .copied()
            .ok_or(MarketDataError::SymbolNotFound(key))
    }

    pub async fn nav_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>, MarketDataError> {
        let product_id = self.fund_id(symbol).await?;
        let payload = NavHistoryRequest {
            is_all_data: 0,
            product_id,
            from_date: start.format("%Y%m%d").to_string(),
            to_date: end.format("%Y%m%d").to_string(),
        };

        let response = self.client.post(NAV_HISTORY_URL).json(&payload).send().await?;
        let envelope: FMarketEnvelope<Vec<NavRecord>> =
            decode_response(PROVIDER, self.classifier.as_ref(), response).await?;

        Ok(nav_to_records(symbol, &envelope.data, start, end))
    }
}

fn to_summary(fund: &FundInfo) -> AssetSummary {
    AssetSummary::new(fund.short_name.to_uppercase(), &fund.name, AssetCategory::Fund, "FUND")
}

fn nav_to_records(
    symbol: &str,
    navs: &[NavRecord],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<HistoricalRecord> {
    let mut records: Vec<HistoricalRecord> = navs
        .iter()
        .filter(|n| n.nav > 0.0)
        .filter_map(|n| {
            let date = n.date()?;
            if date < start || date > end {
                return None;
            }
            let nav = decimal(n.nav);
            Some(HistoricalRecord::flat(symbol.to_uppercase(), AssetCategory::Fund, date, nav).with_nav(nav))
        })
        .collect();

    records.sort_by_key(|r| r.date);
    records.dedup_by_key(|r| r.date);
    records
}
