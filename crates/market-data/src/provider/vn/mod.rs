//! Vietnamese market provider.
//!
//! Combines three upstream sources behind one [`UpstreamProvider`]:
//! - VCI for stocks and indices
//! - FMarket for mutual funds
//! - SJC for gold

mod fmarket;
mod headers;
mod models;
mod sjc;
mod vci;

pub use fmarket::FMarketClient;
pub use sjc::{gold_summary, SjcClient, GOLD_SYMBOL};
pub use vci::{index_chart_code, index_summaries, VciClient, INDICES};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, FixedOffset, NaiveDate, Utc};
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use super::traits::UpstreamProvider;
use crate::errors::MarketDataError;
use crate::models::{AssetCategory, AssetSummary, HistoricalRecord, QuoteSnapshot};
use crate::throttle::{PhraseClassifier, ThrottleClassifier, ThrottleSignal};

pub const PROVIDER_ID: &str = "VN_MARKET";

/// Days looked back when reconstructing the latest quote from daily bars.
const QUOTE_LOOKBACK_DAYS: i64 = 7;
const FUND_QUOTE_LOOKBACK_DAYS: i64 = 14;

/// Exchange time zone, UTC+7.
const MARKET_UTC_OFFSET_SECS: i32 = 7 * 3600;

const GOLD_QUERY_PATTERNS: &[&str] = &["GOLD", "SJC", "VANG", "VÀNG"];

/// Decode a JSON response, turning throttling into [`MarketDataError::Throttled`].
///
/// The endpoints sometimes answer throttling with a 200 and a prose body,
/// so the body is classified whenever it fails to parse.
pub(crate) async fn decode_response<T: DeserializeOwned>(
    provider: &str,
    classifier: &dyn ThrottleClassifier,
    response: Response,
) -> Result<T, MarketDataError> {
    let status = response.status();
    let header_wait = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await?;

    classify_body(provider, classifier, status, header_wait, &body)?;

    serde_json::from_str(&body).map_err(|e| {
        match throttled(provider, classifier, &body, header_wait) {
            Some(err) => err,
            None => MarketDataError::Parse(format!("{} response: {}", provider, e)),
        }
    })
}

fn classify_body(
    provider: &str,
    classifier: &dyn ThrottleClassifier,
    status: StatusCode,
    header_wait: Option<Duration>,
    body: &str,
) -> Result<(), MarketDataError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = match classifier.classify(body) {
            ThrottleSignal::Throttled { retry_after } => retry_after.or(header_wait),
            _ => header_wait,
        };
        return Err(MarketDataError::Throttled {
            provider: provider.to_string(),
            message: snippet(body, status),
            retry_after,
        });
    }

    if !status.is_success() {
        if let Some(err) = throttled(provider, classifier, body, header_wait) {
            return Err(err);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(MarketDataError::NoDataForRange);
        }
        return Err(MarketDataError::ProviderError {
            provider: provider.to_string(),
            message: snippet(body, status),
        });
    }

    Ok(())
}

fn throttled(
    provider: &str,
    classifier: &dyn ThrottleClassifier,
    body: &str,
    header_wait: Option<Duration>,
) -> Option<MarketDataError> {
    match classifier.classify(body) {
        ThrottleSignal::Throttled { retry_after } => Some(MarketDataError::Throttled {
            provider: provider.to_string(),
            message: body.chars().take(200).collect(),
            retry_after: retry_after.or(header_wait),
        }),
        _ => None,
    }
}

fn snippet(body: &str, status: StatusCode) -> String {
    let text: String = body.chars().take(200).collect();
    if text.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, text)
    }
}

/// Current calendar date on the Vietnamese exchange.
pub fn market_today() -> NaiveDate {
    let now = Utc::now();
    match FixedOffset::east_opt(MARKET_UTC_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).date_naive(),
        None => now.date_naive(),
    }
}

/// Detect the category of a symbol from its shape alone.
///
/// Returns `None` for plain tickers, which may be either stocks or funds.
pub fn category_hint(symbol: &str) -> Option<AssetCategory> {
    let upper = symbol.trim().to_uppercase();
    if upper.contains("GOLD") || upper == "SJC" {
        return Some(AssetCategory::Gold);
    }
    if index_chart_code(&upper).is_some() {
        return Some(AssetCategory::Index);
    }
    None
}

pub struct VnMarketProvider {
    vci: VciClient,
    fmarket: FMarketClient,
    sjc: SjcClient,
}

impl VnMarketProvider {
    pub fn new(timeout: Duration) -> Result<Self, MarketDataError> {
        Self::with_classifier(Arc::new(PhraseClassifier::new()), timeout)
    }

    pub fn with_classifier(
        classifier: Arc<dyn ThrottleClassifier>,
        timeout: Duration,
    ) -> Result<Self, MarketDataError> {
        Ok(Self {
            vci: VciClient::new(classifier.clone(), timeout)?,
            fmarket: FMarketClient::new(classifier.clone(), timeout)?,
            sjc: SjcClient::new(classifier, timeout)?,
        })
    }
}

#[async_trait]
impl UpstreamProvider for VnMarketProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn max_history_span(&self, category: AssetCategory) -> Option<u32> {
        // SJC answers one date per request
        (category == AssetCategory::Gold).then_some(1)
    }

    fn publishes_on(&self, _category: AssetCategory, date: NaiveDate) -> bool {
        date.weekday().num_days_from_monday() < 5
    }

    async fn fetch_quote(
        &self,
        symbol: &str,
        category: AssetCategory,
    ) -> Result<Option<QuoteSnapshot>, MarketDataError> {
        let today = market_today();

        let latest = match category {
            AssetCategory::Stock | AssetCategory::Index => {
                let start = today - chrono::Duration::days(QUOTE_LOOKBACK_DAYS);
                self.vci
                    .daily_history(symbol, category, start, today)
                    .await?
                    .pop()
                    .map(|r| (r, "VCI"))
            }
            AssetCategory::Fund => {
                let start = today - chrono::Duration::days(FUND_QUOTE_LOOKBACK_DAYS);
                self.fmarket
                    .nav_history(symbol, start, today)
                    .await?
                    .pop()
                    .map(|r| (r, "FMARKET"))
            }
            AssetCategory::Gold => self
                .sjc
                .latest(symbol, today, QUOTE_LOOKBACK_DAYS)
                .await?
                .map(|r| (r, "SJC")),
        };

        Ok(latest
            .map(|(record, source)| QuoteSnapshot::from_record(&record, source))
            .filter(QuoteSnapshot::has_price))
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>, MarketDataError> {
        match category {
            AssetCategory::Stock | AssetCategory::Index => {
                self.vci.daily_history(symbol, category, start, end).await
            }
            AssetCategory::Fund => self.fmarket.nav_history(symbol, start, end).await,
            AssetCategory::Gold => self.sjc.history(symbol, start, end).await,
        }
    }

    async fn search_assets(&self, query: &str) -> Result<Vec<AssetSummary>, MarketDataError> {
        let needle = query.trim().to_uppercase();
        if needle.is_empty() {
            return Ok(vec![]);
        }

        let mut results: Vec<AssetSummary> = Vec::new();

        if GOLD_QUERY_PATTERNS.iter().any(|p| needle.contains(p)) {
            results.push(gold_summary());
        }

        results.extend(
            index_summaries()
                .into_iter()
                .filter(|i| i.symbol.contains(&needle) || needle.contains(&i.symbol)),
        );

        let (stocks, funds) = tokio::join!(self.vci.list_stocks(), self.fmarket.search_funds(&needle));

        // A failed source must not hide the others, but throttling propagates
        // so the caller can back off.
        let mut first_error = None;
        for outcome in [stocks, funds] {
            match outcome {
                Ok(found) => results.extend(found.into_iter().filter(|a| a.matches(&needle))),
                Err(e) if e.is_throttled() => return Err(e),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if results.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let mut seen = HashSet::new();
        results.retain(|a| seen.insert((a.symbol.clone(), a.category)));
        // Exact symbol matches first
        results.sort_by_key(|a| (a.symbol != needle, a.symbol.len()));
        Ok(results)
    }

    async fn list_assets(
        &self,
        category: AssetCategory,
    ) -> Result<Vec<AssetSummary>, MarketDataError> {
        match category {
            AssetCategory::Stock => self.vci.list_stocks().await,
            AssetCategory::Fund => self.fmarket.list_funds().await,
            AssetCategory::Index => Ok(index_summaries()),
            AssetCategory::Gold => Ok(vec![gold_summary()]),
        }
    }
}
