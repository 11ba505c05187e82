//! In-memory stores and a scripted provider shared by the core tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;

use vnmarket_market_data::{
    AssetCategory, AssetSummary, HistoricalRecord, MarketDataError, QuoteSnapshot,
    RateLimitConfig, RateLimitProtector, UpstreamProvider,
};

use crate::assets::{AssetRecord, AssetStore};
use crate::errors::{Error, Result};
use crate::history::{DateCoverage, HistoryCategoryStats, HistoryStore};
use crate::quotes::{QuoteCacheEntry, QuoteCacheStore};
use crate::search::{normalize_query, SearchCacheEntry, SearchCacheStore};
use crate::upstream::ProtectedUpstream;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn record(symbol: &str, category: AssetCategory, day: NaiveDate, close: Decimal) -> HistoricalRecord {
    HistoricalRecord::flat(symbol, category, day, close)
}

/// Wraps a provider with a protector that never makes callers wait.
pub fn protected(provider: Arc<MockProvider>) -> Arc<ProtectedUpstream> {
    Arc::new(ProtectedUpstream::new(
        provider,
        Arc::new(RateLimitProtector::new(RateLimitConfig::default())),
        Duration::ZERO,
    ))
}

type HistoryKey = (String, AssetCategory, NaiveDate);

/// `None` values are marker rows.
#[derive(Clone, Default)]
pub struct MockStore {
    assets: Arc<Mutex<HashMap<String, AssetRecord>>>,
    quotes: Arc<Mutex<HashMap<(String, AssetCategory), QuoteCacheEntry>>>,
    searches: Arc<Mutex<HashMap<String, SearchCacheEntry>>>,
    history: Arc<Mutex<BTreeMap<HistoryKey, Option<HistoricalRecord>>>>,
    unavailable: Arc<Mutex<bool>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    fn check(&self) -> Result<()> {
        if *self.unavailable.lock().unwrap() {
            return Err(Error::StoreUnavailable("mock store offline".into()));
        }
        Ok(())
    }

    pub fn insert_record(&self, record: HistoricalRecord) {
        self.history.lock().unwrap().insert(
            (record.symbol.clone(), record.category, record.date),
            Some(record),
        );
    }

    pub fn insert_range(&self, symbol: &str, category: AssetCategory, start: NaiveDate, end: NaiveDate) {
        for day in start.iter_days().take_while(|d| *d <= end) {
            self.insert_record(record(symbol, category, day, Decimal::from(100)));
        }
    }

    pub fn marker_count(&self) -> usize {
        self.history.lock().unwrap().values().filter(|v| v.is_none()).count()
    }

    pub fn record_count(&self) -> usize {
        self.history.lock().unwrap().values().filter(|v| v.is_some()).count()
    }

    pub fn has_quote(&self, symbol: &str, category: AssetCategory) -> bool {
        self.quotes
            .lock()
            .unwrap()
            .contains_key(&(symbol.to_string(), category))
    }
}

#[async_trait]
impl AssetStore for MockStore {
    async fn get_asset(&self, symbol: &str) -> Result<Option<AssetRecord>> {
        self.check()?;
        Ok(self.assets.lock().unwrap().get(symbol).cloned())
    }

    async fn upsert_asset(&self, asset: AssetRecord) -> Result<AssetRecord> {
        self.check()?;
        let mut assets = self.assets.lock().unwrap();
        let mut stored = asset.clone();
        if let Some(existing) = assets.get(&asset.symbol) {
            stored.created_at = existing.created_at;
        }
        assets.insert(stored.symbol.clone(), stored.clone());
        Ok(stored)
    }

    async fn upsert_assets(&self, assets: Vec<AssetRecord>) -> Result<usize> {
        let count = assets.len();
        for asset in assets {
            self.upsert_asset(asset).await?;
        }
        Ok(count)
    }

    async fn search_assets(&self, query: &str, limit: usize) -> Result<Vec<AssetRecord>> {
        self.check()?;
        let query = query.to_lowercase();
        Ok(self
            .assets
            .lock()
            .unwrap()
            .values()
            .filter(|a| {
                a.symbol.to_lowercase().contains(&query) || a.name.to_lowercase().contains(&query)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_assets(&self) -> Result<u64> {
        self.check()?;
        Ok(self.assets.lock().unwrap().len() as u64)
    }

    async fn count_assets_by_category(&self) -> Result<Vec<(AssetCategory, u64)>> {
        self.check()?;
        let assets = self.assets.lock().unwrap();
        Ok(AssetCategory::ALL
            .iter()
            .map(|c| (*c, assets.values().filter(|a| a.category == *c).count() as u64))
            .filter(|(_, n)| *n > 0)
            .collect())
    }
}

#[async_trait]
impl QuoteCacheStore for MockStore {
    async fn get_quote(
        &self,
        symbol: &str,
        category: AssetCategory,
        now: DateTime<Utc>,
    ) -> Result<Option<QuoteCacheEntry>> {
        self.check()?;
        Ok(self
            .quotes
            .lock()
            .unwrap()
            .get(&(symbol.to_string(), category))
            .filter(|e| e.is_valid_at(now))
            .cloned())
    }

    async fn set_quote(&self, entry: QuoteCacheEntry) -> Result<()> {
        self.check()?;
        self.quotes
            .lock()
            .unwrap()
            .insert((entry.symbol.clone(), entry.category), entry);
        Ok(())
    }

    async fn purge_expired_quotes(&self, now: DateTime<Utc>) -> Result<usize> {
        self.check()?;
        let mut quotes = self.quotes.lock().unwrap();
        let before = quotes.len();
        quotes.retain(|_, e| e.is_valid_at(now));
        Ok(before - quotes.len())
    }

    async fn count_valid_quotes(&self, now: DateTime<Utc>) -> Result<u64> {
        self.check()?;
        Ok(self.quotes.lock().unwrap().values().filter(|e| e.is_valid_at(now)).count() as u64)
    }
}

#[async_trait]
impl SearchCacheStore for MockStore {
    async fn get_search(&self, query: &str, now: DateTime<Utc>) -> Result<Option<SearchCacheEntry>> {
        self.check()?;
        Ok(self
            .searches
            .lock()
            .unwrap()
            .get(&normalize_query(query))
            .filter(|e| e.is_valid_at(now))
            .cloned())
    }

    async fn set_search(&self, entry: SearchCacheEntry) -> Result<()> {
        self.check()?;
        self.searches.lock().unwrap().insert(entry.query.clone(), entry);
        Ok(())
    }

    async fn purge_expired_searches(&self, now: DateTime<Utc>) -> Result<usize> {
        self.check()?;
        let mut searches = self.searches.lock().unwrap();
        let before = searches.len();
        searches.retain(|_, e| e.is_valid_at(now));
        Ok(before - searches.len())
    }

    async fn count_valid_searches(&self, now: DateTime<Utc>) -> Result<u64> {
        self.check()?;
        Ok(self.searches.lock().unwrap().values().filter(|e| e.is_valid_at(now)).count() as u64)
    }
}

#[async_trait]
impl HistoryStore for MockStore {
    async fn get_records(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>> {
        self.check()?;
        Ok(self
            .history
            .lock()
            .unwrap()
            .range((symbol.to_string(), category, start)..=(symbol.to_string(), category, end))
            .filter_map(|(_, v)| v.clone())
            .collect())
    }

    async fn upsert_records(
        &self,
        symbol: &str,
        category: AssetCategory,
        records: &[HistoricalRecord],
    ) -> Result<usize> {
        self.check()?;
        let mut history = self.history.lock().unwrap();
        let mut inserted = 0;
        let mut conflict = None;
        for rec in records {
            let key = (symbol.to_string(), category, rec.date);
            match history.get(&key) {
                Some(Some(existing)) if existing == rec => {}
                Some(Some(existing)) => {
                    conflict.get_or_insert_with(|| Error::DataIntegrityConflict {
                        symbol: symbol.to_string(),
                        category,
                        date: rec.date,
                        detail: format!("close {} != {}", existing.close, rec.close),
                    });
                }
                _ => {
                    history.insert(key, Some(rec.clone()));
                    inserted += 1;
                }
            }
        }
        match conflict {
            Some(e) => Err(e),
            None => Ok(inserted),
        }
    }

    async fn date_coverage(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, DateCoverage>> {
        self.check()?;
        let history = self.history.lock().unwrap();
        Ok(start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|d| {
                let coverage = match history.get(&(symbol.to_string(), category, d)) {
                    Some(Some(_)) => DateCoverage::Present,
                    Some(None) => DateCoverage::ConfirmedAbsent,
                    None => DateCoverage::Unknown,
                };
                (d, coverage)
            })
            .collect())
    }

    async fn mark_absent(
        &self,
        symbol: &str,
        category: AssetCategory,
        dates: &[NaiveDate],
    ) -> Result<usize> {
        self.check()?;
        let mut history = self.history.lock().unwrap();
        let mut written = 0;
        for d in dates {
            let key = (symbol.to_string(), category, *d);
            if !history.contains_key(&key) {
                history.insert(key, None);
                written += 1;
            }
        }
        Ok(written)
    }

    async fn latest_record_within(
        &self,
        symbol: &str,
        category: AssetCategory,
        lookback_start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<HistoricalRecord>> {
        Ok(self
            .get_records(symbol, category, lookback_start, end)
            .await?
            .into_iter()
            .last())
    }

    async fn history_stats(&self) -> Result<Vec<HistoryCategoryStats>> {
        self.check()?;
        let history = self.history.lock().unwrap();
        let mut stats = Vec::new();
        for category in AssetCategory::ALL {
            let rows: Vec<_> = history.iter().filter(|((_, c, _), _)| *c == category).collect();
            if rows.is_empty() {
                continue;
            }
            let real: Vec<_> = rows.iter().filter(|(_, v)| v.is_some()).collect();
            let mut symbols: Vec<&String> = rows.iter().map(|((s, _, _), _)| s).collect();
            symbols.dedup();
            stats.push(HistoryCategoryStats {
                category,
                symbols: symbols.len() as u64,
                records: real.len() as u64,
                markers: (rows.len() - real.len()) as u64,
                earliest: real.iter().map(|((_, _, d), _)| *d).min(),
                latest: real.iter().map(|((_, _, d), _)| *d).max(),
            });
        }
        Ok(stats)
    }
}

/// How the mock provider fails, when it does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
    None,
    Throttled,
    Unavailable,
}

/// Scripted provider that records every call.
#[derive(Default)]
pub struct MockProvider {
    quotes: Mutex<HashMap<String, QuoteSnapshot>>,
    history: Mutex<HashMap<String, Vec<HistoricalRecord>>>,
    assets: Mutex<Vec<AssetSummary>>,
    failure: Mutex<Option<Failure>>,
    quote_calls: Mutex<Vec<String>>,
    history_calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
    search_calls: Mutex<Vec<String>>,
    list_calls: Mutex<Vec<AssetCategory>>,
    delay: Mutex<Option<Duration>>,
    history_span: Mutex<Option<u32>>,
    failing_days: Mutex<HashSet<NaiveDate>>,
    weekends_closed: Mutex<bool>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quote(&self, quote: QuoteSnapshot) {
        self.quotes.lock().unwrap().insert(quote.symbol.clone(), quote);
    }

    pub fn set_history(&self, symbol: &str, records: Vec<HistoricalRecord>) {
        self.history.lock().unwrap().insert(symbol.to_string(), records);
    }

    pub fn add_asset(&self, summary: AssetSummary) {
        self.assets.lock().unwrap().push(summary);
    }

    pub fn fail_with(&self, failure: Failure) {
        *self.failure.lock().unwrap() = Some(failure);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Page history calls like a one-date-per-request source.
    pub fn set_history_span(&self, days: u32) {
        *self.history_span.lock().unwrap() = Some(days);
    }

    /// History calls covering `day` fail with a non-throttle error.
    pub fn fail_on(&self, day: NaiveDate) {
        self.failing_days.lock().unwrap().insert(day);
    }

    pub fn recover(&self, day: NaiveDate) {
        self.failing_days.lock().unwrap().remove(&day);
    }

    pub fn close_weekends(&self) {
        *self.weekends_closed.lock().unwrap() = true;
    }

    pub fn quote_calls(&self) -> Vec<String> {
        self.quote_calls.lock().unwrap().clone()
    }

    pub fn history_calls(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
        self.history_calls.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> Vec<AssetCategory> {
        self.list_calls.lock().unwrap().clone()
    }

    async fn simulate(&self) -> std::result::Result<(), MarketDataError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = *self.failure.lock().unwrap();
        match failure.unwrap_or(Failure::None) {
            Failure::None => Ok(()),
            Failure::Throttled => Err(MarketDataError::Throttled {
                provider: "MOCK".into(),
                message: "Quá nhiều request, thử lại sau 15 giây".into(),
                retry_after: Some(Duration::from_secs(15)),
            }),
            Failure::Unavailable => Err(MarketDataError::ProviderError {
                provider: "MOCK".into(),
                message: "HTTP 503".into(),
            }),
        }
    }
}

#[async_trait]
impl UpstreamProvider for MockProvider {
    fn id(&self) -> &'static str {
        "MOCK"
    }

    fn max_history_span(&self, _category: AssetCategory) -> Option<u32> {
        *self.history_span.lock().unwrap()
    }

    fn publishes_on(&self, _category: AssetCategory, date: NaiveDate) -> bool {
        !*self.weekends_closed.lock().unwrap() || date.weekday().num_days_from_monday() < 5
    }

    async fn fetch_quote(
        &self,
        symbol: &str,
        _category: AssetCategory,
    ) -> std::result::Result<Option<QuoteSnapshot>, MarketDataError> {
        self.quote_calls.lock().unwrap().push(symbol.to_string());
        self.simulate().await?;
        Ok(self.quotes.lock().unwrap().get(symbol).cloned())
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        _category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<HistoricalRecord>, MarketDataError> {
        self.history_calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), start, end));
        self.simulate().await?;
        let failing = self
            .failing_days
            .lock()
            .unwrap()
            .iter()
            .any(|d| *d >= start && *d <= end);
        if failing {
            return Err(MarketDataError::ProviderError {
                provider: "MOCK".into(),
                message: "HTTP 502 Bad Gateway".into(),
            });
        }
        Ok(self
            .history
            .lock()
            .unwrap()
            .get(symbol)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.date >= start && r.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn search_assets(&self, query: &str) -> std::result::Result<Vec<AssetSummary>, MarketDataError> {
        self.search_calls.lock().unwrap().push(query.to_string());
        self.simulate().await?;
        Ok(self
            .assets
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.matches(query))
            .cloned()
            .collect())
    }

    async fn list_assets(
        &self,
        category: AssetCategory,
    ) -> std::result::Result<Vec<AssetSummary>, MarketDataError> {
        self.list_calls.lock().unwrap().push(category);
        self.simulate().await?;
        Ok(self
            .assets
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.category == category)
            .cloned()
            .collect())
    }
}
