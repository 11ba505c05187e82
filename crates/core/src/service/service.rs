use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};

use vnmarket_market_data::{
    AssetCategory, AssetSummary, HistoricalRecord, QuoteSnapshot, RateLimitProtector,
    UpstreamProvider,
};

use super::model::{
    AcceleratorSection, CleanupReport, ProviderSummary, RefreshReport, ServiceStats, StoreStats,
};
use super::traits::MarketCacheServiceTrait;
use crate::accelerator::{self, AcceleratorCache};
use crate::assets::{normalize_symbol, AssetRecord, AssetStore, CategoryDetector};
use crate::config::CacheConfig;
use crate::errors::{Error, Result};
use crate::freshness::FreshnessPolicy;
use crate::history::{BackfillReport, HistoricalCacheCoordinator, HistoryBackfill, HistoryStore};
use crate::quotes::{CachedQuote, FallbackChain, QuoteCacheEntry, QuoteCacheStore, QuoteTier};
use crate::search::{normalize_query, SearchCacheEntry, SearchCacheStore};
use crate::seeder::{AssetSeeder, SeedReport};
use crate::singleflight::{self, SingleFlight};
use crate::upstream::ProtectedUpstream;

/// Rows kept from a local asset search when the provider cannot be reached.
const LOCAL_SEARCH_LIMIT: usize = 50;

/// The durable store, one handle per concern.
#[derive(Clone)]
pub struct StoreHandles {
    pub assets: Arc<dyn AssetStore>,
    pub quotes: Arc<dyn QuoteCacheStore>,
    pub searches: Arc<dyn SearchCacheStore>,
    pub history: Arc<dyn HistoryStore>,
}

impl StoreHandles {
    /// All four handles backed by one store implementation.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: AssetStore + QuoteCacheStore + SearchCacheStore + HistoryStore + 'static,
    {
        Self {
            assets: store.clone(),
            quotes: store.clone(),
            searches: store.clone(),
            history: store,
        }
    }
}

pub struct MarketCacheService {
    config: CacheConfig,
    stores: StoreHandles,
    freshness: FreshnessPolicy,
    quote_cache: AcceleratorCache<QuoteSnapshot>,
    search_cache: AcceleratorCache<Vec<AssetSummary>>,
    general_cache: AcceleratorCache<AssetCategory>,
    detector: CategoryDetector,
    flights: Arc<SingleFlight>,
    upstream: Arc<ProtectedUpstream>,
    coordinator: Arc<HistoricalCacheCoordinator>,
    fallback: FallbackChain,
    seeder: AssetSeeder,
    backfill: HistoryBackfill,
}

impl MarketCacheService {
    pub fn new(
        config: CacheConfig,
        stores: StoreHandles,
        provider: Arc<dyn UpstreamProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let protector = Arc::new(RateLimitProtector::new(
            config.rate_limit.to_protector_config(),
        ));
        let upstream = Arc::new(ProtectedUpstream::new(
            provider,
            protector,
            config.rate_limit.slot_wait_timeout(),
        ));
        let flights = Arc::new(SingleFlight::new());
        let coordinator = Arc::new(HistoricalCacheCoordinator::new(
            stores.history.clone(),
            upstream.clone(),
            flights.clone(),
            config.historical.clone(),
        ));
        let fallback = FallbackChain::new(
            upstream.clone(),
            stores.history.clone(),
            coordinator.clone(),
            config.fallback.clone(),
        );
        let seeder = AssetSeeder::new(stores.assets.clone(), upstream.clone(), config.seed.clone());
        let backfill = HistoryBackfill::new(coordinator.clone(), config.backfill.clone());

        let accel = &config.accelerator;
        info!(
            "Market cache service ready (provider {}, rate limit {}/min {}/h)",
            upstream.provider_id(),
            config.rate_limit.max_calls_per_minute,
            config.rate_limit.max_calls_per_hour
        );

        Ok(Self {
            freshness: FreshnessPolicy::new(&config.freshness),
            quote_cache: AcceleratorCache::new(accel.quotes.max_entries, accel.quotes.ttl()),
            search_cache: AcceleratorCache::new(accel.search.max_entries, accel.search.ttl()),
            general_cache: AcceleratorCache::new(accel.general.max_entries, accel.general.ttl()),
            detector: CategoryDetector::new(stores.assets.clone()),
            stores,
            flights,
            upstream,
            coordinator,
            fallback,
            seeder,
            backfill,
            config,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<HistoricalCacheCoordinator> {
        &self.coordinator
    }

    /// Drop in-memory state. Persisted rows are untouched.
    pub fn shutdown(&self) {
        let quotes = self.quote_cache.stats();
        info!(
            "Market cache service shutting down ({} quote hits, {} misses)",
            quotes.hits, quotes.misses
        );
        self.quote_cache.clear();
        self.search_cache.clear();
        self.general_cache.clear();
    }

    async fn category_of(&self, symbol: &str) -> AssetCategory {
        let key = accelerator::category_key(symbol);
        if let Some(category) = self.general_cache.get(&key) {
            return category;
        }
        let detection = self.detector.detect(symbol).await;
        if detection.definitive {
            self.general_cache.put_default(key, detection.category);
        }
        detection.category
    }

    /// Accelerator lifetime of a quote: the category TTL, capped by the
    /// accelerator's own.
    pub(crate) fn accelerator_ttl(&self, category: AssetCategory) -> Duration {
        self.freshness.ttl(category).min(self.quote_cache.default_ttl())
    }

    /// Accelerator, then the persistent quote cache.
    async fn cached_quote(
        &self,
        symbol: &str,
        category: AssetCategory,
        now: DateTime<Utc>,
    ) -> Option<CachedQuote> {
        let key = accelerator::quote_key(symbol, category);
        if let Some(quote) = self.quote_cache.get(&key) {
            return Some(CachedQuote {
                quote,
                tier: QuoteTier::Accelerator,
            });
        }

        match self.stores.quotes.get_quote(symbol, category, now).await {
            Ok(Some(entry)) => {
                let remaining = (entry.expires_at - now).to_std().unwrap_or(Duration::ZERO);
                self.quote_cache
                    .put(key, entry.quote.clone(), remaining.min(self.accelerator_ttl(category)));
                Some(CachedQuote {
                    quote: entry.quote,
                    tier: QuoteTier::QuoteCache,
                })
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Quote cache read failed for {}, continuing without it: {}", symbol, e);
                None
            }
        }
    }

    async fn write_through_quote(&self, quote: &QuoteSnapshot, category: AssetCategory, now: DateTime<Utc>) {
        let symbol = quote.symbol.clone();
        self.quote_cache.put(
            accelerator::quote_key(&symbol, category),
            quote.clone(),
            self.accelerator_ttl(category),
        );

        // Providers may echo a different symbol spelling; key by what was asked.
        let mut stored = quote.clone();
        stored.category = category;
        let entry = QuoteCacheEntry::new(stored, now, self.freshness.expires_at(category, now));
        if let Err(e) = self.stores.quotes.set_quote(entry).await {
            warn!("Quote cache write failed for {}: {}", symbol, e);
        }
    }

    async fn resolve_quote(&self, symbol: &str, category: AssetCategory) -> Result<CachedQuote> {
        let now = Utc::now();
        if let Some(hit) = self.cached_quote(symbol, category, now).await {
            return Ok(hit);
        }

        let _flight = self
            .flights
            .acquire(&singleflight::quote_key(symbol, category))
            .await;

        // Another caller may have filled the caches while we waited.
        if let Some(hit) = self.cached_quote(symbol, category, Utc::now()).await {
            debug!("Quote for {} filled by a concurrent request", symbol);
            return Ok(hit);
        }

        let mut resolved = self.fallback.resolve(symbol, category).await?;
        resolved.quote.symbol = symbol.to_string();
        self.write_through_quote(&resolved.quote, category, Utc::now()).await;
        Ok(resolved)
    }

    async fn remember_assets(&self, results: &[AssetSummary]) {
        if results.is_empty() {
            return;
        }
        let now = Utc::now();
        let records: Vec<AssetRecord> = results
            .iter()
            .map(|summary| AssetRecord::from_summary(summary, now))
            .collect();
        match self.stores.assets.upsert_assets(records).await {
            Ok(written) => debug!("Registered {} discovered asset(s)", written),
            Err(e) => warn!("Could not register discovered assets: {}", e),
        }
    }

    async fn store_stats(&self, now: DateTime<Utc>) -> Result<StoreStats> {
        Ok(StoreStats {
            assets: self.stores.assets.count_assets().await?,
            assets_by_category: self.stores.assets.count_assets_by_category().await?,
            valid_quotes: self.stores.quotes.count_valid_quotes(now).await?,
            valid_searches: self.stores.searches.count_valid_searches(now).await?,
            history: self.stores.history.history_stats().await?,
        })
    }
}

fn require_symbol(symbol: &str) -> Result<String> {
    let normalized = normalize_symbol(symbol);
    if normalized.is_empty() {
        return Err(Error::Validation("symbol must not be empty".to_string()));
    }
    Ok(normalized)
}

#[async_trait]
impl MarketCacheServiceTrait for MarketCacheService {
    async fn get_quote(&self, symbol: &str) -> Result<CachedQuote> {
        let symbol = require_symbol(symbol)?;
        let category = self.category_of(&symbol).await;
        let quote = self.resolve_quote(&symbol, category).await?;
        debug!("Quote {} ({}) served from {}", symbol, category, quote.tier.as_str());
        Ok(quote)
    }

    async fn get_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>> {
        let symbol = require_symbol(symbol)?;
        if start > end {
            return Err(Error::Validation(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        let category = self.category_of(&symbol).await;
        self.coordinator.get_range(&symbol, category, start, end).await
    }

    async fn search(&self, query: &str) -> Result<Vec<AssetSummary>> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(Error::Validation("search query must not be empty".to_string()));
        }

        let key = accelerator::search_key(&normalized);
        if let Some(results) = self.search_cache.get(&key) {
            return Ok(results);
        }

        let now = Utc::now();
        match self.stores.searches.get_search(&normalized, now).await {
            Ok(Some(entry)) => {
                self.search_cache.put_default(key, entry.results.clone());
                return Ok(entry.results);
            }
            Ok(None) => {}
            Err(e) => warn!("Search cache read failed for '{}': {}", normalized, e),
        }

        let results = match self.upstream.search_assets(query.trim()).await {
            Ok(results) => results,
            Err(e) if e.is_upstream_failure() => {
                warn!("Provider search for '{}' failed, using known assets: {}", normalized, e);
                let local = self
                    .stores
                    .assets
                    .search_assets(query.trim(), LOCAL_SEARCH_LIMIT)
                    .await
                    .unwrap_or_default();
                if local.is_empty() {
                    return Err(e);
                }
                // Served but not cached: the provider answer should replace it.
                return Ok(local.iter().map(AssetRecord::to_summary).collect());
            }
            Err(e) => return Err(e),
        };

        self.remember_assets(&results).await;

        self.search_cache.put_default(key, results.clone());
        let ttl = chrono::Duration::from_std(self.search_cache.default_ttl())
            .unwrap_or(chrono::Duration::zero());
        let entry = SearchCacheEntry::new(&normalized, results.clone(), now, now + ttl);
        if let Err(e) = self.stores.searches.set_search(entry).await {
            warn!("Search cache write failed for '{}': {}", normalized, e);
        }

        Ok(results)
    }

    async fn stats(&self) -> Result<ServiceStats> {
        let now = Utc::now();
        let store = match self.store_stats(now).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Store stats unavailable: {}", e);
                None
            }
        };

        Ok(ServiceStats {
            accelerator: AcceleratorSection {
                quotes: self.quote_cache.stats(),
                search: self.search_cache.stats(),
                general: self.general_cache.stats(),
            },
            protector: self.upstream.protector().stats(),
            store,
            provider: ProviderSummary {
                id: self.upstream.provider_id().to_string(),
                calls: self.upstream.call_stats(),
            },
            freshness: self.freshness.table(),
            in_flight: self.flights.in_flight(),
        })
    }

    async fn cleanup(&self) -> Result<CleanupReport> {
        let now = Utc::now();
        let mut report = CleanupReport {
            accelerator_quotes: self.quote_cache.cleanup_expired(),
            accelerator_search: self.search_cache.cleanup_expired(),
            accelerator_general: self.general_cache.cleanup_expired(),
            ..CleanupReport::default()
        };

        match self.stores.quotes.purge_expired_quotes(now).await {
            Ok(n) => report.quotes_purged = n,
            Err(e) => warn!("Purging expired quotes failed: {}", e),
        }
        match self.stores.searches.purge_expired_searches(now).await {
            Ok(n) => report.searches_purged = n,
            Err(e) => warn!("Purging expired searches failed: {}", e),
        }

        if report.total() > 0 {
            info!("Cache cleanup removed {} expired entries", report.total());
        }
        Ok(report)
    }

    async fn seed(&self, force_refresh: bool) -> Result<SeedReport> {
        let report = self.seeder.seed(force_refresh).await?;
        if !report.skipped {
            // Categories may have changed under the detector
            self.general_cache.clear();
        }
        Ok(report)
    }

    async fn refresh_quotes(&self, symbols: &[String]) -> Result<RefreshReport> {
        let mut report = RefreshReport::default();

        for raw in symbols {
            let symbol = match require_symbol(raw) {
                Ok(symbol) => symbol,
                Err(_) => continue,
            };
            let category = self.category_of(&symbol).await;
            let now = Utc::now();

            match self.stores.quotes.get_quote(&symbol, category, now).await {
                Ok(Some(_)) => {
                    report.fresh += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => debug!("Quote cache unreadable during refresh of {}: {}", symbol, e),
            }

            self.quote_cache
                .remove(&accelerator::quote_key(&symbol, category));
            match self.resolve_quote(&symbol, category).await {
                Ok(_) => report.refreshed += 1,
                Err(e) => {
                    warn!("Refreshing quote for {} failed: {}", symbol, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Quote refresh: {} refreshed, {} still fresh, {} failed",
            report.refreshed, report.fresh, report.failed
        );
        Ok(report)
    }

    async fn backfill_history(&self) -> Result<Vec<BackfillReport>> {
        if !self.backfill.config().enabled {
            return Ok(vec![]);
        }

        let mut reports = Vec::new();
        for raw in &self.backfill.config().symbols {
            let symbol = match require_symbol(raw) {
                Ok(symbol) => symbol,
                Err(_) => continue,
            };
            let category = self.category_of(&symbol).await;
            match self.backfill.run(&symbol, category).await {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Backfill of {} failed: {}", symbol, e),
            }
        }
        Ok(reports)
    }
}
