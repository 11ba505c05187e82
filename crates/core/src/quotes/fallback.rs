//! Multi-tier fallback chain for point-in-time quotes.
//!
//! ```text
//! 1. Live            fetch_quote through the protector
//! 2. CachedRecency   latest stored record within lookback_days
//! 3. Recovery        backfill the last recovery_days, then the latest record
//! ```
//!
//! The first tier that yields a priced snapshot wins. When every tier comes
//! up empty the chain fails with `NoDataAvailable`.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use log::{debug, info, warn};

use vnmarket_market_data::{AssetCategory, QuoteSnapshot};

use super::model::{CachedQuote, QuoteTier};
use crate::config::FallbackConfig;
use crate::constants::CACHE_SOURCE;
use crate::errors::{Error, Result};
use crate::freshness::market_today;
use crate::history::{HistoricalCacheCoordinator, HistoryStore};
use crate::upstream::ProtectedUpstream;

pub struct FallbackChain {
    upstream: Arc<ProtectedUpstream>,
    history: Arc<dyn HistoryStore>,
    coordinator: Arc<HistoricalCacheCoordinator>,
    config: FallbackConfig,
}

impl FallbackChain {
    pub fn new(
        upstream: Arc<ProtectedUpstream>,
        history: Arc<dyn HistoryStore>,
        coordinator: Arc<HistoricalCacheCoordinator>,
        config: FallbackConfig,
    ) -> Self {
        Self {
            upstream,
            history,
            coordinator,
            config,
        }
    }

    pub async fn resolve(&self, symbol: &str, category: AssetCategory) -> Result<CachedQuote> {
        self.resolve_as_of(symbol, category, market_today())
            .await
    }

    pub async fn resolve_as_of(
        &self,
        symbol: &str,
        category: AssetCategory,
        today: NaiveDate,
    ) -> Result<CachedQuote> {
        if let Some(quote) = self.live(symbol, category).await {
            return Ok(CachedQuote {
                quote,
                tier: QuoteTier::Live,
            });
        }

        if let Some(quote) = self.cached_recency(symbol, category, today).await {
            info!("Serving {} from stored history ({})", symbol, quote.date);
            return Ok(CachedQuote {
                quote,
                tier: QuoteTier::CachedRecency,
            });
        }

        if let Some(quote) = self.recovery(symbol, category, today).await {
            info!("Serving {} from recovered history ({})", symbol, quote.date);
            return Ok(CachedQuote {
                quote,
                tier: QuoteTier::Recovery,
            });
        }

        warn!("All quote tiers exhausted for {} ({})", symbol, category);
        Err(Error::NoDataAvailable {
            symbol: symbol.to_string(),
        })
    }

    async fn live(&self, symbol: &str, category: AssetCategory) -> Option<QuoteSnapshot> {
        match self.upstream.fetch_quote(symbol, category).await {
            Ok(Some(quote)) if quote.has_price() => Some(quote),
            Ok(_) => {
                debug!("Live quote for {} was empty", symbol);
                None
            }
            Err(e) => {
                warn!("Live quote for {} failed: {}", symbol, e);
                None
            }
        }
    }

    async fn cached_recency(
        &self,
        symbol: &str,
        category: AssetCategory,
        today: NaiveDate,
    ) -> Option<QuoteSnapshot> {
        let lookback_start = today
            .checked_sub_days(Days::new(self.config.lookback_days as u64))
            .unwrap_or(NaiveDate::MIN);

        match self
            .history
            .latest_record_within(symbol, category, lookback_start, today)
            .await
        {
            Ok(record) => record.map(|r| QuoteSnapshot::from_record(&r, CACHE_SOURCE)),
            Err(e) => {
                warn!("Stored history lookup for {} failed: {}", symbol, e);
                None
            }
        }
    }

    async fn recovery(
        &self,
        symbol: &str,
        category: AssetCategory,
        today: NaiveDate,
    ) -> Option<QuoteSnapshot> {
        let start = today
            .checked_sub_days(Days::new(self.config.recovery_days as u64))
            .unwrap_or(NaiveDate::MIN);

        match self
            .coordinator
            .get_range_as_of(symbol, category, start, today, today)
            .await
        {
            Ok(records) => records
                .last()
                .map(|r| QuoteSnapshot::from_record(r, self.upstream.provider_id())),
            Err(e) => {
                debug!("History recovery for {} failed: {}", symbol, e);
                None
            }
        }
    }
}
