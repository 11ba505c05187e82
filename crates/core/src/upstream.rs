//! Protected upstream client - the only path from the cache layer to the provider.
//!
//! Every call waits for a slot from the [`RateLimitProtector`], is recorded
//! against its windows, and feeds throttling errors back into it.
//!
//! ```text
//! coordinator / fallback / search / seeder
//!                  │
//!                  ▼
//!          ProtectedUpstream ──wait_for_slot──▶ RateLimitProtector
//!                  │                                   ▲
//!                  ▼                                   │ observe_error
//!          dyn UpstreamProvider ───────────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use log::debug;

use vnmarket_market_data::{
    AssetCategory, AssetSummary, CallStats, HistoricalRecord, MarketDataError, QuoteSnapshot,
    RateLimitProtector, SlotDecision, UpstreamProvider,
};

use crate::errors::{Error, Result};

pub struct ProtectedUpstream {
    provider: Arc<dyn UpstreamProvider>,
    protector: Arc<RateLimitProtector>,
    slot_wait: Duration,
}

impl ProtectedUpstream {
    pub fn new(
        provider: Arc<dyn UpstreamProvider>,
        protector: Arc<RateLimitProtector>,
        slot_wait: Duration,
    ) -> Self {
        Self {
            provider,
            protector,
            slot_wait,
        }
    }

    pub fn protector(&self) -> &Arc<RateLimitProtector> {
        &self.protector
    }

    pub fn provider_id(&self) -> &'static str {
        self.provider.id()
    }

    pub fn call_stats(&self) -> Option<CallStats> {
        self.provider.call_stats()
    }

    /// Longest range a single history call should cover for `category`.
    pub fn history_span(&self, category: AssetCategory) -> Option<u32> {
        self.provider.max_history_span(category).filter(|days| *days > 0)
    }

    pub fn publishes_on(&self, category: AssetCategory, date: NaiveDate) -> bool {
        self.provider.publishes_on(category, date)
    }

    async fn guarded<T, F, Fut>(&self, operation: &str, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, MarketDataError>>,
    {
        if let SlotDecision::UseFallback { wait } = self.protector.wait_for_slot(self.slot_wait).await {
            debug!("{} skipped: provider slot in {:?} exceeds budget", operation, wait);
            return Err(Error::UpstreamThrottled {
                message: format!("rate limit protector: next slot in {:?}", wait),
                retry_after: Some(wait),
            });
        }

        // Proceed already counted the call
        match call().await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.protector.observe_error(&e);
                Err(e.into())
            }
        }
    }

    pub async fn fetch_quote(
        &self,
        symbol: &str,
        category: AssetCategory,
    ) -> Result<Option<QuoteSnapshot>> {
        self.guarded("fetch_quote", || self.provider.fetch_quote(symbol, category))
            .await
    }

    /// `NoDataForRange` from the provider is reported as an empty result.
    pub async fn fetch_history(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>> {
        match self
            .guarded("fetch_history", || {
                self.provider.fetch_history(symbol, category, start, end)
            })
            .await
        {
            Err(Error::MarketData(MarketDataError::NoDataForRange)) => Ok(vec![]),
            other => other,
        }
    }

    pub async fn search_assets(&self, query: &str) -> Result<Vec<AssetSummary>> {
        self.guarded("search_assets", || self.provider.search_assets(query))
            .await
    }

    pub async fn list_assets(&self, category: AssetCategory) -> Result<Vec<AssetSummary>> {
        self.guarded("list_assets", || self.provider.list_assets(category))
            .await
    }
}
