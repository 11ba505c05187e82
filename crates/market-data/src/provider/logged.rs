//! Call-logging middleware for upstream providers.
//!
//! `LoggedProvider` wraps any [`UpstreamProvider`], bounds every call with a
//! timeout and emits one structured `tracing` record per call with the
//! fields `provider`, `method`, `status` and `duration_ms`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::traits::UpstreamProvider;
use crate::errors::MarketDataError;
use crate::models::{AssetCategory, AssetSummary, HistoricalRecord, QuoteSnapshot};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Counters of provider calls made through the middleware.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CallStats {
    pub calls: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub throttled: u64,
}

#[derive(Default)]
struct Counters {
    calls: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    throttled: AtomicU64,
}

pub struct LoggedProvider<P> {
    inner: P,
    timeout: Duration,
    counters: Counters,
}

impl<P: UpstreamProvider> LoggedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self::with_timeout(inner, DEFAULT_CALL_TIMEOUT)
    }

    pub fn with_timeout(inner: P, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            counters: Counters::default(),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn call_stats(&self) -> CallStats {
        CallStats {
            calls: self.counters.calls.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            throttled: self.counters.throttled.load(Ordering::Relaxed),
        }
    }

    async fn observe<T, F>(&self, method: &'static str, subject: &str, call: F) -> Result<T, MarketDataError>
    where
        F: Future<Output = Result<T, MarketDataError>> + Send,
    {
        let provider = self.inner.id();
        let started = Instant::now();
        self.counters.calls.fetch_add(1, Ordering::Relaxed);

        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                Err(MarketDataError::Timeout {
                    provider: provider.to_string(),
                })
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => {
                info!(provider, method, subject, status = "ok", duration_ms, "provider call");
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                if e.is_throttled() {
                    self.counters.throttled.fetch_add(1, Ordering::Relaxed);
                }
                warn!(
                    provider,
                    method,
                    subject,
                    status = "error",
                    error_type = e.kind(),
                    duration_ms,
                    error = %e,
                    "provider call failed"
                );
            }
        }

        result
    }
}

#[async_trait]
impl<P: UpstreamProvider> UpstreamProvider for LoggedProvider<P> {
    fn id(&self) -> &'static str {
        self.inner.id()
    }

    fn call_stats(&self) -> Option<CallStats> {
        Some(LoggedProvider::call_stats(self))
    }

    fn max_history_span(&self, category: AssetCategory) -> Option<u32> {
        self.inner.max_history_span(category)
    }

    fn publishes_on(&self, category: AssetCategory, date: NaiveDate) -> bool {
        self.inner.publishes_on(category, date)
    }

    async fn fetch_quote(
        &self,
        symbol: &str,
        category: AssetCategory,
    ) -> Result<Option<QuoteSnapshot>, MarketDataError> {
        self.observe("fetch_quote", symbol, self.inner.fetch_quote(symbol, category))
            .await
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>, MarketDataError> {
        self.observe(
            "fetch_history",
            symbol,
            self.inner.fetch_history(symbol, category, start, end),
        )
        .await
    }

    async fn search_assets(&self, query: &str) -> Result<Vec<AssetSummary>, MarketDataError> {
        self.observe("search_assets", query, self.inner.search_assets(query))
            .await
    }

    async fn list_assets(
        &self,
        category: AssetCategory,
    ) -> Result<Vec<AssetSummary>, MarketDataError> {
        self.observe("list_assets", category.as_str(), self.inner.list_assets(category))
            .await
    }
}
