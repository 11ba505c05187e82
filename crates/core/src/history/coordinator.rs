//! Historical cache coordinator.
//!
//! Serves date-range requests from the store and asks the provider only for
//! the dates the store has never seen. Settled days are immutable, so once a
//! range is covered it is served locally forever.
//!
//! The market's current day is provisional: its bar is returned to the
//! caller but never stored, so it is fetched again until the day closes.
//! A date is marked absent only when the provider answered a call covering
//! it without a record. Providers that page history (see
//! `UpstreamProvider::max_history_span`) are asked one piece at a time, each
//! piece gated by the protector and persisted before the next one.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, info, warn};

use vnmarket_market_data::{AssetCategory, HistoricalRecord};

use super::gaps::{coalesce_runs, missing_dates, plan_fetch, split_runs, DateRun, FetchStrategy};
use super::history_traits::HistoryStore;
use crate::config::HistoricalConfig;
use crate::errors::{Error, Result};
use crate::freshness::market_today;
use crate::singleflight::{history_key, SingleFlight};
use crate::upstream::ProtectedUpstream;

/// Outcome of one upstream window.
enum WindowOutcome {
    /// Fetched and merged into the store. Records for today are only
    /// carried back to the caller.
    Merged { provisional: Vec<HistoricalRecord> },
    /// Another caller filled the window while we waited.
    AlreadyCovered,
    /// Upstream call failed.
    Failed,
    /// The store failed mid-merge; the fetched records are kept in memory.
    StoreDown(Vec<HistoricalRecord>),
}

pub struct HistoricalCacheCoordinator {
    store: Arc<dyn HistoryStore>,
    upstream: Arc<ProtectedUpstream>,
    flights: Arc<SingleFlight>,
    config: HistoricalConfig,
}

impl HistoricalCacheCoordinator {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        upstream: Arc<ProtectedUpstream>,
        flights: Arc<SingleFlight>,
        config: HistoricalConfig,
    ) -> Self {
        Self {
            store,
            upstream,
            flights,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Number of dates in `[start, end]` the store has never seen.
    pub async fn unknown_days(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize> {
        let coverage = self.store.date_coverage(symbol, category, start, end).await?;
        Ok(missing_dates(&coverage, start, end).len())
    }

    /// Records for `[start, end]`, ascending, fetching only unknown dates.
    pub async fn get_range(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>> {
        self.get_range_as_of(symbol, category, start, end, market_today())
            .await
    }

    /// Same as [`get_range`](Self::get_range) with an explicit "today".
    pub async fn get_range_as_of(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>> {
        let end = end.min(today);
        if start > end {
            debug!("History request for {} starts after {}, nothing to serve", symbol, end);
            return Ok(vec![]);
        }

        let coverage = match self.store.date_coverage(symbol, category, start, end).await {
            Ok(coverage) => coverage,
            Err(e) if e.is_store_failure() => {
                warn!("History store unavailable for {}: {}. Fetching directly.", symbol, e);
                return self.fetch_direct(symbol, category, start, end).await;
            }
            Err(e) => return Err(e),
        };

        let plan = plan_fetch(&coverage, start, end, &self.config);
        if plan.strategy == FetchStrategy::Skip {
            debug!("History {} {}..{} fully covered", symbol, start, end);
            return self.read_range(symbol, category, start, end).await;
        }

        info!(
            "History {} {}..{}: {} missing day(s), strategy {:?}, {} call(s)",
            symbol,
            start,
            end,
            plan.missing.len(),
            plan.strategy,
            plan.windows.len()
        );

        let mut attempted = 0usize;
        let mut failed = 0usize;
        let mut unmerged: Option<Vec<HistoricalRecord>> = None;
        let mut provisional: Vec<HistoricalRecord> = Vec::new();

        for window in &plan.windows {
            match self.fill_window(symbol, category, *window, today).await {
                WindowOutcome::Merged { provisional: fresh } => {
                    attempted += 1;
                    provisional.extend(fresh);
                }
                WindowOutcome::AlreadyCovered => {}
                WindowOutcome::Failed => {
                    attempted += 1;
                    failed += 1;
                }
                WindowOutcome::StoreDown(records) => {
                    attempted += 1;
                    unmerged.get_or_insert_with(Vec::new).extend(records);
                }
            }
        }

        if let Some(mut records) = unmerged {
            records.extend(provisional);
            return Ok(in_range(records, start, end));
        }

        let mut records = self.read_range(symbol, category, start, end).await?;
        if !provisional.is_empty() {
            records.extend(provisional);
            records = in_range(records, start, end);
        }
        if records.is_empty() && attempted > 0 && failed == attempted {
            return Err(Error::NoDataAvailable {
                symbol: symbol.to_string(),
            });
        }
        Ok(records)
    }

    async fn fill_window(
        &self,
        symbol: &str,
        category: AssetCategory,
        window: DateRun,
        today: NaiveDate,
    ) -> WindowOutcome {
        let _flight = self
            .flights
            .acquire(&history_key(symbol, category, window.start, window.end))
            .await;

        // Re-check after acquiring: a concurrent caller may have filled it.
        let still_missing: Vec<NaiveDate> = match self
            .store
            .date_coverage(symbol, category, window.start, window.end)
            .await
        {
            Ok(coverage) => missing_dates(&coverage, window.start, window.end),
            Err(e) => {
                warn!("Coverage re-check failed for {}: {}", symbol, e);
                window.start.iter_days().take_while(|d| *d <= window.end).collect()
            }
        };
        if still_missing.is_empty() {
            debug!("History window {}..{} for {} filled concurrently", window.start, window.end, symbol);
            return WindowOutcome::AlreadyCovered;
        }

        let (unpublished, publishing): (Vec<NaiveDate>, Vec<NaiveDate>) = still_missing
            .into_iter()
            .partition(|d| !self.upstream.publishes_on(category, *d));
        self.mark_absent(
            symbol,
            category,
            unpublished.into_iter().filter(|d| *d < today).collect(),
        )
        .await;
        if publishing.is_empty() {
            return WindowOutcome::Merged {
                provisional: Vec::new(),
            };
        }

        let pieces = match self.upstream.history_span(category) {
            Some(span) => split_runs(&coalesce_runs(&publishing), span),
            None => vec![window],
        };

        let mut answered = 0usize;
        let mut fetched: Vec<HistoricalRecord> = Vec::new();
        let mut provisional: Vec<HistoricalRecord> = Vec::new();

        for piece in pieces {
            let mut records = match self
                .upstream
                .fetch_history(symbol, category, piece.start, piece.end)
                .await
            {
                Ok(records) => records,
                Err(e) => {
                    // Later pieces stay unknown and are retried next time
                    warn!(
                        "History fetch {}..{} for {} failed: {}",
                        piece.start, piece.end, symbol, e
                    );
                    break;
                }
            };
            answered += 1;
            records.retain(|r| piece.contains(r.date));

            let (settled, open): (Vec<HistoricalRecord>, Vec<HistoricalRecord>) =
                records.into_iter().partition(|r| r.date < today);
            fetched.extend(settled.iter().cloned());
            fetched.extend(open.iter().cloned());

            if !settled.is_empty() {
                match self.store.upsert_records(symbol, category, &settled).await {
                    Ok(inserted) => debug!("Stored {} new record(s) for {}", inserted, symbol),
                    Err(e @ Error::DataIntegrityConflict { .. }) => {
                        warn!("{}. Keeping the stored value.", e);
                    }
                    Err(e) => {
                        warn!("Could not persist history for {}: {}", symbol, e);
                        return WindowOutcome::StoreDown(fetched);
                    }
                }
            }

            let returned: HashSet<NaiveDate> = settled.iter().map(|r| r.date).collect();
            let absent: Vec<NaiveDate> = publishing
                .iter()
                .copied()
                .filter(|d| piece.contains(*d) && *d < today && !returned.contains(d))
                .collect();
            self.mark_absent(symbol, category, absent).await;
            provisional.extend(open);
        }

        if answered == 0 {
            return WindowOutcome::Failed;
        }
        WindowOutcome::Merged { provisional }
    }

    async fn mark_absent(&self, symbol: &str, category: AssetCategory, dates: Vec<NaiveDate>) {
        if dates.is_empty() {
            return;
        }
        match self.store.mark_absent(symbol, category, &dates).await {
            Ok(n) => debug!("Marked {} date(s) absent for {}", n, symbol),
            Err(e) => warn!("Could not mark absent dates for {}: {}", symbol, e),
        }
    }

    async fn read_range(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>> {
        let mut records = self.store.get_records(symbol, category, start, end).await?;
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    async fn fetch_direct(
        &self,
        symbol: &str,
        category: AssetCategory,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoricalRecord>> {
        let pieces = match self.upstream.history_span(category) {
            Some(span) => {
                let days: Vec<NaiveDate> = start
                    .iter_days()
                    .take_while(|d| *d <= end)
                    .filter(|d| self.upstream.publishes_on(category, *d))
                    .collect();
                split_runs(&coalesce_runs(&days), span)
            }
            None => vec![DateRun { start, end }],
        };

        let mut records = Vec::new();
        let mut answered = false;
        for piece in pieces {
            match self
                .upstream
                .fetch_history(symbol, category, piece.start, piece.end)
                .await
            {
                Ok(fetched) => {
                    answered = true;
                    records.extend(fetched);
                }
                Err(e) => {
                    warn!("Direct history fetch for {} failed: {}", symbol, e);
                    break;
                }
            }
        }

        if !answered {
            return Err(Error::NoDataAvailable {
                symbol: symbol.to_string(),
            });
        }
        Ok(in_range(records, start, end))
    }
}

/// Sorted, one record per date, within `[start, end]`.
fn in_range(mut records: Vec<HistoricalRecord>, start: NaiveDate, end: NaiveDate) -> Vec<HistoricalRecord> {
    records.retain(|r| r.date >= start && r.date <= end);
    records.sort_by_key(|r| r.date);
    records.dedup_by_key(|r| r.date);
    records
}
