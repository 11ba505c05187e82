//! Resumable history backfill.
//!
//! Walks a symbol's history from January 1st of the configured year up to
//! yesterday in fixed-size batches, oldest first, through the coordinator.
//! Store coverage is the resume point: known batches are skipped without
//! calls, and a cycle stops at the first batch the provider could not
//! finish or once its batch budget is spent.

use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, info};
use serde::Serialize;

use vnmarket_market_data::AssetCategory;

use super::coordinator::HistoricalCacheCoordinator;
use super::gaps::{split_runs, DateRun};
use crate::config::BackfillConfig;
use crate::errors::{Error, Result};
use crate::freshness::market_today;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub symbol: String,
    /// Batches fetched this cycle.
    pub batches: usize,
    /// Dates that moved from unknown to present or absent.
    pub filled_days: usize,
    /// First batch still to do, when the cycle stopped early.
    pub resume_from: Option<NaiveDate>,
    pub complete: bool,
}

pub struct HistoryBackfill {
    coordinator: Arc<HistoricalCacheCoordinator>,
    config: BackfillConfig,
}

impl HistoryBackfill {
    pub fn new(coordinator: Arc<HistoricalCacheCoordinator>, config: BackfillConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    pub fn config(&self) -> &BackfillConfig {
        &self.config
    }

    pub async fn run(&self, symbol: &str, category: AssetCategory) -> Result<BackfillReport> {
        self.run_as_of(symbol, category, market_today()).await
    }

    pub async fn run_as_of(
        &self,
        symbol: &str,
        category: AssetCategory,
        today: NaiveDate,
    ) -> Result<BackfillReport> {
        let mut report = BackfillReport {
            symbol: symbol.to_string(),
            ..BackfillReport::default()
        };

        let first = NaiveDate::from_ymd_opt(self.config.start_year, 1, 1).ok_or_else(|| {
            Error::InvalidConfigValue(format!("backfill.start_year {}", self.config.start_year))
        })?;
        let Some(last) = today.pred_opt().filter(|last| *last >= first) else {
            report.complete = true;
            return Ok(report);
        };

        let budget = self.config.batches_per_cycle as usize;
        for batch in split_runs(&[DateRun { start: first, end: last }], self.config.batch_days) {
            let before = self
                .coordinator
                .unknown_days(symbol, category, batch.start, batch.end)
                .await?;
            if before == 0 {
                continue;
            }
            if report.batches >= budget {
                report.resume_from = Some(batch.start);
                debug!("Backfill {} used its {} batch(es), resuming at {}", symbol, budget, batch.start);
                return Ok(report);
            }

            report.batches += 1;
            if let Err(e) = self
                .coordinator
                .get_range_as_of(symbol, category, batch.start, batch.end, today)
                .await
            {
                debug!("Backfill {} {}..{}: {}", symbol, batch.start, batch.end, e);
            }

            let after = self
                .coordinator
                .unknown_days(symbol, category, batch.start, batch.end)
                .await?;
            report.filled_days += before.saturating_sub(after);
            if after > 0 {
                info!(
                    "Backfill {} paused at {}..{} with {} day(s) unknown",
                    symbol, batch.start, batch.end, after
                );
                report.resume_from = Some(batch.start);
                return Ok(report);
            }
        }

        report.complete = true;
        info!("Backfill {} complete from {}", symbol, first);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoricalConfig;
    use crate::singleflight::SingleFlight;
    use crate::test_support::{date, protected, record, MockProvider, MockStore};
    use rust_decimal_macros::dec;

    fn backfill(store: &MockStore, provider: &Arc<MockProvider>, batches_per_cycle: u32) -> HistoryBackfill {
        let coordinator = Arc::new(HistoricalCacheCoordinator::new(
            Arc::new(store.clone()),
            protected(provider.clone()),
            Arc::new(SingleFlight::new()),
            HistoricalConfig::default(),
        ));
        HistoryBackfill::new(
            coordinator,
            BackfillConfig {
                enabled: true,
                symbols: vec!["VN.GOLD".to_string()],
                start_year: 2025,
                batch_days: 7,
                batches_per_cycle,
            },
        )
    }

    #[tokio::test]
    async fn test_backfill_walks_batches_until_budget_then_resumes() {
        let store = MockStore::new();
        let provider = Arc::new(MockProvider::new());
        provider.set_history(
            "VN.GOLD",
            vec![record("VN.GOLD", AssetCategory::Gold, date(2025, 1, 2), dec!(84000000))],
        );
        // 2025-01-01..2025-01-21 is three batches of seven days
        let backfill = backfill(&store, &provider, 2);

        let first = backfill
            .run_as_of("VN.GOLD", AssetCategory::Gold, date(2025, 1, 22))
            .await
            .unwrap();
        assert_eq!(first.batches, 2);
        assert_eq!(first.filled_days, 14);
        assert_eq!(first.resume_from, Some(date(2025, 1, 15)));
        assert!(!first.complete);

        let second = backfill
            .run_as_of("VN.GOLD", AssetCategory::Gold, date(2025, 1, 22))
            .await
            .unwrap();
        assert_eq!(second.batches, 1);
        assert!(second.complete);
        assert_eq!(store.record_count(), 1);
        assert_eq!(store.marker_count(), 20);
        assert_eq!(provider.history_calls().len(), 3);

        // Nothing left to do
        let third = backfill
            .run_as_of("VN.GOLD", AssetCategory::Gold, date(2025, 1, 22))
            .await
            .unwrap();
        assert_eq!(third.batches, 0);
        assert_eq!(provider.history_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_backfill_stops_at_failed_day_and_resumes_there() {
        let store = MockStore::new();
        let provider = Arc::new(MockProvider::new());
        provider.set_history_span(1);
        provider.close_weekends();
        provider.fail_on(date(2025, 1, 9));
        let backfill = backfill(&store, &provider, 10);

        let first = backfill
            .run_as_of("VN.GOLD", AssetCategory::Gold, date(2025, 1, 15))
            .await
            .unwrap();
        assert_eq!(first.resume_from, Some(date(2025, 1, 8)));
        assert!(!first.complete);

        provider.recover(date(2025, 1, 9));
        let calls_before = provider.history_calls().len();
        let second = backfill
            .run_as_of("VN.GOLD", AssetCategory::Gold, date(2025, 1, 15))
            .await
            .unwrap();
        assert!(second.complete);

        // The first batch is not asked again
        let resumed = &provider.history_calls()[calls_before..];
        assert!(resumed.iter().all(|(_, start, _)| *start >= date(2025, 1, 8)));
    }

    #[tokio::test]
    async fn test_start_year_in_future_is_complete() {
        let store = MockStore::new();
        let provider = Arc::new(MockProvider::new());
        let report = backfill(&store, &provider, 1)
            .run_as_of("VN.GOLD", AssetCategory::Gold, date(2024, 6, 1))
            .await
            .unwrap();
        assert!(report.complete);
        assert!(provider.history_calls().is_empty());
    }
}
