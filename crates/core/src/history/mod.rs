//! Historical range cache.
//!
//! - [`history_model`] - Coverage states and per-category stats
//! - [`history_traits`] - Storage trait for immutable daily records
//! - [`gaps`] - Gap computation and fetch strategy selection
//! - [`coordinator`] - Incremental fetch-and-merge over the store
//! - [`backfill`] - Resumable batch backfill of long histories

pub mod backfill;
pub mod coordinator;
pub mod gaps;
pub mod history_model;
pub mod history_traits;

#[cfg(test)]
mod coordinator_tests;

pub use backfill::{BackfillReport, HistoryBackfill};
pub use coordinator::HistoricalCacheCoordinator;
pub use gaps::{coalesce_runs, missing_dates, plan_fetch, split_runs, DateRun, FetchPlan, FetchStrategy};
pub use history_model::{DateCoverage, HistoryCategoryStats};
pub use history_traits::HistoryStore;
