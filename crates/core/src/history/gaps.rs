//! Gap computation and fetch strategy selection.
//!
//! Given what the store knows about a range, work out which dates were never
//! fetched and how to ask for them with as few upstream calls as possible.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use super::history_model::DateCoverage;
use crate::config::HistoricalConfig;

/// A run of consecutive calendar days, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRun {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRun {
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> u64 {
        (self.end - self.start).num_days() as u64 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchStrategy {
    /// Nothing missing.
    Skip,
    /// One call per run of missing days.
    PerRange,
    /// One call for the whole requested range.
    FullRange,
    /// One call from the first to the last missing day.
    Spanning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub strategy: FetchStrategy,
    pub missing: Vec<NaiveDate>,
    /// Upstream calls to make, in date order.
    pub windows: Vec<DateRun>,
}

impl FetchPlan {
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Every date in `[start, end]` whose coverage is `Unknown`.
///
/// Dates absent from `coverage` count as unknown.
pub fn missing_dates(
    coverage: &BTreeMap<NaiveDate, DateCoverage>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| {
            !coverage
                .get(d)
                .map(|c| c.is_known())
                .unwrap_or(false)
        })
        .collect()
}

/// Coalesce sorted dates into runs of consecutive days.
pub fn coalesce_runs(dates: &[NaiveDate]) -> Vec<DateRun> {
    let mut runs: Vec<DateRun> = Vec::new();
    for &date in dates {
        match runs.last_mut() {
            Some(run) if run.end.checked_add_days(Days::new(1)) == Some(date) => run.end = date,
            _ => runs.push(DateRun::single(date)),
        }
    }
    runs
}

/// Cut runs into pieces of at most `max_days` days, in date order.
pub fn split_runs(runs: &[DateRun], max_days: u32) -> Vec<DateRun> {
    let step = u64::from(max_days.max(1));
    let mut pieces = Vec::new();
    for run in runs {
        let mut start = run.start;
        while start <= run.end {
            let end = start
                .checked_add_days(Days::new(step - 1))
                .map_or(run.end, |e| e.min(run.end));
            pieces.push(DateRun { start, end });
            match end.checked_add_days(Days::new(1)) {
                Some(next) => start = next,
                None => break,
            }
        }
    }
    pieces
}

/// Build the fetch plan for a request over `[start, end]`.
pub fn plan_fetch(
    coverage: &BTreeMap<NaiveDate, DateCoverage>,
    start: NaiveDate,
    end: NaiveDate,
    config: &HistoricalConfig,
) -> FetchPlan {
    let missing = missing_dates(coverage, start, end);
    let total = missing.len() as u32;

    let (strategy, windows) = match (missing.first(), missing.last()) {
        (Some(&first), Some(&last)) => {
            if total <= config.small_gap_days {
                (FetchStrategy::PerRange, coalesce_runs(&missing))
            } else if total >= config.large_gap_days {
                (FetchStrategy::FullRange, vec![DateRun { start, end }])
            } else {
                (
                    FetchStrategy::Spanning,
                    vec![DateRun {
                        start: first,
                        end: last,
                    }],
                )
            }
        }
        _ => (FetchStrategy::Skip, vec![]),
    };

    FetchPlan {
        strategy,
        missing,
        windows,
    }
}
