use serde::Serialize;

use vnmarket_market_data::{AssetCategory, CallStats, ProtectorStats};

use crate::accelerator::AcceleratorStats;
use crate::history::HistoryCategoryStats;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorSection {
    pub quotes: AcceleratorStats,
    pub search: AcceleratorStats,
    pub general: AcceleratorStats,
}

/// Row counts of the durable store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub assets: u64,
    pub assets_by_category: Vec<(AssetCategory, u64)>,
    pub valid_quotes: u64,
    pub valid_searches: u64,
    pub history: Vec<HistoryCategoryStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub id: String,
    pub calls: Option<CallStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub accelerator: AcceleratorSection,
    pub protector: ProtectorStats,
    /// `None` while the store is unavailable.
    pub store: Option<StoreStats>,
    pub provider: ProviderSummary,
    /// Quote TTL per category, in seconds.
    pub freshness: Vec<(AssetCategory, u64)>,
    pub in_flight: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub accelerator_quotes: usize,
    pub accelerator_search: usize,
    pub accelerator_general: usize,
    pub quotes_purged: usize,
    pub searches_purged: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.accelerator_quotes
            + self.accelerator_search
            + self.accelerator_general
            + self.quotes_purged
            + self.searches_purged
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub refreshed: usize,
    /// Symbols whose cached quote was still valid.
    pub fresh: usize,
    pub failed: usize,
}
