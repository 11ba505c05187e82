use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vnmarket_market_data::{AssetCategory, QuoteSnapshot};

/// Persistent quote cache row, keyed by `(symbol, category)`.
///
/// Overwritten on every refresh. Logically absent once `expires_at` has
/// passed; the scheduler removes it physically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteCacheEntry {
    pub symbol: String,
    pub category: AssetCategory,
    pub quote: QuoteSnapshot,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl QuoteCacheEntry {
    pub fn new(quote: QuoteSnapshot, cached_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            category: quote.category,
            quote,
            cached_at,
            expires_at,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Where a served quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteTier {
    /// In-memory accelerator hit
    Accelerator,
    /// Persistent quote cache hit
    QuoteCache,
    /// Fresh provider answer
    Live,
    /// Most recent stored daily record
    CachedRecency,
    /// Short history backfill, then the most recent record
    Recovery,
}

impl QuoteTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteTier::Accelerator => "ACCELERATOR",
            QuoteTier::QuoteCache => "QUOTE_CACHE",
            QuoteTier::Live => "LIVE",
            QuoteTier::CachedRecency => "CACHED_RECENCY",
            QuoteTier::Recovery => "RECOVERY",
        }
    }
}

/// A quote with the tier that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedQuote {
    pub quote: QuoteSnapshot,
    pub tier: QuoteTier,
}
