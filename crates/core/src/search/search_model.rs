use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vnmarket_market_data::AssetSummary;

/// Cache key for a search query: trimmed and upper-cased.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCacheEntry {
    /// Normalized query
    pub query: String,
    pub results: Vec<AssetSummary>,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SearchCacheEntry {
    pub fn new(
        query: &str,
        results: Vec<AssetSummary>,
        cached_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            query: normalize_query(query),
            results,
            cached_at,
            expires_at,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_normalization() {
        assert_eq!(normalize_query("  vinamilk "), "VINAMILK");
        let now = Utc::now();
        let entry = SearchCacheEntry::new("fpt", vec![], now, now + chrono::Duration::seconds(10));
        assert_eq!(entry.query, "FPT");
        assert!(entry.is_valid_at(now));
        assert!(!entry.is_valid_at(now + chrono::Duration::seconds(10)));
    }
}
