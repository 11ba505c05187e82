//! Search result models for symbol lookup.

use serde::{Deserialize, Serialize};

use super::category::AssetCategory;
use super::quote::DEFAULT_CURRENCY;

/// Result from a symbol search or a provider listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    /// Symbol (e.g., "VNM", "VESAF", "VN.GOLD")
    pub symbol: String,

    /// Display name (e.g., "Vinamilk")
    pub name: String,

    pub category: AssetCategory,

    /// Exchange or issuer board (e.g., "HOSE", "HNX", "FUND", "SJC")
    pub exchange: String,

    pub currency: String,
}

impl AssetSummary {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        category: AssetCategory,
        exchange: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            category,
            exchange: exchange.into(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Case-insensitive match on symbol or name.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.symbol.to_lowercase().contains(&query) || self.name.to_lowercase().contains(&query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_symbol_or_name() {
        let summary = AssetSummary::new("VNM", "Vinamilk", AssetCategory::Stock, "HOSE");
        assert!(summary.matches("vnm"));
        assert!(summary.matches("MILK"));
        assert!(!summary.matches("FPT"));
        assert_eq!(summary.currency, "VND");
    }
}
