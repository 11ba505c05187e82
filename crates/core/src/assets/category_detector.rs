//! Symbol → category detection.

use std::sync::Arc;

use log::warn;

use vnmarket_market_data::AssetCategory;

use super::assets_traits::AssetStore;
use crate::constants::{GOLD_SYMBOL, INDEX_SYMBOLS};

pub fn is_gold_symbol(symbol: &str) -> bool {
    let upper = symbol.trim().to_uppercase();
    upper.contains("GOLD") || upper == "SJC"
}

pub fn is_index_symbol(symbol: &str) -> bool {
    let upper = symbol.trim().to_uppercase();
    INDEX_SYMBOLS.contains(&upper.as_str())
}

/// Trim and upper-case a symbol. Every gold alias becomes `VN.GOLD`.
pub fn normalize_symbol(symbol: &str) -> String {
    if is_gold_symbol(symbol) {
        GOLD_SYMBOL.to_string()
    } else {
        symbol.trim().to_uppercase()
    }
}

/// A detected category and whether it can be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub category: AssetCategory,
    /// False when the asset store could not be read and the category is
    /// only the stock default.
    pub definitive: bool,
}

impl Detection {
    fn settled(category: AssetCategory) -> Self {
        Self {
            category,
            definitive: true,
        }
    }
}

/// Resolves the category of a symbol.
///
/// Order: gold patterns, the fixed index set, a stored asset record, and
/// finally stock.
pub struct CategoryDetector {
    assets: Arc<dyn AssetStore>,
}

impl CategoryDetector {
    pub fn new(assets: Arc<dyn AssetStore>) -> Self {
        Self { assets }
    }

    pub async fn detect(&self, symbol: &str) -> Detection {
        if is_gold_symbol(symbol) {
            return Detection::settled(AssetCategory::Gold);
        }
        if is_index_symbol(symbol) {
            return Detection::settled(AssetCategory::Index);
        }

        match self.assets.get_asset(&normalize_symbol(symbol)).await {
            Ok(Some(asset)) => Detection::settled(asset.category),
            Ok(None) => Detection::settled(AssetCategory::Stock),
            Err(e) => {
                warn!("Asset lookup failed for {}, assuming stock: {}", symbol, e);
                Detection {
                    category: AssetCategory::Stock,
                    definitive: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetRecord;
    use crate::test_support::MockStore;
    use chrono::Utc;
    use vnmarket_market_data::AssetSummary;

    #[tokio::test]
    async fn test_store_failure_is_not_definitive() {
        let store = MockStore::new();
        store
            .upsert_asset(AssetRecord::from_summary(
                &AssetSummary::new("VESAF", "VinaCapital VESAF", AssetCategory::Fund, "FMARKET"),
                Utc::now(),
            ))
            .await
            .unwrap();
        let detector = CategoryDetector::new(Arc::new(store.clone()));

        store.set_unavailable(true);
        let guess = detector.detect("VESAF").await;
        assert_eq!(guess.category, AssetCategory::Stock);
        assert!(!guess.definitive);

        store.set_unavailable(false);
        let found = detector.detect("vesaf").await;
        assert_eq!(found, Detection::settled(AssetCategory::Fund));
        assert!(detector.detect("SJC").await.definitive);
    }

    #[test]
    fn test_gold_detection() {
        assert!(is_gold_symbol("VN.GOLD"));
        assert!(is_gold_symbol("vn.gold.c"));
        assert!(is_gold_symbol("SJC"));
        assert!(!is_gold_symbol("SJS"));
        assert_eq!(normalize_symbol("sjc"), "VN.GOLD");
    }

    #[test]
    fn test_index_detection() {
        assert!(is_index_symbol("vnindex"));
        assert!(is_index_symbol("VN30"));
        assert!(is_index_symbol("UPCOMINDEX"));
        assert!(!is_index_symbol("VNM"));
        assert_eq!(normalize_symbol(" vnm "), "VNM");
    }
}
