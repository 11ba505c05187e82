use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vnmarket_market_data::{AssetCategory, AssetSummary};

use crate::constants::{DATA_SOURCE, DEFAULT_CURRENCY};

/// Identity and classification of an asset known to the cache.
///
/// Created on first discovery, updated on re-discovery, never deleted by
/// normal operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub symbol: String,
    pub name: String,
    pub category: AssetCategory,
    pub asset_class: String,
    pub asset_sub_class: String,
    pub exchange: String,
    pub currency: String,
    pub data_source: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssetRecord {
    /// Classify a provider summary into a record.
    pub fn from_summary(summary: &AssetSummary, now: DateTime<Utc>) -> Self {
        let (asset_class, asset_sub_class) = summary.category.classification();
        let currency = if summary.currency.is_empty() {
            DEFAULT_CURRENCY.to_string()
        } else {
            summary.currency.clone()
        };

        Self {
            symbol: summary.symbol.trim().to_uppercase(),
            name: summary.name.clone(),
            category: summary.category,
            asset_class: asset_class.to_string(),
            asset_sub_class: asset_sub_class.to_string(),
            exchange: summary.exchange.clone(),
            currency,
            data_source: DATA_SOURCE.to_string(),
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn to_summary(&self) -> AssetSummary {
        AssetSummary {
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            category: self.category,
            exchange: self.exchange.clone(),
            currency: self.currency.clone(),
        }
    }
}
