use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of asset categories served by the Vietnamese market providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetCategory {
    Stock,
    Fund,
    Index,
    Gold,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 4] = [
        AssetCategory::Stock,
        AssetCategory::Fund,
        AssetCategory::Index,
        AssetCategory::Gold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Stock => "STOCK",
            AssetCategory::Fund => "FUND",
            AssetCategory::Index => "INDEX",
            AssetCategory::Gold => "GOLD",
        }
    }

    /// `(asset_class, asset_sub_class)` used when persisting asset metadata.
    pub fn classification(&self) -> (&'static str, &'static str) {
        match self {
            AssetCategory::Fund => ("Investment Fund", "Mutual Fund"),
            AssetCategory::Stock => ("Equity", "Stock"),
            AssetCategory::Index => ("Index", "Market Index"),
            AssetCategory::Gold => ("Commodity", "Precious Metal"),
        }
    }
}

impl FromStr for AssetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "STOCK" => Ok(AssetCategory::Stock),
            "FUND" => Ok(AssetCategory::Fund),
            "INDEX" => Ok(AssetCategory::Index),
            "GOLD" => Ok(AssetCategory::Gold),
            _ => Err(format!("Unknown asset category: {}", s)),
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("fund".parse::<AssetCategory>(), Ok(AssetCategory::Fund));
        assert_eq!(" Gold ".parse::<AssetCategory>(), Ok(AssetCategory::Gold));
        assert!("crypto".parse::<AssetCategory>().is_err());
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            AssetCategory::Fund.classification(),
            ("Investment Fund", "Mutual Fund")
        );
        assert_eq!(
            AssetCategory::Gold.classification(),
            ("Commodity", "Precious Metal")
        );
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&AssetCategory::Index).unwrap();
        assert_eq!(json, "\"INDEX\"");
    }
}
