//! Market data models
//!
//! - `category` - Closed set of asset categories (AssetCategory)
//! - `quote` - Point-in-time quote data (QuoteSnapshot)
//! - `history` - Daily historical records (HistoricalRecord)
//! - `search` - Search and listing results (AssetSummary)

mod category;
mod history;
mod quote;
mod search;

pub use category::AssetCategory;
pub use history::HistoricalRecord;
pub use quote::{QuoteSnapshot, DEFAULT_CURRENCY};
pub use search::AssetSummary;
