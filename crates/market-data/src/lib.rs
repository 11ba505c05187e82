//! VN Market Data Crate
//!
//! Upstream boundary of the VN market cache: the data models shared by every
//! layer, the provider trait, and the machinery that keeps provider call
//! volume in check.
//!
//! # Overview
//!
//! ```text
//! +------------------+     +---------------------+     +------------------+
//! |  caching layer   | --> | RateLimitProtector  | --> | LoggedProvider   |
//! +------------------+     +---------------------+     +------------------+
//!                                     ^                          |
//!                                     | throttle signals         v
//!                          +---------------------+     +------------------+
//!                          | ThrottleClassifier  | <-- | VnMarketProvider |
//!                          +---------------------+     +------------------+
//!                                                       (VCI, FMarket, SJC)
//! ```
//!
//! # Core Types
//!
//! - [`AssetCategory`] - Closed set of asset categories
//! - [`QuoteSnapshot`] - Point-in-time quote
//! - [`HistoricalRecord`] - One immutable day of history
//! - [`AssetSummary`] - Search and listing result
//! - [`UpstreamProvider`] - Trait every data source implements
//! - [`RateLimitProtector`] - Sliding-window call gate with adaptive backoff

pub mod errors;
pub mod models;
pub mod provider;
pub mod throttle;

pub use errors::{MarketDataError, RetryClass};
pub use models::{AssetCategory, AssetSummary, HistoricalRecord, QuoteSnapshot, DEFAULT_CURRENCY};
pub use provider::{CallStats, LoggedProvider, UpstreamProvider};
pub use throttle::{
    PhraseClassifier, ProtectorState, ProtectorStats, RateLimitConfig, RateLimitProtector,
    SlotDecision, ThrottleClassifier, ThrottleSignal,
};
