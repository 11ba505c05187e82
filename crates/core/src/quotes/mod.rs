//! Quote module.
//!
//! - [`model`] - Persistent quote cache entries and quote tiers
//! - [`store`] - Storage trait for the persistent quote cache
//! - [`fallback`] - Multi-tier fallback chain for point-in-time quotes

pub mod fallback;
pub mod model;
pub mod store;

#[cfg(test)]
mod fallback_tests;

pub use fallback::FallbackChain;
pub use model::{CachedQuote, QuoteCacheEntry, QuoteTier};
pub use store::QuoteCacheStore;
