//! Facade over the whole cache layer.
//!
//! - [`model`] - Stats and report types
//! - [`traits`] - The `MarketCacheServiceTrait` contract
//! - [`service`] - `MarketCacheService`, wiring stores, caches and the provider

pub mod model;
pub mod service;
pub mod traits;


pub use model::{AcceleratorSection, CleanupReport, ProviderSummary, RefreshReport, ServiceStats, StoreStats};
pub use service::{MarketCacheService, StoreHandles};
pub use traits::MarketCacheServiceTrait;
