//! VN Market Core - the cache layer in front of the Vietnamese market data provider.
//!
//! This crate holds the domain logic and is storage-agnostic: it defines the
//! store traits that `storage-sqlite` implements, and drives the upstream
//! provider defined in `market-data` through a rate-limit protector.
//!
//! ```text
//!                   MarketCacheService
//!                           │
//!        ┌──────────────────┼───────────────────────┐
//!        ▼                  ▼                       ▼
//!  AcceleratorCache   QuoteCacheStore /      FallbackChain
//!   (LRU + TTL)       SearchCacheStore    (live → recency → recovery)
//!                                                   │
//!                                   HistoricalCacheCoordinator
//!                                                   │
//!                                  SingleFlight + ProtectedUpstream
//! ```

pub mod accelerator;
pub mod assets;
pub mod config;
pub mod constants;
pub mod errors;
pub mod freshness;
pub mod history;
pub mod quotes;
pub mod scheduler;
pub mod search;
pub mod seeder;
pub mod service;
pub mod singleflight;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::CacheConfig;
pub use errors::{DatabaseError, Error, Result, ServiceErrorKind};
pub use scheduler::BackgroundScheduler;
pub use service::{MarketCacheService, MarketCacheServiceTrait, StoreHandles};
