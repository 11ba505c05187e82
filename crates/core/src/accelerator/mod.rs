//! Bounded in-process accelerator caches.
//!
//! Each instance is an LRU map with a per-entry TTL. Capacity eviction is
//! independent of expiry; expiry is checked lazily on read and in bulk by
//! the scheduler's cleanup cycle.

mod cache;
mod keys;

pub use cache::{AcceleratorCache, AcceleratorStats};
pub use keys::{category_key, invalidate_symbol, quote_key, search_key};
