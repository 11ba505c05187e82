//! Search result cache.

mod search_model;
mod search_traits;

pub use search_model::{normalize_query, SearchCacheEntry};
pub use search_traits::SearchCacheStore;
