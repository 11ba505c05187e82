//! SQLite storage for cached search results.

mod model;
mod repository;

pub use model::SearchResultDB;
pub use repository::SearchCacheRepository;
