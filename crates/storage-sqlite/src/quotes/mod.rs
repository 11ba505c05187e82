//! SQLite storage for the persistent quote cache.

mod model;
mod repository;

pub use model::QuoteDB;
pub use repository::QuoteCacheRepository;
