//! SQLite durable store for the VN market cache.
//!
//! Implements the storage traits of `vnmarket-core` with Diesel on SQLite:
//! - connection pooling, pragmas and embedded migrations ([`db`])
//! - a single writer actor that serializes every write ([`WriteHandle`])
//! - one repository per table
//!
//! # Architecture
//!
//! This crate is the only place where Diesel appears. `core` works against
//! the traits and never sees a connection.
//!
//! ```text
//!   core (AssetStore, QuoteCacheStore, SearchCacheStore, HistoryStore)
//!                  │
//!                  ▼
//!        storage-sqlite (this crate)
//!          readers: r2d2 pool
//!          writes:  WriteHandle ─► writer actor ─► one connection
//!                  │
//!                  ▼
//!              SQLite DB
//! ```

use std::sync::Arc;

use vnmarket_core::StoreHandles;

pub mod db;
pub mod errors;
pub mod schema;
mod utils;

pub mod assets;
pub mod history;
pub mod quotes;
pub mod search;

#[cfg(test)]
pub(crate) mod test_support;

pub use db::{
    create_pool, get_connection, get_db_path, init, run_migrations, spawn_writer, DbConnection,
    DbPool, WriteHandle,
};

pub use errors::{IntoCore, StorageError};

pub use assets::AssetRepository;
pub use history::HistoryRepository;
pub use quotes::QuoteCacheRepository;
pub use search::SearchCacheRepository;

pub use vnmarket_core::errors::{DatabaseError, Error, Result};

/// Build the four repositories the cache service needs, sharing one pool
/// and one writer.
pub fn store_handles(pool: Arc<DbPool>, writer: WriteHandle) -> StoreHandles {
    StoreHandles {
        assets: Arc::new(AssetRepository::new(pool.clone(), writer.clone())),
        quotes: Arc::new(QuoteCacheRepository::new(pool.clone(), writer.clone())),
        searches: Arc::new(SearchCacheRepository::new(pool.clone(), writer.clone())),
        history: Arc::new(HistoryRepository::new(pool, writer)),
    }
}
