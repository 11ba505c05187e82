//! SQLite storage for immutable daily history and absence markers.

mod model;
mod repository;

pub use model::HistoricalRecordDB;
pub use repository::HistoryRepository;
