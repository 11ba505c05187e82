//! Core error types for the VN market cache.
//!
//! This module defines storage-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer,
//! and upstream provider errors are mapped onto the throttled/unavailable split
//! the fallback logic works with.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use vnmarket_market_data::{AssetCategory, MarketDataError};

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the cache layer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream provider is throttling: {message}")]
    UpstreamThrottled {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Upstream provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Durable store unavailable: {0}")]
    StoreUnavailable(String),

    /// A historical record for an already-stored date differs from the
    /// stored one. The stored value is kept.
    #[error("Data integrity conflict for {symbol} ({category}) on {date}: {detail}")]
    DataIntegrityConflict {
        symbol: String,
        category: AssetCategory,
        date: NaiveDate,
        detail: String,
    },

    #[error("No data available for {symbol}")]
    NoDataAvailable { symbol: String },

    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Market data operation failed: {0}")]
    MarketData(MarketDataError),

    #[error("Input validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Closed set of error kinds exposed to callers of the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceErrorKind {
    NotFound,
    Throttled,
    Unavailable,
    StoreUnavailable,
    Conflict,
    NoData,
    Invalid,
}

impl Error {
    pub fn kind(&self) -> ServiceErrorKind {
        match self {
            Error::NotFound(_) => ServiceErrorKind::NotFound,
            Error::UpstreamThrottled { .. } => ServiceErrorKind::Throttled,
            Error::UpstreamUnavailable(_) => ServiceErrorKind::Unavailable,
            Error::StoreUnavailable(_) | Error::Database(_) => ServiceErrorKind::StoreUnavailable,
            Error::DataIntegrityConflict { .. } => ServiceErrorKind::Conflict,
            Error::NoDataAvailable { .. } => ServiceErrorKind::NoData,
            Error::MarketData(MarketDataError::NoDataForRange) => ServiceErrorKind::NoData,
            Error::MarketData(MarketDataError::SymbolNotFound(_)) => ServiceErrorKind::NotFound,
            Error::MarketData(MarketDataError::UnsupportedCategory(_)) => ServiceErrorKind::Invalid,
            Error::MarketData(_) => ServiceErrorKind::Unavailable,
            Error::Validation(_) | Error::InvalidConfigValue(_) => ServiceErrorKind::Invalid,
        }
    }

    /// True for conditions where the durable store could not be used.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_) | Error::Database(_))
    }

    /// True for upstream conditions the cache layer recovers from locally.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            Error::UpstreamThrottled { .. } | Error::UpstreamUnavailable(_)
        )
    }
}

impl From<MarketDataError> for Error {
    fn from(err: MarketDataError) -> Self {
        match err {
            MarketDataError::Throttled {
                message,
                retry_after,
                ..
            } => Error::UpstreamThrottled {
                message,
                retry_after,
            },
            MarketDataError::SymbolNotFound(symbol) => Error::NotFound(symbol),
            MarketDataError::Timeout { .. }
            | MarketDataError::ProviderError { .. }
            | MarketDataError::Parse(_)
            | MarketDataError::Network(_) => Error::UpstreamUnavailable(err.to_string()),
            other => Error::MarketData(other),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(err.to_string())
    }
}

impl From<chrono::ParseError> for Error {
    fn from(err: chrono::ParseError) -> Self {
        Error::Validation(err.to_string())
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
