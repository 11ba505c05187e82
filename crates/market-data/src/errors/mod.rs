//! Error types and retry classification for upstream provider calls.
//!
//! This module provides:
//! - [`MarketDataError`]: The error enum for every provider operation
//! - [`RetryClass`]: How the caching layer should react to a failure

mod retry;

pub use retry::RetryClass;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to an upstream provider.
///
/// Each variant is classified into a [`RetryClass`] via
/// [`retry_class`](Self::retry_class), which the fallback chain and the
/// historical coordinator use to decide between backing off and degrading
/// to cached data.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider does not know the symbol.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The provider cannot serve this asset category.
    #[error("Unsupported category: {0}")]
    UnsupportedCategory(String),

    /// The symbol exists but has no data in the requested period.
    #[error("No data for date range")]
    NoDataForRange,

    /// The provider rejected the call because of its own rate limiting.
    ///
    /// `message` keeps the raw provider text so the rate-limit protector
    /// can extract a stated retry delay from it.
    #[error("Throttled by {provider}: {message}")]
    Throttled {
        provider: String,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The call did not complete within its deadline.
    #[error("Timeout: {provider}")]
    Timeout { provider: String },

    /// A provider-specific failure (bad status, malformed payload, ...).
    #[error("Provider error: {provider} - {message}")]
    ProviderError { provider: String, message: String },

    /// The provider answered but the payload could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use vnmarket_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::Throttled {
    ///     provider: "VCI".to_string(),
    ///     message: "too many requests".to_string(),
    ///     retry_after: None,
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::SymbolNotFound(_) | Self::UnsupportedCategory(_) | Self::NoDataForRange => {
                RetryClass::Never
            }
            Self::Throttled { .. } => RetryClass::WithBackoff,
            Self::Timeout { .. }
            | Self::ProviderError { .. }
            | Self::Parse(_)
            | Self::Network(_) => RetryClass::Fallback,
        }
    }

    /// True when the provider signalled throttling.
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }

    /// True for "the provider legitimately has nothing" outcomes.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::NoDataForRange | Self::SymbolNotFound(_))
    }

    /// Short, stable name of the variant for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SymbolNotFound(_) => "symbol_not_found",
            Self::UnsupportedCategory(_) => "unsupported_category",
            Self::NoDataForRange => "no_data",
            Self::Throttled { .. } => "throttled",
            Self::Timeout { .. } => "timeout",
            Self::ProviderError { .. } => "provider_error",
            Self::Parse(_) => "parse",
            Self::Network(_) => "network",
        }
    }
}
