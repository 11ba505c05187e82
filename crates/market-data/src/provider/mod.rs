//! Upstream provider abstraction and implementations.
//!
//! This module contains:
//! - The `UpstreamProvider` trait consumed by the caching layer
//! - `LoggedProvider`, call-logging and timeout middleware
//! - `vn`, the concrete provider for Vietnamese stocks, indices, funds and gold

mod logged;
mod traits;

pub mod vn;

pub use logged::{CallStats, LoggedProvider, DEFAULT_CALL_TIMEOUT};
pub use traits::UpstreamProvider;
