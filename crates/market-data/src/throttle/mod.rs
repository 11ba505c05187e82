//! Throttle detection and call gating for upstream providers.
//!
//! - `classifier` - Recognizes throttling in raw provider text
//! - `protector` - Sliding-window rate-limit protector with adaptive backoff

mod classifier;
mod protector;

pub use classifier::{
    PhraseClassifier, ThrottleClassifier, ThrottleSignal, CONNECTION_PATTERNS, THROTTLE_PATTERNS,
    WAIT_PATTERNS,
};
pub use protector::{
    ProtectorState, ProtectorStats, RateLimitConfig, RateLimitProtector, SlotDecision,
    Utilization, WindowCounts,
};
