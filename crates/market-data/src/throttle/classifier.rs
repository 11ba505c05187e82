//! Provider error classification.
//!
//! Upstream providers rarely return a clean HTTP 429. The Vietnamese data
//! sources answer with localized prose such as
//! `"Bạn đã gửi quá nhiều request tới misc. Vui lòng thử lại sau 15 giây."`,
//! so throttling is recognized by phrase tables rather than status codes.

use std::time::Duration;

use regex::Regex;

/// Phrases indicating the provider is rejecting calls for cadence reasons.
pub const THROTTLE_PATTERNS: &[&str] = &[
    "quá nhiều request",
    "request tới misc",
    "thử lại sau",
    "too many requests",
    "rate limit",
    "retry after",
];

/// A bare 429 status code. Word boundaries keep prices like 142900 out.
pub const STATUS_PATTERN: &str = r"\b429\b";

/// Phrases indicating a transport failure rather than throttling.
pub const CONNECTION_PATTERNS: &[&str] = &[
    "connection aborted",
    "remote end closed",
    "connection reset",
    "timeout",
    "network unreachable",
];

/// Patterns that capture a stated retry delay in seconds.
pub const WAIT_PATTERNS: &[&str] = &[r"(\d+)\s*giây", r"(\d+)\s*seconds?", r"(\d+)\s*sec"];

/// Outcome of classifying a raw provider message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleSignal {
    /// The provider is throttling; `retry_after` is the delay it stated, if any.
    Throttled { retry_after: Option<Duration> },
    /// Connection-level failure.
    Connection,
    /// Anything else.
    Other,
}

impl ThrottleSignal {
    pub fn is_throttled(&self) -> bool {
        matches!(self, ThrottleSignal::Throttled { .. })
    }
}

/// Classifies provider error text. Implement per provider or locale.
pub trait ThrottleClassifier: Send + Sync {
    fn classify(&self, message: &str) -> ThrottleSignal;
}

/// Table-driven classifier.
pub struct PhraseClassifier {
    throttle_phrases: Vec<String>,
    connection_phrases: Vec<String>,
    wait_patterns: Vec<Regex>,
    status_code: Option<Regex>,
}

impl PhraseClassifier {
    pub fn new() -> Self {
        Self {
            throttle_phrases: THROTTLE_PATTERNS.iter().map(|p| p.to_string()).collect(),
            connection_phrases: CONNECTION_PATTERNS.iter().map(|p| p.to_string()).collect(),
            wait_patterns: WAIT_PATTERNS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
            status_code: Regex::new(STATUS_PATTERN).ok(),
        }
    }

    /// Extend the throttle table with an extra phrase (matched lowercase).
    pub fn with_throttle_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.throttle_phrases.push(phrase.into().to_lowercase());
        self
    }

    /// Extract the first stated wait in the message, in seconds.
    pub fn parse_wait(&self, message: &str) -> Option<Duration> {
        let lower = message.to_lowercase();
        self.wait_patterns.iter().find_map(|re| {
            re.captures(&lower)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .map(Duration::from_secs)
        })
    }
}

impl Default for PhraseClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ThrottleClassifier for PhraseClassifier {
    fn classify(&self, message: &str) -> ThrottleSignal {
        let lower = message.to_lowercase();

        let status_429 = self.status_code.as_ref().is_some_and(|re| re.is_match(&lower));
        if status_429 || self.throttle_phrases.iter().any(|p| lower.contains(p)) {
            return ThrottleSignal::Throttled {
                retry_after: self.parse_wait(&lower),
            };
        }

        if self.connection_phrases.iter().any(|p| lower.contains(p)) {
            return ThrottleSignal::Connection;
        }

        ThrottleSignal::Other
    }
}
