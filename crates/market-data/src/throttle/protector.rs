//! Adaptive rate-limit protector for upstream provider calls.
//!
//! Tracks call cadence in per-minute and per-hour sliding windows and moves
//! through `Normal → Warn → Backoff → Normal`:
//!
//! - `Normal`: calls proceed immediately.
//! - `Warn`: a window crossed its soft threshold; calls are spaced by a
//!   small smoothing delay.
//! - `Backoff`: the provider signalled throttling; no call is permitted
//!   before `next_permitted_at`. Consecutive signals grow the wait
//!   exponentially up to a ceiling.
//!
//! The protector never fetches anything itself. It only gates calls and
//! reports timing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use serde::Serialize;

use super::classifier::{PhraseClassifier, ThrottleClassifier, ThrottleSignal};
use crate::errors::MarketDataError;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Rate limiter configuration.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub max_calls_per_minute: u32,
    pub max_calls_per_hour: u32,
    /// Percentage of a ceiling at which the protector enters `Warn`.
    pub soft_threshold_pct: u8,
    /// Spacing inserted between calls while in `Warn`.
    pub smoothing_delay: Duration,
    /// Backoff used for the first signal when the provider states no delay.
    pub base_backoff: Duration,
    /// Ceiling for exponential growth.
    pub max_backoff: Duration,
    /// Added on top of every computed backoff.
    pub backoff_margin: Duration,
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls_per_minute: 60,
            max_calls_per_hour: 500,
            soft_threshold_pct: 80,
            smoothing_delay: Duration::from_millis(100),
            base_backoff: Duration::from_secs(15),
            max_backoff: Duration::from_secs(300),
            backoff_margin: Duration::from_secs(1),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtectorState {
    Normal,
    Warn,
    Backoff,
}

/// Answer to [`RateLimitProtector::wait_for_slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDecision {
    /// A slot was claimed and the call is already counted; make it.
    Proceed,
    /// The required wait exceeds the caller's budget; serve cached data.
    UseFallback { wait: Duration },
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowCounts {
    pub per_minute: u32,
    pub per_hour: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Utilization {
    pub per_minute: f64,
    pub per_hour: f64,
}

/// Snapshot of the protector counters.
#[derive(Debug, Clone, Serialize)]
pub struct ProtectorStats {
    pub enabled: bool,
    pub state: ProtectorState,
    pub total_calls: u64,
    pub throttled_calls: u64,
    pub rejected_calls: u64,
    pub throttle_signals: u64,
    pub consecutive_throttles: u32,
    pub current_rates: WindowCounts,
    pub limits: WindowCounts,
    pub capacity: WindowCounts,
    pub utilization: Utilization,
    /// Milliseconds until the next call is permitted (0 when free).
    pub next_slot_in_ms: u64,
}

#[derive(Debug)]
struct State {
    minute_calls: VecDeque<Instant>,
    hour_calls: VecDeque<Instant>,
    last_call: Option<Instant>,
    mode: ProtectorState,
    consecutive_throttles: u32,
    next_permitted_at: Option<Instant>,
    total_calls: u64,
    throttled_calls: u64,
    rejected_calls: u64,
    throttle_signals: u64,
}

impl State {
    fn new() -> Self {
        Self {
            minute_calls: VecDeque::new(),
            hour_calls: VecDeque::new(),
            last_call: None,
            mode: ProtectorState::Normal,
            consecutive_throttles: 0,
            next_permitted_at: None,
            total_calls: 0,
            throttled_calls: 0,
            rejected_calls: 0,
            throttle_signals: 0,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.minute_calls.front() {
            if now.saturating_duration_since(oldest) >= MINUTE {
                self.minute_calls.pop_front();
            } else {
                break;
            }
        }
        while let Some(&oldest) = self.hour_calls.front() {
            if now.saturating_duration_since(oldest) >= HOUR {
                self.hour_calls.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Gatekeeper for every upstream provider call.
pub struct RateLimitProtector {
    config: RateLimitConfig,
    classifier: Arc<dyn ThrottleClassifier>,
    state: Mutex<State>,
}

impl RateLimitProtector {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_classifier(config, Arc::new(PhraseClassifier::new()))
    }

    pub fn with_classifier(config: RateLimitConfig, classifier: Arc<dyn ThrottleClassifier>) -> Self {
        Self {
            config,
            classifier,
            state: Mutex::new(State::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Lock the state mutex, recovering from poison if necessary.
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Rate-limit protector mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn soft_limit(&self, ceiling: u32) -> u32 {
        let soft = (ceiling as u64 * self.config.soft_threshold_pct as u64) / 100;
        (soft as u32).max(1)
    }

    /// Re-derive the state for `now`. Backoff expires once a full call
    /// window has passed since the last permitted instant.
    fn refresh(&self, state: &mut State, now: Instant) {
        state.prune(now);

        if state.mode == ProtectorState::Backoff {
            match state.next_permitted_at {
                Some(next) if now < next + MINUTE => return,
                _ => {
                    info!(
                        "Rate-limit protector leaving backoff after {} consecutive signal(s)",
                        state.consecutive_throttles
                    );
                    state.consecutive_throttles = 0;
                    state.next_permitted_at = None;
                }
            }
        }

        let minute = state.minute_calls.len() as u32;
        let hour = state.hour_calls.len() as u32;
        state.mode = if minute >= self.soft_limit(self.config.max_calls_per_minute)
            || hour >= self.soft_limit(self.config.max_calls_per_hour)
        {
            ProtectorState::Warn
        } else {
            ProtectorState::Normal
        };
    }

    fn wait_time(&self, state: &State, now: Instant) -> Duration {
        if !self.config.enabled {
            return Duration::ZERO;
        }

        if let Some(next) = state.next_permitted_at {
            if next > now {
                return next - now;
            }
        }

        if state.minute_calls.len() as u32 >= self.config.max_calls_per_minute {
            if let Some(&oldest) = state.minute_calls.front() {
                let remaining = MINUTE.saturating_sub(now.saturating_duration_since(oldest));
                return remaining
                    .max(Duration::from_millis(100))
                    .min(Duration::from_secs(5));
            }
        }

        if state.hour_calls.len() as u32 >= self.config.max_calls_per_hour {
            if let Some(&oldest) = state.hour_calls.front() {
                let remaining = HOUR.saturating_sub(now.saturating_duration_since(oldest));
                return remaining
                    .max(Duration::from_millis(500))
                    .min(Duration::from_secs(60));
            }
        }

        if state.mode == ProtectorState::Warn {
            if let Some(last) = state.last_call {
                let since = now.saturating_duration_since(last);
                if since < self.config.smoothing_delay {
                    return self.config.smoothing_delay - since;
                }
            }
        }

        Duration::ZERO
    }

    pub fn state(&self) -> ProtectorState {
        self.state_at(Instant::now())
    }

    fn state_at(&self, now: Instant) -> ProtectorState {
        let mut state = self.lock_state();
        self.refresh(&mut state, now);
        state.mode
    }

    /// True when a call made right now would have to wait.
    pub fn should_throttle(&self) -> bool {
        !self.time_until_slot_at(Instant::now()).is_zero()
    }

    pub fn time_until_slot(&self) -> Duration {
        self.time_until_slot_at(Instant::now())
    }

    fn time_until_slot_at(&self, now: Instant) -> Duration {
        let mut state = self.lock_state();
        self.refresh(&mut state, now);
        self.wait_time(&state, now)
    }

    /// The earliest instant at which a call is permitted, if one is pending.
    pub fn next_permitted_at(&self) -> Option<Instant> {
        self.lock_state().next_permitted_at
    }

    /// Suspend until a slot is free, or tell the caller to use its fallback
    /// when the required wait would exceed `budget`.
    ///
    /// `Proceed` claims the slot: the call is recorded under the same lock
    /// that found the slot free, so concurrent callers cannot overshoot the
    /// ceilings. The lock is never held across the sleep.
    pub async fn wait_for_slot(&self, budget: Duration) -> SlotDecision {
        let started = Instant::now();
        let mut counted = false;

        loop {
            let now = Instant::now();
            let wait = self.try_acquire_at(now);
            if wait.is_zero() {
                return SlotDecision::Proceed;
            }

            let elapsed = now.saturating_duration_since(started);
            if elapsed + wait > budget {
                let mut state = self.lock_state();
                state.rejected_calls += 1;
                debug!(
                    "Rate-limit protector rejecting call: wait {:?} exceeds budget {:?}",
                    wait, budget
                );
                return SlotDecision::UseFallback { wait };
            }

            if !counted {
                self.lock_state().throttled_calls += 1;
                counted = true;
            }
            debug!("Rate-limit protector waiting {:?} for a slot", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Claim a slot at `now` if one is free. Returns the remaining wait,
    /// zero when the call was recorded.
    fn try_acquire_at(&self, now: Instant) -> Duration {
        let mut state = self.lock_state();
        self.refresh(&mut state, now);
        let wait = self.wait_time(&state, now);
        if wait.is_zero() {
            self.push_call(&mut state, now);
        }
        wait
    }

    /// Record a provider call made without going through `wait_for_slot`.
    pub fn record_call(&self) {
        self.record_call_at(Instant::now());
    }

    fn record_call_at(&self, now: Instant) {
        let mut state = self.lock_state();
        self.push_call(&mut state, now);
    }

    fn push_call(&self, state: &mut State, now: Instant) {
        state.minute_calls.push_back(now);
        state.hour_calls.push_back(now);
        state.last_call = Some(now);
        state.total_calls += 1;
        self.refresh(state, now);
    }

    /// Record a throttling response from the provider and return the
    /// backoff imposed. The raw message is inspected for a stated delay.
    pub fn record_throttle_signal(&self, raw_message: &str) -> Duration {
        self.record_throttle_at(raw_message, None, Instant::now())
    }

    /// Feed a provider error into the protector. Returns `true` when it was
    /// recognized as throttling.
    pub fn observe_error(&self, error: &MarketDataError) -> bool {
        match error {
            MarketDataError::Throttled {
                message,
                retry_after,
                ..
            } => {
                self.record_throttle_at(message, *retry_after, Instant::now());
                true
            }
            other => {
                let message = other.to_string();
                if self.classifier.classify(&message).is_throttled() {
                    self.record_throttle_at(&message, None, Instant::now());
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_throttle_at(&self, raw_message: &str, hint: Option<Duration>, now: Instant) -> Duration {
        let stated = match self.classifier.classify(raw_message) {
            ThrottleSignal::Throttled { retry_after } => retry_after.or(hint),
            _ => hint,
        };

        let mut state = self.lock_state();
        self.refresh(&mut state, now);

        state.consecutive_throttles = state.consecutive_throttles.saturating_add(1);
        state.throttle_signals += 1;

        let exponent = (state.consecutive_throttles - 1).min(16);
        let grown = self
            .config
            .base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.config.max_backoff);
        let stated = stated.unwrap_or(Duration::ZERO);
        let wait = grown.max(stated) + self.config.backoff_margin;

        let candidate = now + wait;
        state.next_permitted_at = Some(match state.next_permitted_at {
            Some(existing) if existing > candidate => existing,
            _ => candidate,
        });
        state.mode = ProtectorState::Backoff;

        warn!(
            "Provider throttling detected (signal #{}, stated {:?}); backing off {:?}",
            state.consecutive_throttles, stated, wait
        );
        wait
    }

    pub fn stats(&self) -> ProtectorStats {
        self.stats_at(Instant::now())
    }

    fn stats_at(&self, now: Instant) -> ProtectorStats {
        let mut state = self.lock_state();
        self.refresh(&mut state, now);

        let per_minute = state.minute_calls.len() as u32;
        let per_hour = state.hour_calls.len() as u32;
        let utilization = |count: u32, limit: u32| {
            if limit == 0 {
                0.0
            } else {
                ((count as f64 / limit as f64) * 1000.0).round() / 10.0
            }
        };

        ProtectorStats {
            enabled: self.config.enabled,
            state: state.mode,
            total_calls: state.total_calls,
            throttled_calls: state.throttled_calls,
            rejected_calls: state.rejected_calls,
            throttle_signals: state.throttle_signals,
            consecutive_throttles: state.consecutive_throttles,
            current_rates: WindowCounts {
                per_minute,
                per_hour,
            },
            limits: WindowCounts {
                per_minute: self.config.max_calls_per_minute,
                per_hour: self.config.max_calls_per_hour,
            },
            capacity: WindowCounts {
                per_minute: self.config.max_calls_per_minute.saturating_sub(per_minute),
                per_hour: self.config.max_calls_per_hour.saturating_sub(per_hour),
            },
            utilization: Utilization {
                per_minute: utilization(per_minute, self.config.max_calls_per_minute),
                per_hour: utilization(per_hour, self.config.max_calls_per_hour),
            },
            next_slot_in_ms: self.wait_time(&state, now).as_millis() as u64,
        }
    }

    /// At or near capacity (more than 80% of either window used).
    pub fn is_at_capacity(&self) -> bool {
        let stats = self.stats();
        stats.utilization.per_minute > 80.0 || stats.utilization.per_hour > 80.0
    }

    pub fn reset_stats(&self) {
        let mut state = self.lock_state();
        state.total_calls = 0;
        state.throttled_calls = 0;
        state.rejected_calls = 0;
        state.throttle_signals = 0;
    }
}

impl Default for RateLimitProtector {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
