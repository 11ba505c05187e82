//! Cache layer configuration.
//!
//! Every tunable of the cache layer lives in [`CacheConfig`]. All sections
//! deserialize with defaults, so a partial JSON document only overrides the
//! keys it names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use vnmarket_market_data::RateLimitConfig;

use crate::constants::{GOLD_SYMBOL, POPULAR_SYMBOLS};
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub freshness: FreshnessConfig,
    pub accelerator: AcceleratorConfig,
    pub rate_limit: RateLimitSettings,
    pub historical: HistoricalConfig,
    pub fallback: FallbackConfig,
    pub scheduler: SchedulerConfig,
    pub provider: ProviderConfig,
    pub seed: SeedConfig,
    pub backfill: BackfillConfig,
}

/// Quote TTL per asset category, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    pub fund_ttl_secs: u64,
    pub stock_ttl_secs: u64,
    pub index_ttl_secs: u64,
    pub gold_ttl_secs: u64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            fund_ttl_secs: 86_400,
            stock_ttl_secs: 3_600,
            index_ttl_secs: 3_600,
            gold_ttl_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheBounds {
    pub max_entries: usize,
    pub ttl_secs: u64,
}

impl CacheBounds {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceleratorConfig {
    pub quotes: CacheBounds,
    pub search: CacheBounds,
    pub general: CacheBounds,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            quotes: CacheBounds {
                max_entries: 500,
                ttl_secs: 300,
            },
            search: CacheBounds {
                max_entries: 200,
                ttl_secs: 1_800,
            },
            general: CacheBounds {
                max_entries: 1_000,
                ttl_secs: 600,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub max_calls_per_minute: u32,
    pub max_calls_per_hour: u32,
    pub soft_threshold_pct: u8,
    pub smoothing_delay_ms: u64,
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub backoff_margin_secs: u64,
    /// Longest a caller waits for a slot before using cached data instead.
    pub slot_wait_timeout_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_calls_per_minute: 60,
            max_calls_per_hour: 500,
            soft_threshold_pct: 80,
            smoothing_delay_ms: 100,
            base_backoff_secs: 15,
            max_backoff_secs: 300,
            backoff_margin_secs: 1,
            slot_wait_timeout_secs: 60,
        }
    }
}

impl RateLimitSettings {
    pub fn to_protector_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_calls_per_minute: self.max_calls_per_minute,
            max_calls_per_hour: self.max_calls_per_hour,
            soft_threshold_pct: self.soft_threshold_pct,
            smoothing_delay: Duration::from_millis(self.smoothing_delay_ms),
            base_backoff: Duration::from_secs(self.base_backoff_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            backoff_margin: Duration::from_secs(self.backoff_margin_secs),
            enabled: self.enabled,
        }
    }

    pub fn slot_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.slot_wait_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalConfig {
    /// Missing-day totals at or below this use one call per gap.
    pub small_gap_days: u32,
    /// Missing-day totals at or above this refetch the whole range.
    pub large_gap_days: u32,
}

impl Default for HistoricalConfig {
    fn default() -> Self {
        Self {
            small_gap_days: 7,
            large_gap_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub lookback_days: u32,
    pub recovery_days: u32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            recovery_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub cleanup_interval_secs: u64,
    pub refresh_interval_secs: u64,
    pub refresh_retry_secs: u64,
    pub startup_delay_secs: u64,
    pub popular_symbols: Vec<String>,
    pub warm_quotes_on_start: bool,
    pub backfill_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 1_800,
            refresh_interval_secs: 3_600,
            refresh_retry_secs: 300,
            startup_delay_secs: 5,
            popular_symbols: POPULAR_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            warm_quotes_on_start: false,
            backfill_interval_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Seeding is skipped when more assets than this are already stored.
    pub skip_threshold: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            skip_threshold: 100,
        }
    }
}

/// Background history backfill, oldest batch first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    pub enabled: bool,
    pub symbols: Vec<String>,
    /// History is backfilled from January 1st of this year.
    pub start_year: i32,
    /// Calendar days per batch.
    pub batch_days: u32,
    /// Batches fetched per cycle; the rest waits for the next cycle.
    pub batches_per_cycle: u32,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            symbols: vec![GOLD_SYMBOL.to_string()],
            start_year: 2016,
            batch_days: 31,
            batches_per_cycle: 3,
        }
    }
}

impl CacheConfig {
    /// Parse a (possibly partial) JSON document over the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CacheConfig = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfigValue(format!("cache config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let accel = &self.accelerator;
        for (name, bounds) in [
            ("quotes", accel.quotes),
            ("search", accel.search),
            ("general", accel.general),
        ] {
            if bounds.max_entries == 0 {
                return Err(Error::InvalidConfigValue(format!(
                    "accelerator.{}.max_entries must be positive",
                    name
                )));
            }
        }

        let rl = &self.rate_limit;
        if rl.max_calls_per_minute == 0 || rl.max_calls_per_hour == 0 {
            return Err(Error::InvalidConfigValue(
                "rate_limit call windows must be positive".to_string(),
            ));
        }
        if rl.soft_threshold_pct == 0 || rl.soft_threshold_pct > 100 {
            return Err(Error::InvalidConfigValue(
                "rate_limit.soft_threshold_pct must be within 1..=100".to_string(),
            ));
        }

        let hist = &self.historical;
        if hist.small_gap_days >= hist.large_gap_days {
            return Err(Error::InvalidConfigValue(format!(
                "historical.small_gap_days ({}) must be below large_gap_days ({})",
                hist.small_gap_days, hist.large_gap_days
            )));
        }

        if self.fallback.lookback_days == 0 || self.fallback.recovery_days == 0 {
            return Err(Error::InvalidConfigValue(
                "fallback windows must be positive".to_string(),
            ));
        }

        let sched = &self.scheduler;
        if sched.cleanup_interval_secs == 0
            || sched.refresh_interval_secs == 0
            || sched.refresh_retry_secs == 0
            || sched.backfill_interval_secs == 0
        {
            return Err(Error::InvalidConfigValue(
                "scheduler intervals must be positive".to_string(),
            ));
        }

        let backfill = &self.backfill;
        if backfill.batch_days == 0 || backfill.batches_per_cycle == 0 {
            return Err(Error::InvalidConfigValue(
                "backfill batch sizes must be positive".to_string(),
            ));
        }
        if chrono::NaiveDate::from_ymd_opt(backfill.start_year, 1, 1).is_none() {
            return Err(Error::InvalidConfigValue(format!(
                "backfill.start_year {} is out of range",
                backfill.start_year
            )));
        }

        if self.provider.timeout_secs == 0 {
            return Err(Error::InvalidConfigValue(
                "provider.timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
