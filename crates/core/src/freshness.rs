//! Freshness policy: how long a cached quote stays valid, per category.
//!
//! Funds publish one NAV per day, so their quotes live a day. Everything
//! else is refreshed hourly. Trading days are counted on the exchange
//! calendar, see [`market_date`].

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use vnmarket_market_data::AssetCategory;

use crate::config::FreshnessConfig;
use crate::constants::MARKET_UTC_OFFSET_SECS;

/// Calendar date on the exchange at `now`.
///
/// Between 17:00 and 24:00 UTC the exchange is already on the next day.
pub fn market_date(now: DateTime<Utc>) -> NaiveDate {
    match FixedOffset::east_opt(MARKET_UTC_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).date_naive(),
        None => now.date_naive(),
    }
}

pub fn market_today() -> NaiveDate {
    market_date(Utc::now())
}

#[derive(Debug, Clone)]
pub struct FreshnessPolicy {
    fund: Duration,
    stock: Duration,
    index: Duration,
    gold: Duration,
}

impl FreshnessPolicy {
    pub fn new(config: &FreshnessConfig) -> Self {
        Self {
            fund: Duration::from_secs(config.fund_ttl_secs),
            stock: Duration::from_secs(config.stock_ttl_secs),
            index: Duration::from_secs(config.index_ttl_secs),
            gold: Duration::from_secs(config.gold_ttl_secs),
        }
    }

    pub fn ttl(&self, category: AssetCategory) -> Duration {
        match category {
            AssetCategory::Fund => self.fund,
            AssetCategory::Stock => self.stock,
            AssetCategory::Index => self.index,
            AssetCategory::Gold => self.gold,
        }
    }

    pub fn expires_at(&self, category: AssetCategory, cached_at: DateTime<Utc>) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.ttl(category)).unwrap_or(chrono::Duration::zero());
        cached_at + ttl
    }

    /// An entry is fresh strictly before its expiry instant.
    pub fn is_fresh(
        &self,
        category: AssetCategory,
        cached_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        now < self.expires_at(category, cached_at)
    }

    /// `(category, ttl_secs)` for every category, for stats.
    pub fn table(&self) -> Vec<(AssetCategory, u64)> {
        AssetCategory::ALL
            .iter()
            .map(|c| (*c, self.ttl(*c).as_secs()))
            .collect()
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(&FreshnessConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_ttls() {
        let policy = FreshnessPolicy::default();
        assert_eq!(policy.ttl(AssetCategory::Fund), Duration::from_secs(86_400));
        assert_eq!(policy.ttl(AssetCategory::Stock), Duration::from_secs(3_600));
        assert_eq!(policy.ttl(AssetCategory::Index), Duration::from_secs(3_600));
        assert_eq!(policy.ttl(AssetCategory::Gold), Duration::from_secs(3_600));
    }

    #[test]
    fn test_market_date_rolls_over_at_utc_seventeen() {
        let evening = Utc.with_ymd_and_hms(2025, 11, 5, 18, 30, 0).unwrap();
        let afternoon = Utc.with_ymd_and_hms(2025, 11, 5, 16, 59, 59).unwrap();

        assert_eq!(market_date(evening), NaiveDate::from_ymd_opt(2025, 11, 6).unwrap());
        assert_eq!(market_date(afternoon), NaiveDate::from_ymd_opt(2025, 11, 5).unwrap());
    }

    #[test]
    fn test_ttl_boundary() {
        let policy = FreshnessPolicy::default();
        let cached_at = Utc.with_ymd_and_hms(2025, 10, 15, 9, 0, 0).unwrap();

        for category in AssetCategory::ALL {
            let ttl = chrono::Duration::from_std(policy.ttl(category)).unwrap();
            let just_before = cached_at + ttl - chrono::Duration::seconds(1);
            let just_after = cached_at + ttl + chrono::Duration::seconds(1);

            assert!(policy.is_fresh(category, cached_at, just_before), "{}", category);
            assert!(!policy.is_fresh(category, cached_at, just_after), "{}", category);
        }
    }
}
