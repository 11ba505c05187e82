//! Single-flight registry: one in-flight upstream fetch per request signature.
//!
//! Concurrent identical cold requests serialize on a per-key async lock. The
//! first holder fetches and writes through; later holders re-check the
//! caches after acquiring and usually find the data already there.
//!
//! Keys are request signatures such as `quote:VNM:STOCK` or
//! `history:VNM:STOCK:2025-10-01:2025-10-31`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use log::warn;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use vnmarket_market_data::AssetCategory;

pub fn quote_key(symbol: &str, category: AssetCategory) -> String {
    format!("quote:{}:{}", symbol, category)
}

pub fn history_key(symbol: &str, category: AssetCategory, start: NaiveDate, end: NaiveDate) -> String {
    format!("history:{}:{}:{}:{}", symbol, category, start, end)
}

type Registry = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

#[derive(Default)]
pub struct SingleFlight {
    locks: Registry,
}

/// Held while the owner performs the fetch. Dropping it releases the key
/// and prunes the registry entry when nobody else waits on it.
pub struct FlightGuard {
    registry: Registry,
    key: String,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = lock_registry(&self.registry);
        // The map and this guard are the only holders when idle
        let idle = map
            .get(&self.key)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(&self.lock) == 2);
        if idle {
            map.remove(&self.key);
        }
    }
}

fn lock_registry(
    registry: &Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
    registry.lock().unwrap_or_else(|poisoned| {
        warn!("Single-flight registry mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_map(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        lock_registry(&self.locks)
    }

    /// Wait for exclusive ownership of `key`.
    pub async fn acquire(&self, key: &str) -> FlightGuard {
        let lock = {
            let mut map = self.lock_map();
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = lock.clone().lock_owned().await;
        FlightGuard {
            registry: self.locks.clone(),
            key: key.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn in_flight(&self) -> usize {
        self.lock_map().len()
    }
}
