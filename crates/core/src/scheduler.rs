//! Background scheduler for cache maintenance.
//!
//! Runs three independent loops next to request handling:
//! - cleanup: drop expired accelerator entries and purge expired store rows
//! - refresh: keep quotes for popular symbols warm
//! - backfill: extend long histories a few batches per cycle
//!
//! On start it seeds the asset registry, runs one backfill cycle (and
//! optionally warms quotes) after a short delay. Failures are logged and
//! retried on the next cycle.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::config::SchedulerConfig;
use crate::service::MarketCacheServiceTrait;

/// How long `shutdown` waits for the loops before aborting them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct BackgroundScheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundScheduler {
    /// Spawn the warm-up task and the loops.
    pub fn start(service: Arc<dyn MarketCacheServiceTrait>, config: SchedulerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            "Background scheduler started (cleanup every {}s, refresh every {}s, backfill every {}s)",
            config.cleanup_interval_secs, config.refresh_interval_secs, config.backfill_interval_secs
        );

        let handles = vec![
            tokio::spawn(warm_up(service.clone(), config.clone(), shutdown_rx.clone())),
            tokio::spawn(cleanup_loop(service.clone(), config.clone(), shutdown_rx.clone())),
            tokio::spawn(refresh_loop(service.clone(), config.clone(), shutdown_rx.clone())),
            tokio::spawn(backfill_loop(service, config, shutdown_rx)),
        ];

        Self {
            shutdown_tx,
            handles,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// Signal the loops to stop and wait for them, aborting stragglers.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        for handle in self.handles {
            let abort = handle.abort_handle();
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("Scheduler task did not stop within {:?}, aborting", SHUTDOWN_GRACE);
                abort.abort();
            }
        }
        info!("Background scheduler stopped");
    }
}

/// Resolves once shutdown has been requested or the sender is gone.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn warm_up(
    service: Arc<dyn MarketCacheServiceTrait>,
    config: SchedulerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::select! {
        _ = sleep(Duration::from_secs(config.startup_delay_secs)) => {}
        _ = stopped(&mut shutdown) => return,
    }

    match service.seed(false).await {
        Ok(report) if report.skipped => debug!("Startup seed skipped, registry already populated"),
        Ok(report) => info!("Startup seed registered {} assets", report.total),
        Err(e) => warn!("Startup seed failed: {}", e),
    }

    run_backfill(service.as_ref()).await;

    if config.warm_quotes_on_start {
        if let Err(e) = service.refresh_quotes(&config.popular_symbols).await {
            warn!("Startup quote warming failed: {}", e);
        }
    }
}

async fn cleanup_loop(
    service: Arc<dyn MarketCacheServiceTrait>,
    config: SchedulerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_secs(config.cleanup_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; skip it
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stopped(&mut shutdown) => break,
        }

        match service.cleanup().await {
            Ok(report) => debug!("Cleanup cycle removed {} entries", report.total()),
            Err(e) => warn!("Cleanup cycle failed: {}", e),
        }
    }
    debug!("Cleanup loop stopped");
}

async fn refresh_loop(
    service: Arc<dyn MarketCacheServiceTrait>,
    config: SchedulerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let regular = Duration::from_secs(config.refresh_interval_secs);
    let retry = Duration::from_secs(config.refresh_retry_secs);
    let mut next = regular;

    loop {
        tokio::select! {
            _ = sleep(next) => {}
            _ = stopped(&mut shutdown) => break,
        }

        next = match service.refresh_quotes(&config.popular_symbols).await {
            Ok(report) if report.failed == 0 => regular,
            Ok(report) => {
                warn!(
                    "Quote refresh had {} failure(s), retrying in {:?}",
                    report.failed, retry
                );
                retry
            }
            Err(e) => {
                warn!("Quote refresh failed: {}, retrying in {:?}", e, retry);
                retry
            }
        };
    }
    debug!("Refresh loop stopped");
}

async fn run_backfill(service: &dyn MarketCacheServiceTrait) {
    match service.backfill_history().await {
        Ok(reports) => {
            for report in reports.iter().filter(|r| r.batches > 0) {
                info!(
                    "Backfill {}: {} batch(es), {} day(s) filled{}",
                    report.symbol,
                    report.batches,
                    report.filled_days,
                    if report.complete { ", complete" } else { "" }
                );
            }
        }
        Err(e) => warn!("Backfill cycle failed: {}", e),
    }
}

async fn backfill_loop(
    service: Arc<dyn MarketCacheServiceTrait>,
    config: SchedulerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_secs(config.backfill_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stopped(&mut shutdown) => break,
        }
        run_backfill(service.as_ref()).await;
    }
    debug!("Backfill loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Error, Result};
    use crate::history::BackfillReport;
    use crate::quotes::CachedQuote;
    use crate::seeder::SeedReport;
    use crate::service::{CleanupReport, RefreshReport, ServiceStats};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use vnmarket_market_data::{AssetSummary, HistoricalRecord};

    #[derive(Default)]
    struct CountingService {
        seeds: AtomicUsize,
        cleanups: AtomicUsize,
        refreshes: AtomicUsize,
        backfills: AtomicUsize,
        fail_refresh: AtomicBool,
    }

    #[async_trait]
    impl MarketCacheServiceTrait for CountingService {
        async fn get_quote(&self, symbol: &str) -> Result<CachedQuote> {
            Err(Error::NotFound(symbol.to_string()))
        }

        async fn get_history(
            &self,
            _symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<HistoricalRecord>> {
            Ok(vec![])
        }

        async fn search(&self, _query: &str) -> Result<Vec<AssetSummary>> {
            Ok(vec![])
        }

        async fn stats(&self) -> Result<ServiceStats> {
            Err(Error::NotFound("stats".to_string()))
        }

        async fn cleanup(&self) -> Result<CleanupReport> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Ok(CleanupReport::default())
        }

        async fn seed(&self, _force_refresh: bool) -> Result<SeedReport> {
            self.seeds.fetch_add(1, Ordering::SeqCst);
            Ok(SeedReport::default())
        }

        async fn refresh_quotes(&self, _symbols: &[String]) -> Result<RefreshReport> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail_refresh.load(Ordering::SeqCst) {
                return Err(Error::UpstreamUnavailable("down".to_string()));
            }
            Ok(RefreshReport::default())
        }

        async fn backfill_history(&self) -> Result<Vec<BackfillReport>> {
            self.backfills.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            cleanup_interval_secs: 1_800,
            refresh_interval_secs: 3_600,
            refresh_retry_secs: 300,
            startup_delay_secs: 5,
            popular_symbols: vec!["VNM".to_string()],
            warm_quotes_on_start: false,
            backfill_interval_secs: 3_600,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_run_on_their_intervals() {
        let service = Arc::new(CountingService::default());
        let scheduler = BackgroundScheduler::start(service.clone(), config());

        sleep(Duration::from_secs(6)).await;
        assert_eq!(service.seeds.load(Ordering::SeqCst), 1);
        assert_eq!(service.cleanups.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(1_800)).await;
        assert_eq!(service.cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(service.refreshes.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(1_800)).await;
        assert_eq!(service.cleanups.load(Ordering::SeqCst), 2);
        assert_eq!(service.refreshes.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_backfill_runs_after_seed_and_on_its_interval() {
        let service = Arc::new(CountingService::default());
        let scheduler = BackgroundScheduler::start(service.clone(), config());

        sleep(Duration::from_secs(6)).await;
        assert_eq!(service.backfills.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(3_600)).await;
        assert_eq!(service.backfills.load(Ordering::SeqCst), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_retries_sooner() {
        let service = Arc::new(CountingService::default());
        service.fail_refresh.store(true, Ordering::SeqCst);
        let scheduler = BackgroundScheduler::start(service.clone(), config());

        sleep(Duration::from_secs(3_601)).await;
        assert_eq!(service.refreshes.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(300)).await;
        assert_eq!(service.refreshes.load(Ordering::SeqCst), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loops() {
        let service = Arc::new(CountingService::default());
        let scheduler = BackgroundScheduler::start(service.clone(), config());
        assert!(scheduler.is_running());

        scheduler.shutdown().await;
        assert_eq!(service.seeds.load(Ordering::SeqCst), 0);
    }
}
