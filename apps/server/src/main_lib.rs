use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use vnmarket_core::{BackgroundScheduler, MarketCacheService, MarketCacheServiceTrait};
use vnmarket_market_data::provider::vn::VnMarketProvider;
use vnmarket_market_data::{LoggedProvider, UpstreamProvider};
use vnmarket_storage_sqlite::{create_pool, init, run_migrations, spawn_writer, store_handles};

use crate::config::Config;

pub struct AppState {
    pub cache_service: Arc<dyn MarketCacheServiceTrait>,
}

/// Everything `main` owns: the router state plus the handles needed to
/// shut down cleanly.
pub struct App {
    pub state: Arc<AppState>,
    pub service: Arc<MarketCacheService>,
    pub scheduler: BackgroundScheduler,
}

impl App {
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
        self.service.shutdown();
    }
}

pub fn init_tracing() {
    let log_format = std::env::var("VNM_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_app(config: &Config) -> anyhow::Result<App> {
    let db_path = init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = create_pool(&db_path)?;
    run_migrations(&pool)?;
    let writer = spawn_writer((*pool).clone());

    let provider: Arc<dyn UpstreamProvider> = Arc::new(LoggedProvider::with_timeout(
        VnMarketProvider::new(config.cache.provider.timeout())?,
        config.cache.provider.timeout(),
    ));

    let service = Arc::new(MarketCacheService::new(
        config.cache.clone(),
        store_handles(pool, writer),
        provider,
    )?);
    let cache_service: Arc<dyn MarketCacheServiceTrait> = service.clone();
    let scheduler = BackgroundScheduler::start(cache_service.clone(), config.cache.scheduler.clone());

    Ok(App {
        state: Arc::new(AppState { cache_service }),
        service,
        scheduler,
    })
}
