use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use vnmarket_core::freshness::market_today;
use vnmarket_core::history::BackfillReport;
use vnmarket_core::quotes::CachedQuote;
use vnmarket_core::seeder::SeedReport;
use vnmarket_core::service::{CleanupReport, ServiceStats};
use vnmarket_market_data::{AssetSummary, HistoricalRecord};

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

/// Range used when `start` is omitted from a history request.
const DEFAULT_HISTORY_DAYS: u64 = 30;

pub async fn healthz() -> &'static str {
    "ok"
}

async fn get_quote(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CachedQuote>> {
    let quote = state.cache_service.get_quote(&symbol).await?;
    Ok(Json(quote))
}

#[derive(Deserialize)]
struct HistoryParams {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

async fn get_history(
    Path(symbol): Path<String>,
    Query(params): Query<HistoryParams>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<HistoricalRecord>>> {
    let end = params.end.unwrap_or_else(market_today);
    let start = match params.start {
        Some(start) => start,
        None => end
            .checked_sub_days(Days::new(DEFAULT_HISTORY_DAYS))
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid end date {}", end)))?,
    };
    let records = state.cache_service.get_history(&symbol, start, end).await?;
    Ok(Json(records))
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

async fn search(
    Query(params): Query<SearchParams>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<AssetSummary>>> {
    let query = params
        .q
        .ok_or_else(|| ApiError::BadRequest("Missing query parameter q".to_string()))?;
    let results = state.cache_service.search(&query).await?;
    Ok(Json(results))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<ServiceStats>> {
    Ok(Json(state.cache_service.stats().await?))
}

async fn run_cleanup(State(state): State<Arc<AppState>>) -> ApiResult<Json<CleanupReport>> {
    Ok(Json(state.cache_service.cleanup().await?))
}

#[derive(Deserialize)]
struct SeedParams {
    #[serde(default)]
    force: bool,
}

async fn run_seed(
    Query(params): Query<SeedParams>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SeedReport>> {
    Ok(Json(state.cache_service.seed(params.force).await?))
}

async fn run_backfill(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<BackfillReport>>> {
    Ok(Json(state.cache_service.backfill_history().await?))
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/quote/{symbol}", get(get_quote))
        .route("/history/{symbol}", get(get_history))
        .route("/search", get(search))
        .route("/stats", get(get_stats))
        .route("/cleanup", post(run_cleanup))
        .route("/seed", post(run_seed))
        .route("/backfill", post(run_backfill));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}
