use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grantob_core::analytics::{analyze_all, period_accuracy, AnalysisReport, PeriodStats};
use grantob_core::domain::stock::{Horizon, PricePoint, Stock, StockDataset};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = grantob_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let data_path = match settings.require_stock_data_path() {
        Ok(path) => Some(path.to_string()),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "STOCK_DATA_PATH missing; starting API in degraded mode");
            None
        }
    };

    let state = AppState {
        data_path,
        cache_ttl: settings.cache_ttl(),
        cache: Arc::new(tokio::sync::RwLock::new(DatasetCache::default())),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/stocks", get(get_stocks))
        .route("/api/stock/:ticker", get(get_stock))
        .route("/api/stock/:ticker/history", get(get_stock_history))
        .route("/api/analytics", get(get_analytics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    data_path: Option<String>,
    cache_ttl: Duration,
    cache: Arc<tokio::sync::RwLock<DatasetCache>>,
}

#[derive(Debug, Default)]
struct DatasetCache {
    loaded_at: Option<Instant>,
    dataset: Option<Arc<StockDataset>>,
}

/// Returns the cached dataset, reloading it from disk once the TTL has
/// passed. A failed reload falls back to the stale snapshot when one exists.
async fn cached_dataset(state: &AppState) -> Result<Arc<StockDataset>, StatusCode> {
    let Some(path) = &state.data_path else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    {
        let cache = state.cache.read().await;
        if let Some(dataset) = fresh_snapshot(&cache, state.cache_ttl) {
            return Ok(dataset);
        }
    }

    let mut cache = state.cache.write().await;
    // Another request may have reloaded while we waited for the write lock.
    if let Some(dataset) = fresh_snapshot(&cache, state.cache_ttl) {
        return Ok(dataset);
    }

    let path = path.clone();
    let loaded = tokio::task::spawn_blocking(move || grantob_core::dataset::load_dataset(&path))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "dataset load task failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match loaded {
        Ok(dataset) => {
            let dataset = Arc::new(dataset);
            cache.loaded_at = Some(Instant::now());
            cache.dataset = Some(Arc::clone(&dataset));
            Ok(dataset)
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "dataset reload failed");
            match &cache.dataset {
                Some(stale) => Ok(Arc::clone(stale)),
                None => Err(StatusCode::INTERNAL_SERVER_ERROR),
            }
        }
    }
}

fn fresh_snapshot(cache: &DatasetCache, ttl: Duration) -> Option<Arc<StockDataset>> {
    let loaded_at = cache.loaded_at?;
    let dataset = cache.dataset.as_ref()?;
    (loaded_at.elapsed() < ttl).then(|| Arc::clone(dataset))
}

async fn get_stocks(State(state): State<AppState>) -> Result<Json<StockDataset>, StatusCode> {
    let dataset = cached_dataset(&state).await?;
    Ok(Json(dataset.as_ref().clone()))
}

async fn get_stock(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Stock>, StatusCode> {
    let dataset = cached_dataset(&state).await?;
    let stock = dataset.get(&ticker).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(stock.clone()))
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    prices: Vec<PricePoint>,
    error: Option<&'static str>,
}

async fn get_stock_history(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<(StatusCode, Json<HistoryResponse>), StatusCode> {
    let dataset = cached_dataset(&state).await?;

    let Some(stock) = dataset.get(&ticker) else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(HistoryResponse {
                prices: Vec::new(),
                error: Some("Stock not found"),
            }),
        ));
    };

    if stock.weekly_prices.is_empty() {
        return Ok((
            StatusCode::OK,
            Json(HistoryResponse {
                prices: Vec::new(),
                error: Some("No historical data available"),
            }),
        ));
    }

    Ok((
        StatusCode::OK,
        Json(HistoryResponse {
            prices: stock.weekly_prices.clone(),
            error: None,
        }),
    ))
}

#[derive(Debug, Serialize)]
struct AnalyticsResponse {
    #[serde(flatten)]
    report: AnalysisReport,
    #[serde(rename = "periodAccuracy")]
    period_accuracy: BTreeMap<Horizon, PeriodStats>,
}

async fn get_analytics(
    State(state): State<AppState>,
) -> Result<Json<AnalyticsResponse>, StatusCode> {
    let dataset = cached_dataset(&state).await?;

    // The aggregation is a pure linear pass but can take a while on large
    // snapshots; keep it off the async worker threads.
    let response = tokio::task::spawn_blocking(move || {
        let report = analyze_all(&dataset);
        let period_accuracy = period_accuracy(&report);
        AnalyticsResponse {
            report,
            period_accuracy,
        }
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "analytics task failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(response))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &grantob_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
