use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs;
use tracing::{debug, error, warn};
use uuid::Uuid;

use fleet_tracker::SessionMode;

use crate::models::tracker_model::TrackerConfig;
use crate::state::app_state::AppState;
use crate::utils::conf_helper::get_cached_config;

static HEALTH_FAIL_COUNT: AtomicUsize = AtomicUsize::new(0);
const HEALTH_FAIL_LIMIT: usize = 3;

#[derive(Serialize)]
pub struct HealthStatus {
    status: &'static str,
    mode: SessionMode,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    #[serde(flatten)]
    config: &'static TrackerConfig,
    session_id: Uuid,
    generation: u64,
}

pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/health", get(health_check))
        .route("/info", get(info_check))
        .route("/stop", get(stop_process))
        .with_state(state)
}

async fn index_page() -> Response {
    fs::read_to_string("data/index.html")
        .await
        .map(Html)
        .map(IntoResponse::into_response)
        .unwrap_or_else(|e| {
            error!("Dashboard page read error: {}", e);
            StatusCode::NOT_FOUND.into_response()
        })
}

async fn info_check(State(state): State<AppState>) -> Response {
    let Some(config) = get_cached_config() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    let snapshot = state.session.snapshot();
    debug!("{} info requested", config.name);

    Json(ServiceInfo {
        config,
        session_id: snapshot.session_id,
        generation: snapshot.generation,
    })
    .into_response()
}

/// Healthy while the session controller task is alive. Repeated failures
/// trigger a graceful stop.
async fn health_check(State(state): State<AppState>) -> Response {
    if state.session.is_running() {
        HEALTH_FAIL_COUNT.store(0, Ordering::Relaxed);
        return Json(HealthStatus {
            status: "ok",
            mode: state.session.snapshot().mode,
        })
        .into_response();
    }

    let fails = HEALTH_FAIL_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
    error!("Health check failed ({}/{})", fails, HEALTH_FAIL_LIMIT);
    if fails >= HEALTH_FAIL_LIMIT {
        error!("Health check limit exceeded, stopping server");
        state.shutdown.notify_one();
    }
    StatusCode::SERVICE_UNAVAILABLE.into_response()
}

async fn stop_process(State(state): State<AppState>) -> impl IntoResponse {
    warn!("Stop endpoint called, shutting down");
    state.shutdown.notify_one();
    StatusCode::OK
}
