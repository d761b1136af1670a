use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error};

use fleet_tracker::{Command, Device, FilterCategory, Tab};

use crate::state::app_state::AppState;

#[derive(Deserialize, Debug)]
pub struct FilterRequest {
    pub category: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    pub unique_id: String,
}

#[derive(Deserialize, Debug)]
pub struct TabRequest {
    pub tab: Tab,
}

/// RFC 3339 bounds of the replay window.
#[derive(Deserialize, Debug)]
pub struct ReplayRequest {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct SpeedRequest {
    pub factor: u32,
}

#[derive(Deserialize, Debug)]
pub struct SeekRequest {
    pub percent: f64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRequest {
    pub unique_id: String,
    pub selected: bool,
}

#[derive(Deserialize, Debug)]
pub struct SnapRequest {
    pub enabled: bool,
}

/// =======================
/// ROUTER
/// =======================

pub fn session_routes(state: AppState) -> Router {
    Router::new()
        .route("/session", get(get_session))
        .route("/roster", get(get_roster))
        .route("/session/filter", post(select_filter))
        .route("/session/select", post(select_device))
        .route("/session/deselect", post(deselect_device))
        .route("/session/tab", post(switch_tab))
        .route("/session/replay", post(request_replay))
        .route("/session/replay/pause", post(pause_replay))
        .route("/session/replay/resume", post(resume_replay))
        .route("/session/replay/speed", post(set_speed))
        .route("/session/replay/seek", post(seek_replay))
        .route("/session/markers", post(set_marker_selected))
        .route("/session/snap-to-road", post(set_snap_to_road))
        .with_state(state)
}

/// =======================
/// HANDLERS
/// =======================

async fn apply(state: &AppState, command: Command) -> Response {
    debug!("session command: {:?}", command);
    match state.session.request(command).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            error!("session command failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.snapshot())
}

async fn get_roster(State(state): State<AppState>) -> impl IntoResponse {
    let devices: Vec<Device> = state.session.snapshot().filtered.into_values().collect();
    Json(devices)
}

async fn select_filter(State(state): State<AppState>, Json(request): Json<FilterRequest>) -> Response {
    match request.category.parse::<FilterCategory>() {
        Ok(category) => apply(&state, Command::SelectFilter(category)).await,
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

async fn select_device(State(state): State<AppState>, Json(request): Json<SelectRequest>) -> Response {
    apply(&state, Command::SelectDevice(request.unique_id)).await
}

async fn deselect_device(State(state): State<AppState>) -> Response {
    apply(&state, Command::DeselectDevice).await
}

async fn switch_tab(State(state): State<AppState>, Json(request): Json<TabRequest>) -> Response {
    apply(&state, Command::SwitchTab(request.tab)).await
}

async fn request_replay(State(state): State<AppState>, Json(request): Json<ReplayRequest>) -> Response {
    let command = Command::RequestReplay {
        from: request.from.timestamp(),
        to: request.to.timestamp(),
    };
    apply(&state, command).await
}

async fn pause_replay(State(state): State<AppState>) -> Response {
    apply(&state, Command::PauseReplay).await
}

async fn resume_replay(State(state): State<AppState>) -> Response {
    apply(&state, Command::ResumeReplay).await
}

async fn set_speed(State(state): State<AppState>, Json(request): Json<SpeedRequest>) -> Response {
    apply(&state, Command::SetReplaySpeed(request.factor)).await
}

async fn seek_replay(State(state): State<AppState>, Json(request): Json<SeekRequest>) -> Response {
    apply(&state, Command::SeekReplay(request.percent)).await
}

async fn set_marker_selected(State(state): State<AppState>, Json(request): Json<MarkerRequest>) -> Response {
    let command = Command::SetMarkerSelected {
        id: request.unique_id,
        selected: request.selected,
    };
    apply(&state, command).await
}

async fn set_snap_to_road(State(state): State<AppState>, Json(request): Json<SnapRequest>) -> Response {
    apply(&state, Command::SetSnapToRoad(request.enabled)).await
}
