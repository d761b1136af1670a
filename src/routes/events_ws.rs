use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use fleet_tracker::SessionSnapshot;

use crate::state::app_state::AppState;
use crate::state::view_bridge::ViewEvent;

#[derive(Serialize)]
#[serde(tag = "channel", content = "payload", rename_all = "camelCase")]
enum Outbound<'a> {
    View(&'a ViewEvent),
    Session(&'a SessionSnapshot),
}

pub fn event_routes(state: AppState) -> Router {
    Router::new()
        .route("/events", get(ws_events))
        .with_state(state)
}

async fn ws_events(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_events(socket, state))
}

async fn send_json(socket: &mut WebSocket, message: &Outbound<'_>) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!("json serialize error: {}", e);
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Streams map commands and session snapshots until the client leaves.
pub async fn handle_ws_events(mut socket: WebSocket, state: AppState) {
    let client = Uuid::new_v4();
    info!("events stream opened: {}", client);

    let mut view = state.view.subscribe();
    let mut snapshots = state.session.watch();

    // current state first so a fresh client can render at once
    let initial = snapshots.borrow_and_update().clone();
    if !send_json(&mut socket, &Outbound::Session(&initial)).await {
        return;
    }

    loop {
        tokio::select! {
            event = view.recv() => match event {
                Ok(event) => {
                    if !send_json(&mut socket, &Outbound::View(&event)).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("events stream {} lagged, {} view events skipped", client, skipped);
                }
                Err(RecvError::Closed) => break,
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if !send_json(&mut socket, &Outbound::Session(&snapshot)).await {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!("events stream closed: {}", client);
}
