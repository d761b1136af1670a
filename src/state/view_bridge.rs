use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

use fleet_tracker::{Bounds, LatLng, MapSurface, Notifier};

const VIEW_CHANNEL_CAPACITY: usize = 1024;

/// One drawing or notification command for the frontend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ViewEvent {
    Notify { message: String },
    SetView { center: LatLng, zoom: u8 },
    PlaceMarker { id: String, position: LatLng, transition_ms: u64 },
    RemoveMarker { id: String },
    FitBounds { bounds: Bounds },
    DrawPolyline { id: String, path: Vec<LatLng> },
    RemovePolyline { id: String },
}

/// Relays map and notification calls to every connected websocket.
#[derive(Clone)]
pub struct ViewBridge {
    tx: broadcast::Sender<ViewEvent>,
}

impl ViewBridge {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(VIEW_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.tx.subscribe()
    }

    fn emit(&self, event: ViewEvent) {
        // no listeners is fine: nothing is drawn
        if self.tx.send(event).is_err() {
            debug!("view event dropped, no frontend connected");
        }
    }
}

impl Default for ViewBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ViewBridge {
    fn notify(&self, message: &str) {
        self.emit(ViewEvent::Notify {
            message: message.to_string(),
        });
    }
}

impl MapSurface for ViewBridge {
    fn set_view(&self, center: LatLng, zoom: u8) {
        self.emit(ViewEvent::SetView { center, zoom });
    }

    fn place_marker(&self, id: &str, position: LatLng, transition: Duration) {
        self.emit(ViewEvent::PlaceMarker {
            id: id.to_string(),
            position,
            transition_ms: transition.as_millis() as u64,
        });
    }

    fn remove_marker(&self, id: &str) {
        self.emit(ViewEvent::RemoveMarker { id: id.to_string() });
    }

    fn fit_bounds(&self, bounds: &Bounds) {
        self.emit(ViewEvent::FitBounds { bounds: *bounds });
    }

    fn draw_polyline(&self, id: &str, path: &[LatLng]) {
        self.emit(ViewEvent::DrawPolyline {
            id: id.to_string(),
            path: path.to_vec(),
        });
    }

    fn remove_polyline(&self, id: &str) {
        self.emit(ViewEvent::RemovePolyline { id: id.to_string() });
    }
}
