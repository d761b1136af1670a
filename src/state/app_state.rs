use std::sync::Arc;

use tokio::sync::Notify;

use fleet_tracker::SessionHandle;

use crate::state::view_bridge::ViewBridge;

#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub view: ViewBridge,
    /// Fired by `/stop` to end `axum::serve` gracefully.
    pub shutdown: Arc<Notify>,
}

impl AppState {
    pub fn new(session: SessionHandle, view: ViewBridge) -> Self {
        Self {
            session,
            view,
            shutdown: Arc::new(Notify::new()),
        }
    }
}
