// Boundaries to the backend, the notification sink and the map widget

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::core::device::Device;
use crate::core::error::Result;
use crate::core::track::{Bounds, LatLng, ReplayHistory, TrackPoint};

/// Unbounded sequence of live batches, in delivery order.
pub type BatchStream = BoxStream<'static, Result<Vec<TrackPoint>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveRequest {
    pub device_id: String,
    pub snap_to_road: bool,
}

/// Unix seconds are sent as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub unique_id: String,
    pub from: String,
    pub to: String,
}

impl HistoryRequest {
    pub fn new(unique_id: impl Into<String>, from: i64, to: i64) -> Self {
        Self {
            unique_id: unique_id.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch_roster(&self) -> Result<Vec<Device>>;
}

#[async_trait]
pub trait LiveFeed: Send + Sync {
    async fn subscribe(&self, request: LiveRequest) -> Result<BatchStream>;
}

#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<ReplayHistory>;
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Imperative drawing sink. Ids are chosen by the caller.
pub trait MapSurface: Send + Sync {
    fn set_view(&self, center: LatLng, zoom: u8);
    fn place_marker(&self, id: &str, position: LatLng, transition: Duration);
    fn remove_marker(&self, id: &str);
    fn fit_bounds(&self, bounds: &Bounds);
    fn draw_polyline(&self, id: &str, path: &[LatLng]);
    fn remove_polyline(&self, id: &str);
}
