// Device roster records and staleness classification

use serde::{Deserialize, Serialize};

use crate::core::track::LatLng;

/// Last-known telemetry of one tracked asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub unique_id: String,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub speed: f64,
    /// Epoch seconds of the last report, `None` if the device never reported.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub halt_status: bool,
    #[serde(default)]
    pub idling_status: bool,
    #[serde(default)]
    pub is_no_gps: bool,
    #[serde(default)]
    pub is_primary_battery: Option<bool>,
    #[serde(default)]
    pub address: Option<String>,

    // Derived on every roster tick
    #[serde(default)]
    pub is_offline: bool,
    #[serde(default)]
    pub is_selected: bool,
}

impl Device {
    pub fn new(unique_id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            unique_id: unique_id.into(),
            vehicle_type: None,
            latitude,
            longitude,
            speed: 0.0,
            timestamp: None,
            halt_status: false,
            idling_status: false,
            is_no_gps: false,
            is_primary_battery: None,
            address: None,
            is_offline: false,
            is_selected: false,
        }
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    /// Never received any data. Distinct from offline.
    pub fn has_no_data(&self) -> bool {
        self.timestamp.is_none()
    }

    /// Offline or never reported.
    pub fn is_non_tracking(&self) -> bool {
        self.is_offline || self.has_no_data()
    }

    /// Main battery explicitly reported as disconnected. An unknown battery
    /// state counts as connected.
    pub fn is_battery_disconnected(&self) -> bool {
        self.is_primary_battery == Some(false)
    }

    pub fn classify(&mut self, now: i64, threshold_secs: i64) {
        self.is_offline = is_offline_at(self.timestamp, now, threshold_secs);
    }
}

pub fn is_offline_at(timestamp: Option<i64>, now: i64, threshold_secs: i64) -> bool {
    match timestamp {
        Some(ts) => now - ts > threshold_secs,
        None => false,
    }
}

/// Annotate a freshly fetched roster with `is_offline`.
pub fn classify_roster(devices: &mut [Device], now: i64, threshold_secs: i64) {
    for device in devices.iter_mut() {
        device.classify(now, threshold_secs);
    }
}

pub fn now_epoch_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
