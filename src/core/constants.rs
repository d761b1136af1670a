// Timing and classification constants for the tracking core

use std::time::Duration;

/// Roster refresh period while the dashboard is in overview.
pub const ROSTER_POLL_INTERVAL: Duration = Duration::from_millis(10_000);

/// A device whose last report is older than this is offline.
pub const OFFLINE_THRESHOLD_SECS: i64 = 1800;

/// Every live batch is played out over this window, whatever its length.
pub const LIVE_BATCH_WINDOW: Duration = Duration::from_millis(5_000);

/// Replay tick period at speed factor 1.
pub const REPLAY_BASE_INTERVAL: Duration = Duration::from_millis(1_000);

/// Zoom applied when a vehicle is picked for live tracking.
pub const LIVE_ZOOM: u8 = 16;

// Slider range driven by replay progress
pub const PROGRESS_MAX: f64 = 100.0;

// Minimum history length worth replaying
pub const MIN_REPLAY_POINTS: usize = 2;

// User-facing messages
pub const MSG_NO_REPLAY_DATA: &str = "No data available for selected duration";
pub const MSG_REPLAY_FINISHED: &str = "Replay finished";
pub const MSG_SELECT_VEHICLE: &str = "Select a vehicle to replay";
pub const MSG_INVALID_RANGE: &str = "Start time must be before end time";
pub const MSG_UNKNOWN_VEHICLE: &str = "Vehicle not found";
pub const MSG_LIVE_UNAVAILABLE: &str = "Live tracking unavailable";

// Map overlay ids
pub const REPLAY_MARKER_ID: &str = "replay:vehicle";
pub const REPLAY_START_FLAG_ID: &str = "replay:start";
pub const REPLAY_STOP_FLAG_ID: &str = "replay:stop";
pub const REPLAY_PATH_ID: &str = "replay:path";
