// Fleet tracking core
// Roster polling, marker filtering and the live/replay session controller

pub mod core;

// Re-export main types
pub use core::device::Device;
pub use core::error::{Result, TrackerError};
pub use core::filter::{FilterCategory, FilteredRoster, MarkerFilterEngine};
pub use core::ports::{
    BatchStream, HistoryRequest, HistorySource, LiveFeed, LiveRequest, MapSurface, Notifier,
    RosterSource,
};
pub use core::replay::{ReplayStatus, SpeedFactor};
pub use core::session::{
    ActiveSources, Command, SessionHandle, SessionMode, SessionPorts, SessionSettings,
    SessionSnapshot, Tab,
};
pub use core::track::{Bounds, LatLng, ReplayHistory, TrackPoint};

#[cfg(test)]
mod tests {
    #[test]
    fn test_constants() {
        use crate::core::constants::*;
        assert_eq!(ROSTER_POLL_INTERVAL.as_millis(), 10_000);
        assert_eq!(OFFLINE_THRESHOLD_SECS, 1800);
        assert_eq!(LIVE_BATCH_WINDOW.as_millis(), 5_000);
    }
}
