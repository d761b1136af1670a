// Device roster polling

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::device::{classify_roster, Device};
use crate::core::error::Result;
use crate::core::ports::RosterSource;
use crate::core::timer::RepeatingTimer;

/// Keeps the last roster snapshot and drives the periodic fetch. Fetch
/// results are handed to `on_result` tagged with the generation the poll was
/// started under; the owner applies them through [`DeviceRosterPoller::apply`].
pub struct DeviceRosterPoller {
    source: Arc<dyn RosterSource>,
    period: Duration,
    offline_threshold_secs: i64,
    timer: RepeatingTimer,
    roster: Vec<Device>,
    last_success: Option<i64>,
}

impl DeviceRosterPoller {
    pub fn new(source: Arc<dyn RosterSource>, period: Duration, offline_threshold_secs: i64) -> Self {
        Self {
            source,
            period,
            offline_threshold_secs,
            timer: RepeatingTimer::new(),
            roster: Vec::new(),
            last_success: None,
        }
    }

    /// Restarts polling if already running.
    pub fn start<F>(&mut self, generation: u64, on_result: F)
    where
        F: Fn(u64, Result<Vec<Device>>) + Send + Sync + 'static,
    {
        let source = self.source.clone();
        let on_result = Arc::new(on_result);
        debug!("roster polling every {:?} (generation {})", self.period, generation);

        self.timer.start(self.period, move || {
            let source = source.clone();
            let on_result = on_result.clone();
            async move {
                let result = source.fetch_roster().await;
                on_result(generation, result);
            }
        });
    }

    pub fn stop(&mut self) {
        if self.timer.stop() {
            debug!("roster polling stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_active()
    }

    /// Replaces the roster wholesale on success. A failed tick keeps the
    /// previous roster and returns `false`.
    pub fn apply(&mut self, result: Result<Vec<Device>>, now: i64) -> bool {
        match result {
            Ok(mut devices) => {
                classify_roster(&mut devices, now, self.offline_threshold_secs);
                debug!("roster tick: {} devices", devices.len());
                self.roster = devices;
                self.last_success = Some(now);
                true
            }
            Err(e) => {
                warn!("roster fetch failed, keeping previous roster: {}", e);
                false
            }
        }
    }

    pub fn roster(&self) -> &[Device] {
        &self.roster
    }

    pub fn device(&self, unique_id: &str) -> Option<&Device> {
        self.roster.iter().find(|d| d.unique_id == unique_id)
    }

    pub fn last_success(&self) -> Option<i64> {
        self.last_success
    }
}
