// Historical replay: prepared plan and timed playback cursor

use std::time::Duration;

use serde::Serialize;

use crate::core::constants::{MIN_REPLAY_POINTS, PROGRESS_MAX, REPLAY_BASE_INTERVAL};
use crate::core::error::{Result, TrackerError};
use crate::core::track::{Bounds, ReplayHistory, TrackPoint};

/// Everything derived once from a replay history fetch.
#[derive(Debug, Clone)]
pub struct ReplayPlan {
    points: Vec<TrackPoint>,
    step: f64,
    distance_km: f64,
    harsh_acceleration: Vec<TrackPoint>,
    harsh_braking: Vec<TrackPoint>,
}

impl ReplayPlan {
    /// `None` when the history is too short to replay.
    pub fn from_history(history: ReplayHistory) -> Option<Self> {
        let points = history.points;
        if points.len() < MIN_REPLAY_POINTS {
            return None;
        }

        let harsh_acceleration = points.iter().filter(|p| p.is_ha).cloned().collect();
        let harsh_braking = points.iter().filter(|p| p.is_hb).cloned().collect();

        Some(Self {
            step: PROGRESS_MAX / points.len() as f64,
            distance_km: history.distance_travelled_kms,
            harsh_acceleration,
            harsh_braking,
            points,
        })
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Slider percentage per point.
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn start_flag(&self) -> &TrackPoint {
        &self.points[0]
    }

    pub fn stop_flag(&self) -> &TrackPoint {
        &self.points[self.points.len() - 1]
    }

    pub fn harsh_acceleration(&self) -> &[TrackPoint] {
        &self.harsh_acceleration
    }

    pub fn harsh_braking(&self) -> &[TrackPoint] {
        &self.harsh_braking
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.points.iter().map(TrackPoint::position))
    }
}

/// User-selectable playback multiplier, at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpeedFactor(u32);

impl SpeedFactor {
    pub fn new(factor: u32) -> Result<Self> {
        if factor == 0 {
            return Err(TrackerError::InvalidSpeed(factor));
        }
        Ok(Self(factor))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn interval(&self, base: Duration) -> Duration {
        base / self.0
    }
}

impl Default for SpeedFactor {
    fn default() -> Self {
        Self(1)
    }
}

/// Outcome of one playback tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayStep {
    /// Replay not active; cursor reset.
    Idle,
    /// Paused; the caller must not re-arm.
    Paused,
    /// Every point has been shown.
    Finished,
    Emit {
        point: TrackPoint,
        transition: Duration,
        progress: f64,
        cursor: usize,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStatus {
    pub active: bool,
    pub paused: bool,
    pub finished: bool,
    pub cursor: usize,
    pub total: usize,
    pub progress: f64,
    pub speed: u32,
    pub interval_ms: u64,
    pub distance_km: Option<f64>,
}

#[derive(Debug)]
pub struct ReplayPlayback {
    plan: Option<ReplayPlan>,
    cursor: usize,
    total: usize,
    progress: f64,
    active: bool,
    paused: bool,
    finished: bool,
    speed: SpeedFactor,
    base_interval: Duration,
}

impl Default for ReplayPlayback {
    fn default() -> Self {
        Self::new(REPLAY_BASE_INTERVAL, SpeedFactor::default())
    }
}

impl ReplayPlayback {
    pub fn new(base_interval: Duration, speed: SpeedFactor) -> Self {
        Self {
            plan: None,
            cursor: 0,
            total: 0,
            progress: 0.0,
            active: false,
            paused: false,
            finished: false,
            speed,
            base_interval,
        }
    }

    /// Playback starts at cursor 0.
    pub fn load(&mut self, plan: ReplayPlan) {
        self.total = plan.len();
        self.plan = Some(plan);
        self.cursor = 0;
        self.progress = 0.0;
        self.active = true;
        self.paused = false;
        self.finished = false;
    }

    #[cfg(test)]
    pub fn plan(&self) -> Option<&ReplayPlan> {
        self.plan.as_ref()
    }

    pub fn interval(&self) -> Duration {
        self.speed.interval(self.base_interval)
    }

    pub fn set_speed(&mut self, speed: SpeedFactor) {
        self.speed = speed;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[cfg(test)]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn tick(&mut self) -> ReplayStep {
        if !self.active {
            self.cursor = 0;
            return ReplayStep::Idle;
        }
        if self.paused {
            return ReplayStep::Paused;
        }

        let Some(plan) = self.plan.as_ref() else {
            self.active = false;
            self.cursor = 0;
            return ReplayStep::Idle;
        };

        if self.cursor >= plan.len() {
            self.active = false;
            self.finished = true;
            // stats and flags go with the plan
            self.plan = None;
            return ReplayStep::Finished;
        }

        let point = plan.points[self.cursor].clone();
        self.progress = (self.progress + plan.step).min(PROGRESS_MAX);
        self.cursor += 1;

        ReplayStep::Emit {
            point,
            transition: self.interval(),
            progress: self.progress,
            cursor: self.cursor,
        }
    }

    /// Delay before the next tick, `None` when nothing should be scheduled.
    pub fn next_delay(&self) -> Option<Duration> {
        if self.active && !self.paused {
            Some(self.interval())
        } else {
            None
        }
    }

    pub fn pause(&mut self) -> bool {
        if !self.active || self.paused {
            return false;
        }
        self.paused = true;
        true
    }

    /// Returns `true` when the caller must re-arm the tick timer.
    pub fn resume(&mut self) -> bool {
        if !self.active || !self.paused {
            return false;
        }
        self.paused = false;
        true
    }

    /// Moves the cursor to the point at `percent` of the slider.
    pub fn seek(&mut self, percent: f64) -> bool {
        let Some(plan) = self.plan.as_ref() else {
            return false;
        };
        let percent = percent.clamp(0.0, PROGRESS_MAX);
        let index = ((percent / plan.step).floor() as usize).min(plan.len());
        self.cursor = index;
        self.progress = index as f64 * plan.step;
        true
    }

    pub fn stop(&mut self) {
        self.plan = None;
        self.cursor = 0;
        self.total = 0;
        self.progress = 0.0;
        self.active = false;
        self.paused = false;
        self.finished = false;
    }

    pub fn status(&self) -> ReplayStatus {
        ReplayStatus {
            active: self.active,
            paused: self.paused,
            finished: self.finished,
            cursor: self.cursor,
            total: self.total,
            progress: self.progress,
            speed: self.speed.get(),
            interval_ms: self.interval().as_millis() as u64,
            distance_km: self.plan.as_ref().map(ReplayPlan::distance_km),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize) -> ReplayHistory {
        ReplayHistory {
            distance_travelled_kms: 4.2,
            points: (0..n)
                .map(|i| TrackPoint::new(12.0 + i as f64 * 0.01, 77.0, 1_700_000_000 + i as i64))
                .collect(),
        }
    }

    fn loaded(n: usize) -> ReplayPlayback {
        let mut playback = ReplayPlayback::default();
        playback.load(ReplayPlan::from_history(history(n)).unwrap());
        playback
    }

    #[test]
    fn test_short_history_rejected() {
        assert!(ReplayPlan::from_history(history(0)).is_none());
        assert!(ReplayPlan::from_history(history(1)).is_none());
        assert!(ReplayPlan::from_history(history(2)).is_some());
    }

    #[test]
    fn test_plan_flags_and_harsh_subsets() {
        let mut h = history(5);
        h.points[1].is_ha = true;
        h.points[3].is_hb = true;
        h.points[4].is_ha = true;

        let plan = ReplayPlan::from_history(h).unwrap();
        assert_eq!(plan.step(), 20.0);
        assert_eq!(plan.start_flag().ts, 1_700_000_000);
        assert_eq!(plan.stop_flag().ts, 1_700_000_004);
        assert_eq!(plan.harsh_acceleration().len(), 2);
        assert_eq!(plan.harsh_braking().len(), 1);
        assert_eq!(plan.harsh_braking()[0].ts, 1_700_000_003);
    }

    #[test]
    fn test_ten_points_terminate_after_ten_advances() {
        let mut playback = loaded(10);

        for expected in 1..=10 {
            match playback.tick() {
                ReplayStep::Emit { cursor, transition, .. } => {
                    assert_eq!(cursor, expected);
                    assert_eq!(transition, Duration::from_millis(1000));
                }
                other => panic!("unexpected step {other:?}"),
            }
        }
        assert_eq!(playback.cursor(), 10);
        assert!((playback.progress() - 100.0).abs() < 1e-6);

        assert_eq!(playback.tick(), ReplayStep::Finished);
        assert!(playback.is_finished());
        assert!(!playback.is_active());
        assert!(playback.plan().is_none());
        assert_eq!(playback.next_delay(), None);

        // idle afterwards until a new plan is loaded
        assert_eq!(playback.tick(), ReplayStep::Idle);
    }

    #[test]
    fn test_pause_holds_cursor() {
        let mut playback = loaded(4);
        playback.tick();
        assert!(playback.pause());
        assert!(!playback.pause());

        assert_eq!(playback.tick(), ReplayStep::Paused);
        assert_eq!(playback.tick(), ReplayStep::Paused);
        assert_eq!(playback.cursor(), 1);
        assert_eq!(playback.next_delay(), None);

        assert!(playback.resume());
        assert!(!playback.resume());
        match playback.tick() {
            ReplayStep::Emit { cursor, point, .. } => {
                assert_eq!(cursor, 2);
                assert_eq!(point.ts, 1_700_000_001);
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_speed_changes_interval() {
        let mut playback = loaded(3);
        playback.set_speed(SpeedFactor::new(4).unwrap());
        assert_eq!(playback.interval(), Duration::from_millis(250));
        assert_eq!(playback.next_delay(), Some(Duration::from_millis(250)));
        assert!(SpeedFactor::new(0).is_err());
    }

    #[test]
    fn test_seek() {
        let mut playback = loaded(10);
        assert!(playback.seek(45.0));
        assert_eq!(playback.cursor(), 4);
        assert!((playback.progress() - 40.0).abs() < 1e-9);

        match playback.tick() {
            ReplayStep::Emit { point, .. } => assert_eq!(point.ts, 1_700_000_004),
            other => panic!("unexpected step {other:?}"),
        }

        assert!(playback.seek(250.0));
        assert_eq!(playback.cursor(), 10);
        assert_eq!(playback.tick(), ReplayStep::Finished);
    }

    #[test]
    fn test_inactive_tick_resets_cursor() {
        let mut playback = ReplayPlayback::default();
        assert_eq!(playback.tick(), ReplayStep::Idle);
        assert_eq!(playback.cursor(), 0);
        assert!(!playback.seek(10.0));
    }
}
