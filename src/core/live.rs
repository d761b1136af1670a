// Live batch animation

use std::time::Duration;

use crate::core::constants::LIVE_BATCH_WINDOW;
use crate::core::track::TrackPoint;

#[derive(Debug, Clone, PartialEq)]
pub enum LiveFrame {
    /// Show `point` with a `transition` long move. `next` is the delay before
    /// the following frame, `None` once the batch is exhausted.
    Emit {
        point: TrackPoint,
        transition: Duration,
        next: Option<Duration>,
    },
    Done,
}

/// Plays the most recent subscription batch over a fixed window. A new batch
/// replaces the current one and restarts from its first point.
#[derive(Debug)]
pub struct LiveAnimation {
    batch: Vec<TrackPoint>,
    cursor: usize,
    window: Duration,
}

impl Default for LiveAnimation {
    fn default() -> Self {
        Self::new(LIVE_BATCH_WINDOW)
    }
}

impl LiveAnimation {
    pub fn new(window: Duration) -> Self {
        Self {
            batch: Vec::new(),
            cursor: 0,
            window,
        }
    }

    /// Returns the delay before the first frame, `None` for an empty batch.
    pub fn push_batch(&mut self, batch: Vec<TrackPoint>) -> Option<Duration> {
        self.batch = batch;
        self.cursor = 0;
        if self.batch.is_empty() {
            return None;
        }
        Some(self.step_delay())
    }

    pub fn step_delay(&self) -> Duration {
        match self.batch.len() {
            0 => Duration::ZERO,
            n => self.window / u32::try_from(n).unwrap_or(u32::MAX),
        }
    }

    pub fn next_frame(&mut self) -> LiveFrame {
        let Some(point) = self.batch.get(self.cursor).cloned() else {
            self.reset();
            return LiveFrame::Done;
        };

        let transition = self.step_delay();
        self.cursor += 1;

        let next = if self.cursor >= self.batch.len() {
            self.reset();
            None
        } else {
            Some(transition)
        };

        LiveFrame::Emit {
            point,
            transition,
            next,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Back to cursor 0, waiting for the next batch.
    pub fn reset(&mut self) {
        self.batch.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(n: usize) -> Vec<TrackPoint> {
        (0..n).map(|i| TrackPoint::new(12.0, 77.0 + i as f64 * 0.001, i as i64)).collect()
    }

    #[test]
    fn test_batch_spread_over_window() {
        let mut anim = LiveAnimation::default();
        assert_eq!(anim.push_batch(batch(5)), Some(Duration::from_millis(1000)));

        let mut delays = Vec::new();
        loop {
            match anim.next_frame() {
                LiveFrame::Emit { transition, next, .. } => {
                    delays.push(transition);
                    if next.is_none() {
                        break;
                    }
                }
                LiveFrame::Done => panic!("batch ended early"),
            }
        }
        assert_eq!(delays, vec![Duration::from_millis(1000); 5]);
        assert_eq!(anim.cursor(), 0);
        assert_eq!(anim.next_frame(), LiveFrame::Done);
    }

    #[test]
    fn test_new_batch_restarts() {
        let mut anim = LiveAnimation::default();
        anim.push_batch(batch(5));
        anim.next_frame();
        anim.next_frame();
        assert_eq!(anim.cursor(), 2);

        assert_eq!(anim.push_batch(batch(2)), Some(Duration::from_millis(2500)));
        assert_eq!(anim.cursor(), 0);
        match anim.next_frame() {
            LiveFrame::Emit { point, next, .. } => {
                assert_eq!(point.ts, 0);
                assert_eq!(next, Some(Duration::from_millis(2500)));
            }
            LiveFrame::Done => panic!("expected a frame"),
        }
    }

    #[test]
    fn test_empty_batch_schedules_nothing() {
        let mut anim = LiveAnimation::default();
        assert_eq!(anim.push_batch(Vec::new()), None);
        assert_eq!(anim.next_frame(), LiveFrame::Done);
    }

    #[test]
    fn test_step_delay_for_large_batch() {
        let mut anim = LiveAnimation::default();
        assert_eq!(anim.push_batch(batch(100_000)), Some(Duration::from_micros(50)));
        assert_eq!(anim.step_delay(), Duration::from_micros(50));
    }

    #[test]
    fn test_single_point_batch() {
        let mut anim = LiveAnimation::default();
        assert_eq!(anim.push_batch(batch(1)), Some(Duration::from_millis(5000)));
        match anim.next_frame() {
            LiveFrame::Emit { next, .. } => assert_eq!(next, None),
            LiveFrame::Done => panic!("expected a frame"),
        }
    }
}
