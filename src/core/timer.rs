// Cancellable timer handles backed by tokio tasks

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Owns at most one spawned task. Spawning replaces (and aborts) the previous
/// occupant; dropping the slot aborts it as well.
#[derive(Debug, Default)]
pub struct TaskSlot {
    handle: Option<JoinHandle<()>>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(fut));
    }

    /// Safe to call when empty. Returns whether a running task was aborted.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                was_running
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Forget a task that has already delivered its result.
    pub fn release(&mut self) {
        self.handle = None;
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Fires a callback once after a delay.
///
/// Every `arm` gets a fresh token that is handed to the callback. `release`
/// only takes a token matching the current occupant, so a fire that raced a
/// re-arm can't detach the newer timer.
#[derive(Debug, Default)]
pub struct OneShotTimer {
    slot: TaskSlot,
    armed_seq: u64,
}

impl OneShotTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm<F>(&mut self, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.armed_seq += 1;
        let token = self.armed_seq;
        self.slot.spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(token);
        });
        token
    }

    pub fn cancel(&mut self) -> bool {
        self.slot.cancel()
    }

    pub fn is_armed(&self) -> bool {
        self.slot.is_active()
    }

    /// Forgets the fired task if `token` is still the current one. Returns
    /// `false` for a stale or cancelled fire, which the caller must ignore.
    pub fn release(&mut self, token: u64) -> bool {
        if token != self.armed_seq || self.slot.handle.is_none() {
            return false;
        }
        self.slot.release();
        true
    }
}

/// Runs an async callback every `period`, the first run immediately.
/// A run that outlasts the period delays the next one instead of stacking.
#[derive(Debug, Default)]
pub struct RepeatingTimer {
    slot: TaskSlot,
}

impl RepeatingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start<F, Fut>(&mut self, period: Duration, mut on_tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.slot.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                on_tick().await;
            }
        });
    }

    pub fn stop(&mut self) -> bool {
        self.slot.cancel()
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_fires_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = OneShotTimer::new();

        let counter = fired.clone();
        timer.arm(Duration::from_millis(500), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = OneShotTimer::new();

        for _ in 0..3 {
            let counter = fired.clone();
            timer.arm(Duration::from_millis(100), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let mut timer = OneShotTimer::new();
        assert!(!timer.cancel());

        timer.arm(Duration::from_secs(1), |_| {});
        assert!(timer.cancel());
        assert!(!timer.cancel());
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_ignores_superseded_token() {
        let mut timer = OneShotTimer::new();
        let first = timer.arm(Duration::from_secs(1), |_| {});
        let second = timer.arm(Duration::from_secs(1), |_| {});
        assert_ne!(first, second);

        // the newer timer stays reachable
        assert!(!timer.release(first));
        assert!(timer.is_armed());
        assert!(timer.cancel());

        // a fire that lost against cancel is stale too
        assert!(!timer.release(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_current_token_after_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = OneShotTimer::new();

        let seen = fired.clone();
        let token = timer.arm(Duration::from_millis(100), move |t| {
            seen.store(t as usize, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(fired.load(Ordering::SeqCst), token as usize);
        assert!(timer.release(token));
        assert!(!timer.release(token));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_runs_immediately_then_periodically() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut timer = RepeatingTimer::new();

        let counter = ticks.clone();
        timer.start(Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        assert!(timer.stop());
        assert!(!timer.stop());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
