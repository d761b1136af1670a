// Tracking session controller: overview / live / replay mode machine
//
// The controller runs as a single tokio task. User commands, timer fires and
// network completions all arrive through one mailbox, so state is only ever
// touched from that task. Every async operation captures the generation it
// was started under; a result whose generation no longer matches is dropped.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::constants::*;
use crate::core::device::{now_epoch_secs, Device};
use crate::core::error::{Result, TrackerError};
use crate::core::filter::{FilterCategory, FilteredRoster, MarkerFilterEngine};
use crate::core::live::{LiveAnimation, LiveFrame};
use crate::core::overlay::{live_marker_id, OverlayRegistry};
use crate::core::poller::DeviceRosterPoller;
use crate::core::ports::{
    HistoryRequest, HistorySource, LiveFeed, LiveRequest, MapSurface, Notifier, RosterSource,
};
use crate::core::replay::{ReplayPlan, ReplayPlayback, ReplayStatus, ReplayStep, SpeedFactor};
use crate::core::timer::{OneShotTimer, TaskSlot};
use crate::core::track::{LatLng, ReplayHistory, TrackPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Overview,
    Live,
    Replay,
}

/// Dashboard tab the user is looking at while a vehicle is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Live,
    Replay,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub roster_poll_interval: Duration,
    pub offline_threshold_secs: i64,
    pub live_window: Duration,
    pub replay_base_interval: Duration,
    pub live_zoom: u8,
    pub snap_to_road: bool,
    pub replay_speed: SpeedFactor,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            roster_poll_interval: ROSTER_POLL_INTERVAL,
            offline_threshold_secs: OFFLINE_THRESHOLD_SECS,
            live_window: LIVE_BATCH_WINDOW,
            replay_base_interval: REPLAY_BASE_INTERVAL,
            live_zoom: LIVE_ZOOM,
            snap_to_road: false,
            replay_speed: SpeedFactor::default(),
        }
    }
}

#[derive(Clone)]
pub struct SessionPorts {
    pub roster: Arc<dyn RosterSource>,
    pub live: Arc<dyn LiveFeed>,
    pub history: Arc<dyn HistorySource>,
    pub notifier: Arc<dyn Notifier>,
    pub map: Arc<dyn MapSurface>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SelectFilter(FilterCategory),
    SetMarkerSelected { id: String, selected: bool },
    SelectDevice(String),
    DeselectDevice,
    SwitchTab(Tab),
    /// Unix seconds, `from < to`.
    RequestReplay { from: i64, to: i64 },
    PauseReplay,
    ResumeReplay,
    SetReplaySpeed(u32),
    SeekReplay(f64),
    SetSnapToRoad(bool),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSources {
    pub poller: bool,
    pub live_subscription: bool,
    pub live_animation: bool,
    pub replay_fetch: bool,
    pub replay_timer: bool,
}

impl ActiveSources {
    /// Number of distinct data sources running: poller, live, replay.
    pub fn count(&self) -> usize {
        [
            self.poller,
            self.live_subscription || self.live_animation,
            self.replay_fetch || self.replay_timer,
        ]
        .iter()
        .filter(|on| **on)
        .count()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub mode: SessionMode,
    pub tab: Tab,
    pub generation: u64,
    pub selected_device: Option<String>,
    pub filter: FilterCategory,
    pub roster_size: usize,
    pub roster_updated_at: Option<i64>,
    pub filtered: FilteredRoster,
    pub selection: Vec<String>,
    pub counts: BTreeMap<FilterCategory, usize>,
    pub sources: ActiveSources,
    pub live_cursor: usize,
    pub snap_to_road: bool,
    pub replay: ReplayStatus,
    pub replay_loading: bool,
    pub replay_window: Option<(i64, i64)>,
}

enum Event {
    Command {
        command: Command,
        reply: Option<oneshot::Sender<SessionSnapshot>>,
    },
    RosterFetched {
        generation: u64,
        result: Result<Vec<Device>>,
    },
    LiveBatch {
        generation: u64,
        batch: Vec<TrackPoint>,
    },
    LiveEnded {
        generation: u64,
        error: Option<TrackerError>,
    },
    LiveFrame {
        generation: u64,
        timer: u64,
    },
    ReplayFetched {
        generation: u64,
        result: Result<ReplayHistory>,
    },
    ReplayTick {
        generation: u64,
        timer: u64,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Mailbox access for timers and fetch tasks. Weak, so the controller ends
/// once every [`SessionHandle`] is gone.
#[derive(Clone)]
struct Emitter(mpsc::WeakUnboundedSender<Event>);

impl Emitter {
    fn send(&self, event: Event) {
        if let Some(tx) = self.0.upgrade() {
            let _ = tx.send(event);
        }
    }
}

/// Cloneable front of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<Event>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn spawn(ports: SessionPorts, settings: SessionSettings) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = TrackingSessionController::new(ports, settings, Emitter(tx.downgrade()));
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
        let task = tokio::spawn(controller.run(rx, snapshot_tx));

        (
            SessionHandle {
                events: tx,
                snapshots: snapshot_rx,
            },
            task,
        )
    }

    /// Fire and forget.
    pub fn send(&self, command: Command) -> Result<()> {
        self.events
            .send(Event::Command {
                command,
                reply: None,
            })
            .map_err(|_| TrackerError::ControllerStopped)
    }

    /// Applies `command` and returns the state right after it.
    pub async fn request(&self, command: Command) -> Result<SessionSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.events
            .send(Event::Command {
                command,
                reply: Some(reply_tx),
            })
            .map_err(|_| TrackerError::ControllerStopped)?;
        reply_rx.await.map_err(|_| TrackerError::ControllerStopped)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// `false` once the controller task has ended.
    pub fn is_running(&self) -> bool {
        !self.events.is_closed()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Stops every source and clears the map. The controller task ends.
    pub async fn shutdown(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.events
            .send(Event::Shutdown { done: done_tx })
            .map_err(|_| TrackerError::ControllerStopped)?;
        done_rx.await.map_err(|_| TrackerError::ControllerStopped)
    }
}

struct TrackingSessionController {
    id: Uuid,
    settings: SessionSettings,
    live_feed: Arc<dyn LiveFeed>,
    history: Arc<dyn HistorySource>,
    notifier: Arc<dyn Notifier>,
    emitter: Emitter,

    mode: SessionMode,
    tab: Tab,
    generation: u64,
    selected: Option<String>,
    snap_to_road: bool,

    poller: DeviceRosterPoller,
    filter: MarkerFilterEngine,

    live: LiveAnimation,
    live_subscription: TaskSlot,
    live_timer: OneShotTimer,

    replay: ReplayPlayback,
    replay_fetch: TaskSlot,
    replay_timer: OneShotTimer,
    replay_loading: bool,
    replay_window: Option<(i64, i64)>,

    overlays: OverlayRegistry,
}

impl TrackingSessionController {
    fn new(ports: SessionPorts, settings: SessionSettings, emitter: Emitter) -> Self {
        Self {
            id: Uuid::new_v4(),
            poller: DeviceRosterPoller::new(
                ports.roster,
                settings.roster_poll_interval,
                settings.offline_threshold_secs,
            ),
            filter: MarkerFilterEngine::new(),
            live: LiveAnimation::new(settings.live_window),
            live_subscription: TaskSlot::new(),
            live_timer: OneShotTimer::new(),
            replay: ReplayPlayback::new(settings.replay_base_interval, settings.replay_speed),
            replay_fetch: TaskSlot::new(),
            replay_timer: OneShotTimer::new(),
            replay_loading: false,
            replay_window: None,
            overlays: OverlayRegistry::new(ports.map),
            live_feed: ports.live,
            history: ports.history,
            notifier: ports.notifier,
            emitter,
            mode: SessionMode::Overview,
            tab: Tab::Live,
            generation: 0,
            selected: None,
            snap_to_road: settings.snap_to_road,
            settings,
        }
    }

    async fn run(
        mut self,
        mut mailbox: mpsc::UnboundedReceiver<Event>,
        snapshots: watch::Sender<SessionSnapshot>,
    ) {
        info!(session = %self.id, "tracking session started");
        self.enter_overview();
        snapshots.send_replace(self.snapshot());

        while let Some(event) = mailbox.recv().await {
            match event {
                Event::Shutdown { done } => {
                    self.teardown();
                    snapshots.send_replace(self.snapshot());
                    let _ = done.send(());
                    info!(session = %self.id, "tracking session shut down");
                    return;
                }
                Event::Command { command, reply } => {
                    self.handle_command(command);
                    let snapshot = self.snapshot();
                    snapshots.send_replace(snapshot.clone());
                    if let Some(reply) = reply {
                        let _ = reply.send(snapshot);
                    }
                }
                other => {
                    self.handle_event(other);
                    snapshots.send_replace(self.snapshot());
                }
            }
        }

        self.teardown();
        info!(session = %self.id, "tracking session dropped");
    }

    fn notify(&self, message: &str) {
        self.notifier.notify(message);
    }

    // ---- commands ----

    fn handle_command(&mut self, command: Command) {
        debug!(session = %self.id, "command {:?}", command);
        match command {
            Command::SelectFilter(clicked) => {
                self.filter.select_category(clicked, self.poller.roster());
                info!("filter is now {}", self.filter.category());
                if self.mode == SessionMode::Overview {
                    self.overlays.sync_roster(self.filter.filtered());
                }
            }
            Command::SetMarkerSelected { id, selected } => {
                if !self.filter.set_selected(&id, selected) {
                    debug!("ignoring selection of hidden marker {}", id);
                }
            }
            Command::SelectDevice(id) => self.select_device(id),
            Command::DeselectDevice => {
                if self.selected.take().is_some() {
                    self.enter_overview();
                }
            }
            Command::SwitchTab(tab) => self.switch_tab(tab),
            Command::RequestReplay { from, to } => self.request_replay(from, to),
            Command::PauseReplay => {
                if self.replay.pause() {
                    self.replay_timer.cancel();
                    info!("replay paused at {}", self.replay.cursor());
                }
            }
            Command::ResumeReplay => {
                if self.mode == SessionMode::Replay && self.replay.resume() {
                    info!("replay resumed at {}", self.replay.cursor());
                    self.arm_replay_tick(self.replay.interval(), self.generation);
                }
            }
            Command::SetReplaySpeed(factor) => match SpeedFactor::new(factor) {
                Ok(speed) => self.replay.set_speed(speed),
                Err(e) => self.notify(&e.to_string()),
            },
            Command::SeekReplay(percent) => {
                if self.replay.seek(percent) {
                    debug!("replay cursor moved to {}", self.replay.cursor());
                }
            }
            Command::SetSnapToRoad(enabled) => {
                if self.snap_to_road == enabled {
                    return;
                }
                self.snap_to_road = enabled;
                if let (SessionMode::Live, Some(id)) = (self.mode, self.selected.clone()) {
                    self.live_timer.cancel();
                    self.live.reset();
                    let generation = self.next_generation();
                    self.open_subscription(&id, generation);
                }
            }
        }
    }

    fn select_device(&mut self, id: String) {
        if self.poller.device(&id).is_none() {
            warn!("select of unknown device {}", id);
            self.notify(MSG_UNKNOWN_VEHICLE);
            return;
        }
        if self.selected.as_deref() == Some(id.as_str()) {
            return;
        }

        self.selected = Some(id.clone());
        match self.tab {
            Tab::Live => self.enter_live(&id),
            Tab::Replay => self.enter_replay(),
        }
    }

    fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
        let Some(id) = self.selected.clone() else {
            return;
        };
        match tab {
            Tab::Replay if self.mode != SessionMode::Replay => self.enter_replay(),
            Tab::Live if self.mode != SessionMode::Live => self.enter_live(&id),
            _ => {}
        }
    }

    fn request_replay(&mut self, from: i64, to: i64) {
        let id = match (self.mode, self.selected.clone()) {
            (SessionMode::Replay, Some(id)) => id,
            _ => {
                self.notify(MSG_SELECT_VEHICLE);
                return;
            }
        };
        if from >= to {
            debug!("{}", TrackerError::InvalidInterval { from, to });
            self.notify(MSG_INVALID_RANGE);
            return;
        }

        self.replay_timer.cancel();
        self.replay.stop();
        self.overlays.clear_prefix("replay:");

        let generation = self.next_generation();
        self.replay_loading = true;
        self.replay_window = Some((from, to));
        info!("fetching replay history for {} [{}, {}]", id, from, to);

        let request = HistoryRequest::new(id, from, to);
        let history = self.history.clone();
        let emitter = self.emitter.clone();
        self.replay_fetch.spawn(async move {
            let result = history.fetch_history(&request).await;
            emitter.send(Event::ReplayFetched { generation, result });
        });
    }

    // ---- transitions ----

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn stop_sources(&mut self) {
        self.poller.stop();

        self.live_subscription.cancel();
        self.live_timer.cancel();
        self.live.reset();

        self.replay_fetch.cancel();
        self.replay_timer.cancel();
        self.replay.stop();
        self.replay_loading = false;
        self.replay_window = None;

        self.overlays.clear_prefix("live:");
        self.overlays.clear_prefix("replay:");
    }

    fn begin_transition(&mut self, next: SessionMode) -> u64 {
        self.stop_sources();
        let previous = self.mode;
        self.mode = next;
        let generation = self.next_generation();
        info!(
            session = %self.id,
            "mode {:?} -> {:?} (generation {})",
            previous, next, generation
        );
        generation
    }

    fn enter_overview(&mut self) {
        let generation = self.begin_transition(SessionMode::Overview);
        let emitter = self.emitter.clone();
        self.poller.start(generation, move |generation, result| {
            emitter.send(Event::RosterFetched { generation, result });
        });
        self.overlays.sync_roster(self.filter.filtered());
    }

    fn enter_live(&mut self, id: &str) {
        let generation = self.begin_transition(SessionMode::Live);
        self.overlays.clear_prefix("device:");

        // seed frame: no transition so the marker shows up at once
        if let Some(position) = self.poller.device(id).map(Device::position) {
            self.overlays.place_marker(&live_marker_id(id), position, Duration::ZERO);
            self.overlays.set_view(position, self.settings.live_zoom);
        }
        self.open_subscription(id, generation);
    }

    fn enter_replay(&mut self) {
        self.begin_transition(SessionMode::Replay);
        self.overlays.clear_prefix("device:");
        debug!("replay waiting for an interval");
    }

    fn open_subscription(&mut self, id: &str, generation: u64) {
        let request = LiveRequest {
            device_id: id.to_string(),
            snap_to_road: self.snap_to_road,
        };
        info!("subscribing to live positions of {}", id);

        let feed = self.live_feed.clone();
        let emitter = self.emitter.clone();
        self.live_subscription.spawn(async move {
            match feed.subscribe(request).await {
                Ok(mut stream) => {
                    while let Some(item) = stream.next().await {
                        match item {
                            Ok(batch) => emitter.send(Event::LiveBatch { generation, batch }),
                            Err(e) => warn!("live batch dropped: {}", e),
                        }
                    }
                    emitter.send(Event::LiveEnded {
                        generation,
                        error: None,
                    });
                }
                Err(e) => emitter.send(Event::LiveEnded {
                    generation,
                    error: Some(e),
                }),
            }
        });
    }

    fn teardown(&mut self) {
        self.stop_sources();
        self.overlays.clear();
    }

    // ---- async completions ----

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::RosterFetched { generation, result } => {
                if generation != self.generation || self.mode != SessionMode::Overview {
                    debug!("dropping stale roster result (generation {})", generation);
                    return;
                }
                if self.poller.apply(result, now_epoch_secs()) {
                    self.filter.recompute(self.poller.roster());
                    self.overlays.sync_roster(self.filter.filtered());
                }
            }
            Event::LiveBatch { generation, batch } => {
                if generation != self.generation {
                    debug!("dropping stale live batch (generation {})", generation);
                    return;
                }
                debug!("live batch of {} points", batch.len());
                match self.live.push_batch(batch) {
                    Some(delay) => self.arm_live_frame(delay, generation),
                    None => {
                        self.live_timer.cancel();
                    }
                }
            }
            Event::LiveFrame { generation, timer } => {
                if generation != self.generation || !self.live_timer.release(timer) {
                    debug!("dropping stale live frame (generation {}, timer {})", generation, timer);
                    return;
                }
                self.live_frame(generation);
            }
            Event::LiveEnded { generation, error } => {
                if generation != self.generation {
                    return;
                }
                self.live_subscription.release();
                match error {
                    Some(e) => {
                        warn!("live subscription failed: {}", e);
                        self.notify(MSG_LIVE_UNAVAILABLE);
                    }
                    None => info!("live feed closed"),
                }
            }
            Event::ReplayFetched { generation, result } => {
                if generation != self.generation || self.mode != SessionMode::Replay {
                    debug!("dropping stale replay history (generation {})", generation);
                    return;
                }
                self.replay_fetch.release();
                self.replay_loading = false;

                let plan = match result {
                    Ok(history) => ReplayPlan::from_history(history),
                    Err(e) => {
                        warn!("replay fetch failed: {}", e);
                        None
                    }
                };
                match plan {
                    Some(plan) => {
                        info!("replaying {} points", plan.len());
                        self.draw_replay_plan(&plan);
                        self.replay.load(plan);
                        self.replay_tick(generation);
                    }
                    None => self.abort_replay(),
                }
            }
            Event::ReplayTick { generation, timer } => {
                if generation != self.generation || !self.replay_timer.release(timer) {
                    debug!("dropping stale replay tick (generation {}, timer {})", generation, timer);
                    return;
                }
                self.replay_tick(generation);
            }
            Event::Command { .. } | Event::Shutdown { .. } => {}
        }
    }

    fn live_frame(&mut self, generation: u64) {
        let Some(id) = self.selected.clone() else {
            return;
        };
        match self.live.next_frame() {
            LiveFrame::Emit {
                point,
                transition,
                next,
            } => {
                self.overlays
                    .place_marker(&live_marker_id(&id), point.position(), transition);
                if let Some(delay) = next {
                    self.arm_live_frame(delay, generation);
                }
            }
            LiveFrame::Done => {}
        }
    }

    fn arm_live_frame(&mut self, delay: Duration, generation: u64) {
        let emitter = self.emitter.clone();
        self.live_timer.arm(delay, move |timer| {
            emitter.send(Event::LiveFrame { generation, timer });
        });
    }

    fn replay_tick(&mut self, generation: u64) {
        match self.replay.tick() {
            ReplayStep::Idle => {
                self.replay_timer.cancel();
            }
            ReplayStep::Paused => {}
            ReplayStep::Finished => {
                self.replay_timer.cancel();
                self.replay_window = None;
                info!("replay finished");
                self.notify(MSG_REPLAY_FINISHED);
            }
            ReplayStep::Emit {
                point, transition, ..
            } => {
                self.overlays
                    .place_marker(REPLAY_MARKER_ID, point.position(), transition);
                if let Some(delay) = self.replay.next_delay() {
                    self.arm_replay_tick(delay, generation);
                }
            }
        }
    }

    fn arm_replay_tick(&mut self, delay: Duration, generation: u64) {
        let emitter = self.emitter.clone();
        self.replay_timer.arm(delay, move |timer| {
            emitter.send(Event::ReplayTick { generation, timer });
        });
    }

    fn abort_replay(&mut self) {
        self.notify(MSG_NO_REPLAY_DATA);
        self.replay_timer.cancel();
        self.replay.stop();
        self.replay_window = None;
        self.overlays.clear_prefix("replay:");
    }

    fn draw_replay_plan(&mut self, plan: &ReplayPlan) {
        let path: Vec<LatLng> = plan.points().iter().map(TrackPoint::position).collect();
        self.overlays.draw_polyline(REPLAY_PATH_ID, &path);
        self.overlays
            .place_marker(REPLAY_START_FLAG_ID, plan.start_flag().position(), Duration::ZERO);
        self.overlays
            .place_marker(REPLAY_STOP_FLAG_ID, plan.stop_flag().position(), Duration::ZERO);
        for (i, point) in plan.harsh_acceleration().iter().enumerate() {
            self.overlays
                .place_marker(&format!("replay:ha:{i}"), point.position(), Duration::ZERO);
        }
        for (i, point) in plan.harsh_braking().iter().enumerate() {
            self.overlays
                .place_marker(&format!("replay:hb:{i}"), point.position(), Duration::ZERO);
        }
        if let Some(bounds) = plan.bounds() {
            self.overlays.fit_bounds(&bounds);
        }
    }

    // ---- reporting ----

    fn sources(&self) -> ActiveSources {
        ActiveSources {
            poller: self.poller.is_active(),
            live_subscription: self.live_subscription.is_active(),
            live_animation: self.live_timer.is_armed(),
            replay_fetch: self.replay_fetch.is_active(),
            replay_timer: self.replay_timer.is_armed(),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            mode: self.mode,
            tab: self.tab,
            generation: self.generation,
            selected_device: self.selected.clone(),
            filter: self.filter.category(),
            roster_size: self.poller.roster().len(),
            roster_updated_at: self.poller.last_success(),
            filtered: self.filter.filtered().clone(),
            selection: self.filter.selection().iter().cloned().collect(),
            counts: MarkerFilterEngine::counts(self.poller.roster()),
            sources: self.sources(),
            live_cursor: self.live.cursor(),
            snap_to_road: self.snap_to_road,
            replay: self.replay.status(),
            replay_loading: self.replay_loading,
            replay_window: self.replay_window,
        }
    }
}
