//! Navigation engine - state, lifecycle and status
//!
//! **Responsibilities:**
//! - NavigationEngine struct definition and initialization
//! - Poll loop lifecycle (start, shutdown)
//! - Status snapshot for the control surface
//! - Target lookup shared by the monitor and manual navigation

use super::decision::{Handled, NextTarget};
use crate::daw::protocol::{BeatPosition, TransportInfo};
use crate::daw::DawClient;
use crate::markers::RegionTiming;
use crate::regions::{Marker, Region, RegionMap};
use crate::setlist::SetlistManager;
use rrc_common::config::{AdvanceMode, NavigationConfig};
use rrc_common::events::{EventBus, PlayState, RrcEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Seek confirmation window below the target (seconds)
pub(super) const PENDING_SEEK_EARLY: f64 = 0.05;
/// Seek confirmation window above the target (seconds)
pub(super) const PENDING_SEEK_LATE: f64 = 1.0;
/// Give up waiting for the transport to confirm a seek
pub(super) const PENDING_SEEK_TIMEOUT: Duration = Duration::from_secs(2);
/// `previous()` restarts the current region when further in than this (seconds)
pub(super) const RESTART_THRESHOLD: f64 = 3.0;

/// Poll timing taken from `[navigation]` config
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub poll_interval: Duration,
    /// Seconds
    pub end_threshold: f64,
    /// Seconds
    pub overshoot_tolerance: f64,
    pub region_refresh_ticks: u32,
}

impl From<&NavigationConfig> for EngineSettings {
    fn from(config: &NavigationConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            end_threshold: config.end_threshold_secs(),
            overshoot_tolerance: config.overshoot_tolerance_secs(),
            region_refresh_ticks: config.region_refresh_ticks.max(1),
        }
    }
}

/// Seek issued by a transition, awaiting confirmation from the transport
#[derive(Debug, Clone, Copy)]
pub(super) struct PendingSeek {
    pub(super) region_id: u32,
    pub(super) target: f64,
    pub(super) issued_at: Instant,
}

impl PendingSeek {
    pub(super) fn confirmed_by(&self, position: f64) -> bool {
        position >= self.target - PENDING_SEEK_EARLY && position <= self.target + PENDING_SEEK_LATE
    }
}

/// Last transport state reported to control surfaces
#[derive(Debug, Clone, Copy)]
pub(super) struct ReportedTransport {
    pub(super) play_state: PlayState,
    pub(super) position: f64,
    pub(super) at: Instant,
}

impl ReportedTransport {
    /// Where the cursor should be now if nothing but playback moved it
    pub(super) fn expected_position(&self) -> f64 {
        if self.play_state.is_rolling() {
            self.position + self.at.elapsed().as_secs_f64()
        } else {
            self.position
        }
    }
}

/// Everything the engine knows, behind one lock
#[derive(Debug, Default)]
pub(super) struct NavState {
    pub(super) regions: RegionMap,
    pub(super) markers: Vec<Marker>,
    pub(super) timings: HashMap<u32, RegionTiming>,
    pub(super) lists_loaded: bool,
    pub(super) transport: Option<TransportInfo>,
    pub(super) beat: Option<BeatPosition>,
    pub(super) active_region: Option<u32>,
    pub(super) handled: Option<(u32, Handled)>,
    pub(super) pending: Option<PendingSeek>,
    pub(super) setlists: SetlistManager,
    pub(super) advance_mode: AdvanceMode,
    pub(super) connected: bool,
    pub(super) outage_logged: bool,
    pub(super) reported: Option<ReportedTransport>,
    pub(super) tick_count: u64,
}

impl NavState {
    pub(super) fn position(&self) -> f64 {
        self.transport.as_ref().map_or(0.0, |t| t.position)
    }

    pub(super) fn is_rolling(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|t| t.play_state.is_rolling())
    }

    pub(super) fn active(&self) -> Option<&Region> {
        self.regions.by_id(self.active_region?)
    }

    /// Replace regions and markers; returns false when nothing changed
    pub(super) fn apply_lists(&mut self, regions: Vec<Region>, markers: Vec<Marker>) -> bool {
        let regions = RegionMap::new(regions);
        let first_load = !self.lists_loaded;
        self.lists_loaded = true;
        if !first_load && regions == self.regions && markers == self.markers {
            return false;
        }

        self.timings = regions
            .iter()
            .map(|r| (r.id, RegionTiming::resolve(r, &markers)))
            .collect();
        self.regions = regions;
        self.markers = markers;
        true
    }

    /// The item or region auto-advance and `next()` go to
    ///
    /// With a setlist active: the next item whose region exists, or the
    /// current item itself while the cursor is not on its region (a set
    /// activated mid-song starts at its start item). Otherwise the next
    /// region on the timeline, or the first region ahead of the cursor when
    /// it is outside every region.
    pub(super) fn next_target(&self) -> Option<NextTarget> {
        if let Some(setlist) = self.setlists.active() {
            let on_current = self.active_region.is_some()
                && self.setlists.current_item().map(|item| item.region_id) == self.active_region;
            let from = match self.setlists.active_index() {
                Some(index) if on_current => index + 1,
                Some(index) => index,
                None => 0,
            };
            return setlist
                .items
                .iter()
                .enumerate()
                .skip(from)
                .find_map(|(i, item)| {
                    self.regions
                        .by_id(item.region_id)
                        .map(|r| NextTarget::new(r, Some(i)))
                });
        }

        let region = match self.active_region {
            Some(id) if self.regions.by_id(id).is_some() => self.regions.next_after(id),
            _ => self.regions.first_starting_after(self.position()),
        };
        region.map(|r| NextTarget::new(r, None))
    }

    /// The item or region `previous()` goes to
    pub(super) fn previous_target(&self) -> Option<NextTarget> {
        if let Some(setlist) = self.setlists.active() {
            let before = self.setlists.active_index().unwrap_or(0);
            return setlist
                .items
                .iter()
                .enumerate()
                .take(before)
                .rev()
                .find_map(|(i, item)| {
                    self.regions
                        .by_id(item.region_id)
                        .map(|r| NextTarget::new(r, Some(i)))
                });
        }

        let position = self.position();
        let region = match self.active_region {
            Some(id) if self.regions.by_id(id).is_some() => self.regions.previous_before(id),
            _ => self.regions.iter().rev().find(|r| r.start < position),
        };
        region.map(|r| NextTarget::new(r, None))
    }

    /// The active region as a target (restart)
    pub(super) fn current_target(&self) -> Option<NextTarget> {
        let region = self.active()?;
        let item_index = self
            .setlists
            .current_item()
            .filter(|item| item.region_id == region.id)
            .and(self.setlists.active_index());
        Some(NextTarget::new(region, item_index))
    }
}

/// Serializable engine status for the control surface
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub connected: bool,
    pub transport: Option<TransportInfo>,
    pub beat: Option<BeatPosition>,
    pub active_region: Option<Region>,
    /// Index of the active region in start-time order
    pub region_index: Option<usize>,
    pub timing: Option<RegionTiming>,
    pub next: Option<NextTarget>,
    pub active_setlist_id: Option<Uuid>,
    pub setlist_index: Option<usize>,
    pub advance_mode: AdvanceMode,
    pub transitioning: bool,
    pub pending_seek: bool,
    pub region_count: usize,
}

/// End-of-region auto-advance and setlist navigation engine
pub struct NavigationEngine {
    pub(super) daw: Arc<dyn DawClient>,
    pub(super) events: Arc<EventBus>,
    pub(super) settings: EngineSettings,
    pub(super) state: RwLock<NavState>,
    /// Single-flight flag behind [`super::TransitionGuard`]
    pub(super) transitioning: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    poll_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl NavigationEngine {
    pub fn new(daw: Arc<dyn DawClient>, config: &NavigationConfig, events: Arc<EventBus>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let state = NavState {
            advance_mode: config.advance_mode,
            ..NavState::default()
        };

        Self {
            daw,
            events,
            settings: EngineSettings::from(config),
            state: RwLock::new(state),
            transitioning: AtomicBool::new(false),
            shutdown_tx,
            poll_task: std::sync::Mutex::new(None),
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Spawn the poll loop
    ///
    /// Calling `start` while the loop runs has no effect.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut task) = self.poll_task.lock() else {
            warn!("Poll task lock poisoned; not starting");
            return;
        };
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("Poll loop already running");
            return;
        }

        let engine = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let poll_interval = self.settings.poll_interval;

        info!(
            "Starting navigation poll loop (interval {}ms)",
            poll_interval.as_millis()
        );

        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => engine.poll_once().await,
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Navigation poll loop stopped");
        }));
    }

    /// Stop the poll loop and wait for it to finish
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let task = self.poll_task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Poll loop ended abnormally: {}", e);
            }
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning.load(Ordering::Acquire)
    }

    pub async fn advance_mode(&self) -> AdvanceMode {
        self.state.read().await.advance_mode
    }

    pub async fn set_advance_mode(&self, mode: AdvanceMode) {
        let mut state = self.state.write().await;
        if state.advance_mode != mode {
            info!("Advance mode: {} -> {}", state.advance_mode, mode);
            state.advance_mode = mode;
        }
    }

    pub async fn regions(&self) -> Vec<Region> {
        self.state.read().await.regions.as_slice().to_vec()
    }

    pub async fn markers(&self) -> Vec<Marker> {
        self.state.read().await.markers.clone()
    }

    pub async fn timing(&self, region_id: u32) -> Option<RegionTiming> {
        self.state.read().await.timings.get(&region_id).cloned()
    }

    pub async fn status(&self) -> EngineStatus {
        let state = self.state.read().await;
        let active = state.active().cloned();

        EngineStatus {
            connected: state.connected,
            transport: state.transport.clone(),
            beat: state.beat.clone(),
            region_index: active.as_ref().and_then(|r| state.regions.index_of(r.id)),
            timing: active.as_ref().and_then(|r| state.timings.get(&r.id).cloned()),
            active_region: active,
            next: state.next_target(),
            active_setlist_id: state.setlists.active().map(|s| s.id),
            setlist_index: state.setlists.active_index(),
            advance_mode: state.advance_mode,
            transitioning: self.is_transitioning(),
            pending_seek: state.pending.is_some(),
            region_count: state.regions.len(),
        }
    }

    pub(super) fn emit(&self, event: RrcEvent) {
        debug!("Event: {}", event.event_type());
        self.events.emit_lossy(event);
    }
}
