//! In-process DAW simulation
//!
//! Backs `--simulate` mode (rehearse a setlist without a DAW running) and
//! the engine tests. Two clock modes:
//!
//! - **Clock-driven**: the play cursor advances with `tokio::time`, and
//!   pause/stop action markers pause or stop playback when crossed, the
//!   way the real DAW runs marker actions.
//! - **Manual**: the position only changes through `set_position` and
//!   seeks, which makes engine tests deterministic.

use super::client::{DawClient, DawSnapshot};
use super::protocol::{TransportInfo, ACTION_PAUSE, ACTION_PLAY, ACTION_PLAY_STOP, ACTION_STOP};
use crate::error::{Error, Result};
use crate::markers::{parse_directive, MarkerDirective};
use crate::regions::{Marker, Region};
use async_trait::async_trait;
use rrc_common::events::PlayState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

/// Request recorded by the simulation
#[derive(Debug, Clone, PartialEq)]
pub enum SimulatedCall {
    Snapshot { include_lists: bool },
    Seek(f64),
    Action(u32),
}

struct SimState {
    play_state: PlayState,
    /// Position at `anchor`
    position: f64,
    anchor: Instant,
    regions: Vec<Region>,
    markers: Vec<Marker>,
}

/// Simulated DAW transport with regions and markers
pub struct SimulatedDaw {
    state: Mutex<SimState>,
    calls: Mutex<Vec<SimulatedCall>>,
    clock_driven: bool,
    offline: AtomicBool,
}

impl SimulatedDaw {
    /// Simulation whose cursor moves in real time while playing
    pub fn clock_driven(regions: Vec<Region>, markers: Vec<Marker>) -> Self {
        Self::build(regions, markers, true)
    }

    /// Simulation whose cursor only moves when told to
    pub fn manual(regions: Vec<Region>, markers: Vec<Marker>) -> Self {
        Self::build(regions, markers, false)
    }

    fn build(regions: Vec<Region>, markers: Vec<Marker>, clock_driven: bool) -> Self {
        Self {
            state: Mutex::new(SimState {
                play_state: PlayState::Stopped,
                position: 0.0,
                anchor: Instant::now(),
                regions,
                markers,
            }),
            calls: Mutex::new(Vec::new()),
            clock_driven,
            offline: AtomicBool::new(false),
        }
    }

    /// A short demo project: three songs, one ending on a pause marker
    pub fn demo_project() -> Self {
        let region = |id: u32, name: &str, start: f64, end: f64| Region {
            id,
            name: name.to_string(),
            start,
            end,
            color: 0,
        };
        let marker = |id: u32, name: &str, position: f64| Marker {
            id,
            name: name.to_string(),
            position,
            color: 0,
        };
        Self::clock_driven(
            vec![
                region(1, "Opener", 0.0, 20.0),
                region(2, "Ballad", 20.0, 45.0),
                region(3, "Encore", 45.0, 70.0),
            ],
            vec![
                marker(1, "#Opener bpm=120 bars=8", 2.0),
                marker(2, "!1008", 43.0),
            ],
        )
    }

    /// Simulate the DAW going away (requests fail) or coming back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_position(&self, position: f64) {
        let mut state = self.lock_state();
        state.position = position;
        state.anchor = Instant::now();
    }

    pub fn set_play_state(&self, play_state: PlayState) {
        let mut state = self.lock_state();
        self.settle(&mut state);
        state.play_state = play_state;
    }

    pub fn set_regions(&self, regions: Vec<Region>, markers: Vec<Marker>) {
        let mut state = self.lock_state();
        state.regions = regions;
        state.markers = markers;
    }

    pub fn position(&self) -> f64 {
        let mut state = self.lock_state();
        self.settle(&mut state);
        state.position
    }

    pub fn play_state(&self) -> PlayState {
        let mut state = self.lock_state();
        self.settle(&mut state);
        state.play_state
    }

    /// Every request received so far
    pub fn calls(&self) -> Vec<SimulatedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Requests other than snapshots
    pub fn commands(&self) -> Vec<SimulatedCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, SimulatedCall::Snapshot { .. }))
            .collect()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SimState> {
        // A panic while holding the lock leaves plain data; keep serving it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: SimulatedCall) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Daw("Simulated DAW is offline".to_string()));
        }
        Ok(())
    }

    /// Advance a clock-driven cursor to now, running crossed marker actions
    fn settle(&self, state: &mut SimState) {
        let now = Instant::now();
        if !self.clock_driven || !state.play_state.is_rolling() {
            state.anchor = now;
            return;
        }

        let from = state.position;
        let to = from + now.duration_since(state.anchor).as_secs_f64();
        state.anchor = now;

        let crossed = state
            .markers
            .iter()
            .filter(|m| m.position > from && m.position <= to)
            .filter_map(|m| match parse_directive(&m.name) {
                MarkerDirective::HardStop { action_id } => Some((m.position, action_id)),
                _ => None,
            })
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match crossed {
            Some((position, action_id)) => {
                state.position = position;
                state.play_state = if action_id == ACTION_STOP {
                    PlayState::Stopped
                } else {
                    PlayState::Paused
                };
            }
            None => state.position = to,
        }
    }
}

#[async_trait]
impl DawClient for SimulatedDaw {
    async fn snapshot(&self, include_lists: bool) -> Result<DawSnapshot> {
        self.record(SimulatedCall::Snapshot { include_lists })?;

        let mut state = self.lock_state();
        self.settle(&mut state);

        let transport = TransportInfo {
            play_state: state.play_state,
            position: state.position,
            repeat: false,
            position_label: rrc_common::time::format_position(state.position),
            beats_label: String::new(),
        };

        Ok(DawSnapshot {
            transport,
            beat: None,
            regions: include_lists.then(|| state.regions.clone()),
            markers: include_lists.then(|| state.markers.clone()),
        })
    }

    async fn seek(&self, position: f64) -> Result<()> {
        self.record(SimulatedCall::Seek(position))?;
        let mut state = self.lock_state();
        self.settle(&mut state);
        state.position = position.max(0.0);
        Ok(())
    }

    async fn run_action(&self, action_id: u32) -> Result<()> {
        self.record(SimulatedCall::Action(action_id))?;
        let mut state = self.lock_state();
        self.settle(&mut state);

        state.play_state = match (action_id, state.play_state) {
            (ACTION_PLAY, _) => PlayState::Playing,
            (ACTION_PAUSE, PlayState::Playing) => PlayState::Paused,
            (ACTION_PAUSE, PlayState::Paused) => PlayState::Playing,
            (ACTION_STOP, _) => PlayState::Stopped,
            (ACTION_PLAY_STOP, s) if s.is_rolling() => PlayState::Stopped,
            (ACTION_PLAY_STOP, _) => PlayState::Playing,
            (_, s) => s,
        };
        Ok(())
    }
}
