//! End-of-region polling
//!
//! One tick: read the DAW, track connection and transport, keep the active
//! region in sync with the cursor, then decide and act on the region end.

use super::core::{NavState, NavigationEngine, ReportedTransport, PENDING_SEEK_TIMEOUT};
use super::decision::{decide, Decision, DecisionInput, Handled};
use super::guard::TransitionGuard;
use super::navigation::TransitionPlan;
use crate::daw::protocol::{BeatPosition, TransportInfo};
use crate::error::Error;
use rrc_common::events::{RrcEvent, TransitionReason};
use rrc_common::time::now;
use tracing::{debug, info, warn};

/// Position jump that counts as a seek rather than playback (seconds)
const DRIFT_TOLERANCE: f64 = 0.5;

impl NavigationEngine {
    /// Run one poll tick
    ///
    /// Errors are logged; the loop keeps polling through DAW outages.
    pub async fn poll_once(&self) {
        let include_lists = {
            let mut state = self.state.write().await;
            let tick = state.tick_count;
            state.tick_count = state.tick_count.wrapping_add(1);
            !state.lists_loaded || tick % u64::from(self.settings.region_refresh_ticks) == 0
        };

        let snapshot = match self.daw.snapshot(include_lists).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.mark_disconnected(&e).await;
                return;
            }
        };
        self.mark_connected().await;

        let Some(_guard) = TransitionGuard::try_acquire(&self.transitioning) else {
            debug!("Transition in flight; skipping tick");
            return;
        };

        let decision = {
            let mut state = self.state.write().await;

            if let (Some(regions), Some(markers)) = (snapshot.regions, snapshot.markers) {
                if state.apply_lists(regions, markers) {
                    info!(
                        "Loaded {} regions, {} markers",
                        state.regions.len(),
                        state.markers.len()
                    );
                    self.emit(RrcEvent::RegionsReloaded {
                        count: state.regions.len(),
                        timestamp: now(),
                    });
                }
            }

            let was_rolling = state.is_rolling();
            let previous_position = state.transport.as_ref().map(|t| t.position);
            self.observe_transport(&mut state, snapshot.transport, snapshot.beat);
            let position = state.position();

            if !self.settle_pending_seek(&mut state, position) {
                return;
            }

            // Cursor moved backwards: a new pass through the region
            if previous_position.is_some_and(|p| position + DRIFT_TOLERANCE < p) {
                state.handled = None;
            }

            self.resync_active_region(&mut state, position);

            let next = state.next_target();
            let Some(transport) = state.transport.as_ref() else {
                return;
            };
            let region = state.active();
            let timing = region.and_then(|r| state.timings.get(&r.id));
            let input = DecisionInput {
                play_state: transport.play_state,
                was_rolling,
                position,
                region,
                timing,
                next: next.as_ref(),
                end_threshold: self.settings.end_threshold,
                mode: state.advance_mode,
                handled: state.handled,
            };
            decide(&input)
        };

        if let Err(e) = self.carry_out(decision).await {
            warn!("Auto-advance failed: {}", e);
        }
    }

    async fn carry_out(&self, decision: Decision) -> crate::error::Result<()> {
        match decision {
            Decision::Idle => Ok(()),
            Decision::HoldAtHardStop { region_id, marker } => {
                info!(
                    "Hard stop '{}' at {:.3}s holds region {}",
                    marker.name, marker.position, region_id
                );
                self.state.write().await.handled = Some((region_id, Handled::HardStop));
                self.emit(RrcEvent::HardStopReached {
                    region_id,
                    marker_name: marker.name,
                    position: marker.position,
                    timestamp: now(),
                });
                Ok(())
            }
            Decision::Advance {
                target,
                seek,
                pause_first,
            } => {
                let plan = TransitionPlan {
                    seek,
                    pause_first,
                    play_after: false,
                };
                self.transition(target, plan, TransitionReason::AutoAdvance)
                    .await
                    .map(|_| ())
            }
            Decision::EndOfSet { region_id } => {
                info!("End of set after region {}", region_id);
                // Mark first so a failing stop is not retried every tick
                self.state.write().await.handled = Some((region_id, Handled::EndOfSet));
                self.emit(RrcEvent::EndOfSet { timestamp: now() });
                self.daw.stop().await
            }
        }
    }

    /// Record the latest transport and report meaningful changes
    ///
    /// Ordinary forward motion is not reported; a play-state change or a
    /// jump away from the extrapolated position is.
    fn observe_transport(
        &self,
        state: &mut NavState,
        transport: TransportInfo,
        beat: Option<BeatPosition>,
    ) {
        let changed = match &state.reported {
            None => true,
            Some(reported) => {
                reported.play_state != transport.play_state
                    || (transport.position - reported.expected_position()).abs() > DRIFT_TOLERANCE
            }
        };

        if changed {
            debug!(
                "Transport: {} at {}",
                transport.play_state,
                rrc_common::time::format_position(transport.position)
            );
            state.reported = Some(ReportedTransport {
                play_state: transport.play_state,
                position: transport.position,
                at: tokio::time::Instant::now(),
            });
            self.emit(RrcEvent::TransportChanged {
                play_state: transport.play_state,
                position: transport.position,
                timestamp: now(),
            });
        }

        state.transport = Some(transport);
        state.beat = beat;
    }

    /// Check an outstanding seek against the transport
    ///
    /// Returns false while the seek is still unconfirmed; the rest of the
    /// tick must not act on a stale position.
    fn settle_pending_seek(&self, state: &mut NavState, position: f64) -> bool {
        let Some(pending) = state.pending else {
            return true;
        };

        if pending.confirmed_by(position) {
            debug!("Seek to {:.3}s confirmed", pending.target);
            state.pending = None;
            self.emit(RrcEvent::TransitionCompleted {
                region_id: pending.region_id,
                timestamp: now(),
            });
            return true;
        }

        if pending.issued_at.elapsed() >= PENDING_SEEK_TIMEOUT {
            warn!(
                "DAW did not confirm seek to {:.3}s (at {:.3}s); resyncing",
                pending.target, position
            );
            state.pending = None;
            return true;
        }

        debug!(
            "Waiting for seek to {:.3}s (transport at {:.3}s)",
            pending.target, position
        );
        false
    }

    /// Follow the cursor when it leaves the active region
    ///
    /// The active region is kept until the cursor is past its effective
    /// end plus the overshoot tolerance, so a late poll can still advance.
    fn resync_active_region(&self, state: &mut NavState, position: f64) {
        let keep = state.active().is_some_and(|region| {
            let effective_end = state
                .timings
                .get(&region.id)
                .map_or(region.end, |t| t.effective_end);
            let limit = region
                .end
                .max(effective_end + self.settings.overshoot_tolerance);
            position >= region.start && position < limit
        });
        if keep {
            return;
        }

        let found = state.regions.region_at(position).map(|r| r.id);
        if found == state.active_region {
            return;
        }

        state.active_region = found;
        state.handled = None;
        self.emit_region_changed(state);

        if let Some(region_id) = found {
            if let Some(index) = state.setlists.index_for_region(region_id) {
                if state.setlists.active_index() != Some(index)
                    && state.setlists.set_active_index(index).is_ok()
                {
                    self.emit_active_setlist(state);
                }
            }
        }
    }

    pub(super) fn emit_region_changed(&self, state: &NavState) {
        let region = state.active();
        match region {
            Some(r) => info!("Active region: {} '{}'", r.id, r.name),
            None => debug!("Cursor outside every region"),
        }
        self.emit(RrcEvent::RegionChanged {
            region_id: region.map(|r| r.id),
            name: region.map(|r| r.name.clone()).unwrap_or_default(),
            index: region.and_then(|r| state.regions.index_of(r.id)),
            timestamp: now(),
        });
    }

    pub(super) fn emit_active_setlist(&self, state: &NavState) {
        self.emit(RrcEvent::ActiveSetlistChanged {
            setlist_id: state.setlists.active().map(|s| s.id),
            item_index: state.setlists.active_index(),
            timestamp: now(),
        });
    }

    async fn mark_connected(&self) {
        let mut state = self.state.write().await;
        state.outage_logged = false;
        if !state.connected {
            state.connected = true;
            info!("Connected to DAW");
            self.emit(RrcEvent::DawConnection {
                connected: true,
                timestamp: now(),
            });
        }
    }

    async fn mark_disconnected(&self, error: &Error) {
        let mut state = self.state.write().await;
        if !state.outage_logged {
            warn!("DAW unavailable: {}", error);
            state.outage_logged = true;
        } else {
            debug!("DAW still unavailable: {}", error);
        }
        if state.connected {
            state.connected = false;
            self.emit(RrcEvent::DawConnection {
                connected: false,
                timestamp: now(),
            });
        }
    }
}
