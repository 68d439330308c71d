//! Transitions and manual navigation
//!
//! Every operation here takes the transition guard first; a second caller
//! while one is in flight gets `Error::Busy`.

use super::core::{NavigationEngine, PendingSeek, RESTART_THRESHOLD};
use super::decision::NextTarget;
use super::guard::TransitionGuard;
use crate::error::{Error, Result};
use crate::midi::ControlAction;
use rrc_common::events::{RrcEvent, TransitionReason};
use rrc_common::time::now;
use serde::Serialize;
use tokio::time::Instant;
use tracing::info;

/// DAW commands a transition sends, in order: pause, seek, play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionPlan {
    pub seek: bool,
    /// Pause first if the transport is rolling
    pub pause_first: bool,
    pub play_after: bool,
}

impl TransitionPlan {
    /// Seek, leaving the play state as it is
    pub const JUMP: TransitionPlan = TransitionPlan {
        seek: true,
        pause_first: false,
        play_after: false,
    };

    /// Seek, then start playback
    pub const JUMP_AND_PLAY: TransitionPlan = TransitionPlan {
        seek: true,
        pause_first: false,
        play_after: true,
    };
}

/// Where a navigation operation went
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationResult {
    pub from_region: Option<u32>,
    pub region_id: u32,
    pub name: String,
    pub position: f64,
    pub item_index: Option<usize>,
}

impl NavigationEngine {
    fn acquire(&self) -> Result<TransitionGuard<'_>> {
        TransitionGuard::try_acquire(&self.transitioning)
            .ok_or_else(|| Error::Busy("A transition is already in progress".to_string()))
    }

    /// Move to `target`; the caller holds the transition guard
    pub(super) async fn transition(
        &self,
        target: NextTarget,
        plan: TransitionPlan,
        reason: TransitionReason,
    ) -> Result<NavigationResult> {
        let (from_region, rolling) = {
            let state = self.state.read().await;
            (state.active_region, state.is_rolling())
        };

        if plan.pause_first && rolling {
            // Pause toggles in the DAW, so only send it while rolling
            self.daw.pause().await?;
        }
        if plan.seek {
            self.daw.seek(target.start).await?;
        }
        if plan.play_after {
            self.daw.play().await?;
        }

        let mut state = self.state.write().await;
        state.active_region = Some(target.region_id);
        state.handled = None;
        state.pending = plan.seek.then(|| PendingSeek {
            region_id: target.region_id,
            target: target.start,
            issued_at: Instant::now(),
        });

        let index_changed = match target.item_index {
            Some(index) if state.setlists.active_index() != Some(index) => {
                state.setlists.set_active_index(index).is_ok()
            }
            _ => false,
        };

        info!(
            "Transition ({}): {:?} -> {} '{}' at {:.3}s",
            reason, from_region, target.region_id, target.name, target.start
        );

        self.emit(RrcEvent::TransitionStarted {
            from_region,
            to_region: target.region_id,
            reason,
            timestamp: now(),
        });
        if from_region != Some(target.region_id) {
            self.emit_region_changed(&state);
        }
        if index_changed {
            self.emit_active_setlist(&state);
        }
        if !plan.seek {
            self.emit(RrcEvent::TransitionCompleted {
                region_id: target.region_id,
                timestamp: now(),
            });
        }

        Ok(NavigationResult {
            from_region,
            region_id: target.region_id,
            name: target.name,
            position: target.start,
            item_index: target.item_index,
        })
    }

    pub async fn next(&self) -> Result<NavigationResult> {
        self.next_with(TransitionReason::Manual).await
    }

    async fn next_with(&self, reason: TransitionReason) -> Result<NavigationResult> {
        let _guard = self.acquire()?;
        let target = self
            .state
            .read()
            .await
            .next_target()
            .ok_or_else(|| Error::InvalidState("Nothing follows the current region".to_string()))?;
        self.transition(target, TransitionPlan::JUMP, reason).await
    }

    /// Go to the previous item, or restart the current one when more than
    /// a few seconds into it
    pub async fn previous(&self) -> Result<NavigationResult> {
        self.previous_with(TransitionReason::Manual).await
    }

    async fn previous_with(&self, reason: TransitionReason) -> Result<NavigationResult> {
        let _guard = self.acquire()?;
        let target = {
            let state = self.state.read().await;
            let position = state.position();
            let restart = state
                .active()
                .is_some_and(|r| position - r.start > RESTART_THRESHOLD);

            if restart {
                state.current_target()
            } else {
                state.previous_target().or_else(|| state.current_target())
            }
        }
        .ok_or_else(|| Error::InvalidState("No region before the cursor".to_string()))?;

        self.transition(target, TransitionPlan::JUMP, reason).await
    }

    /// Jump to a region by DAW region number
    ///
    /// With a setlist active, the setlist position follows when the region
    /// is part of it.
    pub async fn goto_region(&self, region_id: u32) -> Result<NavigationResult> {
        self.goto_region_with(region_id, TransitionReason::Manual).await
    }

    async fn goto_region_with(
        &self,
        region_id: u32,
        reason: TransitionReason,
    ) -> Result<NavigationResult> {
        let _guard = self.acquire()?;
        let target = {
            let state = self.state.read().await;
            let region = state
                .regions
                .by_id(region_id)
                .ok_or_else(|| Error::NotFound(format!("Region {}", region_id)))?;
            NextTarget::new(region, state.setlists.index_for_region(region_id))
        };
        self.transition(target, TransitionPlan::JUMP, reason).await
    }

    /// Jump to an item of the active setlist
    pub async fn goto_item(&self, index: usize) -> Result<NavigationResult> {
        self.goto_item_with(index, TransitionReason::Manual).await
    }

    async fn goto_item_with(&self, index: usize, reason: TransitionReason) -> Result<NavigationResult> {
        let _guard = self.acquire()?;
        let target = {
            let state = self.state.read().await;
            let setlist = state
                .setlists
                .active()
                .ok_or_else(|| Error::InvalidState("No active setlist".to_string()))?;
            let item = setlist.items.get(index).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Item {} out of range (setlist has {} items)",
                    index,
                    setlist.items.len()
                ))
            })?;
            let region = state.regions.by_id(item.region_id).ok_or_else(|| {
                Error::NotFound(format!(
                    "Region {} (setlist item {}) is not in the project",
                    item.region_id, index
                ))
            })?;
            NextTarget::new(region, Some(index))
        };
        self.transition(target, TransitionPlan::JUMP, reason).await
    }

    /// Continue past a hard stop: seek to the next item and play
    pub async fn resume(&self) -> Result<NavigationResult> {
        let _guard = self.acquire()?;
        let target = self
            .state
            .read()
            .await
            .next_target()
            .ok_or_else(|| Error::InvalidState("Nothing to resume to".to_string()))?;
        self.transition(target, TransitionPlan::JUMP_AND_PLAY, TransitionReason::Resume)
            .await
    }

    pub async fn play(&self) -> Result<()> {
        let _guard = self.acquire()?;
        self.daw.play().await
    }

    /// Pause if rolling; pausing an already paused transport is a no-op
    pub async fn pause(&self) -> Result<()> {
        let _guard = self.acquire()?;
        if self.daw.transport().await?.play_state.is_rolling() {
            self.daw.pause().await?;
        }
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let _guard = self.acquire()?;
        self.daw.stop().await
    }

    pub async fn toggle_play(&self) -> Result<()> {
        let _guard = self.acquire()?;
        self.daw.play_stop().await
    }

    /// Run a hardware controller action
    pub async fn dispatch(&self, action: ControlAction) -> Result<()> {
        let reason = TransitionReason::Midi;
        match action {
            ControlAction::Play => self.play().await,
            ControlAction::Pause => self.pause().await,
            ControlAction::Stop => self.stop().await,
            ControlAction::TogglePlay => self.toggle_play().await,
            ControlAction::Next => self.next_with(reason).await.map(|_| ()),
            ControlAction::Previous => self.previous_with(reason).await.map(|_| ()),
            ControlAction::Resume => self.resume().await.map(|_| ()),
            ControlAction::GotoItem(index) => self.goto_item_with(index, reason).await.map(|_| ()),
        }
    }

    /// Fetch regions and markers now instead of waiting for the refresh tick
    pub async fn reload_regions(&self) -> Result<usize> {
        let snapshot = self.daw.snapshot(true).await?;
        let (Some(regions), Some(markers)) = (snapshot.regions, snapshot.markers) else {
            return Err(Error::Protocol("DAW sent no region list".to_string()));
        };

        let mut state = self.state.write().await;
        state.apply_lists(regions, markers);
        let count = state.regions.len();
        info!("Reloaded {} regions", count);
        self.emit(RrcEvent::RegionsReloaded {
            count,
            timestamp: now(),
        });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daw::SimulatedDaw;
    use crate::regions::region;
    use rrc_common::config::NavigationConfig;
    use rrc_common::events::EventBus;
    use std::sync::Arc;

    fn engine() -> (Arc<SimulatedDaw>, NavigationEngine) {
        let daw = Arc::new(SimulatedDaw::manual(
            vec![region(1, "A", 0.0, 60.0), region(2, "B", 65.0, 120.0)],
            vec![],
        ));
        let engine = NavigationEngine::new(
            daw.clone(),
            &NavigationConfig::default(),
            Arc::new(EventBus::new(16)),
        );
        (daw, engine)
    }

    #[tokio::test]
    async fn test_operations_refused_while_transitioning() {
        let (daw, engine) = engine();
        engine.poll_once().await;
        daw.clear_calls();

        let held = TransitionGuard::try_acquire(&engine.transitioning).unwrap();
        assert!(engine.is_transitioning());
        assert!(matches!(engine.next().await, Err(Error::Busy(_))));
        assert!(matches!(engine.goto_region(2).await, Err(Error::Busy(_))));
        assert!(matches!(engine.play().await, Err(Error::Busy(_))));
        assert!(daw.commands().is_empty());

        drop(held);
        assert_eq!(engine.goto_region(2).await.unwrap().position, 65.0);
    }

    #[tokio::test]
    async fn test_jump_leaves_play_state_alone() {
        let (daw, engine) = engine();
        engine.poll_once().await;
        daw.clear_calls();

        let target = engine.state.read().await.next_target().unwrap();
        let _guard = engine.acquire().unwrap();
        engine
            .transition(target, TransitionPlan::JUMP, TransitionReason::Manual)
            .await
            .unwrap();
        assert_eq!(daw.commands(), vec![crate::daw::simulated::SimulatedCall::Seek(65.0)]);
        assert!(engine.state.read().await.pending.is_some());
    }
}
