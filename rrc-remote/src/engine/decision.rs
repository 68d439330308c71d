//! End-of-region decision
//!
//! Pure function of one poll's inputs. The monitor gathers the inputs under
//! the state lock, calls [`decide`] and then carries out the result.

use crate::markers::RegionTiming;
use crate::regions::{Marker, Region};
use rrc_common::config::AdvanceMode;
use rrc_common::events::PlayState;
use serde::Serialize;

/// Regions closer than this are treated as back-to-back (seconds)
pub const CONTIGUOUS_EPSILON: f64 = 0.01;

/// Where navigation goes next
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextTarget {
    pub region_id: u32,
    pub name: String,
    /// Seek target (region start, seconds)
    pub start: f64,
    /// Setlist item index when navigating a setlist
    pub item_index: Option<usize>,
}

impl NextTarget {
    pub fn new(region: &Region, item_index: Option<usize>) -> Self {
        Self {
            region_id: region.id,
            name: region.name.clone(),
            start: region.start,
            item_index,
        }
    }
}

/// One-shot outcomes already handled during the current region pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    HardStop,
    EndOfSet,
}

/// Everything the decision looks at
#[derive(Debug, Clone)]
pub struct DecisionInput<'a> {
    pub play_state: PlayState,
    /// Whether the previous poll saw the transport rolling
    pub was_rolling: bool,
    pub position: f64,
    pub region: Option<&'a Region>,
    pub timing: Option<&'a RegionTiming>,
    pub next: Option<&'a NextTarget>,
    /// Seconds before the effective end that count as "at the end"
    pub end_threshold: f64,
    pub mode: AdvanceMode,
    pub handled: Option<(u32, Handled)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Idle,
    /// Playback passed a hard-stop marker; report it, never advance
    HoldAtHardStop { region_id: u32, marker: Marker },
    /// Move on to `target`
    Advance {
        target: NextTarget,
        /// False when the next region starts exactly where this one ends
        /// and playback already crossed into it
        seek: bool,
        /// Pause before seeking (cue mode)
        pause_first: bool,
    },
    /// Nothing follows the region; stop the transport
    EndOfSet { region_id: u32 },
}

pub fn decide(input: &DecisionInput<'_>) -> Decision {
    let rolling = input.play_state.is_rolling();
    let (Some(region), Some(timing)) = (input.region, input.timing) else {
        return Decision::Idle;
    };
    let already = |kind: Handled| input.handled == Some((region.id, kind));

    if let Some(marker) = &timing.hard_stop {
        // The DAW pauses at the marker itself, so the poll that notices may
        // already see a stopped transport
        if (rolling || input.was_rolling)
            && input.position >= marker.position
            && !already(Handled::HardStop)
        {
            return Decision::HoldAtHardStop {
                region_id: region.id,
                marker: marker.clone(),
            };
        }
        return Decision::Idle;
    }

    if !rolling || input.mode == AdvanceMode::Off {
        return Decision::Idle;
    }

    let end = timing.effective_end;
    let near_end = input.position >= end - input.end_threshold;

    match input.next {
        Some(target) => {
            let contiguous = input.mode == AdvanceMode::Continue
                && !timing.custom_end
                && (target.start - end).abs() < CONTIGUOUS_EPSILON;

            if contiguous {
                // Playback flows into the next region on its own
                if input.position >= end {
                    return Decision::Advance {
                        target: target.clone(),
                        seek: false,
                        pause_first: false,
                    };
                }
                return Decision::Idle;
            }

            if near_end {
                return Decision::Advance {
                    target: target.clone(),
                    seek: true,
                    pause_first: input.mode == AdvanceMode::Cue,
                };
            }
            Decision::Idle
        }
        None if near_end && !already(Handled::EndOfSet) => Decision::EndOfSet {
            region_id: region.id,
        },
        None => Decision::Idle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::{marker, region};

    const THRESHOLD: f64 = 0.3;

    struct Case {
        region: Region,
        timing: RegionTiming,
        next: Option<NextTarget>,
    }

    impl Case {
        fn new(region: Region, markers: &[Marker], next: Option<Region>) -> Self {
            let timing = RegionTiming::resolve(&region, markers);
            Self {
                region,
                timing,
                next: next.map(|r| NextTarget::new(&r, None)),
            }
        }

        fn input(&self, play_state: PlayState, position: f64, mode: AdvanceMode) -> DecisionInput<'_> {
            DecisionInput {
                play_state,
                was_rolling: play_state.is_rolling(),
                position,
                region: Some(&self.region),
                timing: Some(&self.timing),
                next: self.next.as_ref(),
                end_threshold: THRESHOLD,
                mode,
                handled: None,
            }
        }
    }

    fn gapped() -> Case {
        Case::new(
            region(1, "Song 1", 0.0, 60.0),
            &[],
            Some(region(2, "Song 2", 65.0, 120.0)),
        )
    }

    #[test]
    fn test_idle_when_not_rolling() {
        let case = gapped();
        let input = case.input(PlayState::Paused, 59.9, AdvanceMode::Continue);
        assert_eq!(decide(&input), Decision::Idle);
    }

    #[test]
    fn test_idle_without_active_region() {
        let case = gapped();
        let mut input = case.input(PlayState::Playing, 59.9, AdvanceMode::Continue);
        input.region = None;
        assert_eq!(decide(&input), Decision::Idle);
    }

    #[test]
    fn test_idle_before_threshold() {
        let case = gapped();
        let input = case.input(PlayState::Playing, 59.6, AdvanceMode::Continue);
        assert_eq!(decide(&input), Decision::Idle);
    }

    #[test]
    fn test_advance_within_threshold() {
        let case = gapped();
        let input = case.input(PlayState::Playing, 59.75, AdvanceMode::Continue);
        match decide(&input) {
            Decision::Advance {
                target,
                seek,
                pause_first,
            } => {
                assert_eq!(target.region_id, 2);
                assert_eq!(target.start, 65.0);
                assert!(seek);
                assert!(!pause_first);
            }
            other => panic!("expected advance, got {:?}", other),
        }
    }

    #[test]
    fn test_late_poll_past_end_still_advances() {
        let case = gapped();
        let input = case.input(PlayState::Playing, 61.2, AdvanceMode::Continue);
        assert!(matches!(decide(&input), Decision::Advance { seek: true, .. }));
    }

    #[test]
    fn test_cue_mode_pauses_first() {
        let case = gapped();
        let input = case.input(PlayState::Playing, 59.9, AdvanceMode::Cue);
        assert!(matches!(
            decide(&input),
            Decision::Advance {
                seek: true,
                pause_first: true,
                ..
            }
        ));
    }

    #[test]
    fn test_off_mode_never_advances() {
        let case = gapped();
        let input = case.input(PlayState::Playing, 59.9, AdvanceMode::Off);
        assert_eq!(decide(&input), Decision::Idle);
    }

    #[test]
    fn test_end_of_set_once_per_pass() {
        let case = Case::new(region(3, "Last", 0.0, 60.0), &[], None);
        let mut input = case.input(PlayState::Playing, 59.8, AdvanceMode::Continue);
        assert_eq!(decide(&input), Decision::EndOfSet { region_id: 3 });

        input.handled = Some((3, Handled::EndOfSet));
        assert_eq!(decide(&input), Decision::Idle);

        // Handled for another region does not count
        input.handled = Some((1, Handled::EndOfSet));
        assert_eq!(decide(&input), Decision::EndOfSet { region_id: 3 });
    }

    #[test]
    fn test_hard_stop_holds_once_and_never_advances() {
        let case = Case::new(
            region(1, "Song 1", 0.0, 60.0),
            &[marker(1, "!1008", 40.0)],
            Some(region(2, "Song 2", 65.0, 120.0)),
        );

        let before = case.input(PlayState::Playing, 39.0, AdvanceMode::Continue);
        assert_eq!(decide(&before), Decision::Idle);

        let mut at = case.input(PlayState::Playing, 40.1, AdvanceMode::Continue);
        match decide(&at) {
            Decision::HoldAtHardStop { region_id, marker } => {
                assert_eq!(region_id, 1);
                assert_eq!(marker.name, "!1008");
            }
            other => panic!("expected hold, got {:?}", other),
        }

        at.handled = Some((1, Handled::HardStop));
        assert_eq!(decide(&at), Decision::Idle);

        let mut end = case.input(PlayState::Playing, 59.9, AdvanceMode::Continue);
        end.handled = Some((1, Handled::HardStop));
        assert_eq!(decide(&end), Decision::Idle);
    }

    #[test]
    fn test_hard_stop_noticed_after_daw_paused() {
        let case = Case::new(
            region(1, "Song 1", 0.0, 60.0),
            &[marker(1, "!1016", 40.0)],
            None,
        );
        let mut input = case.input(PlayState::Stopped, 40.0, AdvanceMode::Continue);
        input.was_rolling = true;
        assert!(matches!(decide(&input), Decision::HoldAtHardStop { .. }));

        input.was_rolling = false;
        assert_eq!(decide(&input), Decision::Idle);
    }

    #[test]
    fn test_hard_stop_after_custom_end_ignored() {
        let case = Case::new(
            region(1, "Song 1", 0.0, 60.0),
            &[marker(1, "#Song end=30", 0.0), marker(2, "!1008", 45.0)],
            Some(region(2, "Song 2", 65.0, 120.0)),
        );
        assert!(case.timing.hard_stop.is_none());
        let input = case.input(PlayState::Playing, 29.8, AdvanceMode::Continue);
        assert!(matches!(decide(&input), Decision::Advance { seek: true, .. }));
    }

    #[test]
    fn test_custom_end_uses_song_length() {
        // 8 bars of 4/4 at 120 bpm = 16 s after the marker at 2 s
        let case = Case::new(
            region(1, "Song 1", 0.0, 60.0),
            &[marker(1, "#Song bpm=120 bars=8", 2.0)],
            Some(region(2, "Song 2", 60.0, 120.0)),
        );
        assert_eq!(case.timing.effective_end, 18.0);

        let early = case.input(PlayState::Playing, 17.5, AdvanceMode::Continue);
        assert_eq!(decide(&early), Decision::Idle);

        // Next region starts at the region end, not the custom end: seek
        let input = case.input(PlayState::Playing, 17.8, AdvanceMode::Continue);
        assert!(matches!(decide(&input), Decision::Advance { seek: true, .. }));
    }

    #[test]
    fn test_contiguous_regions_advance_without_seek() {
        let case = Case::new(
            region(1, "Song 1", 0.0, 60.0),
            &[],
            Some(region(2, "Song 2", 60.0, 120.0)),
        );

        let near = case.input(PlayState::Playing, 59.9, AdvanceMode::Continue);
        assert_eq!(decide(&near), Decision::Idle);

        let crossed = case.input(PlayState::Playing, 60.1, AdvanceMode::Continue);
        assert!(matches!(
            decide(&crossed),
            Decision::Advance { seek: false, .. }
        ));
    }

    #[test]
    fn test_contiguous_regions_in_cue_mode_seek_and_pause() {
        let case = Case::new(
            region(1, "Song 1", 0.0, 60.0),
            &[],
            Some(region(2, "Song 2", 60.0, 120.0)),
        );
        let input = case.input(PlayState::Playing, 59.8, AdvanceMode::Cue);
        assert!(matches!(
            decide(&input),
            Decision::Advance {
                seek: true,
                pause_first: true,
                ..
            }
        ));
    }

    #[test]
    fn test_recording_counts_as_rolling() {
        let case = gapped();
        let input = case.input(PlayState::Recording, 59.9, AdvanceMode::Continue);
        assert!(matches!(decide(&input), Decision::Advance { .. }));
    }
}
