//! Transport-related type definitions
//!
//! Supporting types for DAW play state and navigation transitions.

use serde::{Deserialize, Serialize};

/// DAW transport play state
///
/// Numeric codes follow the DAW web-remote `TRANSPORT` record:
/// 0 stopped, 1 playing, 2 paused, 5 recording, 6 record-paused.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
    Paused,
    Recording,
    RecordPaused,
}

impl PlayState {
    /// Decode the DAW's numeric play state
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PlayState::Stopped),
            1 => Some(PlayState::Playing),
            2 => Some(PlayState::Paused),
            5 => Some(PlayState::Recording),
            6 => Some(PlayState::RecordPaused),
            _ => None,
        }
    }

    /// Numeric code as sent by the DAW
    pub fn code(self) -> u8 {
        match self {
            PlayState::Stopped => 0,
            PlayState::Playing => 1,
            PlayState::Paused => 2,
            PlayState::Recording => 5,
            PlayState::RecordPaused => 6,
        }
    }

    /// True while the play cursor is moving (playing or recording)
    pub fn is_rolling(self) -> bool {
        matches!(self, PlayState::Playing | PlayState::Recording)
    }
}

impl std::fmt::Display for PlayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayState::Stopped => write!(f, "stopped"),
            PlayState::Playing => write!(f, "playing"),
            PlayState::Paused => write!(f, "paused"),
            PlayState::Recording => write!(f, "recording"),
            PlayState::RecordPaused => write!(f, "record_paused"),
        }
    }
}

/// Why a navigation transition happened
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// End-of-region polling decided to move on
    AutoAdvance,
    /// Control surface request (HTTP API)
    Manual,
    /// Hardware MIDI controller
    Midi,
    /// Continue after a hard-stop marker held playback
    Resume,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionReason::AutoAdvance => write!(f, "auto_advance"),
            TransitionReason::Manual => write!(f, "manual"),
            TransitionReason::Midi => write!(f, "midi"),
            TransitionReason::Resume => write!(f, "resume"),
        }
    }
}
