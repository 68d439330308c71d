//! Hardware MIDI controller mapping
//!
//! Config bindings map note, CC and program-change messages to control
//! actions. Decoding uses midly and is always available; opening a port
//! needs the `midi-input` feature (midir).

use crate::engine::NavigationEngine;
use crate::error::{Error, Result};
use midly::live::LiveEvent;
use midly::MidiMessage;
use rrc_common::config::{MidiConfig, MidiMessageKind};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// CC values at or above this count as "pressed"
const CC_PRESSED: u8 = 64;

/// What a controller button does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Play,
    Pause,
    Stop,
    TogglePlay,
    Next,
    Previous,
    Resume,
    /// Jump to an item of the active setlist (0-based)
    GotoItem(usize),
}

impl std::str::FromStr for ControlAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if let Some(index) = s.strip_prefix("item:") {
            return index
                .trim()
                .parse()
                .map(ControlAction::GotoItem)
                .map_err(|_| Error::InvalidInput(format!("Invalid item index in '{}'", s)));
        }

        match s.as_str() {
            "play" => Ok(ControlAction::Play),
            "pause" => Ok(ControlAction::Pause),
            "stop" => Ok(ControlAction::Stop),
            "toggle" => Ok(ControlAction::TogglePlay),
            "next" => Ok(ControlAction::Next),
            "previous" | "prev" => Ok(ControlAction::Previous),
            "resume" => Ok(ControlAction::Resume),
            other => Err(Error::InvalidInput(format!(
                "Unknown control action '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlAction::Play => write!(f, "play"),
            ControlAction::Pause => write!(f, "pause"),
            ControlAction::Stop => write!(f, "stop"),
            ControlAction::TogglePlay => write!(f, "toggle"),
            ControlAction::Next => write!(f, "next"),
            ControlAction::Previous => write!(f, "previous"),
            ControlAction::Resume => write!(f, "resume"),
            ControlAction::GotoItem(index) => write!(f, "item:{}", index),
        }
    }
}

/// Message-to-action table built from `[midi]` config
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MidiMap {
    /// 0-based channel filter
    channel: Option<u8>,
    bindings: Vec<(MidiMessageKind, u8, ControlAction)>,
}

impl MidiMap {
    pub fn from_config(config: &MidiConfig) -> Result<Self> {
        let bindings = config
            .bindings
            .iter()
            .map(|b| {
                b.action
                    .parse::<ControlAction>()
                    .map(|action| (b.message, b.number, action))
                    .map_err(|e| Error::Config(format!("MIDI binding {:?} {}: {}", b.message, b.number, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            channel: config.channel,
            bindings,
        })
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Action bound to a raw MIDI message, if any
    ///
    /// Only presses trigger: note-on with non-zero velocity, CC at or above
    /// 64, and program change.
    pub fn decode(&self, bytes: &[u8]) -> Option<ControlAction> {
        let LiveEvent::Midi { channel, message } = LiveEvent::parse(bytes).ok()? else {
            return None;
        };
        if self.channel.is_some_and(|c| c != channel.as_int()) {
            return None;
        }

        let (kind, number) = match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                (MidiMessageKind::Note, key.as_int())
            }
            MidiMessage::Controller { controller, value } if value.as_int() >= CC_PRESSED => {
                (MidiMessageKind::Cc, controller.as_int())
            }
            MidiMessage::ProgramChange { program } => (MidiMessageKind::Program, program.as_int()),
            _ => return None,
        };

        self.bindings
            .iter()
            .find(|(k, n, _)| *k == kind && *n == number)
            .map(|(_, _, action)| *action)
    }
}

/// Run decoded controller actions against the engine
///
/// Failures (busy, nothing to navigate to) are logged and dropped; a
/// controller has nowhere to show them.
pub fn spawn_dispatcher(
    engine: Arc<NavigationEngine>,
    mut rx: mpsc::UnboundedReceiver<ControlAction>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(action) = rx.recv().await {
            debug!("MIDI action: {}", action);
            if let Err(e) = engine.dispatch(action).await {
                warn!("MIDI action '{}' failed: {}", action, e);
            }
        }
        debug!("MIDI dispatcher stopped");
    })
}

/// Open MIDI input connection
///
/// The connection closes when this is dropped.
#[cfg(feature = "midi-input")]
pub struct MidiListener {
    port_name: String,
    _connection: midir::MidiInputConnection<()>,
}

#[cfg(feature = "midi-input")]
impl MidiListener {
    /// Connect to the first input port whose name contains `port_name`
    /// (any port when unset) and forward decoded actions to `tx`
    pub fn open(
        port_name: Option<&str>,
        map: MidiMap,
        tx: mpsc::UnboundedSender<ControlAction>,
    ) -> Result<Self> {
        let midi_in = midir::MidiInput::new("rrc-remote")
            .map_err(|e| Error::Midi(format!("Failed to initialise MIDI input: {}", e)))?;

        let ports = midi_in.ports();
        let mut names = Vec::with_capacity(ports.len());
        let mut selected = None;
        for port in &ports {
            let name = midi_in.port_name(port).unwrap_or_default();
            if selected.is_none() && port_name.map_or(true, |wanted| name.contains(wanted)) {
                selected = Some((port.clone(), name.clone()));
            }
            names.push(name);
        }

        let Some((port, name)) = selected else {
            return Err(Error::Midi(format!(
                "No MIDI input matching {:?} (available: {})",
                port_name.unwrap_or("any"),
                names.join(", ")
            )));
        };

        tracing::info!("Connecting to MIDI input: {}", name);
        let connection = midi_in
            .connect(
                &port,
                "rrc-remote-input",
                move |_timestamp_us, data, _| {
                    if let Some(action) = map.decode(data) {
                        let _ = tx.send(action);
                    }
                },
                (),
            )
            .map_err(|e| Error::Midi(format!("Failed to connect to '{}': {}", name, e)))?;

        Ok(Self {
            port_name: name,
            _connection: connection,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rrc_common::config::MidiBinding;

    fn config(channel: Option<u8>) -> MidiConfig {
        let binding = |message, number, action: &str| MidiBinding {
            message,
            number,
            action: action.to_string(),
        };
        MidiConfig {
            enabled: true,
            port_name: None,
            channel,
            bindings: vec![
                binding(MidiMessageKind::Note, 60, "next"),
                binding(MidiMessageKind::Cc, 20, "toggle"),
                binding(MidiMessageKind::Program, 3, "item:3"),
            ],
        }
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!("play".parse::<ControlAction>().unwrap(), ControlAction::Play);
        assert_eq!(" Previous ".parse::<ControlAction>().unwrap(), ControlAction::Previous);
        assert_eq!("item:2".parse::<ControlAction>().unwrap(), ControlAction::GotoItem(2));
        assert!("item:x".parse::<ControlAction>().is_err());
        assert!("rewind".parse::<ControlAction>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let action = ControlAction::GotoItem(7);
        assert_eq!(action.to_string().parse::<ControlAction>().unwrap(), action);
    }

    #[test]
    fn test_unknown_binding_action_rejected() {
        let mut config = config(None);
        config.bindings[0].action = "explode".to_string();
        assert!(matches!(MidiMap::from_config(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_decode_note_on() {
        let map = MidiMap::from_config(&config(None)).unwrap();
        assert_eq!(map.decode(&[0x90, 60, 100]), Some(ControlAction::Next));
        // Other notes are unbound
        assert_eq!(map.decode(&[0x90, 61, 100]), None);
    }

    #[test]
    fn test_note_on_zero_velocity_ignored() {
        let map = MidiMap::from_config(&config(None)).unwrap();
        assert_eq!(map.decode(&[0x90, 60, 0]), None);
        assert_eq!(map.decode(&[0x80, 60, 64]), None);
    }

    #[test]
    fn test_cc_triggers_at_threshold() {
        let map = MidiMap::from_config(&config(None)).unwrap();
        assert_eq!(map.decode(&[0xB0, 20, 63]), None);
        assert_eq!(map.decode(&[0xB0, 20, 64]), Some(ControlAction::TogglePlay));
        assert_eq!(map.decode(&[0xB0, 20, 127]), Some(ControlAction::TogglePlay));
    }

    #[test]
    fn test_program_change() {
        let map = MidiMap::from_config(&config(None)).unwrap();
        assert_eq!(map.decode(&[0xC0, 3]), Some(ControlAction::GotoItem(3)));
    }

    #[test]
    fn test_channel_filter() {
        let map = MidiMap::from_config(&config(Some(1))).unwrap();
        assert_eq!(map.decode(&[0x90, 60, 100]), None);
        assert_eq!(map.decode(&[0x91, 60, 100]), Some(ControlAction::Next));
    }

    #[test]
    fn test_garbage_ignored() {
        let map = MidiMap::from_config(&config(None)).unwrap();
        assert_eq!(map.decode(&[]), None);
        assert_eq!(map.decode(&[0x42]), None);
        assert_eq!(map.decode(&[0xF8]), None);
    }
}
