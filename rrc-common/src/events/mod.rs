//! Event types for the RRC event system
//!
//! Provides the shared event definitions and EventBus used by the
//! navigation engine and every control-surface connection.

mod transport_types;

pub use transport_types::{PlayState, TransitionReason};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// RRC event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// All events use this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RrcEvent {
    /// Transport play state changed, or the position jumped
    ///
    /// Not emitted for ordinary forward motion during playback; control
    /// surfaces interpolate between updates.
    TransportChanged {
        play_state: PlayState,
        /// Position in seconds
        position: f64,
        timestamp: DateTime<Utc>,
    },

    /// The region the engine considers active changed
    RegionChanged {
        /// DAW region number (None when the cursor is outside every region)
        region_id: Option<u32>,
        /// Region name (empty when none)
        name: String,
        /// Index in start-time order
        index: Option<usize>,
        timestamp: DateTime<Utc>,
    },

    /// A setlist was created, edited or deleted
    SetlistChanged {
        setlist_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// The active setlist or the position within it changed
    ActiveSetlistChanged {
        setlist_id: Option<Uuid>,
        item_index: Option<usize>,
        timestamp: DateTime<Utc>,
    },

    /// A transition to another region began (seek issued)
    TransitionStarted {
        from_region: Option<u32>,
        to_region: u32,
        reason: TransitionReason,
        timestamp: DateTime<Utc>,
    },

    /// The DAW confirmed the transition
    TransitionCompleted {
        region_id: u32,
        timestamp: DateTime<Utc>,
    },

    /// Playback passed a hard-stop marker; auto-advance is held
    HardStopReached {
        region_id: u32,
        marker_name: String,
        /// Marker position in seconds
        position: f64,
        timestamp: DateTime<Utc>,
    },

    /// The last region (or setlist item) finished and nothing follows
    EndOfSet { timestamp: DateTime<Utc> },

    /// Region and marker lists were re-read from the DAW
    RegionsReloaded {
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// DAW reachability changed
    DawConnection {
        connected: bool,
        timestamp: DateTime<Utc>,
    },
}

impl RrcEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            RrcEvent::TransportChanged { .. } => "TransportChanged",
            RrcEvent::RegionChanged { .. } => "RegionChanged",
            RrcEvent::SetlistChanged { .. } => "SetlistChanged",
            RrcEvent::ActiveSetlistChanged { .. } => "ActiveSetlistChanged",
            RrcEvent::TransitionStarted { .. } => "TransitionStarted",
            RrcEvent::TransitionCompleted { .. } => "TransitionCompleted",
            RrcEvent::HardStopReached { .. } => "HardStopReached",
            RrcEvent::EndOfSet { .. } => "EndOfSet",
            RrcEvent::RegionsReloaded { .. } => "RegionsReloaded",
            RrcEvent::DawConnection { .. } => "DawConnection",
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lag and
/// lose the oldest events rather than blocking the engine.
pub struct EventBus {
    tx: broadcast::Sender<RrcEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use rrc_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RrcEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: RrcEvent) -> Result<usize, broadcast::error::SendError<RrcEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RrcEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
