//! Navigation engine
//!
//! **Module Structure:**
//! - `core.rs`: engine struct, shared state, poll loop lifecycle, status
//! - `decision.rs`: pure end-of-region decision
//! - `guard.rs`: single-flight transition guard
//! - `monitor.rs`: one poll tick (connection, transport, resync, decide)
//! - `navigation.rs`: transitions and manual navigation
//! - `setlists.rs`: setlist editing and activation

mod core;
mod decision;
mod guard;
mod monitor;
mod navigation;
mod setlists;

pub use self::core::{EngineSettings, EngineStatus, NavigationEngine};
pub use decision::{decide, Decision, DecisionInput, Handled, NextTarget};
pub use guard::TransitionGuard;
pub use navigation::{NavigationResult, TransitionPlan};
