//! # RRC Remote Library (rrc-remote)
//!
//! Remote control for a DAW's web interface: transport control, region and
//! setlist navigation, end-of-region auto-advance, and a control-surface
//! HTTP/SSE API.
//!
//! **Architecture:** one navigation engine polls the DAW over HTTP, decides
//! when to advance at region ends, and broadcasts events; the HTTP API and
//! the MIDI controller drive the same engine.

pub mod api;
pub mod daw;
pub mod engine;
pub mod error;
pub mod markers;
pub mod midi;
pub mod regions;
pub mod setlist;

pub use engine::NavigationEngine;
pub use error::{Error, Result};
