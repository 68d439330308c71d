//! # RRC Common Library
//!
//! Shared code for the region remote control service and its tools:
//! - Event types (RrcEvent enum) and the EventBus
//! - Bootstrap configuration loading
//! - Error types
//! - Time formatting helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
