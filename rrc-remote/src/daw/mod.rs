//! DAW access: web-remote wire protocol, HTTP client and an in-process
//! simulation

pub mod client;
pub mod protocol;
pub mod simulated;

pub use client::{DawClient, DawSnapshot, HttpDawClient};
pub use simulated::SimulatedDaw;
