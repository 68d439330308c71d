//! Control-surface HTTP API
//!
//! REST endpoints for transport, navigation and setlists plus an SSE event
//! stream.

pub mod handlers;
pub mod server;
pub mod setlists;
pub mod sse;

pub use server::{build_router, run, AppContext};
