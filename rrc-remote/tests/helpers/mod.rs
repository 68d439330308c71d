//! Shared fixtures for rrc-remote integration tests
//!
//! Engines here run against a manual-clock [`SimulatedDaw`]; tests drive
//! ticks with `poll_once` and move the cursor with `set_position`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::StatusCode;
use http::{Method, Request};
use rrc_common::config::{AdvanceMode, NavigationConfig};
use rrc_common::events::{EventBus, RrcEvent};
use rrc_remote::daw::SimulatedDaw;
use rrc_remote::regions::{Marker, Region};
use rrc_remote::NavigationEngine;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower::ServiceExt;

pub fn region(id: u32, name: &str, start: f64, end: f64) -> Region {
    Region {
        id,
        name: name.to_string(),
        start,
        end,
        color: 0,
    }
}

pub fn marker(id: u32, name: &str, position: f64) -> Marker {
    Marker {
        id,
        name: name.to_string(),
        position,
        color: 0,
    }
}

/// Three songs with gaps between them
pub fn gapped_project() -> Vec<Region> {
    vec![
        region(1, "Song 1", 0.0, 60.0),
        region(2, "Song 2", 65.0, 120.0),
        region(3, "Song 3", 125.0, 180.0),
    ]
}

pub struct Fixture {
    pub daw: Arc<SimulatedDaw>,
    pub engine: Arc<NavigationEngine>,
    pub events: broadcast::Receiver<RrcEvent>,
}

impl Fixture {
    pub fn new(regions: Vec<Region>, markers: Vec<Marker>, mode: AdvanceMode) -> Self {
        let daw = Arc::new(SimulatedDaw::manual(regions, markers));
        let config = NavigationConfig {
            advance_mode: mode,
            ..NavigationConfig::default()
        };
        let bus = Arc::new(EventBus::new(256));
        let events = bus.subscribe();
        let engine = Arc::new(NavigationEngine::new(daw.clone(), &config, bus));
        Self {
            daw,
            engine,
            events,
        }
    }

    /// Put the cursor at `position`, playing, and run one tick
    pub async fn playing_at(&mut self, position: f64) {
        self.daw.set_play_state(rrc_common::events::PlayState::Playing);
        self.daw.set_position(position);
        self.engine.poll_once().await;
    }

    /// Move the cursor and run one tick
    pub async fn tick_at(&mut self, position: f64) {
        self.daw.set_position(position);
        self.engine.poll_once().await;
    }

    /// Events received since the last call
    pub fn drain_events(&mut self) -> Vec<RrcEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn event_types(&mut self) -> Vec<&'static str> {
        self.drain_events().iter().map(|e| e.event_type()).collect()
    }

    pub async fn active_region(&self) -> Option<u32> {
        self.engine.status().await.active_region.map(|r| r.id)
    }
}

/// Send one request through the router
pub async fn make_request(
    app: &axum::Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let mut request = Request::builder().method(method).uri(path);

    let request = match body {
        Some(json_body) => {
            request = request.header("content-type", "application/json");
            request.body(Body::from(json_body.to_string())).unwrap()
        }
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(&body).ok()
    };

    (status, json_body)
}
