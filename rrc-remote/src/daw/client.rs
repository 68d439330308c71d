//! DAW client trait and the HTTP web-remote implementation

use super::protocol::{
    self, BeatPosition, Command, TransportInfo, ACTION_PAUSE, ACTION_PLAY, ACTION_PLAY_STOP,
    ACTION_STOP,
};
use crate::error::{Error, Result};
use crate::regions::{Marker, Region};
use async_trait::async_trait;
use rrc_common::config::DawConfig;
use std::time::Duration;
use tracing::debug;

/// State read from the DAW in one round trip
#[derive(Debug, Clone, PartialEq)]
pub struct DawSnapshot {
    pub transport: TransportInfo,
    pub beat: Option<BeatPosition>,
    /// Present only when lists were requested
    pub regions: Option<Vec<Region>>,
    pub markers: Option<Vec<Marker>>,
}

/// Operations the navigation engine needs from the DAW
#[async_trait]
pub trait DawClient: Send + Sync {
    /// Read transport (and optionally region/marker lists)
    async fn snapshot(&self, include_lists: bool) -> Result<DawSnapshot>;

    /// Move the edit/play cursor (seconds)
    async fn seek(&self, position: f64) -> Result<()>;

    /// Run a DAW action by command id
    async fn run_action(&self, action_id: u32) -> Result<()>;

    async fn transport(&self) -> Result<TransportInfo> {
        Ok(self.snapshot(false).await?.transport)
    }

    async fn play(&self) -> Result<()> {
        self.run_action(ACTION_PLAY).await
    }

    async fn pause(&self) -> Result<()> {
        self.run_action(ACTION_PAUSE).await
    }

    async fn stop(&self) -> Result<()> {
        self.run_action(ACTION_STOP).await
    }

    async fn play_stop(&self) -> Result<()> {
        self.run_action(ACTION_PLAY_STOP).await
    }
}

/// Client for the DAW's built-in web remote
pub struct HttpDawClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpDawClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Daw(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &DawConfig) -> Result<Self> {
        Self::new(config.base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send commands and return the raw response body
    async fn request(&self, commands: &[Command]) -> Result<String> {
        let url = format!("{}/_/{}", self.base_url, protocol::request_path(commands));
        debug!("DAW request: {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Daw(format!("Request to {} failed: {}", self.base_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Daw(format!("DAW returned HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Daw(format!("Failed to read DAW response: {}", e)))
    }
}

#[async_trait]
impl DawClient for HttpDawClient {
    async fn snapshot(&self, include_lists: bool) -> Result<DawSnapshot> {
        let mut commands = vec![Command::Transport, Command::BeatPosition];
        if include_lists {
            commands.push(Command::Regions);
            commands.push(Command::Markers);
        }

        let body = self.request(&commands).await?;
        let response = protocol::parse_response(&body)?;

        let transport = response
            .transport
            .ok_or_else(|| Error::Protocol("Response has no TRANSPORT record".to_string()))?;

        if include_lists && (response.regions.is_none() || response.markers.is_none()) {
            return Err(Error::Protocol(
                "Response is missing the region or marker list".to_string(),
            ));
        }

        Ok(DawSnapshot {
            transport,
            beat: response.beat,
            regions: response.regions,
            markers: response.markers,
        })
    }

    async fn seek(&self, position: f64) -> Result<()> {
        self.request(&[Command::SetPosition(position)]).await?;
        Ok(())
    }

    async fn run_action(&self, action_id: u32) -> Result<()> {
        self.request(&[Command::Action(action_id)]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpDawClient::new("http://127.0.0.1:8080/", Duration::from_millis(500)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_unreachable_daw_is_daw_error() {
        // Port 9 (discard) on localhost is closed on test machines
        let client = HttpDawClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let result = client.snapshot(false).await;
        assert!(matches!(result, Err(Error::Daw(_))));
    }
}
