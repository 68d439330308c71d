//! Bootstrap configuration loading and config file resolution
//!
//! Configuration is a single TOML file. Every field has a built-in default,
//! so a missing file (or a file that only sets a few keys) is valid.
//!
//! # Config File Priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`RRC_CONFIG`)
//! 3. Platform config directory (`~/.config/rrc/config.toml`, then
//!    `/etc/rrc/config.toml` on Linux)
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "RRC_CONFIG";

/// Allowed poll interval range (milliseconds)
pub const MIN_POLL_INTERVAL_MS: u64 = 100;
pub const MAX_POLL_INTERVAL_MS: u64 = 2000;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP port for the control-surface API
    pub port: u16,

    /// DAW web-remote connection
    pub daw: DawConfig,

    /// End-of-region polling and auto-advance
    pub navigation: NavigationConfig,

    /// Hardware MIDI controller
    pub midi: MidiConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: 5780,
            daw: DawConfig::default(),
            navigation: NavigationConfig::default(),
            midi: MidiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// DAW web-remote connection settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DawConfig {
    /// Base URL of the DAW web interface (no trailing `/_/`)
    pub base_url: String,

    /// Per-request timeout
    pub request_timeout_ms: u64,
}

impl Default for DawConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_ms: 1000,
        }
    }
}

impl DawConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// What the engine does when playback reaches the end of a region
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdvanceMode {
    /// Seek to the next item and keep playing
    #[default]
    Continue,
    /// Seek to the next item and pause there
    Cue,
    /// Never auto-advance
    Off,
}

impl std::fmt::Display for AdvanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvanceMode::Continue => write!(f, "continue"),
            AdvanceMode::Cue => write!(f, "cue"),
            AdvanceMode::Off => write!(f, "off"),
        }
    }
}

impl std::str::FromStr for AdvanceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(AdvanceMode::Continue),
            "cue" => Ok(AdvanceMode::Cue),
            "off" => Ok(AdvanceMode::Off),
            other => Err(Error::InvalidInput(format!(
                "Unknown advance mode '{}' (expected continue, cue or off)",
                other
            ))),
        }
    }
}

/// End-of-region polling settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NavigationConfig {
    /// Transport poll period
    pub poll_interval_ms: u64,

    /// Advance when the position is this close to the effective region end
    pub end_threshold_ms: u64,

    /// How far past the region end a late poll still counts as "in" the region
    pub overshoot_tolerance_ms: u64,

    /// Behaviour at the end of a region
    pub advance_mode: AdvanceMode,

    /// Re-read regions and markers every N polls
    pub region_refresh_ticks: u32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            end_threshold_ms: 300,
            overshoot_tolerance_ms: 2000,
            advance_mode: AdvanceMode::Continue,
            region_refresh_ticks: 8,
        }
    }
}

impl NavigationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// End threshold in seconds
    pub fn end_threshold_secs(&self) -> f64 {
        self.end_threshold_ms as f64 / 1000.0
    }

    /// Overshoot tolerance in seconds
    pub fn overshoot_tolerance_secs(&self) -> f64 {
        self.overshoot_tolerance_ms as f64 / 1000.0
    }
}

/// MIDI message kind a binding listens to
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MidiMessageKind {
    Note,
    Cc,
    Program,
}

/// One controller button/pad mapped to a control action
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MidiBinding {
    pub message: MidiMessageKind,
    /// Note, controller or program number (0-127)
    pub number: u8,
    /// Action name: play, pause, stop, toggle, next, previous, resume, item:<n>
    pub action: String,
}

/// Hardware MIDI controller settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct MidiConfig {
    pub enabled: bool,

    /// Input port name (substring match); first available port when unset
    pub port_name: Option<String>,

    /// 0-based MIDI channel filter; all channels when unset
    pub channel: Option<u8>,

    pub bindings: Vec<MidiBinding>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()
    }

    /// Read and parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check ranges and normalise values
    ///
    /// Out-of-range poll intervals are clamped with a warning; structurally
    /// invalid values are errors.
    pub fn validate(mut self) -> Result<Self> {
        let poll = self.navigation.poll_interval_ms;
        let clamped = poll.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
        if clamped != poll {
            warn!(
                "navigation.poll_interval_ms {} out of range, using {}",
                poll, clamped
            );
            self.navigation.poll_interval_ms = clamped;
        }

        if self.navigation.region_refresh_ticks == 0 {
            warn!("navigation.region_refresh_ticks 0 is invalid, using 1");
            self.navigation.region_refresh_ticks = 1;
        }

        let base = self.daw.base_url.trim().trim_end_matches('/').to_string();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "daw.base_url must be an http(s) URL, got '{}'",
                self.daw.base_url
            )));
        }
        self.daw.base_url = base;

        if self.daw.request_timeout_ms == 0 {
            return Err(Error::Config("daw.request_timeout_ms must be > 0".to_string()));
        }

        if let Some(channel) = self.midi.channel {
            if channel > 15 {
                return Err(Error::Config(format!(
                    "midi.channel must be 0-15, got {}",
                    channel
                )));
            }
        }
        for binding in &self.midi.bindings {
            if binding.number > 127 {
                return Err(Error::Config(format!(
                    "midi binding number must be 0-127, got {}",
                    binding.number
                )));
            }
        }

        Ok(self)
    }
}

/// Locates the config file following the priority order above
pub struct ConfigLocator {
    cli_path: Option<PathBuf>,
}

impl ConfigLocator {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Resolve the config file path, if any source names one
    ///
    /// Explicit sources (CLI, environment) are returned even when the file
    /// does not exist so the caller can report it; the platform locations
    /// are only returned when present.
    pub fn resolve(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Platform config locations
        Self::platform_candidates().into_iter().find(|p| p.exists())
    }

    fn platform_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("rrc").join("config.toml"));
        }
        if cfg!(target_os = "linux") {
            candidates.push(PathBuf::from("/etc/rrc/config.toml"));
        }
        candidates
    }

    /// Load configuration, falling back to defaults when no file is found
    ///
    /// A missing file is a warning, not an error. A file that exists but
    /// fails to parse or validate is an error.
    pub fn load(&self) -> Result<TomlConfig> {
        match self.resolve() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                TomlConfig::from_file(&path)
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                TomlConfig::default().validate()
            }
            None => {
                info!("No config file found, using built-in defaults");
                TomlConfig::default().validate()
            }
        }
    }
}
