//! RRC Remote - Main entry point
//!
//! Loads configuration, starts the navigation engine against the DAW (or a
//! simulated one), optionally listens to a MIDI controller, and serves the
//! control-surface API until Ctrl+C / SIGTERM.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use rrc_common::config::{ConfigLocator, TomlConfig};
use rrc_common::events::EventBus;
use rrc_remote::daw::{DawClient, HttpDawClient, SimulatedDaw};
use rrc_remote::midi::MidiMap;
use rrc_remote::NavigationEngine;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Event channel capacity; slow SSE clients lag beyond this
const EVENT_CAPACITY: usize = 256;

/// Command-line arguments for rrc-remote
#[derive(Parser, Debug)]
#[command(name = "rrc-remote")]
#[command(about = "Region remote control for a DAW web interface")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config)
    #[arg(short, long, env = "RRC_PORT")]
    port: Option<u16>,

    /// Config file path
    #[arg(short, long, env = "RRC_CONFIG")]
    config: Option<PathBuf>,

    /// DAW web-remote base URL (overrides config)
    #[arg(long, env = "RRC_DAW_URL")]
    daw_url: Option<String>,

    /// Transport poll interval in milliseconds (overrides config)
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Run against a built-in simulated DAW instead of a real one
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config loading logs to a temporary stderr subscriber; the configured
    // one needs the loaded level and file
    let config = tracing::subscriber::with_default(
        tracing_subscriber::fmt().with_writer(std::io::stderr).finish(),
        || load_config(&args),
    )?;

    init_tracing(&config)?;

    info!(
        "Starting rrc-remote {} ({}, {} build, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    let daw: Arc<dyn DawClient> = if args.simulate {
        info!("Using simulated DAW (demo project)");
        Arc::new(SimulatedDaw::demo_project())
    } else {
        info!("DAW web remote: {}", config.daw.base_url);
        Arc::new(HttpDawClient::from_config(&config.daw).context("Failed to create DAW client")?)
    };

    let events = Arc::new(EventBus::new(EVENT_CAPACITY));
    let engine = Arc::new(NavigationEngine::new(daw, &config.navigation, events));
    info!(
        "Navigation: poll {}ms, end threshold {}ms, advance mode {}",
        config.navigation.poll_interval_ms,
        config.navigation.end_threshold_ms,
        config.navigation.advance_mode
    );
    engine.start();

    // Held for the life of the process; dropping it closes the port
    let _midi = start_midi(&config, &engine)?;

    rrc_remote::api::run(config.port, Arc::clone(&engine), shutdown_signal())
        .await
        .context("HTTP server failed")?;

    engine.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

fn load_config(args: &Args) -> Result<TomlConfig> {
    let mut config = ConfigLocator::new(args.config.clone())
        .load()
        .context("Failed to load configuration")?;

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(url) = &args.daw_url {
        config.daw.base_url = url.clone();
    }
    if let Some(ms) = args.poll_interval_ms {
        config.navigation.poll_interval_ms = ms;
    }

    // Overrides go through the same checks as the file
    config.validate().context("Invalid configuration")
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "rrc_remote={level},rrc_common={level},tower_http=info",
            level = config.logging.level
        ))
    });

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

/// Wire the MIDI controller to the engine when enabled
#[cfg(feature = "midi-input")]
fn start_midi(
    config: &TomlConfig,
    engine: &Arc<NavigationEngine>,
) -> Result<Option<rrc_remote::midi::MidiListener>> {
    if !config.midi.enabled {
        return Ok(None);
    }

    let map = MidiMap::from_config(&config.midi)?;
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    rrc_remote::midi::spawn_dispatcher(Arc::clone(engine), rx);

    // A missing controller should not keep the show from starting
    match rrc_remote::midi::MidiListener::open(config.midi.port_name.as_deref(), map, tx) {
        Ok(listener) => {
            info!("MIDI controller on '{}'", listener.port_name());
            Ok(Some(listener))
        }
        Err(e) => {
            warn!("MIDI controller unavailable: {}", e);
            Ok(None)
        }
    }
}

#[cfg(not(feature = "midi-input"))]
fn start_midi(config: &TomlConfig, _engine: &Arc<NavigationEngine>) -> Result<Option<()>> {
    if config.midi.enabled {
        // Still validate bindings so config errors surface in every build
        let map = MidiMap::from_config(&config.midi)?;
        warn!(
            "midi.enabled is set ({} bindings) but this build lacks the midi-input feature",
            map.len()
        );
    }
    Ok(None)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
