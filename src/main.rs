//! # UAV Relay
//!
//! Bridges a flight controller's serial link to a point-to-point radio and
//! a mesh network.
//!
//! Usage: `uav-relay [config.toml]` (defaults to `config/default.toml`).

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use uav_relay::config::Config;
use uav_relay::link::monitor::{ConnectivityMonitor, LinkEvent, RelayEndpoint};
use uav_relay::relay::{Relay, Transports};
use uav_relay::serial::{candidate_paths, FcSerial};
use uav_relay::telemetry::logger::{self, TelemetryLogger, DEFAULT_CHANNEL_CAPACITY};
use uav_relay::transport::datagram::DatagramTransport;
use uav_relay::transport::{Transport, TransportKind};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging (`RUST_LOG` overrides the INFO default)
///    - Load configuration
///    - Bind the radio/mesh transports and open the flight controller port
///      (configured device first, then the default device paths)
///    - Seed the Connectivity Monitor with the configured peers
///
/// 2. **Relay**
///    - Uplink: serial frames fan out to every peer while the link is up
///    - Downlink: datagrams from any peer are written to serial
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C clears the running flag, both tasks exit
///    - Final statistics are logged
///
/// # Errors
///
/// Returns error if the configuration is invalid, a socket cannot be bound,
/// or the serial port cannot be opened
#[tokio::main]
async fn main() -> Result<()> {
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("UAV Relay v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    info!("Loaded configuration from {}", config_path);

    let monitor = ConnectivityMonitor::new();
    monitor.handle(LinkEvent::Started);

    let mut transports = Transports::default();
    let mut endpoints = Vec::new();

    if config.radio.enabled {
        let radio =
            DatagramTransport::bind(TransportKind::Radio, config.radio.bind, config.radio.max_payload)
                .await
                .context("Failed to bind radio transport")?;
        transports.radio = Some(Arc::new(radio) as Arc<dyn Transport>);
        endpoints.extend(
            config
                .radio
                .peers
                .iter()
                .map(|peer| RelayEndpoint::new(TransportKind::Radio, *peer)),
        );
    }

    if config.mesh.enabled {
        let mesh =
            DatagramTransport::bind(TransportKind::Mesh, config.mesh.bind, config.mesh.max_payload)
                .await
                .context("Failed to bind mesh transport")?;
        transports.mesh = Some(Arc::new(mesh) as Arc<dyn Transport>);
        endpoints.extend(
            config
                .mesh
                .peers
                .iter()
                .map(|peer| RelayEndpoint::new(TransportKind::Mesh, *peer)),
        );
    }

    if endpoints.is_empty() {
        warn!("No peers configured; serial traffic will be dropped");
    }
    monitor.handle(LinkEvent::RoutingTableAdd(endpoints));
    monitor.handle(LinkEvent::ParentConnected {
        layer: config.mesh.layer,
    });

    let serial = FcSerial::open_with_paths(
        &candidate_paths(&config.serial.port),
        config.serial.baud_rate,
    )
    .context("Failed to open flight controller serial port")?;
    info!("Flight controller serial port opened at: {}", serial.device_path());
    let (serial_rx, serial_tx) = serial.split();

    let mut relay = Relay::new(
        config.relay.profile,
        config.relay_options(),
        transports,
        monitor.watch(),
    );

    let telemetry_task = if config.telemetry.enabled {
        let telemetry_logger = TelemetryLogger::new(
            &config.telemetry.log_dir,
            config.telemetry.max_records_per_file,
            config.telemetry.max_files_to_keep,
        )
        .context("Failed to create telemetry log directory")?;
        let (sink, task) = logger::spawn(telemetry_logger, DEFAULT_CHANNEL_CAPACITY);
        relay = relay.with_telemetry(sink);
        info!("Telemetry log enabled in {}", config.telemetry.log_dir);
        Some(task)
    } else {
        None
    };

    let handle = relay.spawn(serial_rx, serial_tx);
    let stats = handle.stats();
    info!("Press Ctrl+C to exit");

    let relay_done = handle.join();
    tokio::pin!(relay_done);

    let outcome = tokio::select! {
        outcome = &mut relay_done => {
            warn!("Relay tasks stopped on their own, shutting down...");
            outcome
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C, shutting down...");
            monitor.handle(LinkEvent::Stopped);
            monitor.shutdown();
            relay_done.await
        }
    };
    if let Err(e) = outcome {
        warn!("Relay ended with error: {}", e);
    }

    // The relay's sink clones are gone; the writer drains and flushes
    if let Some(task) = telemetry_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Telemetry log flush failed: {}", e),
            Err(e) => warn!("Telemetry log task failed: {}", e),
        }
    }

    stats.log();
    Ok(())
}
