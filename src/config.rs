//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::message::record::PACKET_SIZE;
use crate::relay::{Profile, RelayOptions};
use crate::transport::datagram::{MESH_MAX_PAYLOAD, RADIO_MAX_PAYLOAD};

/// Largest UDP payload over IPv4
const MAX_DATAGRAM_PAYLOAD: usize = 65_507;

/// Baud rates accepted for the flight controller link
const VALID_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub serial: SerialConfig,
    pub relay: RelayConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub mesh: MeshConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Flight controller serial link
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

/// Relay behaviour
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_profile")]
    pub profile: Profile,

    #[serde(default = "default_frame_capacity")]
    pub frame_capacity: usize,

    #[serde(default)]
    pub reencode: bool,

    /// 0 disables the beacon
    #[serde(default = "default_beacon_interval_ms")]
    pub beacon_interval_ms: u64,

    #[serde(default = "default_stats_interval_frames")]
    pub stats_interval_frames: u64,
}

/// Point-to-point radio
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_radio_bind")]
    pub bind: SocketAddr,

    #[serde(default)]
    pub peers: Vec<SocketAddr>,

    #[serde(default = "default_radio_max_payload")]
    pub max_payload: usize,
}

/// Mesh network
#[derive(Debug, Deserialize, Clone)]
pub struct MeshConfig {
    #[serde(default = "default_mesh_enabled")]
    pub enabled: bool,

    #[serde(default = "default_mesh_bind")]
    pub bind: SocketAddr,

    #[serde(default)]
    pub peers: Vec<SocketAddr>,

    #[serde(default = "default_mesh_max_payload")]
    pub max_payload: usize,

    /// Layer reported once the parent link is up
    #[serde(default = "default_mesh_layer")]
    pub layer: u8,
}

/// Telemetry record log
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_poll_interval_ms() -> u64 { 10 }
fn default_read_buffer_size() -> usize { 256 }

fn default_profile() -> Profile { Profile::Custom }
fn default_frame_capacity() -> usize { 512 }
fn default_beacon_interval_ms() -> u64 { 5000 }
fn default_stats_interval_frames() -> u64 { 1000 }

fn default_radio_bind() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 14550)) }
fn default_radio_max_payload() -> usize { RADIO_MAX_PAYLOAD }

fn default_mesh_enabled() -> bool { true }
fn default_mesh_bind() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 14560)) }
fn default_mesh_max_payload() -> usize { MESH_MAX_PAYLOAD }
fn default_mesh_layer() -> u8 { 2 }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_radio_bind(),
            peers: Vec::new(),
            max_payload: default_radio_max_payload(),
        }
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            enabled: default_mesh_enabled(),
            bind: default_mesh_bind(),
            peers: Vec::new(),
            max_payload: default_mesh_max_payload(),
            layer: default_mesh_layer(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> RelayError {
    RelayError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use uav_relay::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    ///
    /// # Errors
    ///
    /// `Config` if parsing or validation fails
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Relay tunables derived from the `[serial]` and `[relay]` sections
    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            frame_capacity: self.relay.frame_capacity,
            reencode: self.relay.reencode,
            beacon_interval: match self.relay.beacon_interval_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            stats_interval_frames: self.relay.stats_interval_frames,
            read_buffer_size: self.serial.read_buffer_size,
            poll_interval: Duration::from_millis(self.serial.poll_interval_ms),
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Serial
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !VALID_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {:?}",
                VALID_BAUD_RATES
            )));
        }

        if self.serial.poll_interval_ms == 0 || self.serial.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be between 1 and 1000"));
        }

        if self.serial.read_buffer_size == 0 || self.serial.read_buffer_size > 65536 {
            return Err(invalid("read_buffer_size must be between 1 and 65536"));
        }

        // Relay
        if self.relay.frame_capacity < PACKET_SIZE || self.relay.frame_capacity > 65536 {
            return Err(invalid(format!(
                "frame_capacity must be between {} and 65536",
                PACKET_SIZE
            )));
        }

        // Transports
        if !self.radio.enabled && !self.mesh.enabled {
            return Err(invalid("at least one of radio or mesh must be enabled"));
        }

        if self.radio.max_payload == 0 || self.radio.max_payload > 256 {
            return Err(invalid("radio max_payload must be between 1 and 256"));
        }

        if self.mesh.max_payload == 0 || self.mesh.max_payload > MAX_DATAGRAM_PAYLOAD {
            return Err(invalid(format!(
                "mesh max_payload must be between 1 and {}",
                MAX_DATAGRAM_PAYLOAD
            )));
        }

        if self.mesh.layer == 0 {
            return Err(invalid("mesh layer must be at least 1"));
        }

        // Telemetry log
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config {
            serial: SerialConfig {
                port: default_serial_port(),
                baud_rate: default_baud_rate(),
                poll_interval_ms: default_poll_interval_ms(),
                read_buffer_size: default_read_buffer_size(),
            },
            relay: RelayConfig {
                profile: default_profile(),
                frame_capacity: default_frame_capacity(),
                reencode: false,
                beacon_interval_ms: default_beacon_interval_ms(),
                stats_interval_frames: default_stats_interval_frames(),
            },
            radio: RadioConfig::default(),
            mesh: MeshConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    fn assert_config_error(config: &Config, expected: &str) {
        match config.validate() {
            Err(RelayError::Config(e)) => {
                assert!(
                    e.to_string().contains(expected),
                    "Expected error containing {:?}, got: {}",
                    expected,
                    e
                );
            }
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_default_config() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = create_valid_config();
        config.serial.port = String::new();
        assert_config_error(&config, "serial port");
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.serial.baud_rate = 420000;
        assert_config_error(&config, "baud_rate");
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in VALID_BAUD_RATES {
            let mut config = create_valid_config();
            config.serial.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_poll_interval_bounds() {
        let mut config = create_valid_config();
        config.serial.poll_interval_ms = 0;
        assert_config_error(&config, "poll_interval_ms");

        config.serial.poll_interval_ms = 1001;
        assert_config_error(&config, "poll_interval_ms");

        config.serial.poll_interval_ms = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frame_capacity_must_hold_a_record() {
        let mut config = create_valid_config();
        config.relay.frame_capacity = PACKET_SIZE - 1;
        assert_config_error(&config, "frame_capacity");

        config.relay.frame_capacity = PACKET_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_requires_a_network_transport() {
        let mut config = create_valid_config();
        config.radio.enabled = false;
        config.mesh.enabled = false;
        assert_config_error(&config, "at least one");

        config.radio.enabled = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_radio_payload_cap() {
        let mut config = create_valid_config();
        config.radio.max_payload = 257;
        assert_config_error(&config, "radio max_payload");

        config.radio.max_payload = 0;
        assert_config_error(&config, "radio max_payload");
    }

    #[test]
    fn test_mesh_layer_zero() {
        let mut config = create_valid_config();
        config.mesh.layer = 0;
        assert_config_error(&config, "mesh layer");
    }

    #[test]
    fn test_telemetry_limits() {
        let mut config = create_valid_config();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert_config_error(&config, "log_dir");

        let mut config = create_valid_config();
        config.telemetry.max_records_per_file = 0;
        assert_config_error(&config, "max_records_per_file");

        let mut config = create_valid_config();
        config.telemetry.max_files_to_keep = 0;
        assert_config_error(&config, "max_files_to_keep");
    }

    #[test]
    fn test_relay_options_mapping() {
        let mut config = create_valid_config();
        config.relay.reencode = true;
        config.serial.poll_interval_ms = 25;

        let options = config.relay_options();
        assert!(options.reencode);
        assert_eq!(options.poll_interval, Duration::from_millis(25));
        assert_eq!(options.beacon_interval, Some(Duration::from_millis(5000)));
        assert_eq!(options.frame_capacity, 512);

        config.relay.beacon_interval_ms = 0;
        assert_eq!(config.relay_options().beacon_interval, None);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config = Config::from_toml("[serial]\n[relay]\n").unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.relay.profile, Profile::Custom);
        assert!(!config.radio.enabled);
        assert!(config.mesh.enabled);
        assert_eq!(config.mesh.max_payload, 1456);
        assert!(!config.telemetry.enabled);
    }

    #[test]
    fn test_missing_relay_section_is_error() {
        match Config::from_toml("[serial]\n") {
            Err(RelayError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_parses_peers_and_profile() {
        let toml_content = r#"
[serial]
port = "/dev/ttyAMA0"
baud_rate = 57600

[relay]
profile = "mavlink"
reencode = true

[radio]
enabled = true
bind = "0.0.0.0:15000"
peers = ["192.168.4.2:15000"]

[mesh]
enabled = false
"#;
        let config = Config::from_toml(toml_content).unwrap();
        assert_eq!(config.relay.profile, Profile::Mavlink);
        assert_eq!(config.radio.peers, vec!["192.168.4.2:15000".parse::<SocketAddr>().unwrap()]);
        assert_eq!(config.radio.max_payload, 250);
        assert!(!config.mesh.enabled);
    }

    #[test]
    fn test_bad_peer_address_is_error() {
        let toml_content = "[serial]\n[relay]\n[mesh]\npeers = [\"not-an-address\"]\n";
        assert!(matches!(Config::from_toml(toml_content), Err(RelayError::Config(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyUSB1"

[relay]

[mesh]
peers = ["10.0.0.2:14560", "10.0.0.3:14560"]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB1");
        assert_eq!(config.mesh.peers.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        match Config::load("/nonexistent/uav-relay.toml") {
            Err(RelayError::Io(_)) => {}
            other => panic!("Expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn test_shipped_default_config_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        assert!(Config::load(path).is_ok());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "/dev/ttyUSB0");
        assert_eq!(default_baud_rate(), 115200);
        assert_eq!(default_poll_interval_ms(), 10);
        assert_eq!(default_read_buffer_size(), 256);
        assert_eq!(default_frame_capacity(), 512);
        assert_eq!(default_beacon_interval_ms(), 5000);
        assert_eq!(default_radio_max_payload(), 250);
        assert_eq!(default_mesh_max_payload(), 1456);
        assert_eq!(default_mesh_layer(), 2);
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_max_records_per_file(), 10000);
        assert_eq!(default_max_files_to_keep(), 10);
    }
}
