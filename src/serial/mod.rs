//! # Serial Communication Module
//!
//! Handles the wired link to the flight controller.
//!
//! This module handles:
//! - Opening the UART at the configured baud rate (8N1, no flow control)
//! - Splitting the port into an owned read half and write half
//! - Writing frames back to the flight controller

pub mod port_trait;

use tokio::io::{ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use port_trait::{SerialPortIO, TokioSerialPort};

/// Default flight controller baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-serial adapters
    "/dev/ttyACM0", // USB CDC flight controllers
    "/dev/ttyS0",   // On-board UART
];

/// Configured device first, then the defaults not already listed
pub fn candidate_paths(configured: &str) -> Vec<&str> {
    let mut paths = vec![configured];
    paths.extend(
        DEFAULT_DEVICE_PATHS
            .iter()
            .copied()
            .filter(|path| *path != configured),
    );
    paths
}

/// Read half owned by the uplink task
pub type SerialRx = TokioSerialPort<ReadHalf<SerialStream>>;

/// Write half owned by the downlink task
pub type SerialTx = TokioSerialPort<WriteHalf<SerialStream>>;

/// Flight controller serial port
pub struct FcSerial {
    /// Serial port handle
    port: SerialStream,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for FcSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl FcSerial {
    /// Open the first of `paths` that succeeds
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyUSB0"])
    /// * `baud_rate` - Line speed
    ///
    /// # Errors
    ///
    /// `SerialPortNotFound` listing every path tried
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened flight controller port {} at {} baud", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(RelayError::SerialPortNotFound(paths.join(", ")))
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| RelayError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Split into independently owned read and write halves
    pub fn split(self) -> (SerialRx, SerialTx) {
        let (rx, tx) = tokio::io::split(self.port);
        (TokioSerialPort::new(rx), TokioSerialPort::new(tx))
    }
}

/// Writes packets to the flight controller
pub struct SerialWriter<W: SerialPortIO> {
    port: W,
}

impl<W: SerialPortIO> SerialWriter<W> {
    pub fn new(port: W) -> Self {
        Self { port }
    }

    /// Write one packet and flush
    ///
    /// # Errors
    ///
    /// `Serial` if the write or flush fails
    pub async fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port
            .write_all(packet)
            .await
            .map_err(|e| RelayError::Serial(format!("Failed to write packet: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| RelayError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent packet to flight controller ({} bytes)", packet.len());
        Ok(())
    }
}
