//! # Serial Communication Module
//!
//! Handles the serial link to the sensor.
//!
//! This module handles:
//! - Opening the sensor port (8N1, no flow control, default 9600 baud)
//! - Reading newline-terminated text frames with a bounded wait
//! - Listing the serial ports present on the host
//! - Operator hints when the port cannot be opened for permission reasons

pub mod port_trait;

pub use port_trait::FrameSource;

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::{Result, SensorError};

/// Default sensor baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Frame terminator
const LINE_TERMINATOR: u8 = b'\n';

/// A serial port found on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path (e.g. /dev/ttyUSB0, /dev/cu.usbmodem1101, COM3)
    pub name: String,
    /// Human readable description
    pub description: String,
}

/// Line-oriented channel to the sensor.
///
/// Generic over the byte stream so tests can drive it with an in-memory
/// reader; in production `R` is a [`tokio_serial::SerialStream`].
pub struct SerialChannel<R = tokio_serial::SerialStream> {
    /// Buffered reader, `None` once closed
    reader: Option<BufReader<R>>,
    /// Bytes of a line that has not been terminated yet
    pending: Vec<u8>,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl<R> std::fmt::Debug for SerialChannel<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("device_path", &self.device_path)
            .field("open", &self.reader.is_some())
            .finish_non_exhaustive()
    }
}

impl SerialChannel {
    /// Open the sensor port
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Line speed, normally [`DEFAULT_BAUD_RATE`]
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Connection`] if the device cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sensor_logger::serial::{SerialChannel, DEFAULT_BAUD_RATE};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let channel = SerialChannel::open("/dev/ttyUSB0", DEFAULT_BAUD_RATE)?;
    ///     println!("Connected to: {}", channel.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        debug!("Opening serial port {} at {} baud", path, baud_rate);

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                if is_permission_denied(&e) {
                    warn!("{}", permission_hint(path));
                }
                SensorError::Connection(format!("Failed to open {}: {}", path, e))
            })?;

        info!("Connection successful: {}, {} baud", path, baud_rate);
        Ok(Self::from_reader(path, port))
    }
}

impl<R> SerialChannel<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Wrap an already-open byte stream
    pub fn from_reader(device_path: &str, reader: R) -> Self {
        Self {
            reader: Some(BufReader::new(reader)),
            pending: Vec::new(),
            device_path: device_path.to_string(),
        }
    }

    /// Get the device path of the channel
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Undecodable lines are dropped and count as a missed sample
    fn take_line(&mut self) -> Option<String> {
        let bytes = std::mem::take(&mut self.pending);
        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                warn!("Discarding undecodable frame from {}: {}", self.device_path, e);
                return None;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        debug!("Received frame ({} bytes)", line.len());
        Some(line.to_string())
    }
}

#[async_trait]
impl<R> FrameSource for SerialChannel<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(SensorError::Read(format!("{} is closed", self.device_path)));
        };

        // `read_until` appends into `pending`, so a line cut by the timeout
        // is completed by the next call.
        match tokio::time::timeout(timeout, reader.read_until(LINE_TERMINATOR, &mut self.pending)).await {
            Err(_) => Ok(None),
            Ok(Err(e)) => Err(SensorError::Read(format!(
                "Failed to read from {}: {}", self.device_path, e
            ))),
            Ok(Ok(0)) if self.pending.is_empty() => Err(SensorError::Read(format!(
                "{} closed the stream", self.device_path
            ))),
            Ok(Ok(_)) => Ok(self.take_line()),
        }
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            self.pending.clear();
            info!("Serial port connection closed: {}", self.device_path);
        }
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn name(&self) -> &str {
        &self.device_path
    }
}

/// List serial ports present on the host
///
/// # Errors
///
/// Returns [`SensorError::Connection`] if the platform enumeration fails.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| SensorError::Connection(format!("Failed to enumerate serial ports: {}", e)))?;

    if ports.is_empty() {
        warn!("No serial ports found!");
        if cfg!(target_os = "macos") {
            info!("On macOS, you can check ports with: ls /dev/cu.*");
        }
    }

    Ok(ports
        .into_iter()
        .map(|port| PortInfo {
            description: describe_port_type(&port.port_type),
            name: port.port_name,
        })
        .collect())
}

fn describe_port_type(port_type: &tokio_serial::SerialPortType) -> String {
    match port_type {
        tokio_serial::SerialPortType::UsbPort(info) => info
            .product
            .clone()
            .or_else(|| info.manufacturer.clone())
            .unwrap_or_else(|| format!("USB device {:04x}:{:04x}", info.vid, info.pid)),
        tokio_serial::SerialPortType::PciPort => "PCI serial port".to_string(),
        tokio_serial::SerialPortType::BluetoothPort => "Bluetooth serial port".to_string(),
        tokio_serial::SerialPortType::Unknown => "Unknown".to_string(),
    }
}

fn is_permission_denied(e: &tokio_serial::Error) -> bool {
    matches!(e.kind(), tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied))
        || e.to_string().contains("Permission denied")
}

/// Remediation text shown to the operator when the port is not accessible
fn permission_hint(path: &str) -> String {
    if cfg!(target_os = "linux") {
        format!(
            "Permission denied on {path}. Try: sudo chmod 666 {path} (or add your user to the dialout group)"
        )
    } else {
        format!("Permission denied on {path}. Try this command in Terminal: sudo chmod 666 {path}")
    }
}
