//! Port abstraction for the serial channel to the device.
//!
//! The uploader talks to the device through the [`Port`] trait rather than a
//! concrete serial handle, which keeps the upload sequence independent of the
//! I/O backend:
//!
//! ```text
//! +------------------+
//! |     Uploader     |
//! | (console phases) |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! |    Port Trait    |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! | Native SerialPort|
//! |   (serialport)   |
//! +------------------+
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use certupload::port::Port;
//!
//! fn example<P: Port>(port: &mut P) -> certupload::Result<()> {
//!     port.clear_input()?;
//!     port.write_all_bytes(b"get mqtt.cert.status\r")?;
//!     Ok(())
//! }
//! ```

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::{Error, Result};

/// Baud rate the device console runs at.
pub const DEFAULT_BAUD: u32 = 115200;

/// Read timeout applied to every line read from the console.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Serial port configuration.
///
/// The console line format is fixed at 8N1 without flow control; only the
/// speed and the read timeout vary.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read/write timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// Create a configuration for the given port at the console defaults.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }

    /// Set the baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check that reads can wait for a reply at all.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(Error::Config("baud rate must be greater than zero".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Unified port trait for the device console.
///
/// Reads are expected to honour [`Port::timeout`]: a read with no data
/// available fails with [`std::io::ErrorKind::TimedOut`] (or returns `Ok(0)`)
/// once the timeout has passed.
pub trait Port: Read + Write + Send {
    /// Get the read timeout.
    fn timeout(&self) -> Duration;

    /// Discard bytes already received but not yet read.
    fn clear_input(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    /// Closing an already closed port is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

#[cfg(feature = "native")]
pub use native::NativePort;
