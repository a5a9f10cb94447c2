//! Certificate upload over the device console.
//!
//! The upload is a fixed sequence of phases, each one a command followed by a
//! bounded number of line reads:
//!
//! 1. settle: let the console come up and drop whatever it printed at boot
//! 2. begin: send the begin marker and wait for the device to accept
//! 3. stream: send each certificate line as its own command
//! 4. finish: send the end marker and look for the save confirmation
//! 5. verify: query the certificate status and look for the CA field
//!
//! Only the begin phase can abort the upload. A missing save confirmation or
//! status line is recorded in the [`UploadReport`] and the run carries on; the
//! upload counts as successful if either of them was seen.
//!
//! ## Example
//!
//! ```rust,no_run
//! use certupload::{Certificate, NativePort, SerialConfig, UploadConfig, Uploader};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let certificate = Certificate::from_file("mqtt_ca.crt")?;
//!     let port = NativePort::open(&SerialConfig::new("/dev/ttyUSB0"))?;
//!
//!     let mut uploader = Uploader::new(port, UploadConfig::default());
//!     let report = uploader.run(&certificate, &mut |sent, total| {
//!         println!("{sent}/{total} lines");
//!     })?;
//!
//!     println!("uploaded: {}", report.success());
//!     Ok(())
//! }
//! ```

use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::certificate::Certificate;
use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::console::{self, ConsoleCommand, DEVICE_CERT_CAPACITY};
use crate::transcript;

/// Delay after opening the port before flushing its input.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Delay after the begin marker before reading replies.
const BEGIN_WAIT: Duration = Duration::from_secs(2);

/// Delay after each certificate line, keeps the device input buffer from
/// overrunning.
const LINE_DELAY: Duration = Duration::from_millis(100);

/// Delay after the end marker before reading replies.
const END_WAIT: Duration = Duration::from_secs(1);

/// Delay after the status query before reading replies.
const STATUS_WAIT: Duration = Duration::from_secs(1);

/// Maximum line reads while waiting for the begin acknowledgement.
const BEGIN_ATTEMPTS: usize = 100;

/// Maximum line reads while waiting for the save confirmation.
const END_ATTEMPTS: usize = 20;

/// Maximum line reads while waiting for the status line.
const STATUS_ATTEMPTS: usize = 20;

/// Timing and retry limits for an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Delay after opening the port before flushing its input.
    pub settle_delay: Duration,
    /// Delay after the begin marker.
    pub begin_wait: Duration,
    /// Delay after each certificate line.
    pub line_delay: Duration,
    /// Delay after the end marker.
    pub end_wait: Duration,
    /// Delay after the status query.
    pub status_wait: Duration,
    /// Line reads allowed in the begin phase.
    pub begin_attempts: usize,
    /// Line reads allowed in the finish phase.
    pub end_attempts: usize,
    /// Line reads allowed in the verify phase.
    pub status_attempts: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            begin_wait: BEGIN_WAIT,
            line_delay: LINE_DELAY,
            end_wait: END_WAIT,
            status_wait: STATUS_WAIT,
            begin_attempts: BEGIN_ATTEMPTS,
            end_attempts: END_ATTEMPTS,
            status_attempts: STATUS_ATTEMPTS,
        }
    }
}

impl UploadConfig {
    /// Check that every phase gets at least one read.
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("begin_attempts", self.begin_attempts),
            ("end_attempts", self.end_attempts),
            ("status_attempts", self.status_attempts),
        ];
        for (name, attempts) in limits {
            if attempts == 0 {
                return Err(Error::Config(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }
}

/// How the device answered the begin marker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(tag = "status", rename_all = "snake_case")
)]
pub enum BeginOutcome {
    /// The device is ready to receive certificate lines.
    Ready,
    /// The device refused to start the upload.
    DeviceError {
        /// The console line reporting the error.
        line: String,
    },
    /// Nothing recognisable arrived within the attempt limit.
    NoResponse,
}

/// CA certificate status reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "snake_case")
)]
pub enum CaStatus {
    /// The device reports a stored CA certificate.
    Present,
    /// The device reports no stored CA certificate.
    Absent,
    /// No status line arrived within the attempt limit.
    NotReported,
}

/// Outcome of one upload run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UploadReport {
    /// Begin phase outcome.
    pub begin: BeginOutcome,
    /// Certificate lines written to the device.
    pub lines_sent: usize,
    /// Whether the device confirmed saving the certificate.
    pub saved: bool,
    /// CA status from the verify phase.
    pub ca_status: CaStatus,
}

impl UploadReport {
    fn aborted(begin: BeginOutcome) -> Self {
        Self {
            begin,
            lines_sent: 0,
            saved: false,
            ca_status: CaStatus::NotReported,
        }
    }

    /// Whether the upload succeeded.
    ///
    /// Either the save confirmation or an affirmative CA status is enough.
    pub fn success(&self) -> bool {
        self.saved || self.ca_status == CaStatus::Present
    }
}

/// Drives a certificate upload over a console port.
///
/// Generic over the port type `P`, so the same sequence runs against a real
/// serial port or an in-memory device.
pub struct Uploader<P: Port> {
    port: P,
    config: UploadConfig,
}

impl<P: Port> Uploader<P> {
    /// Create an uploader over an opened port.
    pub fn new(port: P, config: UploadConfig) -> Self {
        Self { port, config }
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Consume the uploader and return the underlying port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Run the whole upload and close the port.
    ///
    /// `progress` is called with `(lines_sent, total_lines)` after every
    /// certificate line. The port is closed before returning, whether the run
    /// succeeded, was aborted by the device or failed with an I/O error.
    pub fn run(
        &mut self,
        certificate: &Certificate,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<UploadReport> {
        let result = self.run_phases(certificate, progress);
        let closed = self
            .port
            .close();
        let report = result?;
        closed?;
        Ok(report)
    }

    fn run_phases(
        &mut self,
        certificate: &Certificate,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<UploadReport> {
        let size = certificate.stored_size();
        if size >= DEVICE_CERT_CAPACITY {
            warn!(
                "Certificate is {size} bytes; the device only loads certificates smaller than {DEVICE_CERT_CAPACITY} bytes"
            );
        }

        self.settle()?;

        let begin = self.begin()?;
        if begin != BeginOutcome::Ready {
            return Ok(UploadReport::aborted(begin));
        }

        let lines_sent = self.stream(certificate, progress)?;
        let saved = self.finish()?;
        let ca_status = self.verify()?;

        let report = UploadReport {
            begin,
            lines_sent,
            saved,
            ca_status,
        };
        if report.success() {
            info!("Certificate upload confirmed");
        } else {
            error!("Certificate upload not confirmed by the device");
        }
        Ok(report)
    }

    /// Wait for the console to come up, then drop any buffered input.
    pub fn settle(&mut self) -> Result<()> {
        debug!("Settling console on {}", self.port.name());
        thread::sleep(self.config.settle_delay);
        self.port
            .clear_input()
    }

    /// Send the begin marker and wait for the device to accept the upload.
    pub fn begin(&mut self) -> Result<BeginOutcome> {
        self.send(&ConsoleCommand::UploadBegin)?;
        thread::sleep(self.config.begin_wait);

        let outcome = self.poll(self.config.begin_attempts, |line| {
            if console::is_ready_ack(line) {
                Some(BeginOutcome::Ready)
            } else if console::is_upload_error(line) {
                Some(BeginOutcome::DeviceError {
                    line: line.to_string(),
                })
            } else {
                None
            }
        })?;

        let outcome = outcome.unwrap_or(BeginOutcome::NoResponse);
        match &outcome {
            BeginOutcome::Ready => info!("Upload started"),
            BeginOutcome::DeviceError { line } => error!("Device refused upload: {line}"),
            BeginOutcome::NoResponse => error!("Failed to start upload (no response)"),
        }
        Ok(outcome)
    }

    /// Send every certificate line, returning how many were written.
    ///
    /// One reply line is read after each command and dropped; per-line
    /// acceptance is not checked.
    pub fn stream(
        &mut self,
        certificate: &Certificate,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<usize> {
        let total = certificate.line_count();
        info!("Uploading {total} certificate lines");

        let mut sent = 0;
        for line in certificate.lines() {
            self.send(&ConsoleCommand::UploadLine(line))?;
            thread::sleep(self.config.line_delay);
            self.read_line()?;

            sent += 1;
            progress(sent, total);
        }
        Ok(sent)
    }

    /// Send the end marker and look for the save confirmation.
    pub fn finish(&mut self) -> Result<bool> {
        self.send(&ConsoleCommand::UploadEnd)?;
        thread::sleep(self.config.end_wait);

        let saved = self
            .poll(self.config.end_attempts, |line| {
                console::is_saved_ack(line).then_some(())
            })?
            .is_some();

        if saved {
            info!("Device saved the certificate");
        } else {
            warn!("No save confirmation from device");
        }
        Ok(saved)
    }

    /// Query the certificate status and read the CA field.
    ///
    /// Stops at the first line carrying the field, whatever its value.
    pub fn verify(&mut self) -> Result<CaStatus> {
        self.send(&ConsoleCommand::CertStatus)?;
        thread::sleep(self.config.status_wait);

        let status = match self.poll(self.config.status_attempts, console::parse_ca_status)? {
            Some(true) => CaStatus::Present,
            Some(false) => CaStatus::Absent,
            None => CaStatus::NotReported,
        };

        match status {
            CaStatus::Present => info!("Device reports CA certificate present"),
            CaStatus::Absent => warn!("Device reports no CA certificate"),
            CaStatus::NotReported => warn!("No certificate status from device"),
        }
        Ok(status)
    }

    fn send(&mut self, command: &ConsoleCommand<'_>) -> Result<()> {
        debug!(">> {}", command.text());
        self.port
            .write_all_bytes(&command.encode())
    }

    fn read_line(&mut self) -> Result<String> {
        let timeout = self
            .port
            .timeout();
        transcript::read_line(&mut self.port, timeout)
    }

    /// Read up to `attempts` lines, stopping at the first non-empty line
    /// `matcher` accepts.
    fn poll<T>(
        &mut self,
        attempts: usize,
        mut matcher: impl FnMut(&str) -> Option<T>,
    ) -> Result<Option<T>> {
        for _ in 0..attempts {
            let line = self.read_line()?;
            if line.is_empty() {
                continue;
            }
            if let Some(found) = matcher(&line) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

/// Open a native serial port and run a full upload on it.
///
/// Both configurations are validated before the port is opened.
#[cfg(feature = "native")]
pub fn upload_with(
    serial: &crate::port::SerialConfig,
    certificate: &Certificate,
    config: &UploadConfig,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<UploadReport> {
    serial.validate()?;
    config.validate()?;
    let port = crate::port::NativePort::open(serial)?;
    info!("Uploading certificate to {}", serial.port_name);
    Uploader::new(port, config.clone()).run(certificate, progress)
}

/// Upload a certificate file to the device on `port_name` with the console
/// defaults.
///
/// The file is read before the port is opened. Returns whether the device
/// confirmed the upload.
#[cfg(feature = "native")]
pub fn upload(port_name: &str, certificate_path: impl AsRef<std::path::Path>) -> Result<bool> {
    let certificate = Certificate::from_file(certificate_path)?;
    let report = upload_with(
        &crate::port::SerialConfig::new(port_name),
        &certificate,
        &UploadConfig::default(),
        &mut |_, _| {},
    )?;
    Ok(report.success())
}
