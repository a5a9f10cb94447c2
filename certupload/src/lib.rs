//! # certupload
//!
//! A library for uploading CA certificates to devices through their serial
//! console.
//!
//! The target firmware exposes a text console with a framed certificate
//! transfer (`set mqtt.cert.upload BEGIN`, one command per certificate line,
//! `set mqtt.cert.upload END`) and a status query (`get mqtt.cert.status`).
//! This crate provides:
//!
//! - a serial [`Port`] abstraction with a native implementation
//! - console command encoding and reply matching
//! - a certificate line source
//! - the [`Uploader`], which runs the transfer and reports what the device
//!   confirmed
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via the `serialport` crate
//! - `serde`: Serialization support for upload reports
//!
//! ## Example
//!
//! ```rust,no_run
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "native")]
//!     {
//!         let ok = certupload::upload("/dev/ttyUSB0", "mqtt_ca.crt")?;
//!         println!("uploaded: {ok}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod certificate;
pub mod error;
pub mod port;
pub mod protocol;
pub mod transcript;
pub mod uploader;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::NativePort;
#[cfg(feature = "native")]
pub use uploader::{upload, upload_with};
pub use {
    certificate::Certificate,
    error::{Error, Result},
    port::{Port, SerialConfig},
    protocol::console::ConsoleCommand,
    uploader::{BeginOutcome, CaStatus, UploadConfig, UploadReport, Uploader},
};
