//! Error types for certupload.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for certupload operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for certupload operations.
///
/// Only hard failures live here. A device that stays silent or answers with
/// something unrecognised is reported through [`crate::UploadReport`], not as
/// an error.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the serial channel.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error (open, configure, flush).
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The certificate file could not be read.
    #[error("Cannot read certificate {}", path.display())]
    Certificate {
        /// Path of the certificate file.
        path: PathBuf,
        /// Underlying read error.
        source: io::Error,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}
