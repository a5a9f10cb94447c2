//! Configuration file support for upload_cert.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments and environment variables (CERTUPLOAD_*)
//! 2. Local config file (./certupload.toml)
//! 3. Global config file (~/.config/certupload/config.toml)
//!
//! `--config PATH` replaces both files.

use certupload::{SerialConfig, UploadConfig};
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the local configuration file.
pub const LOCAL_CONFIG_FILE: &str = "certupload.toml";

/// Serial connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerialSection {
    /// Console baud rate.
    pub baud: Option<u32>,
    /// Read timeout for one console line, in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Upload timing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadSection {
    /// Delay after opening the port.
    pub settle_ms: Option<u64>,
    /// Delay after the begin marker.
    pub begin_wait_ms: Option<u64>,
    /// Delay after each certificate line.
    pub line_delay_ms: Option<u64>,
    /// Delay after the end marker.
    pub end_wait_ms: Option<u64>,
    /// Delay after the status query.
    pub status_wait_ms: Option<u64>,
    /// Line reads allowed while waiting for the begin acknowledgement.
    pub begin_attempts: Option<usize>,
    /// Line reads allowed while waiting for the save confirmation.
    pub end_attempts: Option<usize>,
    /// Line reads allowed while waiting for the status line.
    pub status_attempts: Option<usize>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Serial configuration.
    #[serde(default)]
    pub serial: SerialSection,
    /// Upload configuration.
    #[serde(default)]
    pub upload: UploadSection,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "certupload").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.serial.baud, other.serial.baud);
        take(&mut self.serial.timeout_ms, other.serial.timeout_ms);

        let upload = &mut self.upload;
        take(&mut upload.settle_ms, other.upload.settle_ms);
        take(&mut upload.begin_wait_ms, other.upload.begin_wait_ms);
        take(&mut upload.line_delay_ms, other.upload.line_delay_ms);
        take(&mut upload.end_wait_ms, other.upload.end_wait_ms);
        take(&mut upload.status_wait_ms, other.upload.status_wait_ms);
        take(&mut upload.begin_attempts, other.upload.begin_attempts);
        take(&mut upload.end_attempts, other.upload.end_attempts);
        take(&mut upload.status_attempts, other.upload.status_attempts);
    }

    /// Serial settings for `port_name`, with an optional baud override from
    /// the command line.
    pub fn serial_config(&self, port_name: &str, baud: Option<u32>) -> SerialConfig {
        let mut serial = SerialConfig::new(port_name);
        if let Some(baud) = baud.or(self.serial.baud) {
            serial = serial.with_baud_rate(baud);
        }
        if let Some(ms) = self.serial.timeout_ms {
            serial = serial.with_timeout(Duration::from_millis(ms));
        }
        serial
    }

    /// Upload timings, falling back to the built-in defaults.
    pub fn upload_config(&self) -> UploadConfig {
        let defaults = UploadConfig::default();
        let ms = |value: Option<u64>, default: Duration| value.map_or(default, Duration::from_millis);
        let upload = &self.upload;

        UploadConfig {
            settle_delay: ms(upload.settle_ms, defaults.settle_delay),
            begin_wait: ms(upload.begin_wait_ms, defaults.begin_wait),
            line_delay: ms(upload.line_delay_ms, defaults.line_delay),
            end_wait: ms(upload.end_wait_ms, defaults.end_wait),
            status_wait: ms(upload.status_wait_ms, defaults.status_wait),
            begin_attempts: upload
                .begin_attempts
                .unwrap_or(defaults.begin_attempts),
            end_attempts: upload
                .end_attempts
                .unwrap_or(defaults.end_attempts),
            status_attempts: upload
                .status_attempts
                .unwrap_or(defaults.status_attempts),
        }
    }
}
