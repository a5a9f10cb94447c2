//! Certificate source.
//!
//! The certificate is opaque text: the device decides whether it accepts the
//! content. This module only splits it into the lines the console will see.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// An ordered sequence of certificate lines ready to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    lines: Vec<String>,
}

impl Certificate {
    /// Read a certificate from a text file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::Certificate {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(&text))
    }

    /// Split certificate text into lines.
    ///
    /// `\n`, `\r\n` and a lone `\r` all end a line. Lines left empty once the
    /// line ending is removed are dropped; no other whitespace is touched.
    pub fn from_text(text: &str) -> Self {
        let lines = text
            .split(['\r', '\n'])
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { lines }
    }

    /// Lines that will be sent, in file order.
    pub fn lines(&self) -> impl ExactSizeIterator<Item = &str> {
        self.lines
            .iter()
            .map(String::as_str)
    }

    /// Number of lines that will be sent.
    pub fn line_count(&self) -> usize {
        self.lines
            .len()
    }

    /// Whether there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.lines
            .is_empty()
    }

    /// Size of the content the device will store, one `\n` per line.
    pub fn stored_size(&self) -> usize {
        self.lines
            .iter()
            .map(|line| line.len() + 1)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &str = "-----BEGIN CERTIFICATE-----\r\n\
                       MIIBszCCAVmgAwIBAgIUeRZ0\r\n\
                       \r\n\
                       -----END CERTIFICATE-----\r\n";

    #[test]
    fn test_from_text_skips_blank_lines() {
        let cert = Certificate::from_text(PEM);
        let lines: Vec<&str> = cert
            .lines()
            .collect();
        assert_eq!(
            lines,
            [
                "-----BEGIN CERTIFICATE-----",
                "MIIBszCCAVmgAwIBAgIUeRZ0",
                "-----END CERTIFICATE-----",
            ]
        );
    }

    #[test]
    fn test_from_text_keeps_inner_whitespace() {
        let cert = Certificate::from_text("  indented \n\n\r\n\r\r\n");
        let lines: Vec<&str> = cert
            .lines()
            .collect();
        assert_eq!(lines, ["  indented "]);
    }

    #[test]
    fn test_from_text_without_trailing_newline() {
        let cert = Certificate::from_text("a\nb");
        assert_eq!(cert.line_count(), 2);
    }

    #[test]
    fn test_empty_certificate() {
        let cert = Certificate::from_text("\n\r\n");
        assert!(cert.is_empty());
        assert_eq!(cert.stored_size(), 0);
    }

    #[test]
    fn test_stored_size_counts_newlines() {
        let cert = Certificate::from_text("abc\r\nde\r\n");
        assert_eq!(cert.stored_size(), 7);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("mqtt_ca.crt");
        fs::write(&path, PEM).unwrap();

        let cert = Certificate::from_file(&path).unwrap();
        assert_eq!(cert.line_count(), 3);
    }

    #[test]
    fn test_from_missing_file_names_path() {
        let err = Certificate::from_file("/nonexistent/mqtt_ca.crt").unwrap_err();
        assert!(matches!(err, Error::Certificate { .. }));
        assert!(
            err.to_string()
                .contains("/nonexistent/mqtt_ca.crt")
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
