//! Text console commands understood by the MQTT bridge firmware.
//!
//! The console is line oriented: commands are terminated by `\r`, responses
//! by `\n`. Certificate upload is a framed transfer:
//!
//! ```text
//! host                                   device
//!  | set mqtt.cert.upload BEGIN  --------> |
//!  | <--------  "  -> OK - ready to receive"|
//!  | set mqtt.cert.upload <line> --------> |   (once per certificate line)
//!  | set mqtt.cert.upload END    --------> |
//!  | <--------  "... certificate saved ..." |
//!  | get mqtt.cert.status        --------> |
//!  | <--------  "... CA: YES ..."           |
//! ```
//!
//! The firmware owns the protocol; this module only knows the command
//! spellings and the phrases worth looking for in the replies.

/// Command terminator expected by the console.
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Setting that receives certificate upload frames.
pub const UPLOAD_SETTING: &str = "mqtt.cert.upload";

/// Setting that reports the stored certificate status.
pub const STATUS_SETTING: &str = "mqtt.cert.status";

/// Phrase acknowledging the begin marker.
pub const READY_PHRASE: &str = "ready to receive";

/// Phrase acknowledging the end marker.
pub const SAVED_PHRASE: &str = "certificate saved";

/// Status field reporting whether a CA certificate is stored.
pub const CA_FIELD: &str = "CA:";

/// Affirmative value of the CA status field.
pub const CA_PRESENT: &str = "CA: YES";

/// Size of the firmware buffer holding the stored certificate.
///
/// The firmware refuses to load a stored certificate whose size reaches this
/// value.
pub const DEVICE_CERT_CAPACITY: usize = 3072;

const ERROR_MARKERS: [&str; 2] = ["Error", "error"];
const ERROR_CONTEXTS: [&str; 2] = ["upload", "opening"];

/// A console command sent to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand<'a> {
    /// Begin marker, opens the certificate transfer.
    UploadBegin,
    /// One line of certificate content.
    UploadLine(&'a str),
    /// End marker, asks the device to persist the certificate.
    UploadEnd,
    /// Query the stored certificate status.
    CertStatus,
}

impl ConsoleCommand<'_> {
    /// Command text without the terminator.
    pub fn text(&self) -> String {
        match self {
            Self::UploadBegin => format!("set {UPLOAD_SETTING} BEGIN"),
            Self::UploadLine(line) => format!("set {UPLOAD_SETTING} {line}"),
            Self::UploadEnd => format!("set {UPLOAD_SETTING} END"),
            Self::CertStatus => format!("get {STATUS_SETTING}"),
        }
    }

    /// Encode the command as terminated UTF-8 bytes ready to write.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self
            .text()
            .into_bytes();
        bytes.push(COMMAND_TERMINATOR);
        bytes
    }
}

/// Whether a response line acknowledges the begin marker.
pub fn is_ready_ack(line: &str) -> bool {
    line.contains(READY_PHRASE)
}

/// Whether a response line reports a failure to start the upload.
///
/// Requires both an error marker and a context word, so unrelated log noise
/// mentioning errors does not abort the transfer.
pub fn is_upload_error(line: &str) -> bool {
    ERROR_MARKERS
        .iter()
        .any(|marker| line.contains(marker))
        && ERROR_CONTEXTS
            .iter()
            .any(|context| line.contains(context))
}

/// Whether a response line confirms the certificate was saved.
pub fn is_saved_ack(line: &str) -> bool {
    line.contains(SAVED_PHRASE)
}

/// Parse the CA status field from a response line.
///
/// Returns `None` when the line carries no `CA:` field, otherwise whether it
/// reports `CA: YES`.
pub fn parse_ca_status(line: &str) -> Option<bool> {
    if !line.contains(CA_FIELD) {
        return None;
    }
    Some(line.contains(CA_PRESENT))
}
