//! Line reading from the device console.
//!
//! Console replies are matched one line at a time and thrown away right after,
//! so nothing here buffers past the end of the current line.

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use log::trace;

use crate::error::Result;

/// Read one line from the console.
///
/// Bytes are consumed one at a time up to and including `\n`, so a line that
/// has not been asked for is never pulled off the port. Returns early with
/// whatever was collected (possibly nothing) once `timeout` has passed or the
/// port reports no more data. Timeouts are not errors.
pub fn read_line<R: Read + ?Sized>(reader: &mut R, timeout: Duration) -> Result<String> {
    let deadline = Instant::now() + timeout;
    let mut raw = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        match reader.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                raw.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            },
            Err(e) if e.kind() == ErrorKind::Interrupted => {},
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => break,
            Err(e) => return Err(e.into()),
        }

        if Instant::now() >= deadline {
            break;
        }
    }

    let line = decode_line(&raw);
    if !line.is_empty() {
        trace!("<< {line}");
    }
    Ok(line)
}

/// Decode raw console bytes into a trimmed line.
///
/// Invalid UTF-8 sequences are dropped rather than replaced, so stray line
/// noise cannot break up a phrase the caller is looking for.
pub fn decode_line(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out.trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Reader that hands out its bytes and then times out.
    struct TimedReader {
        data: VecDeque<u8>,
    }

    impl TimedReader {
        fn new(data: &[u8]) -> Self {
            Self {
                data: data
                    .iter()
                    .copied()
                    .collect(),
            }
        }
    }

    impl Read for TimedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let Some(b) = self
                .data
                .pop_front()
            else {
                return Err(std::io::Error::new(ErrorKind::TimedOut, "no data"));
            };
            buf[0] = b;
            Ok(1)
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
        }
    }

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[test]
    fn test_read_line_stops_at_newline() {
        let mut reader = TimedReader::new(b"  -> OK - ready to receive\r\nnext line\r\n");
        let line = read_line(&mut reader, TIMEOUT).unwrap();
        assert_eq!(line, "-> OK - ready to receive");
        assert_eq!(reader.data.len(), b"next line\r\n".len());
    }

    #[test]
    fn test_read_line_returns_partial_on_timeout() {
        let mut reader = TimedReader::new(b"partial");
        assert_eq!(read_line(&mut reader, TIMEOUT).unwrap(), "partial");
    }

    #[test]
    fn test_read_line_empty_on_silence() {
        let mut reader = TimedReader::new(b"");
        assert_eq!(read_line(&mut reader, TIMEOUT).unwrap(), "");
    }

    #[test]
    fn test_read_line_eof_is_not_an_error() {
        let mut reader: &[u8] = b"";
        assert_eq!(read_line(&mut reader, TIMEOUT).unwrap(), "");
    }

    #[test]
    fn test_read_line_propagates_hard_errors() {
        assert!(read_line(&mut BrokenReader, TIMEOUT).is_err());
    }

    #[test]
    fn test_decode_line_drops_invalid_bytes() {
        let raw = [0xFF, b'C', b'A', b':', 0xFE, b' ', b'Y', b'E', b'S', b'\r', b'\n'];
        assert_eq!(decode_line(&raw), "CA: YES");
    }

    #[test]
    fn test_decode_line_keeps_multibyte_text() {
        assert_eq!(decode_line("  证书 saved \n".as_bytes()), "证书 saved");
    }
}
