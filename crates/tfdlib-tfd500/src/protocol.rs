//! TFD 500 serial protocol framing.
//!
//! The logger speaks a terse request/response protocol over a raw 8N1
//! serial link. A request is a single ASCII command tag, optionally
//! followed by a fixed-width ASCII argument. There is no request
//! terminator and no checksum.
//!
//! # Command format
//!
//! ```text
//! <tag>[<argument>]
//! ```
//!
//! - `tag`: one ASCII letter (`v`, `a`, `o`, `d`, `T`, `I`, `C`, `F`, `X`, `R`).
//! - `argument`: zero or more ASCII characters (`T` takes a 17-character
//!   time, `I`/`C` a single digit, `F` a 4-digit block index).
//!
//! # Response format
//!
//! Except for `X`, `R` and `v`, every response starts with an echo of the
//! command tag. What follows depends on the command:
//!
//! ```text
//! a  -> 'a' <status digit>
//! o  -> 'o' ? <mode> ? ? <interval> ? ? <dd.mm.yy HH:MM:SS>      25 bytes
//! d  -> 'd' <count: 6 chars> ? <dd.mm.yy HH:MM:SS>               25 bytes
//! T, I, C -> echo only
//! F  -> 'F' <records * 3 bytes> <terminator>
//! v  -> <firmware text> '\r' '\n'
//! ```
//!
//! Fixed-width responses are decoded by slicing with explicit bounds checks
//! so a truncated response becomes an [`Error::Protocol`] rather than an
//! out-of-range read.

use std::ops::Range;

use bytes::{BufMut, BytesMut};
use tfdlib_core::{Error, Result};

/// Factory reset (write-only).
pub const CMD_RESET: u8 = b'X';
/// Erase all stored records (write-only).
pub const CMD_CLEAR: u8 = b'R';
/// Firmware version query.
pub const CMD_VERSION: u8 = b'v';
/// Recording status query.
pub const CMD_STATUS: u8 = b'a';
/// Device clock and extended settings (mode, interval) query.
pub const CMD_CLOCK: u8 = b'o';
/// Set device clock.
pub const CMD_SET_CLOCK: u8 = b'T';
/// Record count and recording start time query.
pub const CMD_SETTINGS: u8 = b'd';
/// Set sampling interval.
pub const CMD_SET_INTERVAL: u8 = b'I';
/// Set channel mode.
pub const CMD_SET_MODE: u8 = b'C';
/// Read one block of stored records.
pub const CMD_READ_BLOCK: u8 = b'F';

/// Length of the `o` and `d` responses, echo byte included.
pub const SETTINGS_RESPONSE_LEN: usize = 25;

/// Byte range of the device time field inside `o` and `d` responses.
pub const TIME_FIELD: Range<usize> = 8..25;

/// Byte range of the record count inside a `d` response.
pub const RECORD_COUNT_FIELD: Range<usize> = 1..7;

/// Offset of the mode digit inside an `o` response.
pub const MODE_OFFSET: usize = 2;

/// Offset of the interval digit inside an `o` response.
pub const INTERVAL_OFFSET: usize = 5;

/// Records stored per flash block.
pub const RECORDS_PER_BLOCK: u32 = 85;

/// Wire size of one stored record.
pub const RECORD_LEN: usize = 3;

/// Longest firmware version string kept.
pub const MAX_VERSION_LEN: usize = 31;

/// Encode a command into raw bytes ready for transmission.
///
/// # Example
///
/// ```
/// use tfdlib_tfd500::protocol::encode_command;
///
/// assert_eq!(encode_command(b'a', ""), b"a");
/// assert_eq!(encode_command(b'F', "0012"), b"F0012");
/// ```
pub fn encode_command(tag: u8, argument: &str) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(1 + argument.len());
    buf.put_u8(tag);
    buf.put_slice(argument.as_bytes());
    buf.to_vec()
}

/// Check the echo byte the logger sends before any payload.
///
/// `received` is whatever the channel produced for a one-byte read; an
/// empty slice means the logger stayed silent.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if no byte arrived or it differs from `tag`.
pub fn check_ack(tag: u8, received: &[u8]) -> Result<()> {
    match received.first() {
        Some(&b) if b == tag => Ok(()),
        Some(&b) => Err(Error::Protocol(format!(
            "expected ack {:?}, got {:?}",
            char::from(tag),
            char::from(b)
        ))),
        None => Err(Error::Protocol(format!(
            "no ack for command {:?}",
            char::from(tag)
        ))),
    }
}

/// Validate a fixed-length response: exact length and leading echo byte.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the response is short or the echo byte
/// does not match `tag`.
pub fn check_fixed_response(tag: u8, buf: &[u8], len: usize) -> Result<()> {
    if buf.len() < len {
        return Err(Error::Protocol(format!(
            "short {:?} response: expected {len} bytes, got {}",
            char::from(tag),
            buf.len()
        )));
    }
    check_ack(tag, buf)
}

/// Extract a bounds-checked ASCII field from a response.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if `range` lies outside `buf` or the bytes
/// are not ASCII.
pub fn ascii_field(buf: &[u8], range: Range<usize>) -> Result<&str> {
    let bytes = buf.get(range.clone()).ok_or_else(|| {
        Error::Protocol(format!(
            "field {range:?} out of bounds for {}-byte response",
            buf.len()
        ))
    })?;
    if !bytes.is_ascii() {
        return Err(Error::Protocol(format!(
            "non-ASCII bytes in field {range:?}: {bytes:02X?}"
        )));
    }
    std::str::from_utf8(bytes)
        .map_err(|e| Error::Protocol(format!("invalid field {range:?}: {e}")))
}

/// Extract a bounds-checked single byte from a response.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if `offset` lies outside `buf`.
pub fn byte_at(buf: &[u8], offset: usize) -> Result<u8> {
    buf.get(offset).copied().ok_or_else(|| {
        Error::Protocol(format!(
            "offset {offset} out of bounds for {}-byte response",
            buf.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_bare_tag() {
        assert_eq!(encode_command(CMD_VERSION, ""), b"v");
    }

    #[test]
    fn encode_tag_with_argument() {
        assert_eq!(encode_command(CMD_SET_INTERVAL, "2"), b"I2");
        assert_eq!(
            encode_command(CMD_SET_CLOCK, "24.12.17 18:00:00"),
            b"T24.12.17 18:00:00"
        );
    }

    #[test]
    fn check_ack_matches() {
        assert!(check_ack(b'a', b"a").is_ok());
    }

    #[test]
    fn check_ack_mismatch_is_protocol_error() {
        let err = check_ack(b'a', b"b").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn check_ack_silence_is_protocol_error() {
        assert!(matches!(check_ack(b'T', b""), Err(Error::Protocol(_))));
    }

    #[test]
    fn fixed_response_too_short() {
        let err = check_fixed_response(b'o', b"o 0  1", SETTINGS_RESPONSE_LEN).unwrap_err();
        assert!(err.to_string().contains("expected 25 bytes, got 6"));
    }

    #[test]
    fn fixed_response_wrong_tag() {
        let buf = b"d000003 01.01.20 00:00:00";
        assert!(check_fixed_response(b'd', buf, SETTINGS_RESPONSE_LEN).is_ok());
        assert!(matches!(
            check_fixed_response(b'o', buf, SETTINGS_RESPONSE_LEN),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn ascii_field_in_bounds() {
        let buf = b"d000003 01.01.20 00:00:00";
        assert_eq!(ascii_field(buf, RECORD_COUNT_FIELD).unwrap(), "000003");
        assert_eq!(ascii_field(buf, TIME_FIELD).unwrap(), "01.01.20 00:00:00");
    }

    #[test]
    fn ascii_field_out_of_bounds() {
        assert!(matches!(
            ascii_field(b"d0000", RECORD_COUNT_FIELD),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn ascii_field_rejects_binary() {
        assert!(matches!(
            ascii_field(&[b'd', 0xFF, b'0'], 1..3),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn byte_at_bounds() {
        assert_eq!(byte_at(b"o 1", MODE_OFFSET).unwrap(), b'1');
        assert!(byte_at(b"o 1", INTERVAL_OFFSET).is_err());
    }
}
