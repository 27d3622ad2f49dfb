//! TFD 500 command builders and response parsers.
//!
//! This module provides functions to construct the command byte sequences
//! for every logger operation and to decode the corresponding responses.
//!
//! All functions are pure -- they produce or consume byte vectors / slices
//! without performing any I/O. The caller is responsible for sending the
//! bytes over a channel and feeding received data back into the parsers.
//!
//! # Digit codes
//!
//! Interval and mode travel as single ASCII digits:
//!
//! | Digit | Interval | Mode                      |
//! |-------|----------|---------------------------|
//! | `0`   | 10 s     | temperature               |
//! | `1`   | 60 s     | temperature and humidity  |
//! | `2`   | 300 s    | --                        |

use chrono::NaiveDateTime;

use tfdlib_core::{Error, Interval, Mode, Result, Status, format_device_time, parse_device_time};

use crate::protocol::{
    self, CMD_CLEAR, CMD_CLOCK, CMD_READ_BLOCK, CMD_RESET, CMD_SET_CLOCK, CMD_SET_INTERVAL,
    CMD_SET_MODE, CMD_SETTINGS, CMD_STATUS, CMD_VERSION, INTERVAL_OFFSET, MAX_VERSION_LEN,
    MODE_OFFSET, RECORD_COUNT_FIELD, RECORD_LEN, RECORDS_PER_BLOCK, SETTINGS_RESPONSE_LEN,
    TIME_FIELD, encode_command,
};

/// Highest block index expressible in the 4-digit `F` argument.
pub const MAX_BLOCK_INDEX: u32 = 9999;

// ---------------------------------------------------------------
// Digit code mapping
// ---------------------------------------------------------------

/// Wire digit for a sampling interval.
pub fn interval_to_digit(interval: Interval) -> u8 {
    match interval {
        Interval::Secs10 => b'0',
        Interval::Secs60 => b'1',
        Interval::Secs300 => b'2',
    }
}

/// Decode an interval digit.
///
/// # Errors
///
/// Returns [`Error::Protocol`] for anything but `0`, `1` or `2`; there is
/// no fallback value.
pub fn digit_to_interval(digit: u8) -> Result<Interval> {
    match digit {
        b'0' => Ok(Interval::Secs10),
        b'1' => Ok(Interval::Secs60),
        b'2' => Ok(Interval::Secs300),
        other => Err(Error::Protocol(format!(
            "unknown interval code {:?}",
            char::from(other)
        ))),
    }
}

/// Wire digit for a channel mode.
pub fn mode_to_digit(mode: Mode) -> u8 {
    match mode {
        Mode::Temperature => b'0',
        Mode::TemperatureHumidity => b'1',
    }
}

/// Decode a mode digit: `0` is temperature only, anything else is
/// temperature and humidity.
pub fn digit_to_mode(digit: u8) -> Mode {
    if digit == b'0' {
        Mode::Temperature
    } else {
        Mode::TemperatureHumidity
    }
}

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// Build a "factory reset" command (`X`).
pub fn cmd_reset() -> Vec<u8> {
    encode_command(CMD_RESET, "")
}

/// Build a "clear flash" command (`R`).
pub fn cmd_clear() -> Vec<u8> {
    encode_command(CMD_CLEAR, "")
}

/// Build a "read firmware version" command (`v`).
pub fn cmd_read_version() -> Vec<u8> {
    encode_command(CMD_VERSION, "")
}

/// Build a "read recording status" command (`a`).
pub fn cmd_read_status() -> Vec<u8> {
    encode_command(CMD_STATUS, "")
}

/// Build a "read clock and extended settings" command (`o`).
pub fn cmd_read_clock() -> Vec<u8> {
    encode_command(CMD_CLOCK, "")
}

/// Build a "set clock" command (`T` + `dd.mm.yy HH:MM:SS`).
pub fn cmd_set_clock(time: &NaiveDateTime) -> Vec<u8> {
    encode_command(CMD_SET_CLOCK, &format_device_time(time))
}

/// Build a "read record count and start time" command (`d`).
pub fn cmd_read_settings() -> Vec<u8> {
    encode_command(CMD_SETTINGS, "")
}

/// Build a "set sampling interval" command (`I` + digit).
pub fn cmd_set_interval(interval: Interval) -> Vec<u8> {
    let digit = char::from(interval_to_digit(interval));
    encode_command(CMD_SET_INTERVAL, &digit.to_string())
}

/// Build a "set channel mode" command (`C` + digit).
pub fn cmd_set_mode(mode: Mode) -> Vec<u8> {
    let digit = char::from(mode_to_digit(mode));
    encode_command(CMD_SET_MODE, &digit.to_string())
}

/// Build a "read record block" command (`F` + 4-digit zero-padded index).
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `index` does not fit in four digits.
pub fn cmd_read_block(index: u32) -> Result<Vec<u8>> {
    if index > MAX_BLOCK_INDEX {
        return Err(Error::InvalidParameter(format!(
            "block index {index} exceeds {MAX_BLOCK_INDEX}"
        )));
    }
    Ok(encode_command(CMD_READ_BLOCK, &format!("{index:04}")))
}

// ---------------------------------------------------------------
// Response parsers
// ---------------------------------------------------------------

/// Parse the firmware version line (newline already removed).
///
/// The text is cut at the first carriage return and limited to
/// [`MAX_VERSION_LEN`] characters.
pub fn parse_version(line: &[u8]) -> String {
    let text = match line.iter().position(|&b| b == b'\r') {
        Some(cr) => &line[..cr],
        None => line,
    };
    String::from_utf8_lossy(text)
        .chars()
        .take(MAX_VERSION_LEN)
        .collect()
}

/// Parse the status byte that follows the `a` echo.
///
/// `'1'` means recording; any other byte means idle.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the logger sent no status byte.
pub fn parse_status(data: &[u8]) -> Result<Status> {
    match data.first() {
        Some(b'1') => Ok(Status::Busy),
        Some(_) => Ok(Status::Idle),
        None => Err(Error::Protocol("missing status byte after ack".into())),
    }
}

/// Parse the device clock from an `o` response.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the response is short, is not tagged
/// `o`, or carries a malformed time.
pub fn parse_clock_response(buf: &[u8]) -> Result<NaiveDateTime> {
    protocol::check_fixed_response(CMD_CLOCK, buf, SETTINGS_RESPONSE_LEN)?;
    parse_device_time(protocol::ascii_field(buf, TIME_FIELD)?)
}

/// Record count and start time decoded from a `d` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingWindow {
    /// Number of stored records.
    pub record_count: u32,
    /// Time of the first record.
    pub start: NaiveDateTime,
}

/// Parse a `d` response.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the response is short, is not tagged
/// `d`, or either field is malformed.
pub fn parse_settings_response(buf: &[u8]) -> Result<RecordingWindow> {
    protocol::check_fixed_response(CMD_SETTINGS, buf, SETTINGS_RESPONSE_LEN)?;
    let count_field = protocol::ascii_field(buf, RECORD_COUNT_FIELD)?;
    let record_count = count_field.trim().parse::<u32>().map_err(|e| {
        Error::Protocol(format!("invalid record count {count_field:?}: {e}"))
    })?;
    let start = parse_device_time(protocol::ascii_field(buf, TIME_FIELD)?)?;
    Ok(RecordingWindow {
        record_count,
        start,
    })
}

/// Mode and interval decoded from an `o` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Which quantities are recorded.
    pub mode: Mode,
    /// Time between records.
    pub interval: Interval,
}

/// Parse the mode and interval digits of an `o` response.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the response is short, is not tagged
/// `o`, or the interval digit is unknown.
pub fn parse_channel_config(buf: &[u8]) -> Result<ChannelConfig> {
    protocol::check_fixed_response(CMD_CLOCK, buf, SETTINGS_RESPONSE_LEN)?;
    let mode = digit_to_mode(protocol::byte_at(buf, MODE_OFFSET)?);
    let interval = digit_to_interval(protocol::byte_at(buf, INTERVAL_OFFSET)?)?;
    Ok(ChannelConfig { mode, interval })
}

/// Decode one 3-byte stored record: big-endian temperature in tenths of a
/// degree, then the auxiliary byte.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if `chunk` is not exactly [`RECORD_LEN`] bytes.
pub fn parse_record(chunk: &[u8]) -> Result<(u16, u8)> {
    match chunk {
        [hi, lo, aux] => Ok((u16::from_be_bytes([*hi, *lo]), *aux)),
        _ => Err(Error::Protocol(format!(
            "record must be {RECORD_LEN} bytes, got {}",
            chunk.len()
        ))),
    }
}

// ---------------------------------------------------------------
// Block layout
// ---------------------------------------------------------------

/// One `F` request of a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequest {
    /// Block index sent in the command.
    pub index: u32,
    /// Records expected in this block.
    pub records: u32,
}

impl BlockRequest {
    /// Payload bytes to read after the echo: the records plus one
    /// trailing terminator byte.
    pub fn payload_len(&self) -> usize {
        self.records as usize * RECORD_LEN + 1
    }
}

/// Lay out the block requests needed to fetch `record_count` records.
///
/// Blocks `0..=record_count / 85` are requested. The last request carries
/// the `record_count % 85` leftover records, so when the count is a
/// multiple of 85 it asks for a block with no records at all. That extra
/// drain request is kept on purpose; whether the logger needs it is
/// unconfirmed.
pub fn block_plan(record_count: u32) -> impl Iterator<Item = BlockRequest> {
    let full_blocks = record_count / RECORDS_PER_BLOCK;
    let remainder = record_count % RECORDS_PER_BLOCK;
    (0..=full_blocks).map(move |index| BlockRequest {
        index,
        records: if index == full_blocks {
            remainder
        } else {
            RECORDS_PER_BLOCK
        },
    })
}
