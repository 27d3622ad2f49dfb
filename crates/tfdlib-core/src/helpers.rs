//! Timestamp formatting and parsing helpers.
//!
//! The logger exchanges times as `dd.mm.yy HH:MM:SS` with a two-digit year
//! and no time zone. Dumped records use a four-digit year.

use chrono::NaiveDateTime;

use crate::error::{Error, Result};

/// `strftime` pattern of the time fields on the wire.
pub const DEVICE_TIME_FORMAT: &str = "%d.%m.%y %H:%M:%S";

/// Width in bytes of a formatted device time field.
pub const DEVICE_TIME_LEN: usize = 17;

/// `strftime` pattern of the time column in dump lines.
pub const RECORD_TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// `strftime` pattern matching C `asctime()` output, without the newline.
pub const ASCTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Format a time the way the logger expects it in a set-time command.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use tfdlib_core::format_device_time;
///
/// let t = NaiveDate::from_ymd_opt(2017, 3, 9).unwrap().and_hms_opt(7, 5, 0).unwrap();
/// assert_eq!(format_device_time(&t), "09.03.17 07:05:00");
/// ```
pub fn format_device_time(time: &NaiveDateTime) -> String {
    time.format(DEVICE_TIME_FORMAT).to_string()
}

/// Parse a `dd.mm.yy HH:MM:SS` field received from the logger.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if `field` is not a valid device time.
pub fn parse_device_time(field: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(field, DEVICE_TIME_FORMAT)
        .map_err(|e| Error::Protocol(format!("invalid device time {field:?}: {e}")))
}

/// Format a time for the dump output (`dd.mm.yyyy HH:MM:SS`).
pub fn format_record_time(time: &NaiveDateTime) -> String {
    time.format(RECORD_TIME_FORMAT).to_string()
}

/// Format a time like C `asctime()` (e.g. `"Thu Mar  9 07:05:00 2017"`).
pub fn format_asctime(time: &NaiveDateTime) -> String {
    time.format(ASCTIME_FORMAT).to_string()
}
