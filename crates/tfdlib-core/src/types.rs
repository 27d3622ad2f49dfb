//! Core types describing the logger's state and its stored measurements.
//!
//! These types are independent of the wire encoding; the single-digit codes
//! and fixed-width fields the logger uses live with the command codec in
//! `tfdlib-tfd500`.

use std::fmt;

use chrono::{Duration, NaiveDateTime};

use crate::error::{Error, Result};
use crate::helpers::format_record_time;

/// Recording status of the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Not recording.
    Idle,
    /// A recording session is in progress.
    Busy,
}

impl Status {
    /// Whether the logger is currently recording.
    pub fn is_recording(&self) -> bool {
        matches!(self, Status::Busy)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Idle => "idle",
            Status::Busy => "busy",
        };
        write!(f, "{s}")
    }
}

/// Channel mode: which quantities the logger records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Temperature only; the auxiliary record byte is reserved.
    Temperature,
    /// Temperature and relative humidity; the auxiliary byte is humidity.
    TemperatureHumidity,
}

impl Mode {
    /// Map the numeric mode selector used on the command line
    /// (`0` = temperature, `1` = temperature and humidity).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for any other value.
    pub fn from_index(index: u8) -> Result<Self> {
        match index {
            0 => Ok(Mode::Temperature),
            1 => Ok(Mode::TemperatureHumidity),
            n => Err(Error::InvalidParameter(format!(
                "mode must be 0 or 1, got {n}"
            ))),
        }
    }

    /// Return the numeric mode selector.
    pub fn index(&self) -> u8 {
        match self {
            Mode::Temperature => 0,
            Mode::TemperatureHumidity => 1,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Temperature => "temperature",
            Mode::TemperatureHumidity => "temperature and humidity",
        };
        write!(f, "{s}")
    }
}

/// Sampling interval between two stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interval {
    /// One record every 10 seconds.
    Secs10,
    /// One record every minute.
    Secs60,
    /// One record every 5 minutes.
    Secs300,
}

impl Interval {
    /// All intervals the logger supports, shortest first.
    pub const ALL: [Interval; 3] = [Interval::Secs10, Interval::Secs60, Interval::Secs300];

    /// Map a number of seconds to a supported interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] unless `secs` is 10, 60 or 300.
    pub fn from_secs(secs: u32) -> Result<Self> {
        match secs {
            10 => Ok(Interval::Secs10),
            60 => Ok(Interval::Secs60),
            300 => Ok(Interval::Secs300),
            n => Err(Error::InvalidParameter(format!(
                "interval must be one of 10, 60, 300 seconds, got {n}"
            ))),
        }
    }

    /// Return the interval in seconds.
    pub fn as_secs(&self) -> u32 {
        match self {
            Interval::Secs10 => 10,
            Interval::Secs60 => 60,
            Interval::Secs300 => 300,
        }
    }

    /// Return the interval as a [`chrono::Duration`].
    pub fn duration(&self) -> Duration {
        Duration::seconds(i64::from(self.as_secs()))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} secs", self.as_secs())
    }
}

/// Recording configuration as reported by the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Time of the first stored record (device local time, no zone).
    pub start: NaiveDateTime,
    /// Number of records stored in flash.
    pub record_count: u32,
    /// Time between two consecutive records.
    pub interval: Interval,
    /// Which quantities are recorded.
    pub mode: Mode,
}

impl Settings {
    /// Timestamp of the record at `index`, derived from the start time and
    /// the sampling interval. Records carry no timestamp on the wire.
    pub fn timestamp_of(&self, index: u32) -> NaiveDateTime {
        self.start + Duration::seconds(i64::from(index) * i64::from(self.interval.as_secs()))
    }
}

/// One stored measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    /// Zero-based position in the logger's record sequence.
    pub index: u32,
    /// Reconstructed sampling time.
    pub timestamp: NaiveDateTime,
    /// Temperature in tenths of a degree, as transmitted.
    pub raw_temperature: u16,
    /// Humidity in percent in [`Mode::TemperatureHumidity`], reserved otherwise.
    pub aux: u8,
}

impl Record {
    /// Temperature in degrees.
    pub fn temperature(&self) -> f64 {
        f64::from(self.raw_temperature) / 10.0
    }
}

/// Formats one dump line: `index;dd.mm.yyyy HH:MM:SS;temperature;aux`.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{:.1};{}",
            self.index,
            format_record_time(&self.timestamp),
            self.temperature(),
            self.aux
        )
    }
}
