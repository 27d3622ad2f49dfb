//! Tfd500 -- the driver for a TFD 500 temperature/humidity logger.
//!
//! This module ties the command codec ([`protocol`], [`commands`]) to a
//! byte [`Channel`] to produce one async method per device capability.
//! Every method performs a single attempt: a transport failure or an
//! unexpected response is returned to the caller immediately and the
//! exchange is not resumed.

use std::fmt;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use tfdlib_core::error::Result;
use tfdlib_core::types::{Interval, Mode, Settings, Status};
use tfdlib_core::format_asctime;

use crate::commands;
use crate::dump::RecordDump;
use crate::io::Channel;
use crate::protocol::{
    CMD_SET_CLOCK, CMD_SET_INTERVAL, CMD_SET_MODE, CMD_STATUS, SETTINGS_RESPONSE_LEN,
};

/// A connected TFD 500 logger.
///
/// Constructed via [`Tfd500Builder`](crate::builder::Tfd500Builder). The
/// driver owns the channel exclusively; operations take `&mut self` and
/// run strictly one after another.
pub struct Tfd500 {
    channel: Channel,
}

/// Combined status and settings, as shown by the CLI's settings report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceReport {
    /// Recording status, `None` if the status query failed.
    pub status: Option<Status>,
    /// Recording settings.
    pub settings: Settings,
}

impl fmt::Display for DeviceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            Some(status) if status.is_recording() => "recording",
            Some(_) => "not recording",
            None => "unknown",
        };
        writeln!(f, "status     : {status}")?;
        writeln!(f, "start      : {}", format_asctime(&self.settings.start))?;
        writeln!(f, "interval   : {}", self.settings.interval)?;
        writeln!(f, "mode       : {}", self.settings.mode)?;
        write!(f, "num records: {}", self.settings.record_count)
    }
}

impl Tfd500 {
    /// Create a driver over an open channel.
    ///
    /// Callers normally go through the builder instead.
    pub(crate) fn new(channel: Channel) -> Self {
        Tfd500 { channel }
    }

    /// The logging context all protocol traffic is reported under.
    pub fn span(&self) -> &tracing::Span {
        self.channel.span()
    }

    pub(crate) fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    /// Send a command and read a fixed-length tagged response.
    async fn query_fixed(&mut self, cmd: &[u8], len: usize) -> Result<Vec<u8>> {
        debug!(parent: self.channel.span(), cmd = ?String::from_utf8_lossy(cmd), len, "query");
        self.channel.write_bytes(cmd).await?;
        self.channel.read_bytes(len).await
    }

    /// Send a set command and wait for its one-byte echo.
    async fn command_with_ack(&mut self, cmd: &[u8], tag: u8) -> Result<()> {
        debug!(parent: self.channel.span(), cmd = ?String::from_utf8_lossy(cmd), "command");
        self.channel.write_bytes(cmd).await?;
        self.channel.expect_ack(tag).await
    }

    /// Factory reset. The logger sends no acknowledgement.
    pub async fn reset(&mut self) -> Result<()> {
        debug!(parent: self.channel.span(), "factory reset");
        self.channel.write_bytes(&commands::cmd_reset()).await
    }

    /// Erase all stored records. The logger sends no acknowledgement.
    pub async fn clear_flash(&mut self) -> Result<()> {
        debug!(parent: self.channel.span(), "clear flash");
        self.channel.write_bytes(&commands::cmd_clear()).await
    }

    /// Read the firmware version string (at most 31 characters).
    pub async fn get_version(&mut self) -> Result<String> {
        self.channel.write_bytes(&commands::cmd_read_version()).await?;
        let line = self.channel.read_bytes(0).await?;
        let version = commands::parse_version(&line);
        debug!(parent: self.channel.span(), %version, "firmware version");
        Ok(version)
    }

    /// Read the recording status.
    pub async fn get_status(&mut self) -> Result<Status> {
        self.command_with_ack(&commands::cmd_read_status(), CMD_STATUS)
            .await?;
        let data = self.channel.read_bytes(1).await?;
        let status = commands::parse_status(&data)?;
        debug!(parent: self.channel.span(), %status, "status");
        Ok(status)
    }

    /// Read the device clock.
    pub async fn get_clock(&mut self) -> Result<NaiveDateTime> {
        let buf = self
            .query_fixed(&commands::cmd_read_clock(), SETTINGS_RESPONSE_LEN)
            .await?;
        commands::parse_clock_response(&buf)
    }

    /// Set the device clock to `now`.
    ///
    /// The logger has no notion of time zones; callers pass local time.
    pub async fn set_clock(&mut self, now: NaiveDateTime) -> Result<()> {
        self.command_with_ack(&commands::cmd_set_clock(&now), CMD_SET_CLOCK)
            .await
    }

    /// Read the recording settings.
    ///
    /// Two exchanges: `d` for the record count and start time, then `o`
    /// for the mode and interval.
    pub async fn get_settings(&mut self) -> Result<Settings> {
        let buf = self
            .query_fixed(&commands::cmd_read_settings(), SETTINGS_RESPONSE_LEN)
            .await?;
        let window = commands::parse_settings_response(&buf)?;

        let buf = self
            .query_fixed(&commands::cmd_read_clock(), SETTINGS_RESPONSE_LEN)
            .await?;
        let config = commands::parse_channel_config(&buf)?;

        let settings = Settings {
            start: window.start,
            record_count: window.record_count,
            interval: config.interval,
            mode: config.mode,
        };
        debug!(parent: self.channel.span(), ?settings, "settings");
        Ok(settings)
    }

    /// Set the sampling interval in seconds (10, 60 or 300).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`](tfdlib_core::Error::InvalidParameter)
    /// for any other value; nothing is sent in that case.
    pub async fn set_interval(&mut self, secs: u32) -> Result<()> {
        let interval = Interval::from_secs(secs)?;
        self.command_with_ack(&commands::cmd_set_interval(interval), CMD_SET_INTERVAL)
            .await
    }

    /// Set the channel mode (0 = temperature, 1 = temperature and humidity).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`](tfdlib_core::Error::InvalidParameter)
    /// for any other value; nothing is sent in that case.
    pub async fn set_mode(&mut self, mode: u8) -> Result<()> {
        let mode = Mode::from_index(mode)?;
        self.command_with_ack(&commands::cmd_set_mode(mode), CMD_SET_MODE)
            .await
    }

    /// Query status and settings together.
    ///
    /// A failed status query is logged and reported as unknown; a failed
    /// settings query fails the whole report.
    pub async fn report(&mut self) -> Result<DeviceReport> {
        let status = match self.get_status().await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(parent: self.channel.span(), error = %e, "status query failed");
                None
            }
        };
        let settings = self.get_settings().await?;
        Ok(DeviceReport { status, settings })
    }

    /// Start a dump of all stored records.
    ///
    /// Reads the settings first; the returned [`RecordDump`] then fetches
    /// blocks on demand as records are pulled from it.
    pub async fn dump(&mut self) -> Result<RecordDump<'_>> {
        let settings = self.get_settings().await?;
        debug!(
            parent: self.channel.span(),
            records = settings.record_count,
            interval = settings.interval.as_secs(),
            "starting dump"
        );
        Ok(RecordDump::new(self, settings))
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.channel.close().await
    }
}
