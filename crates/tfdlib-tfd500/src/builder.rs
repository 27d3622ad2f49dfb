//! Tfd500Builder -- fluent builder for constructing [`Tfd500`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters, the byte timeout and the logging context before
//! the transport is opened.
//!
//! # Example
//!
//! ```no_run
//! use tfdlib_tfd500::builder::Tfd500Builder;
//! use std::time::Duration;
//!
//! # async fn example() -> tfdlib_core::Result<()> {
//! let mut logger = Tfd500Builder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .byte_timeout(Duration::from_millis(200))
//!     .build()
//!     .await?;
//! println!("{}", logger.get_version().await?);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tracing::{Span, debug, info_span};

use tfdlib_core::error::{Error, Result};
use tfdlib_core::transport::Transport;
use tfdlib_transport::serial::{DEFAULT_BAUD_RATE, SerialTransport};

use crate::device::Tfd500;
use crate::io::{Channel, DEFAULT_BYTE_TIMEOUT};

/// Fluent builder for [`Tfd500`].
///
/// Everything except the serial port has a default matching the logger's
/// fixed line settings, so the simplest usage is:
///
/// ```ignore
/// let logger = Tfd500Builder::new()
///     .serial_port("/dev/ttyUSB0")
///     .build()
///     .await?;
/// ```
pub struct Tfd500Builder {
    serial_port: Option<String>,
    baud_rate: u32,
    byte_timeout: Duration,
    span: Span,
}

impl Tfd500Builder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Tfd500Builder {
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            byte_timeout: DEFAULT_BYTE_TIMEOUT,
            span: info_span!("tfd500"),
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the baud rate (default: 115200).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set how long to wait for each response byte (default: 100ms).
    ///
    /// The logger signals the end of a response by going quiet, so this is
    /// also how long every response takes to complete.
    pub fn byte_timeout(mut self, timeout: Duration) -> Self {
        self.byte_timeout = timeout;
        self
    }

    /// Report all protocol traffic under `span` (default: `info_span!("tfd500")`).
    pub fn log_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Build a [`Tfd500`] with a caller-provided transport.
    ///
    /// This is the entry point for testing (pass a `MockTransport` or
    /// `SimulatedLogger` from `tfdlib-test-harness`).
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Tfd500> {
        if self.byte_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "byte_timeout must be greater than zero".into(),
            ));
        }
        Ok(Tfd500::new(Channel::new(
            transport,
            self.byte_timeout,
            self.span,
        )))
    }

    /// Build a [`Tfd500`] using a serial transport.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<Tfd500> {
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;

        debug!(parent: &self.span, port = %port, baud = self.baud_rate, "opening logger");
        let transport = SerialTransport::open(port, self.baud_rate).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}

impl Default for Tfd500Builder {
    fn default() -> Self {
        Self::new()
    }
}
