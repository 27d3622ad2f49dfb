//! Transport trait for logger communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a data
//! logger. The production implementation is the serial port transport in
//! `tfdlib-transport`; `tfdlib-test-harness` provides scripted and
//! simulated transports for deterministic tests.
//!
//! Protocol engines operate on a `Transport` rather than on a serial port
//! directly, and never open or configure the link themselves.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a logger.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the logger.
    ///
    /// Implementations should not return until all bytes have been handed
    /// to the underlying link.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the logger into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Waits up to `timeout` for
    /// data to arrive and returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing arrives before the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
