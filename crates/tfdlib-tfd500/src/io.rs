//! Byte channel between the protocol engine and the logger.
//!
//! The serial link is configured with a short inter-byte timeout, so the
//! channel writes and reads one byte per transport call. A read that hits
//! the timeout ends the current response instead of failing: the logger
//! going quiet is how a response ends, and a response that ends too early
//! is reported by the decoder that needed the missing bytes.

use std::time::Duration;

use tracing::{Span, trace};

use tfdlib_core::error::{Error, Result};
use tfdlib_core::transport::Transport;

use crate::protocol;

/// Default wait for a single byte, the logger's inter-byte timeout.
pub const DEFAULT_BYTE_TIMEOUT: Duration = Duration::from_millis(100);

/// Exclusive, byte-at-a-time access to a logger [`Transport`].
///
/// Every log event the channel emits is parented to the span it was built
/// with, so callers control where protocol traffic is reported.
pub struct Channel {
    transport: Box<dyn Transport>,
    byte_timeout: Duration,
    span: Span,
}

impl Channel {
    /// Wrap an open transport.
    pub fn new(transport: Box<dyn Transport>, byte_timeout: Duration, span: Span) -> Self {
        Channel {
            transport,
            byte_timeout,
            span,
        }
    }

    /// The logging context for this channel.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Write `buf` one byte at a time.
    ///
    /// The first failing write aborts the remaining bytes and its error is
    /// returned unchanged.
    pub async fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        for &byte in buf {
            trace!(parent: &self.span, byte, ch = ?char::from(byte), "write");
            self.transport.send(&[byte]).await?;
        }
        Ok(())
    }

    /// Read a response of up to `limit` bytes.
    ///
    /// - `limit == 0`: read until `\n` or stream end. The `\n` is consumed
    ///   and not included in the result.
    /// - `limit > 0`: read exactly `limit` bytes unless the stream ends
    ///   first. Every byte, `\n` included, is data.
    ///
    /// A short result is returned as-is; it is never padded.
    pub async fn read_bytes(&mut self, limit: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(limit);
        while limit == 0 || out.len() < limit {
            match self.read_byte().await? {
                None => {
                    trace!(parent: &self.span, read = out.len(), limit, "stream end");
                    break;
                }
                Some(b'\n') if limit == 0 => break,
                Some(byte) => out.push(byte),
            }
        }
        Ok(out)
    }

    /// Read one byte and check that it echoes `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on a wrong or missing echo; no further
    /// bytes are read in that case.
    pub async fn expect_ack(&mut self, tag: u8) -> Result<()> {
        let ack = self.read_bytes(1).await?;
        protocol::check_ack(tag, &ack)
    }

    /// Read a single byte, mapping a timeout or empty read to `None`.
    async fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.transport.receive(&mut byte, self.byte_timeout).await {
            Ok(0) | Err(Error::Timeout) => Ok(None),
            Ok(_) => {
                trace!(parent: &self.span, byte = byte[0], ch = ?char::from(byte[0]), "read");
                Ok(Some(byte[0]))
            }
            Err(e) => {
                tracing::error!(parent: &self.span, error = %e, "read failed");
                Err(e)
            }
        }
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfdlib_test_harness::MockTransport;

    fn channel(mock: &MockTransport) -> Channel {
        Channel::new(Box::new(mock.clone()), DEFAULT_BYTE_TIMEOUT, Span::none())
    }

    #[tokio::test]
    async fn write_bytes_sends_one_byte_per_call() {
        let mut mock = MockTransport::new();
        mock.expect(b"F0042", b"");
        let mut chan = channel(&mock);

        chan.write_bytes(b"F0042").await.unwrap();

        let sent = mock.sent_data();
        assert_eq!(sent.len(), 5);
        assert!(sent.iter().all(|chunk| chunk.len() == 1));
    }

    #[tokio::test]
    async fn write_bytes_aborts_on_first_failure() {
        let mut mock = MockTransport::new();
        mock.expect(b"T01.01.20 00:00:00", b"T");
        mock.fail_sends_after(3);
        let mut chan = channel(&mock);

        let err = chan.write_bytes(b"T01.01.20 00:00:00").await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(mock.sent_bytes(), b"T01");
    }

    #[tokio::test]
    async fn read_until_newline_excludes_terminator() {
        let mut mock = MockTransport::new();
        mock.expect(b"v", b"V1.10\r\nrest");
        let mut chan = channel(&mock);
        chan.write_bytes(b"v").await.unwrap();

        assert_eq!(chan.read_bytes(0).await.unwrap(), b"V1.10\r");
        assert_eq!(mock.unread_response_len(), 4);
    }

    #[tokio::test]
    async fn read_until_newline_stops_at_stream_end() {
        let mut mock = MockTransport::new();
        mock.expect(b"v", b"V1.10");
        let mut chan = channel(&mock);
        chan.write_bytes(b"v").await.unwrap();

        assert_eq!(chan.read_bytes(0).await.unwrap(), b"V1.10");
    }

    #[tokio::test]
    async fn bounded_read_treats_newline_as_data() {
        let mut mock = MockTransport::new();
        mock.expect(b"F0000", &[b'F', 0x00, 0x0A, 0x0A, b'\r']);
        let mut chan = channel(&mock);
        chan.write_bytes(b"F0000").await.unwrap();

        chan.expect_ack(b'F').await.unwrap();
        assert_eq!(chan.read_bytes(4).await.unwrap(), [0x00, 0x0A, 0x0A, b'\r']);
    }

    #[tokio::test]
    async fn bounded_read_returns_short_buffer_on_silence() {
        let mut mock = MockTransport::new();
        mock.expect(b"o", b"o 0  1");
        let mut chan = channel(&mock);
        chan.write_bytes(b"o").await.unwrap();

        assert_eq!(chan.read_bytes(25).await.unwrap(), b"o 0  1");
    }

    #[tokio::test]
    async fn zero_length_read_ends_line_read() {
        let mut mock = MockTransport::new();
        mock.expect_with_gap(b"v", b"V1.1", b"0\r\n");
        let mut chan = channel(&mock);
        chan.write_bytes(b"v").await.unwrap();

        assert_eq!(chan.read_bytes(0).await.unwrap(), b"V1.1");
        assert_eq!(mock.unread_response_len(), 3);
    }

    #[tokio::test]
    async fn zero_length_read_ends_bounded_read() {
        let mut mock = MockTransport::new();
        mock.expect_with_gap(b"d", b"d000003", b" 01.01.20 00:00:00");
        let mut chan = channel(&mock);
        chan.write_bytes(b"d").await.unwrap();

        assert_eq!(chan.read_bytes(25).await.unwrap(), b"d000003");
        assert_eq!(mock.unread_response_len(), 18);
    }

    #[tokio::test]
    async fn read_propagates_transport_errors() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        let mut chan = channel(&mock);

        assert!(matches!(
            chan.read_bytes(1).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn expect_ack_mismatch_reads_nothing_more() {
        let mut mock = MockTransport::new();
        mock.expect(b"a", b"b1");
        let mut chan = channel(&mock);
        chan.write_bytes(b"a").await.unwrap();

        assert!(matches!(
            chan.expect_ack(b'a').await,
            Err(Error::Protocol(_))
        ));
        assert_eq!(mock.unread_response_len(), 1);
    }
}
