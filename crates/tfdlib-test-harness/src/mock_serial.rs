//! Mock transport for deterministic testing of protocol engines.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. The logger protocol writes one byte per `send()`
//! call, so sent bytes are accumulated until they spell out the next
//! expected request; only then is the matching response released to
//! `receive()`.
//!
//! A response can also carry a zero-length read part-way through, which is
//! how a serial port reports that the line went idle before the deadline.
//!
//! Clones share the same script and log, which lets a test hand one clone
//! to the driver and keep another to inspect the traffic afterwards.
//!
//! # Example
//!
//! ```
//! use tfdlib_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the engine sends `a`, answer with the echo byte and "recording".
//! mock.expect(b"a", b"a1");
//! // Reset is write-only: no response at all.
//! mock.expect(b"X", b"");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tfdlib_core::error::{Error, Result};
use tfdlib_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent, possibly over several `send()` calls.
    request: Vec<u8>,
    /// What is released once the whole request has been sent; `None` is a
    /// zero-length read.
    response: Vec<Option<u8>>,
}

#[derive(Debug)]
struct MockState {
    expectations: VecDeque<Expectation>,
    /// Bytes of the current request sent so far.
    partial_request: Vec<u8>,
    /// Response bytes (and zero-length reads) not yet handed out by `receive()`.
    pending_response: VecDeque<Option<u8>>,
    connected: bool,
    /// Log of all bytes sent, one entry per `send()` call.
    sent_log: Vec<Vec<u8>>,
    /// Number of further `send()` calls that succeed before an I/O error.
    sends_before_failure: Option<usize>,
}

/// A scripted [`Transport`] for testing protocol engines without hardware.
///
/// Expectations are consumed in order. Sending a byte that does not extend
/// the next expected request, or sending with no expectation left, returns
/// [`Error::Protocol`]. `receive()` returns [`Error::Timeout`] when no
/// response bytes are pending, which is how a silent logger looks.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            state: Arc::new(Mutex::new(MockState {
                expectations: VecDeque::new(),
                partial_request: Vec::new(),
                pending_response: VecDeque::new(),
                connected: true,
                sent_log: Vec::new(),
                sends_before_failure: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the mock's state from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an expected request/response pair.
    ///
    /// Once every byte of `request` has been sent, subsequent `receive()`
    /// calls return `response`. An empty `response` models a write-only
    /// command.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.state().expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.iter().copied().map(Some).collect(),
        });
    }

    /// Add an expected request whose response is interrupted by a
    /// zero-length read.
    ///
    /// `receive()` hands out `head`, then returns `Ok(0)` once, then hands
    /// out `tail`.
    pub fn expect_with_gap(&mut self, request: &[u8], head: &[u8], tail: &[u8]) {
        let response = head
            .iter()
            .copied()
            .map(Some)
            .chain(std::iter::once(None))
            .chain(tail.iter().copied().map(Some))
            .collect();
        self.state().expectations.push_back(Expectation {
            request: request.to_vec(),
            response,
        });
    }

    /// Return a copy of all data sent, one element per `send()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.state().sent_log.clone()
    }

    /// Return every byte sent so far, concatenated.
    pub fn sent_bytes(&self) -> Vec<u8> {
        self.state().sent_log.concat()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.state().expectations.len()
    }

    /// Return the number of released response bytes nobody has read yet.
    pub fn unread_response_len(&self) -> usize {
        self.state().pending_response.iter().flatten().count()
    }

    /// Let the next `n` `send()` calls succeed, then fail every further
    /// call with an [`Error::Io`] carrying `EIO`.
    pub fn fail_sends_after(&mut self, n: usize) {
        self.state().sends_before_failure = Some(n);
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.state().connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        if !state.connected {
            return Err(Error::NotConnected);
        }

        if let Some(remaining) = state.sends_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(Error::Io(std::io::Error::from_raw_os_error(5)));
            }
            *remaining -= 1;
        }

        state.sent_log.push(data.to_vec());
        state.partial_request.extend_from_slice(data);

        let Some(expectation) = state.expectations.front() else {
            return Err(Error::Protocol(
                "no more expectations in mock transport".into(),
            ));
        };

        if !expectation.request.starts_with(&state.partial_request) {
            let message = format!(
                "unexpected send data: expected {:02X?}, got {:02X?}",
                expectation.request, state.partial_request
            );
            state.partial_request.clear();
            return Err(Error::Protocol(message));
        }

        if expectation.request.len() == state.partial_request.len() {
            if let Some(done) = state.expectations.pop_front() {
                state.pending_response.extend(done.response);
            }
            state.partial_request.clear();
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let mut state = self.state();
        if !state.connected {
            return Err(Error::NotConnected);
        }

        match state.pending_response.front() {
            None => return Err(Error::Timeout),
            Some(None) => {
                state.pending_response.pop_front();
                return Ok(0);
            }
            Some(Some(_)) => {}
        }

        let mut n = 0;
        while n < buf.len() {
            let Some(&Some(byte)) = state.pending_response.front() else {
                break;
            };
            buf[n] = byte;
            state.pending_response.pop_front();
            n += 1;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state();
        state.connected = false;
        state.pending_response.clear();
        state.partial_request.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfdlib_core::transport::Transport;

    const WAIT: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn mock_transport_basic_send_receive() {
        let mut mock = MockTransport::new();
        mock.expect(b"a", b"a0");

        mock.send(b"a").await.unwrap();

        let mut buf = [0u8; 8];
        let n = mock.receive(&mut buf, WAIT).await.unwrap();
        assert_eq!(&buf[..n], b"a0");
    }

    #[tokio::test]
    async fn mock_transport_accumulates_byte_at_a_time() {
        let mut mock = MockTransport::new();
        mock.expect(b"F0001", b"F\n");

        for byte in b"F000" {
            mock.send(&[*byte]).await.unwrap();
            // Nothing is released before the request is complete.
            assert_eq!(mock.unread_response_len(), 0);
        }
        mock.send(b"1").await.unwrap();
        assert_eq!(mock.unread_response_len(), 2);
        assert_eq!(mock.remaining_expectations(), 0);
        assert_eq!(mock.sent_data().len(), 5);
        assert_eq!(mock.sent_bytes(), b"F0001");
    }

    #[tokio::test]
    async fn mock_transport_clones_share_state() {
        let mut mock = MockTransport::new();
        let probe = mock.clone();
        mock.expect(b"X", b"");

        let mut driver_side: Box<dyn Transport> = Box::new(mock);
        driver_side.send(b"X").await.unwrap();

        assert_eq!(probe.sent_bytes(), b"X");
        assert_eq!(probe.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn mock_transport_wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect(b"d", b"d");

        let result = mock.send(b"o").await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn mock_transport_no_expectations_errors() {
        let mut mock = MockTransport::new();

        let result = mock.send(b"v").await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn mock_transport_receive_without_send_times_out() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 4];

        let result = mock.receive(&mut buf, WAIT).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }

    #[tokio::test]
    async fn mock_transport_partial_receive() {
        let mut mock = MockTransport::new();
        mock.expect(b"v", b"1.0\r\n");
        mock.send(b"v").await.unwrap();

        let mut buf = [0u8; 1];
        let n = mock.receive(&mut buf, WAIT).await.unwrap();
        assert_eq!((n, buf[0]), (1, b'1'));
        assert_eq!(mock.unread_response_len(), 4);
    }

    #[tokio::test]
    async fn mock_transport_zero_length_read() {
        let mut mock = MockTransport::new();
        mock.expect_with_gap(b"v", b"V1", b".10");
        mock.send(b"v").await.unwrap();

        let mut buf = [0u8; 8];
        let n = mock.receive(&mut buf, WAIT).await.unwrap();
        assert_eq!(&buf[..n], b"V1");
        assert_eq!(mock.receive(&mut buf, WAIT).await.unwrap(), 0);
        let n = mock.receive(&mut buf, WAIT).await.unwrap();
        assert_eq!(&buf[..n], b".10");
        assert!(matches!(
            mock.receive(&mut buf, WAIT).await,
            Err(Error::Timeout)
        ));
    }

    #[tokio::test]
    async fn mock_transport_injected_send_failure() {
        let mut mock = MockTransport::new();
        mock.expect(b"T", b"T");
        mock.fail_sends_after(0);

        match mock.send(b"T").await {
            Err(Error::Io(e)) => assert_eq!(e.raw_os_error(), Some(5)),
            other => panic!("expected Io error, got {other:?}"),
        }
        assert!(mock.sent_data().is_empty());
    }

    #[tokio::test]
    async fn mock_transport_disconnect() {
        let mut mock = MockTransport::new();
        assert!(mock.is_connected());

        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let result = mock.send(b"a").await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));

        let mut buf = [0u8; 1];
        let result = mock.receive(&mut buf, WAIT).await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }
}
