//! Error types for tfdlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. The taxonomy separates failures of the
//! byte channel (transport, I/O, timeout, lost connection) from failures to
//! make sense of what the logger sent back ([`Error::Protocol`]) and from
//! caller mistakes ([`Error::InvalidParameter`]).

/// The error type for all tfdlib operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port could not be opened or configured).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error: wrong ack byte, truncated or malformed
    /// fixed-width field, or an undecodable digit code.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for a byte from the logger.
    ///
    /// The byte channel treats this as end of stream; it only surfaces to
    /// callers of [`Transport::receive`](crate::transport::Transport::receive).
    #[error("timeout waiting for response")]
    Timeout,

    /// The caller supplied a value the logger does not support
    /// (e.g. a sampling interval other than 10, 60 or 300 seconds).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the logger has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the logger was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error, carrying the OS error code.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
