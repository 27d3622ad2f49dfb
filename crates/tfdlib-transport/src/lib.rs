//! Transport implementations for tfdlib.
//!
//! This crate provides the production implementation of the
//! [`Transport`](tfdlib_core::Transport) trait from `tfdlib-core`:
//!
//! - [`SerialTransport`]: the logger's USB virtual COM port
//!
//! Opening and configuring the port lives here so that the protocol engine
//! in `tfdlib-tfd500` only ever sees an already-configured byte channel.

pub mod serial;

pub use serial::{DEFAULT_BAUD_RATE, SerialTransport};
