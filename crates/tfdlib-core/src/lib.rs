//! tfdlib-core: Core traits, types, and error definitions for tfdlib.
//!
//! This crate defines the device-agnostic pieces every tfdlib crate shares:
//! the byte-level [`Transport`] seam, the logger's data model, and the
//! error taxonomy.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`Settings`], [`Status`], [`Record`] -- logger state and measurements
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod helpers;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use tfdlib_core::*`.
pub use error::{Error, Result};
pub use helpers::{format_asctime, format_device_time, format_record_time, parse_device_time};
pub use transport::Transport;
pub use types::*;
