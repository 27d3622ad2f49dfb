//! TFD 500 data logger protocol engine for tfdlib.
//!
//! This crate implements the serial protocol of the TFD 500 temperature and
//! humidity logger. It provides:
//!
//! - **Byte channel** ([`io`]) -- byte-at-a-time reads and writes over a
//!   [`Transport`](tfdlib_core::Transport), where a quiet line ends a
//!   response.
//! - **Protocol framing** ([`protocol`]) -- command tags, response layouts
//!   and bounds-checked field extraction.
//! - **Command builders** ([`commands`]) -- construct every logger command
//!   and parse the corresponding responses, plus the block layout of a dump.
//! - **Driver** ([`device`]) -- [`Tfd500`], one async method per device
//!   operation.
//! - **Dump engine** ([`dump`]) -- [`RecordDump`], a lazy pull sequence of
//!   stored records fetched block by block.
//! - **Builder** ([`builder`]) -- fluent builder API for constructing
//!   [`Tfd500`] instances.
//!
//! # Example
//!
//! ```
//! use tfdlib_tfd500::commands::{cmd_read_settings, parse_settings_response};
//!
//! // Build a "read settings" command
//! assert_eq!(cmd_read_settings(), b"d");
//!
//! // Simulate the logger's 25-byte answer
//! let window = parse_settings_response(b"d000003 01.01.20 00:00:00").unwrap();
//! assert_eq!(window.record_count, 3);
//! ```

pub mod builder;
pub mod commands;
pub mod device;
pub mod dump;
pub mod io;
pub mod protocol;

pub use builder::Tfd500Builder;
pub use device::{DeviceReport, Tfd500};
pub use dump::RecordDump;
