//! tfdlib-test-harness: Test utilities and fake loggers for tfdlib.
//!
//! This crate provides [`MockTransport`] for byte-exact scripted exchanges
//! and [`SimulatedLogger`], a stateful in-memory logger for round-trip
//! tests of the protocol engine without real hardware.

pub mod mock_serial;
pub mod sim_logger;

pub use mock_serial::MockTransport;
pub use sim_logger::SimulatedLogger;
