//! In-memory simulation of a TFD 500 logger.
//!
//! [`SimulatedLogger`] is a stateful [`Transport`] that decodes the command
//! bytes it receives and answers the way the device does: it keeps a clock,
//! recording settings and a record store, so set-then-get round trips and
//! multi-block dumps can be tested end to end without scripting every byte.
//!
//! The response layouts are written independently of the codec in
//! `tfdlib-tfd500`:
//!
//! ```text
//! d-response: 'd' NNNNNN ' ' dd.mm.yy HH:MM:SS      (25 bytes)
//! o-response: 'o' ' ' M ' ' ' ' I ' ' ' ' dd.mm.yy HH:MM:SS
//! F-response: 'F' <records * 3 bytes> '\r'
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use tfdlib_core::error::{Error, Result};
use tfdlib_core::transport::Transport;
use tfdlib_core::types::{Interval, Mode, Status};

const TIME_FORMAT: &str = "%d.%m.%y %H:%M:%S";
const RECORDS_PER_BLOCK: usize = 85;
const BLOCK_TERMINATOR: u8 = b'\r';
const NAK: u8 = b'?';

#[derive(Debug)]
struct SimState {
    firmware: String,
    status: Status,
    clock: NaiveDateTime,
    start: NaiveDateTime,
    interval: Interval,
    mode: Mode,
    records: Vec<(u16, u8)>,
    rx: Vec<u8>,
    tx: VecDeque<u8>,
    block_requests: Vec<u16>,
    connected: bool,
}

/// A simulated logger speaking the TFD 500 serial protocol.
///
/// Clones share state, so a test can keep one handle for inspection.
#[derive(Debug, Clone)]
pub struct SimulatedLogger {
    state: Arc<Mutex<SimState>>,
}

fn factory_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn interval_digit(interval: Interval) -> u8 {
    match interval {
        Interval::Secs10 => b'0',
        Interval::Secs60 => b'1',
        Interval::Secs300 => b'2',
    }
}

/// Number of argument bytes following each command tag.
fn argument_len(tag: u8) -> usize {
    match tag {
        b'T' => 17,
        b'I' | b'C' => 1,
        b'F' => 4,
        _ => 0,
    }
}

impl SimulatedLogger {
    /// Create an idle logger with no records, 60 s interval and
    /// temperature-only mode.
    pub fn new() -> Self {
        SimulatedLogger {
            state: Arc::new(Mutex::new(SimState {
                firmware: "TFD500 V1.10".to_string(),
                status: Status::Idle,
                clock: factory_time(),
                start: factory_time(),
                interval: Interval::Secs60,
                mode: Mode::Temperature,
                records: Vec::new(),
                rx: Vec::new(),
                tx: VecDeque::new(),
                block_requests: Vec::new(),
                connected: true,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the firmware string returned by the `v` command.
    pub fn with_firmware(self, firmware: &str) -> Self {
        self.state().firmware = firmware.to_string();
        self
    }

    /// Set the recording status returned by the `a` command.
    pub fn with_status(self, status: Status) -> Self {
        self.state().status = status;
        self
    }

    /// Set the device clock.
    pub fn with_clock(self, clock: NaiveDateTime) -> Self {
        self.state().clock = clock;
        self
    }

    /// Load stored records (`(raw temperature, aux byte)` pairs) recorded
    /// from `start` on.
    pub fn with_records(self, start: NaiveDateTime, records: Vec<(u16, u8)>) -> Self {
        {
            let mut state = self.state();
            state.start = start;
            state.records = records;
        }
        self
    }

    /// Set the recording interval and mode.
    pub fn with_settings(self, interval: Interval, mode: Mode) -> Self {
        {
            let mut state = self.state();
            state.interval = interval;
            state.mode = mode;
        }
        self
    }

    /// Current device clock.
    pub fn clock(&self) -> NaiveDateTime {
        self.state().clock
    }

    /// Current sampling interval.
    pub fn interval(&self) -> Interval {
        self.state().interval
    }

    /// Current channel mode.
    pub fn mode(&self) -> Mode {
        self.state().mode
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.state().records.len()
    }

    /// Block indices requested with `F` commands, in order.
    pub fn block_requests(&self) -> Vec<u16> {
        self.state().block_requests.clone()
    }
}

impl Default for SimulatedLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SimState {
    /// Consume complete commands from `rx` and queue their responses.
    fn process(&mut self) {
        while let Some(&tag) = self.rx.first() {
            let needed = 1 + argument_len(tag);
            if self.rx.len() < needed {
                return;
            }
            let command: Vec<u8> = self.rx.drain(..needed).collect();
            self.respond(tag, &command[1..]);
        }
    }

    fn respond(&mut self, tag: u8, arg: &[u8]) {
        match tag {
            b'X' => {
                self.status = Status::Idle;
                self.interval = Interval::Secs60;
                self.mode = Mode::Temperature;
                self.records.clear();
            }
            b'R' => self.records.clear(),
            b'v' => {
                let line = format!("{}\r\n", self.firmware);
                self.tx.extend(line.bytes());
            }
            b'a' => {
                let busy = if self.status == Status::Busy { b'1' } else { b'0' };
                self.tx.extend([b'a', busy]);
            }
            b'd' => {
                let line = format!(
                    "d{:06} {}",
                    self.records.len(),
                    self.start.format(TIME_FORMAT)
                );
                self.tx.extend(line.bytes());
            }
            b'o' => {
                let mode = if self.mode == Mode::Temperature { '0' } else { '1' };
                let line = format!(
                    "o {mode}  {}  {}",
                    char::from(interval_digit(self.interval)),
                    self.clock.format(TIME_FORMAT)
                );
                self.tx.extend(line.bytes());
            }
            b'T' => {
                let parsed = std::str::from_utf8(arg)
                    .ok()
                    .and_then(|s| NaiveDateTime::parse_from_str(s, TIME_FORMAT).ok());
                match parsed {
                    Some(clock) => {
                        self.clock = clock;
                        self.tx.push_back(b'T');
                    }
                    None => self.tx.push_back(NAK),
                }
            }
            b'I' => {
                let interval = match arg {
                    b"0" => Some(Interval::Secs10),
                    b"1" => Some(Interval::Secs60),
                    b"2" => Some(Interval::Secs300),
                    _ => None,
                };
                match interval {
                    Some(interval) => {
                        self.interval = interval;
                        self.tx.push_back(b'I');
                    }
                    None => self.tx.push_back(NAK),
                }
            }
            b'C' => {
                let mode = match arg {
                    b"0" => Some(Mode::Temperature),
                    b"1" => Some(Mode::TemperatureHumidity),
                    _ => None,
                };
                match mode {
                    Some(mode) => {
                        self.mode = mode;
                        self.tx.push_back(b'C');
                    }
                    None => self.tx.push_back(NAK),
                }
            }
            b'F' => {
                let block = std::str::from_utf8(arg)
                    .ok()
                    .and_then(|s| s.parse::<u16>().ok());
                let Some(block) = block else {
                    self.tx.push_back(NAK);
                    return;
                };
                self.block_requests.push(block);
                self.tx.push_back(b'F');
                let first = usize::from(block) * RECORDS_PER_BLOCK;
                let last = (first + RECORDS_PER_BLOCK).min(self.records.len());
                if first < last {
                    for &(temperature, aux) in &self.records[first..last] {
                        self.tx.extend(temperature.to_be_bytes());
                        self.tx.push_back(aux);
                    }
                }
                self.tx.push_back(BLOCK_TERMINATOR);
            }
            _ => self.tx.push_back(NAK),
        }
    }
}

#[async_trait]
impl Transport for SimulatedLogger {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        if !state.connected {
            return Err(Error::NotConnected);
        }
        state.rx.extend_from_slice(data);
        state.process();
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let mut state = self.state();
        if !state.connected {
            return Err(Error::NotConnected);
        }
        if state.tx.is_empty() {
            return Err(Error::Timeout);
        }
        let n = state.tx.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(state.tx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.state().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }
}
