//! Record dump engine.
//!
//! The logger stores records in flash blocks of 85 three-byte records. A
//! dump walks the blocks with `F` requests and decodes them one at a time,
//! handing out [`Record`]s as the caller pulls them. At most one block's
//! payload is held in memory.

use std::collections::VecDeque;

use tracing::{debug, warn};

use tfdlib_core::error::{Error, Result};
use tfdlib_core::types::{Record, Settings};

use crate::commands::{self, BlockRequest};
use crate::device::Tfd500;
use crate::protocol::{CMD_READ_BLOCK, RECORD_LEN};

/// A lazy, single-pass sequence of stored records.
///
/// Created by [`Tfd500::dump`]. The dump holds the driver mutably for its
/// whole life; drop it to issue other commands.
///
/// ```no_run
/// # async fn example(dev: &mut tfdlib_tfd500::Tfd500) -> tfdlib_core::Result<()> {
/// let mut dump = dev.dump().await?;
/// while let Some(record) = dump.next().await {
///     println!("{}", record?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct RecordDump<'a> {
    device: &'a mut Tfd500,
    settings: Settings,
    plan: VecDeque<BlockRequest>,
    pending: VecDeque<(u16, u8)>,
    next_index: u32,
    finished: bool,
}

impl<'a> RecordDump<'a> {
    pub(crate) fn new(device: &'a mut Tfd500, settings: Settings) -> Self {
        RecordDump {
            device,
            settings,
            plan: commands::block_plan(settings.record_count).collect(),
            pending: VecDeque::new(),
            next_index: 0,
            finished: false,
        }
    }

    /// Number of records the logger reported when the dump started.
    pub fn total(&self) -> u32 {
        self.settings.record_count
    }

    /// Settings the dump was derived from.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Pull the next record, fetching another block when the current one
    /// is used up.
    ///
    /// Returns `None` once every block has been read. An error is returned
    /// once; the dump yields `None` after it.
    pub async fn next(&mut self) -> Option<Result<Record>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some((raw_temperature, aux)) = self.pending.pop_front() {
                let index = self.next_index;
                self.next_index += 1;
                return Some(Ok(Record {
                    index,
                    timestamp: self.settings.timestamp_of(index),
                    raw_temperature,
                    aux,
                }));
            }

            let Some(block) = self.plan.pop_front() else {
                debug!(parent: self.device.span(), records = self.next_index, "dump complete");
                self.finished = true;
                return None;
            };

            match self.fetch_block(block).await {
                Ok(records) => self.pending = records,
                Err(e) => {
                    warn!(
                        parent: self.device.span(),
                        block = block.index,
                        error = %e,
                        "block read failed"
                    );
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }

    /// Request one block and decode its records.
    async fn fetch_block(&mut self, block: BlockRequest) -> Result<VecDeque<(u16, u8)>> {
        let cmd = commands::cmd_read_block(block.index)?;
        let channel = self.device.channel_mut();
        debug!(parent: channel.span(), block = block.index, records = block.records, "read block");

        channel.write_bytes(&cmd).await?;
        channel.expect_ack(CMD_READ_BLOCK).await?;
        let payload = channel.read_bytes(block.payload_len()).await?;

        let record_bytes = block.records as usize * RECORD_LEN;
        if payload.len() < record_bytes {
            return Err(Error::Protocol(format!(
                "block {} truncated: expected {record_bytes} record bytes, got {}",
                block.index,
                payload.len()
            )));
        }
        if payload.len() == record_bytes {
            debug!(parent: channel.span(), block = block.index, "block terminator missing");
        }

        payload[..record_bytes]
            .chunks_exact(RECORD_LEN)
            .map(commands::parse_record)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::{NaiveDate, NaiveDateTime};
    use tfdlib_core::types::{Interval, Mode};
    use tfdlib_test_harness::{MockTransport, SimulatedLogger};
    use tracing::Span;

    use crate::io::Channel;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn device(transport: Box<dyn tfdlib_core::Transport>) -> Tfd500 {
        Tfd500::new(Channel::new(
            transport,
            Duration::from_millis(100),
            Span::none(),
        ))
    }

    fn settings_exchange(mock: &mut MockTransport, d_response: &[u8]) {
        mock.expect(b"d", d_response);
        mock.expect(b"o", b"o 0  1  24.12.17 18:05:09");
    }

    async fn collect(dump: &mut RecordDump<'_>) -> Vec<Result<Record>> {
        let mut out = Vec::new();
        while let Some(item) = dump.next().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn three_record_dump_lines() {
        let mut mock = MockTransport::new();
        settings_exchange(&mut mock, b"d000003 01.01.20 00:00:00");
        let mut block = vec![b'F'];
        for _ in 0..3 {
            block.extend_from_slice(&[0x00, 0xE1, 40]);
        }
        block.push(b'\r');
        mock.expect(b"F0000", &block);

        let mut dev = device(Box::new(mock.clone()));
        let mut dump = dev.dump().await.unwrap();
        assert_eq!(dump.total(), 3);

        let lines: Vec<String> = collect(&mut dump)
            .await
            .into_iter()
            .map(|r| r.unwrap().to_string())
            .collect();
        assert_eq!(
            lines,
            vec![
                "0;01.01.2020 00:00:00;22.5;40",
                "1;01.01.2020 00:01:00;22.5;40",
                "2;01.01.2020 00:02:00;22.5;40",
            ]
        );
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn full_block_count_issues_drain_request() {
        let start = at(2020, 1, 1, 0, 0, 0);
        let sim = SimulatedLogger::new().with_records(start, vec![(200, 0); 85]);
        let mut dev = device(Box::new(sim.clone()));

        let mut dump = dev.dump().await.unwrap();
        let records = collect(&mut dump).await;

        assert_eq!(records.len(), 85);
        assert_eq!(sim.block_requests(), vec![0, 1]);
    }

    #[tokio::test]
    async fn drain_request_bytes() {
        let mut mock = MockTransport::new();
        settings_exchange(&mut mock, b"d000085 01.01.20 00:00:00");
        let mut block = vec![b'F'];
        block.extend(std::iter::repeat_n([0x01, 0x00, 0x00], 85).flatten());
        block.push(b'\r');
        mock.expect(b"F0000", &block);
        mock.expect(b"F0001", b"F\r");

        let mut dev = device(Box::new(mock.clone()));
        let mut dump = dev.dump().await.unwrap();
        assert_eq!(collect(&mut dump).await.len(), 85);
        drop(dump);

        assert!(mock.sent_bytes().ends_with(b"F0000F0001"));
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn multi_block_dump_advances_timestamps() {
        let start = at(2021, 6, 1, 12, 0, 0);
        let records: Vec<(u16, u8)> = (0..200).map(|i| (i as u16, (i % 100) as u8)).collect();
        let sim = SimulatedLogger::new()
            .with_settings(Interval::Secs300, Mode::TemperatureHumidity)
            .with_records(start, records);
        let mut dev = device(Box::new(sim.clone()));

        let mut dump = dev.dump().await.unwrap();
        assert_eq!(dump.settings().interval, Interval::Secs300);
        let records: Vec<Record> = collect(&mut dump)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(records.len(), 200);
        assert_eq!(sim.block_requests(), vec![0, 1, 2]);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.index, i as u32);
            assert_eq!(record.raw_temperature, i as u16);
        }
        assert_eq!(records[199].timestamp, at(2021, 6, 2, 4, 35, 0));
    }

    #[tokio::test]
    async fn empty_logger_still_requests_block_zero() {
        let sim = SimulatedLogger::new();
        let mut dev = device(Box::new(sim.clone()));

        let mut dump = dev.dump().await.unwrap();
        assert!(dump.next().await.is_none());
        assert_eq!(sim.block_requests(), vec![0]);
    }

    #[tokio::test]
    async fn missing_terminator_is_tolerated() {
        let mut mock = MockTransport::new();
        settings_exchange(&mut mock, b"d000001 01.01.20 00:00:00");
        mock.expect(b"F0000", &[b'F', 0x00, 0x64, 7]);

        let mut dev = device(Box::new(mock));
        let mut dump = dev.dump().await.unwrap();
        let record = dump.next().await.unwrap().unwrap();
        assert_eq!(record.to_string(), "0;01.01.2020 00:00:00;10.0;7");
        assert!(dump.next().await.is_none());
    }

    #[tokio::test]
    async fn truncated_block_ends_dump_with_error() {
        let mut mock = MockTransport::new();
        settings_exchange(&mut mock, b"d000002 01.01.20 00:00:00");
        mock.expect(b"F0000", &[b'F', 0x00, 0x64, 7, 0x00]);

        let mut dev = device(Box::new(mock));
        let mut dump = dev.dump().await.unwrap();
        assert!(matches!(dump.next().await, Some(Err(Error::Protocol(_)))));
        assert!(dump.next().await.is_none());
    }

    #[tokio::test]
    async fn wrong_block_ack_is_protocol_error() {
        let mut mock = MockTransport::new();
        settings_exchange(&mut mock, b"d000001 01.01.20 00:00:00");
        mock.expect(b"F0000", b"?");

        let mut dev = device(Box::new(mock));
        let mut dump = dev.dump().await.unwrap();
        assert!(matches!(dump.next().await, Some(Err(Error::Protocol(_)))));
        assert!(dump.next().await.is_none());
    }

    #[tokio::test]
    async fn settings_failure_prevents_dump() {
        let mut mock = MockTransport::new();
        mock.expect(b"d", b"d0000");

        let mut dev = device(Box::new(mock.clone()));
        assert!(dev.dump().await.is_err());
        assert!(!mock.sent_bytes().contains(&b'F'));
    }
}
