// tfd500 -- command-line controller for the TFD 500 temperature and
// humidity data logger.
//
// Usage:
//   tfd500 --firmware --status
//   tfd500 -d /dev/ttyUSB1 --settings
//   tfd500 --stime --interval 60 --mode 1
//   tfd500 --dump > records.csv
//   tfd500 --dump --verbose debug
//
// Operations run in a fixed order regardless of the order of the flags:
// reset, clear, firmware, status, gtime, stime, settings, interval, mode,
// dump. A failed operation is reported and the remaining ones still run;
// the exit status reflects the last operation. Without any operation the
// help text is printed and the exit status is a failure.

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use tracing::level_filters::LevelFilter;
use tracing::{info_span, warn};

use tfdlib_core::format_asctime;
use tfdlib_tfd500::{Tfd500, Tfd500Builder};
use tfdlib_transport::DEFAULT_BAUD_RATE;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Control a TFD 500 data logger over its USB serial port.
#[derive(Parser)]
#[command(name = "tfd500", version, about)]
struct Cli {
    /// Serial device of the logger.
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    device: String,

    /// Override the baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Per-byte read timeout in milliseconds.
    #[arg(long, default_value_t = 100)]
    timeout_ms: u64,

    /// Print the recording status (idle or busy).
    #[arg(short, long)]
    status: bool,

    /// Factory reset the logger.
    #[arg(short, long)]
    reset: bool,

    /// Erase all stored records.
    #[arg(short, long)]
    clear: bool,

    /// Print the firmware version.
    #[arg(short, long)]
    firmware: bool,

    /// Print the device clock.
    #[arg(short, long)]
    gtime: bool,

    /// Set the device clock to the local time.
    #[arg(short = 't', long)]
    stime: bool,

    /// Print status and recording settings.
    #[arg(short = 'e', long)]
    settings: bool,

    /// Set the recording interval: 10, 60 or 300 seconds.
    #[arg(short, long)]
    interval: Option<u32>,

    /// Set the channel mode: 0 temperature, 1 temperature and humidity.
    #[arg(short, long)]
    mode: Option<u8>,

    /// Print all stored records, one per line.
    #[arg(short = 'u', long)]
    dump: bool,

    /// Log verbosity.
    #[arg(short, long, value_enum, default_value_t = Verbosity::Message)]
    verbose: Verbosity,
}

impl Cli {
    fn has_operation(&self) -> bool {
        self.status
            || self.reset
            || self.clear
            || self.firmware
            || self.gtime
            || self.stime
            || self.settings
            || self.interval.is_some()
            || self.mode.is_some()
            || self.dump
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Verbosity {
    Error,
    Warn,
    Message,
    Info,
    Debug,
}

impl Verbosity {
    fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Error => LevelFilter::ERROR,
            Verbosity::Warn => LevelFilter::WARN,
            Verbosity::Message => LevelFilter::INFO,
            Verbosity::Info => LevelFilter::DEBUG,
            Verbosity::Debug => LevelFilter::TRACE,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if !cli.has_operation() {
        Cli::command().print_help()?;
        return Ok(ExitCode::FAILURE);
    }

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(cli.verbose.level_filter())
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start runtime")?;
        runtime.block_on(run(&cli))
    })
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    let span = info_span!("tfd500", device = %cli.device);
    let mut logger = Tfd500Builder::new()
        .serial_port(&cli.device)
        .baud_rate(cli.baud)
        .byte_timeout(Duration::from_millis(cli.timeout_ms))
        .log_span(span)
        .build()
        .await
        .with_context(|| format!("cannot open {}", cli.device))?;

    let ok = run_operations(cli, &mut logger).await;
    logger.close().await.ok();
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Run the requested operations in their fixed order; returns whether the
/// last one succeeded.
async fn run_operations(cli: &Cli, logger: &mut Tfd500) -> bool {
    let mut ok = true;
    if cli.reset {
        ok = outcome(cmd_reset(logger).await, "factory reset failed");
    }
    if cli.clear {
        ok = outcome(cmd_clear(logger).await, "clearing flash memory failed");
    }
    if cli.firmware {
        ok = outcome(cmd_firmware(logger).await, "get firmware version failed");
    }
    if cli.status {
        ok = outcome(cmd_status(logger).await, "status failed");
    }
    if cli.gtime {
        ok = outcome(cmd_gtime(logger).await, "get time failed");
    }
    if cli.stime {
        ok = outcome(cmd_stime(logger).await, "set time failed");
    }
    if cli.settings {
        ok = outcome(cmd_settings(logger).await, "settings failed");
    }
    if let Some(secs) = cli.interval {
        ok = outcome(cmd_interval(logger, secs).await, "set interval failed");
    }
    if let Some(mode) = cli.mode {
        ok = outcome(cmd_mode(logger, mode).await, "set mode failed");
    }
    if cli.dump {
        ok = outcome(cmd_dump(logger).await, "dump failed");
    }
    ok
}

/// Log a failed operation; returns whether it succeeded.
fn outcome(result: Result<()>, failure: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "{failure}");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

async fn cmd_reset(logger: &mut Tfd500) -> Result<()> {
    logger.reset().await?;
    println!("factory reset was successful");
    Ok(())
}

async fn cmd_clear(logger: &mut Tfd500) -> Result<()> {
    logger.clear_flash().await?;
    println!("flash memory successfully cleared");
    Ok(())
}

async fn cmd_firmware(logger: &mut Tfd500) -> Result<()> {
    let version = logger.get_version().await?;
    println!("{version}");
    Ok(())
}

async fn cmd_status(logger: &mut Tfd500) -> Result<()> {
    let status = logger.get_status().await?;
    println!("{status}");
    Ok(())
}

async fn cmd_gtime(logger: &mut Tfd500) -> Result<()> {
    let clock = logger.get_clock().await?;
    println!("{}", format_asctime(&clock));
    Ok(())
}

async fn cmd_stime(logger: &mut Tfd500) -> Result<()> {
    let now = chrono::Local::now().naive_local();
    logger.set_clock(now).await?;
    println!("set time was successful");
    Ok(())
}

async fn cmd_settings(logger: &mut Tfd500) -> Result<()> {
    let report = logger.report().await?;
    println!("{report}");
    Ok(())
}

async fn cmd_interval(logger: &mut Tfd500, secs: u32) -> Result<()> {
    logger.set_interval(secs).await?;
    println!("set interval was successful");
    Ok(())
}

async fn cmd_mode(logger: &mut Tfd500, mode: u8) -> Result<()> {
    logger.set_mode(mode).await?;
    println!("set mode was successful");
    Ok(())
}

async fn cmd_dump(logger: &mut Tfd500) -> Result<()> {
    let mut dump = logger.dump().await?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    while let Some(record) = dump.next().await {
        writeln!(out, "{}", record?)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfdlib_test_harness::MockTransport;

    async fn logger_on(mock: &MockTransport) -> Tfd500 {
        Tfd500Builder::new()
            .byte_timeout(Duration::from_millis(20))
            .build_with_transport(Box::new(mock.clone()))
            .await
            .unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn operations_detected() {
        let cli = Cli::parse_from(["tfd500", "-d", "/dev/ttyUSB1"]);
        assert!(!cli.has_operation());
        assert_eq!(cli.device, "/dev/ttyUSB1");

        let cli = Cli::parse_from(["tfd500", "-fs"]);
        assert!(cli.has_operation());
        assert!(cli.firmware && cli.status);
    }

    #[test]
    fn interval_values() {
        let cli = Cli::parse_from(["tfd500", "-i", "300"]);
        assert_eq!(cli.interval, Some(300));

        // Unsupported intervals are left to the driver.
        let cli = Cli::parse_from(["tfd500", "-i", "30"]);
        assert_eq!(cli.interval, Some(30));
        assert!(Cli::try_parse_from(["tfd500", "-i", "ten"]).is_err());
    }

    #[test]
    fn mode_values() {
        let cli = Cli::parse_from(["tfd500", "--mode", "1"]);
        assert_eq!(cli.mode, Some(1));

        let cli = Cli::parse_from(["tfd500", "--mode", "2"]);
        assert_eq!(cli.mode, Some(2));
    }

    #[tokio::test]
    async fn invalid_interval_warns_and_is_last_outcome() {
        let mut mock = MockTransport::new();
        mock.expect(b"v", b"TFD500 V1.10\r\n");
        let mut logger = logger_on(&mock).await;

        let cli = Cli::parse_from(["tfd500", "-f", "-i", "30"]);
        assert!(!run_operations(&cli, &mut logger).await);
        assert_eq!(mock.sent_bytes(), b"v");
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn invalid_interval_does_not_stop_later_operations() {
        let mut mock = MockTransport::new();
        mock.expect(b"v", b"TFD500 V1.10\r\n");
        mock.expect(b"C1", b"C");
        let mut logger = logger_on(&mock).await;

        let cli = Cli::parse_from(["tfd500", "-f", "-i", "30", "-m", "1"]);
        assert!(run_operations(&cli, &mut logger).await);
        assert_eq!(mock.sent_bytes(), b"vC1");
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn invalid_mode_sends_nothing() {
        let mock = MockTransport::new();
        let mut logger = logger_on(&mock).await;

        let cli = Cli::parse_from(["tfd500", "-m", "2"]);
        assert!(!run_operations(&cli, &mut logger).await);
        assert!(mock.sent_bytes().is_empty());
    }

    #[test]
    fn verbosity_mapping() {
        let cli = Cli::parse_from(["tfd500", "-u"]);
        assert_eq!(cli.verbose.level_filter(), LevelFilter::INFO);

        let cli = Cli::parse_from(["tfd500", "-u", "-v", "debug"]);
        assert_eq!(cli.verbose.level_filter(), LevelFilter::TRACE);
        assert!(Cli::try_parse_from(["tfd500", "-v", "loud"]).is_err());
    }
}
