//! upload_cert - Upload a CA certificate to a device over its serial console.
//!
//! ## Usage
//!
//! ```text
//! upload_cert <serial_port> <cert_file>
//! ```
//!
//! Exits 0 when the device confirmed the certificate, 1 on a usage error or a
//! failed upload.

use anyhow::{Context, Result};
use certupload::{BeginOutcome, CaStatus, Certificate, UploadReport};
use clap::Parser;
use clap::error::ErrorKind;
use console::style;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

mod config;

use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if emoji/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Usage text printed on a wrong argument count.
const USAGE: &str = "Usage: upload_cert <serial_port> <cert_file>\n\
                     Example: upload_cert /dev/cu.usbserial-0001 mqtt_ca.crt";

/// upload_cert - Upload a CA certificate to a device over its serial console.
///
/// Environment variables:
///   CERTUPLOAD_BAUD   - Console baud rate (default: 115200)
///   RUST_LOG          - Log filter (overrides -v/-q)
#[derive(Parser)]
#[command(name = "upload_cert")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial port the device console is attached to.
    port: String,

    /// Certificate file to upload.
    cert_file: PathBuf,

    /// Console baud rate.
    #[arg(short, long, env = "CERTUPLOAD_BAUD")]
    baud: Option<u32>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long)]
    quiet: bool,

    /// Print the upload report as JSON to stdout.
    #[arg(long)]
    json: bool,

    /// Path to a configuration file.
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return usage_error(&err),
    };

    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "upload_cert v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match cmd_upload(&cli) {
        Ok(report) => report_exit_code(&report),
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::FAILURE
        },
    }
}

/// Report an argument parsing failure.
///
/// Help and version requests succeed. Anything else prints the usage text to
/// stdout and exits 1; clap's own message goes to stderr unless it only
/// complains about missing arguments, which the usage text already covers.
fn usage_error(err: &clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            ExitCode::SUCCESS
        },
        kind => {
            if kind != ErrorKind::MissingRequiredArgument {
                eprint!("{}", err.render());
            }
            println!("{USAGE}");
            ExitCode::FAILURE
        },
    }
}

/// Exit status for a finished upload: 0 when the device confirmed it, 1
/// otherwise.
fn report_exit_code(report: &UploadReport) -> ExitCode {
    if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Upload command implementation.
fn cmd_upload(cli: &Cli) -> Result<UploadReport> {
    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };
    let upload_config = config.upload_config();
    upload_config.validate()?;
    let serial = config.serial_config(&cli.port, cli.baud);
    serial.validate()?;

    let certificate = Certificate::from_file(&cli.cert_file).context("Failed to load certificate")?;
    if certificate.is_empty() {
        warn!("{} has no certificate lines to send", cli.cert_file.display());
    }

    if !cli.quiet {
        eprintln!(
            "{} Uploading {} to {} ({} baud)...",
            style("🔌").cyan(),
            cli.cert_file.display(),
            serial.port_name,
            serial.baud_rate
        );
    }

    // Create progress bar
    let pb = if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(certificate.line_count() as u64);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} lines")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb
    };

    let result = certupload::upload_with(
        &serial,
        &certificate,
        &upload_config,
        &mut |sent: usize, _total: usize| pb.set_position(sent as u64),
    );
    pb.finish_and_clear();
    let report =
        result.with_context(|| format!("Failed to upload certificate on {}", serial.port_name))?;

    if !cli.quiet {
        print_report(&report);
    }
    if cli.json {
        let output = serde_json::json!({
            "success": report.success(),
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(report)
}

/// Print the per-phase outcome and the final verdict to stderr.
fn print_report(report: &UploadReport) {
    match &report.begin {
        BeginOutcome::Ready => {
            eprintln!("{} Upload started", style("✓").green());
            eprintln!(
                "{} Sent {} certificate lines",
                style("ℹ").blue(),
                report.lines_sent
            );
        },
        BeginOutcome::DeviceError { line } => {
            eprintln!("{} Error: {line}", style("✗").red());
        },
        BeginOutcome::NoResponse => {
            eprintln!(
                "{} Failed to start upload (no response)",
                style("✗").red()
            );
        },
    }

    if report.begin == BeginOutcome::Ready {
        if report.saved {
            eprintln!("{} Certificate saved", style("✓").green());
        }
        match report.ca_status {
            CaStatus::Present => eprintln!("{} CA certificate present", style("✓").green()),
            CaStatus::Absent => eprintln!("{} CA certificate not present", style("⚠").yellow()),
            CaStatus::NotReported => {},
        }
    }

    if report.success() {
        eprintln!(
            "\n{} Certificate uploaded successfully!",
            style("✅").green().bold()
        );
    } else {
        eprintln!("\n{} Upload failed!", style("❌").red().bold());
    }
}
