//! drobo-check - Nagios-style health check for Drobo storage appliances
//!
//! Connects to the appliance status service (TCP port 5000), reads one
//! length-prefixed status document and reports:
//! - capacity usage measured against the device's yellow/red thresholds
//! - drive health per expansion slot
//!
//! Output is a single status line on stdout; the exit code is the Nagios
//! severity (0 OK, 1 WARNING, 2 CRITICAL, 3 UNKNOWN when no verdict could
//! be produced).

mod config;
mod error;
mod protocol;
mod status;

use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

use crate::config::CheckConfig;
use crate::error::CheckError;
use crate::status::CheckReport;

/// Exit code for runs that could not produce a verdict.
const EXIT_UNKNOWN: i32 = 3;

/// Health check for Drobo storage appliances
#[derive(Parser, Debug)]
#[command(name = "drobo-check")]
#[command(version)]
#[command(about = "Nagios-style health check for Drobo storage appliances", long_about = None)]
struct Cli {
    /// Hostname or IP address of the appliance
    host: String,

    /// TCP port of the status service
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Connect timeout in seconds
    #[arg(long = "connect-timeout", value_name = "SECONDS")]
    connect_timeout: Option<u64>,

    /// Timeout for reading the whole status frame in seconds
    #[arg(long = "read-timeout", value_name = "SECONDS")]
    read_timeout: Option<u64>,

    /// Extra attempts after a transport failure
    #[arg(long = "retries")]
    retries: Option<u32>,

    /// Alternate configuration file path
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Verbose diagnostics on stderr
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

impl Cli {
    /// Command-line flags win over the config file.
    fn apply(&self, mut config: CheckConfig) -> CheckConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.connect_timeout {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = self.read_timeout {
            config.read_timeout_secs = secs;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        config
    }
}

/// The whole pipeline: connect, read one frame, parse, evaluate.
async fn run_check(host: &str, config: &CheckConfig) -> Result<CheckReport, CheckError> {
    let payload = protocol::fetch_status(host, config).await?;
    debug!("read {}-byte status document", payload.len());
    let device_status = status::parse_status(&payload)?;
    status::evaluate(&device_status)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries exactly one parseable status line; diagnostics go to
    // stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_target(false)
        .init();

    let config = match CheckConfig::load(cli.config.as_deref()).await {
        Ok(config) => cli.apply(config),
        Err(e) => {
            println!("UNKNOWN - bad configuration: {e}");
            std::process::exit(EXIT_UNKNOWN);
        }
    };

    match run_check(&cli.host, &config).await {
        Ok(report) => {
            println!("{}", report.status_line());
            std::process::exit(report.severity.exit_code());
        }
        Err(e) => {
            println!("UNKNOWN - {e}");
            std::process::exit(EXIT_UNKNOWN);
        }
    }
}
