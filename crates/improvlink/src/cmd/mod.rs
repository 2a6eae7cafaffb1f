use std::time::Duration;

use clap::{Args, Subcommand};
use improvlink_client::{Session, SessionConfig};
use improvlink_frame::FrameConfig;
use improvlink_transport::{UsbSerialLink, DEFAULT_BAUD_RATE};

use crate::exit::{client_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod identify;
pub mod ports;
pub mod provision;
pub mod save;
pub mod scan;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports on this machine.
    Ports,
    /// Query the connected device's identity.
    Identify(IdentifyArgs),
    /// Ask the device to scan for WiFi networks.
    Scan(ScanArgs),
    /// Save credentials to the device without waiting for it to connect.
    Save(SaveArgs),
    /// Submit credentials and wait for the device to join the network.
    Test(TestArgs),
    /// Run the full flow: identify, scan, submit credentials.
    Provision(ProvisionArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports => ports::run(format),
        Command::Identify(args) => identify::run(args, format),
        Command::Scan(args) => scan::run(args, format),
        Command::Save(args) => save::run(args, format),
        Command::Test(args) => test::run(args, format),
        Command::Provision(args) => provision::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    pub port: String,
    /// Baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Reject frames whose trailing checksum does not match.
    #[arg(long)]
    pub verify_checksum: bool,
}

#[derive(Args, Debug)]
pub struct IdentifyArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Per-attempt wait for the device to answer (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct SaveArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Network name.
    #[arg(long)]
    pub ssid: String,
    /// Network password (omit for open networks).
    #[arg(long, default_value = "")]
    pub password: String,
}

#[derive(Args, Debug)]
pub struct TestArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Network name.
    #[arg(long)]
    pub ssid: String,
    /// Network password (omit for open networks).
    #[arg(long, default_value = "")]
    pub password: String,
    /// Per-attempt wait for the device to join (e.g. 25s).
    #[arg(long, default_value = "25s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Network name.
    #[arg(long)]
    pub ssid: String,
    /// Network password (omit for open networks).
    #[arg(long, default_value = "")]
    pub password: String,
    /// Save without waiting for the device to join.
    #[arg(long)]
    pub save_only: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn open_session(link: &LinkArgs) -> CliResult<Session> {
    let port = UsbSerialLink::open(&link.port, link.baud)
        .map_err(|err| transport_error("failed to open port", err))?;
    Session::open(Box::new(port), session_config(link))
        .map_err(|err| client_error("failed to start session", err))
}

pub fn session_config(link: &LinkArgs) -> SessionConfig {
    SessionConfig {
        frame: FrameConfig {
            verify_checksum: link.verify_checksum,
        },
        ..SessionConfig::default()
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
