use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use nfcbus_i2c::{CancelToken, DeviceAddress, PortNaming};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod check;
pub mod doctor;
pub mod list;
pub mod read;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List bus device files on this host.
    List(ListArgs),
    /// Open a bus, bind a device address, and close it again.
    Check(CheckArgs),
    /// Read one frame from a device.
    Read(ReadArgs),
    /// Write one frame to a device.
    Write(WriteArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::List(args) => list::run(args, format),
        Command::Check(args) => check::run(args, format),
        Command::Read(args) => read::run(args, format),
        Command::Write(args) => write::run(args, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where to look for bus device files.
#[derive(Args, Debug, Default)]
pub struct NamingArgs {
    /// Device directory to scan (default: the host's device directory).
    #[arg(long, value_name = "DIR", env = "NFCBUS_DEV_DIR")]
    pub dev_dir: Option<PathBuf>,
    /// Additional device name prefix to recognize (repeatable).
    #[arg(long = "prefix", value_name = "PREFIX")]
    pub prefixes: Vec<String>,
}

impl NamingArgs {
    pub fn naming(&self) -> PortNaming {
        let mut naming = PortNaming::host();
        if let Some(dir) = &self.dev_dir {
            naming = naming.with_device_dir(dir);
        }
        for prefix in &self.prefixes {
            naming = naming.with_prefix(prefix.as_str(), "user-configured");
        }
        naming
    }
}

/// Bus device and device address to talk to.
#[derive(Args, Debug)]
pub struct BusArgs {
    /// Bus device file, e.g. /dev/i2c-1.
    #[arg(env = "NFCBUS_BUS")]
    pub bus: PathBuf,
    /// Device address, decimal or 0x-prefixed hex. Values above 0x7f use 10-bit addressing.
    #[arg(long, short = 'a', env = "NFCBUS_ADDRESS")]
    pub address: DeviceAddress,
    /// Bind the address even if a kernel driver owns it.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub naming: NamingArgs,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub bus: BusArgs,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    #[command(flatten)]
    pub bus: BusArgs,
    /// Frame length in bytes.
    #[arg(long, short = 'n')]
    pub length: usize,
    /// Maximum time to wait for data (e.g. 500ms, 2s; 0 waits forever).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub bus: BusArgs,
    /// Frame bytes as hex (whitespace and ':' separators allowed).
    #[arg(long, short = 'd')]
    pub data: String,
    /// Maximum time to wait for the device to accept the frame.
    #[arg(long, default_value = "1s")]
    pub timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub naming: NamingArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s` or a bare number of seconds. Zero means no timeout.
pub fn parse_timeout(input: &str) -> CliResult<Option<Duration>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Ok(None);
    }
    if millis {
        Ok(Some(Duration::from_millis(value)))
    } else {
        Ok(Some(Duration::from_secs(value)))
    }
}

/// Parse a hex frame such as `00 00 ff 02` or `d4:4a:01:00`.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let digits = digits
        .strip_prefix("0x")
        .unwrap_or(digits.as_str());

    if digits.is_empty() {
        return Err(CliError::new(USAGE, "frame data must not be empty"));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("odd number of hex digits in {input:?}"),
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex in {input:?}")))
        })
        .collect()
}

/// A cancellation token wired to Ctrl-C.
pub fn ctrlc_token() -> CliResult<CancelToken> {
    let token = CancelToken::new()
        .map_err(|err| CliError::new(INTERNAL, format!("cancellation setup failed: {err}")))?;
    let handler_token = token.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(token)
}
