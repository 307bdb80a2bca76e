use std::fmt;
use std::io;

use nfcbus_i2c::{BusError, BusErrorKind};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => FAILURE,
        _ => TRANSPORT_ERROR,
    }
}

pub fn bus_error(context: &str, err: BusError) -> CliError {
    let code = match &err {
        BusError::BusUnavailable { source, .. } => io_code(source),
        BusError::AddressRejected { source, .. } => {
            if source.kind() == io::ErrorKind::PermissionDenied {
                PERMISSION_DENIED
            } else {
                TRANSPORT_ERROR
            }
        }
        _ => match err.kind() {
            BusErrorKind::TimedOut | BusErrorKind::Cancelled => TIMEOUT,
            BusErrorKind::ShortTransfer => DATA_INVALID,
            _ => TRANSPORT_ERROR,
        },
    };
    CliError::new(code, format!("{context}: {err}"))
}
