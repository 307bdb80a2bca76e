use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::address::DeviceAddress;

/// Direction of a frame transfer, used when reporting short transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// Errors that can occur in I2C bus transport operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The bus device file could not be opened.
    #[error("cannot open I2C bus {path}: {source}")]
    BusUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The device address could not be bound on the bus.
    #[error("cannot select I2C device {address} on {path}: {source}")]
    AddressRejected {
        path: PathBuf,
        address: DeviceAddress,
        source: std::io::Error,
    },

    /// The underlying read or write failed outright.
    #[error("bus I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transfer moved fewer bytes than requested.
    #[error("short {direction}: {actual} bytes ({expected} expected)")]
    ShortTransfer {
        direction: Direction,
        expected: usize,
        actual: usize,
    },

    /// The operation was aborted through its cancellation source.
    #[error("operation cancelled")]
    Cancelled,

    /// No readiness within the requested timeout.
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),
}

/// Fieldless classification of [`BusError`] for protocol layers that branch
/// on the error class only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusErrorKind {
    BusUnavailable,
    AddressRejected,
    IoFault,
    ShortTransfer,
    Cancelled,
    TimedOut,
}

impl BusErrorKind {
    /// Reader-library driver error code for this class.
    ///
    /// `-1` I/O error, `-2` invalid argument, `-6` timeout, `-7` operation
    /// aborted.
    pub fn driver_code(self) -> i32 {
        match self {
            BusErrorKind::BusUnavailable | BusErrorKind::IoFault => -1,
            BusErrorKind::AddressRejected | BusErrorKind::ShortTransfer => -2,
            BusErrorKind::TimedOut => -6,
            BusErrorKind::Cancelled => -7,
        }
    }
}

impl BusError {
    pub fn kind(&self) -> BusErrorKind {
        match self {
            BusError::BusUnavailable { .. } => BusErrorKind::BusUnavailable,
            BusError::AddressRejected { .. } => BusErrorKind::AddressRejected,
            BusError::Io(_) => BusErrorKind::IoFault,
            BusError::ShortTransfer { .. } => BusErrorKind::ShortTransfer,
            BusError::Cancelled => BusErrorKind::Cancelled,
            BusError::TimedOut(_) => BusErrorKind::TimedOut,
        }
    }

    /// Shorthand for `self.kind().driver_code()`.
    pub fn driver_code(&self) -> i32 {
        self.kind().driver_code()
    }
}

impl From<BusError> for std::io::Error {
    fn from(err: BusError) -> Self {
        use std::io::ErrorKind;

        match err {
            BusError::Io(source) => source,
            BusError::BusUnavailable { ref source, .. }
            | BusError::AddressRejected { ref source, .. } => {
                let kind = source.kind();
                std::io::Error::new(kind, err)
            }
            BusError::ShortTransfer { .. } => std::io::Error::new(ErrorKind::UnexpectedEof, err),
            BusError::Cancelled => std::io::Error::new(ErrorKind::Interrupted, err),
            BusError::TimedOut(_) => std::io::Error::new(ErrorKind::TimedOut, err),
        }
    }
}

pub type Result<T> = std::result::Result<T, BusError>;
