//! I2C bus transport for contactless reader chips.
//!
//! Exchanges raw byte frames with a reader chip attached to a two-wire bus,
//! through the host's per-bus device file (Linux i2c-dev):
//! - [`PortNaming`] / [`list_ports`] discover candidate bus device files
//! - [`BusHandle`] opens one bus and binds it to a device address
//! - [`BusHandle::read`] / [`BusHandle::write`] move whole frames, bounded by
//!   a timeout and a [`CancelToken`]
//!
//! Frame contents are not interpreted here, and nothing is retried: errors
//! go straight back to the protocol layer as a [`BusError`].

/// Log target for all bus transport records.
pub(crate) const LOG_TARGET: &str = "nfcbus::bus::i2c";

pub mod address;
pub mod error;
pub mod ports;

#[cfg(unix)]
pub mod cancel;
#[cfg(unix)]
pub mod handle;
#[cfg(unix)]
pub mod io;
#[cfg(unix)]
pub mod traits;

pub use address::{AddressError, DeviceAddress};
pub use error::{BusError, BusErrorKind, Direction, Result};
pub use ports::{list_ports, PortInfo, PortNaming, PortPrefix};

#[cfg(unix)]
pub use cancel::CancelToken;
#[cfg(unix)]
pub use handle::{BusHandle, OpenConfig};
#[cfg(unix)]
pub use io::timeout_from_millis;
#[cfg(unix)]
pub use traits::BusTransport;
