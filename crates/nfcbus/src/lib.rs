//! Bus transports for contactless reader chips.
//!
//! nfcbus moves raw frames between a reader protocol layer and the reader
//! chip. Frame contents are the protocol layer's business.
//!
//! # Crate Structure
//!
//! - [`i2c`]: I2C transport over the host's i2c-dev device files

/// Re-export I2C transport types.
pub mod i2c {
    pub use nfcbus_i2c::*;
}
