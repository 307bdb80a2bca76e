use std::fmt;
use std::str::FromStr;

/// Highest 7-bit device address.
pub const MAX_SEVEN_BIT: u16 = 0x7F;
/// Highest 10-bit device address.
pub const MAX_TEN_BIT: u16 = 0x3FF;

/// Rejected device address input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// The number is outside the addressing mode's range.
    #[error("device address 0x{value:x} out of range (max 0x{max:x})")]
    OutOfRange { value: u16, max: u16 },

    /// The text is not a decimal or `0x`-prefixed hex number.
    #[error("invalid device address: {0:?}")]
    Parse(String),
}

/// A validated I2C device address.
///
/// Numbers up to `0x7F` select 7-bit addressing by default; larger numbers up
/// to `0x3FF` select 10-bit addressing. Use [`DeviceAddress::ten_bit`] to
/// address a low-numbered device in 10-bit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    value: u16,
    ten_bit: bool,
}

impl DeviceAddress {
    pub fn seven_bit(value: u8) -> Result<Self, AddressError> {
        if u16::from(value) > MAX_SEVEN_BIT {
            return Err(AddressError::OutOfRange {
                value: value.into(),
                max: MAX_SEVEN_BIT,
            });
        }
        Ok(Self {
            value: value.into(),
            ten_bit: false,
        })
    }

    pub fn ten_bit(value: u16) -> Result<Self, AddressError> {
        if value > MAX_TEN_BIT {
            return Err(AddressError::OutOfRange {
                value,
                max: MAX_TEN_BIT,
            });
        }
        Ok(Self {
            value,
            ten_bit: true,
        })
    }

    /// The numeric address as passed to the bus-addressing request.
    pub fn value(self) -> u16 {
        self.value
    }

    pub fn is_ten_bit(self) -> bool {
        self.ten_bit
    }
}

impl TryFrom<u16> for DeviceAddress {
    type Error = AddressError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= MAX_SEVEN_BIT {
            Ok(Self {
                value,
                ten_bit: false,
            })
        } else {
            Self::ten_bit(value)
        }
    }
}

impl FromStr for DeviceAddress {
    type Err = AddressError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let parsed = match input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
        {
            Some(hex) => u16::from_str_radix(hex, 16),
            None => input.parse::<u16>(),
        };
        let value = parsed.map_err(|_| AddressError::Parse(input.to_string()))?;
        Self::try_from(value)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ten_bit {
            write!(f, "0x{:03x}", self.value)
        } else {
            write!(f, "0x{:02x}", self.value)
        }
    }
}
