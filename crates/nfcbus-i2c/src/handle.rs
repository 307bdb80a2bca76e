use std::fs::{File, OpenOptions};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::address::DeviceAddress;
use crate::error::{BusError, Result};
use crate::LOG_TARGET;

/// Linux i2c-dev request: select the target device address.
#[cfg(any(target_os = "linux", target_os = "android"))]
const I2C_SLAVE: libc::c_ulong = 0x0703;
/// Linux i2c-dev request: enable (1) or disable (0) 10-bit addressing.
#[cfg(any(target_os = "linux", target_os = "android"))]
const I2C_TENBIT: libc::c_ulong = 0x0704;
/// Linux i2c-dev request: select the address even if a kernel driver owns it.
#[cfg(any(target_os = "linux", target_os = "android"))]
const I2C_SLAVE_FORCE: libc::c_ulong = 0x0706;

/// Options applied when opening a [`BusHandle`].
#[derive(Debug, Clone, Default)]
pub struct OpenConfig {
    /// Bind the address even if a kernel driver has already claimed it.
    ///
    /// Talking to a device behind its driver's back can corrupt the driver's
    /// state; leave this off unless the driver is known to be idle.
    pub force: bool,
}

/// An open connection to one device on one I2C bus.
///
/// The handle owns the bus device file descriptor, already bound to a device
/// address. Dropping the handle (or calling [`BusHandle::close`]) releases it.
/// All I/O takes `&mut self`, so at most one transfer is in flight per handle.
pub struct BusHandle {
    file: File,
    path: PathBuf,
    address: DeviceAddress,
}

impl BusHandle {
    /// Open the bus device file at `path` and bind it to `address`.
    pub fn open(path: impl AsRef<Path>, address: DeviceAddress) -> Result<Self> {
        Self::open_with(path, address, &OpenConfig::default())
    }

    /// Open with explicit [`OpenConfig`].
    ///
    /// Fails with [`BusError::BusUnavailable`] when the device file cannot be
    /// opened and [`BusError::AddressRejected`] when the address request
    /// fails. In the latter case the device file is closed before returning.
    pub fn open_with(
        path: impl AsRef<Path>,
        address: DeviceAddress,
        config: &OpenConfig,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&path)
            .map_err(|source| BusError::BusUnavailable {
                path: path.clone(),
                source,
            })?;

        // `file` is dropped on the error path, releasing the descriptor.
        bind_address(file.as_raw_fd(), address, config.force).map_err(|source| {
            BusError::AddressRejected {
                path: path.clone(),
                address,
                source,
            }
        })?;

        debug!(target: LOG_TARGET, ?path, %address, force = config.force, "opened I2C bus");

        Ok(Self {
            file,
            path,
            address,
        })
    }

    /// Release the connection.
    ///
    /// Errors reported by the OS while closing are logged and otherwise
    /// ignored; there is nothing the caller could do about them.
    pub fn close(self) {
        let Self {
            file,
            path,
            address,
        } = self;
        let fd = file.into_raw_fd();
        // SAFETY: `fd` was just released from the owning `File`, so this is
        // the only close of it.
        if unsafe { libc::close(fd) } != 0 {
            let err = std::io::Error::last_os_error();
            debug!(target: LOG_TARGET, ?path, %address, error = %err, "close reported an error");
        } else {
            debug!(target: LOG_TARGET, ?path, %address, "closed I2C bus");
        }
    }

    /// The bus device file this handle was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The device address this handle is bound to.
    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }

    /// Wrap an already-open descriptor without issuing an address request.
    #[cfg(test)]
    pub(crate) fn from_file(file: File, path: impl Into<PathBuf>, address: DeviceAddress) -> Self {
        Self {
            file,
            path: path.into(),
            address,
        }
    }
}

impl AsFd for BusHandle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for BusHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl std::fmt::Debug for BusHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusHandle")
            .field("path", &self.path)
            .field("address", &format_args!("{}", self.address))
            .finish()
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn bind_address(fd: RawFd, address: DeviceAddress, force: bool) -> std::io::Result<()> {
    if address.is_ten_bit() {
        ioctl_arg(fd, I2C_TENBIT, 1)?;
    }
    let request = if force { I2C_SLAVE_FORCE } else { I2C_SLAVE };
    ioctl_arg(fd, request, libc::c_ulong::from(address.value()))
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn ioctl_arg(fd: RawFd, request: libc::c_ulong, arg: libc::c_ulong) -> std::io::Result<()> {
    // SAFETY: the i2c-dev requests used here take their argument by value, so
    // no memory is shared with the kernel. `fd` is open for the whole call.
    let rc = unsafe { libc::ioctl(fd, request as _, arg) };
    if rc < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn bind_address(_fd: RawFd, _address: DeviceAddress, _force: bool) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "I2C device addressing is only implemented for Linux i2c-dev",
    ))
}
