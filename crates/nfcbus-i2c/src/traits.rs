use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::handle::BusHandle;

/// Frame transport consumed by the reader protocol layer.
///
/// A read either fills the whole buffer or fails; a write either hands the
/// whole frame to the device or fails. Implementations do not retry.
pub trait BusTransport {
    fn read(
        &mut self,
        buf: &mut [u8],
        cancel: Option<&CancelToken>,
        timeout: Option<Duration>,
    ) -> Result<usize>;

    fn write(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<usize>;
}

impl BusTransport for BusHandle {
    fn read(
        &mut self,
        buf: &mut [u8],
        cancel: Option<&CancelToken>,
        timeout: Option<Duration>,
    ) -> Result<usize> {
        BusHandle::read(self, buf, cancel, timeout)
    }

    fn write(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<usize> {
        BusHandle::write(self, data, timeout)
    }
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    fn read(
        &mut self,
        buf: &mut [u8],
        cancel: Option<&CancelToken>,
        timeout: Option<Duration>,
    ) -> Result<usize> {
        (**self).read(buf, cancel, timeout)
    }

    fn write(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<usize> {
        (**self).write(data, timeout)
    }
}
