use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::LOG_TARGET;

/// Cooperative cancellation source for blocking bus reads and writes.
///
/// Clones share state. Once cancelled a token stays cancelled; blocked
/// operations waiting on it wake immediately and fail with
/// [`BusError::Cancelled`](crate::BusError::Cancelled).
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    // Self-pipe: the read end is polled next to the bus descriptor.
    wake_rx: OwnedFd,
    wake_tx: OwnedFd,
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> std::io::Result<Self> {
        let (wake_rx, wake_tx) = nonblocking_pipe()?;
        Ok(Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                wake_rx,
                wake_tx,
            }),
        })
    }

    /// Signal cancellation. Safe to call repeatedly and from any thread.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let byte = 1u8;
        // SAFETY: `wake_tx` is an open pipe write end owned by `inner`, and the
        // buffer is a valid single byte. A full pipe (EAGAIN) already wakes pollers.
        let _ = unsafe {
            libc::write(
                self.inner.wake_tx.as_raw_fd(),
                (&byte as *const u8).cast::<libc::c_void>(),
                1,
            )
        };
        trace!(target: LOG_TARGET, "cancellation signalled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Descriptor that becomes readable once the token is cancelled.
    pub(crate) fn wake_fd(&self) -> RawFd {
        self.inner.wake_rx.as_raw_fd()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

fn nonblocking_pipe() -> std::io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as libc::c_int; 2];
    // SAFETY: `fds` is a valid two-element array for pipe(2) to fill.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: pipe(2) succeeded, so both descriptors are open and owned by us.
    let (rx, tx) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    for fd in [rx.as_raw_fd(), tx.as_raw_fd()] {
        set_flags(fd)?;
    }
    Ok((rx, tx))
}

fn set_flags(fd: RawFd) -> std::io::Result<()> {
    // SAFETY: `fd` is an open descriptor; F_GETFL/F_SETFL/F_SETFD take no pointers.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(std::io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let token = CancelToken::new().unwrap();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new().unwrap();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
        // Second cancel is a no-op.
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn wake_fd_readable_after_cancel() {
        let token = CancelToken::new().unwrap();
        let mut pfd = libc::pollfd {
            fd: token.wake_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: single valid pollfd, zero timeout.
        let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
        assert_eq!(rc, 0);

        token.cancel();
        pfd.revents = 0;
        // SAFETY: as above.
        let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
        assert_eq!(rc, 1);
        assert_ne!(pfd.revents & libc::POLLIN, 0);
    }
}
