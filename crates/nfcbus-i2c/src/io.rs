//! Length-checked frame reads and writes on a [`BusHandle`].
//!
//! Every transfer first waits for readiness with `poll(2)`, bounded by the
//! caller's timeout and woken early by a [`CancelToken`]. The transfer itself
//! is a single `read(2)`/`write(2)`: it either moves the whole frame or the
//! call fails. There is no retry on short transfers.

use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, error, trace};

use crate::cancel::CancelToken;
use crate::error::{BusError, Direction, Result};
use crate::handle::BusHandle;
use crate::LOG_TARGET;

/// Convert a millisecond timeout where `0` means "no timeout".
pub fn timeout_from_millis(ms: u64) -> Option<Duration> {
    if ms == 0 {
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

impl BusHandle {
    /// Read exactly `buf.len()` bytes from the device.
    ///
    /// Returns the number of bytes read, which always equals `buf.len()`. A
    /// device that delivers fewer bytes yields [`BusError::ShortTransfer`].
    /// With `timeout = None` the call waits until data arrives or `cancel`
    /// fires. An already-cancelled token fails without blocking.
    pub fn read(
        &mut self,
        buf: &mut [u8],
        cancel: Option<&CancelToken>,
        timeout: Option<Duration>,
    ) -> Result<usize> {
        let expected = buf.len();
        if expected == 0 {
            return Ok(0);
        }

        wait_ready(self.as_raw_fd(), libc::POLLIN, cancel, timeout)?;

        let read = loop {
            match self.file().read(buf) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(BusError::Io(err)),
            }
        };

        if read < expected {
            debug!(
                target: LOG_TARGET,
                expected,
                actual = read,
                "short read"
            );
            return Err(BusError::ShortTransfer {
                direction: Direction::Read,
                expected,
                actual: read,
            });
        }

        trace!(target: LOG_TARGET, "RX: {}", hex(&buf[..read]));
        Ok(read)
    }

    /// Read a `len`-byte frame into a freshly allocated buffer.
    pub fn read_frame(
        &mut self,
        len: usize,
        cancel: Option<&CancelToken>,
        timeout: Option<Duration>,
    ) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(len);
        self.read(&mut buf, cancel, timeout)?;
        Ok(buf.freeze())
    }

    /// Write all of `data` to the device in one call.
    ///
    /// Returns the number of bytes written, which always equals `data.len()`.
    /// A short write is reported as [`BusError::ShortTransfer`]. Every outcome
    /// is logged: success at debug level, failure at error level with the
    /// attempted and accepted byte counts.
    pub fn write(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<usize> {
        self.write_cancellable(data, None, timeout)
    }

    /// [`write`](Self::write) that can also be aborted through `cancel`.
    pub fn write_cancellable(
        &mut self,
        data: &[u8],
        cancel: Option<&CancelToken>,
        timeout: Option<Duration>,
    ) -> Result<usize> {
        let attempted = data.len();
        trace!(target: LOG_TARGET, "TX: {}", hex(data));

        let result = self.write_once(data, cancel, timeout);
        match &result {
            Ok(accepted) => {
                debug!(
                    target: LOG_TARGET,
                    attempted,
                    accepted,
                    "wrote {accepted} bytes successfully"
                );
            }
            Err(BusError::ShortTransfer { actual, .. }) => {
                error!(
                    target: LOG_TARGET,
                    attempted,
                    accepted = *actual,
                    "wrote only {actual} bytes ({attempted} expected)"
                );
            }
            Err(err) => {
                error!(
                    target: LOG_TARGET,
                    attempted,
                    accepted = 0usize,
                    error = %err,
                    "write failed"
                );
            }
        }
        result
    }

    fn write_once(
        &mut self,
        data: &[u8],
        cancel: Option<&CancelToken>,
        timeout: Option<Duration>,
    ) -> Result<usize> {
        let expected = data.len();
        if expected == 0 {
            return Ok(0);
        }

        wait_ready(self.as_raw_fd(), libc::POLLOUT, cancel, timeout)?;

        let written = loop {
            match self.file().write(data) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(BusError::Io(err)),
            }
        };

        if written != expected {
            return Err(BusError::ShortTransfer {
                direction: Direction::Write,
                expected,
                actual: written,
            });
        }
        Ok(written)
    }
}

/// Wait until `fd` reports `events`, the token fires, or the deadline passes.
fn wait_ready(
    fd: RawFd,
    events: libc::c_short,
    cancel: Option<&CancelToken>,
    timeout: Option<Duration>,
) -> Result<()> {
    // A timeout too large to express as an Instant is an unbounded wait.
    let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(BusError::Cancelled);
        }

        let wait_ms = match deadline {
            None => -1,
            Some(deadline) => poll_millis(deadline.saturating_duration_since(Instant::now())),
        };

        // A negative fd is ignored by poll(2).
        let mut fds = [
            libc::pollfd {
                fd,
                events,
                revents: 0,
            },
            libc::pollfd {
                fd: cancel.map_or(-1, CancelToken::wake_fd),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        // SAFETY: `fds` is a valid array of two initialized pollfd entries.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, wait_ms) };

        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(BusError::Io(err));
        }

        if fds[1].revents != 0 {
            return Err(BusError::Cancelled);
        }

        if fds[0].revents != 0 {
            // Error conditions (POLLERR/POLLHUP/POLLNVAL) are left for the
            // transfer itself to report.
            return Ok(());
        }

        if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
            if Instant::now() >= deadline {
                return Err(BusError::TimedOut(timeout));
            }
        }
    }
}

/// Milliseconds to pass to poll(2), rounded up so the deadline is not missed.
fn poll_millis(remaining: Duration) -> libc::c_int {
    let ms = remaining.as_nanos().div_ceil(1_000_000);
    libc::c_int::try_from(ms).unwrap_or(libc::c_int::MAX)
}

fn hex(data: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::os::fd::OwnedFd;
    use std::os::unix::net::UnixStream;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use super::*;
    use crate::address::DeviceAddress;

    /// A handle backed by one end of a socket pair; the other end plays the device.
    fn socket_handle() -> (BusHandle, UnixStream) {
        let (bus, device) = UnixStream::pair().unwrap();
        let file = File::from(OwnedFd::from(bus));
        let handle = BusHandle::from_file(
            file,
            "/dev/i2c-test",
            DeviceAddress::try_from(0x24).unwrap(),
        );
        (handle, device)
    }

    /// Like [`socket_handle`], but the bus end never blocks, so a full
    /// socket buffer shows up as a short write or a missed deadline.
    fn nonblocking_socket_handle() -> (BusHandle, UnixStream) {
        let (bus, device) = UnixStream::pair().unwrap();
        bus.set_nonblocking(true).unwrap();
        let file = File::from(OwnedFd::from(bus));
        let handle = BusHandle::from_file(
            file,
            "/dev/i2c-test",
            DeviceAddress::try_from(0x24).unwrap(),
        );
        (handle, device)
    }

    const OVERSIZED_FRAME: usize = 8 << 20;

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogCapture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || writer.clone())
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        (out, capture.text())
    }

    fn write_records(logs: &str) -> Vec<&str> {
        logs.lines()
            .filter(|line| line.contains("\"target\":\"nfcbus::bus::i2c\""))
            .filter(|line| line.contains("\"attempted\""))
            .collect()
    }

    #[test]
    fn read_full_frame() {
        let (mut handle, mut device) = socket_handle();
        device.write_all(&[0x00, 0xff, 0x01, 0xfe]).unwrap();

        let mut buf = [0u8; 4];
        let n = handle
            .read(&mut buf, None, Some(Duration::from_secs(1)))
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf, [0x00, 0xff, 0x01, 0xfe]);
    }

    #[test]
    fn read_short_is_short_transfer() {
        let (mut handle, mut device) = socket_handle();
        device.write_all(&[0x01, 0x02]).unwrap();

        let mut buf = [0u8; 6];
        let err = handle
            .read(&mut buf, None, Some(Duration::from_secs(1)))
            .unwrap_err();
        assert!(matches!(
            err,
            BusError::ShortTransfer {
                direction: Direction::Read,
                expected: 6,
                actual: 2
            }
        ));
    }

    #[test]
    fn read_after_device_gone_is_short_transfer() {
        let (mut handle, device) = socket_handle();
        drop(device);

        let mut buf = [0u8; 3];
        let err = handle
            .read(&mut buf, None, Some(Duration::from_secs(1)))
            .unwrap_err();
        assert!(matches!(err, BusError::ShortTransfer { actual: 0, .. }));
    }

    #[test]
    fn read_times_out_without_data() {
        let (mut handle, _device) = socket_handle();

        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        let mut buf = [0u8; 2];
        let err = handle.read(&mut buf, None, Some(timeout)).unwrap_err();

        assert!(matches!(err, BusError::TimedOut(t) if t == timeout));
        assert!(start.elapsed() >= timeout);
    }

    #[test]
    fn read_with_cancelled_token_returns_immediately() {
        let (mut handle, mut device) = socket_handle();
        // Data is available, cancellation still wins.
        device.write_all(&[0xaa]).unwrap();

        let token = CancelToken::new().unwrap();
        token.cancel();

        let start = Instant::now();
        let mut buf = [0u8; 1];
        let err = handle.read(&mut buf, Some(&token), None).unwrap_err();
        assert!(matches!(err, BusError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn cancel_wakes_blocked_read() {
        let (mut handle, _device) = socket_handle();
        let token = CancelToken::new().unwrap();

        let canceller = token.clone();
        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        let mut buf = [0u8; 4];
        let err = handle.read(&mut buf, Some(&token), None).unwrap_err();
        assert!(matches!(err, BusError::Cancelled));
        thread.join().unwrap();
    }

    #[test]
    fn read_frame_returns_bytes() {
        let (mut handle, mut device) = socket_handle();
        device.write_all(b"\x00\x00\xff").unwrap();

        let frame = handle
            .read_frame(3, None, Some(Duration::from_secs(1)))
            .unwrap();
        assert_eq!(frame.as_ref(), b"\x00\x00\xff");
    }

    #[test]
    fn zero_length_transfers_are_noops() {
        let (mut handle, _device) = socket_handle();
        assert_eq!(handle.read(&mut [], None, Some(Duration::ZERO)).unwrap(), 0);
        assert_eq!(handle.write(&[], Some(Duration::ZERO)).unwrap(), 0);
    }

    #[test]
    fn write_full_frame() {
        let (mut handle, mut device) = socket_handle();
        let n = handle
            .write(&[0x00, 0x00, 0xff, 0x02], Some(Duration::from_secs(1)))
            .unwrap();
        assert_eq!(n, 4);

        let mut buf = [0u8; 4];
        device.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x00, 0x00, 0xff, 0x02]);
    }

    #[test]
    fn write_to_closed_device_is_io_fault() {
        let (mut handle, device) = socket_handle();
        drop(device);

        let err = handle
            .write(&[0x01], Some(Duration::from_secs(1)))
            .unwrap_err();
        assert_eq!(err.kind(), crate::BusErrorKind::IoFault);
    }

    #[test]
    fn read_with_huge_timeout_waits_like_unbounded() {
        let (mut handle, mut device) = socket_handle();
        device.write_all(&[0x5a]).unwrap();

        let mut buf = [0u8; 1];
        let n = handle
            .read(&mut buf, None, Some(Duration::from_secs(u64::MAX)))
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(buf, [0x5a]);
    }

    #[test]
    fn write_with_huge_timeout_succeeds() {
        let (mut handle, mut device) = socket_handle();
        let n = handle
            .write(&[0x01, 0x02], Some(Duration::MAX))
            .unwrap();
        assert_eq!(n, 2);

        let mut buf = [0u8; 2];
        device.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x01, 0x02]);
    }

    #[test]
    fn oversized_write_is_short_transfer() {
        let (mut handle, _device) = nonblocking_socket_handle();
        let frame = vec![0u8; OVERSIZED_FRAME];

        let err = handle
            .write(&frame, Some(Duration::from_secs(1)))
            .unwrap_err();
        match err {
            BusError::ShortTransfer {
                direction,
                expected,
                actual,
            } => {
                assert_eq!(direction, Direction::Write);
                assert_eq!(expected, OVERSIZED_FRAME);
                assert!(actual > 0 && actual < OVERSIZED_FRAME, "actual = {actual}");
            }
            other => panic!("expected ShortTransfer, got {other:?}"),
        }
    }

    #[test]
    fn write_into_full_buffer_times_out() {
        let (mut handle, _device) = nonblocking_socket_handle();
        let frame = vec![0u8; OVERSIZED_FRAME];
        // Fill the socket buffer; the device end never drains it.
        let _ = handle.write(&frame, Some(Duration::from_secs(1)));

        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        let err = handle.write(&[0x01], Some(timeout)).unwrap_err();

        assert!(matches!(err, BusError::TimedOut(t) if t == timeout));
        assert!(start.elapsed() >= timeout);
    }

    #[test]
    fn successful_write_logs_debug_with_counts() {
        let (mut handle, _device) = socket_handle();
        let (result, logs) = with_captured_logs(|| handle.write(&[0xd4, 0x02, 0x00, 0x01], None));
        assert_eq!(result.unwrap(), 4);

        let records = write_records(&logs);
        assert_eq!(records.len(), 1, "logs: {logs}");
        assert!(records[0].contains("\"level\":\"DEBUG\""), "record: {}", records[0]);
        assert!(records[0].contains("\"attempted\":4"), "record: {}", records[0]);
        assert!(records[0].contains("\"accepted\":4"), "record: {}", records[0]);
    }

    #[test]
    fn short_write_logs_error_with_counts() {
        let (mut handle, _device) = nonblocking_socket_handle();
        let frame = vec![0u8; OVERSIZED_FRAME];
        let (result, logs) =
            with_captured_logs(|| handle.write(&frame, Some(Duration::from_secs(1))));

        let actual = match result {
            Err(BusError::ShortTransfer { actual, .. }) => actual,
            other => panic!("expected ShortTransfer, got {other:?}"),
        };

        let records = write_records(&logs);
        assert_eq!(records.len(), 1, "logs: {logs}");
        assert!(records[0].contains("\"level\":\"ERROR\""), "record: {}", records[0]);
        assert!(
            records[0].contains(&format!("\"attempted\":{OVERSIZED_FRAME}")),
            "record: {}",
            records[0]
        );
        assert!(
            records[0].contains(&format!("\"accepted\":{actual}")),
            "record: {}",
            records[0]
        );
    }

    #[test]
    fn failed_write_logs_error_with_zero_accepted() {
        let (mut handle, device) = socket_handle();
        drop(device);
        let (result, logs) = with_captured_logs(|| handle.write(&[0x01, 0x02], None));
        assert!(result.is_err());

        let records = write_records(&logs);
        assert_eq!(records.len(), 1, "logs: {logs}");
        assert!(records[0].contains("\"level\":\"ERROR\""), "record: {}", records[0]);
        assert!(records[0].contains("\"attempted\":2"), "record: {}", records[0]);
        assert!(records[0].contains("\"accepted\":0"), "record: {}", records[0]);
    }

    #[test]
    fn write_with_cancelled_token_is_cancelled() {
        let (mut handle, _device) = socket_handle();
        let token = CancelToken::new().unwrap();
        token.cancel();

        let err = handle
            .write_cancellable(&[0x01], Some(&token), None)
            .unwrap_err();
        assert!(matches!(err, BusError::Cancelled));
    }

    #[test]
    fn timeout_millis_zero_means_unbounded() {
        assert_eq!(timeout_from_millis(0), None);
        assert_eq!(timeout_from_millis(250), Some(Duration::from_millis(250)));
    }

    #[test]
    fn poll_millis_rounds_up_and_saturates() {
        assert_eq!(poll_millis(Duration::from_micros(1)), 1);
        assert_eq!(poll_millis(Duration::ZERO), 0);
        assert_eq!(poll_millis(Duration::from_secs(u64::MAX)), libc::c_int::MAX);
    }

    #[test]
    fn hex_formats_bytes() {
        assert_eq!(hex(&[0x00, 0xab, 0x0f]), "00 ab 0f");
        assert_eq!(hex(&[]), "");
    }
}
