use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{Result, TransportError};
use crate::traits::{PortHandle, DEFAULT_READ_TIMEOUT};

#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    readable: Condvar,
}

#[derive(Default)]
struct PipeState {
    bytes: VecDeque<u8>,
    hung_up: bool,
}

impl Pipe {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One end of an in-process byte link.
///
/// Bytes written to one end of a [`MemoryPort::pair`] become readable on the
/// other. Reads block for at most the configured read timeout and then
/// return `Ok(0)`, like a serial device with nothing on the line.
#[derive(Clone)]
pub struct MemoryPort {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    path: PathBuf,
    read_timeout: Duration,
}

impl MemoryPort {
    /// Create two connected ends, each reporting its own device path.
    pub fn pair(path_a: impl Into<PathBuf>, path_b: impl Into<PathBuf>) -> (Self, Self) {
        let a_to_b = Arc::new(Pipe::default());
        let b_to_a = Arc::new(Pipe::default());
        let a = Self {
            rx: Arc::clone(&b_to_a),
            tx: Arc::clone(&a_to_b),
            path: path_a.into(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        };
        let b = Self {
            rx: a_to_b,
            tx: b_to_a,
            path: path_b.into(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        };
        (a, b)
    }

    /// Override the read timeout of this end.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Make `bytes` readable on this end as if the peer had sent them.
    pub fn inject(&self, bytes: &[u8]) {
        let mut state = self.rx.lock();
        state.bytes.extend(bytes.iter().copied());
        self.rx.readable.notify_all();
    }

    /// Number of bytes waiting to be read on this end.
    pub fn available(&self) -> usize {
        self.rx.lock().bytes.len()
    }

    /// Sever the link in both directions. Subsequent I/O on either end fails.
    pub fn hang_up(&self) {
        for pipe in [&self.rx, &self.tx] {
            pipe.lock().hung_up = true;
            pipe.readable.notify_all();
        }
    }
}

impl PortHandle for MemoryPort {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let deadline = Instant::now() + self.read_timeout;
        let mut state = self.rx.lock();
        loop {
            if state.hung_up {
                return Err(TransportError::Closed);
            }
            if !state.bytes.is_empty() {
                let n = buf.len().min(state.bytes.len());
                for (slot, byte) in buf.iter_mut().zip(state.bytes.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(0);
            }
            state = self
                .rx
                .readable
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let mut state = self.tx.lock();
        if state.hung_up {
            return Err(TransportError::Closed);
        }
        state.bytes.extend(buf.iter().copied());
        self.tx.readable.notify_all();
        Ok(buf.len())
    }

    fn device_path(&self) -> &Path {
        &self.path
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(self.clone())
    }
}

impl std::fmt::Debug for MemoryPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPort")
            .field("path", &self.path)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_pair() -> (MemoryPort, MemoryPort) {
        let (a, b) = MemoryPort::pair("/dev/mem-a", "/dev/mem-b");
        (
            a.with_read_timeout(Duration::from_millis(20)),
            b.with_read_timeout(Duration::from_millis(20)),
        )
    }

    #[test]
    fn bytes_cross_the_pair() {
        let (mut a, mut b) = quick_pair();
        assert_eq!(a.write(b"ping").unwrap(), 4);

        let mut buf = [0u8; 8];
        let n = b.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    #[test]
    fn read_times_out_with_zero() {
        let (mut a, _b) = quick_pair();
        let mut buf = [0u8; 4];
        let start = Instant::now();
        assert_eq!(a.read(&mut buf).unwrap(), 0);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn read_is_bounded_by_buffer() {
        let (mut a, mut b) = quick_pair();
        a.write(&[1, 2, 3, 4, 5]).unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(b.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(b.available(), 2);
    }

    #[test]
    fn read_wakes_when_peer_writes() {
        let (a, mut b) = MemoryPort::pair("/dev/mem-a", "/dev/mem-b");
        let mut writer = a.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            writer.write(b"late").unwrap();
        });

        let mut buf = [0u8; 4];
        let n = b.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"late");
        handle.join().unwrap();
    }

    #[test]
    fn inject_feeds_local_reads() {
        let (mut a, _b) = quick_pair();
        a.inject(b"xy");
        let mut buf = [0u8; 2];
        assert_eq!(a.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"xy");
    }

    #[test]
    fn hang_up_fails_both_directions() {
        let (mut a, mut b) = quick_pair();
        a.hang_up();
        assert!(matches!(a.write(b"x"), Err(TransportError::Closed)));
        let mut buf = [0u8; 1];
        assert!(matches!(b.read(&mut buf), Err(TransportError::Closed)));
    }

    #[test]
    fn clones_share_the_link() {
        let (a, mut b) = quick_pair();
        let mut clone = a.try_clone().unwrap();
        clone.write(b"c").unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(b.read(&mut buf).unwrap(), 1);
        assert_eq!(clone.device_path(), Path::new("/dev/mem-a"));
    }
}
