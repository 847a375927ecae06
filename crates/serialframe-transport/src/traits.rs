use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Default line rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default bound on a single blocking read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// A raw, unframed handle to a point-to-point byte link.
///
/// Reads are bounded: when nothing arrives within the handle's read timeout,
/// `read` returns `Ok(0)` rather than an error. A short `write` count means
/// the device accepted only part of the buffer.
pub trait PortHandle: Send + 'static {
    /// Read whatever is available, up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write `buf`, returning how many bytes the device accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Filesystem path the handle was opened on.
    fn device_path(&self) -> &Path;

    /// Open a second handle onto the same device.
    fn try_clone(&self) -> Result<Self>
    where
        Self: Sized;
}

/// Serial line configuration.
///
/// Framing on the line is fixed at 8 data bits, no parity, one stop bit,
/// with no hardware or software flow control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub path: PathBuf,
    /// Line rate in baud. Default: 115200.
    pub baud_rate: u32,
    /// Bound on a single blocking read. Default: 1s.
    pub read_timeout: Duration,
}

impl PortConfig {
    /// Configuration for `path` with default line settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Override the line rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Override the read timeout.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}
