use std::sync::{Mutex, MutexGuard};

use serialframe_transport::{PortHandle, TransportError};

use crate::channel::LinkMonitor;
use crate::error::Result;

/// Transmitting half of a [`SerialChannel`](crate::SerialChannel).
///
/// Shared by reference between every thread that transmits; the port is
/// behind its own lock so one write never interleaves with another.
pub struct ChannelWriter<P> {
    port: Mutex<P>,
    link: LinkMonitor,
}

impl<P: PortHandle> ChannelWriter<P> {
    pub(crate) fn new(port: P, link: LinkMonitor) -> Self {
        Self {
            port: Mutex::new(port),
            link,
        }
    }

    /// Write `bytes` in full, returning how many the device accepted.
    ///
    /// A count below `bytes.len()` means the write was cut short.
    pub fn write_frame(&self, bytes: &[u8]) -> Result<usize> {
        if !self.link.is_open() {
            return Err(TransportError::Closed.into());
        }
        let written = self.lock().write(bytes)?;
        Ok(written)
    }

    /// Write to `port` from now on, returning the old one. Waits for any
    /// write in progress.
    pub fn replace_port(&self, port: P) -> P {
        std::mem::replace(&mut *self.lock(), port)
    }

    fn lock(&self) -> MutexGuard<'_, P> {
        self.port
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<P> std::fmt::Debug for ChannelWriter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelWriter")
            .field("link", &self.link)
            .finish()
    }
}
