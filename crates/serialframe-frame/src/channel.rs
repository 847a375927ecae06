use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serialframe_transport::PortHandle;
use tracing::debug;

use crate::codec::FrameLayout;
use crate::error::Result;
use crate::extract::Extraction;
use crate::reader::ChannelReader;
use crate::ring::ByteRingBuffer;
use crate::writer::ChannelWriter;

#[derive(Debug)]
struct LinkState {
    path: PathBuf,
    open: AtomicBool,
}

/// Cheap, cloneable view of whether a link is usable.
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    state: Arc<LinkState>,
}

impl LinkMonitor {
    fn new(path: PathBuf) -> Self {
        Self {
            state: Arc::new(LinkState {
                path,
                open: AtomicBool::new(true),
            }),
        }
    }

    /// True until the channel is closed.
    pub fn is_open(&self) -> bool {
        self.state.open.load(Ordering::Acquire)
    }

    /// Open, and the device node is still present on the filesystem.
    pub fn is_online(&self) -> bool {
        self.is_open() && self.state.path.exists()
    }

    /// Mark the link closed. Both halves refuse further I/O.
    pub fn mark_closed(&self) {
        self.state.open.store(false, Ordering::Release);
    }

    pub fn device_path(&self) -> &Path {
        &self.state.path
    }
}

/// A port handle paired with the ring buffer that frames its input.
///
/// Usable directly from one thread, or [`split`](Self::split) into a reader
/// owned by one thread and a writer shared by many.
pub struct SerialChannel<P> {
    reader: ChannelReader<P>,
    writer: ChannelWriter<P>,
    link: LinkMonitor,
}

impl<P: PortHandle> SerialChannel<P> {
    /// Wrap `port`, buffering up to `ring_capacity` unframed bytes.
    pub fn new(port: P, layout: FrameLayout, ring_capacity: usize) -> Result<Self> {
        let write_port = port.try_clone()?;
        let link = LinkMonitor::new(port.device_path().to_path_buf());
        let reader = ChannelReader::new(
            port,
            layout,
            ByteRingBuffer::new(ring_capacity),
            link.clone(),
        );
        let writer = ChannelWriter::new(write_port, link.clone());
        debug!(
            path = ?link.device_path(),
            frame_len = layout.len(),
            ring_capacity,
            "serial channel ready"
        );
        Ok(Self {
            reader,
            writer,
            link,
        })
    }

    /// See [`ChannelReader::read_frame`].
    pub fn read_frame(&mut self) -> Result<Extraction> {
        self.reader.read_frame()
    }

    /// See [`ChannelWriter::write_frame`].
    pub fn write_frame(&self, bytes: &[u8]) -> Result<usize> {
        self.writer.write_frame(bytes)
    }

    /// Port open and device path present.
    pub fn is_online(&self) -> bool {
        self.link.is_online()
    }

    /// Stop all further I/O through this channel.
    pub fn close(&self) {
        debug!(path = ?self.link.device_path(), "serial channel closed");
        self.link.mark_closed();
    }

    pub fn layout(&self) -> &FrameLayout {
        self.reader.layout()
    }

    pub fn device_path(&self) -> &Path {
        self.link.device_path()
    }

    /// Separate the receiving half, the transmitting half and the link view.
    pub fn split(self) -> (ChannelReader<P>, ChannelWriter<P>, LinkMonitor) {
        (self.reader, self.writer, self.link)
    }
}

impl<P> std::fmt::Debug for SerialChannel<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("reader", &self.reader)
            .field("link", &self.link)
            .finish()
    }
}
