use serialframe_transport::{PortHandle, TransportError};

use crate::channel::LinkMonitor;
use crate::codec::FrameLayout;
use crate::error::Result;
use crate::extract::{extract_frame, Extraction};
use crate::ring::ByteRingBuffer;

/// Receiving half of a [`SerialChannel`](crate::SerialChannel).
///
/// Owns the ring buffer outright: nothing else reads or mutates it, so it
/// needs no lock.
pub struct ChannelReader<P> {
    port: P,
    ring: ByteRingBuffer,
    layout: FrameLayout,
    link: LinkMonitor,
    chunk: Vec<u8>,
    last_read: usize,
}

impl<P: PortHandle> ChannelReader<P> {
    pub(crate) fn new(port: P, layout: FrameLayout, ring: ByteRingBuffer, link: LinkMonitor) -> Self {
        Self {
            port,
            ring,
            chunk: vec![0u8; layout.len()],
            layout,
            link,
            last_read: 0,
        }
    }

    /// Do one bounded read into the ring buffer, then try to extract a frame.
    ///
    /// A read that times out contributes no bytes; extraction still runs over
    /// whatever was buffered earlier.
    pub fn read_frame(&mut self) -> Result<Extraction> {
        if !self.link.is_open() {
            return Err(TransportError::Closed.into());
        }

        self.last_read = 0;
        let read = self.port.read(&mut self.chunk)?;
        self.last_read = read;
        self.ring.extend_from_slice(&self.chunk[..read]);

        Ok(extract_frame(&mut self.ring, &self.layout))
    }

    /// Bytes returned by the most recent port read.
    pub fn last_chunk(&self) -> &[u8] {
        &self.chunk[..self.last_read]
    }

    /// Bytes buffered but not yet framed.
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Borrow the underlying port.
    pub fn get_ref(&self) -> &P {
        &self.port
    }

    /// Read from `port` from now on, returning the old one. Buffered bytes
    /// belonged to the old connection and are dropped.
    pub fn replace_port(&mut self, port: P) -> P {
        self.ring.clear();
        self.last_read = 0;
        std::mem::replace(&mut self.port, port)
    }
}

impl<P> std::fmt::Debug for ChannelReader<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelReader")
            .field("frame_len", &self.layout.len())
            .field("buffered", &self.ring.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use serialframe_transport::MemoryPort;

    use super::*;
    use crate::channel::SerialChannel;
    use crate::error::FrameError;

    fn channel(frame_len: usize) -> (SerialChannel<MemoryPort>, MemoryPort) {
        let (local, remote) = MemoryPort::pair("/dev/local", "/dev/remote");
        let local = local.with_read_timeout(Duration::from_millis(10));
        let layout = FrameLayout::new(frame_len).unwrap();
        (SerialChannel::new(local, layout, 64).unwrap(), remote)
    }

    #[test]
    fn timeout_yields_insufficient() {
        let (chan, _remote) = channel(8);
        let (mut reader, _writer, _link) = chan.split();
        assert_eq!(reader.read_frame().unwrap(), Extraction::Insufficient);
        assert!(reader.last_chunk().is_empty());
    }

    #[test]
    fn frame_split_across_reads() {
        let (chan, mut remote) = channel(8);
        let (mut reader, _writer, _link) = chan.split();

        remote.write(&[b'?', b'!', 0x01, 0x2A]).unwrap();
        assert_eq!(reader.read_frame().unwrap(), Extraction::Insufficient);
        assert_eq!(reader.buffered(), 4);

        remote.write(&[0, 0, 0, b'!']).unwrap();
        match reader.read_frame().unwrap() {
            Extraction::Aligned(frame) => assert_eq!(frame.u32_le_at(3), Some(42)),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn reads_at_most_one_frame_length_per_call() {
        let (chan, mut remote) = channel(8);
        let (mut reader, _writer, _link) = chan.split();

        let frame = [b'?', b'!', 0x01, 1, 0, 0, 0, b'!'];
        remote.write(&frame).unwrap();
        remote.write(&frame).unwrap();

        assert!(matches!(reader.read_frame().unwrap(), Extraction::Aligned(_)));
        assert_eq!(reader.last_chunk().len(), 8);
        assert!(matches!(reader.read_frame().unwrap(), Extraction::Aligned(_)));
    }

    #[test]
    fn closed_link_refuses_reads() {
        let (chan, _remote) = channel(8);
        let (mut reader, _writer, link) = chan.split();
        link.mark_closed();
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::Transport(TransportError::Closed))
        ));
    }

    #[test]
    fn hung_up_port_is_an_error() {
        let (chan, remote) = channel(8);
        let (mut reader, _writer, _link) = chan.split();
        remote.hang_up();
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::Transport(TransportError::Closed))
        ));
    }

    #[test]
    fn replaced_port_starts_with_empty_ring() {
        let (chan, mut old_remote) = channel(8);
        let (mut reader, _writer, _link) = chan.split();
        old_remote.write(&[b'?', b'!', 0x01]).unwrap();
        assert_eq!(reader.read_frame().unwrap(), Extraction::Insufficient);
        assert_eq!(reader.buffered(), 3);

        let (fresh, mut remote) = MemoryPort::pair("/dev/local", "/dev/remote");
        let old = reader.replace_port(fresh.with_read_timeout(Duration::from_millis(10)));
        assert_eq!(old.device_path(), Path::new("/dev/local"));
        assert_eq!(reader.buffered(), 0);

        remote.write(&[b'?', b'!', 0x01, 7, 0, 0, 0, b'!']).unwrap();
        match reader.read_frame().unwrap() {
            Extraction::Aligned(frame) => assert_eq!(frame.u32_le_at(3), Some(7)),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
