//! Frame resynchronization over a [`ByteRingBuffer`].

use bytes::{BufMut, BytesMut};

use crate::codec::{Frame, FrameLayout, HEADER_A, HEADER_B, TRAILER};
use crate::ring::ByteRingBuffer;

/// Outcome of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A frame was found and removed from the buffer.
    Aligned(Frame),
    /// Fewer than one frame's worth of bytes is buffered. Nothing was consumed.
    Insufficient,
    /// Bytes were discarded hunting for markers and no frame was found.
    Desynchronized {
        /// How many bytes were dropped.
        discarded: usize,
    },
}

/// Pull the next valid frame out of `ring`.
///
/// Leading bytes that do not start a valid frame are dropped one at a time.
/// The number of bytes consumed before a match is exactly the offset of the
/// first valid frame; when none exists, bytes are consumed until fewer than
/// one frame length remains.
pub fn extract_frame(ring: &mut ByteRingBuffer, layout: &FrameLayout) -> Extraction {
    let len = layout.len();
    if ring.len() < len {
        return Extraction::Insufficient;
    }

    let mut discarded = 0usize;
    while ring.len() >= len {
        if ring.peek(0) == HEADER_A && ring.peek(1) == HEADER_B && ring.peek(len - 1) == TRAILER {
            let mut bytes = BytesMut::with_capacity(len);
            for _ in 0..len {
                bytes.put_u8(ring.pop());
            }
            return Extraction::Aligned(Frame::from_validated(bytes.freeze()));
        }
        ring.pop();
        discarded += 1;
    }

    Extraction::Desynchronized { discarded }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_with(bytes: &[u8]) -> ByteRingBuffer {
        let mut ring = ByteRingBuffer::new(64);
        ring.extend_from_slice(bytes);
        ring
    }

    const FRAME: [u8; 8] = [b'?', b'!', 0x01, 0x05, 0, 0, 0, b'!'];

    #[test]
    fn insufficient_leaves_buffer_untouched() {
        let layout = FrameLayout::new(8).unwrap();
        let mut ring = ring_with(&FRAME[..7]);
        assert_eq!(extract_frame(&mut ring, &layout), Extraction::Insufficient);
        assert_eq!(ring.len(), 7);
    }

    #[test]
    fn aligned_frame_at_head() {
        let layout = FrameLayout::new(8).unwrap();
        let mut ring = ring_with(&FRAME);
        match extract_frame(&mut ring, &layout) {
            Extraction::Aligned(frame) => assert_eq!(frame.as_bytes(), &FRAME),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn drops_leading_garbage_byte() {
        let layout = FrameLayout::new(8).unwrap();
        let mut wire = vec![0xAA];
        wire.extend_from_slice(&FRAME);
        let mut ring = ring_with(&wire);

        match extract_frame(&mut ring, &layout) {
            Extraction::Aligned(frame) => {
                assert_eq!(frame.tag(), 0x01);
                assert_eq!(frame.u32_le_at(3), Some(5));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn consumes_exactly_prefix_plus_frame() {
        let layout = FrameLayout::new(8).unwrap();
        for k in 0..10usize {
            let mut wire: Vec<u8> = (0..k).map(|i| 0x80 | i as u8).collect();
            wire.extend_from_slice(&FRAME);
            wire.extend_from_slice(&[0x11, 0x22, 0x33]);
            let mut ring = ring_with(&wire);

            assert!(matches!(
                extract_frame(&mut ring, &layout),
                Extraction::Aligned(_)
            ));
            assert_eq!(ring.len(), wire.len() - (k + 8), "prefix {k}");
            assert_eq!(ring.peek(0), 0x11);
        }
    }

    #[test]
    fn desynchronized_consumes_down_to_below_frame_len() {
        let layout = FrameLayout::new(8).unwrap();
        let garbage: Vec<u8> = (0..20u8).collect();
        let mut ring = ring_with(&garbage);

        assert_eq!(
            extract_frame(&mut ring, &layout),
            Extraction::Desynchronized { discarded: 13 }
        );
        assert_eq!(ring.len(), 7);
    }

    #[test]
    fn partial_frame_after_garbage_survives_resync() {
        let layout = FrameLayout::new(8).unwrap();
        let mut wire = vec![0x00, 0x00, 0x00];
        wire.extend_from_slice(&FRAME[..6]);
        let mut ring = ring_with(&wire);

        assert_eq!(
            extract_frame(&mut ring, &layout),
            Extraction::Desynchronized { discarded: 2 }
        );
        ring.extend_from_slice(&FRAME[6..]);
        // One stray zero remains ahead of the frame start.
        match extract_frame(&mut ring, &layout) {
            Extraction::Aligned(frame) => assert_eq!(frame.as_bytes(), &FRAME),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn header_lookalike_without_trailer_is_skipped() {
        let layout = FrameLayout::new(8).unwrap();
        let mut wire = vec![b'?', b'!', 0x02, 0, 0, 0, 0, 0];
        wire.extend_from_slice(&FRAME);
        let mut ring = ring_with(&wire);

        match extract_frame(&mut ring, &layout) {
            Extraction::Aligned(frame) => assert_eq!(frame.tag(), 0x01),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn seven_byte_frames_align() {
        let layout = FrameLayout::new(7).unwrap();
        let mut ring = ring_with(&[0xAA, b'?', b'!', 0x01, 0x05, 0, b'!']);
        match extract_frame(&mut ring, &layout) {
            Extraction::Aligned(frame) => {
                assert_eq!(frame.tag(), 0x01);
                assert_eq!(frame.payload(), &[0x05, 0]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
