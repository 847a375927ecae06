use bytes::Bytes;

use crate::error::{FrameError, Result};

/// First header marker, `'?'`.
pub const HEADER_A: u8 = b'?';
/// Second header marker, `'!'`.
pub const HEADER_B: u8 = b'!';
/// Trailer marker, `'!'`.
pub const TRAILER: u8 = b'!';

/// Offset of the mission tag.
pub const TAG_OFFSET: usize = 2;
/// Offset of the first payload byte.
pub const PAYLOAD_OFFSET: usize = 3;
/// Two header markers, the mission tag and the trailer.
pub const MIN_FRAME_LEN: usize = 4;
/// Frame length used when none is configured.
pub const DEFAULT_FRAME_LEN: usize = 8;

/// Fixed frame geometry shared by both ends of a link.
///
/// Wire format:
/// ```text
/// ┌──────┬──────┬─────┬──────────────────────┬─────────┐
/// │ '?'  │ '!'  │ tag │ payload              │ '!'     │
/// │ [0]  │ [1]  │ [2] │ [3 .. len-2]         │ [len-1] │
/// └──────┴──────┴─────┴──────────────────────┴─────────┘
/// ```
/// Multi-byte payload fields are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    len: usize,
}

impl FrameLayout {
    /// Layout for frames of exactly `len` bytes.
    pub fn new(len: usize) -> Result<Self> {
        if len < MIN_FRAME_LEN {
            return Err(FrameError::InvalidLength {
                len,
                min: MIN_FRAME_LEN,
            });
        }
        Ok(Self { len })
    }

    /// Total frame length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Offset of the trailer marker.
    pub fn trailer_offset(&self) -> usize {
        self.len - 1
    }

    /// Number of payload bytes between the tag and the trailer.
    pub fn payload_len(&self) -> usize {
        self.len - MIN_FRAME_LEN
    }

    /// True when `bytes` is exactly one frame with all three markers in place.
    pub fn is_valid(&self, bytes: &[u8]) -> bool {
        bytes.len() == self.len
            && bytes[0] == HEADER_A
            && bytes[1] == HEADER_B
            && bytes[self.trailer_offset()] == TRAILER
    }

    /// Zero `buf` and stamp the markers into it.
    ///
    /// `buf` is resized to the frame length first.
    pub fn reset(&self, buf: &mut Vec<u8>) {
        buf.clear();
        buf.resize(self.len, 0);
        buf[0] = HEADER_A;
        buf[1] = HEADER_B;
        buf[self.trailer_offset()] = TRAILER;
    }

    /// Reset `buf` to an empty frame, then let `fill` write tag and payload.
    pub fn fill<F>(&self, buf: &mut Vec<u8>, fill: F) -> Result<()>
    where
        F: FnOnce(&mut FrameBuf<'_>) -> Result<()>,
    {
        self.reset(buf);
        fill(&mut FrameBuf::new(buf))
    }

    /// Build a frame in one call.
    pub fn encode<F>(&self, fill: F) -> Result<Frame>
    where
        F: FnOnce(&mut FrameBuf<'_>) -> Result<()>,
    {
        let mut buf = Vec::with_capacity(self.len);
        self.fill(&mut buf, fill)?;
        Ok(Frame {
            bytes: Bytes::from(buf),
        })
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            len: DEFAULT_FRAME_LEN,
        }
    }
}

fn check_field(offset: usize, width: usize, frame_len: usize) -> Result<()> {
    let fits = offset >= PAYLOAD_OFFSET
        && offset
            .checked_add(width)
            .is_some_and(|end| end < frame_len);
    if fits {
        Ok(())
    } else {
        Err(FrameError::FieldOutOfRange {
            offset,
            width,
            frame_len,
        })
    }
}

/// Outbound frame under construction.
///
/// Markers are already in place; the fill step only writes the mission tag
/// and payload. Field offsets are absolute frame offsets, and every write is
/// checked against the payload region so a fill step can never clobber a
/// marker.
pub struct FrameBuf<'a> {
    buf: &'a mut [u8],
}

impl<'a> FrameBuf<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    /// Set the mission tag.
    pub fn set_tag(&mut self, tag: u8) {
        self.buf[TAG_OFFSET] = tag;
    }

    /// Current mission tag.
    pub fn tag(&self) -> u8 {
        self.buf[TAG_OFFSET]
    }

    /// Mutable view of the payload region.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let end = self.buf.len() - 1;
        &mut self.buf[PAYLOAD_OFFSET..end]
    }

    pub fn put_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        self.put_slice(offset, &[value])
    }

    pub fn put_u16_le(&mut self, offset: usize, value: u16) -> Result<()> {
        self.put_slice(offset, &value.to_le_bytes())
    }

    pub fn put_u32_le(&mut self, offset: usize, value: u32) -> Result<()> {
        self.put_slice(offset, &value.to_le_bytes())
    }

    pub fn put_f32_le(&mut self, offset: usize, value: f32) -> Result<()> {
        self.put_slice(offset, &value.to_le_bytes())
    }

    /// Copy `bytes` into the payload region starting at `offset`.
    pub fn put_slice(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        check_field(offset, bytes.len(), self.buf.len())?;
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// The whole frame as it will go on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        self.buf
    }
}

/// A complete frame whose markers have been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Wrap raw bytes if they form a valid frame under `layout`.
    pub fn from_wire(layout: &FrameLayout, bytes: impl Into<Bytes>) -> Option<Self> {
        let bytes = bytes.into();
        layout.is_valid(&bytes).then_some(Self { bytes })
    }

    pub(crate) fn from_validated(bytes: Bytes) -> Self {
        debug_assert!(bytes.len() >= MIN_FRAME_LEN);
        Self { bytes }
    }

    /// Mission tag.
    pub fn tag(&self) -> u8 {
        self.bytes[TAG_OFFSET]
    }

    /// Payload bytes between the tag and the trailer.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[PAYLOAD_OFFSET..self.bytes.len() - 1]
    }

    /// The whole frame including markers.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total frame length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn field<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        check_field(offset, N, self.bytes.len()).ok()?;
        self.bytes[offset..offset + N].try_into().ok()
    }

    pub fn u16_le_at(&self, offset: usize) -> Option<u16> {
        self.field::<2>(offset).map(u16::from_le_bytes)
    }

    pub fn u32_le_at(&self, offset: usize) -> Option<u32> {
        self.field::<4>(offset).map(u32::from_le_bytes)
    }

    pub fn f32_le_at(&self, offset: usize) -> Option<f32> {
        self.field::<4>(offset).map(f32::from_le_bytes)
    }
}

/// Render bytes as space-separated lowercase hex pairs.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
