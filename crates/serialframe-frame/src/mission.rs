//! Typed payloads for the built-in mission tags.
//!
//! The core treats payloads as opaque; these codecs are conveniences for
//! applications that speak the two stock missions. Field placement for
//! mission 0x02 is a [`Mission2Layout`] so both ends can agree on it
//! explicitly.

use crate::codec::{Frame, FrameBuf, PAYLOAD_OFFSET};
use crate::error::Result;

/// Tag of mission 1: a single `u32`.
pub const MISSION_1: u8 = 0x01;
/// Tag of mission 2: a `u16` and an `f32`.
pub const MISSION_2: u8 = 0x02;

/// A payload that knows its own tag and how to write itself into a frame.
pub trait Mission {
    fn tag(&self) -> u8;

    /// Write tag and payload. Markers are already set.
    fn encode(&self, buf: &mut FrameBuf<'_>) -> Result<()>;
}

/// Mission 0x01: `x` as a little-endian `u32` at offset 3. Needs 8-byte frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mission1 {
    pub x: u32,
}

impl Mission1 {
    pub fn decode(frame: &Frame) -> Option<Self> {
        if frame.tag() != MISSION_1 {
            return None;
        }
        frame.u32_le_at(PAYLOAD_OFFSET).map(|x| Self { x })
    }
}

impl Mission for Mission1 {
    fn tag(&self) -> u8 {
        MISSION_1
    }

    fn encode(&self, buf: &mut FrameBuf<'_>) -> Result<()> {
        buf.set_tag(MISSION_1);
        buf.put_u32_le(PAYLOAD_OFFSET, self.x)
    }
}

/// Where the two mission 0x02 fields sit inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mission2Layout {
    /// Offset of the little-endian `u16`.
    pub x_offset: usize,
    /// Offset of the little-endian `f32`.
    pub y_offset: usize,
}

impl Mission2Layout {
    /// Smallest frame length that holds both fields ahead of the trailer.
    pub fn min_frame_len(&self) -> usize {
        (self.x_offset + 2).max(self.y_offset + 4) + 1
    }
}

impl Default for Mission2Layout {
    /// `u16` at offset 3 immediately followed by the `f32` at offset 5.
    fn default() -> Self {
        Self {
            x_offset: PAYLOAD_OFFSET,
            y_offset: PAYLOAD_OFFSET + 2,
        }
    }
}

/// Mission 0x02: a `u16` and an `f32` placed according to a [`Mission2Layout`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mission2 {
    pub x: u16,
    pub y: f32,
    pub layout: Mission2Layout,
}

impl Mission2 {
    /// Mission 2 with the default field layout.
    pub fn new(x: u16, y: f32) -> Self {
        Self {
            x,
            y,
            layout: Mission2Layout::default(),
        }
    }

    pub fn with_layout(mut self, layout: Mission2Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Decode using `layout`. `None` for other tags or frames too short.
    pub fn decode(frame: &Frame, layout: Mission2Layout) -> Option<Self> {
        if frame.tag() != MISSION_2 {
            return None;
        }
        let x = frame.u16_le_at(layout.x_offset)?;
        let y = frame.f32_le_at(layout.y_offset)?;
        Some(Self { x, y, layout })
    }
}

impl Mission for Mission2 {
    fn tag(&self) -> u8 {
        MISSION_2
    }

    fn encode(&self, buf: &mut FrameBuf<'_>) -> Result<()> {
        buf.set_tag(MISSION_2);
        buf.put_u16_le(self.layout.x_offset, self.x)?;
        buf.put_f32_le(self.layout.y_offset, self.y)
    }
}
