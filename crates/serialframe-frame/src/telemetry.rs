//! JustFloat telemetry packets.
//!
//! A packet is a run of little-endian `f32` values closed by `00 00 80 7F`,
//! the bit pattern of `f32::INFINITY`. There is no header and no length
//! field; plotting tools split the stream on the trailer.

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Packet trailer.
pub const JUST_FLOAT_TRAILER: [u8; 4] = [0x00, 0x00, 0x80, 0x7F];

/// Append one packet carrying `values` to `dst`.
pub fn encode_just_float(values: &[f32], dst: &mut BytesMut) -> Result<()> {
    if values.is_empty() {
        return Err(FrameError::EmptyTelemetry);
    }
    dst.reserve(values.len() * 4 + JUST_FLOAT_TRAILER.len());
    for value in values {
        dst.put_f32_le(*value);
    }
    dst.put_slice(&JUST_FLOAT_TRAILER);
    Ok(())
}
