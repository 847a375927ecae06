//! Fixed-length, marker-delimited framing over serial links.
//!
//! Every frame is exactly `L` bytes:
//! - Header markers `'?'` `'!'` at offsets 0 and 1
//! - A mission tag at offset 2
//! - Payload up to the trailer marker `'!'` at offset `L-1`
//!
//! Incoming bytes accumulate in a [`ByteRingBuffer`]; [`extract_frame`]
//! drops bytes one at a time until the three markers line up.

pub mod channel;
pub mod codec;
pub mod error;
pub mod extract;
pub mod mission;
pub mod reader;
pub mod ring;
pub mod telemetry;
pub mod writer;

pub use channel::{LinkMonitor, SerialChannel};
pub use codec::{
    hex_dump, Frame, FrameBuf, FrameLayout, DEFAULT_FRAME_LEN, HEADER_A, HEADER_B,
    MIN_FRAME_LEN, PAYLOAD_OFFSET, TAG_OFFSET, TRAILER,
};
pub use error::{FrameError, Result};
pub use extract::{extract_frame, Extraction};
pub use mission::{Mission, Mission1, Mission2, Mission2Layout, MISSION_1, MISSION_2};
pub use reader::ChannelReader;
pub use ring::{ByteRingBuffer, DEFAULT_CAPACITY, SENTINEL};
pub use telemetry::{encode_just_float, JUST_FLOAT_TRAILER};
pub use writer::ChannelWriter;
