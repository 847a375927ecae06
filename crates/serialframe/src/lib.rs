//! Fixed-length, marker-delimited framing over serial links.
//!
//! serialframe turns a raw serial byte pipe into a stream of fixed-length
//! frames, with a concurrent reader, a paced writer and a link watchdog.
//!
//! # Crate Structure
//!
//! - [`transport`]: port capability trait, real serial devices, in-memory loopback
//! - [`frame`]: ring buffer, frame resynchronization, mission codecs
//! - [`engine`]: the duplex engine, its tasks and the send queue

/// Re-export transport types.
pub mod transport {
    pub use serialframe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serialframe_frame::*;
}

/// Re-export engine types.
pub mod engine {
    pub use serialframe_engine::*;
}
