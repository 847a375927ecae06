use serialframe_transport::TransportError;

/// Errors that can occur while building, reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The configured frame length cannot hold the markers and mission tag.
    #[error("frame length {len} is too short (min {min})")]
    InvalidLength { len: usize, min: usize },

    /// A payload field does not fit between the mission tag and the trailer.
    #[error("field of {width} bytes at offset {offset} does not fit a {frame_len}-byte frame")]
    FieldOutOfRange {
        offset: usize,
        width: usize,
        frame_len: usize,
    },

    /// A telemetry packet must carry at least one value.
    #[error("telemetry packet has no values")]
    EmptyTelemetry,

    /// The underlying port failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
