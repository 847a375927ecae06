use std::time::Duration;

use serialframe_frame::{FrameLayout, DEFAULT_CAPACITY, DEFAULT_FRAME_LEN};

use crate::error::{EngineError, Result};

/// Engine tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Length of every frame in bytes. Default: 8.
    pub frame_len: usize,
    /// Frames per second the writer task transmits at most. Default: 300.
    pub send_frequency_hz: f64,
    /// Unframed bytes the reader buffers. Default: 100.
    pub ring_capacity: usize,
    /// Pause between reader iterations. Default: 1ms.
    pub reader_poll_interval: Duration,
    /// Pause after a failed read or write. Default: 100ms.
    pub io_backoff: Duration,
    /// Longest the writer blocks waiting for queued bytes. Default: 1s.
    pub writer_wait: Duration,
    /// Link health check period. Default: 1s.
    pub watchdog_interval: Duration,
    /// Bound on joining a task during disable or close. Default: 2s.
    pub stop_timeout: Duration,
    /// Hex-dump every frame received and transmitted at DEBUG.
    pub trace_frames: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_len: DEFAULT_FRAME_LEN,
            send_frequency_hz: 300.0,
            ring_capacity: DEFAULT_CAPACITY,
            reader_poll_interval: Duration::from_millis(1),
            io_backoff: Duration::from_millis(100),
            writer_wait: Duration::from_secs(1),
            watchdog_interval: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(2),
            trace_frames: false,
        }
    }
}

impl EngineConfig {
    /// Check the settings and derive the frame layout.
    pub fn validate(&self) -> Result<FrameLayout> {
        let layout = FrameLayout::new(self.frame_len)?;

        if !(self.send_frequency_hz.is_finite() && self.send_frequency_hz > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "send frequency must be positive, got {}",
                self.send_frequency_hz
            )));
        }
        if self.ring_capacity < self.frame_len {
            return Err(EngineError::InvalidConfig(format!(
                "ring capacity {} cannot hold a {}-byte frame",
                self.ring_capacity, self.frame_len
            )));
        }
        if self.writer_wait.is_zero() || self.watchdog_interval.is_zero() {
            return Err(EngineError::InvalidConfig(
                "writer wait and watchdog interval must be non-zero".to_string(),
            ));
        }

        Ok(layout)
    }

    /// Minimum spacing between two transmitted frames.
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.send_frequency_hz)
    }

    /// Most bytes the writer accepts in one drain: one second of frames,
    /// and never less than a single frame.
    pub fn overflow_limit(&self) -> usize {
        let frames_per_period = (self.send_frequency_hz.floor() as usize).max(1);
        frames_per_period * self.frame_len
    }
}
