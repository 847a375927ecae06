use std::time::Duration;

use serialframe_frame::FrameError;
use serialframe_transport::TransportError;

use crate::task::TaskKind;

/// Errors surfaced by the duplex engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The serial device could not be opened; the engine did not start.
    #[error("failed to open port: {0}")]
    PortOpen(#[source] TransportError),

    /// The configuration cannot work as given.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Frame construction or channel I/O failed.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The device accepted only part of a synchronous write.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// The writer fell behind and stopped; re-enable it to resume.
    #[error("writer queue overflow: {pending} bytes pending, limit {limit}")]
    QueueOverflow { pending: usize, limit: usize },

    /// A task did not exit within its stop timeout.
    #[error("{task} task did not stop within {timeout:?}")]
    StopTimeout { task: TaskKind, timeout: Duration },

    /// A task thread could not be spawned.
    #[error("failed to spawn {task} task: {source}")]
    Spawn {
        task: TaskKind,
        source: std::io::Error,
    },

    /// The operation needs this task disabled first.
    #[error("{0} task is still enabled")]
    TaskRunning(TaskKind),

    /// A task panicked and its state could not be recovered.
    #[error("{0} task is unrecoverable after a panic")]
    TaskLost(TaskKind),

    /// The engine has been closed.
    #[error("engine closed")]
    Closed,
}

impl From<TransportError> for EngineError {
    fn from(err: TransportError) -> Self {
        EngineError::Frame(FrameError::Transport(err))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
