use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{EngineError, Result};

/// The engine's background tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Reader,
    Writer,
    Watchdog,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Reader => "reader",
            TaskKind::Writer => "writer",
            TaskKind::Watchdog => "watchdog",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of a reader or writer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not running. Frames go straight to the port (writer) or are not read.
    Disabled,
    Enabled,
    /// Stopped on its own after an unrecoverable condition.
    Faulted,
}

/// Outcome of [`TaskHandle::stop`].
pub(crate) enum Stopped<T> {
    Finished(T),
    Panicked,
    /// Still running after the timeout; the handle is returned so the caller
    /// can keep it.
    TimedOut(TaskHandle<T>),
}

const STOP_POLL: Duration = Duration::from_millis(5);

/// A named OS thread cooperating through a shared run flag.
pub(crate) struct TaskHandle<T> {
    kind: TaskKind,
    running: Arc<AtomicBool>,
    join: JoinHandle<T>,
}

impl<T: Send + 'static> TaskHandle<T> {
    /// Raise `running` and spawn `body` on a thread named after `kind`.
    pub(crate) fn spawn<F>(kind: TaskKind, running: Arc<AtomicBool>, body: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        running.store(true, Ordering::Release);
        let join = thread::Builder::new()
            .name(format!("serialframe-{kind}"))
            .spawn(body)
            .map_err(|source| {
                running.store(false, Ordering::Release);
                EngineError::Spawn { task: kind, source }
            })?;
        Ok(Self {
            kind,
            running,
            join,
        })
    }

    pub(crate) fn kind(&self) -> TaskKind {
        self.kind
    }

    /// True when called from the task's own thread.
    pub(crate) fn is_current(&self) -> bool {
        self.join.thread().id() == thread::current().id()
    }

    pub(crate) fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Lower the run flag and join, waiting at most `timeout`.
    pub(crate) fn stop(self, timeout: Duration) -> Stopped<T> {
        self.request_stop();
        let deadline = Instant::now() + timeout;
        while !self.join.is_finished() {
            if Instant::now() >= deadline {
                return Stopped::TimedOut(self);
            }
            thread::sleep(STOP_POLL);
        }
        match self.join.join() {
            Ok(value) => Stopped::Finished(value),
            Err(_) => Stopped::Panicked,
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("kind", &self.kind)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}
