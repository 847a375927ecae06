use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use serialframe_frame::{
    encode_just_float, hex_dump, ChannelReader, ChannelWriter, Extraction, Frame, FrameBuf,
    FrameError, FrameLayout, LinkMonitor, Mission, SerialChannel,
};
use serialframe_transport::{PortConfig, PortHandle, SerialLink};
use tracing::Level;

use crate::config::EngineConfig;
use crate::dispatch::DispatchTable;
use crate::error::{EngineError, Result};
use crate::log::{LogSink, TracingSink};
use crate::queue::{CloseReason, Drain, PendingWriteQueue};
use crate::task::{Stopped, TaskHandle, TaskKind, TaskState};

/// Longest uninterrupted sleep inside a task, so stop requests are seen
/// promptly even with long periods configured.
const PAUSE_SLICE: Duration = Duration::from_millis(25);

type DisconnectHook = Box<dyn Fn(&Path) + Send + Sync>;

/// Where a successful [`DuplexEngine::send`] left the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the port before `send` returned.
    Written,
    /// Queued for the paced writer.
    Queued,
}

/// What [`DuplexEngine::close`] could not finish cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseReport {
    /// Tasks still running when their stop timeout ran out.
    pub stalled: Vec<TaskKind>,
    /// Queued bytes that were never transmitted.
    pub discarded_bytes: usize,
}

impl CloseReport {
    pub fn is_clean(&self) -> bool {
        self.stalled.is_empty()
    }
}

enum ReaderSlot<P> {
    Idle(ChannelReader<P>),
    Running(TaskHandle<ChannelReader<P>>),
    /// The reader thread panicked and took the receive half with it.
    Lost,
}

/// Writer tasks hand back whatever part of their snapshot they did not send.
enum WriterSlot {
    Idle,
    Running(TaskHandle<Vec<u8>>),
}

struct Shared<P> {
    config: EngineConfig,
    layout: FrameLayout,
    overflow_limit: usize,
    writer: ChannelWriter<P>,
    link: LinkMonitor,
    queue: PendingWriteQueue,
    /// Channel-wide lock: the outbound frame buffer plus the decision between
    /// writing now and queueing.
    outbound: Mutex<Vec<u8>>,
    dispatch: DispatchTable,
    sink: Arc<dyn LogSink>,
    on_disconnect: Option<DisconnectHook>,
    reader_task: Mutex<ReaderSlot<P>>,
    writer_task: Mutex<WriterSlot>,
    reader_running: Arc<AtomicBool>,
    writer_running: Arc<AtomicBool>,
    /// Set by a reattach: the watchdog treats the link as online again.
    rearm_watchdog: AtomicBool,
    closed: AtomicBool,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sleep for `total` in short slices. Returns whether `running` is still set.
fn pause(running: &AtomicBool, total: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if !running.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(PAUSE_SLICE));
    }
}

impl<P: PortHandle> Shared<P> {
    fn log(&self, level: Level, message: &str) {
        self.sink.log(level, message);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn overflow_error(&self) -> EngineError {
        EngineError::QueueOverflow {
            pending: self.queue.len(),
            limit: self.overflow_limit,
        }
    }

    fn trace_frame(&self, direction: &str, bytes: &[u8]) {
        if self.config.trace_frames {
            self.log(Level::DEBUG, &format!("{direction} {}", hex_dump(bytes)));
        }
    }

    /// Write one chunk from a background task. Failures are logged, never
    /// propagated.
    fn transmit(&self, chunk: &[u8]) -> bool {
        match self.writer.write_frame(chunk) {
            Ok(written) if written == chunk.len() => {
                self.trace_frame("tx", chunk);
                true
            }
            Ok(written) => {
                self.log(
                    Level::WARN,
                    &format!("short write: {written} of {} bytes", chunk.len()),
                );
                false
            }
            Err(err) => {
                self.log(Level::ERROR, &format!("write failed: {err}"));
                false
            }
        }
    }

    fn deliver(&self, frame: &Frame) {
        self.trace_frame("rx", frame.as_bytes());
        let tag = frame.tag();
        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch.dispatch(frame))) {
            Ok(true) => {}
            Ok(false) => self.log(
                Level::DEBUG,
                &format!("no handler for mission 0x{tag:02x}; frame dropped"),
            ),
            Err(_) => self.log(
                Level::ERROR,
                &format!("handler for mission 0x{tag:02x} panicked; frame dropped"),
            ),
        }
    }

    fn enable_reader(self: &Arc<Self>) -> Result<()> {
        if self.is_closed() {
            return Err(EngineError::Closed);
        }
        let mut slot = relock(&self.reader_task);
        match mem::replace(&mut *slot, ReaderSlot::Lost) {
            ReaderSlot::Idle(reader) => {
                let shared = Arc::clone(self);
                let handle = TaskHandle::spawn(
                    TaskKind::Reader,
                    Arc::clone(&self.reader_running),
                    move || shared.reader_loop(reader),
                )?;
                *slot = ReaderSlot::Running(handle);
                self.log(Level::INFO, "reader enabled");
                Ok(())
            }
            ReaderSlot::Running(handle) if self.reader_running.load(Ordering::Acquire) => {
                *slot = ReaderSlot::Running(handle);
                Ok(())
            }
            ReaderSlot::Running(handle) => {
                // A stop that timed out earlier; the thread must be gone first.
                match handle.stop(self.config.stop_timeout) {
                    Stopped::Finished(reader) => {
                        *slot = ReaderSlot::Idle(reader);
                        drop(slot);
                        self.enable_reader()
                    }
                    Stopped::Panicked => Err(EngineError::TaskLost(TaskKind::Reader)),
                    Stopped::TimedOut(handle) => {
                        *slot = ReaderSlot::Running(handle);
                        Err(EngineError::StopTimeout {
                            task: TaskKind::Reader,
                            timeout: self.config.stop_timeout,
                        })
                    }
                }
            }
            ReaderSlot::Lost => Err(EngineError::TaskLost(TaskKind::Reader)),
        }
    }

    fn disable_reader(&self) -> Result<()> {
        let mut slot = relock(&self.reader_task);
        match mem::replace(&mut *slot, ReaderSlot::Lost) {
            ReaderSlot::Running(handle) => match handle.stop(self.config.stop_timeout) {
                Stopped::Finished(reader) => {
                    *slot = ReaderSlot::Idle(reader);
                    self.log(Level::INFO, "reader disabled");
                    Ok(())
                }
                Stopped::Panicked => {
                    self.log(Level::ERROR, "reader task panicked; receive half lost");
                    Err(EngineError::TaskLost(TaskKind::Reader))
                }
                Stopped::TimedOut(handle) => {
                    *slot = ReaderSlot::Running(handle);
                    Err(EngineError::StopTimeout {
                        task: TaskKind::Reader,
                        timeout: self.config.stop_timeout,
                    })
                }
            },
            other => {
                *slot = other;
                Ok(())
            }
        }
    }

    fn reader_state(&self) -> TaskState {
        match &*relock(&self.reader_task) {
            ReaderSlot::Running(_) if self.reader_running.load(Ordering::Acquire) => {
                TaskState::Enabled
            }
            ReaderSlot::Lost => TaskState::Faulted,
            _ => TaskState::Disabled,
        }
    }

    /// Caller holds the outbound lock.
    fn enable_writer(self: &Arc<Self>) -> Result<()> {
        if self.is_closed() {
            return Err(EngineError::Closed);
        }
        let mut slot = relock(&self.writer_task);
        if let WriterSlot::Running(handle) = mem::replace(&mut *slot, WriterSlot::Idle) {
            if self.writer_running.load(Ordering::Acquire) {
                *slot = WriterSlot::Running(handle);
                return Ok(());
            }
            match handle.stop(self.config.stop_timeout) {
                Stopped::Finished(_) | Stopped::Panicked => self.queue.settle(),
                Stopped::TimedOut(handle) => {
                    *slot = WriterSlot::Running(handle);
                    return Err(EngineError::StopTimeout {
                        task: TaskKind::Writer,
                        timeout: self.config.stop_timeout,
                    });
                }
            }
        }

        let discarded = self.queue.reopen();
        if discarded > 0 {
            self.log(
                Level::WARN,
                &format!("discarded {discarded} stale bytes left by writer overflow"),
            );
        }

        let shared = Arc::clone(self);
        let handle = TaskHandle::spawn(
            TaskKind::Writer,
            Arc::clone(&self.writer_running),
            move || shared.writer_loop(),
        )?;
        *slot = WriterSlot::Running(handle);
        self.log(Level::INFO, "writer enabled");
        Ok(())
    }

    /// Stop the writer task and return every byte it did not transmit,
    /// oldest first. Caller holds the outbound lock.
    fn halt_writer(&self) -> Result<Vec<u8>> {
        let mut slot = relock(&self.writer_task);
        let mut unsent = Vec::new();
        if let WriterSlot::Running(handle) = mem::replace(&mut *slot, WriterSlot::Idle) {
            handle.request_stop();
            self.queue.wake();
            match handle.stop(self.config.stop_timeout) {
                Stopped::Finished(leftover) => unsent = leftover,
                Stopped::Panicked => {
                    self.log(Level::ERROR, "writer task panicked");
                }
                Stopped::TimedOut(handle) => {
                    *slot = WriterSlot::Running(handle);
                    return Err(EngineError::StopTimeout {
                        task: TaskKind::Writer,
                        timeout: self.config.stop_timeout,
                    });
                }
            }
        }
        if !self.queue.is_overflowed() {
            unsent.extend(self.queue.take_all());
        }
        Ok(unsent)
    }

    /// Caller holds the outbound lock.
    fn disable_writer(&self) -> Result<()> {
        let unsent = self.halt_writer()?;

        if self.queue.is_overflowed() {
            let discarded = self.queue.reopen();
            self.log(
                Level::WARN,
                &format!("writer fault cleared; discarded {discarded} stale bytes"),
            );
        } else if !unsent.is_empty() {
            // Flush so frames queued before the switch still precede frames
            // sent synchronously after it.
            for chunk in unsent.chunks(self.layout.len()) {
                if !self.transmit(chunk) {
                    self.log(Level::WARN, "dropping remaining unsent frames");
                    break;
                }
            }
        }
        self.queue.settle();
        self.log(Level::INFO, "writer disabled");
        Ok(())
    }

    fn writer_state(&self) -> TaskState {
        if self.queue.is_overflowed() {
            TaskState::Faulted
        } else if self.writer_running.load(Ordering::Acquire) {
            TaskState::Enabled
        } else {
            TaskState::Disabled
        }
    }

    fn reader_loop(&self, mut reader: ChannelReader<P>) -> ChannelReader<P> {
        let running = &*self.reader_running;
        while running.load(Ordering::Acquire) {
            match reader.read_frame() {
                Ok(Extraction::Aligned(frame)) => self.deliver(&frame),
                Ok(Extraction::Desynchronized { discarded }) => self.log(
                    Level::WARN,
                    &format!("frame desynchronized; discarded {discarded} bytes"),
                ),
                Ok(Extraction::Insufficient) => {}
                Err(err) => {
                    self.log(Level::ERROR, &format!("read failed: {err}"));
                    pause(running, self.config.io_backoff);
                    continue;
                }
            }
            thread::sleep(self.config.reader_poll_interval);
        }
        reader
    }

    fn writer_loop(&self) -> Vec<u8> {
        let running = &*self.writer_running;
        let frame_len = self.layout.len();
        let period = self.config.frame_period();

        while running.load(Ordering::Acquire) {
            let bytes = match self
                .queue
                .wait_drain(self.config.writer_wait, self.overflow_limit, running)
            {
                Drain::Bytes(bytes) => bytes,
                Drain::Idle => continue,
                Drain::Closed => break,
                Drain::Overflow { pending } => {
                    self.log(
                        Level::ERROR,
                        &format!(
                            "writer queue overflow: {pending} bytes pending, limit {}; writer stopped",
                            self.overflow_limit
                        ),
                    );
                    running.store(false, Ordering::Release);
                    break;
                }
            };

            let mut sent = 0;
            let mut chunk = vec![0u8; frame_len];
            while sent < bytes.len() {
                let end = (sent + frame_len).min(bytes.len());
                chunk.fill(0);
                chunk[..end - sent].copy_from_slice(&bytes[sent..end]);
                if !self.transmit(&chunk) {
                    pause(running, self.config.io_backoff);
                }
                self.queue.mark_sent(end - sent);
                sent = end;
                if !pause(running, period) {
                    return bytes[sent..].to_vec();
                }
            }
        }
        Vec::new()
    }

    /// `initially_online` is sampled before the thread starts, so a device
    /// that vanishes right after start is still seen as a transition.
    fn watchdog_loop(&self, running: &AtomicBool, initially_online: bool) {
        let mut online = initially_online;
        while pause(running, self.config.watchdog_interval) {
            if self.rearm_watchdog.swap(false, Ordering::AcqRel) {
                online = true;
            }
            let now_online = self.link.is_online();
            if online && !now_online {
                self.handle_disconnect();
            } else if !online && now_online {
                self.log(
                    Level::INFO,
                    &format!(
                        "{} is present again; reader and writer stay disabled",
                        self.link.device_path().display()
                    ),
                );
            }
            online = now_online;
        }
    }

    fn handle_disconnect(&self) {
        let path = self.link.device_path();
        self.log(
            Level::WARN,
            &format!("{} went offline; disabling reader and writer", path.display()),
        );

        let writer = {
            let _outbound = relock(&self.outbound);
            self.disable_writer()
        };
        if let Err(err) = writer {
            self.log(Level::ERROR, &format!("disconnect: {err}"));
        }
        if let Err(err) = self.disable_reader() {
            self.log(Level::ERROR, &format!("disconnect: {err}"));
        }

        if let Some(hook) = &self.on_disconnect {
            if panic::catch_unwind(AssertUnwindSafe(|| hook(path))).is_err() {
                self.log(Level::ERROR, "disconnect hook panicked");
            }
        }
    }
}

/// Full-duplex framed link: a reader task dispatching inbound frames, a
/// paced writer task draining the send queue, and a watchdog following the
/// device node.
///
/// Built with [`EngineBuilder`]. Shareable across threads; every method takes
/// `&self`. Dropping the engine closes it.
pub struct DuplexEngine<P: PortHandle> {
    shared: Arc<Shared<P>>,
    watchdog: Mutex<Option<TaskHandle<()>>>,
}

impl<P: PortHandle> DuplexEngine<P> {
    /// Build a frame and send it.
    ///
    /// `fill` writes the mission tag and payload into a zeroed frame whose
    /// markers are already set. With the writer enabled the frame is queued;
    /// otherwise it is written before this returns. Concurrent sends never
    /// interleave.
    pub fn send<F>(&self, fill: F) -> Result<Delivery>
    where
        F: FnOnce(&mut FrameBuf<'_>) -> serialframe_frame::Result<()>,
    {
        let shared = &*self.shared;
        if shared.is_closed() {
            return Err(EngineError::Closed);
        }

        let mut outbound = relock(&shared.outbound);
        shared.layout.fill(&mut outbound, fill)?;

        if shared.writer_running.load(Ordering::Acquire) {
            return match shared.queue.push_frame(&outbound) {
                Ok(()) => Ok(Delivery::Queued),
                Err(CloseReason::Overflow) => Err(shared.overflow_error()),
                Err(CloseReason::Shutdown) => Err(EngineError::Closed),
            };
        }
        if shared.queue.is_overflowed() {
            return Err(shared.overflow_error());
        }

        let written = shared.writer.write_frame(&outbound)?;
        if written < outbound.len() {
            return Err(EngineError::ShortWrite {
                written,
                expected: outbound.len(),
            });
        }
        shared.trace_frame("tx", &outbound);
        Ok(Delivery::Written)
    }

    /// [`send`](Self::send) with `mission` as the fill step.
    pub fn send_mission<M: Mission + ?Sized>(&self, mission: &M) -> Result<Delivery> {
        self.send(|buf| mission.encode(buf))
    }

    /// Write one JustFloat telemetry packet immediately, bypassing the paced
    /// writer.
    pub fn send_telemetry(&self, values: &[f32]) -> Result<()> {
        let shared = &*self.shared;
        if shared.is_closed() {
            return Err(EngineError::Closed);
        }

        let mut packet = BytesMut::with_capacity(values.len() * 4 + 4);
        encode_just_float(values, &mut packet)?;

        let _outbound = relock(&shared.outbound);
        let written = shared.writer.write_frame(&packet)?;
        if written < packet.len() {
            return Err(EngineError::ShortWrite {
                written,
                expected: packet.len(),
            });
        }
        shared.trace_frame("tx telemetry", &packet);
        Ok(())
    }

    /// Start the reader task. A no-op if it is already running.
    pub fn enable_reader(&self) -> Result<()> {
        self.shared.enable_reader()
    }

    /// Stop the reader task. Unframed bytes stay buffered for the next
    /// [`enable_reader`](Self::enable_reader).
    pub fn disable_reader(&self) -> Result<()> {
        self.shared.disable_reader()
    }

    /// Start the paced writer. After an overflow this discards the stale
    /// backlog and restarts the task.
    pub fn enable_writer(&self) -> Result<()> {
        let _outbound = relock(&self.shared.outbound);
        self.shared.enable_writer()
    }

    /// Stop the paced writer. Frames still queued are written immediately;
    /// later sends go straight to the port.
    pub fn disable_writer(&self) -> Result<()> {
        let _outbound = relock(&self.shared.outbound);
        self.shared.disable_writer()
    }

    pub fn reader_state(&self) -> TaskState {
        self.shared.reader_state()
    }

    pub fn writer_state(&self) -> TaskState {
        self.shared.writer_state()
    }

    /// Bytes queued for the writer and not yet taken by it.
    pub fn pending_bytes(&self) -> usize {
        self.shared.queue.len()
    }

    /// Queued bytes plus those the writer has taken but not yet written.
    pub fn unsent_bytes(&self) -> usize {
        self.shared.queue.unsent()
    }

    /// Block until the paced writer has put every queued frame on the wire.
    ///
    /// Returns false if `timeout` runs out first, or at once if the writer
    /// has faulted with frames still queued.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.shared.queue.wait_idle(timeout)
    }

    /// Continue on a freshly opened `port` for the same device, typically
    /// after the device came back from a disconnect.
    ///
    /// Both tasks must be disabled, as the watchdog leaves them. Unframed
    /// bytes from the old connection are dropped and tasks are not
    /// restarted. From here on the watchdog treats the link as online, so
    /// the next disappearance fires the disconnect hook again.
    pub fn reattach(&self, port: P) -> Result<()> {
        let shared = &*self.shared;
        if shared.is_closed() {
            return Err(EngineError::Closed);
        }
        let path = shared.link.device_path();
        if port.device_path() != path {
            return Err(EngineError::InvalidConfig(format!(
                "cannot reattach {} to an engine on {}",
                port.device_path().display(),
                path.display()
            )));
        }
        let write_port = port.try_clone().map_err(EngineError::PortOpen)?;

        let _outbound = relock(&shared.outbound);
        if shared.writer_running.load(Ordering::Acquire) {
            return Err(EngineError::TaskRunning(TaskKind::Writer));
        }
        let mut slot = relock(&shared.reader_task);
        match &mut *slot {
            ReaderSlot::Idle(reader) => drop(reader.replace_port(port)),
            ReaderSlot::Running(_) => return Err(EngineError::TaskRunning(TaskKind::Reader)),
            ReaderSlot::Lost => return Err(EngineError::TaskLost(TaskKind::Reader)),
        }
        drop(shared.writer.replace_port(write_port));
        shared.rearm_watchdog.store(true, Ordering::Release);
        drop(slot);

        shared.log(Level::INFO, &format!("reattached to {}", path.display()));
        Ok(())
    }

    /// Engine open and device node present.
    pub fn is_online(&self) -> bool {
        !self.shared.is_closed() && self.shared.link.is_online()
    }

    pub fn device_path(&self) -> &Path {
        self.shared.link.device_path()
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.shared.layout
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Stop every task and release the port. Later calls return an empty
    /// report.
    pub fn close(&self) -> CloseReport {
        let shared = &*self.shared;
        if shared.closed.swap(true, Ordering::AcqRel) {
            return CloseReport::default();
        }
        let timeout = shared.config.stop_timeout;
        let mut report = CloseReport::default();

        let watchdog = relock(&self.watchdog).take();
        match watchdog {
            // Closing from the disconnect hook: the watchdog sees its flag
            // once the hook returns and exits on its own.
            Some(handle) if handle.is_current() => handle.request_stop(),
            Some(handle) => {
                if let Stopped::TimedOut(handle) = handle.stop(timeout) {
                    report.stalled.push(handle.kind());
                    *relock(&self.watchdog) = Some(handle);
                }
            }
            None => {}
        }

        {
            let _outbound = relock(&shared.outbound);
            match shared.halt_writer() {
                Ok(unsent) => report.discarded_bytes += unsent.len(),
                Err(_) => report.stalled.push(TaskKind::Writer),
            }
            report.discarded_bytes += shared.queue.close();
        }

        if let Err(EngineError::StopTimeout { task, .. }) = shared.disable_reader() {
            report.stalled.push(task);
        }

        shared.link.mark_closed();

        if report.is_clean() {
            shared.log(
                Level::INFO,
                &format!(
                    "engine closed; {} unsent bytes discarded",
                    report.discarded_bytes
                ),
            );
        } else {
            let stalled: Vec<_> = report.stalled.iter().map(TaskKind::as_str).collect();
            shared.log(
                Level::WARN,
                &format!("engine closed; tasks did not stop: {}", stalled.join(", ")),
            );
        }
        report
    }
}

impl DuplexEngine<SerialLink> {
    /// Open the device again with `port` and [`reattach`](Self::reattach)
    /// to it.
    pub fn reopen(&self, port: &PortConfig) -> Result<()> {
        let link = SerialLink::open(port).map_err(EngineError::PortOpen)?;
        self.reattach(link)
    }
}

impl<P: PortHandle> Drop for DuplexEngine<P> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<P: PortHandle> fmt::Debug for DuplexEngine<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplexEngine")
            .field("device", &self.device_path())
            .field("frame_len", &self.shared.layout.len())
            .field("reader", &self.reader_state())
            .field("writer", &self.writer_state())
            .field("pending_bytes", &self.pending_bytes())
            .finish()
    }
}

/// Configures and starts a [`DuplexEngine`].
pub struct EngineBuilder {
    config: EngineConfig,
    dispatch: DispatchTable,
    sink: Arc<dyn LogSink>,
    on_disconnect: Option<DisconnectHook>,
    reader: bool,
    writer: bool,
}

impl EngineBuilder {
    /// Builder with `config`, both tasks enabled and logging through
    /// [`TracingSink`].
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            dispatch: DispatchTable::new(),
            sink: Arc::new(TracingSink),
            on_disconnect: None,
            reader: true,
            writer: true,
        }
    }

    pub fn dispatch(mut self, dispatch: DispatchTable) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Called from the watchdog once per online → offline transition, after
    /// both tasks are disabled. The hook may close the engine or
    /// [`reattach`](DuplexEngine::reattach) it.
    pub fn on_disconnect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        self.on_disconnect = Some(Box::new(hook));
        self
    }

    /// Start the reader task with the engine. Default: true.
    pub fn enable_reader(mut self, enabled: bool) -> Self {
        self.reader = enabled;
        self
    }

    /// Start the paced writer with the engine. When false, sends are written
    /// synchronously. Default: true.
    pub fn enable_writer(mut self, enabled: bool) -> Self {
        self.writer = enabled;
        self
    }

    /// Open the serial device described by `port` and start on it.
    pub fn open(self, port: &PortConfig) -> Result<DuplexEngine<SerialLink>> {
        self.check()?;
        let link = SerialLink::open(port).map_err(EngineError::PortOpen)?;
        self.start(link)
    }

    fn check(&self) -> Result<FrameLayout> {
        let layout = self.config.validate()?;
        if let Some((tag, min_len)) = self.dispatch.check_frame_len(layout.len()) {
            return Err(EngineError::InvalidConfig(format!(
                "handler for mission 0x{tag:02x} needs frames of at least {min_len} bytes, \
                 configured {}",
                layout.len()
            )));
        }
        Ok(layout)
    }

    /// Start on an already open port.
    pub fn start<P: PortHandle>(self, port: P) -> Result<DuplexEngine<P>> {
        let layout = self.check()?;
        let channel = SerialChannel::new(port, layout, self.config.ring_capacity)
            .map_err(|err| match err {
                FrameError::Transport(err) => EngineError::PortOpen(err),
                other => EngineError::Frame(other),
            })?;
        let (reader, writer, link) = channel.split();

        let shared = Arc::new(Shared {
            overflow_limit: self.config.overflow_limit(),
            outbound: Mutex::new(Vec::with_capacity(layout.len())),
            config: self.config,
            layout,
            writer,
            link,
            queue: PendingWriteQueue::new(),
            dispatch: self.dispatch,
            sink: self.sink,
            on_disconnect: self.on_disconnect,
            reader_task: Mutex::new(ReaderSlot::Idle(reader)),
            writer_task: Mutex::new(WriterSlot::Idle),
            reader_running: Arc::new(AtomicBool::new(false)),
            writer_running: Arc::new(AtomicBool::new(false)),
            rearm_watchdog: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let initially_online = shared.link.is_online();
        let watchdog_running = Arc::new(AtomicBool::new(false));
        let watchdog = {
            let shared = Arc::clone(&shared);
            let running = Arc::clone(&watchdog_running);
            TaskHandle::spawn(TaskKind::Watchdog, Arc::clone(&watchdog_running), move || {
                shared.watchdog_loop(&running, initially_online)
            })?
        };

        let engine = DuplexEngine {
            shared,
            watchdog: Mutex::new(Some(watchdog)),
        };
        if self.reader {
            engine.enable_reader()?;
        }
        if self.writer {
            engine.enable_writer()?;
        }

        engine.shared.log(
            Level::INFO,
            &format!(
                "engine started on {}: {}-byte frames at {} Hz",
                engine.device_path().display(),
                layout.len(),
                engine.shared.config.send_frequency_hz
            ),
        );
        Ok(engine)
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("dispatch", &self.dispatch)
            .field("reader", &self.reader)
            .field("writer", &self.writer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serialframe_transport::MemoryPort;

    use super::*;
    use crate::log::NullSink;

    fn quiet(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config).log_sink(NullSink)
    }

    fn port() -> (MemoryPort, MemoryPort) {
        let (local, remote) = MemoryPort::pair("/nonexistent/sf-local", "/nonexistent/sf-remote");
        (local.with_read_timeout(Duration::from_millis(10)), remote)
    }

    #[test]
    fn pause_stops_early_when_flag_clears() {
        let running = AtomicBool::new(false);
        let started = Instant::now();
        assert!(!pause(&running, Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));

        let running = AtomicBool::new(true);
        assert!(pause(&running, Duration::from_millis(5)));
    }

    #[test]
    fn builder_starts_requested_tasks_only() {
        let (local, _remote) = port();
        let engine = quiet(EngineConfig::default())
            .enable_reader(false)
            .enable_writer(false)
            .start(local)
            .unwrap();
        assert_eq!(engine.reader_state(), TaskState::Disabled);
        assert_eq!(engine.writer_state(), TaskState::Disabled);

        engine.enable_reader().unwrap();
        engine.enable_reader().unwrap();
        assert_eq!(engine.reader_state(), TaskState::Enabled);
        assert!(engine.close().is_clean());
    }

    #[test]
    fn closed_engine_refuses_everything() {
        let (local, _remote) = port();
        let engine = quiet(EngineConfig::default()).start(local).unwrap();
        assert!(engine.close().is_clean());
        assert_eq!(engine.close(), CloseReport::default());

        assert!(engine.is_closed());
        assert!(!engine.is_online());
        assert!(matches!(engine.send(|_| Ok(())), Err(EngineError::Closed)));
        assert!(matches!(engine.enable_writer(), Err(EngineError::Closed)));
        assert!(matches!(engine.enable_reader(), Err(EngineError::Closed)));
    }

    #[test]
    fn unrouted_and_panicking_frames_keep_reader_alive() {
        let (local, mut remote) = port();
        let hits = Arc::new(AtomicUsize::new(0));
        let dispatch = {
            let hits = Arc::clone(&hits);
            DispatchTable::new()
                .on(0x05, |_: &Frame| panic!("handler bug"))
                .on(0x06, move |_: &Frame| {
                    hits.fetch_add(1, Ordering::SeqCst);
                })
        };
        let engine = quiet(EngineConfig::default())
            .dispatch(dispatch)
            .start(local)
            .unwrap();

        for tag in [0x04, 0x05, 0x06] {
            remote.write(&[b'?', b'!', tag, 0, 0, 0, 0, b'!']).unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while hits.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(engine.reader_state(), TaskState::Enabled);
    }
}
