//! Bytes waiting for the paced writer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Why the queue refuses new bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The writer found more than it may send in one drain and stopped.
    Overflow,
    /// The engine shut down.
    Shutdown,
}

/// Result of one [`PendingWriteQueue::wait_drain`].
#[derive(Debug, PartialEq, Eq)]
pub enum Drain {
    /// Everything that was queued, in enqueue order.
    Bytes(Vec<u8>),
    /// Woke with nothing to send (timeout, stop request or spurious wakeup).
    Idle,
    /// The snapshot exceeded the limit. The bytes stay queued and the queue
    /// is closed until [`reopen`](PendingWriteQueue::reopen).
    Overflow { pending: usize },
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    bytes: VecDeque<u8>,
    /// Drained by the writer but not yet on the wire.
    in_flight: usize,
    closed: Option<CloseReason>,
}

impl QueueState {
    fn unsent(&self) -> usize {
        self.bytes.len() + self.in_flight
    }
}

/// Multi-producer, single-consumer byte FIFO with a wakeup signal.
///
/// Bytes handed out by [`wait_drain`](Self::wait_drain) count as in flight
/// until the writer reports them with [`mark_sent`](Self::mark_sent) or
/// [`settle`](Self::settle), so [`wait_idle`](Self::wait_idle) only returns
/// once the last byte has been transmitted.
#[derive(Debug, Default)]
pub struct PendingWriteQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    idle: Condvar,
}

impl PendingWriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one encoded frame and wake the writer.
    pub fn push_frame(&self, frame: &[u8]) -> Result<(), CloseReason> {
        let mut state = self.lock();
        if let Some(reason) = state.closed {
            return Err(reason);
        }
        state.bytes.extend(frame);
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    /// Block up to `wait` for bytes, then take them all.
    ///
    /// Returns early once `running` is cleared and [`wake`](Self::wake) is
    /// called. A snapshot larger than `limit` closes the queue instead.
    pub fn wait_drain(&self, wait: Duration, limit: usize, running: &AtomicBool) -> Drain {
        let guard = self.lock();
        let (mut state, _) = self
            .ready
            .wait_timeout_while(guard, wait, |s| {
                s.bytes.is_empty() && s.closed.is_none() && running.load(Ordering::Acquire)
            })
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if state.closed.is_some() {
            return Drain::Closed;
        }
        if state.bytes.is_empty() {
            return Drain::Idle;
        }
        let pending = state.bytes.len();
        if pending > limit {
            state.closed = Some(CloseReason::Overflow);
            return Drain::Overflow { pending };
        }
        state.in_flight += pending;
        Drain::Bytes(state.bytes.drain(..).collect())
    }

    /// The writer put `count` drained bytes on the wire.
    pub fn mark_sent(&self, count: usize) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(count);
        if state.unsent() == 0 {
            self.idle.notify_all();
        }
    }

    /// The writer stopped; whatever it still held is no longer in flight.
    pub fn settle(&self) {
        let mut state = self.lock();
        state.in_flight = 0;
        if state.bytes.is_empty() {
            self.idle.notify_all();
        }
    }

    /// Block up to `timeout` until nothing is queued or in flight.
    ///
    /// Returns false on timeout, and at once if the queue is closed with
    /// bytes still in it.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (state, _) = self
            .idle
            .wait_timeout_while(guard, timeout, |s| s.unsent() > 0 && s.closed.is_none())
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.unsent() == 0
    }

    /// Wake a blocked [`wait_drain`](Self::wait_drain) so it rechecks its
    /// run flag.
    pub fn wake(&self) {
        let _state = self.lock();
        self.ready.notify_all();
    }

    /// Take every queued byte, open or closed.
    pub fn take_all(&self) -> Vec<u8> {
        let mut state = self.lock();
        let bytes = state.bytes.drain(..).collect();
        if state.in_flight == 0 {
            self.idle.notify_all();
        }
        bytes
    }

    /// Refuse further bytes. Returns how many were discarded.
    pub fn close(&self) -> usize {
        let mut state = self.lock();
        state.closed = Some(CloseReason::Shutdown);
        let discarded = state.bytes.len();
        state.bytes.clear();
        state.in_flight = 0;
        drop(state);
        self.ready.notify_all();
        self.idle.notify_all();
        discarded
    }

    /// Accept bytes again after an overflow, dropping the stale backlog.
    /// Returns how many bytes were discarded. A shut-down queue stays closed.
    pub fn reopen(&self) -> usize {
        let mut state = self.lock();
        if state.closed != Some(CloseReason::Overflow) {
            return 0;
        }
        state.closed = None;
        let discarded = state.bytes.len();
        state.bytes.clear();
        self.idle.notify_all();
        discarded
    }

    pub fn len(&self) -> usize {
        self.lock().bytes.len()
    }

    /// Queued plus in-flight bytes.
    pub fn unsent(&self) -> usize {
        self.lock().unsent()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().bytes.is_empty()
    }

    pub fn is_overflowed(&self) -> bool {
        self.lock().closed == Some(CloseReason::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use super::*;

    const WAIT: Duration = Duration::from_millis(50);

    #[test]
    fn drains_in_enqueue_order() {
        let queue = PendingWriteQueue::new();
        let running = AtomicBool::new(true);
        queue.push_frame(&[1, 2]).unwrap();
        queue.push_frame(&[3]).unwrap();
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.wait_drain(WAIT, 10, &running), Drain::Bytes(vec![1, 2, 3]));
        assert!(queue.is_empty());
        assert_eq!(queue.wait_drain(WAIT, 10, &running), Drain::Idle);
    }

    #[test]
    fn overflow_keeps_bytes_and_closes() {
        let queue = PendingWriteQueue::new();
        let running = AtomicBool::new(true);
        queue.push_frame(&[0; 16]).unwrap();
        queue.push_frame(&[0; 8]).unwrap();

        assert_eq!(
            queue.wait_drain(WAIT, 16, &running),
            Drain::Overflow { pending: 24 }
        );
        assert!(queue.is_overflowed());
        assert_eq!(queue.len(), 24);
        assert_eq!(queue.push_frame(&[1]), Err(CloseReason::Overflow));
        assert_eq!(queue.wait_drain(WAIT, 16, &running), Drain::Closed);

        assert_eq!(queue.reopen(), 24);
        assert!(!queue.is_overflowed());
        queue.push_frame(&[9]).unwrap();
        assert_eq!(queue.wait_drain(WAIT, 16, &running), Drain::Bytes(vec![9]));
    }

    #[test]
    fn exactly_the_limit_is_not_overflow() {
        let queue = PendingWriteQueue::new();
        let running = AtomicBool::new(true);
        queue.push_frame(&[7; 16]).unwrap();
        assert_eq!(queue.wait_drain(WAIT, 16, &running), Drain::Bytes(vec![7; 16]));
    }

    #[test]
    fn push_wakes_waiting_writer() {
        let queue = Arc::new(PendingWriteQueue::new());
        let running = Arc::new(AtomicBool::new(true));
        let writer = {
            let queue = Arc::clone(&queue);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let started = Instant::now();
                let drained = queue.wait_drain(Duration::from_secs(5), 100, &running);
                (drained, started.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(20));
        queue.push_frame(&[5]).unwrap();
        let (drained, waited) = writer.join().unwrap();
        assert_eq!(drained, Drain::Bytes(vec![5]));
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn stop_request_cuts_wait_short() {
        let queue = Arc::new(PendingWriteQueue::new());
        let running = Arc::new(AtomicBool::new(true));
        let writer = {
            let queue = Arc::clone(&queue);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let started = Instant::now();
                let drained = queue.wait_drain(Duration::from_secs(5), 100, &running);
                (drained, started.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(20));
        running.store(false, Ordering::Release);
        queue.wake();
        let (drained, waited) = writer.join().unwrap();
        assert_eq!(drained, Drain::Idle);
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn shutdown_discards_and_stays_closed() {
        let queue = PendingWriteQueue::new();
        queue.push_frame(&[1, 2, 3]).unwrap();
        assert_eq!(queue.close(), 3);
        assert_eq!(queue.push_frame(&[4]), Err(CloseReason::Shutdown));
        assert_eq!(queue.reopen(), 0);
        assert_eq!(queue.push_frame(&[4]), Err(CloseReason::Shutdown));
    }

    #[test]
    fn take_all_empties_queue() {
        let queue = PendingWriteQueue::new();
        queue.push_frame(&[1, 2]).unwrap();
        queue.push_frame(&[3]).unwrap();
        assert_eq!(queue.take_all(), vec![1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn drained_bytes_stay_unsent_until_marked() {
        let queue = PendingWriteQueue::new();
        let running = AtomicBool::new(true);
        queue.push_frame(&[1; 8]).unwrap();
        queue.push_frame(&[2; 8]).unwrap();

        assert!(matches!(queue.wait_drain(WAIT, 64, &running), Drain::Bytes(_)));
        assert!(queue.is_empty());
        assert_eq!(queue.unsent(), 16);
        assert!(!queue.wait_idle(Duration::from_millis(10)));

        queue.mark_sent(8);
        assert_eq!(queue.unsent(), 8);
        queue.mark_sent(8);
        assert!(queue.wait_idle(Duration::ZERO));
    }

    #[test]
    fn wait_idle_wakes_when_last_chunk_is_sent() {
        let queue = Arc::new(PendingWriteQueue::new());
        let running = AtomicBool::new(true);
        queue.push_frame(&[3; 8]).unwrap();
        assert!(matches!(queue.wait_drain(WAIT, 64, &running), Drain::Bytes(_)));

        let writer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                queue.mark_sent(8);
            })
        };
        let started = Instant::now();
        assert!(queue.wait_idle(Duration::from_secs(5)));
        assert!(started.elapsed() >= Duration::from_millis(20));
        writer.join().unwrap();
    }

    #[test]
    fn settle_and_overflow_end_the_wait() {
        let queue = PendingWriteQueue::new();
        let running = AtomicBool::new(true);
        queue.push_frame(&[4; 8]).unwrap();
        assert!(matches!(queue.wait_drain(WAIT, 64, &running), Drain::Bytes(_)));
        queue.settle();
        assert!(queue.wait_idle(Duration::ZERO));

        queue.push_frame(&[5; 24]).unwrap();
        assert_eq!(queue.wait_drain(WAIT, 16, &running), Drain::Overflow { pending: 24 });
        let started = Instant::now();
        assert!(!queue.wait_idle(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
