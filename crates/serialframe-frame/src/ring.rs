//! Fixed-capacity circular byte FIFO.
//!
//! Overflow and underflow are deliberately silent: a push into a full buffer
//! drops the new byte, and a pop or peek past the end yields [`SENTINEL`].
//! Callers observe both conditions only through [`ByteRingBuffer::len`] and
//! the returned values.

/// Value returned by `pop` and `peek` when no byte is available.
pub const SENTINEL: u8 = 0;

/// Default capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 100;

/// Circular FIFO of bytes with random-access peek.
///
/// Storage holds `capacity + 1` slots so that `head == tail` always means
/// empty. Not synchronized: the buffer belongs to whichever side reads the
/// link.
#[derive(Debug, Clone)]
pub struct ByteRingBuffer {
    slots: Box<[u8]>,
    head: usize,
    tail: usize,
}

impl ByteRingBuffer {
    /// Create an empty buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0u8; capacity + 1].into_boxed_slice(),
            head: 0,
            tail: 0,
        }
    }

    /// Maximum number of bytes the buffer holds.
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Number of bytes currently stored.
    pub fn len(&self) -> usize {
        let modulus = self.slots.len();
        (self.tail + modulus - self.head) % modulus
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Append a byte. Dropped without notice when the buffer is full.
    pub fn push(&mut self, byte: u8) {
        if self.is_full() {
            return;
        }
        self.slots[self.tail] = byte;
        self.tail = (self.tail + 1) % self.slots.len();
    }

    /// Append every byte of `bytes`, dropping whatever does not fit.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// Remove and return the oldest byte, or [`SENTINEL`] when empty.
    pub fn pop(&mut self) -> u8 {
        if self.is_empty() {
            return SENTINEL;
        }
        let byte = self.slots[self.head];
        self.head = (self.head + 1) % self.slots.len();
        byte
    }

    /// The `index`-th byte from the oldest, or [`SENTINEL`] past the end.
    pub fn peek(&self, index: usize) -> u8 {
        if index >= self.len() {
            return SENTINEL;
        }
        self.slots[(self.head + index) % self.slots.len()]
    }

    /// Discard every stored byte.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }
}

impl Default for ByteRingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut ring = ByteRingBuffer::new(8);
        for b in 1..=8u8 {
            ring.push(b);
        }
        let popped: Vec<u8> = (0..8).map(|_| ring.pop()).collect();
        assert_eq!(popped, (1..=8u8).collect::<Vec<_>>());
        assert!(ring.is_empty());
    }

    #[test]
    fn overflow_drops_newest() {
        let mut ring = ByteRingBuffer::new(3);
        ring.push(10);
        ring.push(20);
        ring.push(30);
        assert!(ring.is_full());

        ring.push(40);
        assert_eq!(ring.len(), 3);
        assert_eq!([ring.pop(), ring.pop(), ring.pop()], [10, 20, 30]);
    }

    #[test]
    fn underflow_returns_sentinel_without_moving() {
        let mut ring = ByteRingBuffer::new(4);
        ring.push(7);
        ring.pop();
        let (head, tail) = (ring.head, ring.tail);

        assert_eq!(ring.pop(), SENTINEL);
        assert_eq!((ring.head, ring.tail), (head, tail));
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn wraps_around_storage() {
        let mut ring = ByteRingBuffer::new(4);
        ring.push(1);
        ring.push(2);
        ring.push(3);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.pop(), 1);

        ring.push(4);
        assert_eq!(ring.len(), 3);
        assert_eq!([ring.peek(0), ring.peek(1), ring.peek(2)], [2, 3, 4]);

        // Cycle through the backing storage several times.
        let mut model: std::collections::VecDeque<u8> = [2, 3, 4].into_iter().collect();
        for round in 0..10u8 {
            ring.push(100 + round);
            model.push_back(100 + round);
            assert_eq!(ring.pop(), model.pop_front().unwrap());
            assert_eq!(ring.len(), model.len());
        }
    }

    #[test]
    fn peek_past_end_is_sentinel() {
        let mut ring = ByteRingBuffer::new(4);
        ring.push(9);
        assert_eq!(ring.peek(0), 9);
        assert_eq!(ring.peek(1), SENTINEL);
        assert_eq!(ring.peek(100), SENTINEL);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn default_capacity() {
        let ring = ByteRingBuffer::default();
        assert_eq!(ring.capacity(), DEFAULT_CAPACITY);
        assert!(ring.is_empty());
    }

    #[test]
    fn extend_stops_at_capacity() {
        let mut ring = ByteRingBuffer::new(5);
        ring.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.peek(4), 5);
    }

    #[test]
    fn clear_empties() {
        let mut ring = ByteRingBuffer::new(5);
        ring.extend_from_slice(&[1, 2, 3]);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.pop(), SENTINEL);
    }
}
