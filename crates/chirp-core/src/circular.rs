//! Lock-free single-producer/single-consumer circular buffer.
//!
//! [`CircularBuffer`] moves discrete messages (commands, fully built voices)
//! between exactly two threads without a mutex. It never blocks and never
//! allocates after construction, so the consuming end can live inside an audio
//! callback.
//!
//! # Positions
//!
//! The read and write positions are counters in `[0, 2 * capacity)`. Each is
//! stored by exactly one thread: the consumer advances `read`, the producer
//! advances `write`. The slot index of a counter is `counter mod capacity`, and
//! the number of unread items is the distance between the two counters. That
//! distance tells "empty" (0) from "full" (`capacity`) when both counters point
//! at the same slot, so no shared empty flag is needed.
//!
//! Every operation classifies the buffer into one of four states from a single
//! snapshot of both counters, and all extents are derived from that state:
//!
//! | State | Readable | Writable |
//! |-------|----------|----------|
//! | empty | none | write slot to end, then start to write slot |
//! | read before write | read slot to write slot | write slot to end, then start to read slot |
//! | write before read | read slot to end, then start to write slot | write slot to read slot |
//! | full | read slot to end, then start to read slot | none |
//!
//! # Ownership on the hot path
//!
//! Pushing moves the item into its slot and hands the value that previously
//! occupied the slot back to the producer, which drops it. Popping swaps the
//! slot with the caller's value, so the consumer never runs a destructor for
//! data it did not already own.
//!
//! # Example
//!
//! ```rust
//! use chirp_core::CircularBuffer;
//!
//! let buffer = CircularBuffer::<char>::new(4).unwrap();
//! let (mut tx, mut rx) = buffer.split();
//!
//! let producer = std::thread::spawn(move || {
//!     for c in ['a', 'b', 'c'] {
//!         while tx.try_push(c).is_err() {
//!             std::thread::yield_now();
//!         }
//!     }
//! });
//!
//! let mut received = Vec::new();
//! while received.len() < 3 {
//!     if let Some(c) = rx.pop() {
//!         received.push(c);
//!     }
//! }
//! producer.join().unwrap();
//! assert_eq!(received, ['a', 'b', 'c']);
//! ```

// Slot access through `UnsafeCell` is confined to this module.
#![allow(unsafe_code)]

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::fmt;
use core::mem;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::CoreError;

/// Logical state of the buffer for one snapshot of both counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Empty,
    ReadBeforeWrite,
    WriteBeforeRead,
    Full,
}

/// Both counters plus everything derived from them.
#[derive(Clone, Copy, Debug)]
struct Snapshot {
    read_slot: usize,
    write_slot: usize,
    state: State,
}

impl Snapshot {
    /// Contiguous and wrapped readable runs.
    fn readable(&self, capacity: usize) -> (usize, usize) {
        match self.state {
            State::Empty => (0, 0),
            State::Full => (capacity - self.read_slot, self.read_slot),
            State::ReadBeforeWrite => (self.write_slot - self.read_slot, 0),
            State::WriteBeforeRead => (capacity - self.read_slot, self.write_slot),
        }
    }

    /// Contiguous and wrapped writable runs.
    fn writable(&self, capacity: usize) -> (usize, usize) {
        match self.state {
            State::Full => (0, 0),
            State::Empty => (capacity - self.write_slot, self.write_slot),
            State::ReadBeforeWrite => (capacity - self.write_slot, self.read_slot),
            State::WriteBeforeRead => (self.read_slot - self.write_slot, 0),
        }
    }
}

/// Fixed-capacity lock-free FIFO for one producer and one consumer.
///
/// Owning the buffer gives exclusive access, so the `&mut self` methods are
/// usable directly from a single thread. To share it between two threads, call
/// [`split`](Self::split) and move each end to its thread; the ends cannot be
/// cloned, which rules out a second producer or consumer.
///
/// `T: Default` is required so every slot holds a valid value from the start
/// and so batch pops can leave a default behind. Keep `T::default()` free of
/// allocation when the consumer runs on a real-time thread.
///
/// # Example
///
/// ```rust
/// use chirp_core::CircularBuffer;
///
/// let mut buffer = CircularBuffer::new(4).unwrap();
/// assert!(buffer.try_push('A').is_ok());
/// assert!(buffer.try_push('B').is_ok());
/// assert_eq!(buffer.len(), 2);
///
/// let mut out = ' ';
/// assert!(buffer.try_pop(&mut out));
/// assert_eq!(out, 'A');
/// ```
pub struct CircularBuffer<T> {
    slots: Box<[UnsafeCell<T>]>,
    /// Advanced only by the consumer.
    read: AtomicUsize,
    /// Advanced only by the producer.
    write: AtomicUsize,
}

// SAFETY: slots are only reached through `push_*`/`pop_*`, which require
// either `&mut CircularBuffer` or the unique `Producer`/`Consumer` handle.
// A slot is written by the producer only while it lies outside the readable
// range published with Release on `write`, and taken by the consumer only
// while it lies inside that range, so no slot is accessed by both threads at
// once.
unsafe impl<T: Send> Sync for CircularBuffer<T> {}

impl<T: Default> CircularBuffer<T> {
    /// Create a buffer with `capacity` slots, each holding `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Capacity`] when `capacity < 2`.
    pub fn new(capacity: usize) -> Result<Self, CoreError> {
        if capacity < 2 {
            return Err(CoreError::Capacity(capacity));
        }

        let slots: Vec<UnsafeCell<T>> = (0..capacity)
            .map(|_| UnsafeCell::new(T::default()))
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(capacity, "circular buffer allocated");

        Ok(Self {
            slots: slots.into_boxed_slice(),
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        })
    }

    /// Pop one item by value, leaving `T::default()` in its slot.
    pub fn pop(&mut self) -> Option<T> {
        // SAFETY: `&mut self` excludes any other producer or consumer.
        unsafe { self.take_one() }
    }

    /// Drain up to `max` items (0 = all available) into `out`, replacing its
    /// contents. Items arrive in FIFO order.
    pub fn try_pop_batch(&mut self, out: &mut Vec<T>, max: usize) {
        // SAFETY: `&mut self` excludes any other producer or consumer.
        unsafe { self.pop_batch_raw(out, max) }
    }
}

impl<T> CircularBuffer<T> {
    /// Number of slots, fixed at construction.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of unread items.
    pub fn len(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        self.distance(read, write)
    }

    /// Alias of [`len`](Self::len).
    pub fn size(&self) -> usize {
        self.len()
    }

    /// Whether there is nothing to read.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether there is no room to write.
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Push one item, or hand it back if the buffer is full.
    pub fn try_push(&mut self, item: T) -> Result<(), T> {
        // SAFETY: `&mut self` excludes any other producer or consumer.
        unsafe { self.push_raw(item) }
    }

    /// Push as many items from the front of `items` as fit and remove them
    /// from the vector. Returns how many were written; the rest stay in
    /// `items` in their original order.
    pub fn try_push_batch(&mut self, items: &mut Vec<T>) -> usize {
        // SAFETY: `&mut self` excludes any other producer or consumer.
        unsafe { self.push_batch_raw(items) }
    }

    /// Swap the oldest item into `out`. Returns `false` if the buffer is empty.
    ///
    /// The previous contents of `out` are parked in the freed slot and dropped
    /// later by the producer.
    pub fn try_pop(&mut self, out: &mut T) -> bool {
        // SAFETY: `&mut self` excludes any other producer or consumer.
        unsafe { self.pop_into(out) }
    }

    /// Split into the producer and consumer ends.
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        let shared = Arc::new(self);
        (
            Producer {
                buffer: Arc::clone(&shared),
            },
            Consumer { buffer: shared },
        )
    }

    #[inline]
    fn wrap(&self) -> usize {
        2 * self.capacity()
    }

    #[inline]
    fn distance(&self, read: usize, write: usize) -> usize {
        (write + self.wrap() - read) % self.wrap()
    }

    #[inline]
    fn slot(&self, counter: usize) -> usize {
        if counter >= self.capacity() {
            counter - self.capacity()
        } else {
            counter
        }
    }

    #[inline]
    fn advance(&self, counter: usize, count: usize) -> usize {
        (counter + count) % self.wrap()
    }

    fn classify(&self, read: usize, write: usize) -> Snapshot {
        let len = self.distance(read, write);
        let read_slot = self.slot(read);
        let write_slot = self.slot(write);

        let state = if len == 0 {
            State::Empty
        } else if len == self.capacity() {
            State::Full
        } else if read_slot < write_slot {
            State::ReadBeforeWrite
        } else {
            State::WriteBeforeRead
        };

        Snapshot {
            read_slot,
            write_slot,
            state,
        }
    }

    /// Slot index for the `offset`-th element of a run starting at `start`.
    #[inline]
    fn run_slot(start: usize, linear: usize, offset: usize) -> usize {
        if offset < linear {
            start + offset
        } else {
            offset - linear
        }
    }

    /// # Safety
    ///
    /// The caller must be the only thread acting as producer.
    unsafe fn push_raw(&self, item: T) -> Result<(), T> {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        let snapshot = self.classify(read, write);

        if snapshot.state == State::Full {
            return Err(item);
        }

        // SAFETY: the write slot is outside the readable range, and only the
        // producer touches it until `write` is published below.
        let parked = unsafe { mem::replace(&mut *self.slots[snapshot.write_slot].get(), item) };
        self.write.store(self.advance(write, 1), Ordering::Release);
        drop(parked);
        Ok(())
    }

    /// # Safety
    ///
    /// The caller must be the only thread acting as producer.
    unsafe fn push_batch_raw(&self, items: &mut Vec<T>) -> usize {
        if items.is_empty() {
            return 0;
        }

        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        let snapshot = self.classify(read, write);
        let (linear, wrapped) = snapshot.writable(self.capacity());
        let count = items.len().min(linear + wrapped);

        if count == 0 {
            return 0;
        }

        for (offset, item) in items.drain(..count).enumerate() {
            let index = Self::run_slot(snapshot.write_slot, linear, offset);
            // SAFETY: `index` lies in the writable run computed above, which
            // the consumer cannot reach before `write` is published.
            let parked = unsafe { mem::replace(&mut *self.slots[index].get(), item) };
            drop(parked);
        }

        self.write
            .store(self.advance(write, count), Ordering::Release);
        count
    }

    /// # Safety
    ///
    /// The caller must be the only thread acting as consumer.
    unsafe fn pop_into(&self, out: &mut T) -> bool {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        let snapshot = self.classify(read, write);

        if snapshot.state == State::Empty {
            return false;
        }

        // SAFETY: the read slot was published by the producer's Release store
        // and stays untouched by it until `read` moves past it.
        unsafe { mem::swap(&mut *self.slots[snapshot.read_slot].get(), out) };
        self.read.store(self.advance(read, 1), Ordering::Release);
        true
    }
}

impl<T: Default> CircularBuffer<T> {
    /// # Safety
    ///
    /// The caller must be the only thread acting as consumer.
    unsafe fn take_one(&self) -> Option<T> {
        let mut out = T::default();
        // SAFETY: forwarded from the caller.
        unsafe { self.pop_into(&mut out) }.then_some(out)
    }

    /// # Safety
    ///
    /// The caller must be the only thread acting as consumer.
    unsafe fn pop_batch_raw(&self, out: &mut Vec<T>, max: usize) {
        out.clear();

        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        let snapshot = self.classify(read, write);
        let (linear, wrapped) = snapshot.readable(self.capacity());

        let mut count = linear + wrapped;
        if max > 0 {
            count = count.min(max);
        }
        if count == 0 {
            return;
        }

        out.reserve(count);
        for offset in 0..count {
            let index = Self::run_slot(snapshot.read_slot, linear, offset);
            // SAFETY: `index` lies in the readable run computed above.
            out.push(unsafe { mem::take(&mut *self.slots[index].get()) });
        }

        self.read.store(self.advance(read, count), Ordering::Release);
    }
}

impl<T> fmt::Debug for CircularBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircularBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

/// Writing end of a split [`CircularBuffer`].
pub struct Producer<T> {
    buffer: Arc<CircularBuffer<T>>,
}

impl<T> Producer<T> {
    /// Push one item, or hand it back if the buffer is full.
    pub fn try_push(&mut self, item: T) -> Result<(), T> {
        // SAFETY: `Producer` is unique per buffer and not `Clone`.
        unsafe { self.buffer.push_raw(item) }
    }

    /// Push as many items from the front of `items` as fit; see
    /// [`CircularBuffer::try_push_batch`].
    pub fn try_push_batch(&mut self, items: &mut Vec<T>) -> usize {
        // SAFETY: `Producer` is unique per buffer and not `Clone`.
        unsafe { self.buffer.push_batch_raw(items) }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Number of unread items.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether there is nothing to read.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether there is no room to write.
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    /// Whether the consumer end has been dropped.
    pub fn is_abandoned(&self) -> bool {
        Arc::strong_count(&self.buffer) == 1
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Producer").field(&self.buffer).finish()
    }
}

/// Reading end of a split [`CircularBuffer`].
pub struct Consumer<T> {
    buffer: Arc<CircularBuffer<T>>,
}

impl<T> Consumer<T> {
    /// Swap the oldest item into `out`; see [`CircularBuffer::try_pop`].
    pub fn try_pop(&mut self, out: &mut T) -> bool {
        // SAFETY: `Consumer` is unique per buffer and not `Clone`.
        unsafe { self.buffer.pop_into(out) }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Number of unread items.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether there is nothing to read.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether there is no room to write.
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    /// Whether the producer end has been dropped.
    pub fn is_abandoned(&self) -> bool {
        Arc::strong_count(&self.buffer) == 1
    }
}

impl<T: Default> Consumer<T> {
    /// Pop one item by value, leaving `T::default()` in its slot.
    pub fn pop(&mut self) -> Option<T> {
        // SAFETY: `Consumer` is unique per buffer and not `Clone`.
        unsafe { self.buffer.take_one() }
    }

    /// Drain up to `max` items (0 = all available) into `out`; see
    /// [`CircularBuffer::try_pop_batch`].
    pub fn try_pop_batch(&mut self, out: &mut Vec<T>, max: usize) {
        // SAFETY: `Consumer` is unique per buffer and not `Clone`.
        unsafe { self.buffer.pop_batch_raw(out, max) }
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Consumer").field(&self.buffer).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_capacity_below_two_rejected() {
        assert_eq!(
            CircularBuffer::<u8>::new(0).unwrap_err(),
            CoreError::Capacity(0)
        );
        assert_eq!(
            CircularBuffer::<u8>::new(1).unwrap_err(),
            CoreError::Capacity(1)
        );
        assert!(CircularBuffer::<u8>::new(2).is_ok());
    }

    #[test]
    fn test_wraparound_scenario() {
        let mut buffer = CircularBuffer::new(4).unwrap();

        assert!(buffer.try_push('A').is_ok());
        assert!(buffer.try_push('B').is_ok());
        assert!(buffer.try_push('C').is_ok());
        assert_eq!(buffer.size(), 3);
        assert!(!buffer.is_full());

        let mut out = ' ';
        assert!(buffer.try_pop(&mut out));
        assert_eq!(out, 'A');
        assert_eq!(buffer.size(), 2);

        assert!(buffer.try_push('D').is_ok());
        assert!(buffer.try_push('E').is_ok());
        assert!(buffer.is_full());

        assert_eq!(buffer.try_push('F'), Err('F'));
        assert_eq!(buffer.size(), 4);

        let mut rest = Vec::new();
        buffer.try_pop_batch(&mut rest, 0);
        assert_eq!(rest, vec!['B', 'C', 'D', 'E']);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_state_classification() {
        let mut buffer = CircularBuffer::<u8>::new(4).unwrap();
        assert_eq!(buffer.classify(0, 0).state, State::Empty);
        assert_eq!(buffer.classify(0, 4).state, State::Full);
        assert_eq!(buffer.classify(1, 3).state, State::ReadBeforeWrite);
        assert_eq!(buffer.classify(3, 5).state, State::WriteBeforeRead);
        assert_eq!(buffer.classify(6, 2).state, State::Full);
        assert_eq!(buffer.classify(7, 7).state, State::Empty);

        for i in 0..4 {
            assert!(buffer.try_push(i).is_ok());
        }
        assert!(buffer.is_full());
        assert_eq!(buffer.pop(), Some(0));
        assert!(!buffer.is_full());
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_pop_parks_previous_value_in_slot() {
        let mut buffer = CircularBuffer::<Vec<u8>>::new(2).unwrap();
        assert!(buffer.try_push(vec![1, 2, 3]).is_ok());

        let mut out = vec![9];
        assert!(buffer.try_pop(&mut out));
        assert_eq!(out, vec![1, 2, 3]);

        // SAFETY: single-threaded test with exclusive access.
        let parked = unsafe { &*buffer.slots[0].get() };
        assert_eq!(parked, &vec![9]);
    }

    #[test]
    fn test_pop_empty_leaves_out_untouched() {
        let mut buffer = CircularBuffer::<u32>::new(3).unwrap();
        let mut out = 7;
        assert!(!buffer.try_pop(&mut out));
        assert_eq!(out, 7);
        assert_eq!(buffer.pop(), None);
    }

    #[test]
    fn test_push_batch_partial_wraps() {
        let mut buffer = CircularBuffer::new(4).unwrap();
        assert!(buffer.try_push(0).is_ok());
        assert!(buffer.try_push(1).is_ok());
        assert_eq!(buffer.pop(), Some(0));
        assert_eq!(buffer.pop(), Some(1));

        // read and write both sit at slot 2; a batch of 6 fills slots 2, 3, 0, 1.
        let mut items = vec![10, 11, 12, 13, 14, 15];
        assert_eq!(buffer.try_push_batch(&mut items), 4);
        assert_eq!(items, vec![14, 15]);
        assert!(buffer.is_full());
        assert_eq!(buffer.try_push_batch(&mut items), 0);

        let mut out = Vec::new();
        buffer.try_pop_batch(&mut out, 0);
        assert_eq!(out, vec![10, 11, 12, 13]);
    }

    #[test]
    fn test_push_batch_empty_input() {
        let mut buffer = CircularBuffer::<u8>::new(2).unwrap();
        let mut items = Vec::new();
        assert_eq!(buffer.try_push_batch(&mut items), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_pop_batch_respects_max_and_replaces_output() {
        let mut buffer = CircularBuffer::new(8).unwrap();
        let mut items: Vec<u32> = (0..6).collect();
        assert_eq!(buffer.try_push_batch(&mut items), 6);

        let mut out = vec![99, 98];
        buffer.try_pop_batch(&mut out, 4);
        assert_eq!(out, vec![0, 1, 2, 3]);
        assert_eq!(buffer.len(), 2);

        buffer.try_pop_batch(&mut out, 0);
        assert_eq!(out, vec![4, 5]);

        buffer.try_pop_batch(&mut out, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_split_ends_share_state() {
        let buffer = CircularBuffer::<u16>::new(2).unwrap();
        let (mut tx, mut rx) = buffer.split();

        assert!(tx.try_push(5).is_ok());
        assert_eq!(rx.len(), 1);
        assert!(tx.try_push(6).is_ok());
        assert!(rx.is_full());
        assert_eq!(tx.try_push(7), Err(7));

        assert_eq!(rx.pop(), Some(5));
        assert_eq!(tx.len(), 1);
        assert!(!tx.is_abandoned());

        drop(rx);
        assert!(tx.is_abandoned());
    }
}
