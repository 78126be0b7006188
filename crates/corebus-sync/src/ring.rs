use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::error::PushError;

/// Create a bounded SPSC ring of the given capacity.
///
/// The ring carries message ownership from one core to another and preserves
/// send order per producer/consumer pair, which is the only ordering
/// guarantee the messaging layer assumes from its transport. No ordering
/// exists across different rings.
pub fn ring<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0, "ring capacity must be non-zero");

    let mut buf = Vec::with_capacity(capacity);
    buf.resize_with(capacity, || UnsafeCell::new(MaybeUninit::uninit()));

    let shared = Arc::new(Shared {
        buf: buf.into_boxed_slice(),
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
        producer_alive: AtomicBool::new(true),
        consumer_alive: AtomicBool::new(true),
    });

    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

struct Shared<T> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Next slot to read. Monotonic; slot index is `head % capacity`.
    head: CachePadded<AtomicUsize>,
    /// Next slot to write. Monotonic; slot index is `tail % capacity`.
    tail: CachePadded<AtomicUsize>,
    producer_alive: AtomicBool,
    consumer_alive: AtomicBool,
}

// SAFETY: each slot is accessed by at most one side at a time. The producer
// writes `buf[tail]` before publishing `tail` with Release; the consumer
// reads `buf[head]` only after an Acquire load of `tail` shows the slot
// published, and retires it by bumping `head` with Release.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Both sides are gone; drop whatever was published but never popped.
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        let capacity = self.buf.len();

        let mut seq = head;
        while seq != tail {
            // SAFETY: slots in [head, tail) hold initialized values.
            unsafe {
                (*self.buf[seq % capacity].get()).assume_init_drop();
            }
            seq = seq.wrapping_add(1);
        }
    }
}

/// Sending half of a ring. Owned by exactly one core.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Producer<T> {
    /// Hand a message to the receiving core.
    ///
    /// On failure the message comes back inside the error so ownership never
    /// silently disappears.
    pub fn push(&mut self, value: T) -> Result<(), PushError<T>> {
        if !self.shared.consumer_alive.load(Ordering::Acquire) {
            return Err(PushError::Disconnected(value));
        }

        let tail = self.shared.tail.load(Ordering::Relaxed);
        let head = self.shared.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) == self.shared.buf.len() {
            return Err(PushError::Full(value));
        }

        // SAFETY: the slot at `tail` is unpublished and owned by this side.
        unsafe {
            (*self.shared.buf[tail % self.shared.buf.len()].get()).write(value);
        }
        self.shared.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Number of messages currently in flight.
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.buf.len()
    }

    /// True once the receiving core dropped its end.
    pub fn is_disconnected(&self) -> bool {
        !self.shared.consumer_alive.load(Ordering::Acquire)
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        self.shared.producer_alive.store(false, Ordering::Release);
    }
}

/// Receiving half of a ring. Owned by exactly one core.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Consumer<T> {
    /// Take ownership of the next message, if one has been published.
    pub fn pop(&mut self) -> Option<T> {
        let head = self.shared.head.load(Ordering::Relaxed);
        let tail = self.shared.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        // SAFETY: `head < tail`, so the slot holds an initialized value the
        // producer published with Release.
        let value = unsafe {
            (*self.shared.buf[head % self.shared.buf.len()].get()).assume_init_read()
        };
        self.shared.head.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.buf.len()
    }

    /// True once the sending core dropped its end. Messages already in the
    /// ring remain poppable.
    pub fn is_disconnected(&self) -> bool {
        !self.shared.producer_alive.load(Ordering::Acquire)
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.shared.consumer_alive.store(false, Ordering::Release);
    }
}
