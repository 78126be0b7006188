use std::cell::UnsafeCell;
use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::{ReplyError, Result};

/// Default wait budget for a reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Default sleep between polls of the pending flag.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1);

/// Single-shot reply slot for a blocking request/reply exchange across cores.
///
/// The issuing core creates the slot, attaches it to an outgoing message and
/// polls [`is_pending`](Self::is_pending) (or blocks in
/// [`wait_for_reply`](Self::wait_for_reply)). The remote core answers exactly
/// once from inside its dispatch handler via [`set_reply`](Self::set_reply).
///
/// The handshake is deliberately spin-and-backoff rather than an OS-level
/// wait: the remote core runs a tight non-blocking packet loop and cannot
/// service a wake primitive promptly, and replies are rare relative to
/// packet-rate work.
///
/// Contract: one outstanding request per slot. [`reset`](Self::reset) must be
/// called before each reuse, and no second message may reference the slot
/// until the previous reply has been observed.
pub struct ReplySlot<T> {
    pending: AtomicBool,
    value: UnsafeCell<Option<T>>,
}

// SAFETY: the value cell is written by exactly one remote core (before the
// Release store that clears `pending`) and read by exactly one issuing core
// (after an Acquire load observes `pending == false`). The flag handshake
// orders the two accesses, so the cell is never touched concurrently.
unsafe impl<T: Send> Sync for ReplySlot<T> {}

impl<T> ReplySlot<T> {
    /// Create a slot that is ready to receive one reply.
    pub fn new() -> Self {
        Self {
            pending: AtomicBool::new(true),
            value: UnsafeCell::new(None),
        }
    }

    /// Arm the slot for the next request/reply cycle.
    ///
    /// Must only be called by the issuing core, with no request in flight.
    pub fn reset(&self) {
        // SAFETY: per the single-outstanding-request contract no remote core
        // holds a reference to an armed cycle here, so the cell is ours.
        unsafe {
            *self.value.get() = None;
        }
        self.pending.store(true, Ordering::Release);
    }

    /// True while the reply has not yet been published.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Publish the reply. Called by the remote core, exactly once per cycle,
    /// from inside its dispatch handler.
    pub fn set_reply(&self, reply: T) {
        // SAFETY: single designated writer per cycle; the issuing core will
        // not read the cell until it observes `pending == false`.
        unsafe {
            *self.value.get() = Some(reply);
        }
        // The value store must be globally visible before the flag clears;
        // the polling reader carries no fence of its own.
        fence(Ordering::SeqCst);
        self.pending.store(false, Ordering::Release);
    }

    /// Block (poll + sleep) until the reply arrives, with default budget.
    pub fn wait_for_reply(&self) -> Result<T> {
        self.wait_with(DEFAULT_TIMEOUT, DEFAULT_BACKOFF)
    }

    /// Block (poll + sleep) until the reply arrives.
    ///
    /// Fails with [`ReplyError::Timeout`] once the accumulated wait exceeds
    /// `timeout`. Calling this with no request in flight runs the full
    /// budget before failing; pairing every slot with exactly one message
    /// is the caller's responsibility.
    pub fn wait_with(&self, timeout: Duration, backoff: Duration) -> Result<T> {
        let mut remaining = timeout;

        while self.is_pending() {
            remaining = match remaining.checked_sub(backoff) {
                Some(left) => left,
                None => return Err(ReplyError::Timeout(timeout)),
            };
            thread::sleep(backoff);
        }

        // SAFETY: `pending == false` was observed with Acquire ordering, so
        // the writer's value store (sequenced before its Release) is visible
        // and the writer has retired from the cell.
        unsafe { (*self.value.get()).take() }.ok_or(ReplyError::AlreadyTaken)
    }
}

impl<T> Default for ReplySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ReplySlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplySlot")
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;

    #[test]
    fn reply_roundtrip() {
        let slot = ReplySlot::new();
        assert!(slot.is_pending());

        slot.set_reply(42u32);
        assert!(!slot.is_pending());
        assert_eq!(slot.wait_for_reply().unwrap(), 42);
    }

    #[test]
    fn pending_strictly_between_reset_and_set() {
        let slot = ReplySlot::new();
        slot.set_reply(1u8);
        assert!(!slot.is_pending());

        slot.reset();
        assert!(slot.is_pending());
        slot.set_reply(2);
        assert!(!slot.is_pending());
        assert_eq!(slot.wait_for_reply().unwrap(), 2);
    }

    #[test]
    fn wait_without_reply_times_out() {
        let slot: ReplySlot<bool> = ReplySlot::new();
        let started = Instant::now();

        let err = slot
            .wait_with(Duration::from_millis(20), Duration::from_millis(1))
            .unwrap_err();

        assert!(matches!(err, ReplyError::Timeout(_)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn second_wait_without_reset_reports_consumed() {
        let slot = ReplySlot::new();
        slot.set_reply("done".to_string());

        assert_eq!(slot.wait_for_reply().unwrap(), "done");
        let err = slot
            .wait_with(Duration::from_millis(5), Duration::from_millis(1))
            .unwrap_err();
        assert!(matches!(err, ReplyError::AlreadyTaken));
    }

    #[test]
    fn reply_crosses_thread_boundary() {
        let slot = Arc::new(ReplySlot::new());
        let remote = Arc::clone(&slot);

        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            remote.set_reply(vec![1u8, 2, 3]);
        });

        let value = slot
            .wait_with(Duration::from_secs(1), Duration::from_millis(1))
            .unwrap();
        assert_eq!(value, vec![1, 2, 3]);
        writer.join().unwrap();
    }

    #[test]
    fn reuse_after_reset() {
        let slot = Arc::new(ReplySlot::new());

        for round in 0..3u64 {
            slot.reset();
            let remote = Arc::clone(&slot);
            let writer = thread::spawn(move || remote.set_reply(round * 10));
            assert_eq!(slot.wait_for_reply().unwrap(), round * 10);
            writer.join().unwrap();
        }
    }
}
