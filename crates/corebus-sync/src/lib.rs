//! Lock-free cross-core synchronization primitives.
//!
//! Cores in a traffic generator never block on each other during packet
//! work, so everything here is poll-based:
//! - [`ReplySlot`] — a single-shot request/reply handshake for the rare
//!   cases where the control plane must wait for a worker's answer
//! - [`ring`] — a bounded single-producer/single-consumer ring that carries
//!   message ownership from one core to another, FIFO per pair

pub mod error;
pub mod reply;
pub mod ring;

pub use error::{PushError, ReplyError, Result};
pub use reply::{ReplySlot, DEFAULT_BACKOFF, DEFAULT_TIMEOUT};
pub use ring::{ring, Consumer, Producer};
