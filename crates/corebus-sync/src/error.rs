use std::fmt;
use std::time::Duration;

/// Errors that can occur while waiting on a [`crate::ReplySlot`].
#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    /// The remote core did not answer within the wait budget.
    #[error("timed out after {0:?} waiting for reply from remote core")]
    Timeout(Duration),

    /// The slot already delivered its value and was not reset before reuse.
    #[error("reply slot already consumed (reset before reuse)")]
    AlreadyTaken,
}

pub type Result<T> = std::result::Result<T, ReplyError>;

/// Errors returned by [`crate::Producer::push`]. The rejected message is
/// handed back so the sender keeps ownership.
#[derive(thiserror::Error)]
pub enum PushError<T> {
    /// The ring is full; the receiving core has not drained fast enough.
    #[error("ring full")]
    Full(T),

    /// The receiving core dropped its end of the ring.
    #[error("receiving core disconnected")]
    Disconnected(T),
}

impl<T> PushError<T> {
    /// Recover the message that could not be delivered.
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(value) | PushError::Disconnected(value) => value,
        }
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(_) => f.write_str("Full(..)"),
            PushError::Disconnected(_) => f.write_str("Disconnected(..)"),
        }
    }
}
