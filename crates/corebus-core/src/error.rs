use std::time::Duration;

use corebus_msg::{CoreId, EventId, PortId};
use corebus_sync::ReplyError;

/// Errors surfaced to the control plane. Worker cores never see these;
/// dispatch failures on a core are dispositions, not errors.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// A reply slot ran out its wait budget (or was misused).
    #[error("no reply from {core}: {source}")]
    Reply {
        core: CoreId,
        #[source]
        source: ReplyError,
    },

    /// A completion notification did not arrive in time.
    #[error("timed out after {timeout:?} waiting for event {event} on port {port}")]
    EventTimeout {
        port: PortId,
        event: EventId,
        timeout: Duration,
    },

    /// The command ring to a core is full; the command was discarded.
    #[error("command ring to {0} is full")]
    Backpressure(CoreId),

    /// The addressed core is not part of the fabric.
    #[error("{0} is not part of the fabric")]
    UnknownCore(CoreId),

    /// The addressed core dropped its end of the ring.
    #[error("{0} has disconnected")]
    CoreGone(CoreId),
}

pub type Result<T> = std::result::Result<T, ControlError>;
