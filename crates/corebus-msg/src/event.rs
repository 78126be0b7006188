use tracing::trace;

use crate::dispatch::{Disposition, Message};
use crate::types::{CoreId, EventId, PortId};

/// Notification from a DP core that an asynchronous operation completed on
/// a port, or that a barrier was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortEvent {
    /// The core that emitted the notification.
    pub core: CoreId,
    pub port: PortId,
    /// Echo of the id the control plane attached to the operation.
    pub event: EventId,
    /// False when the operation finished abnormally.
    pub ok: bool,
}

impl PortEvent {
    pub fn new(core: CoreId, port: PortId, event: EventId) -> Self {
        Self {
            core,
            port,
            event,
            ok: true,
        }
    }

    pub fn failed(core: CoreId, port: PortId, event: EventId) -> Self {
        Self {
            core,
            port,
            event,
            ok: false,
        }
    }
}

/// Control-plane bookkeeping that resolves (port, event) correlation pairs.
///
/// Implemented by the CP's event ledger; a barrier or guarded stop waiting
/// on a pair is unblocked when the matching event arrives here.
pub trait EventSink {
    fn on_port_event(&mut self, event: PortEvent);
}

/// Messages sent from data-plane cores up to the control plane.
#[derive(Debug, Clone)]
pub enum DpEvent {
    Port(PortEvent),
}

impl Message for DpEvent {
    type Target = dyn EventSink;

    fn handle(self, sink: &mut Self::Target) -> Disposition {
        match self {
            DpEvent::Port(event) => {
                sink.on_port_event(event);
                Disposition::Handled
            }
        }
    }

    fn discard(self) {
        trace!(event = ?self, "discarding event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<PortEvent>,
    }

    impl EventSink for Recorder {
        fn on_port_event(&mut self, event: PortEvent) {
            self.seen.push(event);
        }
    }

    #[test]
    fn port_event_reaches_sink() {
        let mut sink = Recorder::default();
        let event = PortEvent::new(CoreId(1), 0, EventId(7));

        let disposition = DpEvent::Port(event).handle(&mut sink);

        assert_eq!(disposition, Disposition::Handled);
        assert_eq!(sink.seen, vec![event]);
    }

    #[test]
    fn failed_event_carries_status() {
        let event = PortEvent::failed(CoreId(2), 1, EventId(9));
        assert!(!event.ok);
    }
}
