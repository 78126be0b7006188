use std::collections::HashMap;

use corebus_msg::{EventId, EventSink, PortEvent, PortId};
use tracing::debug;

/// Arrival record for one (port, event) pair.
#[derive(Debug, Clone, Copy)]
pub struct EventRecord {
    /// How many cores reported the pair so far.
    pub arrivals: u32,
    /// AND-aggregated status across all reporters.
    pub ok: bool,
}

/// Control-plane bookkeeping of DP completion notifications.
///
/// Keyed by (port, event id): a broadcast operation is complete once every
/// participating core has reported the pair. Entries stay until cleared so
/// the control plane can poll at its own pace.
#[derive(Debug, Default)]
pub struct EventLedger {
    records: HashMap<(PortId, EventId), EventRecord>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, port: PortId, event: EventId) -> Option<EventRecord> {
        self.records.get(&(port, event)).copied()
    }

    pub fn arrivals(&self, port: PortId, event: EventId) -> u32 {
        self.record(port, event).map_or(0, |r| r.arrivals)
    }

    /// Forget a resolved pair.
    pub fn clear(&mut self, port: PortId, event: EventId) {
        self.records.remove(&(port, event));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl EventSink for EventLedger {
    fn on_port_event(&mut self, event: PortEvent) {
        debug!(
            core = %event.core,
            port = event.port,
            event = %event.event,
            ok = event.ok,
            "port event"
        );
        let record = self
            .records
            .entry((event.port, event.event))
            .or_insert(EventRecord {
                arrivals: 0,
                ok: true,
            });
        record.arrivals += 1;
        record.ok &= event.ok;
    }
}
