use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use bytes::Bytes;
use corebus_msg::{
    CapturedPacket, CompiledStreams, CoreId, DpCore, DpEvent, EventId, PacketBatch, PortEvent,
    PortId, PushPcap, RxCore,
};
use corebus_sync::Producer;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Traffic state of one port on a simulated DP core.
#[derive(Debug)]
struct ActiveTraffic {
    event: EventId,
    #[allow(dead_code)]
    program: CompiledStreams,
    factor: f64,
    paused: bool,
    started_at: Instant,
    duration: Option<Duration>,
}

/// Reference DP core used by the demo binary and the integration tests.
///
/// Stands in for the packet scheduler: tracks per-port traffic and pcap
/// state and reports duration expiry through the regular event path.
/// Packet transmission itself is out of scope.
pub struct SimDpCore {
    id: CoreId,
    events: Producer<DpEvent>,
    active: HashMap<PortId, ActiveTraffic>,
    pcap: HashMap<PortId, (PushPcap, Instant)>,
    starts: u64,
    stops: u64,
}

impl SimDpCore {
    pub fn new(id: CoreId, events: Producer<DpEvent>) -> Self {
        Self {
            id,
            events,
            active: HashMap::new(),
            pcap: HashMap::new(),
            starts: 0,
            stops: 0,
        }
    }

    /// Commands applied that began generation.
    pub fn starts(&self) -> u64 {
        self.starts
    }

    /// Commands applied that ended generation (explicit stops only; natural
    /// duration expiry is not counted here).
    pub fn stops(&self) -> u64 {
        self.stops
    }

    pub fn rate_factor(&self, port: PortId) -> Option<f64> {
        self.active.get(&port).map(|t| t.factor)
    }

    pub fn is_paused(&self, port: PortId) -> Option<bool> {
        self.active.get(&port).map(|t| t.paused)
    }

    /// One scheduler iteration: expire ports whose duration has elapsed and
    /// pcap pushes that ran out, notifying the control plane.
    pub fn advance(&mut self) {
        let now = Instant::now();

        let expired: Vec<PortId> = self
            .active
            .iter()
            .filter(|(_, t)| {
                !t.paused && t.duration.is_some_and(|d| now >= t.started_at + d)
            })
            .map(|(port, _)| *port)
            .collect();

        for port in expired {
            if let Some(traffic) = self.active.remove(&port) {
                info!(core = %self.id, port, event = %traffic.event, "duration reached, traffic complete");
                let id = self.id;
                self.post_event(PortEvent::new(id, port, traffic.event));
            }
        }

        let finished: Vec<PortId> = self
            .pcap
            .iter()
            .filter(|(_, (push, started))| {
                push.duration.is_none_or(|d| now >= *started + d)
            })
            .map(|(port, _)| *port)
            .collect();

        for port in finished {
            if let Some((push, _)) = self.pcap.remove(&port) {
                info!(core = %self.id, port, event = %push.event, "pcap push complete");
                let id = self.id;
                self.post_event(PortEvent::new(id, port, push.event));
            }
        }
    }
}

impl DpCore for SimDpCore {
    fn id(&self) -> CoreId {
        self.id
    }

    fn start_traffic(
        &mut self,
        port: PortId,
        event: EventId,
        streams: CompiledStreams,
        duration: Option<Duration>,
    ) -> bool {
        if self.active.contains_key(&port) {
            warn!(core = %self.id, port, "start on active port");
            return false;
        }
        debug!(core = %self.id, port, %event, pps = streams.total_pps(), "traffic started");
        self.active.insert(
            port,
            ActiveTraffic {
                event,
                program: streams,
                factor: 1.0,
                paused: false,
                started_at: Instant::now(),
                duration,
            },
        );
        self.starts += 1;
        true
    }

    fn stop_traffic(&mut self, port: PortId) -> bool {
        match self.active.remove(&port) {
            Some(traffic) => {
                debug!(core = %self.id, port, event = %traffic.event, "traffic stopped");
                self.stops += 1;
                true
            }
            None => false,
        }
    }

    fn pause_traffic(&mut self, port: PortId) -> bool {
        match self.active.get_mut(&port) {
            Some(traffic) if !traffic.paused => {
                traffic.paused = true;
                true
            }
            _ => false,
        }
    }

    fn resume_traffic(&mut self, port: PortId) -> bool {
        match self.active.get_mut(&port) {
            Some(traffic) if traffic.paused => {
                traffic.paused = false;
                true
            }
            _ => false,
        }
    }

    fn update_rate(&mut self, port: PortId, factor: f64) -> bool {
        match self.active.get_mut(&port) {
            Some(traffic) => {
                traffic.factor = factor;
                true
            }
            None => false,
        }
    }

    fn push_pcap(&mut self, push: PushPcap) -> bool {
        if self.pcap.contains_key(&push.port) {
            warn!(core = %self.id, port = push.port, "pcap push already active");
            return false;
        }
        self.pcap.insert(push.port, (push, Instant::now()));
        true
    }

    fn active_event(&self, port: PortId) -> Option<EventId> {
        self.active.get(&port).map(|t| t.event)
    }

    fn all_ports_idle(&self) -> bool {
        self.active.is_empty() && self.pcap.is_empty()
    }

    fn post_event(&mut self, event: PortEvent) {
        if self.events.push(DpEvent::Port(event)).is_err() {
            warn!(core = %self.id, port = event.port, "event ring unavailable, dropping notification");
        }
    }
}

#[derive(Debug)]
struct CaptureState {
    pcap_path: PathBuf,
    limit: u64,
    captured: u64,
}

#[derive(Debug)]
struct QueueState {
    size: u64,
    packets: VecDeque<CapturedPacket>,
}

/// Reference RX core used by the demo binary and the integration tests.
///
/// Holds capture and queue state per port; received packets are fed in via
/// [`inject`](Self::inject) instead of a NIC.
pub struct SimRxCore {
    latency: bool,
    captures: HashMap<PortId, CaptureState>,
    queues: HashMap<PortId, QueueState>,
    started_at: Instant,
}

impl SimRxCore {
    pub fn new() -> Self {
        Self {
            latency: false,
            captures: HashMap::new(),
            queues: HashMap::new(),
            started_at: Instant::now(),
        }
    }

    pub fn latency_enabled(&self) -> bool {
        self.latency
    }

    /// Feed one received packet into the active RX features.
    pub fn inject(&mut self, port: PortId, data: Bytes) {
        let ts = self.started_at.elapsed();

        if let Some(capture) = self.captures.get_mut(&port) {
            if capture.captured < capture.limit {
                capture.captured += 1;
            }
        }

        if let Some(queue) = self.queues.get_mut(&port) {
            if queue.packets.len() as u64 >= queue.size {
                queue.packets.pop_front();
            }
            queue.packets.push_back(CapturedPacket { port, ts, data });
        }
    }
}

impl Default for SimRxCore {
    fn default() -> Self {
        Self::new()
    }
}

impl RxCore for SimRxCore {
    fn enable_latency(&mut self) {
        self.latency = true;
    }

    fn disable_latency(&mut self) {
        self.latency = false;
    }

    fn start_capture(&mut self, port: PortId, pcap_path: PathBuf, limit: u64) -> bool {
        if self.captures.contains_key(&port) {
            warn!(port, "capture already active");
            return false;
        }
        info!(port, path = %pcap_path.display(), limit, "capture started");
        self.captures.insert(
            port,
            CaptureState {
                pcap_path,
                limit,
                captured: 0,
            },
        );
        true
    }

    fn stop_capture(&mut self, port: PortId) -> bool {
        self.captures.remove(&port).is_some()
    }

    fn start_queue(&mut self, port: PortId, size: u64) -> bool {
        if self.queues.contains_key(&port) {
            warn!(port, "queue already active");
            return false;
        }
        self.queues.insert(
            port,
            QueueState {
                size,
                packets: VecDeque::new(),
            },
        );
        true
    }

    fn stop_queue(&mut self, port: PortId) -> bool {
        self.queues.remove(&port).is_some()
    }

    fn queue_packets(&mut self, port: PortId) -> PacketBatch {
        PacketBatch {
            packets: self
                .queues
                .get_mut(&port)
                .map(|q| std::mem::take(&mut q.packets).into_iter().collect())
                .unwrap_or_default(),
        }
    }

    fn features_to_json(&self, port: PortId) -> Value {
        json!({
            "port": port,
            "latency": { "is_active": self.latency },
            "capture": self.captures.get(&port).map(|c| json!({
                "pcap_filename": c.pcap_path.display().to_string(),
                "limit": c.limit,
                "captured": c.captured,
            })).unwrap_or(Value::Null),
            "queue": self.queues.get(&port).map(|q| json!({
                "size": q.size,
                "queued": q.packets.len(),
            })).unwrap_or(Value::Null),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use corebus_msg::{StreamProgram, StreamSpec};
    use corebus_sync::ring;

    use super::*;

    fn program() -> CompiledStreams {
        Arc::new(StreamProgram::new(vec![StreamSpec {
            stream_id: 1,
            pps: 10.0,
            packet_len: 64,
        }]))
    }

    #[test]
    fn duration_expiry_reports_completion() {
        let (tx, mut rx) = ring(8);
        let mut core = SimDpCore::new(CoreId(1), tx);

        assert!(core.start_traffic(0, EventId(7), program(), Some(Duration::ZERO)));
        core.advance();

        assert!(core.all_ports_idle());
        match rx.pop() {
            Some(DpEvent::Port(event)) => {
                assert_eq!(event.port, 0);
                assert_eq!(event.event, EventId(7));
                assert!(event.ok);
            }
            None => panic!("expected completion event"),
        }
    }

    #[test]
    fn paused_port_does_not_expire() {
        let (tx, mut rx) = ring(8);
        let mut core = SimDpCore::new(CoreId(1), tx);

        assert!(core.start_traffic(0, EventId(1), program(), Some(Duration::ZERO)));
        assert!(core.pause_traffic(0));
        core.advance();

        assert_eq!(core.active_event(0), Some(EventId(1)));
        assert!(rx.pop().is_none());
    }

    #[test]
    fn second_start_on_port_rejected() {
        let (tx, _rx) = ring(8);
        let mut core = SimDpCore::new(CoreId(1), tx);

        assert!(core.start_traffic(0, EventId(1), program(), None));
        assert!(!core.start_traffic(0, EventId(2), program(), None));
        assert_eq!(core.active_event(0), Some(EventId(1)));
    }

    #[test]
    fn update_and_pause_resume_lifecycle() {
        let (tx, _rx) = ring(8);
        let mut core = SimDpCore::new(CoreId(1), tx);
        assert!(core.start_traffic(0, EventId(1), program(), None));

        assert!(core.update_rate(0, 2.5));
        assert_eq!(core.rate_factor(0), Some(2.5));

        assert!(core.pause_traffic(0));
        assert!(!core.pause_traffic(0));
        assert!(core.resume_traffic(0));
        assert!(!core.resume_traffic(0));

        assert!(!core.update_rate(7, 1.0));
    }

    #[test]
    fn pcap_push_completes_and_notifies() {
        let (tx, mut rx) = ring(8);
        let mut core = SimDpCore::new(CoreId(2), tx);

        assert!(core.push_pcap(PushPcap {
            port: 1,
            event: EventId(5),
            pcap_path: PathBuf::from("/tmp/replay.pcap"),
            ipg: Some(Duration::from_micros(10)),
            speedup: 1.0,
            count: 0,
            duration: None,
            is_dual: false,
        }));
        assert!(!core.all_ports_idle());

        core.advance();
        assert!(core.all_ports_idle());
        assert!(matches!(
            rx.pop(),
            Some(DpEvent::Port(event)) if event.event == EventId(5)
        ));
    }

    #[test]
    fn queue_evicts_oldest_at_capacity() {
        let mut rx = SimRxCore::new();
        assert!(rx.start_queue(0, 2));

        rx.inject(0, Bytes::from_static(b"one"));
        rx.inject(0, Bytes::from_static(b"two"));
        rx.inject(0, Bytes::from_static(b"three"));

        let batch = rx.queue_packets(0);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.packets[0].data.as_ref(), b"two");
        assert_eq!(batch.packets[1].data.as_ref(), b"three");
    }

    #[test]
    fn capture_respects_limit() {
        let mut rx = SimRxCore::new();
        assert!(rx.start_capture(0, PathBuf::from("/tmp/cap.pcap"), 1));

        rx.inject(0, Bytes::from_static(b"a"));
        rx.inject(0, Bytes::from_static(b"b"));

        let snapshot = rx.features_to_json(0);
        assert_eq!(snapshot["capture"]["captured"], 1);
    }

    #[test]
    fn features_reflect_active_state() {
        let mut rx = SimRxCore::new();
        rx.enable_latency();
        assert!(rx.start_queue(3, 8));

        let snapshot = rx.features_to_json(3);
        assert_eq!(snapshot["latency"]["is_active"], true);
        assert_eq!(snapshot["queue"]["size"], 8);
        assert_eq!(snapshot["capture"], Value::Null);
    }
}
