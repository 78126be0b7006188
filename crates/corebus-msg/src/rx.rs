use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use corebus_sync::ReplySlot;
use serde_json::Value;
use tracing::trace;

use crate::dispatch::{Disposition, Message};
use crate::types::PortId;

/// A packet captured by the RX core. Payload bytes are opaque here.
#[derive(Debug, Clone)]
pub struct CapturedPacket {
    pub port: PortId,
    /// Offset from the start of the capture.
    pub ts: Duration,
    pub data: Bytes,
}

/// Buffer of captured packets handed back to the control plane.
#[derive(Debug, Clone, Default)]
pub struct PacketBatch {
    pub packets: Vec<CapturedPacket>,
}

impl PacketBatch {
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

/// Core-local state the RX core exposes to its command stream.
pub trait RxCore {
    fn enable_latency(&mut self);

    fn disable_latency(&mut self);

    /// Begin writing up to `limit` packets seen on `port` to `pcap_path`.
    fn start_capture(&mut self, port: PortId, pcap_path: PathBuf, limit: u64) -> bool;

    fn stop_capture(&mut self, port: PortId) -> bool;

    /// Begin keeping the most recent `size` packets seen on `port` in memory.
    fn start_queue(&mut self, port: PortId, size: u64) -> bool;

    fn stop_queue(&mut self, port: PortId) -> bool;

    /// Drain the in-memory queue for `port`.
    fn queue_packets(&mut self, port: PortId) -> PacketBatch;

    /// Diagnostic snapshot of the RX features active on `port`.
    fn features_to_json(&self, port: PortId) -> Value;
}

/// Commands sent from the control plane to the RX core.
///
/// Request/reply variants carry a shared [`ReplySlot`] the issuing core
/// waits on; the handler answers it exactly once on every path, including
/// failure, so the issuer fails fast instead of timing out. Fire-and-forget
/// variants carry none.
#[derive(Debug)]
pub enum RxCommand {
    EnableLatency,
    DisableLatency,
    StartCapture {
        port: PortId,
        pcap_path: PathBuf,
        limit: u64,
        reply: Arc<ReplySlot<bool>>,
    },
    StopCapture {
        port: PortId,
    },
    StartQueue {
        port: PortId,
        size: u64,
        reply: Arc<ReplySlot<bool>>,
    },
    StopQueue {
        port: PortId,
    },
    QueueGetPackets {
        port: PortId,
        reply: Arc<ReplySlot<PacketBatch>>,
    },
    FeaturesToJson {
        port: PortId,
        reply: Arc<ReplySlot<Value>>,
    },
    Quit,
}

impl Message for RxCommand {
    type Target = dyn RxCore;

    fn handle(self, rx: &mut Self::Target) -> Disposition {
        match self {
            RxCommand::EnableLatency => {
                rx.enable_latency();
                Disposition::Handled
            }
            RxCommand::DisableLatency => {
                rx.disable_latency();
                Disposition::Handled
            }
            RxCommand::StartCapture {
                port,
                pcap_path,
                limit,
                reply,
            } => {
                let ok = rx.start_capture(port, pcap_path, limit);
                reply.set_reply(ok);
                if ok {
                    Disposition::Handled
                } else {
                    Disposition::Skipped
                }
            }
            RxCommand::StopCapture { port } => {
                if rx.stop_capture(port) {
                    Disposition::Handled
                } else {
                    Disposition::Skipped
                }
            }
            RxCommand::StartQueue { port, size, reply } => {
                let ok = rx.start_queue(port, size);
                reply.set_reply(ok);
                if ok {
                    Disposition::Handled
                } else {
                    Disposition::Skipped
                }
            }
            RxCommand::StopQueue { port } => {
                if rx.stop_queue(port) {
                    Disposition::Handled
                } else {
                    Disposition::Skipped
                }
            }
            RxCommand::QueueGetPackets { port, reply } => {
                reply.set_reply(rx.queue_packets(port));
                Disposition::Handled
            }
            RxCommand::FeaturesToJson { port, reply } => {
                reply.set_reply(rx.features_to_json(port));
                Disposition::Handled
            }
            RxCommand::Quit => Disposition::Quit,
        }
    }

    fn discard(self) {
        // Answer carried slots with a sentinel so the waiting CP fails fast
        // instead of running out its timeout.
        match self {
            RxCommand::StartCapture { reply, .. } => reply.set_reply(false),
            RxCommand::StartQueue { reply, .. } => reply.set_reply(false),
            RxCommand::QueueGetPackets { reply, .. } => reply.set_reply(PacketBatch::default()),
            RxCommand::FeaturesToJson { reply, .. } => reply.set_reply(Value::Null),
            other => trace!(command = ?other, "discarding command"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct RecordingRx {
        latency: bool,
        captures: HashMap<PortId, (PathBuf, u64)>,
        queues: HashMap<PortId, Vec<CapturedPacket>>,
        fail_capture: bool,
    }

    impl RxCore for RecordingRx {
        fn enable_latency(&mut self) {
            self.latency = true;
        }

        fn disable_latency(&mut self) {
            self.latency = false;
        }

        fn start_capture(&mut self, port: PortId, pcap_path: PathBuf, limit: u64) -> bool {
            if self.fail_capture {
                return false;
            }
            self.captures.insert(port, (pcap_path, limit));
            true
        }

        fn stop_capture(&mut self, port: PortId) -> bool {
            self.captures.remove(&port).is_some()
        }

        fn start_queue(&mut self, port: PortId, _size: u64) -> bool {
            self.queues.insert(port, Vec::new());
            true
        }

        fn stop_queue(&mut self, port: PortId) -> bool {
            self.queues.remove(&port).is_some()
        }

        fn queue_packets(&mut self, port: PortId) -> PacketBatch {
            PacketBatch {
                packets: self.queues.get_mut(&port).map(std::mem::take).unwrap_or_default(),
            }
        }

        fn features_to_json(&self, port: PortId) -> Value {
            json!({ "port": port, "latency": self.latency })
        }
    }

    #[test]
    fn start_capture_answers_reply_on_success() {
        let mut rx = RecordingRx::default();
        let reply = Arc::new(ReplySlot::new());

        let disposition = RxCommand::StartCapture {
            port: 0,
            pcap_path: PathBuf::from("/tmp/cap0.pcap"),
            limit: 1000,
            reply: Arc::clone(&reply),
        }
        .handle(&mut rx);

        assert_eq!(disposition, Disposition::Handled);
        assert!(!reply.is_pending());
        assert!(reply.wait_for_reply().unwrap());
    }

    #[test]
    fn start_capture_answers_reply_on_failure() {
        let mut rx = RecordingRx {
            fail_capture: true,
            ..RecordingRx::default()
        };
        let reply = Arc::new(ReplySlot::new());

        let disposition = RxCommand::StartCapture {
            port: 0,
            pcap_path: PathBuf::from("/tmp/cap0.pcap"),
            limit: 1000,
            reply: Arc::clone(&reply),
        }
        .handle(&mut rx);

        // Failure is a skip for the run loop, but the slot is still answered.
        assert_eq!(disposition, Disposition::Skipped);
        assert!(!reply.wait_for_reply().unwrap());
    }

    #[test]
    fn queue_roundtrip_returns_batch() {
        let mut rx = RecordingRx::default();
        let started = Arc::new(ReplySlot::new());

        let _ = RxCommand::StartQueue {
            port: 1,
            size: 16,
            reply: Arc::clone(&started),
        }
        .handle(&mut rx);
        assert!(started.wait_for_reply().unwrap());

        rx.queues.get_mut(&1).unwrap().push(CapturedPacket {
            port: 1,
            ts: Duration::from_micros(10),
            data: Bytes::from_static(&[0xaa, 0xbb]),
        });

        let reply = Arc::new(ReplySlot::new());
        let disposition = RxCommand::QueueGetPackets {
            port: 1,
            reply: Arc::clone(&reply),
        }
        .handle(&mut rx);

        assert_eq!(disposition, Disposition::Handled);
        let batch = reply.wait_for_reply().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.packets[0].data.as_ref(), &[0xaa, 0xbb]);
    }

    #[test]
    fn features_snapshot_is_structured() {
        let mut rx = RecordingRx::default();
        rx.enable_latency();

        let reply = Arc::new(ReplySlot::new());
        let _ = RxCommand::FeaturesToJson {
            port: 2,
            reply: Arc::clone(&reply),
        }
        .handle(&mut rx);

        let snapshot = reply.wait_for_reply().unwrap();
        assert_eq!(snapshot["port"], 2);
        assert_eq!(snapshot["latency"], true);
    }

    #[test]
    fn latency_toggles() {
        let mut rx = RecordingRx::default();

        assert_eq!(RxCommand::EnableLatency.handle(&mut rx), Disposition::Handled);
        assert!(rx.latency);
        assert_eq!(RxCommand::DisableLatency.handle(&mut rx), Disposition::Handled);
        assert!(!rx.latency);
    }

    #[test]
    fn discard_answers_slots_with_sentinels() {
        let capture = Arc::new(ReplySlot::new());
        RxCommand::StartCapture {
            port: 0,
            pcap_path: PathBuf::from("/tmp/never.pcap"),
            limit: 1,
            reply: Arc::clone(&capture),
        }
        .discard();
        assert!(!capture.wait_for_reply().unwrap());

        let packets: Arc<ReplySlot<PacketBatch>> = Arc::new(ReplySlot::new());
        RxCommand::QueueGetPackets {
            port: 0,
            reply: Arc::clone(&packets),
        }
        .discard();
        assert!(packets.wait_for_reply().unwrap().is_empty());

        let features: Arc<ReplySlot<Value>> = Arc::new(ReplySlot::new());
        RxCommand::FeaturesToJson {
            port: 0,
            reply: Arc::clone(&features),
        }
        .discard();
        assert_eq!(features.wait_for_reply().unwrap(), Value::Null);
    }

    #[test]
    fn stop_without_start_is_skipped() {
        let mut rx = RecordingRx::default();
        assert_eq!(
            RxCommand::StopCapture { port: 3 }.handle(&mut rx),
            Disposition::Skipped
        );
        assert_eq!(
            RxCommand::StopQueue { port: 3 }.handle(&mut rx),
            Disposition::Skipped
        );
    }
}
