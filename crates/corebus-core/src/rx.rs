use std::thread;

use corebus_msg::{Disposition, Message, RxCommand, RxCore};
use corebus_sync::Consumer;
use tracing::{debug, info, warn};

/// The RX core's run loop. Same contract as [`crate::DpWorker`]: in-order
/// single dispatch, log-and-continue on skips, discard after quit, which
/// for RX also answers any queued reply slots with sentinels.
pub struct RxWorker<C: RxCore> {
    commands: Consumer<RxCommand>,
    core: C,
}

impl<C: RxCore + 'static> RxWorker<C> {
    pub fn new(commands: Consumer<RxCommand>, core: C) -> Self {
        Self { commands, core }
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }

    /// Drain and dispatch everything currently queued. Returns false once a
    /// handler requested exit.
    pub fn poll(&mut self) -> bool {
        while let Some(command) = self.commands.pop() {
            match command.handle(&mut self.core) {
                Disposition::Handled => {}
                Disposition::Skipped => {
                    debug!("rx command skipped");
                }
                Disposition::Quit => {
                    info!("rx core exit requested");
                    self.drain_discard();
                    return false;
                }
            }
        }
        true
    }

    /// Spin until told to quit. Returns the core state for inspection.
    pub fn run(self) -> C {
        self.run_with(|_| {})
    }

    /// Like [`run`](Self::run), with a work hook invoked between drains:
    /// where the real core polls its receive queues.
    pub fn run_with<F: FnMut(&mut C)>(mut self, mut work: F) -> C {
        loop {
            if !self.poll() {
                return self.core;
            }
            work(&mut self.core);
            thread::yield_now();
        }
    }

    fn drain_discard(&mut self) {
        let mut discarded = 0usize;
        while let Some(command) = self.commands.pop() {
            command.discard();
            discarded += 1;
        }
        if discarded > 0 {
            warn!(discarded, "rx commands discarded after quit");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use corebus_msg::{PacketBatch, PortId};
    use corebus_sync::{ring, ReplySlot};
    use serde_json::{json, Value};

    use super::*;

    #[derive(Default)]
    struct NullRx {
        latency: bool,
    }

    impl RxCore for NullRx {
        fn enable_latency(&mut self) {
            self.latency = true;
        }

        fn disable_latency(&mut self) {
            self.latency = false;
        }

        fn start_capture(&mut self, _port: PortId, _pcap_path: PathBuf, _limit: u64) -> bool {
            true
        }

        fn stop_capture(&mut self, _port: PortId) -> bool {
            true
        }

        fn start_queue(&mut self, _port: PortId, _size: u64) -> bool {
            true
        }

        fn stop_queue(&mut self, _port: PortId) -> bool {
            true
        }

        fn queue_packets(&mut self, _port: PortId) -> PacketBatch {
            PacketBatch::default()
        }

        fn features_to_json(&self, port: PortId) -> Value {
            json!({ "port": port })
        }
    }

    #[test]
    fn runs_until_quit() {
        let (mut tx, rx) = ring(8);
        tx.push(RxCommand::EnableLatency).unwrap();
        tx.push(RxCommand::Quit).unwrap();

        let core = RxWorker::new(rx, NullRx::default()).run();
        assert!(core.latency);
    }

    #[test]
    fn quit_answers_queued_reply_slots() {
        let reply = Arc::new(ReplySlot::new());

        let (mut tx, rx) = ring(8);
        tx.push(RxCommand::Quit).unwrap();
        tx.push(RxCommand::StartCapture {
            port: 0,
            pcap_path: PathBuf::from("/tmp/late.pcap"),
            limit: 1,
            reply: Arc::clone(&reply),
        })
        .unwrap();

        let _ = RxWorker::new(rx, NullRx::default()).run();

        // Discarded, not dispatched; the slot still got its sentinel.
        assert!(!reply.wait_for_reply().unwrap());
    }
}
