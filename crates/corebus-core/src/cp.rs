use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use corebus_msg::{
    CompiledStreams, CoreId, DpCommand, EventId, Message, PacketBatch, PortId, PushPcap,
    RxCommand, StartTraffic, StopTraffic,
};
use corebus_sync::{Producer, PushError, ReplySlot, DEFAULT_BACKOFF, DEFAULT_TIMEOUT};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ControlError, Result};
use crate::fabric::{CoreRegistry, CpSide, DpAttachment};
use crate::ledger::EventLedger;

/// The control plane's handle over the fabric.
///
/// Mints event ids, sends commands (broadcast fans out via `clone()`, one
/// owned instance per destination core), drains DP notifications into the
/// event ledger, and waits on reply slots for the RX request/reply calls.
/// This is the only place in the system that ever blocks, and it only ever
/// polls with a bounded budget.
pub struct Controller {
    registry: CoreRegistry,
    dp: Vec<DpAttachment>,
    rx_core: CoreId,
    rx_commands: Producer<RxCommand>,
    ledger: EventLedger,
    next_event: u64,
    reply_timeout: Duration,
    reply_backoff: Duration,
}

impl Controller {
    pub fn new(cp: CpSide) -> Self {
        Self {
            registry: cp.registry,
            dp: cp.dp,
            rx_core: cp.rx_core,
            rx_commands: cp.rx_commands,
            ledger: EventLedger::new(),
            next_event: 0,
            reply_timeout: DEFAULT_TIMEOUT,
            reply_backoff: DEFAULT_BACKOFF,
        }
    }

    /// Override the wait budget used for reply slots and event waits.
    pub fn with_reply_budget(mut self, timeout: Duration, backoff: Duration) -> Self {
        self.reply_timeout = timeout;
        self.reply_backoff = backoff;
        self
    }

    pub fn registry(&self) -> &CoreRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    pub fn dp_cores(&self) -> Vec<CoreId> {
        self.dp.iter().map(|a| a.core).collect()
    }

    fn mint_event(&mut self) -> EventId {
        self.next_event += 1;
        EventId(self.next_event)
    }

    /// Send one command to one DP core. A bounced command is discarded (its
    /// resources released, its slots answered) before the error returns.
    pub fn send_dp(&mut self, core: CoreId, command: DpCommand) -> Result<()> {
        let attachment = self
            .dp
            .iter_mut()
            .find(|a| a.core == core)
            .ok_or(ControlError::UnknownCore(core))?;

        match attachment.commands.push(command) {
            Ok(()) => Ok(()),
            Err(PushError::Full(command)) => {
                command.discard();
                Err(ControlError::Backpressure(core))
            }
            Err(PushError::Disconnected(command)) => {
                command.discard();
                Err(ControlError::CoreGone(core))
            }
        }
    }

    /// Fan one logical command out to every DP core, one clone per core.
    pub fn broadcast_dp(&mut self, command: DpCommand) -> Result<()> {
        let cores = self.dp_cores();
        if let Some((last, rest)) = cores.split_last() {
            for core in rest {
                self.send_dp(*core, command.clone())?;
            }
            self.send_dp(*last, command)?;
        }
        Ok(())
    }

    /// Start generating a compiled program on `port` across all DP cores.
    /// Returns the event id the cores will echo on completion.
    pub fn start_traffic(
        &mut self,
        port: PortId,
        streams: CompiledStreams,
        duration: Option<Duration>,
    ) -> Result<EventId> {
        let event = self.mint_event();
        info!(port, %event, ?duration, "starting traffic");
        self.broadcast_dp(DpCommand::Start(StartTraffic {
            port,
            event,
            streams,
            duration,
        }))?;
        Ok(event)
    }

    /// Unconditional stop on every DP core.
    pub fn stop_traffic(&mut self, port: PortId) -> Result<()> {
        self.stop_with(port, None)
    }

    /// Stop that only applies to the generation tagged `event`; a stale
    /// stop against a newer generation is a designed no-op on the core.
    pub fn stop_traffic_for_event(&mut self, port: PortId, event: EventId) -> Result<()> {
        self.stop_with(port, Some(event))
    }

    fn stop_with(&mut self, port: PortId, event: Option<EventId>) -> Result<()> {
        info!(port, event = ?event, "stopping traffic");
        for core in self.dp_cores() {
            let mut stop = StopTraffic::new(port);
            if let Some(event) = event {
                stop.set_event(event);
                stop.set_wait_for_event(true);
            }
            stop.set_origin(core);
            self.send_dp(core, DpCommand::Stop(stop))?;
        }
        Ok(())
    }

    pub fn pause_traffic(&mut self, port: PortId) -> Result<()> {
        self.broadcast_dp(DpCommand::Pause { port })
    }

    pub fn resume_traffic(&mut self, port: PortId) -> Result<()> {
        self.broadcast_dp(DpCommand::Resume { port })
    }

    /// Adjust the rate multiplier of running traffic, no restart.
    pub fn update_traffic(&mut self, port: PortId, factor: f64) -> Result<()> {
        self.broadcast_dp(DpCommand::Update { port, factor })
    }

    /// Start a bounded, file-sourced transmission on one core.
    pub fn push_pcap(&mut self, core: CoreId, mut push: PushPcap) -> Result<EventId> {
        let event = self.mint_event();
        push.event = event;
        info!(core = %core, port = push.port, %event, path = %push.pcap_path.display(), "pcap push");
        self.send_dp(core, DpCommand::PushPcap(push))?;
        Ok(event)
    }

    /// Drain every DP→CP ring into the event ledger. The CP's own
    /// processing loop; non-blocking.
    pub fn process_events(&mut self) {
        for attachment in &mut self.dp {
            while let Some(event) = attachment.events.pop() {
                let _ = event.handle(&mut self.ledger);
            }
        }
    }

    /// Block until `arrivals` cores have reported (port, event), with the
    /// configured budget. Returns the AND-aggregated status.
    pub fn wait_event(
        &mut self,
        port: PortId,
        event: EventId,
        arrivals: u32,
        timeout: Duration,
    ) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            self.process_events();
            if let Some(record) = self.ledger.record(port, event) {
                if record.arrivals >= arrivals {
                    return Ok(record.ok);
                }
            }
            if Instant::now() >= deadline {
                return Err(ControlError::EventTimeout {
                    port,
                    event,
                    timeout,
                });
            }
            thread::sleep(self.reply_backoff);
        }
    }

    /// Send a barrier to one DP core and wait until it is reached.
    ///
    /// On return, every command sent to that core before the barrier has
    /// been dispatched. Nothing is implied about other cores, or about
    /// commands sent after the barrier.
    pub fn barrier(&mut self, core: CoreId, port: PortId, timeout: Duration) -> Result<EventId> {
        let event = self.mint_event();
        debug!(core = %core, port, %event, "barrier");
        self.send_dp(core, DpCommand::Barrier { port, event })?;
        self.wait_event(port, event, 1, timeout)?;
        Ok(event)
    }

    fn send_rx(&mut self, command: RxCommand) -> Result<()> {
        match self.rx_commands.push(command) {
            Ok(()) => Ok(()),
            Err(PushError::Full(command)) => {
                command.discard();
                Err(ControlError::Backpressure(self.rx_core))
            }
            Err(PushError::Disconnected(command)) => {
                command.discard();
                Err(ControlError::CoreGone(self.rx_core))
            }
        }
    }

    fn wait_reply<T>(&self, slot: &ReplySlot<T>) -> Result<T> {
        slot.wait_with(self.reply_timeout, self.reply_backoff)
            .map_err(|source| ControlError::Reply {
                core: self.rx_core,
                source,
            })
    }

    pub fn enable_latency(&mut self) -> Result<()> {
        self.send_rx(RxCommand::EnableLatency)
    }

    pub fn disable_latency(&mut self) -> Result<()> {
        self.send_rx(RxCommand::DisableLatency)
    }

    /// Ask the RX core to start a capture; blocks for the acknowledgement.
    pub fn start_capture(&mut self, port: PortId, pcap_path: PathBuf, limit: u64) -> Result<bool> {
        let reply = Arc::new(ReplySlot::new());
        self.send_rx(RxCommand::StartCapture {
            port,
            pcap_path,
            limit,
            reply: Arc::clone(&reply),
        })?;
        self.wait_reply(&reply)
    }

    pub fn stop_capture(&mut self, port: PortId) -> Result<()> {
        self.send_rx(RxCommand::StopCapture { port })
    }

    /// Ask the RX core to start queueing packets; blocks for the
    /// acknowledgement.
    pub fn start_queue(&mut self, port: PortId, size: u64) -> Result<bool> {
        let reply = Arc::new(ReplySlot::new());
        self.send_rx(RxCommand::StartQueue {
            port,
            size,
            reply: Arc::clone(&reply),
        })?;
        self.wait_reply(&reply)
    }

    pub fn stop_queue(&mut self, port: PortId) -> Result<()> {
        self.send_rx(RxCommand::StopQueue { port })
    }

    /// Fetch whatever the RX queue for `port` holds; blocks for the batch.
    pub fn queue_packets(&mut self, port: PortId) -> Result<PacketBatch> {
        let reply = Arc::new(ReplySlot::new());
        self.send_rx(RxCommand::QueueGetPackets {
            port,
            reply: Arc::clone(&reply),
        })?;
        self.wait_reply(&reply)
    }

    /// Diagnostic snapshot of the RX features on `port`; blocks for it.
    pub fn rx_features(&mut self, port: PortId) -> Result<Value> {
        let reply = Arc::new(ReplySlot::new());
        self.send_rx(RxCommand::FeaturesToJson {
            port,
            reply: Arc::clone(&reply),
        })?;
        self.wait_reply(&reply)
    }

    /// Ask every DP core to exit once its ports are idle.
    pub fn quit_dp_when_idle(&mut self) -> Result<()> {
        self.broadcast_dp(DpCommand::CanQuit)
    }

    /// Unconditional shutdown of every DP core.
    pub fn quit_dp(&mut self) -> Result<()> {
        self.broadcast_dp(DpCommand::Quit)
    }

    pub fn quit_rx(&mut self) -> Result<()> {
        self.send_rx(RxCommand::Quit)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use corebus_msg::{DpEvent, PortEvent, StreamProgram};

    use crate::fabric::fabric;

    use super::*;

    fn controller(dp_cores: usize) -> (Controller, Vec<crate::fabric::DpSide>, crate::fabric::RxSide)
    {
        let (cp, dp, rx) = fabric(dp_cores, 8);
        let controller = Controller::new(cp)
            .with_reply_budget(Duration::from_millis(50), Duration::from_millis(1));
        (controller, dp, rx)
    }

    #[test]
    fn broadcast_delivers_one_instance_per_core() {
        let (mut controller, mut dp, _rx) = controller(3);

        controller.broadcast_dp(DpCommand::CanQuit).unwrap();

        for side in &mut dp {
            assert!(matches!(side.commands.pop(), Some(DpCommand::CanQuit)));
            assert!(side.commands.pop().is_none());
        }
    }

    #[test]
    fn start_mints_fresh_event_ids() {
        let (mut controller, mut dp, _rx) = controller(1);
        let program = Arc::new(StreamProgram::new(Vec::new()));

        let first = controller
            .start_traffic(0, Arc::clone(&program), None)
            .unwrap();
        let second = controller.start_traffic(1, program, None).unwrap();
        assert_ne!(first, second);

        match dp[0].commands.pop() {
            Some(DpCommand::Start(start)) => assert_eq!(start.event, first),
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn guarded_stop_carries_event_and_origin() {
        let (mut controller, mut dp, _rx) = controller(2);

        controller.stop_traffic_for_event(0, EventId(42)).unwrap();

        for side in &mut dp {
            match side.commands.pop() {
                Some(DpCommand::Stop(stop)) => {
                    assert!(stop.waits_for_event());
                    assert_eq!(stop.event(), EventId(42));
                    assert_eq!(stop.origin(), Some(side.core));
                }
                other => panic!("expected stop, got {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_core_is_an_error() {
        let (mut controller, _dp, _rx) = controller(1);

        let err = controller.send_dp(CoreId(99), DpCommand::Quit).unwrap_err();
        assert!(matches!(err, ControlError::UnknownCore(CoreId(99))));
    }

    #[test]
    fn full_ring_discards_and_reports_backpressure() {
        let (mut controller, dp, _rx) = controller(1);
        let core = dp[0].core;

        let streams: CompiledStreams = Arc::new(StreamProgram::new(Vec::new()));
        let weak = Arc::downgrade(&streams);

        for _ in 0..8 {
            controller.send_dp(core, DpCommand::CanQuit).unwrap();
        }
        let err = controller
            .send_dp(
                core,
                DpCommand::Start(StartTraffic {
                    port: 0,
                    event: EventId(1),
                    streams,
                    duration: None,
                }),
            )
            .unwrap_err();

        assert!(matches!(err, ControlError::Backpressure(_)));
        // The bounced command went through the discard path.
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn wait_event_times_out_without_notification() {
        let (mut controller, _dp, _rx) = controller(1);

        let err = controller
            .wait_event(0, EventId(5), 1, Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, ControlError::EventTimeout { .. }));
    }

    #[test]
    fn wait_event_resolves_once_all_cores_report() {
        let (mut controller, mut dp, _rx) = controller(2);

        let core0 = dp[0].core;
        dp[0]
            .events
            .push(DpEvent::Port(PortEvent::new(core0, 0, EventId(3))))
            .unwrap();

        // One of two arrivals: must still time out.
        let err = controller
            .wait_event(0, EventId(3), 2, Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, ControlError::EventTimeout { .. }));

        let core1 = dp[1].core;
        dp[1]
            .events
            .push(DpEvent::Port(PortEvent::new(core1, 0, EventId(3))))
            .unwrap();
        let ok = controller
            .wait_event(0, EventId(3), 2, Duration::from_millis(100))
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn rx_reply_times_out_when_core_never_answers() {
        let (mut controller, _dp, _rx) = controller(1);

        // The RX side exists but nothing drains it.
        let err = controller
            .start_capture(0, PathBuf::from("/tmp/never.pcap"), 10)
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::Reply {
                source: corebus_sync::ReplyError::Timeout(_),
                ..
            }
        ));
    }

    #[test]
    fn rx_send_after_core_exit_fails_fast() {
        let (mut controller, _dp, rx) = controller(1);
        drop(rx);

        let err = controller.enable_latency().unwrap_err();
        assert!(matches!(err, ControlError::CoreGone(_)));
    }
}
