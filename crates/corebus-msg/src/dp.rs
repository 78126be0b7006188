use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, trace};

use crate::dispatch::{Disposition, Message};
use crate::event::PortEvent;
use crate::streams::CompiledStreams;
use crate::types::{CoreId, EventId, PortId};

/// Core-local state a DP worker exposes to its command stream.
///
/// Implemented by the packet scheduler. The messaging layer commands it,
/// inspects per-port generations for stale-stop guards, and routes barrier
/// acknowledgements back to the control plane through it.
pub trait DpCore {
    /// This core's fabric-assigned identifier.
    fn id(&self) -> CoreId;

    /// Begin generating `streams` on `port`, tagged with `event`. Ownership
    /// of the compiled program transfers to the core.
    fn start_traffic(
        &mut self,
        port: PortId,
        event: EventId,
        streams: CompiledStreams,
        duration: Option<Duration>,
    ) -> bool;

    fn stop_traffic(&mut self, port: PortId) -> bool;

    /// Suspend generation without releasing resources.
    fn pause_traffic(&mut self, port: PortId) -> bool;

    fn resume_traffic(&mut self, port: PortId) -> bool;

    /// Adjust the transmit rate multiplier in place, without a restart.
    fn update_rate(&mut self, port: PortId, factor: f64) -> bool;

    /// Begin a bounded, file-sourced transmission on `push.port`.
    fn push_pcap(&mut self, push: PushPcap) -> bool;

    /// Event id of the generation currently active on `port`, if any.
    fn active_event(&self, port: PortId) -> Option<EventId>;

    /// True when no port on this core is generating traffic.
    fn all_ports_idle(&self) -> bool;

    /// Send a notification up to the control plane.
    fn post_event(&mut self, event: PortEvent);
}

/// Payload of [`DpCommand::Start`].
#[derive(Debug, Clone)]
pub struct StartTraffic {
    pub port: PortId,
    pub event: EventId,
    pub streams: CompiledStreams,
    /// `None` transmits until stopped.
    pub duration: Option<Duration>,
}

/// Payload of [`DpCommand::Stop`].
///
/// Constructed unconditional, then narrowed in place before send: the CP
/// attaches an event id and sets the wait flag when the stop must only
/// apply to that generation of traffic, so a stale stop cannot cancel a
/// newer generation on a reused port.
#[derive(Debug, Clone)]
pub struct StopTraffic {
    pub port: PortId,
    event: EventId,
    wait_for_event: bool,
    origin: Option<CoreId>,
}

impl StopTraffic {
    pub fn new(port: PortId) -> Self {
        Self {
            port,
            event: EventId(0),
            wait_for_event: false,
            origin: None,
        }
    }

    pub fn set_event(&mut self, event: EventId) {
        self.event = event;
    }

    pub fn set_wait_for_event(&mut self, wait: bool) {
        self.wait_for_event = wait;
    }

    /// Record which core the stop was issued for.
    pub fn set_origin(&mut self, core: CoreId) {
        self.origin = Some(core);
    }

    pub fn event(&self) -> EventId {
        self.event
    }

    pub fn waits_for_event(&self) -> bool {
        self.wait_for_event
    }

    pub fn origin(&self) -> Option<CoreId> {
        self.origin
    }
}

/// Payload of [`DpCommand::PushPcap`].
#[derive(Debug, Clone)]
pub struct PushPcap {
    pub port: PortId,
    pub event: EventId,
    pub pcap_path: PathBuf,
    /// Fixed inter-packet gap; `None` replays the capture's own timing.
    pub ipg: Option<Duration>,
    pub speedup: f64,
    /// Stop after this many packets; 0 means no packet limit.
    pub count: u32,
    pub duration: Option<Duration>,
    /// Split even/odd packets across a port pair.
    pub is_dual: bool,
}

/// Commands sent from the control plane to a data-plane core.
///
/// Cloneable so one logical command can fan out to several cores. Clones
/// share no mutable state; a compiled stream program is shared read-only.
#[derive(Debug, Clone)]
pub enum DpCommand {
    Start(StartTraffic),
    Pause { port: PortId },
    Resume { port: PortId },
    Stop(StopTraffic),
    /// Adjust the rate multiplier of running traffic.
    Update { port: PortId, factor: f64 },
    PushPcap(PushPcap),
    /// Drain marker: acknowledged to the CP the moment it is dispatched,
    /// proving every command enqueued before it has been processed on this
    /// core. Says nothing about other cores.
    Barrier { port: PortId, event: EventId },
    /// Exit the scheduler only if every port on this core is idle.
    CanQuit,
    /// Exit the scheduler unconditionally.
    Quit,
}

impl Message for DpCommand {
    type Target = dyn DpCore;

    fn handle(self, core: &mut Self::Target) -> Disposition {
        match self {
            DpCommand::Start(StartTraffic {
                port,
                event,
                streams,
                duration,
            }) => {
                if core.start_traffic(port, event, streams, duration) {
                    Disposition::Handled
                } else {
                    Disposition::Skipped
                }
            }
            DpCommand::Pause { port } => {
                if core.pause_traffic(port) {
                    Disposition::Handled
                } else {
                    Disposition::Skipped
                }
            }
            DpCommand::Resume { port } => {
                if core.resume_traffic(port) {
                    Disposition::Handled
                } else {
                    Disposition::Skipped
                }
            }
            DpCommand::Stop(stop) => {
                if stop.waits_for_event() {
                    let active = core.active_event(stop.port);
                    if active != Some(stop.event()) {
                        trace!(
                            port = stop.port,
                            want = %stop.event(),
                            active = ?active,
                            "stale stop, skipping"
                        );
                        return Disposition::Skipped;
                    }
                }
                if core.stop_traffic(stop.port) {
                    Disposition::Handled
                } else {
                    Disposition::Skipped
                }
            }
            DpCommand::Update { port, factor } => {
                if core.update_rate(port, factor) {
                    Disposition::Handled
                } else {
                    Disposition::Skipped
                }
            }
            DpCommand::PushPcap(push) => {
                if core.push_pcap(push) {
                    Disposition::Handled
                } else {
                    Disposition::Skipped
                }
            }
            DpCommand::Barrier { port, event } => {
                let core_id = core.id();
                core.post_event(PortEvent::new(core_id, port, event));
                Disposition::Handled
            }
            DpCommand::CanQuit => {
                if core.all_ports_idle() {
                    Disposition::Quit
                } else {
                    Disposition::Skipped
                }
            }
            DpCommand::Quit => Disposition::Quit,
        }
    }

    fn discard(self) {
        match self {
            DpCommand::Start(start) => {
                debug!(
                    port = start.port,
                    event = %start.event,
                    "discarding start, releasing compiled streams"
                );
                drop(start.streams);
            }
            DpCommand::Stop(stop) => {
                debug!(port = stop.port, origin = ?stop.origin(), "discarding stop");
            }
            other => trace!(command = ?other, "discarding command"),
        }
    }
}
