use corebus_msg::{CoreId, DpCommand, DpEvent, RxCommand};
use corebus_sync::{ring, Consumer, Producer};

/// Default depth of every command/event ring.
pub const DEFAULT_RING_CAPACITY: usize = 256;

/// Role a core plays in the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreRole {
    Cp,
    Dp,
    Rx,
}

/// Maps fabric-assigned core ids to roles.
///
/// Messages refer to cores by [`CoreId`] only; the registry is where an id
/// is resolved when the control plane needs to know what it is talking to.
#[derive(Debug, Clone, Default)]
pub struct CoreRegistry {
    roles: Vec<CoreRole>,
}

impl CoreRegistry {
    fn assign(&mut self, role: CoreRole) -> CoreId {
        let id = CoreId(self.roles.len() as u32);
        self.roles.push(role);
        id
    }

    pub fn role(&self, core: CoreId) -> Option<CoreRole> {
        self.roles.get(core.0 as usize).copied()
    }

    pub fn cores_with(&self, role: CoreRole) -> impl Iterator<Item = CoreId> + '_ {
        self.roles
            .iter()
            .enumerate()
            .filter(move |(_, r)| **r == role)
            .map(|(i, _)| CoreId(i as u32))
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// CP-side handles to one DP core: its command ring and its event ring.
pub struct DpAttachment {
    pub core: CoreId,
    pub commands: Producer<DpCommand>,
    pub events: Consumer<DpEvent>,
}

/// Everything the control-plane core holds after fabric construction.
pub struct CpSide {
    pub core: CoreId,
    pub registry: CoreRegistry,
    pub dp: Vec<DpAttachment>,
    pub rx_core: CoreId,
    pub rx_commands: Producer<RxCommand>,
}

/// Everything one data-plane core holds.
pub struct DpSide {
    pub core: CoreId,
    pub commands: Consumer<DpCommand>,
    pub events: Producer<DpEvent>,
}

/// Everything the RX core holds.
pub struct RxSide {
    pub core: CoreId,
    pub commands: Consumer<RxCommand>,
}

/// Wire up one CP core, `dp_cores` data-plane cores and one RX core.
///
/// Every sender-receiver pair gets its own SPSC ring, so ordering is FIFO
/// per pair and nothing else. That is exactly the transport assumption the
/// event-id correlation scheme compensates for.
pub fn fabric(dp_cores: usize, capacity: usize) -> (CpSide, Vec<DpSide>, RxSide) {
    assert!(dp_cores > 0, "at least one DP core is required");

    let mut registry = CoreRegistry::default();
    let cp_core = registry.assign(CoreRole::Cp);

    let mut attachments = Vec::with_capacity(dp_cores);
    let mut dp_sides = Vec::with_capacity(dp_cores);

    for _ in 0..dp_cores {
        let core = registry.assign(CoreRole::Dp);
        let (cmd_tx, cmd_rx) = ring(capacity);
        let (event_tx, event_rx) = ring(capacity);

        attachments.push(DpAttachment {
            core,
            commands: cmd_tx,
            events: event_rx,
        });
        dp_sides.push(DpSide {
            core,
            commands: cmd_rx,
            events: event_tx,
        });
    }

    let rx_core = registry.assign(CoreRole::Rx);
    let (rx_tx, rx_rx) = ring(capacity);

    (
        CpSide {
            core: cp_core,
            registry,
            dp: attachments,
            rx_core,
            rx_commands: rx_tx,
        },
        dp_sides,
        RxSide {
            core: rx_core,
            commands: rx_rx,
        },
    )
}
