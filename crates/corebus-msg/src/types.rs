use std::fmt;

/// Physical port index on the traffic generator.
pub type PortId = u8;

/// Correlation token minted by the control plane.
///
/// Each asynchronous operation on a port gets a fresh event id. The DP core
/// echoes the id back in a [`crate::PortEvent`] when the operation
/// completes, and a later command can be made conditional on it; see
/// [`crate::StopTraffic::set_wait_for_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a core, assigned by the fabric at startup.
///
/// Messages carry core ids instead of references to core state, so a
/// message addressed to a core that has already exited is just discarded
/// rather than dangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoreId(pub u32);

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core-{}", self.0)
    }
}
