/// Outcome of dispatching a message on its destination core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The command took effect.
    Handled,
    /// Designed no-op: stale event id, unknown port, nothing to do. The
    /// run loop logs and continues.
    Skipped,
    /// The handler asks the receiving core's run loop to exit.
    Quit,
}

impl Disposition {
    pub fn is_handled(self) -> bool {
        matches!(self, Disposition::Handled)
    }
}

/// A directed, single-use command object.
///
/// `handle` consumes the message: every instance is dispatched at most
/// once, by the core that currently owns it. `discard` is the only other
/// way out of the pipeline. A message removed before dispatch must still
/// release the resources it owns (and answer any reply slot it carries),
/// so both paths are spelled out for every variant of every family.
pub trait Message {
    /// Core-local state the message operates on.
    type Target: ?Sized;

    /// Dispatch against the receiving core's state.
    #[must_use]
    fn handle(self, target: &mut Self::Target) -> Disposition;

    /// Dispose of a message that will never run.
    fn discard(self);
}
