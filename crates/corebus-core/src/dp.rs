use std::thread;

use corebus_msg::{Disposition, DpCommand, DpCore, Message};
use corebus_sync::Consumer;
use tracing::{debug, info, warn};

/// A data-plane core's run loop.
///
/// Owns the command ring consumer and the scheduler state. Commands are
/// dispatched in arrival order, exactly once each; a skipped command is
/// logged and never aborts the loop. After a quit disposition everything
/// still queued is discarded, not dispatched.
pub struct DpWorker<C: DpCore> {
    commands: Consumer<DpCommand>,
    core: C,
}

impl<C: DpCore + 'static> DpWorker<C> {
    pub fn new(commands: Consumer<DpCommand>, core: C) -> Self {
        Self { commands, core }
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }

    /// Drain and dispatch everything currently queued.
    ///
    /// Returns false once a handler requested scheduler exit; the remaining
    /// queue has been discarded at that point.
    pub fn poll(&mut self) -> bool {
        while let Some(command) = self.commands.pop() {
            match command.handle(&mut self.core) {
                Disposition::Handled => {}
                Disposition::Skipped => {
                    debug!(core = %self.core.id(), "command skipped");
                }
                Disposition::Quit => {
                    info!(core = %self.core.id(), "scheduler exit requested");
                    self.drain_discard();
                    return false;
                }
            }
        }
        true
    }

    /// Spin the cooperative loop until told to quit, yielding between empty
    /// drains. Returns the core state for inspection.
    pub fn run(self) -> C {
        self.run_with(|_| {})
    }

    /// Like [`run`](Self::run), with a work hook invoked between drains:
    /// the slot where the packet scheduler does its per-iteration work.
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
            warn!(core = %self.core.id(), discarded, "commands discarded after quit");
        }
    }
}
