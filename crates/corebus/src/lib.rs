//! Inter-core command and reply messaging for multi-core traffic generators.
//!
//! corebus is the control protocol between one control-plane core and its
//! worker cores: data-plane cores generating traffic, and an RX core
//! inspecting received traffic. It is built entirely on ownership transfer
//! and polling, with no locks on the hot path.
//!
//! # Crate Structure
//!
//! - [`sync`] — reply slots and SPSC rings (the cross-core primitives)
//! - [`msg`] — the three message families and their dispatch contract
//! - [`runtime`] — run loops, fabric wiring, and the control-plane handle

/// Re-export synchronization primitives.
pub mod sync {
    pub use corebus_sync::*;
}

/// Re-export message types.
pub mod msg {
    pub use corebus_msg::*;
}

/// Re-export run loops and the control-plane handle.
pub mod runtime {
    pub use corebus_core::*;
}
