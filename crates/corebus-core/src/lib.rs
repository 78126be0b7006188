//! Run loops, fabric wiring and the control-plane handle.
//!
//! This is the composition layer: [`fabric`] builds the rings between one
//! control-plane core, N data-plane cores and one RX core; [`DpWorker`] and
//! [`RxWorker`] are the receiving run loops; [`Controller`] is what the
//! control plane holds to drive everything and collect answers.

pub mod cp;
pub mod dp;
pub mod error;
pub mod fabric;
pub mod ledger;
pub mod rx;
pub mod sim;

pub use cp::Controller;
pub use dp::DpWorker;
pub use error::{ControlError, Result};
pub use fabric::{fabric, CoreRegistry, CoreRole, CpSide, DpAttachment, DpSide, RxSide};
pub use ledger::{EventLedger, EventRecord};
pub use rx::RxWorker;
pub use sim::{SimDpCore, SimRxCore};
