//! Inter-core command and reply protocol of the corebus traffic generator.
//!
//! One control-plane (CP) core drives many worker cores, data-plane (DP)
//! cores that generate traffic and an RX core that inspects received
//! traffic, without any locking on the hot path. Messages are owned
//! values that cross core boundaries through per-pair FIFO rings; each
//! directed channel has its own closed message family:
//!
//! - [`DpCommand`] — CP→DP traffic control (start/stop/pause/update/...)
//! - [`DpEvent`] — DP→CP completion notifications
//! - [`RxCommand`] — CP→RX capture and latency control
//!
//! Every family implements [`Message`]: a consuming `handle` (dispatched
//! exactly once, on the receiving core) and a `discard` for messages that
//! leave the pipeline without ever running.

pub mod dispatch;
pub mod dp;
pub mod event;
pub mod rx;
pub mod streams;
pub mod types;

pub use dispatch::{Disposition, Message};
pub use dp::{DpCommand, DpCore, PushPcap, StartTraffic, StopTraffic};
pub use event::{DpEvent, EventSink, PortEvent};
pub use rx::{CapturedPacket, PacketBatch, RxCommand, RxCore};
pub use streams::{CompiledStreams, StreamProgram, StreamSpec};
pub use types::{CoreId, EventId, PortId};
