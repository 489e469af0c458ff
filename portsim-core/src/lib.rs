//! # portsim-core
//!
//! Discrete-event foundation for simulating an output port.
//!
//! ### Key Submodules:
//! - `time`: `VirtualClock` in nanoseconds plus transmission-time helpers
//! - `events`: event queue ordered by `(time, insertion)`, the `Engine`, and the
//!   `Process` trait every component implements
//! - `packet` / `flow`: the immutable `Packet` record, per-flow FIFOs and
//!   identifier-keyed parameter tables
//! - `monitor`: read-only snapshots and the per-flow ledger components keep
//! - `io`: producer and sink interfaces with their engine adapters
//!
//! Execution is single-threaded and cooperative: exactly one process runs at a
//! time and every suspension is an explicit `Suspend` value handed back to the
//! engine.

pub mod error;
pub mod events;
pub mod flow;
pub mod io;
pub mod monitor;
pub mod packet;
pub mod time;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::flow::*;
    pub use crate::io::*;
    pub use crate::monitor::*;
    pub use crate::packet::*;
    pub use crate::time::*;
}

pub use error::SimulationError;
