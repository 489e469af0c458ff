//! ## portsim-core::events
//! **Virtual-time event engine**
//!
//! Every pending event sits in one binary heap ordered by `(time, insertion
//! sequence)`, so runs with identical inputs replay identically. A process is
//! resumed by the engine, does its work, and returns a [`Suspend`] that says
//! when it wants to run again:
//!
//! - `After(d)`: sleep for a positive virtual duration (e.g. while sending)
//! - `UntilNotified`: block until a producer signals "queue became non-empty"
//! - `Done`: never resume again
//!
//! Packets travel between processes as [`Message`]s delivered at the sender's
//! current time.

mod engine;
mod process;
mod queue;

pub use engine::{Engine, ProcessState, RunSummary};
pub use process::{Context, Message, Process, ProcessId, Suspend};
pub use queue::{EventKind, EventQueue, ScheduledEvent};
