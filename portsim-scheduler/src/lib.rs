//! # portsim-scheduler
//!
//! Packet scheduling disciplines and the output-port process that drives them.
//!
//! ### Key Submodules:
//! - `discipline`: the [`Discipline`] seam with FIFO, Static Priority, WFQ,
//!   Deficit Round Robin and Virtual Clock
//! - `port`: [`Port`], coupling a discipline with an admission policy, a link
//!   rate and the zero-buffer hand-off flags

pub mod discipline;
pub mod port;

#[cfg(test)]
mod scenarios;

pub use discipline::{
    AnyDiscipline, Discipline, Drr, Fifo, StaticPriority, VirtualClockScheduler, Wfq,
};
pub use port::Port;
