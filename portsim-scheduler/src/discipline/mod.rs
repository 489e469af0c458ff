//! ## portsim-scheduler::discipline
//! **Serving policies**
//!
//! A discipline owns every per-flow queue and all per-flow state behind one
//! port. It is told about arrivals and asked for the next packet whenever the
//! port's link goes idle; it never sees admission decisions or timing.
//!
//! Per-flow state is created on a flow's first packet and kept for the whole
//! run, so fairness history survives idle periods.

use portsim_config::{DisciplineConfig, FlowParams};
use portsim_core::flow::{FlowId, FlowTable};
use portsim_core::packet::Packet;
use portsim_core::time::SimTime;
use portsim_core::SimulationError;

mod drr;
mod fifo;
mod priority;
mod virtual_clock;
mod wfq;

pub use drr::Drr;
pub use fifo::Fifo;
pub use priority::StaticPriority;
pub use virtual_clock::VirtualClockScheduler;
pub use wfq::Wfq;

pub trait Discipline {
    fn kind(&self) -> &'static str;

    /// Takes ownership of an admitted packet. Fails if the packet's flow has
    /// no configured parameters.
    fn enqueue(&mut self, packet: Packet, now: SimTime) -> Result<(), SimulationError>;

    /// Selects the next packet to transmit, re-evaluated on every call.
    fn dequeue(&mut self, now: SimTime) -> Option<Packet>;

    /// Packets currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Converts a configured per-flow list into a lookup table.
pub fn flow_table<T: Clone>(params: &FlowParams<T>) -> FlowTable<T> {
    FlowTable::sparse(
        params
            .entries()
            .into_iter()
            .map(|(flow, value)| (FlowId(flow), value)),
    )
}

/// A discipline chosen at run time from configuration.
#[derive(Debug)]
pub enum AnyDiscipline {
    Fifo(Fifo),
    StaticPriority(StaticPriority),
    Wfq(Wfq),
    Drr(Drr),
    VirtualClock(VirtualClockScheduler),
}

impl AnyDiscipline {
    /// `rate_bps` is the port's link rate; WFQ cannot run without one.
    pub fn from_config(
        config: &DisciplineConfig,
        rate_bps: Option<f64>,
    ) -> Result<Self, SimulationError> {
        Ok(match config {
            DisciplineConfig::Fifo => AnyDiscipline::Fifo(Fifo::new()),
            DisciplineConfig::StaticPriority { priorities } => {
                AnyDiscipline::StaticPriority(StaticPriority::new(flow_table(priorities))?)
            }
            DisciplineConfig::Wfq { weights } => {
                let rate = rate_bps.ok_or_else(|| {
                    SimulationError::config("WFQ needs a port rate to advance virtual time")
                })?;
                AnyDiscipline::Wfq(Wfq::new(flow_table(weights), rate)?)
            }
            DisciplineConfig::Drr {
                weights,
                min_quantum,
            } => AnyDiscipline::Drr(Drr::new(flow_table(weights), *min_quantum)?),
            DisciplineConfig::VirtualClock {
                weights,
                max_credit_secs,
            } => AnyDiscipline::VirtualClock(VirtualClockScheduler::new(
                flow_table(weights),
                *max_credit_secs,
            )?),
        })
    }

    fn inner(&self) -> &dyn Discipline {
        match self {
            AnyDiscipline::Fifo(d) => d,
            AnyDiscipline::StaticPriority(d) => d,
            AnyDiscipline::Wfq(d) => d,
            AnyDiscipline::Drr(d) => d,
            AnyDiscipline::VirtualClock(d) => d,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Discipline {
        match self {
            AnyDiscipline::Fifo(d) => d,
            AnyDiscipline::StaticPriority(d) => d,
            AnyDiscipline::Wfq(d) => d,
            AnyDiscipline::Drr(d) => d,
            AnyDiscipline::VirtualClock(d) => d,
        }
    }
}

impl Discipline for AnyDiscipline {
    fn kind(&self) -> &'static str {
        self.inner().kind()
    }

    fn enqueue(&mut self, packet: Packet, now: SimTime) -> Result<(), SimulationError> {
        self.inner_mut().enqueue(packet, now)
    }

    fn dequeue(&mut self, now: SimTime) -> Option<Packet> {
        self.inner_mut().dequeue(now)
    }

    fn len(&self) -> usize {
        self.inner().len()
    }
}
