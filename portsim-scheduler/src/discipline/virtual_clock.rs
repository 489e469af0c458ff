//! Virtual Clock.
//!
//! Every flow carries its own clock in seconds, started at the arrival time
//! of its first packet. Each selection picks the backlogged flow with the
//! smallest clock (earliest head arrival on ties) and advances that clock by
//! `bits / weight`, the packet's transmission time at the flow's reserved rate.
//! There is no system-wide virtual time.
//!
//! A flow that idles keeps its old clock and so catches up on its unused
//! reservation later. With `max_credit` the clock is first raised to at least
//! `now - max_credit`, which bounds that catch-up.

use std::collections::{BTreeMap, VecDeque};

use tracing::trace;

use portsim_core::flow::{FlowId, FlowTable};
use portsim_core::packet::Packet;
use portsim_core::time::{as_secs, SimTime};
use portsim_core::SimulationError;

use super::Discipline;

#[derive(Debug)]
struct ClockedFlow {
    weight: f64,
    clock: f64,
    queue: VecDeque<(u64, Packet)>,
}

#[derive(Debug)]
pub struct VirtualClockScheduler {
    weights: FlowTable<f64>,
    max_credit: Option<f64>,
    flows: BTreeMap<FlowId, ClockedFlow>,
    seq: u64,
    len: usize,
}

impl VirtualClockScheduler {
    /// `weights` are reserved rates in bits per second.
    pub fn new(weights: FlowTable<f64>, max_credit_secs: Option<f64>) -> Result<Self, SimulationError> {
        weights.ensure_positive("virtual clock weight")?;
        if max_credit_secs.is_some_and(|credit| !(credit.is_finite() && credit >= 0.0)) {
            return Err(SimulationError::config(
                "virtual clock max_credit must be zero or positive",
            ));
        }
        Ok(Self {
            weights,
            max_credit: max_credit_secs,
            flows: BTreeMap::new(),
            seq: 0,
            len: 0,
        })
    }

    pub fn clock(&self, flow: FlowId) -> Option<f64> {
        self.flows.get(&flow).map(|state| state.clock)
    }

    fn effective(&self, clock: f64, now: f64) -> f64 {
        match self.max_credit {
            Some(credit) => clock.max(now - credit),
            None => clock,
        }
    }
}

impl Discipline for VirtualClockScheduler {
    fn kind(&self) -> &'static str {
        "virtual_clock"
    }

    fn enqueue(&mut self, packet: Packet, now: SimTime) -> Result<(), SimulationError> {
        let weight = *self.weights.require(packet.flow_id, "virtual_clock")?;
        let state = self.flows.entry(packet.flow_id).or_insert_with(|| ClockedFlow {
            weight,
            clock: as_secs(now),
            queue: VecDeque::new(),
        });
        state.queue.push_back((self.seq, packet));
        self.seq += 1;
        self.len += 1;
        Ok(())
    }

    fn dequeue(&mut self, now: SimTime) -> Option<Packet> {
        let now_secs = as_secs(now);
        let (flow_id, effective) = self
            .flows
            .iter()
            .filter_map(|(flow, state)| {
                let (seq, _) = state.queue.front()?;
                Some((*flow, self.effective(state.clock, now_secs), *seq))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.2.cmp(&b.2)))
            .map(|(flow, effective, _)| (flow, effective))?;

        let state = self.flows.get_mut(&flow_id)?;
        let (_, packet) = state.queue.pop_front()?;
        state.clock = effective + packet.size_bits() / state.weight;
        self.len -= 1;
        trace!(flow = %flow_id, clock = state.clock, "virtual clock selection");
        Some(packet)
    }

    fn len(&self) -> usize {
        self.len
    }
}
