//! Deficit Round Robin.
//!
//! Backlogged flows sit in a round-robin list. Each visit adds the flow's
//! quantum to its deficit once, then sends head packets while the deficit
//! covers them. A visit ends when the head no longer fits (the flow moves to
//! the back and keeps its remainder) or when the flow empties (the flow leaves
//! the list and its deficit is reset to zero). Flows with nothing queued are
//! not in the list and accrue nothing.
//!
//! Quanta are `ceil(min_quantum * weight / smallest weight)`, so the lightest
//! flow gets exactly `min_quantum` bytes per round.

use std::collections::{BTreeMap, VecDeque};

use tracing::trace;

use portsim_core::flow::{FlowId, FlowQueue, FlowTable};
use portsim_core::packet::Packet;
use portsim_core::time::SimTime;
use portsim_core::SimulationError;

use super::Discipline;

#[derive(Debug)]
struct DrrFlow {
    queue: FlowQueue,
    deficit: u64,
    quantum: u64,
}

#[derive(Debug)]
pub struct Drr {
    quanta: FlowTable<u64>,
    flows: BTreeMap<FlowId, DrrFlow>,
    active: VecDeque<FlowId>,
    /// The flow at the front of `active` already received this visit's quantum.
    visiting: bool,
    len: usize,
}

impl Drr {
    pub fn new(weights: FlowTable<f64>, min_quantum: u64) -> Result<Self, SimulationError> {
        weights.ensure_positive("drr weight")?;
        if min_quantum == 0 {
            return Err(SimulationError::config("drr min_quantum must be positive"));
        }
        let lightest = weights.values().copied().fold(f64::INFINITY, f64::min);
        let quanta = FlowTable::sparse(weights.iter().map(|(flow, weight)| {
            let quantum = (min_quantum as f64 * weight / lightest).ceil() as u64;
            (flow, quantum.max(min_quantum))
        }));
        Ok(Self {
            quanta,
            flows: BTreeMap::new(),
            active: VecDeque::new(),
            visiting: false,
            len: 0,
        })
    }

    pub fn quantum(&self, flow: FlowId) -> Option<u64> {
        self.quanta.get(flow).copied()
    }

    /// Current deficit of `flow`; zero for flows never seen.
    pub fn deficit(&self, flow: FlowId) -> u64 {
        self.flows.get(&flow).map_or(0, |state| state.deficit)
    }

    /// The flow whose visit is in progress, if any.
    pub fn visiting(&self) -> Option<FlowId> {
        if self.visiting {
            self.active.front().copied()
        } else {
            None
        }
    }

    /// Backlogged flows in service order.
    pub fn round_order(&self) -> impl Iterator<Item = FlowId> + '_ {
        self.active.iter().copied()
    }

    fn end_visit(&mut self) {
        self.visiting = false;
        if let Some(flow) = self.active.pop_front() {
            self.active.push_back(flow);
        }
    }

    fn retire_front(&mut self) {
        self.visiting = false;
        if let Some(flow) = self.active.pop_front() {
            if let Some(state) = self.flows.get_mut(&flow) {
                state.deficit = 0;
            }
        }
    }
}

impl Discipline for Drr {
    fn kind(&self) -> &'static str {
        "drr"
    }

    fn enqueue(&mut self, packet: Packet, _now: SimTime) -> Result<(), SimulationError> {
        let quantum = *self.quanta.require(packet.flow_id, "drr")?;
        let flow_id = packet.flow_id;
        let state = self.flows.entry(flow_id).or_insert_with(|| DrrFlow {
            queue: FlowQueue::new(),
            deficit: 0,
            quantum,
        });
        let was_empty = state.queue.is_empty();
        state.queue.push_back(packet);
        self.len += 1;
        if was_empty {
            self.active.push_back(flow_id);
        }
        Ok(())
    }

    fn dequeue(&mut self, _now: SimTime) -> Option<Packet> {
        while let Some(&flow_id) = self.active.front() {
            let Some(state) = self.flows.get_mut(&flow_id) else {
                self.retire_front();
                continue;
            };
            if !self.visiting {
                state.deficit += state.quantum;
                self.visiting = true;
                trace!(flow = %flow_id, deficit = state.deficit, "drr visit");
            }

            let Some(head) = state.queue.front().map(|p| p.size) else {
                self.retire_front();
                continue;
            };
            if state.deficit < head {
                self.end_visit();
                continue;
            }

            let packet = state.queue.pop_front()?;
            state.deficit -= head;
            self.len -= 1;
            if state.queue.is_empty() {
                self.retire_front();
            }
            return Some(packet);
        }
        None
    }

    fn len(&self) -> usize {
        self.len
    }
}
