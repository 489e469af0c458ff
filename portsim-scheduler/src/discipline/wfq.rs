//! Weighted Fair Queueing.
//!
//! Each packet is tagged on arrival with
//! `start = max(flow's last finish, V)` and `finish = start + bits / weight`,
//! and packets leave in finish-tag order. System virtual time `V` grows at
//! `rate / (sum of backlogged weights)` while anything is queued. When a
//! packet arrives to an empty system, `V` jumps to the largest finish tag
//! issued so far: it never decreases and no flow keeps credit from before the
//! idle period.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use tracing::trace;

use portsim_core::flow::{FlowId, FlowTable};
use portsim_core::packet::Packet;
use portsim_core::time::{SimTime, NANOS_PER_SEC};
use portsim_core::SimulationError;

use super::Discipline;

#[derive(Debug)]
struct Tagged {
    finish: f64,
    seq: u64,
    packet: Packet,
}

impl PartialEq for Tagged {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Tagged {}

impl Ord for Tagged {
    // Reversed so the max-heap yields the smallest tag, earliest arrival first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .finish
            .total_cmp(&self.finish)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Tagged {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct FlowState {
    last_finish: f64,
    backlog: usize,
}

#[derive(Debug)]
pub struct Wfq {
    weights: FlowTable<f64>,
    rate_bps: f64,
    heap: BinaryHeap<Tagged>,
    flows: BTreeMap<FlowId, FlowState>,
    vtime: f64,
    last_update: SimTime,
    active_weight: f64,
    max_finish: f64,
    seq: u64,
}

impl Wfq {
    pub fn new(weights: FlowTable<f64>, rate_bps: f64) -> Result<Self, SimulationError> {
        weights.ensure_positive("wfq weight")?;
        if !(rate_bps.is_finite() && rate_bps > 0.0) {
            return Err(SimulationError::config(format!(
                "wfq rate must be positive, got {rate_bps}"
            )));
        }
        Ok(Self {
            weights,
            rate_bps,
            heap: BinaryHeap::new(),
            flows: BTreeMap::new(),
            vtime: 0.0,
            last_update: 0,
            active_weight: 0.0,
            max_finish: 0.0,
            seq: 0,
        })
    }

    pub fn virtual_time(&self) -> f64 {
        self.vtime
    }

    /// Finish tag of the most recent packet of `flow`.
    pub fn last_finish(&self, flow: FlowId) -> Option<f64> {
        self.flows.get(&flow).map(|state| state.last_finish)
    }

    fn advance(&mut self, now: SimTime) {
        if now > self.last_update && self.active_weight > 0.0 {
            let elapsed = (now - self.last_update) as f64 / NANOS_PER_SEC;
            self.vtime += self.rate_bps * elapsed / self.active_weight;
        }
        self.last_update = self.last_update.max(now);
    }
}

impl Discipline for Wfq {
    fn kind(&self) -> &'static str {
        "wfq"
    }

    fn enqueue(&mut self, packet: Packet, now: SimTime) -> Result<(), SimulationError> {
        let weight = *self.weights.require(packet.flow_id, "wfq")?;
        self.advance(now);
        if self.heap.is_empty() {
            self.vtime = self.vtime.max(self.max_finish);
        }

        let state = self.flows.entry(packet.flow_id).or_default();
        let start = state.last_finish.max(self.vtime);
        let finish = start + packet.size_bits() / weight;
        state.last_finish = finish;
        if state.backlog == 0 {
            self.active_weight += weight;
        }
        state.backlog += 1;
        self.max_finish = self.max_finish.max(finish);

        trace!(flow = %packet.flow_id, start, finish, vtime = self.vtime, "wfq tag");
        self.heap.push(Tagged {
            finish,
            seq: self.seq,
            packet,
        });
        self.seq += 1;
        Ok(())
    }

    fn dequeue(&mut self, now: SimTime) -> Option<Packet> {
        self.advance(now);
        let Tagged { packet, .. } = self.heap.pop()?;
        if let Some(state) = self.flows.get_mut(&packet.flow_id) {
            state.backlog -= 1;
            if state.backlog == 0 {
                if let Some(weight) = self.weights.get(packet.flow_id) {
                    self.active_weight -= weight;
                }
            }
        }
        if self.heap.is_empty() {
            self.active_weight = 0.0;
        }
        Some(packet)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}
