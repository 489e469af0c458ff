//! Flow identifiers, per-flow FIFOs and flow-keyed parameter tables.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::packet::Packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub u32);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FlowId {
    fn from(id: u32) -> Self {
        FlowId(id)
    }
}

/// FIFO of packets with a running byte count.
#[derive(Debug, Default, Clone)]
pub struct FlowQueue {
    packets: VecDeque<Packet>,
    bytes: u64,
}

impl FlowQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, packet: Packet) {
        self.bytes += packet.size;
        self.packets.push_back(packet);
    }

    pub fn pop_front(&mut self) -> Option<Packet> {
        let packet = self.packets.pop_front()?;
        self.bytes -= packet.size;
        Some(packet)
    }

    pub fn front(&self) -> Option<&Packet> {
        self.packets.front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    #[inline]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Packet> {
        self.packets.iter()
    }
}

/// Per-flow parameters (priority, weight, ...) keyed by flow identifier.
///
/// Dense tables use the position as the flow identifier; sparse ones carry
/// explicit identifiers. Lookups of unknown flows are configuration errors.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowTable<T> {
    entries: BTreeMap<FlowId, T>,
}

impl<T> FlowTable<T> {
    pub fn dense(values: Vec<T>) -> Self {
        Self {
            entries: values
                .into_iter()
                .enumerate()
                .map(|(idx, value)| (FlowId(idx as u32), value))
                .collect(),
        }
    }

    pub fn sparse(entries: impl IntoIterator<Item = (FlowId, T)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, flow: FlowId) -> Option<&T> {
        self.entries.get(&flow)
    }

    /// Looks up `flow`, failing with [`SimulationError::UnknownFlow`].
    pub fn require(&self, flow: FlowId, component: &str) -> Result<&T, SimulationError> {
        self.entries
            .get(&flow)
            .ok_or_else(|| SimulationError::UnknownFlow {
                component: component.to_string(),
                flow,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (FlowId, &T)> {
        self.entries.iter().map(|(flow, value)| (*flow, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FlowTable<f64> {
    /// Rejects empty tables and non-positive or non-finite values.
    pub fn ensure_positive(&self, what: &str) -> Result<(), SimulationError> {
        if self.is_empty() {
            return Err(SimulationError::config(format!("{what} table is empty")));
        }
        match self.iter().find(|(_, v)| !(v.is_finite() && **v > 0.0)) {
            Some((flow, value)) => Err(SimulationError::config(format!(
                "{what} for flow {flow} must be positive, got {value}"
            ))),
            None => Ok(()),
        }
    }
}
