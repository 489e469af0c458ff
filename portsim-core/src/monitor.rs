//! Read-only monitoring view of a component.
//!
//! Components keep a [`FlowLedger`] as they admit, drop and send packets; the
//! engine exposes the resulting [`Snapshot`] to samplers without handing out
//! mutable access.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::flow::FlowId;
use crate::packet::Packet;
use crate::time::SimTime;

/// Buffer occupancy as seen by an admission policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub bytes: u64,
    pub packets: usize,
}

impl Occupancy {
    pub fn with_packet(self, packet: &Packet) -> Self {
        Self {
            bytes: self.bytes + packet.size,
            packets: self.packets + 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowStats {
    pub queued_packets: usize,
    pub queued_bytes: u64,
    pub sent_packets: u64,
    pub sent_bytes: u64,
    pub dropped_packets: u64,
    pub last_served: Option<SimTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub received: u64,
    pub dropped: u64,
    pub sent: u64,
    pub queued_packets: usize,
    pub queued_bytes: u64,
    /// Identifier of the packet currently being transmitted.
    pub in_service: Option<u64>,
    pub flows: BTreeMap<FlowId, FlowStats>,
}

impl Snapshot {
    /// Flows holding backlog that have never been served.
    pub fn starved_flows(&self) -> impl Iterator<Item = FlowId> + '_ {
        self.flows
            .iter()
            .filter(|(_, stats)| stats.queued_packets > 0 && stats.sent_packets == 0)
            .map(|(flow, _)| *flow)
    }
}

/// Per-flow bookkeeping shared by every buffering component.
#[derive(Debug, Clone, Default)]
pub struct FlowLedger {
    flows: BTreeMap<FlowId, FlowStats>,
    received: u64,
    dropped: u64,
    sent: u64,
    queued: Occupancy,
}

impl FlowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_arrival(&mut self, packet: &Packet) {
        self.received += 1;
        self.flows.entry(packet.flow_id).or_default();
    }

    pub fn on_enqueue(&mut self, packet: &Packet) {
        self.queued = self.queued.with_packet(packet);
        let stats = self.flows.entry(packet.flow_id).or_default();
        stats.queued_packets += 1;
        stats.queued_bytes += packet.size;
    }

    pub fn on_dequeue(&mut self, packet: &Packet) {
        self.queued.bytes = self.queued.bytes.saturating_sub(packet.size);
        self.queued.packets = self.queued.packets.saturating_sub(1);
        if let Some(stats) = self.flows.get_mut(&packet.flow_id) {
            stats.queued_packets = stats.queued_packets.saturating_sub(1);
            stats.queued_bytes = stats.queued_bytes.saturating_sub(packet.size);
        }
    }

    pub fn on_drop(&mut self, packet: &Packet) {
        self.dropped += 1;
        self.flows.entry(packet.flow_id).or_default().dropped_packets += 1;
    }

    pub fn on_sent(&mut self, packet: &Packet, now: SimTime) {
        self.sent += 1;
        let stats = self.flows.entry(packet.flow_id).or_default();
        stats.sent_packets += 1;
        stats.sent_bytes += packet.size;
        stats.last_served = Some(now);
    }

    /// Bytes and packets currently queued (excluding anything in service).
    pub fn queued(&self) -> Occupancy {
        self.queued
    }

    pub fn flow(&self, flow: FlowId) -> Option<&FlowStats> {
        self.flows.get(&flow)
    }

    pub fn snapshot(&self, in_service: Option<&Packet>) -> Snapshot {
        Snapshot {
            received: self.received,
            dropped: self.dropped,
            sent: self.sent,
            queued_packets: self.queued.packets,
            queued_bytes: self.queued.bytes,
            in_service: in_service.map(|p| p.packet_id),
            flows: self.flows.clone(),
        }
    }
}
