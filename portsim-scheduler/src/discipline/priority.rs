use std::collections::{BTreeMap, VecDeque};

use portsim_core::flow::FlowTable;
use portsim_core::packet::Packet;
use portsim_core::time::SimTime;
use portsim_core::SimulationError;

use super::Discipline;

/// Strict priority: class 0 is served first, then 1, and so on.
///
/// Non-preemptive by construction, since the port only asks for a packet when
/// its link is idle. Lower classes starve while higher ones stay backlogged.
#[derive(Debug)]
pub struct StaticPriority {
    priorities: FlowTable<u32>,
    classes: BTreeMap<u32, VecDeque<Packet>>,
    len: usize,
}

impl StaticPriority {
    pub fn new(priorities: FlowTable<u32>) -> Result<Self, SimulationError> {
        if priorities.is_empty() {
            return Err(SimulationError::config("priority table is empty"));
        }
        Ok(Self {
            priorities,
            classes: BTreeMap::new(),
            len: 0,
        })
    }

    /// Backlog of one class, in packets.
    pub fn class_len(&self, class: u32) -> usize {
        self.classes.get(&class).map_or(0, VecDeque::len)
    }
}

impl Discipline for StaticPriority {
    fn kind(&self) -> &'static str {
        "sp"
    }

    fn enqueue(&mut self, packet: Packet, _now: SimTime) -> Result<(), SimulationError> {
        let class = *self.priorities.require(packet.flow_id, "sp")?;
        self.classes.entry(class).or_default().push_back(packet);
        self.len += 1;
        Ok(())
    }

    fn dequeue(&mut self, _now: SimTime) -> Option<Packet> {
        let packet = self
            .classes
            .values_mut()
            .find(|queue| !queue.is_empty())?
            .pop_front()?;
        self.len -= 1;
        Some(packet)
    }

    fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portsim_core::flow::FlowId;

    fn sp() -> StaticPriority {
        // flow 0 -> class 1, flow 1 -> class 2, flow 2 -> class 0
        StaticPriority::new(FlowTable::dense(vec![1, 2, 0])).unwrap()
    }

    fn packet(id: u64, flow: u32) -> Packet {
        Packet::new(0, 100, id, FlowId(flow))
    }

    #[test]
    fn highest_class_first() {
        let mut sp = sp();
        sp.enqueue(packet(1, 1), 0).unwrap();
        sp.enqueue(packet(2, 0), 0).unwrap();
        sp.enqueue(packet(3, 2), 0).unwrap();
        let order: Vec<_> = std::iter::from_fn(|| sp.dequeue(0))
            .map(|p| p.packet_id)
            .collect();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn selection_is_re_evaluated_between_back_to_back_sends() {
        let mut sp = sp();
        sp.enqueue(packet(1, 1), 0).unwrap();
        sp.enqueue(packet(2, 1), 0).unwrap();
        assert_eq!(sp.dequeue(0).map(|p| p.packet_id), Some(1));

        // A higher class becomes non-empty between two sends.
        sp.enqueue(packet(3, 0), 1).unwrap();
        assert_eq!(sp.dequeue(1).map(|p| p.packet_id), Some(3));
        assert_eq!(sp.dequeue(2).map(|p| p.packet_id), Some(2));

        // And it is noticed again after the class drained once.
        sp.enqueue(packet(4, 1), 3).unwrap();
        sp.enqueue(packet(5, 2), 3).unwrap();
        assert_eq!(sp.dequeue(3).map(|p| p.packet_id), Some(5));
        assert_eq!(sp.dequeue(4).map(|p| p.packet_id), Some(4));
        assert!(sp.is_empty());
    }

    #[test]
    fn fifo_within_a_class() {
        let mut sp = StaticPriority::new(FlowTable::dense(vec![0, 0])).unwrap();
        for (id, flow) in [(1, 0), (2, 1), (3, 0)] {
            sp.enqueue(packet(id, flow), 0).unwrap();
        }
        assert_eq!(sp.class_len(0), 3);
        let order: Vec<_> = std::iter::from_fn(|| sp.dequeue(0))
            .map(|p| p.packet_id)
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn unknown_flow_is_fatal() {
        let mut sp = sp();
        assert!(matches!(
            sp.enqueue(packet(1, 9), 0),
            Err(SimulationError::UnknownFlow { flow: FlowId(9), .. })
        ));
        assert!(StaticPriority::new(FlowTable::dense(vec![])).is_err());
    }
}
