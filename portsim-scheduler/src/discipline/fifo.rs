use std::collections::VecDeque;

use portsim_core::packet::Packet;
use portsim_core::time::SimTime;
use portsim_core::SimulationError;

use super::Discipline;

/// Single first-come first-served queue shared by all flows.
#[derive(Debug, Default)]
pub struct Fifo {
    queue: VecDeque<Packet>,
}

impl Fifo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Discipline for Fifo {
    fn kind(&self) -> &'static str {
        "fifo"
    }

    fn enqueue(&mut self, packet: Packet, _now: SimTime) -> Result<(), SimulationError> {
        self.queue.push_back(packet);
        Ok(())
    }

    fn dequeue(&mut self, _now: SimTime) -> Option<Packet> {
        self.queue.pop_front()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}
