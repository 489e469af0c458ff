//! Priority queue of scheduled events.
//!
//! Events fire in strict time order; events scheduled for the same instant fire
//! in the order they were inserted.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::process::{Message, ProcessId};
use crate::time::SimTime;

#[derive(Debug, Clone)]
pub enum EventKind {
    /// Hand control back to a suspended process.
    Resume,
    /// Deliver a message emitted by `from`.
    Deliver { from: ProcessId, message: Message },
}

#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    pub time: SimTime,
    pub target: ProcessId,
    pub kind: EventKind,
    seq: u64,
}

impl ScheduledEvent {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so the comparison is reversed.
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: SimTime, target: ProcessId, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ScheduledEvent {
            time,
            target,
            kind,
            seq,
        });
    }

    pub fn pop(&mut self) -> Option<ScheduledEvent> {
        self.heap.pop()
    }

    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|event| event.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pops_in_time_order() {
        let mut queue = EventQueue::new();
        queue.push(30, ProcessId::new(0), EventKind::Resume);
        queue.push(10, ProcessId::new(1), EventKind::Resume);
        queue.push(20, ProcessId::new(2), EventKind::Resume);

        let times: Vec<_> = std::iter::from_fn(|| queue.pop()).map(|e| e.time).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn ties_break_by_insertion() {
        let mut queue = EventQueue::new();
        for target in [5, 3, 9, 1] {
            queue.push(100, ProcessId::new(target), EventKind::Resume);
        }
        let targets: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|e| e.target.index())
            .collect();
        assert_eq!(targets, vec![5, 3, 9, 1]);
    }

    #[test]
    fn peek_reports_earliest() {
        let mut queue = EventQueue::new();
        assert_eq!(queue.peek_time(), None);
        queue.push(7, ProcessId::new(0), EventKind::Resume);
        queue.push(3, ProcessId::new(0), EventKind::Resume);
        assert_eq!(queue.peek_time(), Some(3));
        assert_eq!(queue.len(), 2);
    }

    proptest! {
        #[test]
        fn pop_order_is_time_then_insertion(times in prop::collection::vec(0u64..50, 1..200)) {
            let mut queue = EventQueue::new();
            for (index, time) in times.iter().enumerate() {
                queue.push(*time, ProcessId::new(index), EventKind::Resume);
            }
            let popped: Vec<(SimTime, usize)> = std::iter::from_fn(|| queue.pop())
                .map(|e| (e.time, e.target.index()))
                .collect();
            let mut expected: Vec<(SimTime, usize)> =
                times.iter().copied().zip(0..).collect();
            expected.sort();
            prop_assert_eq!(popped, expected);
        }
    }
}
