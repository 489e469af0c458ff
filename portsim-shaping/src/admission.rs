//! ## portsim-shaping::admission
//! **Gatekeepers in front of a scheduling discipline**
//!
//! A policy sees the arriving packet and the buffer occupancy it would join
//! (queued packets plus whatever is in service or still held downstream) and
//! returns a [`Verdict`]. Drops are ordinary outcomes, never errors.

use portsim_config::{AdmissionConfig, LimitUnit};
use portsim_core::monitor::Occupancy;
use portsim_core::packet::Packet;
use portsim_core::SimulationError;

use crate::red::{Red, RedParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Hard occupancy limit reached.
    Overflow,
    /// RED probabilistic drop between the thresholds.
    EarlyDrop,
    /// RED average at or above the maximum threshold.
    ForcedDrop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Drop(DropReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Decides on each arrival whether the packet may join the buffer.
pub trait AdmissionPolicy {
    fn name(&self) -> &'static str;

    /// `occupancy` excludes `packet` itself.
    fn admit(&mut self, packet: &Packet, occupancy: Occupancy) -> Verdict;
}

/// A finite buffer size in bytes or packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLimit {
    Bytes(u64),
    Packets(usize),
}

impl QueueLimit {
    pub fn new(limit: u64, unit: LimitUnit) -> Result<Self, SimulationError> {
        if limit == 0 {
            return Err(SimulationError::config("queue limit must be positive"));
        }
        Ok(match unit {
            LimitUnit::Bytes => QueueLimit::Bytes(limit),
            LimitUnit::Packets => QueueLimit::Packets(limit as usize),
        })
    }

    /// `true` when `occupancy` no longer fits.
    pub fn exceeded_by(&self, occupancy: Occupancy) -> bool {
        match *self {
            QueueLimit::Bytes(limit) => occupancy.bytes > limit,
            QueueLimit::Packets(limit) => occupancy.packets > limit,
        }
    }
}

/// Reads `occupancy` in the given unit.
pub fn measure(occupancy: Occupancy, unit: LimitUnit) -> f64 {
    match unit {
        LimitUnit::Bytes => occupancy.bytes as f64,
        LimitUnit::Packets => occupancy.packets as f64,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl AdmissionPolicy for Unlimited {
    fn name(&self) -> &'static str {
        "unlimited"
    }

    fn admit(&mut self, _packet: &Packet, _occupancy: Occupancy) -> Verdict {
        Verdict::Accept
    }
}

/// Accepts iff occupancy plus the new packet stays within the limit.
#[derive(Debug, Clone, Copy)]
pub struct TailDrop {
    limit: QueueLimit,
}

impl TailDrop {
    pub fn new(limit: QueueLimit) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> QueueLimit {
        self.limit
    }
}

impl AdmissionPolicy for TailDrop {
    fn name(&self) -> &'static str {
        "tail_drop"
    }

    fn admit(&mut self, packet: &Packet, occupancy: Occupancy) -> Verdict {
        if self.limit.exceeded_by(occupancy.with_packet(packet)) {
            Verdict::Drop(DropReason::Overflow)
        } else {
            Verdict::Accept
        }
    }
}

/// Builds the policy described by `config`. RED draws from an RNG seeded with `seed`.
pub fn from_config(
    config: &AdmissionConfig,
    seed: u64,
) -> Result<Box<dyn AdmissionPolicy>, SimulationError> {
    Ok(match config {
        AdmissionConfig::Unlimited => Box::new(Unlimited),
        AdmissionConfig::TailDrop { limit, unit } => {
            Box::new(TailDrop::new(QueueLimit::new(*limit, *unit)?))
        }
        AdmissionConfig::Red {
            min_threshold,
            max_threshold,
            max_probability,
            weight,
            unit,
            limit,
        } => {
            let params = RedParams {
                min_threshold: *min_threshold,
                max_threshold: *max_threshold,
                max_probability: *max_probability,
                weight: *weight,
                unit: *unit,
                limit: limit.map(|l| QueueLimit::new(l, *unit)).transpose()?,
            };
            Box::new(Red::new(params, seed)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use portsim_core::flow::FlowId;

    fn packet(size: u64) -> Packet {
        Packet::new(0, size, 0, FlowId(0))
    }

    #[test]
    fn tail_drop_counts_packets() {
        let mut policy = TailDrop::new(QueueLimit::Packets(2));
        let one = Occupancy { bytes: 10, packets: 1 };
        let two = Occupancy { bytes: 20, packets: 2 };
        assert_eq!(policy.admit(&packet(10), one), Verdict::Accept);
        assert_eq!(
            policy.admit(&packet(10), two),
            Verdict::Drop(DropReason::Overflow)
        );
    }

    #[test]
    fn tail_drop_counts_bytes() {
        let mut policy = TailDrop::new(QueueLimit::Bytes(1_000));
        let occupancy = Occupancy { bytes: 600, packets: 3 };
        assert!(policy.admit(&packet(400), occupancy).is_accept());
        assert!(!policy.admit(&packet(401), occupancy).is_accept());
    }

    #[test]
    fn zero_limit_is_a_config_error() {
        assert!(matches!(
            QueueLimit::new(0, LimitUnit::Bytes),
            Err(SimulationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn builds_from_config() {
        let mut policy = from_config(&AdmissionConfig::Unlimited, 1).unwrap();
        assert_eq!(policy.name(), "unlimited");
        let huge = Occupancy {
            bytes: u64::MAX / 2,
            packets: usize::MAX / 2,
        };
        assert!(policy.admit(&packet(1), huge).is_accept());

        let policy = from_config(
            &AdmissionConfig::TailDrop {
                limit: 5,
                unit: LimitUnit::Packets,
            },
            1,
        )
        .unwrap();
        assert_eq!(policy.name(), "tail_drop");

        let red = AdmissionConfig::Red {
            min_threshold: 2.0,
            max_threshold: 8.0,
            max_probability: 0.5,
            weight: 0.2,
            unit: LimitUnit::Packets,
            limit: Some(10),
        };
        assert_eq!(from_config(&red, 1).unwrap().name(), "red");
    }
}
