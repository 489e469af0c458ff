//! ## portsim-shaping::red
//! **Random Early Detection**
//!
//! The average occupancy is an exponentially weighted moving average updated
//! on every arrival. Between the thresholds the base drop probability rises
//! linearly to `max_probability`; it is then spread out by the number of
//! packets accepted since the last drop, `pa = pb / (1 - count * pb)`, so drops
//! do not bunch up.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use portsim_config::LimitUnit;
use portsim_core::monitor::Occupancy;
use portsim_core::packet::Packet;
use portsim_core::SimulationError;

use crate::admission::{measure, AdmissionPolicy, DropReason, QueueLimit, Verdict};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedParams {
    pub min_threshold: f64,
    pub max_threshold: f64,
    pub max_probability: f64,
    /// EWMA weight given to the newest sample.
    pub weight: f64,
    /// Unit of the thresholds and of the averaged occupancy.
    pub unit: LimitUnit,
    /// Hard limit checked before the probabilistic decision.
    pub limit: Option<QueueLimit>,
}

#[derive(Debug)]
pub struct Red {
    params: RedParams,
    avg: f64,
    /// Packets accepted between the thresholds since the last drop; -1 when
    /// the average is below the minimum threshold.
    count: i64,
    rng: SmallRng,
}

impl Red {
    pub fn new(params: RedParams, seed: u64) -> Result<Self, SimulationError> {
        if !(params.min_threshold >= 0.0 && params.min_threshold < params.max_threshold) {
            return Err(SimulationError::config(
                "RED thresholds must satisfy 0 <= min < max",
            ));
        }
        if !(params.max_probability > 0.0 && params.max_probability <= 1.0) {
            return Err(SimulationError::config(
                "RED max_probability must lie in (0, 1]",
            ));
        }
        if !(params.weight > 0.0 && params.weight <= 1.0) {
            return Err(SimulationError::config("RED weight must lie in (0, 1]"));
        }
        Ok(Self {
            params,
            avg: 0.0,
            count: -1,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    pub fn average(&self) -> f64 {
        self.avg
    }

    /// Base drop probability for an average queue length of `avg`.
    pub fn drop_probability(&self, avg: f64) -> f64 {
        let RedParams {
            min_threshold,
            max_threshold,
            max_probability,
            ..
        } = self.params;
        if avg < min_threshold {
            0.0
        } else if avg >= max_threshold {
            1.0
        } else {
            max_probability * (avg - min_threshold) / (max_threshold - min_threshold)
        }
    }

    fn update_average(&mut self, occupancy: Occupancy) {
        let sample = measure(occupancy, self.params.unit);
        self.avg = (1.0 - self.params.weight) * self.avg + self.params.weight * sample;
    }
}

impl AdmissionPolicy for Red {
    fn name(&self) -> &'static str {
        "red"
    }

    fn admit(&mut self, packet: &Packet, occupancy: Occupancy) -> Verdict {
        self.update_average(occupancy);

        if let Some(limit) = self.params.limit {
            if limit.exceeded_by(occupancy.with_packet(packet)) {
                self.count = 0;
                return Verdict::Drop(DropReason::Overflow);
            }
        }

        if self.avg < self.params.min_threshold {
            self.count = -1;
            return Verdict::Accept;
        }
        if self.avg >= self.params.max_threshold {
            self.count = 0;
            return Verdict::Drop(DropReason::ForcedDrop);
        }

        self.count += 1;
        let pb = self.drop_probability(self.avg);
        let spread = self.count as f64 * pb;
        let pa = if spread >= 1.0 { 1.0 } else { pb / (1.0 - spread) };
        trace!(avg = self.avg, pb, pa, count = self.count, "RED decision");

        if self.rng.random::<f64>() < pa {
            self.count = 0;
            Verdict::Drop(DropReason::EarlyDrop)
        } else {
            Verdict::Accept
        }
    }
}
