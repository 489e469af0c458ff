//! Run-level simulation parameters.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SimulationConfig {
    /// Seed for every random decision (RED drops).
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Virtual time at which the run stops, in seconds.
    #[serde(default = "default_duration")]
    #[validate(range(exclusive_min = 0.0))]
    pub duration_secs: f64,

    /// Interval between monitoring samples, in milliseconds of virtual time.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub sample_interval_ms: Option<u64>,
}

fn default_seed() -> u64 {
    42
}

fn default_duration() -> f64 {
    10.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            duration_secs: default_duration(),
            sample_interval_ms: None,
        }
    }
}
