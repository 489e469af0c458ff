//! Token bucket shaper and two-rate three-colour marker parameters.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ShaperConfig {
    #[validate(length(min = 1))]
    pub name: String,

    /// Token fill rate in bits per second.
    #[validate(range(exclusive_min = 0.0))]
    pub rate_bps: f64,

    /// Bucket depth in bytes.
    #[validate(range(min = 1))]
    pub burst_bytes: u64,

    /// Optional peak rate at which conforming packets are serialised.
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub peak_rate_bps: Option<f64>,
}

/// RFC 2698 marker parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = validation::validate_marker_rates))]
pub struct MarkerConfig {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(range(exclusive_min = 0.0))]
    pub committed_rate_bps: f64,

    #[validate(range(min = 1))]
    pub committed_burst_bytes: u64,

    #[validate(range(exclusive_min = 0.0))]
    pub peak_rate_bps: f64,

    #[validate(range(min = 1))]
    pub peak_burst_bytes: u64,
}
