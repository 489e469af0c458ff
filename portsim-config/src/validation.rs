//! Custom validation functions for configuration.
//!
//! Validator's derive does not reach inside enums, so discipline and admission
//! settings are checked here.

use std::borrow::Cow;

use validator::ValidationError;

use crate::port::{AdmissionConfig, DisciplineConfig, FlowParams};
use crate::shaper::MarkerConfig;

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn validate_weights(weights: &FlowParams<f64>) -> Result<(), ValidationError> {
    if weights.is_empty() {
        return Err(invalid("empty_weights", "weight table must not be empty"));
    }
    if weights.values().any(|w| !(w.is_finite() && *w > 0.0)) {
        return Err(invalid("non_positive_weight", "weights must be positive"));
    }
    Ok(())
}

pub fn validate_discipline(discipline: &DisciplineConfig) -> Result<(), ValidationError> {
    match discipline {
        DisciplineConfig::Fifo => Ok(()),
        DisciplineConfig::StaticPriority { priorities } => {
            if priorities.is_empty() {
                Err(invalid(
                    "empty_priorities",
                    "priority table must not be empty",
                ))
            } else {
                Ok(())
            }
        }
        DisciplineConfig::Wfq { weights } => validate_weights(weights),
        DisciplineConfig::Drr {
            weights,
            min_quantum,
        } => {
            if *min_quantum == 0 {
                return Err(invalid("zero_quantum", "min_quantum must be positive"));
            }
            validate_weights(weights)
        }
        DisciplineConfig::VirtualClock {
            weights,
            max_credit_secs,
        } => {
            if max_credit_secs.is_some_and(|credit| !(credit.is_finite() && credit >= 0.0)) {
                return Err(invalid(
                    "negative_credit",
                    "max_credit_secs must be zero or positive",
                ));
            }
            validate_weights(weights)
        }
    }
}

pub fn validate_admission(admission: &AdmissionConfig) -> Result<(), ValidationError> {
    match admission {
        AdmissionConfig::Unlimited => Ok(()),
        AdmissionConfig::TailDrop { limit, .. } => {
            if *limit == 0 {
                Err(invalid("zero_limit", "queue limit must be positive"))
            } else {
                Ok(())
            }
        }
        AdmissionConfig::Red {
            min_threshold,
            max_threshold,
            max_probability,
            weight,
            limit,
            ..
        } => {
            if !(*min_threshold >= 0.0 && min_threshold < max_threshold) {
                return Err(invalid(
                    "red_thresholds",
                    "RED thresholds must satisfy 0 <= min_threshold < max_threshold",
                ));
            }
            if !(*max_probability > 0.0 && *max_probability <= 1.0) {
                return Err(invalid(
                    "red_probability",
                    "max_probability must lie in (0, 1]",
                ));
            }
            if !(*weight > 0.0 && *weight <= 1.0) {
                return Err(invalid("red_weight", "weight must lie in (0, 1]"));
            }
            if *limit == Some(0) {
                return Err(invalid("zero_limit", "queue limit must be positive"));
            }
            Ok(())
        }
    }
}

/// RFC 2698 requires the peak rate to be at least the committed rate.
pub fn validate_marker_rates(marker: &MarkerConfig) -> Result<(), ValidationError> {
    if marker.peak_rate_bps < marker.committed_rate_bps {
        return Err(invalid(
            "peak_below_committed",
            "peak_rate_bps must be at least committed_rate_bps",
        ));
    }
    Ok(())
}

/// Validate a tracing filter level.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::LimitUnit;

    fn red(min: f64, max: f64, p: f64, w: f64) -> AdmissionConfig {
        AdmissionConfig::Red {
            min_threshold: min,
            max_threshold: max,
            max_probability: p,
            weight: w,
            unit: LimitUnit::Packets,
            limit: None,
        }
    }

    #[test]
    fn red_bounds() {
        assert!(validate_admission(&red(5.0, 15.0, 0.1, 0.002)).is_ok());
        assert!(validate_admission(&red(15.0, 5.0, 0.1, 0.002)).is_err());
        assert!(validate_admission(&red(5.0, 15.0, 0.0, 0.002)).is_err());
        assert!(validate_admission(&red(5.0, 15.0, 0.1, 1.5)).is_err());
    }

    #[test]
    fn drr_needs_quantum() {
        let drr = DisciplineConfig::Drr {
            weights: FlowParams::Dense(vec![1.0, 2.0]),
            min_quantum: 0,
        };
        assert!(validate_discipline(&drr).is_err());
    }

    #[test]
    fn weights_must_be_positive() {
        let wfq = DisciplineConfig::Wfq {
            weights: FlowParams::Dense(vec![1.0, -2.0]),
        };
        assert!(validate_discipline(&wfq).is_err());
    }

    #[test]
    fn log_levels() {
        assert!(validate_log_level("DEBUG").is_ok());
        assert!(validate_log_level("loud").is_err());
    }
}
