//! Output port configuration: rate, scheduling discipline, admission policy
//! and buffer hand-off flags.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Per-flow parameters, either indexed by position or listed with explicit ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlowParams<T> {
    Dense(Vec<T>),
    Sparse(Vec<FlowEntry<T>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEntry<T> {
    pub flow: u32,
    pub value: T,
}

impl<T: Clone> FlowParams<T> {
    /// `(flow id, value)` pairs in declaration order.
    pub fn entries(&self) -> Vec<(u32, T)> {
        match self {
            FlowParams::Dense(values) => values
                .iter()
                .cloned()
                .enumerate()
                .map(|(idx, value)| (idx as u32, value))
                .collect(),
            FlowParams::Sparse(entries) => entries
                .iter()
                .map(|entry| (entry.flow, entry.value.clone()))
                .collect(),
        }
    }
}

impl<T> FlowParams<T> {
    pub fn is_empty(&self) -> bool {
        match self {
            FlowParams::Dense(values) => values.is_empty(),
            FlowParams::Sparse(entries) => entries.is_empty(),
        }
    }

    pub fn values(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            FlowParams::Dense(values) => Box::new(values.iter()),
            FlowParams::Sparse(entries) => Box::new(entries.iter().map(|entry| &entry.value)),
        }
    }
}

impl<T: Copy> FlowParams<T> {
    pub fn values_copied(&self) -> Vec<T> {
        self.values().copied().collect()
    }
}

/// Unit in which queue limits and RED thresholds are expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitUnit {
    #[default]
    Packets,
    Bytes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisciplineConfig {
    #[default]
    Fifo,
    /// Lower class number is served first.
    StaticPriority { priorities: FlowParams<u32> },
    Wfq { weights: FlowParams<f64> },
    Drr {
        weights: FlowParams<f64>,
        #[serde(default = "default_min_quantum")]
        min_quantum: u64,
    },
    /// Weights are reserved rates in bits per second.
    VirtualClock {
        weights: FlowParams<f64>,
        #[serde(default)]
        max_credit_secs: Option<f64>,
    },
}

fn default_min_quantum() -> u64 {
    1500 // one Ethernet MTU
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AdmissionConfig {
    #[default]
    Unlimited,
    TailDrop {
        limit: u64,
        #[serde(default)]
        unit: LimitUnit,
    },
    Red {
        min_threshold: f64,
        max_threshold: f64,
        max_probability: f64,
        #[serde(default = "default_red_weight")]
        weight: f64,
        #[serde(default)]
        unit: LimitUnit,
        /// Optional hard limit applied before the RED decision.
        #[serde(default)]
        limit: Option<u64>,
    },
}

fn default_red_weight() -> f64 {
    0.002
}

/// A single output port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PortConfig {
    #[validate(length(min = 1))]
    pub name: String,

    /// Output link rate in bits per second. Absent means forward immediately.
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub rate_bps: Option<f64>,

    #[serde(default)]
    #[validate(custom(function = validation::validate_discipline))]
    pub discipline: DisciplineConfig,

    #[serde(default)]
    #[validate(custom(function = validation::validate_admission))]
    pub admission: AdmissionConfig,

    /// This port's queue is logically its upstream's buffer.
    #[serde(default)]
    pub zero_buffer: bool,

    /// The downstream has no buffer of its own; forwarded packets stay counted
    /// here until the downstream takes them into service.
    #[serde(default)]
    pub zero_downstream_buffer: bool,
}

impl PortConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rate_bps: None,
            discipline: DisciplineConfig::default(),
            admission: AdmissionConfig::default(),
            zero_buffer: false,
            zero_downstream_buffer: false,
        }
    }
}
