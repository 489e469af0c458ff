use std::time::Duration;

use thiserror::Error;

use crate::events::ProcessId;
use crate::flow::FlowId;
use crate::time::SimTime;

/// Fatal simulation errors.
///
/// Admission drops are not represented here: they are expected outcomes and
/// only show up in counters.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid suspension requested by {process}: {duration:?} is not a positive duration")]
    InvalidSuspension { process: String, duration: Duration },

    #[error("{component}: flow {flow} has no configured parameters")]
    UnknownFlow { component: String, flow: FlowId },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("{process} has no downstream connected")]
    Unconnected { process: String },

    #[error("{producer} went back in time: packet created at {next} after one created at {previous}")]
    NonMonotonicProducer {
        producer: String,
        previous: SimTime,
        next: SimTime,
    },

    #[error("No process registered under {0}")]
    UnknownProcess(ProcessId),
}

impl SimulationError {
    pub fn config(message: impl Into<String>) -> Self {
        SimulationError::InvalidConfig(message.into())
    }
}
