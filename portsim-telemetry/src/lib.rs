//! # portsim Telemetry and Monitoring
//!
//! Crate for logging and metrics over a running simulation. Everything here
//! reads component snapshots; nothing mutates simulation state.

pub mod logging;
pub mod metrics;
pub mod sampler;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
pub use sampler::EngineSampler;
