//! ## portsim-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! `RUST_LOG` wins over the configured level when set.

use tracing::{debug, info, info_span};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use portsim_config::TelemetryConfig;
use portsim_core::monitor::Snapshot;
use portsim_core::time::SimTime;

type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    pub fn init() -> Result<(), InitError> {
        Self::init_with_level("info")
    }

    /// Installs the global subscriber at the configured `log_level`.
    pub fn init_from_config(config: &TelemetryConfig) -> Result<(), InitError> {
        Self::init_with_level(&config.log_level)
    }

    /// Installs the global subscriber. Fails if one is already installed.
    pub fn init_with_level(level: &str) -> Result<(), InitError> {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
            )
            .with_span_events(FmtSpan::ENTER)
            .try_init()
    }

    /// Logs one monitoring sample of `component`.
    pub fn log_sample(component: &str, now: SimTime, snapshot: &Snapshot) {
        let span = info_span!("sample", component = component, now);
        let _guard = span.enter();

        info!(
            received = snapshot.received,
            dropped = snapshot.dropped,
            sent = snapshot.sent,
            queued_packets = snapshot.queued_packets,
            queued_bytes = snapshot.queued_bytes,
            in_service = ?snapshot.in_service,
            "component sample"
        );
        for flow in snapshot.starved_flows() {
            debug!(%flow, "flow backlogged but never served");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portsim_core::flow::FlowId;
    use portsim_core::monitor::FlowStats;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_sample_logging() {
        let mut snapshot = Snapshot {
            received: 4,
            dropped: 1,
            sent: 2,
            queued_packets: 1,
            queued_bytes: 100,
            in_service: None,
            ..Snapshot::default()
        };
        snapshot.flows.insert(
            FlowId(7),
            FlowStats {
                queued_packets: 1,
                queued_bytes: 100,
                ..FlowStats::default()
            },
        );
        EventLogger::log_sample("port", 5, &snapshot);
        assert!(logs_contain("component sample"));
        assert!(logs_contain("dropped=1"));
        assert!(logs_contain("never served"));
    }
}
