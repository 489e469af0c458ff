//! ## portsim-telemetry::sampler
//! **Read-only observer for `Engine::run_sampled`**

use tracing::warn;

use portsim_config::TelemetryConfig;
use portsim_core::events::Engine;
use portsim_core::time::SimTime;

use crate::logging::EventLogger;
use crate::metrics::MetricsRecorder;

/// Logs every process' snapshot at each sample instant and, when metrics are
/// enabled, feeds them to a [`MetricsRecorder`].
pub struct EngineSampler {
    metrics: Option<MetricsRecorder>,
    samples: u64,
}

impl EngineSampler {
    pub fn new(metrics: Option<MetricsRecorder>) -> Self {
        Self {
            metrics,
            samples: 0,
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Result<Self, prometheus::Error> {
        let metrics = if config.metrics_enabled {
            Some(MetricsRecorder::new()?)
        } else {
            None
        };
        Ok(Self::new(metrics))
    }

    pub fn observe(&mut self, now: SimTime, engine: &Engine) {
        self.samples += 1;
        for id in engine.process_ids() {
            let Some(name) = engine.name(id) else {
                continue;
            };
            match engine.snapshot(id) {
                Ok(snapshot) => {
                    EventLogger::log_sample(name, now, &snapshot);
                    if let Some(metrics) = &self.metrics {
                        metrics.observe(name, &snapshot);
                    }
                }
                Err(err) => warn!(%id, error = %err, "snapshot unavailable"),
            }
        }
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn metrics(&self) -> Option<&MetricsRecorder> {
        self.metrics.as_ref()
    }
}
