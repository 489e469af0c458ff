//! ## portsim-telemetry::metrics
//! **Prometheus registry fed by monitoring snapshots**
//!
//! Snapshots carry running totals; the recorder remembers the last totals
//! per component and adds only the difference to its counters.

use std::collections::HashMap;

use parking_lot::Mutex;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use portsim_core::io::Departure;
use portsim_core::monitor::Snapshot;
use portsim_core::time::as_secs;

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    received: u64,
    dropped: u64,
    sent: u64,
}

pub struct MetricsRecorder {
    pub registry: Registry,
    received: IntCounterVec,
    dropped: IntCounterVec,
    sent: IntCounterVec,
    queued_packets: IntGaugeVec,
    queued_bytes: IntGaugeVec,
    delay: Histogram,
    last: Mutex<HashMap<String, Totals>>,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> Result<IntCounterVec, prometheus::Error> {
            let vec = IntCounterVec::new(Opts::new(name, help), &["component"])?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };
        let received = counter("portsim_packets_received_total", "Packets offered to a component")?;
        let dropped = counter("portsim_packets_dropped_total", "Packets refused admission")?;
        let sent = counter("portsim_packets_sent_total", "Packets passed downstream")?;

        let gauge = |name: &str, help: &str| -> Result<IntGaugeVec, prometheus::Error> {
            let vec = IntGaugeVec::new(Opts::new(name, help), &["component"])?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };
        let queued_packets = gauge("portsim_queued_packets", "Packets waiting in a component")?;
        let queued_bytes = gauge("portsim_queued_bytes", "Bytes waiting in a component")?;

        let delay = Histogram::with_opts(
            HistogramOpts::new(
                "portsim_delivery_delay_seconds",
                "Virtual time from packet creation to delivery",
            )
            .buckets(vec![1e-6, 1e-5, 1e-4, 1e-3, 1e-2, 1e-1, 1.0]),
        )?;
        registry.register(Box::new(delay.clone()))?;

        Ok(Self {
            registry,
            received,
            dropped,
            sent,
            queued_packets,
            queued_bytes,
            delay,
            last: Mutex::new(HashMap::new()),
        })
    }

    /// Applies one snapshot of `component`.
    pub fn observe(&self, component: &str, snapshot: &Snapshot) {
        let labels = [component];
        let mut last = self.last.lock();
        let previous = last.entry(component.to_string()).or_default();

        self.received
            .with_label_values(&labels)
            .inc_by(snapshot.received.saturating_sub(previous.received));
        self.dropped
            .with_label_values(&labels)
            .inc_by(snapshot.dropped.saturating_sub(previous.dropped));
        self.sent
            .with_label_values(&labels)
            .inc_by(snapshot.sent.saturating_sub(previous.sent));
        *previous = Totals {
            received: snapshot.received,
            dropped: snapshot.dropped,
            sent: snapshot.sent,
        };

        self.queued_packets
            .with_label_values(&labels)
            .set(snapshot.queued_packets as i64);
        self.queued_bytes
            .with_label_values(&labels)
            .set(snapshot.queued_bytes as i64);
    }

    pub fn observe_delivery(&self, departure: &Departure) {
        let delay = departure.time.saturating_sub(departure.packet.created_at);
        self.delay.observe(as_secs(delay));
    }

    pub fn delivered(&self) -> u64 {
        self.delay.get_sample_count()
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portsim_core::flow::FlowId;
    use portsim_core::packet::Packet;

    fn snapshot(received: u64, dropped: u64, queued: usize) -> Snapshot {
        Snapshot {
            received,
            dropped,
            sent: received - dropped - queued as u64,
            queued_packets: queued,
            queued_bytes: queued as u64 * 100,
            ..Snapshot::default()
        }
    }

    #[test]
    fn counters_follow_totals() {
        let recorder = MetricsRecorder::new().unwrap();
        recorder.observe("port", &snapshot(5, 1, 2));
        recorder.observe("port", &snapshot(9, 3, 1));
        recorder.observe("sink", &snapshot(5, 0, 0));

        assert_eq!(recorder.received.with_label_values(&["port"]).get(), 9);
        assert_eq!(recorder.dropped.with_label_values(&["port"]).get(), 3);
        assert_eq!(recorder.sent.with_label_values(&["port"]).get(), 5);
        assert_eq!(recorder.queued_packets.with_label_values(&["port"]).get(), 1);
        assert_eq!(recorder.received.with_label_values(&["sink"]).get(), 5);

        let text = recorder.gather_metrics().unwrap();
        assert!(text.contains("portsim_packets_dropped_total{component=\"port\"} 3"));
        assert!(text.contains("portsim_queued_bytes{component=\"port\"} 100"));
    }

    #[test]
    fn delivery_delay_histogram() {
        let recorder = MetricsRecorder::new().unwrap();
        recorder.observe_delivery(&Departure {
            time: 3_000_000,
            packet: Packet::new(1_000_000, 100, 0, FlowId(0)),
        });
        assert_eq!(recorder.delivered(), 1);
        assert!(recorder
            .gather_metrics()
            .unwrap()
            .contains("portsim_delivery_delay_seconds_count 1"));
    }
}
