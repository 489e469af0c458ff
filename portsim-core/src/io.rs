//! Producer and sink interfaces plus the processes that adapt them to the engine.
//!
//! Packet generation and statistics live outside this crate; all the engine
//! needs is a stream of packets with non-decreasing creation times and a place
//! to put departures.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use blake3::Hasher;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::SimulationError;
use crate::events::{Context, Message, Process, ProcessId, Suspend};
use crate::flow::FlowId;
use crate::monitor::{FlowLedger, Snapshot};
use crate::packet::Packet;
use crate::time::SimTime;

/// Supplies packets in order of creation time. `None` ends the stream.
pub trait Producer {
    fn next_packet(&mut self) -> Option<Packet>;
}

/// Receives every departure. Must not block.
pub trait Sink {
    fn accept(&mut self, packet: Packet, now: SimTime);
}

/// Replays a prepared packet sequence.
#[derive(Debug)]
pub struct TraceProducer {
    packets: std::vec::IntoIter<Packet>,
}

impl TraceProducer {
    pub fn new(packets: Vec<Packet>) -> Self {
        Self {
            packets: packets.into_iter(),
        }
    }

    /// `count` packets of `size` bytes for `flow`, one every `interval` from `start`.
    pub fn periodic(
        flow: FlowId,
        start: SimTime,
        interval: Duration,
        size: u64,
        count: usize,
        first_id: u64,
    ) -> Self {
        let step = interval.as_nanos() as SimTime;
        let packets = (0..count)
            .map(|i| Packet::new(start + step * i as SimTime, size, first_id + i as u64, flow))
            .collect();
        Self::new(packets)
    }
}

impl Producer for TraceProducer {
    fn next_packet(&mut self) -> Option<Packet> {
        self.packets.next()
    }
}

impl<F> Producer for F
where
    F: FnMut() -> Option<Packet>,
{
    fn next_packet(&mut self) -> Option<Packet> {
        self()
    }
}

/// Emits each produced packet downstream at its creation time.
pub struct Source<P> {
    name: String,
    producer: P,
    pending: Option<Packet>,
    last_created: Option<SimTime>,
    emitted: u64,
}

impl<P: Producer> Source<P> {
    pub fn new(name: impl Into<String>, producer: P) -> Self {
        Self {
            name: name.into(),
            producer,
            pending: None,
            last_created: None,
            emitted: 0,
        }
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    fn next(&mut self) -> Result<Option<Packet>, SimulationError> {
        let Some(packet) = self.pending.take().or_else(|| self.producer.next_packet()) else {
            return Ok(None);
        };
        if let Some(previous) = self.last_created {
            if packet.created_at < previous {
                return Err(SimulationError::NonMonotonicProducer {
                    producer: self.name.clone(),
                    previous,
                    next: packet.created_at,
                });
            }
        }
        self.last_created = Some(packet.created_at);
        Ok(Some(packet))
    }
}

impl<P: Producer> Process for Source<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_message(
        &mut self,
        _from: ProcessId,
        _message: Message,
        _ctx: &mut Context<'_>,
    ) -> Result<(), SimulationError> {
        Ok(())
    }

    fn resume(&mut self, ctx: &mut Context<'_>) -> Result<Suspend, SimulationError> {
        while let Some(packet) = self.next()? {
            if packet.created_at > ctx.now() {
                let wait = Duration::from_nanos(packet.created_at - ctx.now());
                self.pending = Some(packet);
                return ctx.schedule_after(wait);
            }
            trace!(source = %self.name, packet_id = packet.packet_id, "emitting packet");
            self.emitted += 1;
            ctx.forward(packet)?;
        }
        Ok(Suspend::Done)
    }
}

/// Wraps a [`Sink`] as the terminal process of a pipeline.
pub struct SinkProcess<S> {
    name: String,
    sink: S,
    ledger: FlowLedger,
}

impl<S: Sink> SinkProcess<S> {
    pub fn new(name: impl Into<String>, sink: S) -> Self {
        Self {
            name: name.into(),
            sink,
            ledger: FlowLedger::new(),
        }
    }
}

impl<S: Sink> Process for SinkProcess<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_message(
        &mut self,
        from: ProcessId,
        message: Message,
        ctx: &mut Context<'_>,
    ) -> Result<(), SimulationError> {
        let packet = match message {
            Message::Packet(packet) => packet,
            Message::Held(packet) => {
                ctx.release(from, packet.packet_id);
                packet
            }
            Message::Release { .. } => return Ok(()),
        };
        self.ledger.on_arrival(&packet);
        self.ledger.on_sent(&packet, ctx.now());
        self.sink.accept(packet, ctx.now());
        Ok(())
    }

    fn resume(&mut self, _ctx: &mut Context<'_>) -> Result<Suspend, SimulationError> {
        Ok(Suspend::Done)
    }

    fn snapshot(&self) -> Snapshot {
        self.ledger.snapshot(None)
    }
}

#[derive(Debug, Clone)]
pub struct Departure {
    pub time: SimTime,
    pub packet: Packet,
}

/// Shared, cloneable record of departures.
#[derive(Debug, Clone, Default)]
pub struct DepartureLog {
    inner: Arc<Mutex<Vec<Departure>>>,
}

impl DepartureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn departures(&self) -> Vec<Departure> {
        self.inner.lock().clone()
    }

    /// Flow of every departure, in departure order.
    pub fn flow_sequence(&self) -> Vec<FlowId> {
        self.inner.lock().iter().map(|d| d.packet.flow_id).collect()
    }

    pub fn packet_ids(&self) -> Vec<u64> {
        self.inner.lock().iter().map(|d| d.packet.packet_id).collect()
    }

    pub fn bytes_by_flow(&self) -> BTreeMap<FlowId, u64> {
        let mut totals = BTreeMap::new();
        for departure in self.inner.lock().iter() {
            *totals.entry(departure.packet.flow_id).or_insert(0) += departure.packet.size;
        }
        totals
    }

    pub fn packets_by_flow(&self) -> BTreeMap<FlowId, u64> {
        let mut totals = BTreeMap::new();
        for departure in self.inner.lock().iter() {
            *totals.entry(departure.packet.flow_id).or_insert(0) += 1;
        }
        totals
    }

    /// BLAKE3 digest over the departure sequence, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Hasher::new();
        for departure in self.inner.lock().iter() {
            hasher.update(&departure.time.to_le_bytes());
            hasher.update(&departure.packet.packet_id.to_le_bytes());
            hasher.update(&departure.packet.flow_id.0.to_le_bytes());
            hasher.update(&departure.packet.size.to_le_bytes());
        }
        hex::encode(hasher.finalize().as_bytes())
    }
}

impl Sink for DepartureLog {
    fn accept(&mut self, packet: Packet, now: SimTime) {
        self.inner.lock().push(Departure { time: now, packet });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Engine;

    fn pipeline(producer: impl Producer + 'static) -> (Engine, DepartureLog) {
        let log = DepartureLog::new();
        let mut engine = Engine::new();
        let sink = engine.spawn(SinkProcess::new("sink", log.clone()));
        let source = engine.spawn(Source::new("source", producer));
        engine.connect(source, sink).unwrap();
        (engine, log)
    }

    #[test]
    fn source_emits_at_creation_time() {
        let producer = TraceProducer::periodic(FlowId(2), 100, Duration::from_nanos(50), 64, 3, 10);
        let (mut engine, log) = pipeline(producer);
        engine.advance_until_idle_or_deadline(None).unwrap();

        let times: Vec<_> = log.departures().iter().map(|d| d.time).collect();
        assert_eq!(times, vec![100, 150, 200]);
        assert_eq!(log.packet_ids(), vec![10, 11, 12]);
        assert_eq!(log.bytes_by_flow()[&FlowId(2)], 192);
    }

    #[test]
    fn simultaneous_packets_keep_order() {
        let packets = vec![
            Packet::new(5, 10, 1, FlowId(0)),
            Packet::new(5, 10, 2, FlowId(1)),
            Packet::new(5, 10, 3, FlowId(0)),
        ];
        let (mut engine, log) = pipeline(TraceProducer::new(packets));
        engine.advance_until_idle_or_deadline(None).unwrap();
        assert_eq!(log.packet_ids(), vec![1, 2, 3]);
        assert_eq!(log.packets_by_flow()[&FlowId(0)], 2);
    }

    #[test]
    fn decreasing_timestamps_are_rejected() {
        let packets = vec![Packet::new(50, 10, 1, FlowId(0)), Packet::new(20, 10, 2, FlowId(0))];
        let (mut engine, _) = pipeline(TraceProducer::new(packets));
        assert!(matches!(
            engine.advance_until_idle_or_deadline(None),
            Err(SimulationError::NonMonotonicProducer {
                previous: 50,
                next: 20,
                ..
            })
        ));
    }

    #[test]
    fn closures_are_producers() {
        let mut next_id = 0;
        let producer = move || {
            next_id += 1;
            (next_id <= 2).then(|| Packet::new(next_id * 10, 1, next_id, FlowId(0)))
        };
        let (mut engine, log) = pipeline(producer);
        engine.advance_until_idle_or_deadline(None).unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn identical_runs_share_a_digest() {
        let run = || {
            let producer = TraceProducer::periodic(FlowId(0), 0, Duration::from_nanos(3), 100, 20, 0);
            let (mut engine, log) = pipeline(producer);
            engine.advance_until_idle_or_deadline(None).unwrap();
            log.digest()
        };
        let first = run();
        assert_eq!(first, run());
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn sink_snapshot_counts_departures() {
        let producer = TraceProducer::periodic(FlowId(1), 0, Duration::from_nanos(1), 10, 4, 0);
        let log = DepartureLog::new();
        let mut engine = Engine::new();
        let sink = engine.spawn(SinkProcess::new("sink", log));
        let source = engine.spawn(Source::new("source", producer));
        engine.connect(source, sink).unwrap();
        engine.advance_until_idle_or_deadline(None).unwrap();

        let snap = engine.snapshot(sink).unwrap();
        assert_eq!(snap.received, 4);
        assert_eq!(snap.flows[&FlowId(1)].sent_bytes, 40);
    }
}
