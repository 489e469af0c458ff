//! End-to-end runs of sources, shapers, ports and sinks on one engine.

use std::time::Duration;

use portsim_config::{LimitUnit, PortSimConfig};
use portsim_core::events::{Engine, ProcessId};
use portsim_core::flow::{FlowId, FlowTable};
use portsim_core::io::{DepartureLog, SinkProcess, Source, TraceProducer};
use portsim_core::packet::Packet;
use portsim_core::time::{from_secs, SimTime};
use portsim_shaping::admission::{QueueLimit, TailDrop};
use portsim_shaping::{Red, RedParams, TokenBucketShaper};

use crate::discipline::{Discipline, Drr, Fifo, StaticPriority, VirtualClockScheduler, Wfq};
use crate::port::Port;

const MS: SimTime = 1_000_000;

/// `count` packets per flow at `at`, flows interleaved.
fn saturating(flows: &[(u32, u64)], count: usize, at: SimTime, first_id: u64) -> Vec<Packet> {
    let mut id = first_id;
    let mut packets = Vec::new();
    for _ in 0..count {
        for (flow, size) in flows {
            packets.push(Packet::new(at, *size, id, FlowId(*flow)));
            id += 1;
        }
    }
    packets
}

fn single_port<D: Discipline + 'static>(
    port: Port<D>,
    packets: Vec<Packet>,
) -> (Engine, DepartureLog, ProcessId) {
    let log = DepartureLog::new();
    let mut engine = Engine::new();
    let sink = engine.spawn(SinkProcess::new("sink", log.clone()));
    let port = engine.spawn(port);
    let source = engine.spawn(Source::new("source", TraceProducer::new(packets)));
    engine.connect(source, port).unwrap();
    engine.connect(port, sink).unwrap();
    (engine, log, port)
}

fn count_flow(flows: &[FlowId], flow: u32) -> usize {
    flows.iter().filter(|f| f.0 == flow).count()
}

#[test]
fn drr_serves_weights_one_two_three() {
    let drr = Drr::new(FlowTable::dense(vec![1.0, 2.0, 3.0]), 500).unwrap();
    // 500 bytes at 4 Mbit/s is one millisecond per packet.
    let port = Port::new("drr", drr).with_rate(4_000_000.0).unwrap();
    let packets = saturating(&[(0, 500), (1, 500), (2, 500)], 60, 0, 0);
    let (mut engine, log, _) = single_port(port, packets);
    engine.advance_until_idle_or_deadline(None).unwrap();

    let sequence = log.flow_sequence();
    for rounds in 1..=6 {
        let prefix = &sequence[..6 * rounds];
        assert_eq!(
            [count_flow(prefix, 0), count_flow(prefix, 1), count_flow(prefix, 2)],
            [rounds, 2 * rounds, 3 * rounds]
        );
    }
    assert_eq!(log.len(), 180);
}

#[test]
fn sp_low_class_waits_for_a_gap_and_never_preempts() {
    // flow 0 -> class 1 (high), flow 1 -> class 2 (low)
    let sp = StaticPriority::new(FlowTable::dense(vec![1, 2])).unwrap();
    let port = Port::new("sp", sp).with_rate(800_000.0).unwrap();

    let mut packets = saturating(&[(0, 100)], 5, 0, 0);
    packets.push(Packet::new(MS / 2, 100, 5, FlowId(1)));
    packets.extend(saturating(&[(0, 100)], 5, 5 * MS + MS / 2, 6));
    let (mut engine, log, port) = single_port(port, packets);

    engine.advance_until_idle_or_deadline(Some(3 * MS)).unwrap();
    let starved: Vec<_> = engine.snapshot(port).unwrap().starved_flows().collect();
    assert_eq!(starved, vec![FlowId(1)]);

    engine.advance_until_idle_or_deadline(None).unwrap();
    let flows: Vec<u32> = log.flow_sequence().iter().map(|f| f.0).collect();
    assert_eq!(flows, vec![0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0]);

    let low = log
        .departures()
        .into_iter()
        .find(|d| d.packet.flow_id == FlowId(1))
        .map(|d| d.time);
    // Served in the gap at 5 ms; the 5.5 ms class-1 burst waits for it.
    assert_eq!(low, Some(6 * MS));
}

#[test]
fn wfq_equal_weights_share_equally() {
    let wfq = Wfq::new(FlowTable::dense(vec![1.0, 1.0]), 8_000_000.0).unwrap();
    let port = Port::new("wfq", wfq).with_rate(8_000_000.0).unwrap();
    let packets = saturating(&[(0, 1_000), (1, 500)], 200, 0, 0);
    let (mut engine, log, _) = single_port(port, packets);
    engine.advance_until_idle_or_deadline(Some(100 * MS)).unwrap();

    let mut sent = [0i64; 2];
    for departure in log.departures() {
        sent[departure.packet.flow_id.0 as usize] += departure.packet.size as i64;
        assert!((sent[0] - sent[1]).abs() <= 1_000);
    }
    assert!(sent[0] > 40_000 && sent[1] > 40_000);
}

#[test]
fn wfq_returning_flow_gets_no_burst_of_credit() {
    let wfq = Wfq::new(FlowTable::dense(vec![1.0, 1.0]), 8_000_000.0).unwrap();
    // 1000 bytes at 8 Mbit/s is one millisecond per packet.
    let port = Port::new("wfq", wfq).with_rate(8_000_000.0).unwrap();
    let mut packets = saturating(&[(0, 1_000)], 200, 0, 0);
    packets.extend(saturating(&[(1, 1_000)], 50, 50 * MS, 1_000));
    let (mut engine, log, _) = single_port(port, packets);
    engine.advance_until_idle_or_deadline(Some(70 * MS)).unwrap();

    let after: Vec<FlowId> = log
        .departures()
        .into_iter()
        .filter(|d| d.time > 50 * MS)
        .map(|d| d.packet.flow_id)
        .collect();
    assert_eq!(after.len(), 20);
    assert!((9..=11).contains(&count_flow(&after, 1)));
}

#[test]
fn virtual_clock_follows_reserved_rates() {
    let vc = VirtualClockScheduler::new(FlowTable::dense(vec![2_000_000.0, 1_000_000.0]), None)
        .unwrap();
    let port = Port::new("vc", vc).with_rate(3_000_000.0).unwrap();
    let packets = saturating(&[(0, 1_000), (1, 1_000)], 100, 0, 0);
    let (mut engine, log, _) = single_port(port, packets);
    engine.advance_until_idle_or_deadline(None).unwrap();

    let first: Vec<FlowId> = log.flow_sequence().into_iter().take(90).collect();
    assert!((59..=61).contains(&count_flow(&first, 0)));
}

/// A gatekeeper with no link of its own in front of a slow port whose queue
/// is the gatekeeper's buffer.
fn chained(collapse: bool) -> (Engine, DepartureLog, ProcessId, ProcessId) {
    let log = DepartureLog::new();
    let mut engine = Engine::new();
    let sink = engine.spawn(SinkProcess::new("sink", log.clone()));
    let slow = engine.spawn(
        Port::new("slow", Fifo::new())
            .with_rate(80_000.0)
            .unwrap()
            .with_zero_buffer(collapse),
    );
    let gate = engine.spawn(
        Port::new("gate", Fifo::new())
            .with_admission(Box::new(TailDrop::new(QueueLimit::Packets(3))))
            .with_zero_downstream_buffer(collapse),
    );
    let packets = (0..10).map(|i| Packet::new(i * MS, 100, i, FlowId(0))).collect();
    let source = engine.spawn(Source::new("source", TraceProducer::new(packets)));
    engine.connect(source, gate).unwrap();
    engine.connect(gate, slow).unwrap();
    engine.connect(slow, sink).unwrap();
    (engine, log, gate, slow)
}

#[test]
fn zero_downstream_buffer_collapses_admission_upstream() {
    let (mut engine, log, gate, slow) = chained(true);
    engine.advance_until_idle_or_deadline(Some(5 * MS)).unwrap();
    // Three packets wait in the slow port's queue, all on the gate's books.
    assert_eq!(engine.snapshot(gate).unwrap().queued_packets, 3);
    assert_eq!(engine.snapshot(slow).unwrap().queued_packets, 3);

    engine.advance_until_idle_or_deadline(None).unwrap();
    assert_eq!(engine.snapshot(gate).unwrap().dropped, 6);
    assert_eq!(engine.snapshot(slow).unwrap().dropped, 0);
    assert_eq!(log.packet_ids(), vec![0, 1, 2, 3]);
    assert_eq!(engine.snapshot(gate).unwrap().queued_packets, 0);

    let (mut engine, log, gate, _) = chained(false);
    engine.advance_until_idle_or_deadline(None).unwrap();
    assert_eq!(engine.snapshot(gate).unwrap().dropped, 0);
    assert_eq!(log.len(), 10);
}

fn red_run(seed: u64) -> (String, u64) {
    let red = Red::new(
        RedParams {
            min_threshold: 2.0,
            max_threshold: 6.0,
            max_probability: 0.5,
            weight: 0.5,
            unit: LimitUnit::Packets,
            limit: None,
        },
        seed,
    )
    .unwrap();
    let port = Port::new("red", Fifo::new())
        .with_rate(800_000.0)
        .unwrap()
        .with_admission(Box::new(red));
    // Twice the link rate.
    let packets = (0..100)
        .map(|i| Packet::new(i * MS / 2, 100, i, FlowId((i % 3) as u32)))
        .collect();
    let (mut engine, log, port) = single_port(port, packets);
    engine.advance_until_idle_or_deadline(None).unwrap();
    (log.digest(), engine.snapshot(port).unwrap().dropped)
}

#[test]
fn identical_inputs_give_identical_runs() {
    let (digest, dropped) = red_run(42);
    assert!(dropped > 0);
    assert_eq!(red_run(42), (digest, dropped));
}

#[test]
fn pipeline_from_yaml() {
    let config = PortSimConfig::from_yaml_str(
        r#"
simulation:
  seed: 3
  duration_secs: 1.0
  sample_interval_ms: 10
shapers:
  - name: edge
    rate_bps: 8000000.0
    burst_bytes: 3000
ports:
  - name: core
    rate_bps: 8000000.0
    discipline:
      kind: drr
      weights: [1.0, 1.0]
      min_quantum: 500
    admission:
      policy: tail_drop
      limit: 50
"#,
    )
    .unwrap();

    let log = DepartureLog::new();
    let mut engine = Engine::new();
    let sink = engine.spawn(SinkProcess::new("sink", log.clone()));
    let port = engine.spawn(
        Port::from_config(config.port("core").unwrap(), config.simulation.seed).unwrap(),
    );
    let shaper =
        engine.spawn(TokenBucketShaper::from_config(config.shaper("edge").unwrap()).unwrap());
    let packets = saturating(&[(0, 500), (1, 500)], 10, 0, 0);
    let source = engine.spawn(Source::new("source", TraceProducer::new(packets)));
    engine.connect(source, shaper).unwrap();
    engine.connect(shaper, port).unwrap();
    engine.connect(port, sink).unwrap();

    let interval = Duration::from_millis(config.simulation.sample_interval_ms.unwrap());
    let mut samples = 0;
    let summary = engine
        .run_sampled(from_secs(config.simulation.duration_secs), interval, |_, _| {
            samples += 1
        })
        .unwrap();

    assert_eq!(samples, 101);
    assert_eq!(summary.finished_at, from_secs(1.0));
    assert_eq!(log.len(), 20);
    let per_flow = log.packets_by_flow();
    assert_eq!((per_flow[&FlowId(0)], per_flow[&FlowId(1)]), (10, 10));
}
