//! ## portsim-scheduler::port
//! **An output port: admission, discipline and link in one process**
//!
//! ### Lifecycle of a packet
//! 1. Arrives as a message and is offered to the admission policy, which sees
//!    everything this port is responsible for: the discipline's backlog, the
//!    packet on the wire and packets still held by a buffer-less downstream.
//! 2. If admitted it joins the discipline and the port is woken.
//! 3. When the link is idle the discipline picks the next packet; the port
//!    stays busy for its transmission time and then forwards it.
//!
//! ### Buffer hand-off
//! - `zero_buffer`: this port's queue is the upstream's buffer. A packet that
//!   arrives held skips this port's admission policy and is released back
//!   upstream when it enters service here rather than on arrival.
//! - `zero_downstream_buffer`: departures are sent held and stay counted here
//!   until the downstream releases them, so admission for both hops happens at
//!   this port.

use std::collections::HashMap;

use tracing::{debug, trace};

use portsim_config::PortConfig;
use portsim_core::events::{Context, Message, Process, ProcessId, Suspend};
use portsim_core::monitor::{FlowLedger, Occupancy, Snapshot};
use portsim_core::packet::Packet;
use portsim_core::time::transmission_time;
use portsim_core::SimulationError;
use portsim_shaping::admission::{self, AdmissionPolicy, Unlimited, Verdict};

use crate::discipline::{AnyDiscipline, Discipline};

pub struct Port<D> {
    name: String,
    discipline: D,
    admission: Box<dyn AdmissionPolicy>,
    rate_bps: Option<f64>,
    zero_buffer: bool,
    zero_downstream_buffer: bool,
    in_service: Option<Packet>,
    /// Upstream holders of packets admitted here, released on entering service.
    held_from: HashMap<u64, ProcessId>,
    /// Sizes of departed packets the downstream has not released yet.
    awaiting_release: HashMap<u64, u64>,
    ledger: FlowLedger,
}

impl<D: Discipline> Port<D> {
    /// An unlimited port without a link rate; packets pass straight through.
    pub fn new(name: impl Into<String>, discipline: D) -> Self {
        Self {
            name: name.into(),
            discipline,
            admission: Box::new(Unlimited),
            rate_bps: None,
            zero_buffer: false,
            zero_downstream_buffer: false,
            in_service: None,
            held_from: HashMap::new(),
            awaiting_release: HashMap::new(),
            ledger: FlowLedger::new(),
        }
    }

    pub fn with_rate(mut self, rate_bps: f64) -> Result<Self, SimulationError> {
        if !(rate_bps.is_finite() && rate_bps > 0.0) {
            return Err(SimulationError::config(format!(
                "{}: port rate must be positive, got {rate_bps}",
                self.name
            )));
        }
        self.rate_bps = Some(rate_bps);
        Ok(self)
    }

    pub fn with_admission(mut self, admission: Box<dyn AdmissionPolicy>) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_zero_buffer(mut self, zero_buffer: bool) -> Self {
        self.zero_buffer = zero_buffer;
        self
    }

    pub fn with_zero_downstream_buffer(mut self, zero_downstream_buffer: bool) -> Self {
        self.zero_downstream_buffer = zero_downstream_buffer;
        self
    }

    pub fn discipline(&self) -> &D {
        &self.discipline
    }

    /// Everything counted against this port's buffer.
    pub fn occupancy(&self) -> Occupancy {
        let mut occupancy = self.ledger.queued();
        if let Some(packet) = &self.in_service {
            occupancy = occupancy.with_packet(packet);
        }
        occupancy.packets += self.awaiting_release.len();
        occupancy.bytes += self.awaiting_release.values().sum::<u64>();
        occupancy
    }

    fn admit(
        &mut self,
        from: ProcessId,
        packet: Packet,
        held: bool,
        ctx: &mut Context<'_>,
    ) -> Result<(), SimulationError> {
        self.ledger.on_arrival(&packet);
        // A held packet on a buffer-less port was admitted upstream already.
        let verdict = if held && self.zero_buffer {
            Verdict::Accept
        } else {
            self.admission.admit(&packet, self.occupancy())
        };
        if let Verdict::Drop(reason) = verdict {
            debug!(
                port = %self.name,
                policy = self.admission.name(),
                packet_id = packet.packet_id,
                flow = %packet.flow_id,
                ?reason,
                now = ctx.now(),
                "packet dropped"
            );
            self.ledger.on_drop(&packet);
            if held {
                ctx.release(from, packet.packet_id);
            }
            return Ok(());
        }

        if held {
            if self.zero_buffer {
                self.held_from.insert(packet.packet_id, from);
            } else {
                ctx.release(from, packet.packet_id);
            }
        }
        self.ledger.on_enqueue(&packet);
        self.discipline.enqueue(packet, ctx.now())?;
        ctx.notify();
        Ok(())
    }

    fn depart(&mut self, packet: Packet, ctx: &mut Context<'_>) -> Result<(), SimulationError> {
        trace!(port = %self.name, packet_id = packet.packet_id, now = ctx.now(), "departure");
        self.ledger.on_sent(&packet, ctx.now());
        if self.zero_downstream_buffer {
            self.awaiting_release.insert(packet.packet_id, packet.size);
            ctx.forward_held(packet)
        } else {
            ctx.forward(packet)
        }
    }
}

impl Port<AnyDiscipline> {
    /// Builds the port described by `config`; `seed` feeds RED.
    pub fn from_config(config: &PortConfig, seed: u64) -> Result<Self, SimulationError> {
        let discipline = AnyDiscipline::from_config(&config.discipline, config.rate_bps)?;
        let mut port = Port::new(config.name.clone(), discipline)
            .with_admission(admission::from_config(&config.admission, seed)?)
            .with_zero_buffer(config.zero_buffer)
            .with_zero_downstream_buffer(config.zero_downstream_buffer);
        if let Some(rate) = config.rate_bps {
            port = port.with_rate(rate)?;
        }
        Ok(port)
    }
}

impl<D: Discipline> Process for Port<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_message(
        &mut self,
        from: ProcessId,
        message: Message,
        ctx: &mut Context<'_>,
    ) -> Result<(), SimulationError> {
        match message {
            Message::Packet(packet) => self.admit(from, packet, false, ctx),
            Message::Held(packet) => self.admit(from, packet, true, ctx),
            Message::Release { packet_id } => {
                if self.awaiting_release.remove(&packet_id).is_none() {
                    trace!(port = %self.name, packet_id, "release for unknown packet");
                }
                Ok(())
            }
        }
    }

    fn resume(&mut self, ctx: &mut Context<'_>) -> Result<Suspend, SimulationError> {
        loop {
            if let Some(packet) = self.in_service.take() {
                self.depart(packet, ctx)?;
            }

            let Some(packet) = self.discipline.dequeue(ctx.now()) else {
                debug!(port = %self.name, now = ctx.now(), "link idle");
                return Ok(Suspend::UntilNotified);
            };
            self.ledger.on_dequeue(&packet);
            if let Some(upstream) = self.held_from.remove(&packet.packet_id) {
                ctx.release(upstream, packet.packet_id);
            }

            match self.rate_bps {
                Some(rate) => {
                    let busy = transmission_time(packet.size, rate);
                    self.in_service = Some(packet);
                    return ctx.schedule_after(busy);
                }
                None => self.depart(packet, ctx)?,
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        let mut snapshot = self.ledger.snapshot(self.in_service.as_ref());
        snapshot.queued_packets += self.awaiting_release.len();
        snapshot.queued_bytes += self.awaiting_release.values().sum::<u64>();
        snapshot
    }
}
