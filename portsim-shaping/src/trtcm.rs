//! ## portsim-shaping::trtcm
//! **Two-rate three-colour marker (RFC 2698, colour-blind mode)**
//!
//! Labels packets and passes them straight on. It has no buffer; whatever the
//! colour means is decided downstream.

use std::collections::BTreeMap;

use tracing::trace;

use portsim_config::MarkerConfig;
use portsim_core::events::{Context, Message, Process, ProcessId, Suspend};
use portsim_core::monitor::{FlowLedger, Snapshot};
use portsim_core::packet::Color;
use portsim_core::time::SimTime;
use portsim_core::SimulationError;

use crate::token_bucket::{TokenBucket, TokenBucketLimiter};

pub struct TrTcm {
    name: String,
    committed: TokenBucket,
    peak: TokenBucket,
    colors: BTreeMap<Color, u64>,
    ledger: FlowLedger,
}

impl TrTcm {
    pub fn new(
        name: impl Into<String>,
        committed_rate_bps: f64,
        committed_burst_bytes: u64,
        peak_rate_bps: f64,
        peak_burst_bytes: u64,
    ) -> Result<Self, SimulationError> {
        if peak_rate_bps < committed_rate_bps {
            return Err(SimulationError::config(
                "peak rate must be at least the committed rate",
            ));
        }
        Ok(Self {
            name: name.into(),
            committed: TokenBucket::new(committed_rate_bps, committed_burst_bytes, 0)?,
            peak: TokenBucket::new(peak_rate_bps, peak_burst_bytes, 0)?,
            colors: BTreeMap::new(),
            ledger: FlowLedger::new(),
        })
    }

    pub fn from_config(config: &MarkerConfig) -> Result<Self, SimulationError> {
        Self::new(
            config.name.clone(),
            config.committed_rate_bps,
            config.committed_burst_bytes,
            config.peak_rate_bps,
            config.peak_burst_bytes,
        )
    }

    /// Colours a packet of `size` bytes arriving at `now` and debits the buckets.
    ///
    /// Red debits nothing, yellow debits the peak bucket, green debits both.
    pub fn mark(&mut self, now: SimTime, size: u64) -> Color {
        if !self.peak.can_spend(now, size) {
            return Color::Red;
        }
        if !self.committed.can_spend(now, size) {
            self.peak.debit(now, size);
            return Color::Yellow;
        }
        self.peak.debit(now, size);
        self.committed.debit(now, size);
        Color::Green
    }

    pub fn color_counts(&self) -> &BTreeMap<Color, u64> {
        &self.colors
    }
}

impl Process for TrTcm {
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
        let color = self.mark(ctx.now(), packet.size);
        *self.colors.entry(color).or_insert(0) += 1;
        trace!(marker = %self.name, packet_id = packet.packet_id, ?color, "marked");

        self.ledger.on_arrival(&packet);
        self.ledger.on_sent(&packet, ctx.now());
        ctx.forward(packet.marked(color))
    }

    fn resume(&mut self, _ctx: &mut Context<'_>) -> Result<Suspend, SimulationError> {
        Ok(Suspend::Done)
    }

    fn snapshot(&self) -> Snapshot {
        self.ledger.snapshot(None)
    }
}
