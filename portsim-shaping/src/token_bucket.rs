//! ## portsim-shaping::token_bucket
//! **Token bucket in virtual time, and the shaper process built on it**
//!
//! Tokens are bytes. They accrue at `rate / 8` bytes per second of virtual
//! time up to the burst size and are debited when a packet leaves. A packet
//! that finds too few tokens waits exactly as long as the refill takes; the
//! wait is computed, never polled.

use std::time::Duration;

use tracing::{debug, trace};

use portsim_config::ShaperConfig;
use portsim_core::events::{Context, Message, Process, ProcessId, Suspend};
use portsim_core::flow::FlowQueue;
use portsim_core::monitor::{FlowLedger, Snapshot};
use portsim_core::packet::Packet;
use portsim_core::time::{transmission_time, SimTime, NANOS_PER_SEC};
use portsim_core::SimulationError;

/// Slack absorbing floating-point residue after a computed refill wait.
const TOKEN_EPSILON: f64 = 1e-6;

/// Spend-side view shared by every bucket flavour.
pub trait TokenBucketLimiter {
    fn can_spend(&mut self, now: SimTime, cost: u64) -> bool;
    /// Debits `cost` if available.
    fn consume(&mut self, now: SimTime, cost: u64) -> bool;
}

#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    /// Bytes per second.
    rate: f64,
    capacity: f64,
    last_update: SimTime,
}

impl TokenBucket {
    /// A full bucket filling at `rate_bps` bits per second.
    pub fn new(rate_bps: f64, burst_bytes: u64, now: SimTime) -> Result<Self, SimulationError> {
        if !(rate_bps.is_finite() && rate_bps > 0.0) {
            return Err(SimulationError::config(format!(
                "token rate must be positive, got {rate_bps}"
            )));
        }
        if burst_bytes == 0 {
            return Err(SimulationError::config("burst size must be positive"));
        }
        Ok(Self {
            tokens: burst_bytes as f64,
            rate: rate_bps / 8.0,
            capacity: burst_bytes as f64,
            last_update: now,
        })
    }

    pub fn refill(&mut self, now: SimTime) {
        if now > self.last_update {
            let elapsed = (now - self.last_update) as f64 / NANOS_PER_SEC;
            self.tokens = (self.tokens + self.rate * elapsed).min(self.capacity);
            self.last_update = now;
        }
    }

    pub fn tokens(&mut self, now: SimTime) -> f64 {
        self.refill(now);
        self.tokens
    }

    pub fn capacity(&self) -> u64 {
        self.capacity as u64
    }

    /// Time until a packet of `size` bytes may leave. Zero if it may leave now,
    /// `None` if it is larger than the bucket and never conforms.
    pub fn wait_time(&mut self, now: SimTime, size: u64) -> Option<Duration> {
        if !self.fits(size) {
            return None;
        }
        let needed = size as f64;
        self.refill(now);
        if self.tokens + TOKEN_EPSILON >= needed {
            return Some(Duration::ZERO);
        }
        let nanos = ((needed - self.tokens) / self.rate * NANOS_PER_SEC).ceil();
        Some(Duration::from_nanos((nanos as u64).max(1)))
    }

    /// Removes `size` bytes worth of tokens, never going below empty.
    pub fn debit(&mut self, now: SimTime, size: u64) {
        self.refill(now);
        self.tokens = (self.tokens - size as f64).max(0.0);
    }

    /// Whether a full bucket covers `size` bytes.
    pub fn fits(&self, size: u64) -> bool {
        size as f64 <= self.capacity + TOKEN_EPSILON
    }
}

impl TokenBucketLimiter for TokenBucket {
    fn can_spend(&mut self, now: SimTime, cost: u64) -> bool {
        self.refill(now);
        self.tokens + TOKEN_EPSILON >= cost as f64
    }

    fn consume(&mut self, now: SimTime, cost: u64) -> bool {
        if self.can_spend(now, cost) {
            self.debit(now, cost);
            true
        } else {
            false
        }
    }
}

/// FIFO shaper releasing packets as the bucket allows, optionally serialised
/// at a peak rate. Packets larger than the burst are dropped on arrival.
pub struct TokenBucketShaper {
    name: String,
    bucket: TokenBucket,
    peak_rate: Option<f64>,
    queue: FlowQueue,
    in_service: Option<Packet>,
    ledger: FlowLedger,
}

impl TokenBucketShaper {
    pub fn new(
        name: impl Into<String>,
        rate_bps: f64,
        burst_bytes: u64,
        peak_rate_bps: Option<f64>,
    ) -> Result<Self, SimulationError> {
        if let Some(peak) = peak_rate_bps {
            if !(peak.is_finite() && peak > 0.0) {
                return Err(SimulationError::config(format!(
                    "peak rate must be positive, got {peak}"
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            bucket: TokenBucket::new(rate_bps, burst_bytes, 0)?,
            peak_rate: peak_rate_bps,
            queue: FlowQueue::new(),
            in_service: None,
            ledger: FlowLedger::new(),
        })
    }

    pub fn from_config(config: &ShaperConfig) -> Result<Self, SimulationError> {
        Self::new(
            config.name.clone(),
            config.rate_bps,
            config.burst_bytes,
            config.peak_rate_bps,
        )
    }

    fn send(&mut self, packet: Packet, ctx: &mut Context<'_>) -> Result<(), SimulationError> {
        trace!(shaper = %self.name, packet_id = packet.packet_id, now = ctx.now(), "released");
        self.ledger.on_sent(&packet, ctx.now());
        ctx.forward(packet)
    }
}

impl Process for TokenBucketShaper {
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
        if !self.bucket.fits(packet.size) {
            debug!(
                shaper = %self.name,
                packet_id = packet.packet_id,
                size = packet.size,
                burst = self.bucket.capacity(),
                now = ctx.now(),
                "packet exceeds burst, dropped"
            );
            self.ledger.on_drop(&packet);
            return Ok(());
        }
        self.ledger.on_enqueue(&packet);
        self.queue.push_back(packet);
        ctx.notify();
        Ok(())
    }

    fn resume(&mut self, ctx: &mut Context<'_>) -> Result<Suspend, SimulationError> {
        loop {
            if let Some(packet) = self.in_service.take() {
                self.send(packet, ctx)?;
            }

            let Some(size) = self.queue.front().map(|p| p.size) else {
                debug!(shaper = %self.name, now = ctx.now(), "idle");
                return Ok(Suspend::UntilNotified);
            };

            let Some(wait) = self.bucket.wait_time(ctx.now(), size) else {
                return Err(SimulationError::config(format!(
                    "{}: queued packet of {size} bytes exceeds the burst",
                    self.name
                )));
            };
            if !wait.is_zero() {
                trace!(shaper = %self.name, ?wait, "waiting for tokens");
                return ctx.schedule_after(wait);
            }

            let Some(packet) = self.queue.pop_front() else {
                continue;
            };
            self.ledger.on_dequeue(&packet);
            self.bucket.debit(ctx.now(), packet.size);

            match self.peak_rate {
                Some(peak) => {
                    let serialise = transmission_time(packet.size, peak);
                    self.in_service = Some(packet);
                    return ctx.schedule_after(serialise);
                }
                None => self.send(packet, ctx)?,
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        self.ledger.snapshot(self.in_service.as_ref())
    }
}
