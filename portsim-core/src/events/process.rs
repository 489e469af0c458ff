use std::fmt;
use std::time::Duration;

use crate::error::SimulationError;
use crate::monitor::Snapshot;
use crate::packet::Packet;
use crate::time::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(usize);

impl ProcessId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process #{}", self.0)
    }
}

/// What a process asks of the engine when it yields control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspend {
    After(Duration),
    UntilNotified,
    Done,
}

#[derive(Debug, Clone)]
pub enum Message {
    Packet(Packet),
    /// The sender keeps counting this packet against its own buffer until the
    /// receiver answers with [`Message::Release`].
    Held(Packet),
    Release { packet_id: u64 },
}

/// The slice of the engine a process sees while it runs.
pub struct Context<'a> {
    now: SimTime,
    me: ProcessId,
    name: &'a str,
    downstream: Option<ProcessId>,
    outbox: &'a mut Vec<(ProcessId, Message)>,
    notified: bool,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        now: SimTime,
        me: ProcessId,
        name: &'a str,
        downstream: Option<ProcessId>,
        outbox: &'a mut Vec<(ProcessId, Message)>,
    ) -> Self {
        Self {
            now,
            me,
            name,
            downstream,
            outbox,
            notified: false,
        }
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    #[inline]
    pub fn id(&self) -> ProcessId {
        self.me
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn downstream(&self) -> Option<ProcessId> {
        self.downstream
    }

    /// Suspends the calling process for `duration` of virtual time.
    pub fn schedule_after(&self, duration: Duration) -> Result<Suspend, SimulationError> {
        if duration.is_zero() {
            return Err(SimulationError::InvalidSuspension {
                process: self.name.to_string(),
                duration,
            });
        }
        Ok(Suspend::After(duration))
    }

    pub fn send(&mut self, to: ProcessId, message: Message) {
        self.outbox.push((to, message));
    }

    /// Hands `packet` to the connected downstream.
    pub fn forward(&mut self, packet: Packet) -> Result<(), SimulationError> {
        let to = self.require_downstream()?;
        self.send(to, Message::Packet(packet));
        Ok(())
    }

    /// Hands `packet` downstream while keeping it on this process' books.
    pub fn forward_held(&mut self, packet: Packet) -> Result<(), SimulationError> {
        let to = self.require_downstream()?;
        self.send(to, Message::Held(packet));
        Ok(())
    }

    pub fn release(&mut self, upstream: ProcessId, packet_id: u64) {
        self.send(upstream, Message::Release { packet_id });
    }

    /// Signals that this process' queue became non-empty.
    ///
    /// Wakes the process if it is blocked in [`Suspend::UntilNotified`];
    /// otherwise it has no effect.
    pub fn notify(&mut self) {
        self.notified = true;
    }

    pub(crate) fn was_notified(&self) -> bool {
        self.notified
    }

    fn require_downstream(&self) -> Result<ProcessId, SimulationError> {
        self.downstream.ok_or_else(|| SimulationError::Unconnected {
            process: self.name.to_string(),
        })
    }
}

/// A unit of suspendable control driven by the [`Engine`](super::Engine).
pub trait Process {
    fn name(&self) -> &str;

    /// Receives a message. Runs at the current virtual time and never suspends.
    fn on_message(
        &mut self,
        from: ProcessId,
        message: Message,
        ctx: &mut Context<'_>,
    ) -> Result<(), SimulationError>;

    /// Continues after a suspension. Also called once when the process is spawned.
    fn resume(&mut self, ctx: &mut Context<'_>) -> Result<Suspend, SimulationError>;

    /// Read-only monitoring hook.
    fn snapshot(&self) -> Snapshot {
        Snapshot::default()
    }
}
