//! Simulation run-loop.

use std::time::Duration;

use tracing::{debug, info, trace};

use super::process::{Context, Message, Process, ProcessId, Suspend};
use super::queue::{EventKind, EventQueue, ScheduledEvent};
use crate::error::SimulationError;
use crate::monitor::Snapshot;
use crate::time::{SimTime, VirtualClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// A resume event is pending.
    Scheduled,
    /// Suspended for a fixed duration.
    Sleeping,
    /// Blocked until notified.
    Waiting,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub events_processed: u64,
    pub finished_at: SimTime,
    /// `true` when the run stopped because no events were left.
    pub drained: bool,
}

struct Slot {
    name: String,
    process: Box<dyn Process>,
    state: ProcessState,
    downstream: Option<ProcessId>,
}

/// Single-threaded discrete-event engine.
///
/// Owns every process and the event queue; exactly one process runs at a time.
pub struct Engine {
    clock: VirtualClock,
    queue: EventQueue,
    slots: Vec<Slot>,
    outbox: Vec<(ProcessId, Message)>,
    processed: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_clock(VirtualClock::new(0))
    }

    pub fn with_clock(clock: VirtualClock) -> Self {
        Self {
            clock,
            queue: EventQueue::new(),
            slots: Vec::new(),
            outbox: Vec::new(),
            processed: 0,
        }
    }

    /// A handle on the engine's clock, for read-only observers.
    pub fn clock(&self) -> VirtualClock {
        self.clock.clone()
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.clock.now_ns()
    }

    /// Registers `process` and schedules its first resume at the current time.
    pub fn spawn<P: Process + 'static>(&mut self, process: P) -> ProcessId {
        self.spawn_boxed(Box::new(process))
    }

    pub fn spawn_boxed(&mut self, process: Box<dyn Process>) -> ProcessId {
        let id = ProcessId::new(self.slots.len());
        let name = process.name().to_string();
        debug!(%id, name = %name, "spawned process");
        self.slots.push(Slot {
            name,
            process,
            state: ProcessState::Scheduled,
            downstream: None,
        });
        self.queue.push(self.now(), id, EventKind::Resume);
        id
    }

    /// Declares `to` as the downstream of `from`.
    pub fn connect(&mut self, from: ProcessId, to: ProcessId) -> Result<(), SimulationError> {
        if to.index() >= self.slots.len() {
            return Err(SimulationError::UnknownProcess(to));
        }
        let slot = self
            .slots
            .get_mut(from.index())
            .ok_or(SimulationError::UnknownProcess(from))?;
        slot.downstream = Some(to);
        Ok(())
    }

    pub fn state(&self, id: ProcessId) -> Option<ProcessState> {
        self.slots.get(id.index()).map(|slot| slot.state)
    }

    pub fn name(&self, id: ProcessId) -> Option<&str> {
        self.slots.get(id.index()).map(|slot| slot.name.as_str())
    }

    pub fn process_ids(&self) -> impl Iterator<Item = ProcessId> {
        (0..self.slots.len()).map(ProcessId::new)
    }

    /// Read-only monitoring view of a process.
    pub fn snapshot(&self, id: ProcessId) -> Result<Snapshot, SimulationError> {
        self.slots
            .get(id.index())
            .map(|slot| slot.process.snapshot())
            .ok_or(SimulationError::UnknownProcess(id))
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Processes events in `(time, insertion)` order until none are left or the
    /// next one lies beyond `deadline`.
    ///
    /// With a deadline the clock ends exactly on it. Processes still suspended
    /// at that point are simply left alone. The first error raised by a process
    /// stops the run and is returned.
    pub fn advance_until_idle_or_deadline(
        &mut self,
        deadline: Option<SimTime>,
    ) -> Result<RunSummary, SimulationError> {
        let started_with = self.processed;
        trace!(now = self.now(), ?deadline, "advancing simulation");

        let drained = loop {
            let Some(next) = self.queue.peek_time() else {
                break true;
            };
            if deadline.is_some_and(|limit| next > limit) {
                break false;
            }
            let Some(event) = self.queue.pop() else {
                break true;
            };
            self.clock.advance_to(event.time);
            self.dispatch(event)?;
            self.processed += 1;
        };

        if let Some(limit) = deadline {
            self.clock.advance_to(limit);
        }

        Ok(RunSummary {
            events_processed: self.processed - started_with,
            finished_at: self.now(),
            drained,
        })
    }

    /// Runs until `deadline`, handing the engine to `observer` every `interval`
    /// of virtual time (starting now, ending on the deadline).
    pub fn run_sampled<F>(
        &mut self,
        deadline: SimTime,
        interval: Duration,
        mut observer: F,
    ) -> Result<RunSummary, SimulationError>
    where
        F: FnMut(SimTime, &Engine),
    {
        let step = interval.as_nanos() as SimTime;
        if step == 0 {
            return Err(SimulationError::config("sample interval must be positive"));
        }
        info!(deadline, interval = ?interval, processes = self.slots.len(), "starting sampled run");

        let mut events_processed = 0;
        let mut next_sample = self.now();
        loop {
            let target = next_sample.min(deadline);
            let summary = self.advance_until_idle_or_deadline(Some(target))?;
            events_processed += summary.events_processed;
            observer(self.now(), self);
            if target >= deadline {
                info!(events_processed, "sampled run finished");
                return Ok(RunSummary {
                    events_processed,
                    finished_at: self.now(),
                    drained: self.queue.is_empty(),
                });
            }
            next_sample = target.saturating_add(step);
        }
    }

    fn dispatch(&mut self, event: ScheduledEvent) -> Result<(), SimulationError> {
        let now = self.clock.now_ns();
        let target = event.target;
        self.outbox.clear();

        let slot = self
            .slots
            .get_mut(target.index())
            .ok_or(SimulationError::UnknownProcess(target))?;

        let mut wake_at = None;
        let mut resume_now = false;
        {
            let mut ctx = Context::new(now, target, &slot.name, slot.downstream, &mut self.outbox);
            match event.kind {
                EventKind::Resume => {
                    if slot.state == ProcessState::Finished {
                        trace!(process = %slot.name, "ignoring resume of finished process");
                    } else {
                        match slot.process.resume(&mut ctx)? {
                            Suspend::After(duration) => {
                                if duration.is_zero() {
                                    return Err(SimulationError::InvalidSuspension {
                                        process: slot.name.clone(),
                                        duration,
                                    });
                                }
                                slot.state = ProcessState::Sleeping;
                                wake_at = Some(now.saturating_add(duration.as_nanos() as SimTime));
                            }
                            Suspend::UntilNotified if ctx.was_notified() => {
                                slot.state = ProcessState::Scheduled;
                                resume_now = true;
                            }
                            Suspend::UntilNotified => slot.state = ProcessState::Waiting,
                            Suspend::Done => {
                                debug!(process = %slot.name, now, "process finished");
                                slot.state = ProcessState::Finished;
                            }
                        }
                    }
                }
                EventKind::Deliver { from, message } => {
                    slot.process.on_message(from, message, &mut ctx)?;
                    if ctx.was_notified() && slot.state == ProcessState::Waiting {
                        slot.state = ProcessState::Scheduled;
                        resume_now = true;
                    }
                }
            }
        }

        if let Some(at) = wake_at {
            self.queue.push(at, target, EventKind::Resume);
        }
        for (to, message) in self.outbox.drain(..) {
            self.queue.push(now, to, EventKind::Deliver { from: target, message });
        }
        if resume_now {
            self.queue.push(now, target, EventKind::Resume);
        }
        Ok(())
    }
}
