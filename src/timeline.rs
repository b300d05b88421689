//! The timeline: virtual clock, event queue and execution loop.
//!
//! Drives the scheduler: pops the earliest valid event, advances the
//! virtual clock to its time and dispatches its process to a handler.
//! The loop is synchronous and single-threaded; every process body
//! runs to completion before the next event is considered.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::config::TimelineConfig;
use crate::error::{QnetError, QnetResult};
use crate::event::{Event, EventId, Process};
use crate::eventlog::EventLog;
use crate::scheduler::{PendingEvent, Scheduler};
use crate::time::VirtualTime;

/// Random source used for every probabilistic draw in a run.
pub type SimRng = ChaCha8Rng;

// ── Handler trait ─────────────────────────────────────────────────────

/// Receives every executed event.
///
/// The handler owns (or can resolve) the targets named by each
/// `Process` and may schedule follow-up work through the context.
pub trait EventHandler {
    /// Called for every executed event.
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event);

    /// Deterministic hash of the handler's state, used for checkpoints.
    fn compute_state_hash(&self) -> u64 {
        0
    }
}

/// A handler backed by a closure, for tests and one-off scripts.
impl<F> EventHandler for F
where
    F: FnMut(&mut SimulationContext, &Event),
{
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event) {
        (self)(ctx, event);
    }
}

// ── Simulation Context ───────────────────────────────────────────────

/// Mutable view of the timeline handed to process bodies.
///
/// Exposes the clock, the scheduling API and the run's random source.
/// Dispatch order can only be influenced through `schedule_*` and
/// `invalidate`.
pub struct SimulationContext<'a> {
    pub(crate) scheduler: &'a mut Scheduler,
    pub(crate) rng: &'a mut SimRng,
    pub(crate) stop_requested: &'a mut bool,
    pub(crate) now: VirtualTime,
    pub(crate) current: Option<EventId>,
}

impl<'a> SimulationContext<'a> {
    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// The event whose process is executing, if any.
    #[inline]
    pub fn current_event(&self) -> Option<EventId> {
        self.current
    }

    /// Schedule a process at an absolute virtual time.
    ///
    /// Fails with [`QnetError::Causality`] if `at` is before now.
    pub fn schedule_at(&mut self, at: VirtualTime, process: Process) -> QnetResult<EventId> {
        if at < self.now {
            return Err(QnetError::Causality {
                requested: at.ticks(),
                current: self.now.ticks(),
            });
        }
        Ok(self.scheduler.schedule(at, process))
    }

    /// Schedule a process `delay` ticks after now. Saturates at the end of time.
    pub fn schedule_after(&mut self, delay: u64, process: Process) -> QnetResult<EventId> {
        let at = self.now.plus(delay).unwrap_or(VirtualTime::MAX);
        self.schedule_at(at, process)
    }

    /// Soft-cancel a pending event. Returns `false` if it was not pending.
    pub fn invalidate(&mut self, id: EventId) -> bool {
        self.scheduler.invalidate(id)
    }

    /// Whether `id` is queued and still valid.
    pub fn is_valid(&self, id: EventId) -> bool {
        self.scheduler.is_valid(id)
    }

    /// Number of queued events, invalidated ones included.
    pub fn pending_count(&self) -> usize {
        self.scheduler.len()
    }

    /// The run's random source.
    pub fn rng(&mut self) -> &mut SimRng {
        &mut *self.rng
    }

    /// Ask the run loop to return after the current event.
    pub fn stop(&mut self) {
        *self.stop_requested = true;
    }
}

// ── Timeline ──────────────────────────────────────────────────────────

/// Top-level simulation driver.
///
/// Owned by the driver; every other component only borrows it through a
/// [`SimulationContext`]. Call [`run`](Timeline::run) to execute until the
/// queue drains or `stop_time` is reached, or [`step`](Timeline::step)
/// to execute exactly one event.
#[derive(Debug, Clone)]
pub struct Timeline {
    scheduler: Scheduler,
    current_time: VirtualTime,
    stop_time: Option<VirtualTime>,
    is_running: bool,
    stop_requested: bool,
    events_processed: u64,
    events_skipped: u64,
    seed: u64,
    rng: SimRng,
    event_log: Option<EventLog>,
}

impl Timeline {
    /// A timeline at time zero with the default seed and no stop time.
    pub fn new() -> Self {
        Self::with_seed(TimelineConfig::default().seed)
    }

    /// A timeline whose random draws are fully determined by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Timeline {
            scheduler: Scheduler::new(),
            current_time: VirtualTime::ZERO,
            stop_time: None,
            is_running: false,
            stop_requested: false,
            events_processed: 0,
            events_skipped: 0,
            seed,
            rng: SimRng::seed_from_u64(seed),
            event_log: None,
        }
    }

    pub fn from_config(config: &TimelineConfig) -> Self {
        let mut tl = Self::with_seed(config.seed);
        tl.stop_time = config.stop_time.map(VirtualTime::new);
        tl
    }

    /// Current virtual time.
    pub fn now(&self) -> VirtualTime {
        self.current_time
    }

    pub fn stop_time(&self) -> Option<VirtualTime> {
        self.stop_time
    }

    /// Events at or after `time` are left queued by `run`.
    pub fn stop_at(&mut self, time: VirtualTime) {
        self.stop_time = Some(time);
    }

    pub fn clear_stop_time(&mut self) {
        self.stop_time = None;
    }

    /// `true` only while `run`/`run_for` is executing.
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Total events executed so far.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Total invalidated events discarded so far.
    pub fn events_skipped(&self) -> u64 {
        self.events_skipped
    }

    /// Schedule a process at an absolute time.
    pub fn schedule(&mut self, at: VirtualTime, process: Process) -> QnetResult<EventId> {
        self.context().schedule_at(at, process)
    }

    /// Schedule a process `delay` ticks after now.
    pub fn schedule_after(&mut self, delay: u64, process: Process) -> QnetResult<EventId> {
        self.context().schedule_after(delay, process)
    }

    /// Soft-cancel a pending event; its queue position is unchanged.
    pub fn invalidate(&mut self, id: EventId) -> bool {
        self.scheduler.invalidate(id)
    }

    pub fn is_valid(&self, id: EventId) -> bool {
        self.scheduler.is_valid(id)
    }

    /// Queued events in dispatch order, with their validity.
    pub fn pending(&self) -> Vec<PendingEvent> {
        self.scheduler.pending()
    }

    /// Number of queued events, invalidated ones included.
    pub fn pending_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Number of queued events that will still execute.
    pub fn live_count(&self) -> usize {
        self.scheduler.live_len()
    }

    /// `true` when no valid event is left.
    pub fn is_finished(&self) -> bool {
        self.scheduler.live_len() == 0
    }

    pub fn rng_mut(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    /// A context for driver code running outside the event loop.
    ///
    /// Lets setup code and tests call the same component APIs that
    /// process bodies use.
    pub fn context(&mut self) -> SimulationContext<'_> {
        SimulationContext {
            scheduler: &mut self.scheduler,
            rng: &mut self.rng,
            stop_requested: &mut self.stop_requested,
            now: self.current_time,
            current: None,
        }
    }

    // ── Event log ─────────────────────────────────────────────────

    /// Record every executed event.
    pub fn enable_logging(&mut self) {
        self.event_log = Some(EventLog::new());
    }

    /// Record every executed event and checkpoint the handler state
    /// every `interval` events.
    pub fn enable_logging_with_checkpoints(&mut self, interval: u64) {
        self.event_log = Some(EventLog::with_checkpoint_interval(interval));
    }

    pub fn event_log(&self) -> QnetResult<&EventLog> {
        self.event_log.as_ref().ok_or(QnetError::LogNotEnabled)
    }

    // ── Execution ─────────────────────────────────────────────────

    /// Pop the next event that should execute, discarding invalidated
    /// ones. Leaves the queue untouched once the head reaches `stop_time`.
    fn next_due(&mut self) -> Option<Event> {
        loop {
            let head_time = self.scheduler.peek_next()?.time;
            if matches!(self.stop_time, Some(stop) if head_time >= stop) {
                return None;
            }
            let popped = self.scheduler.pop_any()?;
            if popped.is_valid {
                return Some(popped.event);
            }
            self.events_skipped += 1;
            trace!(event = %popped.event.id, time = %popped.event.time, "skipped invalidated event");
        }
    }

    /// Execute a single event: pop, advance time, dispatch.
    ///
    /// Returns the executed event, or `None` if nothing is due.
    pub fn step(&mut self, handler: &mut dyn EventHandler) -> Option<Event> {
        let event = self.next_due()?;

        debug_assert!(
            event.time >= self.current_time,
            "time went backward: current={}, event={}",
            self.current_time,
            event.time
        );
        self.current_time = event.time;
        self.events_processed += 1;
        trace!(event = %event.id, time = %event.time, process = %event.process, "dispatch");

        let mut ctx = SimulationContext {
            scheduler: &mut self.scheduler,
            rng: &mut self.rng,
            stop_requested: &mut self.stop_requested,
            now: self.current_time,
            current: Some(event.id),
        };
        handler.handle(&mut ctx, &event);

        if let Some(log) = self.event_log.as_mut() {
            log.record(event.clone());
            if log.should_checkpoint(self.events_processed) {
                log.add_checkpoint(
                    self.events_processed,
                    self.current_time,
                    handler.compute_state_hash(),
                );
            }
        }

        Some(event)
    }

    /// Run until the queue drains, `stop_time` is reached, or a process
    /// calls [`SimulationContext::stop`].
    ///
    /// Returns the number of events executed during this call.
    pub fn run(&mut self, handler: &mut dyn EventHandler) -> u64 {
        self.run_for(u64::MAX, handler)
    }

    /// Like [`run`](Timeline::run) but executes at most `max_steps` events.
    pub fn run_for(&mut self, max_steps: u64, handler: &mut dyn EventHandler) -> u64 {
        let start = self.events_processed;
        self.is_running = true;
        self.stop_requested = false;
        debug!(time = %self.current_time, pending = self.scheduler.len(), "timeline started");

        let mut steps = 0u64;
        while steps < max_steps && !self.stop_requested {
            if self.step(handler).is_none() {
                break;
            }
            steps += 1;
        }

        self.is_running = false;
        debug!(
            time = %self.current_time,
            executed = self.events_processed - start,
            pending = self.scheduler.len(),
            "timeline stopped"
        );
        self.events_processed - start
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}
