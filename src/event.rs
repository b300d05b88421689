//! Event and process records for the simulation kernel.
//!
//! Every deferred effect is an `Event` binding a virtual time to a
//! `Process`. Processes name one operation from a closed set together
//! with the handle of the object it acts on; the handler that owns the
//! targets resolves the handle at dispatch time.

use crate::id::{MemoryKey, NodeId, ObserverId};
use crate::time::VirtualTime;
use std::cmp::Ordering;

// ── Event ID ──────────────────────────────────────────────────────────

/// A globally unique, strictly-increasing event identifier.
///
/// Two events scheduled at the same `VirtualTime` are ordered by their
/// `EventId`, which is the insertion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw u64 into an `EventId`.
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    /// Return the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Deterministic, strictly-increasing event-ID generator.
///
/// Each `Timeline` owns exactly one of these.
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    /// Create a generator starting at 0.
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }

    /// Peek at the next ID without consuming it.
    pub fn peek(&self) -> EventId {
        EventId(self.next)
    }
}

// ── Process ───────────────────────────────────────────────────────────

/// A deferred invocation: which operation to run, on which target.
///
/// The process holds nothing beyond the binding. Targets are addressed
/// by handle and are never owned by the process.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Process {
    /// Does nothing. Useful for heartbeats and tests.
    Noop,

    /// A trace marker.
    Log(String),

    /// Coherence loss: run the memory's expiration transition.
    MemoryExpire { memory: MemoryKey },

    /// Attempt a photon emission towards the memory's owner.
    MemoryExcite { memory: MemoryKey },

    /// Swap the ground and excited amplitudes.
    MemoryFlip { memory: MemoryKey },

    /// Prepare the equal superposition.
    MemorySetPlus { memory: MemoryKey },

    /// (Re)arm the memory's expiration timer.
    MemoryArm { memory: MemoryKey },

    /// A timer set by a registered observer, e.g. a protocol retry.
    ObserverTimer { observer: ObserverId, timer_id: u64 },

    /// A timer set by a node.
    NodeTimer { node: NodeId, timer_id: u64 },
}

impl Process {
    /// The memory this process acts on, if any.
    pub fn target(&self) -> Option<MemoryKey> {
        match self {
            Process::Noop
            | Process::Log(_)
            | Process::ObserverTimer { .. }
            | Process::NodeTimer { .. } => None,
            Process::MemoryExpire { memory }
            | Process::MemoryExcite { memory }
            | Process::MemoryFlip { memory }
            | Process::MemorySetPlus { memory }
            | Process::MemoryArm { memory } => Some(*memory),
        }
    }
}

impl std::fmt::Display for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Process::Noop => write!(f, "Noop"),
            Process::Log(msg) => write!(f, "Log({})", msg),
            Process::MemoryExpire { memory } => write!(f, "Expire({})", memory),
            Process::MemoryExcite { memory } => write!(f, "Excite({})", memory),
            Process::MemoryFlip { memory } => write!(f, "Flip({})", memory),
            Process::MemorySetPlus { memory } => write!(f, "SetPlus({})", memory),
            Process::MemoryArm { memory } => write!(f, "Arm({})", memory),
            Process::ObserverTimer { observer, timer_id } => {
                write!(f, "Timer({}, #{})", observer, timer_id)
            }
            Process::NodeTimer { node, timer_id } => write!(f, "Timer({}, #{})", node, timer_id),
        }
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A single scheduled event.
///
/// Ordered by `(time, id)`. Validity is not stored here: the scheduler
/// keeps the soft-cancellation flag so that invalidation never has to
/// reach into the heap.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    /// Unique identifier (insertion sequence).
    pub id: EventId,

    /// The virtual time at which this event fires.
    pub time: VirtualTime,

    /// The deferred invocation.
    pub process: Process,
}

impl Event {
    pub fn new(id: EventId, time: VirtualTime, process: Process) -> Self {
        Event { id, time, process }
    }
}

/// Ordering: smallest `(time, id)` first.
///
/// `BinaryHeap` is a max-heap, so the natural ordering is reversed here.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
