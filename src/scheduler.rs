//! Deterministic event scheduler with soft cancellation.
//!
//! Uses a `BinaryHeap` with reversed `Ord` on `Event` as a min-heap
//! keyed by `(time, id)`. Cancelling an event only records its id;
//! the event stays in the heap until it reaches the front, where it is
//! discarded without being returned.

use std::collections::{BinaryHeap, HashSet};

use tracing::trace;

use crate::event::{Event, EventId, EventIdGen, Process};
use crate::time::VirtualTime;

/// A queued event as seen from outside the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    pub event: Event,
    pub is_valid: bool,
}

/// The core deterministic scheduler.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    /// Min-heap (via reversed Ord on Event).
    queue: BinaryHeap<Event>,

    /// Ids currently in `queue`, valid or not.
    pending: HashSet<EventId>,

    /// Subset of `pending` that has been invalidated.
    cancelled: HashSet<EventId>,

    id_gen: EventIdGen,
}

impl Scheduler {
    /// Create a new, empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a process at the given virtual time.
    ///
    /// Causality is checked by the timeline, which knows the current time.
    pub fn schedule(&mut self, at: VirtualTime, process: Process) -> EventId {
        let id = self.id_gen.next_id();
        trace!(event = %id, time = %at, process = %process, "scheduled");
        self.pending.insert(id);
        self.queue.push(Event::new(id, at, process));
        id
    }

    /// Mark a pending event invalid. O(1); the heap is untouched.
    ///
    /// Returns `false` if the id is not pending (already consumed, never
    /// scheduled, or already cancelled).
    pub fn invalidate(&mut self, id: EventId) -> bool {
        if self.pending.contains(&id) && self.cancelled.insert(id) {
            trace!(event = %id, "invalidated");
            true
        } else {
            false
        }
    }

    /// Whether `id` is queued and has not been invalidated.
    pub fn is_valid(&self, id: EventId) -> bool {
        self.pending.contains(&id) && !self.cancelled.contains(&id)
    }

    /// Whether `id` is still in the queue (valid or not).
    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains(&id)
    }

    /// Pop the front event, valid or not, with its validity.
    pub fn pop_any(&mut self) -> Option<PendingEvent> {
        let event = self.queue.pop()?;
        self.pending.remove(&event.id);
        let is_valid = !self.cancelled.remove(&event.id);
        Some(PendingEvent { event, is_valid })
    }

    /// Pop the next valid event, discarding invalidated ones on the way.
    pub fn pop_next(&mut self) -> Option<Event> {
        while let Some(p) = self.pop_any() {
            if p.is_valid {
                return Some(p.event);
            }
        }
        None
    }

    /// Peek at the front event (valid or not) without removing it.
    pub fn peek_next(&self) -> Option<&Event> {
        self.queue.peek()
    }

    /// Returns `true` if nothing at all is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of queued events, including invalidated ones.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Number of queued events that will actually execute.
    pub fn live_len(&self) -> usize {
        self.queue.len() - self.cancelled.len()
    }

    /// Returns the next event ID that will be assigned.
    pub fn next_event_id(&self) -> EventId {
        self.id_gen.peek()
    }

    /// Snapshot of the queue in dispatch order, invalidated events included.
    pub fn pending(&self) -> Vec<PendingEvent> {
        let mut events: Vec<Event> = self.queue.iter().cloned().collect();
        // Reversed Ord: descending sort yields dispatch order.
        events.sort_by(|a, b| b.cmp(a));
        events
            .into_iter()
            .map(|event| {
                let is_valid = !self.cancelled.contains(&event.id);
                PendingEvent { event, is_valid }
            })
            .collect()
    }
}
