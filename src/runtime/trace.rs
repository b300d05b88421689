//! TraceEntry: one delivered expiration notification.

use crate::components::Observer;
use crate::event::EventId;
use crate::id::MemoryKey;
use crate::time::VirtualTime;

/// A record of an expiration notification delivered by the runtime.
///
/// Appended on every delivery; useful for test assertions and
/// post-mortem debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceEntry {
    pub time: VirtualTime,
    /// Event being executed, `None` for driver calls outside the loop.
    pub event_id: Option<EventId>,
    pub memory: MemoryKey,
    pub observer: Observer,
}

impl std::fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.event_id {
            Some(id) => write!(f, "[{} {}] ", self.time, id)?,
            None => write!(f, "[{} driver] ", self.time)?,
        }
        write!(f, "{} expired -> {}", self.memory, self.observer)
    }
}
