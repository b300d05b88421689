//! Event log for deterministic replay verification.
//!
//! Records every executed event into an append-only log and takes
//! periodic checkpoints of the handler's state hash. Two runs with the
//! same seed and the same initial schedule must produce identical logs.

use tracing::warn;

use crate::error::{QnetError, QnetResult};
use crate::event::{Event, Process};
use crate::id::MemoryKey;
use crate::time::VirtualTime;

// ── Hash utility ──────────────────────────────────────────────────────

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// Hash a byte slice deterministically (FNV-1a).
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

fn key_hash(key: &MemoryKey) -> u64 {
    hash_combine(key.array.raw(), key.index as u64)
}

fn process_hash(process: &Process) -> u64 {
    match process {
        Process::Noop => 0,
        Process::Log(msg) => hash_combine(1, hash_bytes(msg.as_bytes())),
        Process::MemoryExpire { memory } => hash_combine(2, key_hash(memory)),
        Process::MemoryExcite { memory } => hash_combine(3, key_hash(memory)),
        Process::MemoryFlip { memory } => hash_combine(4, key_hash(memory)),
        Process::MemorySetPlus { memory } => hash_combine(5, key_hash(memory)),
        Process::MemoryArm { memory } => hash_combine(6, key_hash(memory)),
        Process::ObserverTimer { observer, timer_id } => {
            hash_combine(hash_combine(7, observer.raw()), *timer_id)
        }
        Process::NodeTimer { node, timer_id } => hash_combine(hash_combine(8, node.raw()), *timer_id),
    }
}

// ── Checkpoint ────────────────────────────────────────────────────────

/// A snapshot of the simulation state at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Number of events executed when this checkpoint was taken.
    pub event_index: u64,
    pub time: VirtualTime,
    /// Handler state hash.
    pub state_hash: u64,
}

// ── Event Log ─────────────────────────────────────────────────────────

/// Append-only log of executed events with optional checkpointing.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
    checkpoints: Vec<Checkpoint>,
    checkpoint_interval: Option<u64>,
}

impl EventLog {
    /// Create an empty event log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an event log with automatic checkpointing every `n` events.
    pub fn with_checkpoint_interval(n: u64) -> Self {
        EventLog {
            checkpoint_interval: Some(n),
            ..Self::default()
        }
    }

    pub fn record(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn add_checkpoint(&mut self, event_index: u64, time: VirtualTime, state_hash: u64) {
        self.checkpoints.push(Checkpoint {
            event_index,
            time,
            state_hash,
        });
    }

    /// Check if a checkpoint should be taken at this event count.
    pub fn should_checkpoint(&self, events_processed: u64) -> bool {
        match self.checkpoint_interval {
            Some(n) if n > 0 => events_processed % n == 0,
            _ => false,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Compute a deterministic hash of the entire event log.
    pub fn log_hash(&self) -> u64 {
        let mut h: u64 = 0;
        for event in &self.events {
            h = hash_combine(h, event.id.raw());
            h = hash_combine(h, event.time.ticks());
            h = hash_combine(h, process_hash(&event.process));
        }
        for cp in &self.checkpoints {
            h = hash_combine(h, cp.state_hash);
        }
        h
    }

    /// Position of the first event where `other` departs from this log,
    /// or `None` if both hold the same events.
    pub fn first_divergence(&self, other: &EventLog) -> Option<usize> {
        let common = self.events.len().min(other.events.len());
        self.events
            .iter()
            .zip(&other.events)
            .position(|(a, b)| a != b)
            .or((self.events.len() != other.events.len()).then_some(common))
    }

    /// Check that `other` is a faithful replay of this log: same events
    /// in the same order and the same checkpoint hashes.
    pub fn verify(&self, other: &EventLog) -> QnetResult<()> {
        let diverged = self.first_divergence(other);
        if diverged.is_none() && self.checkpoints == other.checkpoints {
            return Ok(());
        }
        warn!(event_index = ?diverged, "replay diverged");
        Err(QnetError::LogCorrupted {
            expected_hash: self.log_hash(),
            actual_hash: other.log_hash(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventId;
    use crate::id::ArrayId;

    fn sample_log() -> EventLog {
        let key = MemoryKey::new(ArrayId::new(0), 1);
        let mut log = EventLog::with_checkpoint_interval(2);
        log.record(Event::new(EventId::new(0), VirtualTime::new(5), Process::Noop));
        log.record(Event::new(
            EventId::new(1),
            VirtualTime::new(9),
            Process::MemoryExpire { memory: key },
        ));
        log.add_checkpoint(2, VirtualTime::new(9), 0xfeed);
        log
    }

    #[test]
    fn test_should_checkpoint() {
        let log = EventLog::with_checkpoint_interval(3);
        assert!(!log.should_checkpoint(1));
        assert!(log.should_checkpoint(3));
        assert!(!EventLog::new().should_checkpoint(3));
    }

    #[test]
    fn test_identical_logs_verify() {
        let a = sample_log();
        let b = sample_log();
        assert_eq!(a.log_hash(), b.log_hash());
        assert!(a.verify(&b).is_ok());
    }

    #[test]
    fn test_diverging_process_is_detected() {
        let a = sample_log();
        let mut b = EventLog::new();
        b.record(Event::new(EventId::new(0), VirtualTime::new(5), Process::Noop));
        b.record(Event::new(
            EventId::new(1),
            VirtualTime::new(9),
            Process::MemoryFlip { memory: MemoryKey::new(ArrayId::new(0), 1) },
        ));
        b.add_checkpoint(2, VirtualTime::new(9), 0xfeed);

        assert_eq!(a.first_divergence(&b), Some(1));
        assert!(matches!(a.verify(&b), Err(QnetError::LogCorrupted { .. })));
    }

    #[test]
    fn test_truncated_replay_is_detected() {
        let a = sample_log();
        let mut b = EventLog::with_checkpoint_interval(2);
        b.record(Event::new(EventId::new(0), VirtualTime::new(5), Process::Noop));
        assert_eq!(a.first_divergence(&b), Some(1));
        assert!(a.verify(&b).is_err());
    }

    #[test]
    fn test_checkpoint_mismatch_is_detected() {
        let a = sample_log();
        let mut b = sample_log();
        b.add_checkpoint(4, VirtualTime::new(9), 0xbeef);
        assert_eq!(a.first_divergence(&b), None);
        assert!(a.verify(&b).is_err());
    }

    #[test]
    fn test_hash_bytes_is_stable() {
        assert_eq!(hash_bytes(b""), 0xcbf29ce484222325);
        assert_ne!(hash_bytes(b"a"), hash_bytes(b"b"));
    }
}
