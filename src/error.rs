//! Structured error types for qnet.
//!
//! All fallible public APIs return `QnetResult<T>`. Callers can tell
//! configuration mistakes (bad memory parameters) apart from
//! programming errors (scheduling into the past, out-of-range slots)
//! without relying on panics or stringly-typed errors.

use thiserror::Error;

use crate::id::{MemoryKey, NodeId, ObserverId};

/// The top-level error type for the simulation kernel and memory model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QnetError {
    // ── Configuration errors ──────────────────────────────

    /// A component was constructed or updated with out-of-range parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A quantum state was not a normalized two-level amplitude pair.
    #[error("invalid quantum state: {0}")]
    InvalidState(String),

    // ── Scheduling errors ─────────────────────────────────

    /// Attempted to schedule an event in the past.
    #[error("cannot schedule event at T={requested} when current time is T={current}")]
    Causality { requested: u64, current: u64 },

    // ── Lookup errors ─────────────────────────────────────

    /// Indexed access past the end of a memory array.
    #[error("memory index {index} out of range for array of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A memory key does not resolve to a registered memory.
    #[error("memory {0} not found")]
    UnknownMemory(MemoryKey),

    /// An observer ID was referenced but is not registered.
    #[error("observer {0} not found")]
    UnknownObserver(ObserverId),

    /// A node ID was referenced but is not registered.
    #[error("node {0} not found")]
    UnknownNode(NodeId),

    // ── Log / replay errors ───────────────────────────────

    /// Event logging has not been enabled on this timeline.
    #[error("event logging is not enabled")]
    LogNotEnabled,

    /// Two event logs that should be identical diverged.
    #[error("event log corrupted: expected hash {expected_hash:#018x}, got {actual_hash:#018x}")]
    LogCorrupted { expected_hash: u64, actual_hash: u64 },

    /// A configuration document could not be parsed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(feature = "serialize")]
impl From<serde_json::Error> for QnetError {
    fn from(e: serde_json::Error) -> Self {
        QnetError::Serialization(e.to_string())
    }
}

/// Convenience alias for `Result<T, QnetError>`.
pub type QnetResult<T> = Result<T, QnetError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ArrayId;

    #[test]
    fn test_error_display_causality() {
        let e = QnetError::Causality { requested: 3, current: 10 };
        assert!(e.to_string().contains("T=3"));
        assert!(e.to_string().contains("T=10"));
    }

    #[test]
    fn test_error_display_index() {
        let e = QnetError::IndexOutOfRange { index: 12, len: 10 };
        assert_eq!(e.to_string(), "memory index 12 out of range for array of 10");
    }

    #[test]
    fn test_error_display_unknown_memory() {
        let e = QnetError::UnknownMemory(MemoryKey::new(ArrayId::new(2), 5));
        assert_eq!(e.to_string(), "memory A2[5] not found");
    }

    #[test]
    fn test_error_display_log_corrupted() {
        let e = QnetError::LogCorrupted { expected_hash: 0xABCD, actual_hash: 0x1234 };
        assert!(e.to_string().contains("corrupted"));
    }

    #[test]
    fn test_error_is_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(QnetError::LogNotEnabled);
        assert!(!e.to_string().is_empty());
    }
}
