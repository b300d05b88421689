//! # qnet: Discrete-Event Kernel for Quantum Memories
//!
//! A deterministic simulation kernel and a quantum-memory model built on
//! top of it. One virtual clock, one event queue, one seeded random
//! source; every effect happens inside a process body dispatched in
//! `(time, id)` order.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────┐
//! │        QuantumRuntime          │ ← resolves handles, routes notifications
//! │  ┌──────────────┐ ┌─────────┐ │
//! │  │ MemoryArray  │ │  Nodes  │ │ ← arrays forward expirations to nodes
//! │  │  └ Memory    │ │Observers│ │
//! │  └──────────────┘ └─────────┘ │
//! └───────────────┬───────────────┘
//!                 │ EventHandler
//! ┌───────────────▼───────────────┐
//! │           Timeline             │ ← clock, stop time, run loop, RNG
//! │  ┌────────────┐ ┌───────────┐ │
//! │  │ Scheduler  │ │ EventLog  │ │ ← min-heap with soft cancellation
//! │  └────────────┘ └───────────┘ │
//! └───────────────────────────────┘
//! ```

pub mod components;
pub mod config;
pub mod error;
pub mod event;
pub mod eventlog;
pub mod id;
pub mod runtime;
pub mod scheduler;
pub mod time;
pub mod timeline;

// Re-exports for convenience.
pub use components::{
    CoherenceStatus, EntangledMemory, ExciteOutcome, Memory, MemoryArray, MemoryObserver,
    MemoryParam, Observer, ObserverRole, Photon, PhotonSink, QuantumNode, QuantumState,
};
pub use config::{ArrayConfig, MemoryConfig, SimConfig, TimelineConfig, NO_DECAY};
pub use error::{QnetError, QnetResult};
pub use event::{Event, EventId, Process};
pub use eventlog::EventLog;
pub use id::{ArrayId, MemoryKey, NodeId, ObserverId};
pub use runtime::{QuantumRuntime, RecordingNode, RecordingObserver, TraceEntry};
pub use scheduler::Scheduler;
pub use time::VirtualTime;
pub use timeline::{EventHandler, SimRng, SimulationContext, Timeline};
