//! Hardware components: quantum memories and their collaborators.
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`qstate`] | [`QuantumState`] two-level amplitudes |
//! | [`photon`] | [`Photon`] |
//! | [`observer`] | [`Observer`] handles, collaborator traits |
//! | [`memory`] | [`Memory`] lifecycle |
//! | [`memory_array`] | [`MemoryArray`] |

pub mod memory;
pub mod memory_array;
pub mod observer;
pub mod photon;
pub mod qstate;

pub use memory::{CoherenceStatus, EntangledMemory, ExciteOutcome, Memory};
pub use memory_array::{MemoryArray, MemoryParam};
pub use observer::{
    select_observer, MemoryObserver, NodeLookup, Observer, ObserverRole, PhotonSink, QuantumNode,
};
pub use photon::Photon;
pub use qstate::QuantumState;
