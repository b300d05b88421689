//! Collaborator contracts around a memory.
//!
//! | Trait | Implemented by | Invoked on |
//! |---|---|---|
//! | [`MemoryObserver`] | protocols, resource managers | expiration, own timers |
//! | [`PhotonSink`] | anything receiving photons | excitation |
//! | [`QuantumNode`] | topology nodes owning arrays | forwarded expiration, excitation, own timers |
//!
//! Memories never hold these objects. They hold [`Observer`] handles,
//! and whoever owns the objects resolves the handle.

use std::collections::BTreeMap;

use crate::id::{ArrayId, NodeId, ObserverId};
use crate::timeline::SimulationContext;

use super::memory::Memory;
use super::photon::Photon;

// ── Observer handle ───────────────────────────────────────────────────

/// Rank of an observer when a memory expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ObserverRole {
    /// An active entanglement-management protocol. Always wins.
    Protocol,
    /// A resource manager, array or node.
    Parent,
}

/// Non-owning, tagged reference to something watching a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Observer {
    Protocol(ObserverId),
    Parent(ObserverId),
    /// The memory array holding the memory.
    Array(ArrayId),
}

impl Observer {
    /// Build a handle for a registered observer with the given role.
    pub fn from_role(role: ObserverRole, id: ObserverId) -> Self {
        match role {
            ObserverRole::Protocol => Observer::Protocol(id),
            ObserverRole::Parent => Observer::Parent(id),
        }
    }

    pub fn role(&self) -> ObserverRole {
        match self {
            Observer::Protocol(_) => ObserverRole::Protocol,
            Observer::Parent(_) | Observer::Array(_) => ObserverRole::Parent,
        }
    }
}

impl std::fmt::Display for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Observer::Protocol(id) => write!(f, "Protocol({})", id),
            Observer::Parent(id) => write!(f, "Parent({})", id),
            Observer::Array(id) => write!(f, "Array({})", id),
        }
    }
}

/// Pick the single observer to notify: the first-attached protocol if
/// any, otherwise the first-attached parent.
pub fn select_observer(observers: &[Observer]) -> Option<Observer> {
    observers
        .iter()
        .enumerate()
        .min_by_key(|(pos, o)| (o.role(), *pos))
        .map(|(_, o)| *o)
}

// ── Traits ────────────────────────────────────────────────────────────

/// Something notified when a watched memory expires.
pub trait MemoryObserver {
    /// Precedence tag used when this observer is attached.
    fn role(&self) -> ObserverRole;

    /// Called once with the id assigned at registration, so the observer
    /// can address timers to itself.
    fn registered(&mut self, _id: ObserverId) {}

    /// Expiration hook. `memory` has already been reset.
    fn memory_expire(&mut self, ctx: &mut SimulationContext, memory: &Memory);

    /// Fired by `Process::ObserverTimer` addressed to this observer.
    fn on_timer(&mut self, _ctx: &mut SimulationContext, _timer_id: u64) {}

    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Destination of emitted photons.
pub trait PhotonSink {
    fn accept_photon(&mut self, ctx: &mut SimulationContext, photon: Photon);
}

/// Collects photons into a vector.
impl PhotonSink for Vec<Photon> {
    fn accept_photon(&mut self, _ctx: &mut SimulationContext, photon: Photon) {
        self.push(photon);
    }
}

/// The node-facing contract: a node owns memory arrays, receives the
/// photons they emit and learns about expirations they forward.
pub trait QuantumNode: PhotonSink {
    fn memory_expire(&mut self, ctx: &mut SimulationContext, memory: &Memory);

    /// Fired by `Process::NodeTimer` addressed to this node.
    fn on_timer(&mut self, _ctx: &mut SimulationContext, _timer_id: u64) {}

    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Resolves node handles to nodes.
pub trait NodeLookup {
    fn node_mut(&mut self, id: NodeId) -> Option<&mut dyn QuantumNode>;
}

impl NodeLookup for BTreeMap<NodeId, Box<dyn QuantumNode>> {
    fn node_mut(&mut self, id: NodeId) -> Option<&mut dyn QuantumNode> {
        self.get_mut(&id)
            .map(|node| node.as_mut() as &mut dyn QuantumNode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_beats_parent_regardless_of_order() {
        let parent = Observer::Parent(ObserverId::new(1));
        let array = Observer::Array(ArrayId::new(0));
        let protocol = Observer::Protocol(ObserverId::new(2));

        assert_eq!(select_observer(&[array, parent, protocol]), Some(protocol));
        assert_eq!(select_observer(&[protocol, array]), Some(protocol));
    }

    #[test]
    fn test_first_parent_wins_without_protocol() {
        let parent = Observer::Parent(ObserverId::new(1));
        let array = Observer::Array(ArrayId::new(0));
        assert_eq!(select_observer(&[array, parent]), Some(array));
        assert_eq!(select_observer(&[parent, array]), Some(parent));
    }

    #[test]
    fn test_no_observers() {
        assert_eq!(select_observer(&[]), None);
    }

    #[test]
    fn test_from_role() {
        let id = ObserverId::new(4);
        assert_eq!(Observer::from_role(ObserverRole::Protocol, id).role(), ObserverRole::Protocol);
        assert_eq!(Observer::from_role(ObserverRole::Parent, id), Observer::Parent(id));
    }
}
