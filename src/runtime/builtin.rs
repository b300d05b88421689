//! Built-in collaborators: a photon-collecting node and a recording observer.

use tracing::warn;

use crate::components::{Memory, MemoryObserver, ObserverRole, Photon, PhotonSink, QuantumNode};
use crate::event::Process;
use crate::id::{MemoryKey, NodeId, ObserverId};
use crate::time::VirtualTime;
use crate::timeline::SimulationContext;

/// A node that records every photon and forwarded expiration.
///
/// Has no behavior of its own, which makes it a convenient sink for
/// tests checking emission statistics and notification routing.
#[derive(Debug, Clone)]
pub struct RecordingNode {
    pub id: NodeId,
    pub photons: Vec<Photon>,
    /// Forwarded expirations in delivery order.
    pub expired: Vec<(VirtualTime, MemoryKey)>,
    /// Fired timers as `(time, timer_id)`.
    pub timers: Vec<(VirtualTime, u64)>,
}

impl RecordingNode {
    pub fn new(id: NodeId) -> Self {
        RecordingNode {
            id,
            photons: Vec::new(),
            expired: Vec::new(),
            timers: Vec::new(),
        }
    }

    pub fn null_count(&self) -> usize {
        self.photons.iter().filter(|p| p.is_null).count()
    }
}

impl PhotonSink for RecordingNode {
    fn accept_photon(&mut self, _ctx: &mut SimulationContext, photon: Photon) {
        self.photons.push(photon);
    }
}

impl QuantumNode for RecordingNode {
    fn memory_expire(&mut self, ctx: &mut SimulationContext, memory: &Memory) {
        self.expired.push((ctx.now(), memory.key()));
    }

    fn on_timer(&mut self, ctx: &mut SimulationContext, timer_id: u64) {
        self.timers.push((ctx.now(), timer_id));
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// An observer that records expirations and fired timers.
///
/// It can re-arm the expired memory after a fixed delay, the way an
/// entanglement generation protocol retries, or set a timer on itself
/// and decide later.
#[derive(Debug, Clone)]
pub struct RecordingObserver {
    pub role: ObserverRole,
    pub expired: Vec<(VirtualTime, MemoryKey)>,
    /// Fired timers as `(time, timer_id)`.
    pub timers: Vec<(VirtualTime, u64)>,
    id: Option<ObserverId>,
    rearm_after: Option<u64>,
    timer_after: Option<u64>,
}

impl RecordingObserver {
    pub fn new(role: ObserverRole) -> Self {
        RecordingObserver {
            role,
            expired: Vec::new(),
            timers: Vec::new(),
            id: None,
            rearm_after: None,
            timer_after: None,
        }
    }

    /// Schedule `MemoryArm` on the expired memory `delay` ticks later.
    pub fn rearming(role: ObserverRole, delay: u64) -> Self {
        RecordingObserver {
            rearm_after: Some(delay),
            ..Self::new(role)
        }
    }

    /// Set a timer on itself `delay` ticks after each expiration. The
    /// timer id is the number of expirations seen so far.
    pub fn with_timer(role: ObserverRole, delay: u64) -> Self {
        RecordingObserver {
            timer_after: Some(delay),
            ..Self::new(role)
        }
    }

    pub fn id(&self) -> Option<ObserverId> {
        self.id
    }
}

impl MemoryObserver for RecordingObserver {
    fn role(&self) -> ObserverRole {
        self.role
    }

    fn registered(&mut self, id: ObserverId) {
        self.id = Some(id);
    }

    fn memory_expire(&mut self, ctx: &mut SimulationContext, memory: &Memory) {
        self.expired.push((ctx.now(), memory.key()));
        if let Some(delay) = self.rearm_after {
            let arm = Process::MemoryArm { memory: memory.key() };
            if let Err(e) = ctx.schedule_after(delay, arm) {
                warn!(memory = %memory.key(), error = %e, "re-arm failed");
            }
        }
        if let (Some(delay), Some(observer)) = (self.timer_after, self.id) {
            let timer = Process::ObserverTimer {
                observer,
                timer_id: self.expired.len() as u64,
            };
            if let Err(e) = ctx.schedule_after(delay, timer) {
                warn!(observer = %observer, error = %e, "timer not set");
            }
        }
    }

    fn on_timer(&mut self, ctx: &mut SimulationContext, timer_id: u64) {
        self.timers.push((ctx.now(), timer_id));
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
