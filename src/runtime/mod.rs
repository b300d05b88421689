//! `QuantumRuntime`: owns arrays, observers and nodes, and dispatches
//! memory processes and timers to them.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`trace`] | [`TraceEntry`] struct |
//! | [`builtin`] | [`RecordingNode`], [`RecordingObserver`] |
//!
//! Memories only ever hold handles ([`MemoryKey`], [`Observer`],
//! [`NodeId`]). The runtime is the single owner that resolves them, so a
//! memory, its array and its node never reference each other directly.

pub mod builtin;
pub mod trace;

pub use builtin::{RecordingNode, RecordingObserver};
pub use trace::TraceEntry;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::components::{
    ExciteOutcome, Memory, MemoryArray, MemoryObserver, Observer, QuantumNode,
};
use crate::config::{MemoryConfig, SimConfig};
use crate::error::{QnetError, QnetResult};
use crate::event::{Event, Process};
use crate::eventlog::hash_combine;
use crate::id::{ArrayId, MemoryKey, NodeId, ObserverId};
use crate::timeline::{EventHandler, SimulationContext};

/// Resolve a key against the arrays without borrowing the rest of the
/// runtime.
fn lookup(arrays: &BTreeMap<ArrayId, MemoryArray>, key: MemoryKey) -> QnetResult<&Memory> {
    arrays
        .get(&key.array)
        .ok_or(QnetError::UnknownMemory(key))?
        .get(key.index)
}

fn lookup_mut(
    arrays: &mut BTreeMap<ArrayId, MemoryArray>,
    key: MemoryKey,
) -> QnetResult<&mut Memory> {
    arrays
        .get_mut(&key.array)
        .ok_or(QnetError::UnknownMemory(key))?
        .get_mut(key.index)
}

/// Owns every simulated object and implements [`EventHandler`] so it can
/// be passed directly to [`Timeline::run`](crate::timeline::Timeline::run).
///
/// `Noop` and `Log` processes are ignored. A process whose target cannot
/// be resolved is dropped with a warning; the run continues.
pub struct QuantumRuntime {
    pub(crate) arrays: BTreeMap<ArrayId, MemoryArray>,
    pub(crate) observers: BTreeMap<ObserverId, Box<dyn MemoryObserver>>,
    pub(crate) nodes: BTreeMap<NodeId, Box<dyn QuantumNode>>,
    next_array: u64,
    next_observer: u64,
    /// Append-only trace of every delivered expiration.
    pub trace: Vec<TraceEntry>,
}

impl QuantumRuntime {
    pub fn new() -> Self {
        QuantumRuntime {
            arrays: BTreeMap::new(),
            observers: BTreeMap::new(),
            nodes: BTreeMap::new(),
            next_array: 0,
            next_observer: 0,
            trace: Vec::new(),
        }
    }

    /// Build a runtime holding one array per entry of `config.arrays`,
    /// with ids assigned in order from `A0`.
    pub fn from_config(config: &SimConfig) -> QnetResult<Self> {
        config.validate()?;
        let mut rt = Self::new();
        for array in &config.arrays {
            rt.build_array(&array.name, array.num_memories, array.memory)?;
        }
        Ok(rt)
    }

    // ── Registration ──────────────────────────────────────────────

    /// Register a pre-built array. Its id must not be taken.
    pub fn add_array(&mut self, array: MemoryArray) -> QnetResult<ArrayId> {
        let id = array.id();
        if self.arrays.contains_key(&id) {
            return Err(QnetError::Configuration(format!(
                "array {} is already registered",
                id
            )));
        }
        self.next_array = self.next_array.max(id.raw() + 1);
        self.arrays.insert(id, array);
        Ok(id)
    }

    /// Build and register an array under the next free id.
    pub fn build_array(
        &mut self,
        name: &str,
        num_memories: usize,
        config: MemoryConfig,
    ) -> QnetResult<ArrayId> {
        let id = ArrayId::new(self.next_array);
        let array = MemoryArray::new(name, id, num_memories, config)?;
        debug!(array = %id, name, num_memories, "array built");
        self.add_array(array)
    }

    /// Register a node, replacing any node with the same id.
    pub fn register_node(&mut self, id: NodeId, node: Box<dyn QuantumNode>) {
        self.nodes.insert(id, node);
    }

    /// Bind an array to a registered node: the node receives forwarded
    /// expirations and every photon the array's memories emit.
    pub fn bind_array(&mut self, array: ArrayId, node: NodeId) -> QnetResult<()> {
        if !self.nodes.contains_key(&node) {
            return Err(QnetError::UnknownNode(node));
        }
        let target = self.array_mut(array)?;
        target.set_node(node);
        debug!(array = %array, node = %node, "array bound");
        Ok(())
    }

    pub fn register_observer(&mut self, mut observer: Box<dyn MemoryObserver>) -> ObserverId {
        let id = ObserverId::new(self.next_observer);
        self.next_observer += 1;
        observer.registered(id);
        self.observers.insert(id, observer);
        id
    }

    /// Unregister an observer and detach it from every memory.
    pub fn remove_observer(&mut self, id: ObserverId) -> QnetResult<Box<dyn MemoryObserver>> {
        let observer = self
            .observers
            .remove(&id)
            .ok_or(QnetError::UnknownObserver(id))?;
        for array in self.arrays.values_mut() {
            for memory in array.iter_mut() {
                memory.detach(Observer::Protocol(id));
                memory.detach(Observer::Parent(id));
            }
        }
        Ok(observer)
    }

    /// Attach a registered observer to a memory, tagged with the role
    /// the observer reports.
    pub fn attach(&mut self, key: MemoryKey, id: ObserverId) -> QnetResult<()> {
        let role = self
            .observers
            .get(&id)
            .ok_or(QnetError::UnknownObserver(id))?
            .role();
        lookup_mut(&mut self.arrays, key)?.attach(Observer::from_role(role, id));
        Ok(())
    }

    pub fn detach(&mut self, key: MemoryKey, id: ObserverId) -> QnetResult<()> {
        let memory = lookup_mut(&mut self.arrays, key)?;
        memory.detach(Observer::Protocol(id));
        memory.detach(Observer::Parent(id));
        Ok(())
    }

    // ── Access ────────────────────────────────────────────────────

    pub fn array(&self, id: ArrayId) -> QnetResult<&MemoryArray> {
        self.arrays
            .get(&id)
            .ok_or_else(|| QnetError::Configuration(format!("array {} not registered", id)))
    }

    pub fn array_mut(&mut self, id: ArrayId) -> QnetResult<&mut MemoryArray> {
        self.arrays
            .get_mut(&id)
            .ok_or_else(|| QnetError::Configuration(format!("array {} not registered", id)))
    }

    pub fn memory(&self, key: MemoryKey) -> QnetResult<&Memory> {
        lookup(&self.arrays, key)
    }

    pub fn memory_mut(&mut self, key: MemoryKey) -> QnetResult<&mut Memory> {
        lookup_mut(&mut self.arrays, key)
    }

    /// Downcast a node reference for inspection.
    ///
    /// Returns `None` if the node is not registered or has a wrong type.
    pub fn node<T: QuantumNode + 'static>(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(&id)?.as_any().downcast_ref::<T>()
    }

    pub fn node_mut<T: QuantumNode + 'static>(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes.get_mut(&id)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn observer<T: MemoryObserver + 'static>(&self, id: ObserverId) -> Option<&T> {
        self.observers.get(&id)?.as_any().downcast_ref::<T>()
    }

    // ── Operations ────────────────────────────────────────────────

    /// Expire a memory and deliver the notification to its selected
    /// observer. Returns the observer that was notified.
    pub fn expire_memory(
        &mut self,
        ctx: &mut SimulationContext,
        key: MemoryKey,
    ) -> QnetResult<Option<Observer>> {
        let target = lookup_mut(&mut self.arrays, key)?.expire(ctx);
        if let Some(observer) = target {
            self.notify(ctx, key, observer)?;
        }
        Ok(target)
    }

    fn notify(
        &mut self,
        ctx: &mut SimulationContext,
        key: MemoryKey,
        observer: Observer,
    ) -> QnetResult<()> {
        let memory = lookup(&self.arrays, key)?;
        match observer {
            Observer::Protocol(id) | Observer::Parent(id) => {
                let target = self
                    .observers
                    .get_mut(&id)
                    .ok_or(QnetError::UnknownObserver(id))?;
                target.memory_expire(ctx, memory);
            }
            Observer::Array(id) => {
                let array = self.arrays.get(&id).ok_or(QnetError::UnknownMemory(key))?;
                array.memory_expire(ctx, memory, &mut self.nodes)?;
            }
        }

        self.trace.push(TraceEntry {
            time: ctx.now(),
            event_id: ctx.current_event(),
            memory: key,
            observer,
        });
        Ok(())
    }

    /// Excite a memory towards its owning node.
    pub fn excite_memory(
        &mut self,
        ctx: &mut SimulationContext,
        key: MemoryKey,
    ) -> QnetResult<ExciteOutcome> {
        let memory = lookup(&self.arrays, key)?;
        let owner = memory.owner().ok_or_else(|| {
            QnetError::InvalidState(format!("memory {} has no owning node", key))
        })?;
        let node = self
            .nodes
            .get_mut(&owner)
            .ok_or(QnetError::UnknownNode(owner))?;
        Ok(memory.excite(ctx, &mut **node))
    }

    fn dispatch(&mut self, ctx: &mut SimulationContext, process: &Process) -> QnetResult<()> {
        match process {
            Process::MemoryExpire { memory } => {
                self.expire_memory(ctx, *memory)?;
            }
            Process::MemoryExcite { memory } => {
                self.excite_memory(ctx, *memory)?;
            }
            Process::MemoryFlip { memory } => self.memory_mut(*memory)?.flip_state(),
            Process::MemorySetPlus { memory } => self.memory_mut(*memory)?.set_plus(),
            Process::MemoryArm { memory } => {
                self.memory_mut(*memory)?.schedule_expiration(ctx)?;
            }
            Process::ObserverTimer { observer, timer_id } => {
                let target = self
                    .observers
                    .get_mut(observer)
                    .ok_or(QnetError::UnknownObserver(*observer))?;
                target.on_timer(ctx, *timer_id);
            }
            Process::NodeTimer { node, timer_id } => {
                let target = self
                    .nodes
                    .get_mut(node)
                    .ok_or(QnetError::UnknownNode(*node))?;
                target.on_timer(ctx, *timer_id);
            }
            Process::Noop | Process::Log(_) => {}
        }
        Ok(())
    }
}

impl Default for QuantumRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for QuantumRuntime {
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event) {
        if let Err(e) = self.dispatch(ctx, &event.process) {
            warn!(event = %event.id, process = %event.process, error = %e, "process failed");
        }
    }

    fn compute_state_hash(&self) -> u64 {
        let mut h: u64 = 0;
        for (id, array) in &self.arrays {
            h = hash_combine(h, id.raw());
            h = hash_combine(h, array.state_hash());
        }
        hash_combine(h, self.trace.len() as u64)
    }
}
