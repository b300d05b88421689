//! Fixed-size collection of memories owned by one topology node.

use std::ops::{Index, IndexMut};

use tracing::{debug, warn};

use crate::config::{check_unit, MemoryConfig};
use crate::error::{QnetError, QnetResult};
use crate::eventlog::hash_combine;
use crate::id::{ArrayId, MemoryKey, NodeId};
use crate::timeline::SimulationContext;

use super::memory::Memory;
use super::observer::{NodeLookup, Observer};

/// A parameter that can be updated on every memory of an array at once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemoryParam {
    Fidelity(f64),
    Efficiency(f64),
}

/// Owns `N` memories, indexed `0..N`, and acts as their default parent
/// observer. Expirations it receives are forwarded unchanged to the
/// node bound with [`set_node`](MemoryArray::set_node).
#[derive(Debug, Clone)]
pub struct MemoryArray {
    name: String,
    id: ArrayId,
    memories: Vec<Memory>,
    node: Option<NodeId>,
}

impl MemoryArray {
    pub fn new(
        name: impl Into<String>,
        id: ArrayId,
        num_memories: usize,
        config: MemoryConfig,
    ) -> QnetResult<Self> {
        let name = name.into();
        if num_memories == 0 {
            return Err(QnetError::Configuration(format!(
                "memory array {} needs at least one memory",
                name
            )));
        }

        let mut memories = Vec::with_capacity(num_memories);
        for index in 0..num_memories {
            let mut memory = Memory::new(
                format!("{}[{}]", name, index),
                MemoryKey::new(id, index),
                config,
            )?;
            memory.attach(Observer::Array(id));
            memories.push(memory);
        }

        Ok(MemoryArray {
            name,
            id,
            memories,
            node: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> ArrayId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    /// Always `false`: arrays hold at least one memory.
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    pub fn get(&self, index: usize) -> QnetResult<&Memory> {
        let len = self.memories.len();
        self.memories
            .get(index)
            .ok_or(QnetError::IndexOutOfRange { index, len })
    }

    pub fn get_mut(&mut self, index: usize) -> QnetResult<&mut Memory> {
        let len = self.memories.len();
        self.memories
            .get_mut(index)
            .ok_or(QnetError::IndexOutOfRange { index, len })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Memory> {
        self.memories.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Memory> {
        self.memories.iter_mut()
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Bind the array to its node. The node also becomes the owner
    /// (photon destination) of every memory in the array.
    pub fn set_node(&mut self, node: NodeId) {
        self.node = Some(node);
        for memory in &mut self.memories {
            memory.set_owner(Some(node));
        }
    }

    /// Apply a parameter to every memory. Nothing changes if the value
    /// is out of range.
    pub fn update_memory_params(&mut self, param: MemoryParam) -> QnetResult<()> {
        match param {
            MemoryParam::Fidelity(v) => {
                check_unit("fidelity", v)?;
                for memory in &mut self.memories {
                    memory.set_fidelity(v)?;
                }
            }
            MemoryParam::Efficiency(v) => {
                check_unit("efficiency", v)?;
                for memory in &mut self.memories {
                    memory.set_efficiency(v)?;
                }
            }
        }
        Ok(())
    }

    /// Parent-observer hook: forward an expired child to the bound node.
    ///
    /// An unbound array drops the notification.
    pub fn memory_expire(
        &self,
        ctx: &mut SimulationContext,
        memory: &Memory,
        nodes: &mut dyn NodeLookup,
    ) -> QnetResult<()> {
        let Some(node_id) = self.node else {
            warn!(array = %self.id, memory = %memory.key(), "expiration dropped: array not bound to a node");
            return Ok(());
        };
        let node = nodes.node_mut(node_id).ok_or(QnetError::UnknownNode(node_id))?;
        debug!(array = %self.id, memory = %memory.key(), node = %node_id, "forwarding expiration");
        node.memory_expire(ctx, memory);
        Ok(())
    }

    pub fn state_hash(&self) -> u64 {
        self.memories
            .iter()
            .fold(self.id.raw(), |h, m| hash_combine(h, m.state_hash()))
    }
}

impl Index<usize> for MemoryArray {
    type Output = Memory;

    fn index(&self, index: usize) -> &Memory {
        &self.memories[index]
    }
}

impl IndexMut<usize> for MemoryArray {
    fn index_mut(&mut self, index: usize) -> &mut Memory {
        &mut self.memories[index]
    }
}

impl<'a> IntoIterator for &'a MemoryArray {
    type Item = &'a Memory;
    type IntoIter = std::slice::Iter<'a, Memory>;

    fn into_iter(self) -> Self::IntoIter {
        self.memories.iter()
    }
}
