//! Lightweight, ordered, copyable identifiers.
//!
//! Every cross-component reference in the simulation is one of these
//! handles rather than a pointer. The owner of the referenced object
//! (the runtime, a memory array, a test harness) resolves the handle at
//! dispatch time, so no component ever owns another through an edge.

/// Identifier of a topology node that owns memory arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(u64);

impl NodeId {
    /// Create a node ID from a raw integer.
    #[inline]
    pub fn new(id: u64) -> Self {
        NodeId(id)
    }

    /// Return the underlying integer.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Identifier of a memory array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrayId(u64);

impl ArrayId {
    #[inline]
    pub fn new(id: u64) -> Self {
        ArrayId(id)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ArrayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Address of a single memory: its array plus its stable slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryKey {
    pub array: ArrayId,
    pub index: usize,
}

impl MemoryKey {
    #[inline]
    pub fn new(array: ArrayId, index: usize) -> Self {
        MemoryKey { array, index }
    }
}

impl std::fmt::Display for MemoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.array, self.index)
    }
}

/// Identifier of a registered memory observer (protocol or resource manager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ObserverId(u64);

impl ObserverId {
    #[inline]
    pub fn new(id: u64) -> Self {
        ObserverId(id)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "O{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(NodeId::new(3).to_string(), "N3");
        assert_eq!(ObserverId::new(7).to_string(), "O7");
        assert_eq!(MemoryKey::new(ArrayId::new(1), 4).to_string(), "A1[4]");
    }

    #[test]
    fn test_memory_key_ordering() {
        let a = MemoryKey::new(ArrayId::new(0), 9);
        let b = MemoryKey::new(ArrayId::new(1), 0);
        let c = MemoryKey::new(ArrayId::new(1), 2);
        assert!(a < b);
        assert!(b < c);
    }
}
