//! Photons emitted by memory excitation.

use crate::id::MemoryKey;
use crate::time::VirtualTime;

/// A single emitted photon.
///
/// A null photon carries no detectable excitation: the memory was
/// found in its ground state. Emissions lost to inefficiency produce no
/// photon at all.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Photon {
    pub name: String,
    /// Wavelength in nm.
    pub wavelength: f64,
    /// Memory that emitted it.
    pub source: MemoryKey,
    pub emitted_at: VirtualTime,
    pub is_null: bool,
}

impl std::fmt::Display for Photon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Photon({} from {} at {}{})",
            self.name,
            self.source,
            self.emitted_at,
            if self.is_null { ", null" } else { "" }
        )
    }
}
