//! Configuration for timelines and memories.
//!
//! Plain structs with validated defaults. With the `serialize` feature
//! enabled they derive serde traits and a whole simulation setup can be
//! read from a JSON document through [`SimConfig::from_json`].

use crate::error::{QnetError, QnetResult};

/// Sentinel coherence time meaning "never decays".
pub const NO_DECAY: f64 = -1.0;

/// Physical parameters of a single quantum memory.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct MemoryConfig {
    /// Fidelity of the stored state, in `[0, 1]`.
    pub fidelity: f64,
    /// Maximum excitation rate in Hz.
    pub frequency: f64,
    /// Probability that an excitation actually emits, in `[0, 1]`.
    pub efficiency: f64,
    /// Mean lifetime in seconds, or [`NO_DECAY`].
    pub coherence_time: f64,
    /// Emission wavelength in nm.
    pub wavelength: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            fidelity: 0.85,
            frequency: 80e6,
            efficiency: 1.0,
            coherence_time: NO_DECAY,
            wavelength: 500.0,
        }
    }
}

impl MemoryConfig {
    /// A lossless, non-decaying memory. Handy in tests.
    pub fn ideal() -> Self {
        MemoryConfig {
            fidelity: 1.0,
            frequency: 0.0,
            efficiency: 1.0,
            coherence_time: NO_DECAY,
            wavelength: 500.0,
        }
    }

    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }

    pub fn with_coherence_time(mut self, seconds: f64) -> Self {
        self.coherence_time = seconds;
        self
    }

    /// Reject out-of-range parameters.
    pub fn validate(&self) -> QnetResult<()> {
        check_unit("fidelity", self.fidelity)?;
        check_unit("efficiency", self.efficiency)?;
        if self.frequency.is_nan() || self.frequency < 0.0 {
            return Err(QnetError::Configuration(format!(
                "frequency must be non-negative, got {}",
                self.frequency
            )));
        }
        if self.coherence_time != NO_DECAY && (self.coherence_time.is_nan() || self.coherence_time <= 0.0) {
            return Err(QnetError::Configuration(format!(
                "coherence_time must be positive or {}, got {}",
                NO_DECAY, self.coherence_time
            )));
        }
        if self.wavelength.is_nan() || self.wavelength <= 0.0 {
            return Err(QnetError::Configuration(format!(
                "wavelength must be positive, got {}",
                self.wavelength
            )));
        }
        Ok(())
    }
}

pub(crate) fn check_unit(name: &str, value: f64) -> QnetResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(QnetError::Configuration(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

/// Timeline parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct TimelineConfig {
    /// Seed for every random draw in the run.
    pub seed: u64,
    /// Tick at which `run` stops, if any.
    pub stop_time: Option<u64>,
}

/// A memory array to build at startup.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrayConfig {
    pub name: String,
    pub num_memories: usize,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub memory: MemoryConfig,
}

/// Whole-simulation configuration.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct SimConfig {
    pub timeline: TimelineConfig,
    pub arrays: Vec<ArrayConfig>,
}

impl SimConfig {
    pub fn validate(&self) -> QnetResult<()> {
        for array in &self.arrays {
            if array.num_memories == 0 {
                return Err(QnetError::Configuration(format!(
                    "array {} must hold at least one memory",
                    array.name
                )));
            }
            array.memory.validate()?;
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    #[cfg(feature = "serialize")]
    pub fn from_json(text: &str) -> QnetResult<Self> {
        let config: SimConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MemoryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.coherence_time, NO_DECAY);
        assert_eq!(config.frequency, 80e6);
        assert!(MemoryConfig::ideal().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_fidelity_and_efficiency() {
        let mut config = MemoryConfig::ideal();
        config.fidelity = 1.2;
        assert!(matches!(config.validate(), Err(QnetError::Configuration(_))));

        let config = MemoryConfig::ideal().with_efficiency(-0.1);
        assert!(matches!(config.validate(), Err(QnetError::Configuration(_))));

        let config = MemoryConfig::ideal().with_efficiency(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_coherence_time_sentinel() {
        assert!(MemoryConfig::ideal().with_coherence_time(0.5).validate().is_ok());
        assert!(MemoryConfig::ideal().with_coherence_time(0.0).validate().is_err());
        assert!(MemoryConfig::ideal().with_coherence_time(-2.0).validate().is_err());
    }

    #[test]
    fn test_empty_array_rejected() {
        let config = SimConfig {
            timeline: TimelineConfig::default(),
            arrays: vec![ArrayConfig {
                name: "ma".into(),
                num_memories: 0,
                memory: MemoryConfig::default(),
            }],
        };
        assert!(matches!(config.validate(), Err(QnetError::Configuration(_))));
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn test_from_json() {
        let text = r#"{
            "timeline": { "seed": 9, "stop_time": 1000 },
            "arrays": [ { "name": "ma", "num_memories": 4, "memory": { "efficiency": 0.5 } } ]
        }"#;
        let config = SimConfig::from_json(text).unwrap();
        assert_eq!(config.timeline.seed, 9);
        assert_eq!(config.arrays[0].memory.efficiency, 0.5);
        assert_eq!(config.arrays[0].memory.fidelity, 0.85);

        assert!(SimConfig::from_json("{ not json").is_err());
    }
}
