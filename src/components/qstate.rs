//! Two-level quantum state of a single memory.
//!
//! Only the operations the memory lifecycle needs are provided:
//! basis/superposition preparation, a bit flip, and sampling the
//! excited-state population. The state is never collapsed by sampling.

use num_complex::Complex64;
use rand::Rng;

use crate::error::{QnetError, QnetResult};

/// Maximum deviation of `|a|² + |b|²` from 1 accepted as normalized.
pub const NORM_TOLERANCE: f64 = 1e-6;

/// Amplitude pair `(ground, excited)` with `|ground|² + |excited|² = 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct QuantumState {
    amplitudes: [Complex64; 2],
}

impl QuantumState {
    /// `|0⟩`: the ground state.
    pub fn ground() -> Self {
        QuantumState {
            amplitudes: [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
        }
    }

    /// `|1⟩`: the excited state.
    pub fn excited() -> Self {
        QuantumState {
            amplitudes: [Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)],
        }
    }

    /// `(|0⟩ + |1⟩)/√2`.
    pub fn plus() -> Self {
        let h = Complex64::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);
        QuantumState { amplitudes: [h, h] }
    }

    /// Build a state from explicit amplitudes, rejecting unnormalized input.
    pub fn from_amplitudes(amplitudes: [Complex64; 2]) -> QnetResult<Self> {
        let norm = amplitudes[0].norm_sqr() + amplitudes[1].norm_sqr();
        if norm.is_nan() || (norm - 1.0).abs() > NORM_TOLERANCE {
            return Err(QnetError::InvalidState(format!(
                "amplitudes must satisfy |a|^2 + |b|^2 = 1, got {}",
                norm
            )));
        }
        Ok(QuantumState { amplitudes })
    }

    /// Replace the amplitudes in place.
    pub fn set_state_single(&mut self, amplitudes: [Complex64; 2]) -> QnetResult<()> {
        *self = Self::from_amplitudes(amplitudes)?;
        Ok(())
    }

    pub fn amplitudes(&self) -> [Complex64; 2] {
        self.amplitudes
    }

    /// Swap the ground and excited amplitudes.
    pub fn flip(&mut self) {
        self.amplitudes.swap(0, 1);
    }

    /// `|excited|²`, clamped to `[0, 1]` against rounding.
    pub fn excited_probability(&self) -> f64 {
        self.amplitudes[1].norm_sqr().clamp(0.0, 1.0)
    }

    /// Draw a measurement outcome in the computational basis.
    /// Returns `true` when the system is found excited.
    pub fn sample_excited<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.excited_probability())
    }
}

impl Default for QuantumState {
    fn default() -> Self {
        Self::ground()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_basis_states() {
        assert_eq!(QuantumState::ground().excited_probability(), 0.0);
        assert_eq!(QuantumState::excited().excited_probability(), 1.0);
        assert!((QuantumState::plus().excited_probability() - 0.5).abs() < 1e-12);
        assert_eq!(QuantumState::default(), QuantumState::ground());
    }

    #[test]
    fn test_flip_swaps_amplitudes() {
        let mut s = QuantumState::ground();
        s.flip();
        assert_eq!(s, QuantumState::excited());
        s.flip();
        assert_eq!(s, QuantumState::ground());
    }

    #[test]
    fn test_rejects_unnormalized() {
        let mut s = QuantumState::ground();
        let err = s
            .set_state_single([Complex64::new(1.0, 0.0), Complex64::new(1.0, 0.0)])
            .unwrap_err();
        assert!(matches!(err, QnetError::InvalidState(_)));
        // Failed update leaves the state alone.
        assert_eq!(s, QuantumState::ground());
    }

    #[test]
    fn test_accepts_complex_phases() {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let s = QuantumState::from_amplitudes([Complex64::new(h, 0.0), Complex64::new(0.0, -h)]);
        assert!(s.is_ok());
    }

    #[test]
    fn test_sampling_basis_states_is_certain() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!((0..200).all(|_| !QuantumState::ground().sample_excited(&mut rng)));
        assert!((0..200).all(|_| QuantumState::excited().sample_excited(&mut rng)));
    }
}
