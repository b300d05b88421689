//! Virtual time for the quantum network simulation.
//!
//! A `VirtualTime` counts picoseconds since the start of the run. Time
//! advances only when the timeline dispatches events, never from
//! wall-clock observation. Physical parameters (coherence time,
//! excitation period) are specified in seconds and converted at the
//! scheduling boundary.

/// Number of ticks in one second of simulated time.
pub const TICKS_PER_SECOND: f64 = 1e12;

/// A logical tick (picosecond) in simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualTime(u64);

impl VirtualTime {
    /// The zero-point of simulation time.
    pub const ZERO: VirtualTime = VirtualTime(0);

    /// The latest representable instant.
    pub const MAX: VirtualTime = VirtualTime(u64::MAX);

    /// Create a new `VirtualTime` from a raw tick value.
    #[inline]
    pub fn new(ticks: u64) -> Self {
        VirtualTime(ticks)
    }

    /// Convert a duration in seconds to ticks, rounding to the nearest
    /// picosecond. Negative and NaN inputs clamp to zero, overly large
    /// inputs saturate at [`VirtualTime::MAX`].
    pub fn from_secs_f64(secs: f64) -> Self {
        let ticks = (secs * TICKS_PER_SECOND).round();
        if ticks.is_nan() || ticks <= 0.0 {
            VirtualTime::ZERO
        } else if ticks >= u64::MAX as f64 {
            VirtualTime::MAX
        } else {
            VirtualTime(ticks as u64)
        }
    }

    /// Return the raw tick value.
    #[inline]
    pub fn ticks(self) -> u64 {
        self.0
    }

    /// This instant expressed in seconds.
    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / TICKS_PER_SECOND
    }

    /// The instant `delay` ticks after `self`, or `None` past the end of time.
    #[inline]
    pub fn plus(self, delay: u64) -> Option<VirtualTime> {
        self.0.checked_add(delay).map(VirtualTime)
    }

    /// Ticks elapsed since `earlier`; `None` if `earlier` is in the future.
    #[inline]
    pub fn since(self, earlier: VirtualTime) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }
}

impl std::fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picosecond_resolution() {
        assert_eq!(VirtualTime::from_secs_f64(1.0).ticks(), 1_000_000_000_000);
        assert_eq!(VirtualTime::from_secs_f64(3e-12).ticks(), 3);
        // One period of an 80 MHz excitation clock.
        assert_eq!(VirtualTime::from_secs_f64(1.0 / 80e6).ticks(), 12_500);
        assert!((VirtualTime::new(500_000_000_000).as_secs_f64() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_seconds_clamp() {
        assert_eq!(VirtualTime::from_secs_f64(-4.0), VirtualTime::ZERO);
        assert_eq!(VirtualTime::from_secs_f64(f64::NAN), VirtualTime::ZERO);
        assert_eq!(VirtualTime::from_secs_f64(1e40), VirtualTime::MAX);
    }

    #[test]
    fn test_plus_saturates_to_none() {
        assert_eq!(VirtualTime::new(100).plus(50), Some(VirtualTime::new(150)));
        assert_eq!(VirtualTime::MAX.plus(1), None);
        assert_eq!(VirtualTime::MAX.plus(0), Some(VirtualTime::MAX));
    }

    #[test]
    fn test_since() {
        let armed = VirtualTime::new(1_000);
        let fired = VirtualTime::new(4_500);
        assert_eq!(fired.since(armed), Some(3_500));
        assert_eq!(armed.since(fired), None);
        assert!(armed < fired);
    }

    #[test]
    fn test_display() {
        assert_eq!(VirtualTime::new(12_500).to_string(), "T=12500");
    }
}
