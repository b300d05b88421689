//! A single quantum memory and its coherence lifecycle.
//!
//! ```text
//!            schedule_expiration / entangle
//!   Stable ───────────────────────────────▶ Armed ◀─┐ re-arm (stale timer
//!     ▲                                       │     │  invalidated first)
//!     │ entangle without decay                └─────┘
//!     │                                       │ expiration event fires
//!   Expired ◀─────────────────────────────────┘
//! ```
//!
//! All mutation happens inside process bodies (or driver code holding a
//! [`SimulationContext`]), so no locking is involved.

use rand::Rng;
use rand_distr::{Distribution, Exp};
use tracing::{debug, trace};

use crate::config::{check_unit, MemoryConfig, NO_DECAY};
use crate::error::{QnetError, QnetResult};
use crate::event::{EventId, Process};
use crate::eventlog::{hash_bytes, hash_combine};
use crate::id::{MemoryKey, NodeId};
use crate::time::VirtualTime;
use crate::timeline::SimulationContext;

use super::observer::{select_observer, Observer, PhotonSink};
use super::photon::Photon;
use super::qstate::QuantumState;

/// The remote half of an entangled pair.
///
/// Both fields are always present together; a memory with no partner
/// holds `None` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EntangledMemory {
    pub node_id: NodeId,
    pub memo_id: MemoryKey,
}

/// Coherence status of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoherenceStatus {
    /// No decay timer pending.
    Stable,
    /// Exactly one expiration event pending.
    Armed,
    /// Expired and not yet re-armed.
    Expired,
}

/// Result of one excitation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExciteOutcome {
    /// A detectable photon was emitted.
    Emitted,
    /// A null photon was delivered: the memory was found in its ground state.
    Null,
    /// The emission failed; nothing was delivered.
    Lost,
}

#[derive(Debug, Clone)]
pub struct Memory {
    name: String,
    key: MemoryKey,
    fidelity: f64,
    frequency: f64,
    efficiency: f64,
    /// Mean lifetime in seconds; `None` never decays.
    coherence_time: Option<f64>,
    wavelength: f64,
    qstate: QuantumState,
    entangled_memory: Option<EntangledMemory>,
    expiration_event: Option<EventId>,
    expired: bool,
    observers: Vec<Observer>,
    owner: Option<NodeId>,
}

impl Memory {
    /// Build a memory in the ground state with no observers.
    pub fn new(name: impl Into<String>, key: MemoryKey, config: MemoryConfig) -> QnetResult<Self> {
        config.validate()?;
        Ok(Memory {
            name: name.into(),
            key,
            fidelity: config.fidelity,
            frequency: config.frequency,
            efficiency: config.efficiency,
            coherence_time: if config.coherence_time == NO_DECAY {
                None
            } else {
                Some(config.coherence_time)
            },
            wavelength: config.wavelength,
            qstate: QuantumState::ground(),
            entangled_memory: None,
            expiration_event: None,
            expired: false,
            observers: Vec::new(),
            owner: None,
        })
    }

    // ── Attributes ────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> MemoryKey {
        self.key
    }

    pub fn fidelity(&self) -> f64 {
        self.fidelity
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    pub fn set_efficiency(&mut self, efficiency: f64) -> QnetResult<()> {
        check_unit("efficiency", efficiency)?;
        self.efficiency = efficiency;
        Ok(())
    }

    pub fn set_fidelity(&mut self, fidelity: f64) -> QnetResult<()> {
        check_unit("fidelity", fidelity)?;
        self.fidelity = fidelity;
        Ok(())
    }

    /// Mean lifetime in seconds, `None` if the memory never decays.
    pub fn coherence_time(&self) -> Option<f64> {
        self.coherence_time
    }

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    pub fn qstate(&self) -> &QuantumState {
        &self.qstate
    }

    pub fn set_qstate(&mut self, state: QuantumState) {
        self.qstate = state;
    }

    pub fn entangled_memory(&self) -> Option<EntangledMemory> {
        self.entangled_memory
    }

    pub fn set_entangled_memory(&mut self, partner: Option<EntangledMemory>) {
        self.entangled_memory = partner;
    }

    pub fn expiration_event(&self) -> Option<EventId> {
        self.expiration_event
    }

    /// Overwrite the tracked expiration event without touching the queue.
    pub fn set_expiration_event(&mut self, event: Option<EventId>) {
        self.expiration_event = event;
    }

    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    pub fn set_owner(&mut self, owner: Option<NodeId>) {
        self.owner = owner;
    }

    pub fn observers(&self) -> &[Observer] {
        &self.observers
    }

    pub fn coherence_status(&self) -> CoherenceStatus {
        if self.expiration_event.is_some() {
            CoherenceStatus::Armed
        } else if self.expired {
            CoherenceStatus::Expired
        } else {
            CoherenceStatus::Stable
        }
    }

    // ── State preparation ─────────────────────────────────────────

    /// Swap the ground and excited amplitudes.
    pub fn flip_state(&mut self) {
        self.qstate.flip();
    }

    /// Prepare `(|0⟩ + |1⟩)/√2`.
    pub fn set_plus(&mut self) {
        self.qstate = QuantumState::plus();
    }

    // ── Emission ──────────────────────────────────────────────────

    /// Attempt to emit a photon carrying the memory state into `dst`.
    ///
    /// The emission succeeds with probability `efficiency`; a lost
    /// emission delivers nothing. An emitted photon is null unless the
    /// memory is then found excited. The state is sampled, not collapsed.
    pub fn excite<S>(&self, ctx: &mut SimulationContext, dst: &mut S) -> ExciteOutcome
    where
        S: PhotonSink + ?Sized,
    {
        if !ctx.rng().gen_bool(self.efficiency) {
            trace!(memory = %self.key, "excite lost");
            return ExciteOutcome::Lost;
        }
        let excited = self.qstate.sample_excited(ctx.rng());
        let photon = Photon {
            name: self.name.clone(),
            wavelength: self.wavelength,
            source: self.key,
            emitted_at: ctx.now(),
            is_null: !excited,
        };
        trace!(memory = %self.key, null = photon.is_null, "excite");
        dst.accept_photon(ctx, photon);
        if excited {
            ExciteOutcome::Emitted
        } else {
            ExciteOutcome::Null
        }
    }

    // ── Observers ─────────────────────────────────────────────────

    /// Add an observer. Attaching twice is a no-op.
    pub fn attach(&mut self, observer: Observer) {
        if !self.observers.contains(&observer) {
            self.observers.push(observer);
        }
    }

    /// Remove an observer. Detaching a non-member is a no-op.
    pub fn detach(&mut self, observer: Observer) {
        self.observers.retain(|o| *o != observer);
    }

    // ── Lifecycle ─────────────────────────────────────────────────

    /// Record a new partner and arm the decay timer.
    pub fn entangle(
        &mut self,
        ctx: &mut SimulationContext,
        partner: EntangledMemory,
    ) -> QnetResult<Option<EventId>> {
        self.entangled_memory = Some(partner);
        self.expired = false;
        self.schedule_expiration(ctx)
    }

    /// Reset to the ground state, drop the partner and pick the one
    /// observer to notify.
    ///
    /// The caller delivers the notification to the returned observer;
    /// `None` means the expiration is silent. A still-pending expiration
    /// event other than the one executing is invalidated so the memory
    /// expires exactly once.
    pub fn expire(&mut self, ctx: &mut SimulationContext) -> Option<Observer> {
        if let Some(pending) = self.expiration_event.take() {
            // No-op for the event currently executing: it is already popped.
            ctx.invalidate(pending);
        }
        self.qstate = QuantumState::ground();
        self.entangled_memory = None;
        self.expired = true;

        let target = select_observer(&self.observers);
        debug!(memory = %self.key, time = %ctx.now(), observer = ?target, "memory expired");
        target
    }

    /// Arm a fresh decay timer with an exponentially distributed delay.
    ///
    /// Any timer still pending is invalidated first, so at most one
    /// expiration event is live per memory. Memories without a coherence
    /// time schedule nothing and return `Ok(None)`.
    pub fn schedule_expiration(&mut self, ctx: &mut SimulationContext) -> QnetResult<Option<EventId>> {
        let Some(mean) = self.coherence_time else {
            return Ok(None);
        };

        if let Some(stale) = self.expiration_event.take() {
            ctx.invalidate(stale);
        }

        let decay = Exp::new(1.0 / mean)
            .map_err(|e| QnetError::Configuration(format!("coherence_time {}: {}", mean, e)))?;
        let delay = VirtualTime::from_secs_f64(decay.sample(ctx.rng()));
        let id = ctx.schedule_after(delay.ticks(), Process::MemoryExpire { memory: self.key })?;

        trace!(memory = %self.key, event = %id, delay = delay.ticks(), "expiration armed");
        self.expiration_event = Some(id);
        self.expired = false;
        Ok(Some(id))
    }

    /// Deterministic hash of the mutable state.
    pub fn state_hash(&self) -> u64 {
        let mut h = hash_bytes(self.name.as_bytes());
        for amp in self.qstate.amplitudes() {
            h = hash_combine(h, amp.re.to_bits());
            h = hash_combine(h, amp.im.to_bits());
        }
        if let Some(partner) = self.entangled_memory {
            h = hash_combine(h, partner.node_id.raw());
            h = hash_combine(h, partner.memo_id.index as u64);
        }
        h = hash_combine(h, self.expiration_event.map_or(u64::MAX, |e| e.raw()));
        hash_combine(h, self.expired as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{ArrayId, ObserverId};
    use crate::timeline::Timeline;
    use num_complex::Complex64;

    const NUM_TESTS: usize = 1000;

    fn key() -> MemoryKey {
        MemoryKey::new(ArrayId::new(0), 0)
    }

    fn memory(config: MemoryConfig) -> Memory {
        Memory::new("mem", key(), config).unwrap()
    }

    fn excite_n(mem: &Memory, tl: &mut Timeline, n: usize) -> Vec<Photon> {
        let mut photons: Vec<Photon> = Vec::new();
        let mut ctx = tl.context();
        for _ in 0..n {
            mem.excite(&mut ctx, &mut photons);
        }
        photons
    }

    fn null_ratio(photons: &[Photon]) -> f64 {
        photons.iter().filter(|p| p.is_null).count() as f64 / photons.len() as f64
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = MemoryConfig::ideal();
        config.fidelity = 1.5;
        assert!(matches!(
            Memory::new("m", key(), config),
            Err(QnetError::Configuration(_))
        ));
        assert!(Memory::new("m", key(), MemoryConfig::ideal().with_efficiency(2.0)).is_err());

        let mut mem = memory(MemoryConfig::ideal());
        assert!(mem.set_efficiency(-1.0).is_err());
        assert_eq!(mem.efficiency(), 1.0);
    }

    #[test]
    fn test_ground_state_always_null() {
        let mut tl = Timeline::with_seed(1);
        let mem = memory(MemoryConfig::ideal());
        let photons = excite_n(&mem, &mut tl, NUM_TESTS);
        assert_eq!(photons.len(), NUM_TESTS);
        assert_eq!(null_ratio(&photons), 1.0);
    }

    #[test]
    fn test_efficiency_controls_emission_rate() {
        let mut tl = Timeline::with_seed(2);
        let mut mem = memory(MemoryConfig::ideal().with_efficiency(0.7));
        mem.set_qstate(QuantumState::excited());

        let mut photons: Vec<Photon> = Vec::new();
        let mut lost = 0;
        {
            let mut ctx = tl.context();
            for _ in 0..NUM_TESTS {
                if mem.excite(&mut ctx, &mut photons) == ExciteOutcome::Lost {
                    lost += 1;
                }
            }
        }
        let delivered = photons.len() as f64 / NUM_TESTS as f64;
        assert!((delivered - 0.7).abs() < 0.1, "delivered fraction {}", delivered);
        assert_eq!(photons.len() + lost, NUM_TESTS);
        assert_eq!(null_ratio(&photons), 0.0);
    }

    #[test]
    fn test_zero_efficiency_delivers_nothing() {
        let mut tl = Timeline::with_seed(4);
        let mut mem = memory(MemoryConfig::ideal().with_efficiency(0.0));
        mem.set_qstate(QuantumState::excited());
        assert!(excite_n(&mem, &mut tl, 100).is_empty());
    }

    #[test]
    fn test_plus_state_half_null() {
        let mut tl = Timeline::with_seed(3);
        let mut mem = memory(MemoryConfig::ideal());
        let mut photons: Vec<Photon> = Vec::new();
        {
            let mut ctx = tl.context();
            for _ in 0..NUM_TESTS {
                mem.set_plus();
                mem.excite(&mut ctx, &mut photons);
            }
        }
        assert_eq!(photons.len(), NUM_TESTS);
        assert!((null_ratio(&photons) - 0.5).abs() < 0.1);
    }

    #[test]
    fn test_excite_does_not_collapse() {
        let mut tl = Timeline::new();
        let mut mem = memory(MemoryConfig::ideal());
        mem.set_plus();
        excite_n(&mem, &mut tl, 10);
        assert_eq!(*mem.qstate(), QuantumState::plus());
    }

    #[test]
    fn test_flip_state_swaps_outcome() {
        let mut tl = Timeline::new();
        let mut mem = memory(MemoryConfig::ideal());
        let mut photons: Vec<Photon> = Vec::new();
        {
            let mut ctx = tl.context();
            assert_eq!(mem.excite(&mut ctx, &mut photons), ExciteOutcome::Null);
            mem.flip_state();
            assert_eq!(mem.excite(&mut ctx, &mut photons), ExciteOutcome::Emitted);
        }
        assert!(photons[0].is_null);
        assert!(!photons[1].is_null);
        assert_eq!(photons[1].source, key());
        assert_eq!(photons[1].wavelength, 500.0);
    }

    #[test]
    fn test_expire_resets_state_and_partner() {
        let mut tl = Timeline::new();
        let mut mem = memory(MemoryConfig::ideal());
        let h = std::f64::consts::FRAC_1_SQRT_2;
        mem.set_qstate(
            QuantumState::from_amplitudes([Complex64::new(0.0, h), Complex64::new(h, 0.0)]).unwrap(),
        );
        mem.set_entangled_memory(Some(EntangledMemory {
            node_id: NodeId::new(1),
            memo_id: MemoryKey::new(ArrayId::new(9), 0),
        }));

        let notified = mem.expire(&mut tl.context());
        assert_eq!(notified, None);
        assert_eq!(*mem.qstate(), QuantumState::ground());
        assert_eq!(
            mem.qstate().amplitudes(),
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)]
        );
        assert_eq!(mem.entangled_memory(), None);
        assert_eq!(mem.coherence_status(), CoherenceStatus::Expired);
    }

    #[test]
    fn test_expire_precedence() {
        let mut tl = Timeline::new();
        let mut mem = memory(MemoryConfig::ideal());
        let parent = Observer::Parent(ObserverId::new(1));
        let protocol = Observer::Protocol(ObserverId::new(2));

        mem.attach(parent);
        mem.attach(protocol);
        assert_eq!(mem.expire(&mut tl.context()), Some(protocol));

        mem.detach(protocol);
        assert_eq!(mem.expire(&mut tl.context()), Some(parent));
    }

    #[test]
    fn test_attach_detach_idempotent() {
        let mut mem = memory(MemoryConfig::ideal());
        let parent = Observer::Parent(ObserverId::new(1));
        mem.attach(parent);
        mem.attach(parent);
        assert_eq!(mem.observers(), &[parent]);

        mem.detach(Observer::Protocol(ObserverId::new(5)));
        assert_eq!(mem.observers().len(), 1);
        mem.detach(parent);
        mem.detach(parent);
        assert!(mem.observers().is_empty());
    }

    #[test]
    fn test_no_decay_schedules_nothing() {
        let mut tl = Timeline::new();
        let mut mem = memory(MemoryConfig::ideal());
        assert_eq!(mem.schedule_expiration(&mut tl.context()), Ok(None));
        assert_eq!(tl.pending_count(), 0);
        assert_eq!(mem.coherence_status(), CoherenceStatus::Stable);
    }

    #[test]
    fn test_rescheduling_invalidates_stale_timer() {
        let mut tl = Timeline::new();
        let mut mem = memory(MemoryConfig::ideal().with_coherence_time(1.0));

        let stale = tl
            .schedule(VirtualTime::new(1_000_000_000_000), Process::MemoryExpire { memory: key() })
            .unwrap();
        mem.set_expiration_event(Some(stale));

        let fresh = mem.schedule_expiration(&mut tl.context()).unwrap().unwrap();

        let pending = tl.pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending.iter().filter(|p| !p.is_valid).count(), 1);
        assert!(!tl.is_valid(stale));
        assert!(tl.is_valid(fresh));
        assert_eq!(mem.expiration_event(), Some(fresh));
        assert_eq!(mem.coherence_status(), CoherenceStatus::Armed);
    }

    #[test]
    fn test_repeated_arming_keeps_one_live_timer() {
        let mut tl = Timeline::with_seed(11);
        let mut mem = memory(MemoryConfig::ideal().with_coherence_time(0.01));
        for _ in 0..5 {
            mem.schedule_expiration(&mut tl.context()).unwrap();
        }
        assert_eq!(tl.pending_count(), 5);
        assert_eq!(tl.live_count(), 1);
    }

    #[test]
    fn test_manual_expire_cancels_pending_timer() {
        let mut tl = Timeline::new();
        let mut mem = memory(MemoryConfig::ideal().with_coherence_time(1.0));
        let partner = EntangledMemory {
            node_id: NodeId::new(2),
            memo_id: MemoryKey::new(ArrayId::new(3), 1),
        };
        let armed = mem.entangle(&mut tl.context(), partner).unwrap().unwrap();
        assert_eq!(mem.entangled_memory(), Some(partner));

        mem.expire(&mut tl.context());
        assert!(!tl.is_valid(armed));
        assert_eq!(tl.live_count(), 0);
        assert_eq!(mem.expiration_event(), None);
    }

    #[test]
    fn test_coherence_status_across_entangle_and_expire() {
        let mut tl = Timeline::with_seed(9);
        let partner = EntangledMemory {
            node_id: NodeId::new(1),
            memo_id: MemoryKey::new(ArrayId::new(1), 0),
        };

        let mut mem = memory(MemoryConfig::ideal().with_coherence_time(1e-3));
        assert_eq!(mem.coherence_status(), CoherenceStatus::Stable);
        let first = mem.entangle(&mut tl.context(), partner).unwrap().unwrap();
        assert_eq!(mem.coherence_status(), CoherenceStatus::Armed);

        mem.expire(&mut tl.context());
        assert_eq!(mem.coherence_status(), CoherenceStatus::Expired);
        assert!(!tl.is_valid(first));

        let second = mem.entangle(&mut tl.context(), partner).unwrap().unwrap();
        assert_ne!(first, second);
        assert_eq!(mem.coherence_status(), CoherenceStatus::Armed);
        assert_eq!(mem.entangled_memory(), Some(partner));
        assert_eq!(tl.live_count(), 1);

        // Without decay, re-entangling an expired memory settles it as stable.
        let mut stable = memory(MemoryConfig::ideal());
        assert_eq!(stable.entangle(&mut tl.context(), partner), Ok(None));
        assert_eq!(stable.coherence_status(), CoherenceStatus::Stable);
        stable.expire(&mut tl.context());
        assert_eq!(stable.coherence_status(), CoherenceStatus::Expired);
        assert_eq!(stable.entangle(&mut tl.context(), partner), Ok(None));
        assert_eq!(stable.coherence_status(), CoherenceStatus::Stable);
        assert_eq!(tl.live_count(), 1);
    }

    #[test]
    fn test_decay_delay_mean_matches_coherence_time() {
        let mut tl = Timeline::with_seed(5);
        let mut mem = memory(MemoryConfig::ideal().with_coherence_time(1e-3));
        let mut total = 0u128;
        let n = 2000;
        for _ in 0..n {
            mem.schedule_expiration(&mut tl.context()).unwrap();
            let live = tl.pending().into_iter().find(|p| p.is_valid).unwrap();
            total += live.event.time.ticks() as u128;
        }
        let mean_secs = total as f64 / n as f64 / 1e12;
        assert!((mean_secs - 1e-3).abs() < 1e-4, "mean decay {}", mean_secs);
    }
}
