//! Neurons: the smallest stateful unit of the plastic network.
//!
//! A neuron holds short-term state (potential, active flag, the per-step input
//! accumulator) and long-term state (stored value, resources, survival). Only
//! [`Neuron::reset_transient`] and evaluation touch the short-term part.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Arena index of a neuron inside its [`crate::network::Network`].
pub type NeuronId = usize;

/// Global clock value.
pub type Tick = u64;

const SURVIVAL_GAIN_ON_SPIKE: f32 = 0.01;
const FACILITATION_DECAY: f32 = 0.1;
pub(crate) const FACILITATION_MAX: f32 = 0.5;
const FACILITATION_SCALE: f32 = 0.3;
const DISUSE_SURVIVAL_LOSS: f32 = 0.05;
const DISUSE_RESOURCE_LOSS: f32 = 0.1;
/// Below this survival factor, disuse also drains resources.
const SURVIVAL_CRITICAL: f32 = 0.3;

pub const INITIAL_RESOURCES: f32 = 0.5;
pub const INITIAL_SURVIVAL: f32 = 0.5;

/// Topological role. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NeuronRole {
    Sensory,
    Inter,
    Motor,
}

impl NeuronRole {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            NeuronRole::Sensory => 0,
            NeuronRole::Inter => 1,
            NeuronRole::Motor => 2,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(NeuronRole::Sensory),
            1 => Some(NeuronRole::Inter),
            2 => Some(NeuronRole::Motor),
            _ => None,
        }
    }
}

/// Three-level membrane potential.
///
/// Kept discrete on purpose: activity is "spike or not", never a drifting float.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Potential {
    #[default]
    Rest,
    Threshold,
    Spike,
}

impl Potential {
    pub const fn value(self) -> f32 {
        match self {
            Potential::Rest => 0.0,
            Potential::Threshold => 0.5,
            Potential::Spike => 1.0,
        }
    }

    /// Potential scaled so that a spike reads as 1.0.
    pub fn normalized(self) -> f32 {
        self.value() / Potential::Spike.value()
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Potential::Rest => 0,
            Potential::Threshold => 1,
            Potential::Spike => 2,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Potential::Rest),
            1 => Some(Potential::Threshold),
            2 => Some(Potential::Spike),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Neuron {
    pub(crate) id: NeuronId,
    pub(crate) role: NeuronRole,

    // Persistent "belief"/output, in [-1, 1].
    pub(crate) stored_value: f32,

    pub(crate) potential: Potential,
    pub(crate) active: bool,

    pub(crate) resources: f32,
    pub(crate) survival: f32,
    pub(crate) last_activation: Tick,
    pub(crate) activation_count: u64,

    /// Threshold-lowering bias in [0, 0.5] used by pattern completion.
    pub(crate) facilitation: f32,

    // Per-step input buffer; cleared by every evaluation.
    pub(crate) accumulated: f32,
    pub(crate) pending_inputs: u32,

    // Presynaptic neighbours. Lookup only, the network owns all synapses.
    pub(crate) neighbors: Vec<NeuronId>,
}

impl Neuron {
    pub fn new(id: NeuronId, role: NeuronRole) -> Self {
        Self {
            id,
            role,
            stored_value: 0.0,
            potential: Potential::Rest,
            active: false,
            resources: INITIAL_RESOURCES,
            survival: INITIAL_SURVIVAL,
            last_activation: 0,
            activation_count: 0,
            facilitation: 0.0,
            accumulated: 0.0,
            pending_inputs: 0,
            neighbors: Vec::new(),
        }
    }

    pub fn id(&self) -> NeuronId {
        self.id
    }

    pub fn role(&self) -> NeuronRole {
        self.role
    }

    pub fn stored_value(&self) -> f32 {
        self.stored_value
    }

    pub fn potential(&self) -> Potential {
        self.potential
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn resources(&self) -> f32 {
        self.resources
    }

    pub fn survival(&self) -> f32 {
        self.survival
    }

    pub fn last_activation(&self) -> Tick {
        self.last_activation
    }

    pub fn activation_count(&self) -> u64 {
        self.activation_count
    }

    pub fn facilitation(&self) -> f32 {
        self.facilitation
    }

    pub fn neighbors(&self) -> &[NeuronId] {
        &self.neighbors
    }

    pub fn set_stored_value(&mut self, value: f32) {
        self.stored_value = value.clamp(-1.0, 1.0);
    }

    pub fn nudge_stored_value(&mut self, delta: f32) {
        self.set_stored_value(self.stored_value + delta);
    }

    pub fn set_resources(&mut self, value: f32) {
        self.resources = value.clamp(0.0, 1.0);
    }

    pub fn set_survival(&mut self, value: f32) {
        self.survival = value.clamp(0.0, 1.0);
    }

    /// Fire: mark active, stamp the time and reward survival slightly.
    pub fn activate(&mut self, now: Tick) {
        self.potential = Potential::Spike;
        self.active = true;
        self.last_activation = now;
        self.activation_count = self.activation_count.saturating_add(1);
        self.set_survival(self.survival + SURVIVAL_GAIN_ON_SPIKE);
    }

    /// Clear short-term activity. Stored value, resources and survival persist.
    pub fn reset_transient(&mut self) {
        self.active = false;
        self.potential = Potential::Rest;
    }

    /// Accumulate one incoming signal for the next evaluation.
    #[inline]
    pub fn receive_signal(&mut self, signal: f32) {
        self.accumulated += signal;
        self.pending_inputs = self.pending_inputs.saturating_add(1);
    }

    /// Compare accumulated input against the (facilitated) threshold.
    ///
    /// Returns `true` if the neuron fired. The accumulator is always cleared.
    pub fn evaluate_activation(&mut self, base_threshold: f32, now: Tick) -> bool {
        let sum = self.accumulated;
        let had_input = self.pending_inputs > 0;
        self.accumulated = 0.0;
        self.pending_inputs = 0;

        if !had_input {
            self.decay_facilitation();
            self.reset_transient();
            return false;
        }

        let threshold = base_threshold * (1.0 - self.facilitation);
        if sum >= threshold {
            self.activate(now);
            self.facilitation = 0.0;
            true
        } else {
            self.decay_facilitation();
            self.reset_transient();
            false
        }
    }

    fn decay_facilitation(&mut self) {
        self.facilitation = (self.facilitation - FACILITATION_DECAY).max(0.0);
    }

    /// Lower the effective threshold so a partially cued pattern can complete.
    pub fn facilitate_activation(&mut self, factor: f32) {
        self.facilitation = (factor * FACILITATION_SCALE).clamp(0.0, FACILITATION_MAX);
    }

    pub fn degrade_from_disuse(&mut self, now: Tick, window: Tick) {
        if now.saturating_sub(self.last_activation) <= window {
            return;
        }
        self.set_survival(self.survival - DISUSE_SURVIVAL_LOSS);
        if self.survival < SURVIVAL_CRITICAL {
            self.set_resources(self.resources - DISUSE_RESOURCE_LOSS);
        }
    }

    /// Exhausted neurons are only flagged; nothing excises them from the arena.
    pub fn should_be_removed(&self) -> bool {
        self.resources <= 0.0 || self.survival <= 0.0
    }

    /// Read-out value: normalized potential while active, stored value otherwise.
    pub fn output(&self) -> f32 {
        if self.active {
            self.potential.normalized()
        } else {
            self.stored_value
        }
    }

    /// Contribution this neuron sends through an outgoing synapse of `weight`.
    #[inline]
    pub fn signal_through(&self, weight: f32) -> f32 {
        weight * self.potential.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activate_sets_spike_and_survival() {
        let mut n = Neuron::new(0, NeuronRole::Inter);
        n.activate(7);
        assert!(n.is_active());
        assert_eq!(n.potential(), Potential::Spike);
        assert_eq!(n.last_activation(), 7);
        assert_eq!(n.activation_count(), 1);
        assert!((n.survival() - (INITIAL_SURVIVAL + 0.01)).abs() < 1e-6);

        n.set_survival(0.995);
        n.activate(8);
        assert_eq!(n.survival(), 1.0);
    }

    #[test]
    fn reset_transient_keeps_long_term_state() {
        let mut n = Neuron::new(3, NeuronRole::Motor);
        n.set_stored_value(0.4);
        n.activate(1);
        let survival = n.survival();
        n.reset_transient();
        assert!(!n.is_active());
        assert_eq!(n.potential(), Potential::Rest);
        assert_eq!(n.stored_value(), 0.4);
        assert_eq!(n.survival(), survival);
        assert_eq!(n.resources(), INITIAL_RESOURCES);
    }

    #[test]
    fn evaluation_fires_above_threshold() {
        let mut n = Neuron::new(1, NeuronRole::Inter);
        n.receive_signal(0.3);
        n.receive_signal(0.3);
        assert!(n.evaluate_activation(0.5, 2));
        assert!(n.is_active());

        // Accumulator is cleared: no input next time means reset.
        assert!(!n.evaluate_activation(0.5, 3));
        assert!(!n.is_active());
    }

    #[test]
    fn evaluation_below_threshold_resets() {
        let mut n = Neuron::new(1, NeuronRole::Inter);
        n.activate(1);
        n.receive_signal(0.2);
        assert!(!n.evaluate_activation(0.5, 2));
        assert!(!n.is_active());
        assert_eq!(n.potential(), Potential::Rest);
    }

    #[test]
    fn facilitation_lowers_threshold_and_decays() {
        let mut n = Neuron::new(1, NeuronRole::Inter);
        n.facilitate_activation(1.0);
        assert!((n.facilitation() - 0.3).abs() < 1e-6);

        // 0.4 < 0.5 but >= 0.5 * (1 - 0.3) = 0.35.
        n.receive_signal(0.4);
        assert!(n.evaluate_activation(0.5, 1));
        assert_eq!(n.facilitation(), 0.0);

        n.facilitate_activation(10.0);
        assert_eq!(n.facilitation(), 0.5);
        assert!(!n.evaluate_activation(0.5, 2));
        assert!((n.facilitation() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn disuse_erodes_survival_then_resources() {
        let mut n = Neuron::new(0, NeuronRole::Inter);
        n.degrade_from_disuse(50, 100);
        assert_eq!(n.survival(), INITIAL_SURVIVAL);

        for _ in 0..20 {
            n.degrade_from_disuse(500, 100);
        }
        assert_eq!(n.survival(), 0.0);
        assert!(n.resources() < INITIAL_RESOURCES);
        assert!(n.should_be_removed());
    }

    #[test]
    fn output_depends_on_activity() {
        let mut n = Neuron::new(0, NeuronRole::Motor);
        n.set_stored_value(-3.0);
        assert_eq!(n.stored_value(), -1.0);
        assert_eq!(n.output(), -1.0);
        n.activate(1);
        assert_eq!(n.output(), 1.0);
    }

    #[test]
    fn potential_codes_roundtrip() {
        for p in [Potential::Rest, Potential::Threshold, Potential::Spike] {
            assert_eq!(Potential::from_u8(p.to_u8()), Some(p));
        }
        assert_eq!(Potential::from_u8(9), None);
        assert_eq!(Potential::Threshold.normalized(), 0.5);
    }
}
