//! Engrams: named memory traces over a set of neurons and synapses.
//!
//! Membership is stored as ids only. Neurons and synapses never learn which
//! engrams they belong to; every mutation resolves ids through the arenas the
//! caller passes in.

use std::collections::BTreeSet;

use crate::neuron::{Neuron, NeuronId, Tick};
use crate::synapse::{Synapse, SynapseId};

/// Fraction of members that must be active for the engram to count as active.
pub const DEFAULT_ACTIVATION_THRESHOLD: f32 = 0.3;

pub const INITIAL_STRENGTH: f32 = 0.5;
pub const INITIAL_RELEVANCE: f32 = 1.0;
pub const MAX_RELEVANCE: f32 = 2.0;

/// Degradation never pushes a member synapse below this weight.
pub const DEGRADE_WEIGHT_FLOOR: f32 = 0.1;
/// Below this strength, degradation starts to weaken member synapses.
const WEAK_STRENGTH: f32 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct Engram {
    pub(crate) id: String,
    pub(crate) neurons: BTreeSet<NeuronId>,
    pub(crate) synapses: BTreeSet<SynapseId>,
    pub(crate) strength: f32,
    pub(crate) relevance: f32,
    pub(crate) activation_count: u64,
    pub(crate) creation_time: Tick,
    pub(crate) last_activation: Tick,
}

impl Engram {
    pub fn new(id: impl Into<String>, now: Tick) -> Self {
        Self {
            id: id.into(),
            neurons: BTreeSet::new(),
            synapses: BTreeSet::new(),
            strength: INITIAL_STRENGTH,
            relevance: INITIAL_RELEVANCE,
            activation_count: 0,
            creation_time: now,
            last_activation: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn neurons(&self) -> &BTreeSet<NeuronId> {
        &self.neurons
    }

    pub fn synapses(&self) -> &BTreeSet<SynapseId> {
        &self.synapses
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn relevance(&self) -> f32 {
        self.relevance
    }

    pub fn activation_count(&self) -> u64 {
        self.activation_count
    }

    pub fn creation_time(&self) -> Tick {
        self.creation_time
    }

    pub fn last_activation(&self) -> Tick {
        self.last_activation
    }

    /// Idempotent. Returns `true` if the neuron was not yet a member.
    pub fn add_neuron(&mut self, id: NeuronId) -> bool {
        self.neurons.insert(id)
    }

    /// Idempotent. Returns `true` if the synapse was not yet a member.
    pub fn add_connection(&mut self, id: SynapseId) -> bool {
        self.synapses.insert(id)
    }

    pub(crate) fn forget_connection(&mut self, id: SynapseId) -> bool {
        self.synapses.remove(&id)
    }

    pub fn set_relevance(&mut self, relevance: f32) {
        self.relevance = relevance.clamp(0.0, MAX_RELEVANCE);
    }

    /// Raise strength without touching member synapses.
    pub fn strengthen(&mut self, amount: f32) {
        self.strength = (self.strength + amount).clamp(0.0, 1.0);
    }

    /// Strengthen the trace and nudge every member synapse up.
    pub fn consolidate(&mut self, factor: f32, synapses: &mut [Synapse]) {
        self.strength = (self.strength + factor).min(1.0);
        let nudge = factor * 0.5;
        for s in synapses.iter_mut().filter(|s| self.synapses.contains(&s.id)) {
            s.nudge_weight(nudge);
        }
    }

    /// Weaken the trace. A weak engram also weakens its synapses, but only
    /// down to [`DEGRADE_WEIGHT_FLOOR`]; synapses already below it are left alone.
    pub fn degrade(&mut self, factor: f32, synapses: &mut [Synapse]) {
        self.strength = (self.strength - factor).max(0.0);
        if self.strength >= WEAK_STRENGTH {
            return;
        }
        let nudge = factor * 0.3;
        for s in synapses.iter_mut().filter(|s| self.synapses.contains(&s.id)) {
            if s.weight > DEGRADE_WEIGHT_FLOOR {
                s.set_weight((s.weight - nudge).max(DEGRADE_WEIGHT_FLOOR));
            }
        }
    }

    /// Fraction of member neurons currently active. Empty engrams read 0.
    pub fn active_fraction(&self, neurons: &[Neuron]) -> f32 {
        if self.neurons.is_empty() {
            return 0.0;
        }
        let active = self
            .neurons
            .iter()
            .filter(|&&id| neurons.get(id).is_some_and(|n| n.is_active()))
            .count();
        active as f32 / self.neurons.len() as f32
    }

    pub fn is_active(&self, neurons: &[Neuron], threshold: Option<f32>) -> bool {
        if self.neurons.is_empty() {
            return false;
        }
        let threshold = threshold.unwrap_or(DEFAULT_ACTIVATION_THRESHOLD);
        self.active_fraction(neurons) >= threshold
    }

    /// Facilitate the inactive members of a partially active engram.
    ///
    /// Returns the number of neurons facilitated (0 when the engram is not active).
    pub fn complete_pattern(
        &mut self,
        now: Tick,
        neurons: &mut [Neuron],
        threshold: Option<f32>,
    ) -> usize {
        if !self.is_active(neurons, threshold) {
            return 0;
        }
        self.last_activation = now;
        let mut facilitated = 0;
        for &id in &self.neurons {
            if let Some(n) = neurons.get_mut(id) {
                if !n.is_active() {
                    n.facilitate_activation(self.strength);
                    facilitated += 1;
                }
            }
        }
        facilitated
    }

    /// Explicit recall: facilitate every member, active or not.
    pub fn activate(&mut self, now: Tick, neurons: &mut [Neuron]) {
        self.last_activation = now;
        self.activation_count = self.activation_count.saturating_add(1);
        for &id in &self.neurons {
            if let Some(n) = neurons.get_mut(id) {
                n.facilitate_activation(self.strength);
            }
        }
    }

    /// Fraction of `candidates` that are members. Empty candidates read 0.
    pub fn overlap(&self, candidates: &BTreeSet<NeuronId>) -> f32 {
        if candidates.is_empty() {
            return 0.0;
        }
        let shared = candidates.intersection(&self.neurons).count();
        shared as f32 / candidates.len() as f32
    }

    pub fn contains_neurons(&self, candidates: &BTreeSet<NeuronId>, overlap_threshold: f32) -> bool {
        !candidates.is_empty() && self.overlap(candidates) >= overlap_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuron::NeuronRole;
    use crate::synapse::{Direction, SynapseKind, Targets};

    fn neurons(n: usize) -> Vec<Neuron> {
        (0..n).map(|i| Neuron::new(i, NeuronRole::Inter)).collect()
    }

    fn synapse(id: u32, weight: f32) -> Synapse {
        Synapse::new(
            SynapseId(id),
            0,
            Targets::single(1),
            weight,
            SynapseKind::Chemical,
            Direction::Forward,
        )
    }

    #[test]
    fn membership_is_idempotent() {
        let mut e = Engram::new("e", 0);
        assert!(e.add_neuron(1));
        assert!(!e.add_neuron(1));
        assert!(e.add_connection(SynapseId(4)));
        assert!(!e.add_connection(SynapseId(4)));
        assert_eq!(e.neurons().len(), 1);
        assert_eq!(e.synapses().len(), 1);
    }

    #[test]
    fn two_of_three_layer_neurons_active_with_one() {
        let mut layer = neurons(3);
        let mut e = Engram::new("pair", 0);
        e.add_neuron(0);
        e.add_neuron(1);

        assert!(!e.is_active(&layer, None));
        layer[1].activate(1);
        assert!(e.is_active(&layer, None));
        assert!(!e.is_active(&layer, Some(0.6)));
    }

    #[test]
    fn consolidate_and_degrade_clamp() {
        let mut syns = vec![synapse(0, 0.5), synapse(1, 0.5)];
        let mut e = Engram::new("e", 0);
        e.add_connection(SynapseId(0));

        e.consolidate(0.8, &mut syns);
        assert_eq!(e.strength(), 1.0);
        assert!((syns[0].weight() - 0.9).abs() < 1e-6);
        assert_eq!(syns[1].weight(), 0.5);

        for _ in 0..50 {
            e.degrade(0.3, &mut syns);
        }
        assert_eq!(e.strength(), 0.0);
        assert!((syns[0].weight() - DEGRADE_WEIGHT_FLOOR).abs() < 1e-6);
    }

    #[test]
    fn degrade_leaves_weights_alone_while_strong() {
        let mut syns = vec![synapse(0, 0.6)];
        let mut e = Engram::new("e", 0);
        e.add_connection(SynapseId(0));
        e.degrade(0.1, &mut syns);
        assert!((e.strength() - 0.4).abs() < 1e-6);
        assert_eq!(syns[0].weight(), 0.6);
    }

    #[test]
    fn degrade_never_raises_low_weights() {
        let mut syns = vec![synapse(0, 0.05), synapse(1, -0.4)];
        let mut e = Engram::new("e", 0);
        e.add_connection(SynapseId(0));
        e.add_connection(SynapseId(1));
        e.strength = 0.1;
        e.degrade(0.2, &mut syns);
        assert_eq!(syns[0].weight(), 0.05);
        assert_eq!(syns[1].weight(), -0.4);
    }

    #[test]
    fn complete_pattern_facilitates_only_inactive_members() {
        let mut ns = neurons(4);
        let mut e = Engram::new("e", 0);
        for i in 0..3 {
            e.add_neuron(i);
        }

        // Not active yet: no-op.
        assert_eq!(e.complete_pattern(5, &mut ns, None), 0);
        assert_eq!(e.last_activation(), 0);

        ns[0].activate(5);
        assert_eq!(e.complete_pattern(6, &mut ns, None), 2);
        assert_eq!(e.last_activation(), 6);
        assert_eq!(ns[0].facilitation(), 0.0);
        assert!(ns[1].facilitation() > 0.0);
        assert_eq!(ns[3].facilitation(), 0.0);
        assert_eq!(e.activation_count(), 0);
    }

    #[test]
    fn activate_facilitates_all_members() {
        let mut ns = neurons(3);
        ns[0].activate(1);
        let mut e = Engram::new("e", 0);
        e.add_neuron(0);
        e.add_neuron(2);
        e.activate(9, &mut ns);
        assert_eq!(e.activation_count(), 1);
        assert_eq!(e.last_activation(), 9);
        assert!((ns[0].facilitation() - INITIAL_STRENGTH * 0.3).abs() < 1e-6);
        assert!(ns[2].facilitation() > 0.0);
        assert_eq!(ns[1].facilitation(), 0.0);
    }

    #[test]
    fn overlap_is_measured_against_candidates() {
        let mut e = Engram::new("e", 0);
        for i in [1, 2, 3] {
            e.add_neuron(i);
        }
        let cands: BTreeSet<NeuronId> = [2, 3, 7, 8].into_iter().collect();
        assert!((e.overlap(&cands) - 0.5).abs() < 1e-6);
        assert!(e.contains_neurons(&cands, 0.5));
        assert!(!e.contains_neurons(&cands, 0.6));
        assert!(!e.contains_neurons(&BTreeSet::new(), 0.0));
    }
}
