//! Synapses: one presynaptic neuron, one to three postsynaptic neurons, one weight.
//!
//! Dyadic and triadic synapses share a single weight and a single
//! reinforcement history, so they are one object with a small fixed-capacity
//! target list rather than several one-to-one links.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::neuron::{Neuron, NeuronId, Tick};

/// Maximum number of postsynaptic targets (triadic).
pub const MAX_TARGETS: usize = 3;

pub const DEFAULT_REINFORCEMENT_RATE: f32 = 0.02;
pub const INITIAL_RESOURCES: f32 = 0.5;

const LTP_RESOURCE_GAIN: f32 = 0.005;
const LTD_RESOURCE_LOSS: f32 = 0.01;
const PRUNE_WEIGHT_BELOW: f32 = 0.05;
const PRUNE_RESOURCES_BELOW: f32 = 0.1;

/// Stable synapse identity. Never reused, so it survives pruning and reindexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SynapseId(pub u32);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SynapseKind {
    #[default]
    Chemical,
    Electric,
}

impl SynapseKind {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            SynapseKind::Chemical => 0,
            SynapseKind::Electric => 1,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(SynapseKind::Chemical),
            1 => Some(SynapseKind::Electric),
            _ => None,
        }
    }
}

/// Which pass a synapse takes part in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    /// Layer `l` to layer `l + 1`; carries spikes.
    #[default]
    Forward,
    /// Motor to last inter layer, inter `i` to inter `i - 1`; corrects stored values.
    Feedback,
}

impl Direction {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Direction::Forward => 0,
            Direction::Feedback => 1,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Direction::Forward),
            1 => Some(Direction::Feedback),
            _ => None,
        }
    }
}

/// Non-empty postsynaptic target list of at most [`MAX_TARGETS`] neurons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Targets {
    ids: [NeuronId; MAX_TARGETS],
    len: u8,
}

impl Targets {
    /// Returns `None` for an empty slice or more than [`MAX_TARGETS`] ids.
    pub fn from_slice(ids: &[NeuronId]) -> Option<Self> {
        if ids.is_empty() || ids.len() > MAX_TARGETS {
            return None;
        }
        let mut out = [0; MAX_TARGETS];
        out[..ids.len()].copy_from_slice(ids);
        Some(Self {
            ids: out,
            len: ids.len() as u8,
        })
    }

    pub fn single(id: NeuronId) -> Self {
        Self {
            ids: [id, 0, 0],
            len: 1,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[NeuronId] {
        &self.ids[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// A synapse always has at least one target.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, id: NeuronId) -> bool {
        self.as_slice().contains(&id)
    }
}

/// Outcome of one Hebbian update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plasticity {
    Potentiated,
    Depressed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synapse {
    pub(crate) id: SynapseId,
    pub(crate) direction: Direction,
    pub(crate) kind: SynapseKind,
    pub(crate) pre: NeuronId,
    pub(crate) targets: Targets,

    // Sign encodes excitation/inhibition.
    pub(crate) weight: f32,
    pub(crate) resources: f32,
    pub(crate) last_activation: Tick,
    pub(crate) co_activation_count: u64,
    pub(crate) reinforcement_rate: f32,
}

impl Synapse {
    pub fn new(
        id: SynapseId,
        pre: NeuronId,
        targets: Targets,
        weight: f32,
        kind: SynapseKind,
        direction: Direction,
    ) -> Self {
        Self {
            id,
            direction,
            kind,
            pre,
            targets,
            weight: weight.clamp(-1.0, 1.0),
            resources: INITIAL_RESOURCES,
            last_activation: 0,
            co_activation_count: 0,
            reinforcement_rate: DEFAULT_REINFORCEMENT_RATE,
        }
    }

    pub fn with_reinforcement_rate(mut self, rate: f32) -> Self {
        self.reinforcement_rate = rate;
        self
    }

    pub fn id(&self) -> SynapseId {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> SynapseKind {
        self.kind
    }

    pub fn pre(&self) -> NeuronId {
        self.pre
    }

    pub fn targets(&self) -> &[NeuronId] {
        self.targets.as_slice()
    }

    pub fn feeds(&self, neuron: NeuronId) -> bool {
        self.targets.contains(neuron)
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(-1.0, 1.0);
    }

    pub fn nudge_weight(&mut self, delta: f32) {
        self.set_weight(self.weight + delta);
    }

    pub fn resources(&self) -> f32 {
        self.resources
    }

    pub fn set_resources(&mut self, value: f32) {
        self.resources = value.clamp(0.0, 1.0);
    }

    pub fn last_activation(&self) -> Tick {
        self.last_activation
    }

    pub fn co_activation_count(&self) -> u64 {
        self.co_activation_count
    }

    pub fn reinforcement_rate(&self) -> f32 {
        self.reinforcement_rate
    }

    pub fn is_inhibitory(&self) -> bool {
        self.weight < 0.0
    }

    /// Local Hebbian rule.
    ///
    /// Co-activation potentiates (LTP). A synapse silent for longer than
    /// `window` depresses (LTD) by half its reinforcement rate, floored at
    /// zero, so a silent inhibitory synapse is cleared outright. Only the
    /// error-modulated rule in [`crate::hebbian`] pushes weights negative.
    pub fn apply_hebbian_plasticity(
        &mut self,
        neurons: &[Neuron],
        now: Tick,
        window: Tick,
    ) -> Plasticity {
        let pre_active = neurons.get(self.pre).is_some_and(|n| n.is_active());
        let post_active = self
            .targets()
            .iter()
            .any(|&t| neurons.get(t).is_some_and(|n| n.is_active()));

        if pre_active && post_active {
            self.weight = (self.weight + self.reinforcement_rate).min(1.0);
            self.co_activation_count = self.co_activation_count.saturating_add(1);
            self.last_activation = now;
            self.set_resources(self.resources + LTP_RESOURCE_GAIN);
            return Plasticity::Potentiated;
        }

        if now.saturating_sub(self.last_activation) > window {
            self.weight = (self.weight - self.reinforcement_rate * 0.5).max(0.0);
            self.set_resources(self.resources - LTD_RESOURCE_LOSS);
            return Plasticity::Depressed;
        }

        Plasticity::Unchanged
    }

    pub fn should_be_pruned(&self) -> bool {
        self.weight.abs() <= PRUNE_WEIGHT_BELOW || self.resources <= PRUNE_RESOURCES_BELOW
    }
}
