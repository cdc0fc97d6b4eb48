//! Resource competition and pruning.
//!
//! Elements that fired recently gain resources, silent ones lose them. A
//! synapse drained far enough is pruned. Neurons are only flagged through
//! [`Neuron::should_be_removed`]: the arena never shrinks, so exhausted
//! neurons stay in place and simply stop mattering.

use crate::neuron::{Neuron, Tick};
use crate::synapse::{Synapse, SynapseId};

const NEURON_GAIN: f32 = 0.03;
const NEURON_LOSS: f32 = 0.02;
const SYNAPSE_GAIN: f32 = 0.025;
const SYNAPSE_LOSS: f32 = 0.03;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompetitionReport {
    pub neurons_rewarded: usize,
    pub neurons_starved: usize,
    pub synapses_rewarded: usize,
    pub synapses_starved: usize,
    /// Neurons now flagged by `should_be_removed` (never excised).
    pub removal_candidates: usize,
    /// Synapses removed by the pruning pass that followed, if any.
    pub pruned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompetitionManager {
    active: bool,
    window: Tick,
    disuse_window: Tick,
}

impl CompetitionManager {
    pub fn new(window: Tick, disuse_window: Tick) -> Self {
        Self {
            active: false,
            window,
            disuse_window,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, on: bool) {
        self.active = on;
    }

    pub fn window(&self) -> Tick {
        self.window
    }

    /// One round of resource reallocation over every neuron and synapse.
    pub fn compete(
        &self,
        neurons: &mut [Neuron],
        synapses: &mut [Synapse],
        now: Tick,
    ) -> CompetitionReport {
        let mut report = CompetitionReport::default();

        for n in neurons.iter_mut() {
            let used =
                n.activation_count > 0 && now.saturating_sub(n.last_activation) <= self.window;
            if used {
                n.set_resources(n.resources + NEURON_GAIN);
                report.neurons_rewarded += 1;
            } else {
                n.set_resources(n.resources - NEURON_LOSS);
                n.degrade_from_disuse(now, self.disuse_window);
                report.neurons_starved += 1;
            }
            if n.should_be_removed() {
                report.removal_candidates += 1;
            }
        }

        for s in synapses.iter_mut() {
            let used =
                s.co_activation_count > 0 && now.saturating_sub(s.last_activation) <= self.window;
            if used {
                s.set_resources(s.resources + SYNAPSE_GAIN);
                report.synapses_rewarded += 1;
            } else {
                s.set_resources(s.resources - SYNAPSE_LOSS);
                report.synapses_starved += 1;
            }
        }

        report
    }

    /// Remove every synapse that `should_be_pruned`, keeping order.
    ///
    /// Returns the ids removed so callers can drop dangling references.
    pub fn prune_elements(&self, synapses: &mut Vec<Synapse>) -> Vec<SynapseId> {
        let mut removed = Vec::new();
        synapses.retain(|s| {
            if s.should_be_pruned() {
                removed.push(s.id);
                false
            } else {
                true
            }
        });
        removed
    }
}
