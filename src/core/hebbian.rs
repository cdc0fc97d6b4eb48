//! Hebbian training: the unsupervised co-activation rule over every synapse,
//! plus the error-modulated (weakly supervised) step used by `train`.

use crate::layout::Layout;
use crate::neuron::{Neuron, Tick};
use crate::synapse::{Direction, Plasticity, Synapse};

pub const DEFAULT_WINDOW: Tick = 100;
pub const DEFAULT_LEARNING_RATE: f32 = 0.5;

const MOTOR_WEIGHT_SCALE: f32 = 0.8;
const HIDDEN_VALUE_SCALE: f32 = 0.5;
const HIDDEN_WEIGHT_SCALE: f32 = 0.6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlasticityStats {
    pub potentiated: usize,
    pub depressed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModulationStats {
    /// Sum of |error| over the motor layer.
    pub error_l1: f32,
    /// Synapse weight updates into the motor layer.
    pub motor_weight_updates: usize,
    /// Synapse weight updates into the last inter layer.
    pub hidden_weight_updates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HebbianTrainer {
    window: Tick,
    learning_rate: f32,
}

impl Default for HebbianTrainer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_LEARNING_RATE)
    }
}

impl HebbianTrainer {
    pub fn new(window: Tick, learning_rate: f32) -> Self {
        Self {
            window,
            learning_rate,
        }
    }

    pub fn window(&self) -> Tick {
        self.window
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Run the local Hebbian rule on every synapse.
    pub fn apply_global_plasticity(
        &self,
        neurons: &[Neuron],
        synapses: &mut [Synapse],
        now: Tick,
    ) -> PlasticityStats {
        let mut stats = PlasticityStats::default();
        for s in synapses.iter_mut() {
            match s.apply_hebbian_plasticity(neurons, now, self.window) {
                Plasticity::Potentiated => stats.potentiated += 1,
                Plasticity::Depressed => stats.depressed += 1,
                Plasticity::Unchanged => {}
            }
        }
        stats
    }

    /// Error-modulated update. `errors[i]` is `target[i] - output[i]` for motor neuron `i`.
    ///
    /// Motor stored values always move toward the target. Synapses from an
    /// active neuron into an active motor neuron move by the error, which is
    /// the only rule allowed to turn a synapse inhibitory. The error is then
    /// carried one layer back, weighted by the outgoing synapses, and applied
    /// damped to active neurons of the last inter layer.
    pub fn modulate_by_error(
        &self,
        neurons: &mut [Neuron],
        synapses: &mut [Synapse],
        layout: &Layout,
        errors: &[f32],
    ) -> ModulationStats {
        let lr = self.learning_rate;
        let motor = layout.motor();
        let motor_error = |id: usize| -> Option<f32> {
            if motor.contains(&id) {
                errors.get(id - motor.start).copied()
            } else {
                None
            }
        };

        // Back-projected error per neuron, computed on the pre-update weights.
        let mut hidden_error: Vec<Option<f32>> = vec![None; neurons.len()];
        if let Some(last) = layout.last_inter() {
            let mut sums = vec![(0.0f32, 0u32); last.len()];
            for s in synapses.iter().filter(|s| s.direction == Direction::Forward) {
                if !last.contains(&s.pre) {
                    continue;
                }
                for &t in s.targets() {
                    if let Some(e) = motor_error(t) {
                        let slot = &mut sums[s.pre - last.start];
                        slot.0 += s.weight * e;
                        slot.1 += 1;
                    }
                }
            }
            for (offset, (sum, count)) in sums.into_iter().enumerate() {
                if count > 0 {
                    hidden_error[last.start + offset] = Some(sum / count as f32);
                }
            }
        }

        let mut stats = ModulationStats {
            error_l1: errors.iter().map(|e| e.abs()).sum(),
            ..Default::default()
        };

        for (i, id) in motor.clone().enumerate() {
            if let Some(&e) = errors.get(i) {
                neurons[id].nudge_stored_value(e * lr);
            }
        }

        for s in synapses
            .iter_mut()
            .filter(|s| s.direction == Direction::Forward)
        {
            if !neurons[s.pre].is_active() {
                continue;
            }
            let targets = s.targets;
            for &t in targets.as_slice() {
                if !neurons[t].is_active() {
                    continue;
                }
                if let Some(e) = motor_error(t) {
                    s.nudge_weight(e * lr * MOTOR_WEIGHT_SCALE);
                    stats.motor_weight_updates += 1;
                } else if let Some(e) = hidden_error[t] {
                    s.nudge_weight(e * lr * HIDDEN_WEIGHT_SCALE);
                    stats.hidden_weight_updates += 1;
                }
            }
        }

        for (id, e) in hidden_error.iter().enumerate() {
            if let Some(e) = *e {
                if neurons[id].is_active() {
                    neurons[id].nudge_stored_value(e * lr * HIDDEN_VALUE_SCALE);
                }
            }
        }

        stats
    }
}
