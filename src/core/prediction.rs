//! Lightweight predictive coding.
//!
//! Each layer keeps a forecast of its activation. Forecasts are compared
//! against what actually happened on the motor layer and every forecast is
//! pulled toward reality. The forward signal itself is never gated by the
//! forecast: errors are observable, not transmitted.

use crate::layout::Layout;
use crate::neuron::Neuron;
use crate::prng::Prng;
use crate::synapse::{Direction, Synapse};

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionManager {
    active: bool,
    rate: f32,
    noise: f32,
    // One vector per layer, sensory first.
    predictions: Vec<Vec<f32>>,
    last_errors: Vec<f32>,
}

impl PredictionManager {
    pub fn new(layout: &Layout, rate: f32, noise: f32) -> Self {
        Self {
            active: false,
            rate,
            noise,
            predictions: layout.layers().map(|r| vec![0.0; r.len()]).collect(),
            last_errors: vec![0.0; layout.motor_len()],
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Toggle. Turning on reseeds every forecast with small noise.
    pub fn activate(&mut self, on: bool, rng: &mut Prng) {
        self.active = on;
        if !on {
            return;
        }
        let amp = self.noise;
        for layer in &mut self.predictions {
            for p in layer.iter_mut() {
                *p = rng.gen_range_f32(-amp, amp);
            }
        }
    }

    pub fn predictions(&self) -> &[Vec<f32>] {
        &self.predictions
    }

    /// Motor-layer errors from the last [`Self::calculate_prediction_errors`].
    pub fn last_errors(&self) -> &[f32] {
        &self.last_errors
    }

    pub(crate) fn restore(&mut self, active: bool, predictions: Vec<Vec<f32>>, last_errors: Vec<f32>) {
        self.active = active;
        self.predictions = predictions;
        self.last_errors = last_errors;
    }

    /// Forecast every non-sensory neuron from the currently active inputs.
    ///
    /// The forecast is the mean of `weight * normalized presynaptic potential`
    /// over active incoming forward synapses, or 0 with no active input.
    pub fn calculate_predictions(
        &mut self,
        neurons: &[Neuron],
        synapses: &[Synapse],
        layout: &Layout,
    ) {
        let mut sum = vec![0.0f32; neurons.len()];
        let mut count = vec![0u32; neurons.len()];
        for s in synapses.iter().filter(|s| s.direction == Direction::Forward) {
            let pre = &neurons[s.pre];
            if !pre.is_active() {
                continue;
            }
            let v = s.weight * pre.potential().normalized();
            for &t in s.targets() {
                sum[t] += v;
                count[t] += 1;
            }
        }

        for (layer, range) in self.predictions.iter_mut().zip(layout.layers()).skip(1) {
            for (slot, id) in layer.iter_mut().zip(range) {
                *slot = if count[id] > 0 {
                    (sum[id] / count[id] as f32).clamp(-1.0, 1.0)
                } else {
                    0.0
                };
            }
        }
    }

    /// `actual - predicted` for every motor neuron.
    pub fn calculate_prediction_errors(&mut self, neurons: &[Neuron], layout: &Layout) -> &[f32] {
        if let Some(motor_pred) = self.predictions.last() {
            self.last_errors.clear();
            self.last_errors.extend(
                layout
                    .motor()
                    .zip(motor_pred)
                    .map(|(id, &p)| neurons[id].output() - p),
            );
        }
        &self.last_errors
    }

    /// Pull every forecast toward the actual activation.
    pub fn adjust_predictive_model(&mut self, neurons: &[Neuron], layout: &Layout) {
        let rate = self.rate;
        for (layer, range) in self.predictions.iter_mut().zip(layout.layers()) {
            for (p, id) in layer.iter_mut().zip(range) {
                let actual = neurons[id].output();
                *p = (*p + rate * (actual - *p)).clamp(-1.0, 1.0);
            }
        }
    }

    /// Mean |error| over the motor layer.
    pub fn mean_abs_error(&self) -> f32 {
        if self.last_errors.is_empty() {
            return 0.0;
        }
        self.last_errors.iter().map(|e| e.abs()).sum::<f32>() / self.last_errors.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synapse::{SynapseId, SynapseKind, Targets};

    fn setup() -> (Vec<Neuron>, Vec<Synapse>, Layout) {
        let layout = Layout::from_topology(&[2, 1]).unwrap();
        let neurons = (0..3)
            .map(|i| Neuron::new(i, layout.role_of(i).unwrap()))
            .collect();
        let synapses = vec![
            Synapse::new(
                SynapseId(0),
                0,
                Targets::single(2),
                0.8,
                SynapseKind::Chemical,
                Direction::Forward,
            ),
            Synapse::new(
                SynapseId(1),
                1,
                Targets::single(2),
                0.4,
                SynapseKind::Chemical,
                Direction::Forward,
            ),
        ];
        (neurons, synapses, layout)
    }

    #[test]
    fn activation_seeds_noise() {
        let (_, _, layout) = setup();
        let mut pm = PredictionManager::new(&layout, 0.15, 0.05);
        assert!(pm.predictions().iter().flatten().all(|&p| p == 0.0));

        pm.activate(true, &mut Prng::new(3));
        assert!(pm.is_active());
        assert!(pm.predictions().iter().flatten().all(|p| p.abs() <= 0.05));
        assert!(pm.predictions().iter().flatten().any(|&p| p != 0.0));
    }

    #[test]
    fn prediction_is_mean_of_active_inputs() {
        let (mut ns, syns, layout) = setup();
        let mut pm = PredictionManager::new(&layout, 0.15, 0.05);

        ns[0].activate(1);
        ns[1].activate(1);
        pm.calculate_predictions(&ns, &syns, &layout);
        assert!((pm.predictions()[1][0] - 0.6).abs() < 1e-6);

        ns[1].reset_transient();
        pm.calculate_predictions(&ns, &syns, &layout);
        assert!((pm.predictions()[1][0] - 0.8).abs() < 1e-6);

        ns[0].reset_transient();
        pm.calculate_predictions(&ns, &syns, &layout);
        assert_eq!(pm.predictions()[1][0], 0.0);
    }

    #[test]
    fn errors_and_adjustment() {
        let (mut ns, syns, layout) = setup();
        let mut pm = PredictionManager::new(&layout, 0.15, 0.05);
        ns[0].activate(1);
        pm.calculate_predictions(&ns, &syns, &layout);

        ns[2].activate(1);
        let errs = pm.calculate_prediction_errors(&ns, &layout).to_vec();
        assert!((errs[0] - 0.2).abs() < 1e-6);
        assert!((pm.mean_abs_error() - 0.2).abs() < 1e-6);

        pm.adjust_predictive_model(&ns, &layout);
        // 0.8 + 0.15 * (1.0 - 0.8)
        assert!((pm.predictions()[1][0] - 0.83).abs() < 1e-6);
        // Sensory forecast drifts toward the active input too.
        assert!((pm.predictions()[0][0] - 0.15).abs() < 1e-6);
    }
}
