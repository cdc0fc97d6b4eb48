//! Signal propagation: input injection, one forward pass, one feedback pass,
//! output read-out.
//!
//! The forward pass is a single synchronous sweep: every forward synapse whose
//! presynaptic neuron is active delivers into its targets' accumulators, then
//! every non-sensory neuron is evaluated once. Activity therefore advances one
//! layer per call, and transient activity carries over between calls until
//! [`crate::network::Network::reset_transient`] clears it.

use crate::layout::Layout;
use crate::neuron::{Neuron, Tick};
use crate::synapse::{Direction, Synapse};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    /// Synapses that carried a signal this pass.
    pub transmitting: usize,
    /// Non-sensory neurons that fired.
    pub fired: usize,
}

/// Drive the sensory layer directly from `input`.
///
/// Each sensory neuron stores its input value; it fires when
/// `|input| > activation_threshold` and is otherwise reset.
pub fn establish_inputs(
    neurons: &mut [Neuron],
    layout: &Layout,
    input: &[f32],
    activation_threshold: f32,
    now: Tick,
) {
    for (id, &x) in layout.sensory().zip(input) {
        let n = &mut neurons[id];
        n.set_stored_value(x);
        if x.abs() > activation_threshold {
            n.activate(now);
        } else {
            n.reset_transient();
        }
    }
}

pub fn propagate_forward(
    neurons: &mut [Neuron],
    synapses: &[Synapse],
    layout: &Layout,
    base_threshold: f32,
    now: Tick,
) -> ForwardStats {
    let mut stats = ForwardStats::default();

    for s in synapses.iter().filter(|s| s.direction == Direction::Forward) {
        let pre = &neurons[s.pre];
        if !pre.is_active() {
            continue;
        }
        let signal = pre.signal_through(s.weight);
        for &t in s.targets() {
            neurons[t].receive_signal(signal);
        }
        stats.transmitting += 1;
    }

    for id in layout.non_sensory() {
        if neurons[id].evaluate_activation(base_threshold, now) {
            stats.fired += 1;
        }
    }

    stats
}

/// Slow belief correction: feedback synapses from active neurons nudge their
/// targets' stored values. Never triggers spikes.
///
/// Returns the number of synapses that applied a correction.
pub fn propagate_feedback(neurons: &mut [Neuron], synapses: &[Synapse], gain: f32) -> usize {
    let mut applied = 0;
    for s in synapses.iter().filter(|s| s.direction == Direction::Feedback) {
        let pre = &neurons[s.pre];
        if !pre.is_active() {
            continue;
        }
        let delta = pre.signal_through(s.weight) * gain;
        for &t in s.targets() {
            neurons[t].nudge_stored_value(delta);
        }
        applied += 1;
    }
    applied
}

/// Motor read-out.
///
/// Active motor neurons report their normalized potential in [0, 1]; silent
/// ones report their stored value in [-1, 1]. Outputs are not uniformly scaled.
pub fn extract_outputs(neurons: &[Neuron], layout: &Layout) -> Vec<f32> {
    layout.motor().map(|id| neurons[id].output()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuron::{NeuronRole, Potential};
    use crate::synapse::{SynapseId, SynapseKind, Targets};

    fn chain() -> (Vec<Neuron>, Layout) {
        // 1 sensory -> 1 inter -> 1 motor
        let layout = Layout::from_topology(&[1, 1, 1]).unwrap();
        let neurons = vec![
            Neuron::new(0, NeuronRole::Sensory),
            Neuron::new(1, NeuronRole::Inter),
            Neuron::new(2, NeuronRole::Motor),
        ];
        (neurons, layout)
    }

    fn link(id: u32, pre: usize, post: usize, w: f32, dir: Direction) -> Synapse {
        Synapse::new(
            SynapseId(id),
            pre,
            Targets::single(post),
            w,
            SynapseKind::Chemical,
            dir,
        )
    }

    #[test]
    fn inputs_below_cutoff_do_not_fire() {
        let (mut ns, layout) = chain();
        establish_inputs(&mut ns, &layout, &[0.05], 0.1, 1);
        assert!(!ns[0].is_active());
        assert_eq!(ns[0].stored_value(), 0.05);

        establish_inputs(&mut ns, &layout, &[-0.8], 0.1, 2);
        assert!(ns[0].is_active());
        assert_eq!(ns[0].stored_value(), -0.8);
    }

    #[test]
    fn activity_advances_one_layer_per_pass() {
        let (mut ns, layout) = chain();
        let syns = vec![
            link(0, 0, 1, 0.9, Direction::Forward),
            link(1, 1, 2, 0.9, Direction::Forward),
        ];
        establish_inputs(&mut ns, &layout, &[1.0], 0.1, 1);

        let st = propagate_forward(&mut ns, &syns, &layout, 0.5, 1);
        assert_eq!(st.transmitting, 1);
        assert!(ns[1].is_active());
        assert!(!ns[2].is_active());

        let st = propagate_forward(&mut ns, &syns, &layout, 0.5, 2);
        assert_eq!(st.transmitting, 2);
        assert!(ns[2].is_active());
        assert_eq!(extract_outputs(&ns, &layout), vec![1.0]);
    }

    #[test]
    fn sensory_layer_is_never_re_evaluated() {
        let (mut ns, layout) = chain();
        establish_inputs(&mut ns, &layout, &[1.0], 0.1, 1);
        propagate_forward(&mut ns, &[], &layout, 0.5, 1);
        assert!(ns[0].is_active());
        assert_eq!(ns[0].potential(), Potential::Spike);
    }

    #[test]
    fn feedback_only_nudges_stored_values() {
        let (mut ns, layout) = chain();
        let syns = vec![
            link(0, 2, 1, 0.5, Direction::Feedback),
            link(1, 0, 1, 0.9, Direction::Feedback),
        ];
        ns[2].activate(1);
        let applied = propagate_feedback(&mut ns, &syns, 0.1);
        assert_eq!(applied, 1);
        assert!((ns[1].stored_value() - 0.05).abs() < 1e-6);
        assert!(!ns[1].is_active());

        // Forward pass ignores feedback synapses.
        let st = propagate_forward(&mut ns, &syns, &layout, 0.5, 2);
        assert_eq!(st.transmitting, 0);
    }

    #[test]
    fn silent_motor_reports_stored_value() {
        let (mut ns, layout) = chain();
        ns[2].set_stored_value(-0.25);
        assert_eq!(extract_outputs(&ns, &layout), vec![-0.25]);
    }
}
