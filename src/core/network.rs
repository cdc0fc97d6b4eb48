//! The orchestrator: owns every neuron and synapse, the global clock and the
//! ACTIVE/CONSOLIDATING state machine, and drives the managers on each call.

use std::collections::BTreeSet;
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::competition::{CompetitionManager, CompetitionReport};
use crate::config::NetworkConfig;
use crate::engram::Engram;
use crate::engram_manager::{ConsolidationReport, EngramManager};
use crate::error::{NetworkError, Result};
use crate::hebbian::HebbianTrainer;
use crate::layout::Layout;
use crate::neuron::{Neuron, NeuronId, Tick};
use crate::prediction::PredictionManager;
use crate::prng::Prng;
use crate::propagation;
use crate::synapse::{Direction, Synapse, SynapseId, SynapseKind, Targets, MAX_TARGETS};

/// Clock advance per `train` iteration.
pub const TRAIN_TICKS_PER_ITERATION: Tick = 10;

const CONSOLIDATION_BOOST: f32 = 1.05;
const CONSOLIDATION_DECAY: f32 = 0.98;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NetworkState {
    #[default]
    Active,
    Consolidating,
}

impl NetworkState {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            NetworkState::Active => 0,
            NetworkState::Consolidating => 1,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(NetworkState::Active),
            1 => Some(NetworkState::Consolidating),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostics {
    pub neuron_count: usize,
    pub synapse_count: usize,
    pub active_neurons: usize,
    pub mean_abs_weight: f32,
    pub inhibitory_synapses: usize,
    pub engram_count: usize,
    pub removal_candidates: usize,
    pub pruned_last_round: usize,
}

/// Mean absolute motor error of the first and last `train` iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrainReport {
    pub iterations: usize,
    pub initial_error: f32,
    pub final_error: f32,
}

impl TrainReport {
    pub fn improved(&self) -> bool {
        self.final_error <= self.initial_error
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationSummary {
    pub engrams: ConsolidationReport,
    pub synapses_boosted: usize,
    pub synapses_weakened: usize,
}

#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) cfg: NetworkConfig,
    pub(crate) layout: Layout,
    pub(crate) density: f32,

    pub(crate) neurons: Vec<Neuron>,
    pub(crate) synapses: Vec<Synapse>,

    pub(crate) clock: Tick,
    pub(crate) state: NetworkState,
    pub(crate) rng: Prng,

    pub(crate) hebbian: HebbianTrainer,
    pub(crate) competition: CompetitionManager,
    pub(crate) engrams: EngramManager,
    pub(crate) prediction: PredictionManager,

    pub(crate) pruned_last_round: usize,
    /// Tick of the most recent competition round.
    pub(crate) last_competition: Tick,
}

impl Network {
    /// Build a randomly wired network with default tunables.
    pub fn new(topology: &[usize], density: f32) -> Result<Self> {
        Self::with_config(topology, density, NetworkConfig::default())
    }

    pub fn with_config(topology: &[usize], density: f32, cfg: NetworkConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&density) {
            return Err(NetworkError::InvalidArgument(format!(
                "connection density must be in [0, 1], got {density}"
            )));
        }
        let layout = Layout::from_topology(topology)
            .map_err(|e| NetworkError::InvalidArgument(e.to_string()))?;
        cfg.validate()
            .map_err(|e| NetworkError::InvalidArgument(e.to_string()))?;

        let mut rng = Prng::new(cfg.effective_seed());
        let mut neurons: Vec<Neuron> = (0..layout.neuron_count())
            .filter_map(|id| layout.role_of(id).map(|role| Neuron::new(id, role)))
            .collect();
        let synapses = wire(&layout, density, &cfg, &mut rng);
        rebuild_neighbors(&mut neurons, &synapses);

        let mut engrams = EngramManager::new(&cfg);
        engrams.set_detection_active(cfg.engram_detection);
        let mut competition = CompetitionManager::new(cfg.competition_window, cfg.disuse_window);
        competition.set_active(cfg.resource_competition);
        let mut prediction = PredictionManager::new(&layout, cfg.prediction_rate, cfg.prediction_noise);
        if cfg.predictive_mode {
            prediction.activate(true, &mut rng);
        }

        tracing::debug!(
            ?topology,
            density,
            neurons = neurons.len(),
            synapses = synapses.len(),
            "network wired"
        );

        Ok(Self {
            hebbian: HebbianTrainer::new(cfg.hebbian_window, cfg.learning_rate),
            cfg,
            layout,
            density,
            neurons,
            synapses,
            clock: 0,
            state: NetworkState::Active,
            rng,
            competition,
            engrams,
            prediction,
            pruned_last_round: 0,
            last_competition: 0,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.cfg
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn topology(&self) -> &[usize] {
        self.layout.topology()
    }

    pub fn density(&self) -> f32 {
        self.density
    }

    pub fn clock(&self) -> Tick {
        self.clock
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    pub fn neuron(&self, id: NeuronId) -> Option<&Neuron> {
        self.neurons.get(id)
    }

    pub fn synapses(&self) -> &[Synapse] {
        &self.synapses
    }

    /// Synapses stay sorted by id: they are created in id order and pruning keeps order.
    pub fn synapse(&self, id: SynapseId) -> Option<&Synapse> {
        self.synapses
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|i| &self.synapses[i])
    }

    pub fn engram(&self, id: &str) -> Option<&Engram> {
        self.engrams.get(id)
    }

    pub fn engrams(&self) -> impl Iterator<Item = &Engram> {
        self.engrams.iter()
    }

    pub fn engram_count(&self) -> usize {
        self.engrams.len()
    }

    pub fn predictions(&self) -> &[Vec<f32>] {
        self.prediction.predictions()
    }

    /// Motor prediction errors from the last step run in predictive mode.
    pub fn prediction_errors(&self) -> &[f32] {
        self.prediction.last_errors()
    }

    pub fn is_predictive_mode(&self) -> bool {
        self.prediction.is_active()
    }

    pub fn is_engram_detection(&self) -> bool {
        self.engrams.is_detection_active()
    }

    pub fn is_resource_competition(&self) -> bool {
        self.competition.is_active()
    }

    /// Current motor read-out without advancing the network.
    pub fn outputs(&self) -> Vec<f32> {
        propagation::extract_outputs(&self.neurons, &self.layout)
    }

    pub fn activate_predictive_mode(&mut self, on: bool) {
        self.prediction.activate(on, &mut self.rng);
    }

    pub fn activate_engram_detection(&mut self, on: bool) {
        self.engrams.set_detection_active(on);
    }

    pub fn activate_resource_competition(&mut self, on: bool) {
        self.competition.set_active(on);
    }

    /// Clear short-term activity on every neuron.
    pub fn reset_transient(&mut self) {
        for n in &mut self.neurons {
            n.reset_transient();
        }
    }

    fn require_active(&self, what: &str) -> Result<()> {
        if self.state == NetworkState::Consolidating {
            return Err(NetworkError::InvalidState(format!(
                "cannot {what} while consolidating"
            )));
        }
        Ok(())
    }

    fn require_consolidating(&self, what: &str) -> Result<()> {
        if self.state != NetworkState::Consolidating {
            return Err(NetworkError::InvalidState(format!(
                "cannot {what} outside a consolidation cycle"
            )));
        }
        Ok(())
    }

    fn check_input(&self, input: &[f32]) -> Result<()> {
        let want = self.layout.sensory_len();
        if input.len() != want {
            return Err(NetworkError::InvalidArgument(format!(
                "input has {} values, sensory layer has {want}",
                input.len()
            )));
        }
        check_finite("input", input)
    }

    /// Advance the clock by one tick and run one processing step.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.require_active("process input")?;
        self.check_input(input)?;
        self.clock += 1;
        Ok(self.step(input))
    }

    /// Weakly supervised training on one (input, target) pair.
    ///
    /// Each iteration advances the clock by [`TRAIN_TICKS_PER_ITERATION`],
    /// runs a processing step, applies Hebbian plasticity network-wide and
    /// then the error-modulated update.
    pub fn train(&mut self, input: &[f32], target: &[f32], iterations: usize) -> Result<TrainReport> {
        self.require_active("train")?;
        self.check_input(input)?;
        let want = self.layout.motor_len();
        if target.len() != want {
            return Err(NetworkError::InvalidArgument(format!(
                "target has {} values, motor layer has {want}",
                target.len()
            )));
        }
        check_finite("target", target)?;

        let mut report = TrainReport {
            iterations,
            ..Default::default()
        };
        let mut errors = vec![0.0f32; want];
        for i in 0..iterations {
            self.clock += TRAIN_TICKS_PER_ITERATION;
            let outputs = self.step(input);
            for ((e, &t), &o) in errors.iter_mut().zip(target).zip(&outputs) {
                *e = t - o;
            }

            let now = self.clock;
            self.hebbian
                .apply_global_plasticity(&self.neurons, &mut self.synapses, now);
            let m = self.hebbian.modulate_by_error(
                &mut self.neurons,
                &mut self.synapses,
                &self.layout,
                &errors,
            );

            let mae = m.error_l1 / want as f32;
            if i == 0 {
                report.initial_error = mae;
            }
            report.final_error = mae;
        }

        tracing::trace!(
            iterations,
            initial = report.initial_error,
            last = report.final_error,
            "train"
        );
        Ok(report)
    }

    fn step(&mut self, input: &[f32]) -> Vec<f32> {
        let now = self.clock;
        propagation::establish_inputs(
            &mut self.neurons,
            &self.layout,
            input,
            self.cfg.input_activation_threshold,
            now,
        );

        if self.prediction.is_active() {
            self.prediction
                .calculate_predictions(&self.neurons, &self.synapses, &self.layout);
        }

        let fwd = propagation::propagate_forward(
            &mut self.neurons,
            &self.synapses,
            &self.layout,
            self.cfg.base_threshold,
            now,
        );
        let corrected =
            propagation::propagate_feedback(&mut self.neurons, &self.synapses, self.cfg.feedback_gain);

        if self.engrams.is_detection_active() {
            let r = self.engrams.detect_and_form(
                &mut self.neurons,
                &self.synapses,
                &self.layout,
                now,
                &mut self.rng,
            );
            if r.formed > 0 {
                tracing::debug!(tick = now, formed = r.formed, total = self.engrams.len(), "engrams");
            }
        }

        if self.prediction.is_active() {
            self.prediction
                .calculate_prediction_errors(&self.neurons, &self.layout);
            self.prediction
                .adjust_predictive_model(&self.neurons, &self.layout);
        }

        if self.competition.is_active()
            && now.saturating_sub(self.last_competition) >= self.cfg.competition_interval
        {
            self.run_competition();
        }

        tracing::trace!(
            tick = now,
            transmitting = fwd.transmitting,
            fired = fwd.fired,
            corrected,
            "step"
        );
        propagation::extract_outputs(&self.neurons, &self.layout)
    }

    /// One competition round followed by pruning, regardless of the toggle.
    ///
    /// Engrams drop references to pruned synapses and neighbour lists are
    /// rebuilt.
    pub fn run_competition(&mut self) -> CompetitionReport {
        let mut report = self
            .competition
            .compete(&mut self.neurons, &mut self.synapses, self.clock);
        let removed = self.competition.prune_elements(&mut self.synapses);
        if !removed.is_empty() {
            self.engrams.forget_synapses(&removed);
            rebuild_neighbors(&mut self.neurons, &self.synapses);
        }
        report.pruned = removed.len();
        self.pruned_last_round = removed.len();
        self.last_competition = self.clock;

        tracing::debug!(
            tick = self.clock,
            pruned = report.pruned,
            remaining = self.synapses.len(),
            removal_candidates = report.removal_candidates,
            "competition round"
        );
        report
    }

    /// Form an engram over `members`, merging into `id` if it already exists.
    pub fn form_engram(&mut self, id: &str, members: &[NeuronId]) -> Result<&Engram> {
        if id.is_empty() {
            return Err(NetworkError::InvalidArgument("engram id is empty".into()));
        }
        if members.is_empty() {
            return Err(NetworkError::InvalidArgument(format!(
                "engram '{id}' has no neurons"
            )));
        }
        if let Some(&bad) = members.iter().find(|&&n| n >= self.neurons.len()) {
            return Err(NetworkError::InvalidArgument(format!(
                "engram '{id}' references unknown neuron {bad}"
            )));
        }

        let set: BTreeSet<NeuronId> = members.iter().copied().collect();
        tracing::debug!(engram = id, neurons = set.len(), "engram formed explicitly");
        Ok(self.engrams.form(id, &set, &self.synapses, self.clock))
    }

    /// Explicit recall: facilitate every member of engram `id`.
    pub fn activate_engram(&mut self, id: &str) -> Result<()> {
        if self.engrams.activate(id, self.clock, &mut self.neurons) {
            Ok(())
        } else {
            Err(NetworkError::NotFound(format!("engram '{id}'")))
        }
    }

    pub fn start_consolidation(&mut self) -> Result<()> {
        self.require_active("start consolidation")?;
        self.state = NetworkState::Consolidating;
        tracing::info!(tick = self.clock, "consolidation started");
        Ok(())
    }

    /// One review pass: engram relevance bookkeeping, then a global synapse
    /// review (recently co-active synapses strengthen, the rest weaken).
    pub fn consolidate(&mut self) -> Result<ConsolidationSummary> {
        self.require_consolidating("consolidate")?;
        let now = self.clock;

        let engrams = self
            .engrams
            .consolidate(&mut self.synapses, now, self.cfg.consolidation_factor);

        let mut summary = ConsolidationSummary {
            engrams,
            ..Default::default()
        };
        let window = self.cfg.hebbian_window;
        for s in &mut self.synapses {
            let recent =
                s.co_activation_count > 0 && now.saturating_sub(s.last_activation) <= window;
            if recent {
                s.set_weight(s.weight * CONSOLIDATION_BOOST);
                summary.synapses_boosted += 1;
            } else {
                s.set_weight(s.weight * CONSOLIDATION_DECAY);
                summary.synapses_weakened += 1;
            }
        }

        tracing::info!(
            tick = now,
            engrams = self.engrams.len(),
            forgotten = summary.engrams.removed,
            boosted = summary.synapses_boosted,
            weakened = summary.synapses_weakened,
            "consolidation pass"
        );
        Ok(summary)
    }

    pub fn end_consolidation(&mut self) -> Result<()> {
        self.require_consolidating("end consolidation")?;
        self.state = NetworkState::Active;
        tracing::info!(tick = self.clock, "consolidation ended");
        Ok(())
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let synapse_count = self.synapses.len();
        let mean_abs_weight = if synapse_count == 0 {
            0.0
        } else {
            self.synapses.iter().map(|s| s.weight.abs()).sum::<f32>() / synapse_count as f32
        };
        Diagnostics {
            neuron_count: self.neurons.len(),
            synapse_count,
            active_neurons: self.neurons.iter().filter(|n| n.is_active()).count(),
            mean_abs_weight,
            inhibitory_synapses: self.synapses.iter().filter(|s| s.is_inhibitory()).count(),
            engram_count: self.engrams.len(),
            removal_candidates: self.neurons.iter().filter(|n| n.should_be_removed()).count(),
            pruned_last_round: self.pruned_last_round,
        }
    }
}

/// Random topology-respecting wiring.
///
/// Forward: each (pre, post) pair between consecutive layers is kept with
/// probability `density`; a neuron's kept targets are grouped into dyadic or
/// triadic synapses with `multi_target_probability`, single otherwise.
/// Feedback: motor to last inter layer and inter `i` to inter `i - 1`, one
/// target per synapse, same density rule.
fn wire(layout: &Layout, density: f32, cfg: &NetworkConfig, rng: &mut Prng) -> Vec<Synapse> {
    let mut synapses = Vec::new();
    let mut next_id = 0u32;
    let mut push = |synapses: &mut Vec<Synapse>, pre, targets, weight, kind, dir| {
        synapses.push(
            Synapse::new(SynapseId(next_id), pre, targets, weight, kind, dir)
                .with_reinforcement_rate(cfg.reinforcement_rate),
        );
        next_id += 1;
    };

    let layers: Vec<Range<NeuronId>> = layout.layers().collect();
    for pair in layers.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        for pre in from.clone() {
            let chosen: Vec<NeuronId> = to.clone().filter(|_| rng.gen_bool(density)).collect();
            let mut rest = chosen.as_slice();
            while !rest.is_empty() {
                let fan = if rng.gen_bool(cfg.multi_target_probability) {
                    rng.gen_range_usize(2, MAX_TARGETS + 1)
                } else {
                    1
                };
                let (head, tail) = rest.split_at(fan.min(rest.len()));
                rest = tail;
                let Some(targets) = Targets::from_slice(head) else {
                    continue;
                };
                let weight = rng.gen_range_f32(cfg.forward_weight_min, cfg.forward_weight_max);
                let kind = random_kind(rng, cfg.electric_probability);
                push(&mut synapses, pre, targets, weight, kind, Direction::Forward);
            }
        }
    }

    let inter = layout.inter();
    let mut feedback: Vec<(Range<NeuronId>, Range<NeuronId>)> = Vec::new();
    if let Some(last) = layout.last_inter() {
        feedback.push((layout.motor(), last));
    }
    for i in (1..inter.len()).rev() {
        feedback.push((inter[i].clone(), inter[i - 1].clone()));
    }
    for (from, to) in feedback {
        for pre in from {
            for post in to.clone() {
                if !rng.gen_bool(density) {
                    continue;
                }
                let weight = rng.gen_range_f32(cfg.feedback_weight_min, cfg.feedback_weight_max);
                let kind = random_kind(rng, cfg.electric_probability);
                push(
                    &mut synapses,
                    pre,
                    Targets::single(post),
                    weight,
                    kind,
                    Direction::Feedback,
                );
            }
        }
    }

    synapses
}

fn random_kind(rng: &mut Prng, electric_probability: f32) -> SynapseKind {
    if rng.gen_bool(electric_probability) {
        SynapseKind::Electric
    } else {
        SynapseKind::Chemical
    }
}

fn check_finite(what: &str, values: &[f32]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(NetworkError::InvalidArgument(format!(
            "{what} value {i} is not finite: {}",
            values[i]
        ))),
        None => Ok(()),
    }
}

/// Each neuron's neighbours are the presynaptic ids of its incoming synapses.
pub(crate) fn rebuild_neighbors(neurons: &mut [Neuron], synapses: &[Synapse]) {
    for n in neurons.iter_mut() {
        n.neighbors.clear();
    }
    for s in synapses {
        for &t in s.targets() {
            if let Some(n) = neurons.get_mut(t) {
                n.neighbors.push(s.pre);
            }
        }
    }
    for n in neurons.iter_mut() {
        n.neighbors.sort_unstable();
        n.neighbors.dedup();
    }
}
