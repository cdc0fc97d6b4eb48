#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tunables for a [`crate::network::Network`].
///
/// Topology and connection density are construction arguments, not config:
/// they fix the arena layout and cannot change afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NetworkConfig {
    // ---------------------------------------------------------------------
    // Neurons / propagation
    // ---------------------------------------------------------------------
    /// Summed input needed to spike, before facilitation lowers it.
    pub base_threshold: f32,
    /// Sensory neurons fire only when `|input| > input_activation_threshold`.
    pub input_activation_threshold: f32,
    /// Scale of the slow stored-value correction applied by feedback synapses.
    pub feedback_gain: f32,

    // ---------------------------------------------------------------------
    // Plasticity
    // ---------------------------------------------------------------------
    pub reinforcement_rate: f32,
    /// Ticks without co-activation before a synapse starts to depress.
    pub hebbian_window: u64,
    /// Error-modulated (weakly supervised) learning rate.
    pub learning_rate: f32,

    // ---------------------------------------------------------------------
    // Resource competition
    // ---------------------------------------------------------------------
    /// An element counts as "used" if it fired within this many ticks.
    pub competition_window: u64,
    /// Ticks between automatic competition rounds when competition is on.
    pub competition_interval: u64,
    /// Ticks of silence before a neuron's survival starts to erode.
    pub disuse_window: u64,

    // ---------------------------------------------------------------------
    // Engrams
    // ---------------------------------------------------------------------
    /// Fraction of members that must be active for an engram to count as active.
    pub engram_activation_threshold: f32,
    /// Uniform jitter (+/-) added to the activation threshold on each check.
    pub engram_threshold_jitter: f32,
    /// Overlap needed to match the network-wide active set to an existing engram.
    pub global_overlap: f32,
    /// Overlap needed to match a single layer's active set to an existing engram.
    pub local_overlap: f32,
    /// Strength added to an engram each time detection re-finds it.
    pub engram_reinforce_rate: f32,
    /// Engrams activated within this many ticks gain relevance on consolidation.
    pub recent_engram_window: u64,
    /// Engrams whose relevance drops below this are forgotten.
    pub relevance_floor: f32,
    pub consolidation_factor: f32,

    // ---------------------------------------------------------------------
    // Predictive coding
    // ---------------------------------------------------------------------
    pub prediction_rate: f32,
    /// Amplitude of the noise predictions are seeded with.
    pub prediction_noise: f32,

    // ---------------------------------------------------------------------
    // Wiring
    // ---------------------------------------------------------------------
    /// Probability that a forward synapse fans out to 2-3 targets.
    pub multi_target_probability: f32,
    pub electric_probability: f32,
    pub forward_weight_min: f32,
    pub forward_weight_max: f32,
    pub feedback_weight_min: f32,
    pub feedback_weight_max: f32,

    // ---------------------------------------------------------------------
    // Manager toggles (all off by default)
    // ---------------------------------------------------------------------
    pub engram_detection: bool,
    pub predictive_mode: bool,
    pub resource_competition: bool,

    // If set, makes wiring and noise reproducible.
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_threshold: 0.5,
            input_activation_threshold: 0.1,
            feedback_gain: 0.1,

            reinforcement_rate: 0.02,
            hebbian_window: 100,
            learning_rate: 0.5,

            competition_window: 20,
            competition_interval: 50,
            disuse_window: 100,

            engram_activation_threshold: 0.3,
            engram_threshold_jitter: 0.0,
            global_overlap: 0.5,
            local_overlap: 0.6,
            engram_reinforce_rate: 0.05,
            recent_engram_window: 30,
            relevance_floor: 0.15,
            consolidation_factor: 0.05,

            prediction_rate: 0.15,
            prediction_noise: 0.05,

            multi_target_probability: 0.2,
            electric_probability: 0.1,
            forward_weight_min: 0.2,
            forward_weight_max: 0.8,
            feedback_weight_min: 0.05,
            feedback_weight_max: 0.3,

            engram_detection: false,
            predictive_mode: false,
            resource_competition: false,

            seed: None,
        }
    }
}

impl NetworkConfig {
    /// Seed used when `seed` is unset.
    pub const DEFAULT_SEED: u64 = 1;

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_learning_rate(mut self, rate: f32) -> Self {
        self.learning_rate = rate;
        self
    }

    pub fn with_base_threshold(mut self, threshold: f32) -> Self {
        self.base_threshold = threshold;
        self
    }

    pub fn with_engram_detection(mut self, enabled: bool) -> Self {
        self.engram_detection = enabled;
        self
    }

    pub fn with_predictive_mode(mut self, enabled: bool) -> Self {
        self.predictive_mode = enabled;
        self
    }

    pub fn with_resource_competition(mut self, enabled: bool) -> Self {
        self.resource_competition = enabled;
        self
    }

    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or(Self::DEFAULT_SEED)
    }

    /// Validate the configuration, returning an error message if invalid.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.base_threshold <= 0.0 || self.base_threshold.is_nan() {
            return Err("base_threshold must be > 0");
        }
        if self.input_activation_threshold < 0.0 {
            return Err("input_activation_threshold must be >= 0");
        }
        if !(0.0..=1.0).contains(&self.feedback_gain) {
            return Err("feedback_gain must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.reinforcement_rate) {
            return Err("reinforcement_rate must be in [0, 1]");
        }
        if !(0.0..=2.0).contains(&self.learning_rate) {
            return Err("learning_rate must be in [0, 2]");
        }
        if self.competition_interval == 0 {
            return Err("competition_interval must be > 0");
        }
        if !(0.0..=1.0).contains(&self.engram_activation_threshold) {
            return Err("engram_activation_threshold must be in [0, 1]");
        }
        if !(0.0..=0.5).contains(&self.engram_threshold_jitter) {
            return Err("engram_threshold_jitter must be in [0, 0.5]");
        }
        if !(0.0..=1.0).contains(&self.global_overlap) || !(0.0..=1.0).contains(&self.local_overlap)
        {
            return Err("overlap thresholds must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.prediction_rate) {
            return Err("prediction_rate must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.multi_target_probability)
            || !(0.0..=1.0).contains(&self.electric_probability)
        {
            return Err("wiring probabilities must be in [0, 1]");
        }
        if self.forward_weight_min > self.forward_weight_max
            || self.feedback_weight_min > self.feedback_weight_max
        {
            return Err("weight ranges must have min <= max");
        }
        if self.forward_weight_min < -1.0
            || self.forward_weight_max > 1.0
            || self.feedback_weight_min < -1.0
            || self.feedback_weight_max > 1.0
        {
            return Err("initial weights must lie in [-1, 1]");
        }
        Ok(())
    }
}
