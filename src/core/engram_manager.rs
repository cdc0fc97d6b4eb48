//! Engram detection, formation and consolidation bookkeeping.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::NetworkConfig;
use crate::engram::{Engram, MAX_RELEVANCE};
use crate::layout::Layout;
use crate::neuron::{Neuron, NeuronId, Tick};
use crate::prng::Prng;
use crate::synapse::{Synapse, SynapseId};

/// Minimum network-wide active inter neurons before a global engram is considered.
pub const MIN_GLOBAL_ACTIVE: usize = 2;
/// Minimum active neurons inside one inter layer before a local engram is considered.
pub const MIN_LOCAL_ACTIVE: usize = 3;

const RELEVANCE_BOOST: f32 = 1.1;
const RELEVANCE_DECAY: f32 = 0.8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionReport {
    pub formed: usize,
    pub reinforced: usize,
    /// Neurons facilitated by pattern completion.
    pub completed: usize,
}

impl DetectionReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Formed => self.formed += 1,
            Outcome::Reinforced => self.reinforced += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub boosted: usize,
    pub decayed: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Global,
    Layer(usize),
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Formed,
    Reinforced,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Params {
    activation_threshold: f32,
    threshold_jitter: f32,
    global_overlap: f32,
    local_overlap: f32,
    reinforce_rate: f32,
    recent_window: Tick,
    relevance_floor: f32,
}

impl Params {
    fn from_config(cfg: &NetworkConfig) -> Self {
        Self {
            activation_threshold: cfg.engram_activation_threshold,
            threshold_jitter: cfg.engram_threshold_jitter,
            global_overlap: cfg.global_overlap,
            local_overlap: cfg.local_overlap,
            reinforce_rate: cfg.engram_reinforce_rate,
            recent_window: cfg.recent_engram_window,
            relevance_floor: cfg.relevance_floor,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngramManager {
    detection_active: bool,
    engrams: BTreeMap<String, Engram>,
    next_auto: u64,
    next_local: u64,
    params: Params,
}

impl EngramManager {
    pub fn new(cfg: &NetworkConfig) -> Self {
        Self {
            detection_active: false,
            engrams: BTreeMap::new(),
            next_auto: 0,
            next_local: 0,
            params: Params::from_config(cfg),
        }
    }

    pub fn is_detection_active(&self) -> bool {
        self.detection_active
    }

    pub fn set_detection_active(&mut self, on: bool) {
        self.detection_active = on;
    }

    pub fn len(&self) -> usize {
        self.engrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engrams.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Engram> {
        self.engrams.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.engrams.contains_key(id)
    }

    /// Engrams in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Engram> {
        self.engrams.values()
    }

    pub(crate) fn counters(&self) -> (u64, u64) {
        (self.next_auto, self.next_local)
    }

    pub(crate) fn restore(&mut self, engrams: Vec<Engram>, next_auto: u64, next_local: u64) {
        self.engrams = engrams.into_iter().map(|e| (e.id.clone(), e)).collect();
        self.next_auto = next_auto;
        self.next_local = next_local;
    }

    /// Create `id` over `members`, or merge `members` into it if it exists.
    ///
    /// Synapses linking two members join the engram as well. Callers validate
    /// that `members` is non-empty and in range.
    pub fn form(
        &mut self,
        id: &str,
        members: &BTreeSet<NeuronId>,
        synapses: &[Synapse],
        now: Tick,
    ) -> &Engram {
        let engram = self
            .engrams
            .entry(id.to_string())
            .or_insert_with(|| Engram::new(id, now));
        for &n in members {
            engram.add_neuron(n);
        }
        let internal: Vec<SynapseId> = internal_synapses(&engram.neurons, synapses).collect();
        for sid in internal {
            engram.add_connection(sid);
        }
        engram
    }

    /// Explicit recall. Returns `false` if `id` is unknown.
    pub fn activate(&mut self, id: &str, now: Tick, neurons: &mut [Neuron]) -> bool {
        match self.engrams.get_mut(id) {
            Some(e) => {
                e.activate(now, neurons);
                true
            }
            None => false,
        }
    }

    /// Drop references to pruned synapses.
    pub fn forget_synapses(&mut self, removed: &[SynapseId]) {
        if removed.is_empty() {
            return;
        }
        for e in self.engrams.values_mut() {
            for &sid in removed {
                e.forget_connection(sid);
            }
        }
    }

    fn activation_threshold(&self, rng: &mut Prng) -> f32 {
        let p = &self.params;
        if p.threshold_jitter <= 0.0 {
            return p.activation_threshold;
        }
        let j = rng.gen_range_f32(-p.threshold_jitter, p.threshold_jitter);
        (p.activation_threshold + j).clamp(0.0, 1.0)
    }

    /// Best-overlapping engram that reaches `threshold`, ties going to the lowest id.
    fn best_match(&self, active: &BTreeSet<NeuronId>, threshold: f32) -> Option<String> {
        let mut best: Option<(&str, f32)> = None;
        for e in self.engrams.values() {
            if !e.contains_neurons(active, threshold) {
                continue;
            }
            let ov = e.overlap(active);
            match best {
                Some((_, b)) if ov <= b => {}
                _ => best = Some((e.id(), ov)),
            }
        }
        best.map(|(id, _)| id.to_string())
    }

    fn next_id(&mut self, scope: Scope) -> String {
        match scope {
            Scope::Global => {
                let id = format!("auto_{}", self.next_auto);
                self.next_auto += 1;
                id
            }
            Scope::Layer(layer) => {
                let id = format!("local_layer{}_{}", layer, self.next_local);
                self.next_local += 1;
                id
            }
        }
    }

    fn reinforce_or_form(
        &mut self,
        active: &BTreeSet<NeuronId>,
        scope: Scope,
        neurons: &mut [Neuron],
        synapses: &[Synapse],
        now: Tick,
    ) -> Outcome {
        let threshold = match scope {
            Scope::Global => self.params.global_overlap,
            Scope::Layer(_) => self.params.local_overlap,
        };
        if let Some(id) = self.best_match(active, threshold) {
            if let Some(e) = self.engrams.get_mut(&id) {
                e.activate(now, neurons);
                e.strengthen(self.params.reinforce_rate);
                tracing::trace!(engram = %id, "engram reinforced");
            }
            Outcome::Reinforced
        } else {
            let id = self.next_id(scope);
            self.form(&id, active, synapses, now);
            tracing::debug!(engram = %id, neurons = active.len(), "engram formed");
            Outcome::Formed
        }
    }

    /// Match the current activity against known engrams.
    ///
    /// The network-wide inter-layer active set and each inter layer's own
    /// active set are checked independently, so one pattern can feed a global
    /// engram and several local ones in the same call. Pattern completion
    /// then runs over every engram.
    pub fn detect_and_form(
        &mut self,
        neurons: &mut [Neuron],
        synapses: &[Synapse],
        layout: &Layout,
        now: Tick,
        rng: &mut Prng,
    ) -> DetectionReport {
        let mut report = DetectionReport::default();
        let mut global = BTreeSet::new();
        let mut per_layer = Vec::with_capacity(layout.inter().len());
        for layer in layout.inter() {
            let local: BTreeSet<NeuronId> = layer
                .clone()
                .filter(|&id| neurons[id].is_active())
                .collect();
            global.extend(local.iter().copied());
            per_layer.push(local);
        }

        if global.len() >= MIN_GLOBAL_ACTIVE {
            let o = self.reinforce_or_form(&global, Scope::Global, neurons, synapses, now);
            report.record(o);
        }

        for (layer, local) in per_layer.iter().enumerate() {
            if local.len() < MIN_LOCAL_ACTIVE {
                continue;
            }
            let o = self.reinforce_or_form(local, Scope::Layer(layer), neurons, synapses, now);
            report.record(o);
        }

        let ids: Vec<String> = self.engrams.keys().cloned().collect();
        for id in ids {
            let thr = self.activation_threshold(rng);
            if let Some(e) = self.engrams.get_mut(&id) {
                report.completed += e.complete_pattern(now, neurons, Some(thr));
            }
        }

        report
    }

    /// Consolidation review: recently used engrams gain relevance and are
    /// consolidated, stale ones lose relevance and degrade. Engrams whose
    /// relevance falls below the floor are removed after the full pass.
    pub fn consolidate(
        &mut self,
        synapses: &mut [Synapse],
        now: Tick,
        factor: f32,
    ) -> ConsolidationReport {
        let mut report = ConsolidationReport::default();
        let mut doomed = Vec::new();

        for e in self.engrams.values_mut() {
            if now.saturating_sub(e.last_activation) < self.params.recent_window {
                e.set_relevance((e.relevance * RELEVANCE_BOOST).min(MAX_RELEVANCE));
                e.consolidate(factor, synapses);
                report.boosted += 1;
            } else {
                e.set_relevance(e.relevance * RELEVANCE_DECAY);
                e.degrade(factor, synapses);
                report.decayed += 1;
            }
            if e.relevance < self.params.relevance_floor {
                doomed.push(e.id.clone());
            }
        }

        for id in doomed {
            self.engrams.remove(&id);
            tracing::debug!(engram = %id, "engram forgotten");
            report.removed += 1;
        }

        report
    }
}

/// Synapses whose presynaptic neuron and at least one target are both members.
fn internal_synapses<'a>(
    members: &'a BTreeSet<NeuronId>,
    synapses: &'a [Synapse],
) -> impl Iterator<Item = SynapseId> + 'a {
    synapses
        .iter()
        .filter(|s| members.contains(&s.pre) && s.targets().iter().any(|t| members.contains(t)))
        .map(|s| s.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuron::NeuronRole;
    use crate::synapse::{Direction, SynapseKind, Targets};

    // Layout [1, 4, 1]: sensory 0, inter 1..5, motor 5.
    fn setup() -> (Vec<Neuron>, Vec<Synapse>, Layout) {
        let layout = Layout::from_topology(&[1, 4, 1]).unwrap();
        let neurons = (0..6)
            .map(|i| Neuron::new(i, layout.role_of(i).unwrap_or(NeuronRole::Inter)))
            .collect();
        let synapses = vec![
            Synapse::new(
                SynapseId(0),
                0,
                Targets::single(1),
                0.5,
                SynapseKind::Chemical,
                Direction::Forward,
            ),
            // Lateral link inside the inter layer.
            Synapse::new(
                SynapseId(1),
                1,
                Targets::from_slice(&[2, 3]).unwrap(),
                0.5,
                SynapseKind::Electric,
                Direction::Forward,
            ),
        ];
        (neurons, synapses, layout)
    }

    fn set(ids: &[NeuronId]) -> BTreeSet<NeuronId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn form_collects_internal_synapses_and_merges() {
        let (_, syns, _) = setup();
        let mut m = EngramManager::new(&NetworkConfig::default());

        let e = m.form("x", &set(&[1, 2]), &syns, 3);
        assert_eq!(e.neurons().len(), 2);
        assert!(e.synapses().contains(&SynapseId(1)));
        assert!(!e.synapses().contains(&SynapseId(0)));

        let e = m.form("x", &set(&[2, 4]), &syns, 9);
        assert_eq!(e.neurons().len(), 3);
        assert_eq!(e.creation_time(), 3);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn detection_forms_then_reinforces() {
        let (mut ns, syns, layout) = setup();
        for id in 1..4 {
            ns[id].activate(1);
        }
        let mut m = EngramManager::new(&NetworkConfig::default());
        let mut rng = Prng::new(1);

        // The local set is fully covered by the global engram formed first.
        let r = m.detect_and_form(&mut ns, &syns, &layout, 1, &mut rng);
        assert_eq!(r.formed, 1);
        assert_eq!(r.reinforced, 1);
        assert!(m.contains("auto_0"));

        let r = m.detect_and_form(&mut ns, &syns, &layout, 2, &mut rng);
        assert_eq!(r.formed, 0);
        assert_eq!(r.reinforced, 2);
        assert_eq!(m.len(), 1);
        let e = m.get("auto_0").unwrap();
        assert_eq!(e.activation_count(), 3);
        assert!(e.strength() > crate::engram::INITIAL_STRENGTH);
    }

    #[test]
    fn local_engram_forms_when_global_match_misses_a_layer() {
        // Layout [1, 4, 4, 1]: inter layers 1..5 and 5..9.
        let layout = Layout::from_topology(&[1, 4, 4, 1]).unwrap();
        let mut ns: Vec<Neuron> = (0..10)
            .map(|i| Neuron::new(i, layout.role_of(i).unwrap_or(NeuronRole::Inter)))
            .collect();
        let mut m = EngramManager::new(&NetworkConfig::default());
        m.form("g", &set(&[5, 6, 7]), &[], 0);

        for id in [1, 2, 3, 5, 6, 7] {
            ns[id].activate(1);
        }
        let r = m.detect_and_form(&mut ns, &[], &layout, 1, &mut Prng::new(1));
        // Global: 3/6 overlap with "g". Layer 1: fully inside "g". Layer 0: new.
        assert_eq!(r.reinforced, 2);
        assert_eq!(r.formed, 1);
        assert_eq!(
            m.get("local_layer0_0").map(|e| e.neurons().clone()),
            Some(set(&[1, 2, 3]))
        );
    }

    #[test]
    fn single_active_neuron_forms_nothing() {
        let (mut ns, syns, layout) = setup();
        ns[2].activate(1);
        let mut m = EngramManager::new(&NetworkConfig::default());
        let r = m.detect_and_form(&mut ns, &syns, &layout, 1, &mut Prng::new(1));
        assert_eq!(r, DetectionReport::default());
        assert!(m.is_empty());
    }

    #[test]
    fn pattern_completion_facilitates_missing_members() {
        let (mut ns, syns, layout) = setup();
        let mut m = EngramManager::new(&NetworkConfig::default());
        m.form("trace", &set(&[1, 2, 3]), &syns, 0);

        ns[1].activate(5);
        let r = m.detect_and_form(&mut ns, &syns, &layout, 5, &mut Prng::new(1));
        assert_eq!(r.completed, 2);
        assert!(ns[2].facilitation() > 0.0);
        assert!(ns[3].facilitation() > 0.0);
    }

    #[test]
    fn consolidation_boosts_recent_and_forgets_stale() {
        let (_, mut syns, _) = setup();
        let mut m = EngramManager::new(&NetworkConfig::default());
        m.form("fresh", &set(&[1, 2]), &syns, 100);
        m.form("stale", &set(&[3, 4]), &syns, 0);

        let r = m.consolidate(&mut syns, 110, 0.05);
        assert_eq!(r.boosted, 1);
        assert_eq!(r.decayed, 1);
        assert!((m.get("fresh").unwrap().relevance() - 1.1).abs() < 1e-6);
        assert!((syns[1].weight() - 0.525).abs() < 1e-6);

        // 1.0 * 0.8^n < 0.15 after 9 rounds.
        let mut removed = 0;
        for _ in 0..12 {
            removed += m.consolidate(&mut syns, 5000, 0.05).removed;
        }
        assert_eq!(removed, 2);
        assert!(m.is_empty());
    }

    #[test]
    fn relevance_is_capped() {
        let (_, mut syns, _) = setup();
        let mut m = EngramManager::new(&NetworkConfig::default());
        m.form("e", &set(&[1]), &syns, 0);
        for _ in 0..20 {
            m.consolidate(&mut syns, 0, 0.05);
        }
        assert_eq!(m.get("e").unwrap().relevance(), MAX_RELEVANCE);
    }

    #[test]
    fn forget_synapses_drops_dangling_ids() {
        let (_, syns, _) = setup();
        let mut m = EngramManager::new(&NetworkConfig::default());
        m.form("e", &set(&[1, 2, 3]), &syns, 0);
        m.forget_synapses(&[SynapseId(1)]);
        assert!(m.get("e").unwrap().synapses().is_empty());
    }
}
