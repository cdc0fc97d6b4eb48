pub use crate::network::Diagnostics;

use crate::network::{Network, NetworkState};
use crate::neuron::Tick;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A read-only snapshot of what the network is doing.
///
/// Observers cannot mutate the network. Snapshotting allocates on demand;
/// the propagation loop is unaffected.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkSnapshot {
    pub clock: Tick,
    pub state: NetworkState,
    pub topology: Vec<usize>,
    pub diagnostics: Diagnostics,
    pub outputs: Vec<f32>,
    pub engrams: Vec<EngramSummary>,
    pub prediction_errors: Vec<f32>,
    pub predictive_mode: bool,
    pub engram_detection: bool,
    pub resource_competition: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngramSummary {
    pub id: String,
    pub size: usize,
    pub synapses: usize,
    pub strength: f32,
    pub relevance: f32,
    pub activation_count: u64,
    pub last_activation: Tick,
}

pub struct NetworkAdapter<'a> {
    net: &'a Network,
}

impl<'a> NetworkAdapter<'a> {
    pub fn new(net: &'a Network) -> Self {
        Self { net }
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        let net = self.net;
        NetworkSnapshot {
            clock: net.clock(),
            state: net.state(),
            topology: net.topology().to_vec(),
            diagnostics: net.diagnostics(),
            outputs: net.outputs(),
            engrams: net
                .engrams()
                .map(|e| EngramSummary {
                    id: e.id().to_string(),
                    size: e.neurons().len(),
                    synapses: e.synapses().len(),
                    strength: e.strength(),
                    relevance: e.relevance(),
                    activation_count: e.activation_count(),
                    last_activation: e.last_activation(),
                })
                .collect(),
            prediction_errors: net.prediction_errors().to_vec(),
            predictive_mode: net.is_predictive_mode(),
            engram_detection: net.is_engram_detection(),
            resource_competition: net.is_resource_competition(),
        }
    }

    /// Strongest `n` engrams, strongest first; ties by id.
    pub fn top_engrams(&self, n: usize) -> Vec<EngramSummary> {
        let mut all = self.snapshot().engrams;
        all.sort_by(|a, b| b.strength.total_cmp(&a.strength).then_with(|| a.id.cmp(&b.id)));
        all.truncate(n);
        all
    }

    #[cfg(feature = "serde")]
    pub fn snapshot_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;

    #[test]
    fn snapshot_reflects_network() {
        let cfg = NetworkConfig::default().with_seed(4).with_engram_detection(true);
        let mut net = Network::with_config(&[2, 3, 2], 0.9, cfg).unwrap();
        net.form_engram("weak", &[2, 3]).unwrap();
        net.form_engram("strong", &[3, 4]).unwrap();
        net.activate_engram("strong").unwrap();
        net.process(&[1.0, 1.0]).unwrap();

        let snap = NetworkAdapter::new(&net).snapshot();
        assert_eq!(snap.clock, 1);
        assert_eq!(snap.state, NetworkState::Active);
        assert_eq!(snap.topology, vec![2, 3, 2]);
        assert_eq!(snap.diagnostics, net.diagnostics());
        assert_eq!(snap.outputs.len(), 2);
        assert_eq!(snap.engrams.len(), net.engram_count());
        assert!(snap.engram_detection);
        assert!(!snap.predictive_mode);
    }

    #[test]
    fn top_engrams_sorted_by_strength() {
        let mut net = Network::new(&[2, 3, 1], 1.0).unwrap();
        net.form_engram("a", &[2]).unwrap();
        net.form_engram("b", &[3]).unwrap();
        net.start_consolidation().unwrap();
        net.consolidate().unwrap();
        net.end_consolidation().unwrap();
        net.activate_engram("b").unwrap();
        net.start_consolidation().unwrap();
        net.consolidate().unwrap();
        net.end_consolidation().unwrap();

        let top = NetworkAdapter::new(&net).top_engrams(1);
        assert_eq!(top.len(), 1);
        assert!(top[0].strength >= net.engram("a").map(|e| e.strength()).unwrap_or(0.0));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn snapshot_serializes_to_json() {
        let net = Network::new(&[2, 2], 1.0).unwrap();
        let json = NetworkAdapter::new(&net).snapshot_json().unwrap();
        let back: NetworkSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.topology, vec![2, 2]);
        assert_eq!(back.clock, 0);
    }
}
