//! Trainer run configuration (JSON).

use std::fs;
use std::path::Path;

use plastinet::config::NetworkConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

/// Missing fields fall back to [`TrainerConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub network: NetworkConfig,
    pub hidden: Vec<usize>,
    pub density: f32,
    pub epochs: usize,
    /// Positions drawn per epoch; 0 uses every reachable position.
    pub positions_per_epoch: usize,
    pub iterations_per_position: usize,
    /// Run a consolidation cycle every N epochs; 0 disables it.
    pub consolidate_every: usize,
    /// Seed for position sampling; the network has its own in `network.seed`.
    pub sample_seed: u64,
    pub eval_positions: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default()
                .with_seed(1)
                .with_engram_detection(true)
                .with_resource_competition(true),
            hidden: vec![18, 18],
            density: 0.5,
            epochs: 20,
            positions_per_epoch: 256,
            iterations_per_position: 3,
            consolidate_every: 5,
            sample_seed: 7,
            eval_positions: 500,
        }
    }
}

impl TrainerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.network
            .validate()
            .map_err(|e| TrainerError::Config(e.to_string()))?;
        if self.hidden.iter().any(|&h| h == 0) {
            return Err(TrainerError::Config("hidden layers must be non-empty".into()));
        }
        if !(0.0..=1.0).contains(&self.density) {
            return Err(TrainerError::Config("density must be in [0, 1]".into()));
        }
        if self.iterations_per_position == 0 {
            return Err(TrainerError::Config("iterations_per_position must be > 0".into()));
        }
        Ok(())
    }
}
