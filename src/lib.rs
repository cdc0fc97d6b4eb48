#[path = "core/error.rs"]
pub mod error;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/neuron.rs"]
pub mod neuron;

#[path = "core/synapse.rs"]
pub mod synapse;

#[path = "core/engram.rs"]
pub mod engram;

#[path = "core/layout.rs"]
pub mod layout;

#[path = "core/propagation.rs"]
pub mod propagation;

#[path = "core/hebbian.rs"]
pub mod hebbian;

#[path = "core/competition.rs"]
pub mod competition;

#[path = "core/engram_manager.rs"]
pub mod engram_manager;

#[path = "core/prediction.rs"]
pub mod prediction;

#[path = "core/network.rs"]
pub mod network;

#[path = "core/storage.rs"]
pub mod storage;

pub mod observer;

pub mod prelude {
    pub use crate::config::NetworkConfig;
    pub use crate::engram::Engram;
    pub use crate::error::{NetworkError, Result};
    pub use crate::network::{Diagnostics, Network, NetworkState, TrainReport};
    pub use crate::neuron::{NeuronId, Potential, Tick};
    pub use crate::observer::{NetworkAdapter, NetworkSnapshot};
    pub use crate::synapse::{Direction, SynapseId, SynapseKind};
}
