//! Error types for the plastic network.

use thiserror::Error;

/// Failures surfaced by [`crate::network::Network`] operations.
///
/// Every variant is raised before any state is touched, so a rejected call
/// leaves the network exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// Malformed vectors, bad topology, empty engram definitions.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not allowed in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Unknown engram id.
    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, NetworkError>;
