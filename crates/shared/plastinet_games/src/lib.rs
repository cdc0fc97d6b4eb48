pub mod oracle;
pub mod stats;
pub mod tic_tac_toe;

// Helpers for running positions through a `plastinet::network::Network`.
// Kept behind the optional `plastinet` feature.
#[cfg(feature = "plastinet")]
pub mod net_io;
