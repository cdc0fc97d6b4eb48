use std::io;
use std::path::PathBuf;

use plastinet::error::NetworkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("could not determine data directory")]
    NoDataDir,

    #[error("no model at {}", .0.display())]
    MissingModel(PathBuf),

    #[error("usage: {0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
