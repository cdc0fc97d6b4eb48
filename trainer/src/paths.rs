//! Cross-platform application paths

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrainerError};

#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    /// `<os data dir>/plastinet`, created if missing.
    pub fn new() -> Result<Self> {
        let base = dirs::data_dir().ok_or(TrainerError::NoDataDir)?;
        Self::at(base.join("plastinet"))
    }

    pub fn at(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn model_file(&self) -> PathBuf {
        self.data_dir.join("tic_tac_toe.pnet")
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("trainer.json")
    }

    pub fn report_file(&self) -> PathBuf {
        self.data_dir.join("last_run.json")
    }
}
