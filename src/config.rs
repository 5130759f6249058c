use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::ColumnMapping;
use crate::model::VolcanoSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Engine configuration; every field falls back to its default when omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub columns: ColumnMapping,
    pub settings: VolcanoSettings,
    pub cache_dir: Option<PathBuf>,
    /// Worker threads (0 = auto).
    pub threads: usize,
}

impl EngineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/config/tests.rs"]
mod tests;
