use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tch::nn;

use crate::config::ModelConfig;
use crate::safetensors_util::{load_safetensors, save_safetensors};

pub const MODEL_CONFIG_FILE: &str = "model_config.json";
pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const HISTORY_FILE: &str = "history.json";

/// Which parameter snapshot of a run to read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Snapshot {
    /// Lowest validation loss seen during training.
    #[default]
    Best,
    /// Parameters when training stopped.
    Final,
}

impl Snapshot {
    pub fn file_name(&self) -> &'static str {
        match self {
            Snapshot::Best => "best_model.safetensors",
            Snapshot::Final => "final_model.safetensors",
        }
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Snapshot::Best => write!(f, "best"),
            Snapshot::Final => write!(f, "final"),
        }
    }
}

impl FromStr for Snapshot {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "best" => Ok(Snapshot::Best),
            "final" => Ok(Snapshot::Final),
            other => Err(format!("unknown snapshot {other:?}, expected best or final")),
        }
    }
}

pub fn save_weights(vs: &nn::VarStore, dir: &Path, snapshot: Snapshot) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = snapshot.path_in(dir);
    save_safetensors(vs, &path).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

pub fn load_weights(vs: &mut nn::VarStore, dir: &Path, snapshot: Snapshot) -> Result<()> {
    let path = snapshot.path_in(dir);
    load_safetensors(vs, &path).with_context(|| format!("Failed to load checkpoint {:?}", path))
}

pub fn save_config(config: &ModelConfig, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let config_json = serde_json::to_string_pretty(config)?;
    std::fs::write(dir.join(MODEL_CONFIG_FILE), config_json)?;
    Ok(())
}

pub fn read_config(dir: &Path) -> Result<ModelConfig> {
    let config_path = dir.join(MODEL_CONFIG_FILE);
    let config_str = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read model config at {:?}", config_path))?;
    serde_json::from_str(&config_str).context("Failed to parse model config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_names_parse() {
        assert_eq!("best".parse::<Snapshot>().unwrap(), Snapshot::Best);
        assert_eq!("final".parse::<Snapshot>().unwrap(), Snapshot::Final);
        assert!("latest".parse::<Snapshot>().is_err());
        assert_ne!(Snapshot::Best.file_name(), Snapshot::Final.file_name());
    }

    #[test]
    fn config_round_trips_through_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig::compact(17);
        save_config(&config, dir.path()).unwrap();
        let back = read_config(dir.path()).unwrap();
        assert_eq!(back.input_dim, 17);
        assert_eq!(back.block_widths, config.block_widths);
    }
}
