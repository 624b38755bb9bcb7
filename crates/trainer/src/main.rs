use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use ranker_core::{compute_device, ModelConfig};
use trainer::{run, DataPaths, TrainerConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// Six GELU blocks, layer/batch norm
    Wide,
    /// Four leaky-ReLU blocks, batch norm
    Compact,
    /// Linear head only (logistic-regression baseline)
    Linear,
}

#[derive(Parser)]
#[command(author, version, about = "Train the pairwise relevance classifier")]
struct Cli {
    /// Training CSV (last column is the label)
    #[arg(long)]
    train: PathBuf,

    /// Validation CSV; a holdout of the training rows is used when omitted
    #[arg(long)]
    val: Option<PathBuf>,

    /// Test CSV evaluated with the best checkpoint
    #[arg(long)]
    test: Option<PathBuf>,

    /// Model YAML; when omitted the architecture comes from --preset
    #[arg(long)]
    model_config: Option<PathBuf>,

    #[arg(long, default_value = "configs/training_config.yaml")]
    training_config: PathBuf,

    /// Architecture used when no model config is given
    #[arg(long, value_enum, default_value_t = Preset::Wide)]
    preset: Preset,

    /// Overrides `checkpoint_dir` from the training config
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value = serde_yaml::from_str(&content).with_context(|| format!("Invalid config {:?}", path))?;
    Ok(Some(value))
}

/// An explicit model YAML wins and must exist; otherwise the preset is used.
/// `input_dim` is replaced once the preprocessor is fitted.
fn resolve_model_config(path: Option<&Path>, preset: Preset) -> Result<ModelConfig> {
    match path {
        Some(path) => {
            read_yaml(path)?.with_context(|| format!("Model config {:?} does not exist", path))
        }
        None => Ok(match preset {
            Preset::Wide => ModelConfig::wide(0),
            Preset::Compact => ModelConfig::compact(0),
            Preset::Linear => ModelConfig::linear(0),
        }),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let model_config = resolve_model_config(cli.model_config.as_deref(), cli.preset)?;
    let mut trainer_config: TrainerConfig = read_yaml(&cli.training_config)?.unwrap_or_default();
    if let Some(dir) = &cli.output_dir {
        trainer_config.checkpoint_dir = dir.to_string_lossy().into_owned();
    }

    let device = compute_device();
    let paths = DataPaths {
        train: cli.train,
        val: cli.val,
        test: cli.test,
    };
    let summary = run(&paths, model_config, trainer_config, device)?;

    println!(
        "Training complete! {} epochs, best val loss {:.4}. Artifacts in {:?}",
        summary.training.epochs_run(),
        summary.training.best_val_loss,
        summary.output_dir
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_applies_without_model_config() {
        let cfg = resolve_model_config(None, Preset::Compact).unwrap();
        assert_eq!(cfg.block_widths, vec![128, 64, 32, 16]);
        let cfg = resolve_model_config(None, Preset::Linear).unwrap();
        assert!(cfg.block_widths.is_empty());
    }

    #[test]
    fn explicit_model_config_wins_and_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.yaml");
        fs::write(
            &path,
            "input_dim: 0\nblock_widths: [8]\nactivation: gelu\ninner_norm: layer\n\
             outer_norm: layer\nblock_dropout: 0.1\nhead_dropout: 0.0\n\
             norm_epsilon: 1.0e-5\nnum_classes: 2\n",
        )
        .unwrap();
        let cfg = resolve_model_config(Some(&path), Preset::Wide).unwrap();
        assert_eq!(cfg.block_widths, vec![8]);

        let missing = dir.path().join("absent.yaml");
        assert!(resolve_model_config(Some(&missing), Preset::Wide).is_err());
    }
}
