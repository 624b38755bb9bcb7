pub mod pipeline;
pub mod schedule;
pub mod train;

pub use pipeline::{run, DataPaths, RunSummary};
pub use train::{EpochRecord, Trainer, TrainingSummary};

use features::LabelEncoding;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub learning_rate: f64,
    /// Decoupled (AdamW) weight decay.
    pub weight_decay: f64,
    pub batch_size: usize,
    /// Upper bound on epochs; early stopping may end training sooner.
    pub epochs: usize,
    /// Epochs without a new best validation loss before training stops.
    pub early_stop_patience: usize,
    /// Epochs without improvement before the learning rate is reduced.
    pub lr_patience: usize,
    pub lr_factor: f64,
    pub min_lr: f64,
    pub label_smoothing: f64,
    /// Standard deviation of Gaussian noise added to training batches.
    pub noise_std: Option<f64>,
    /// Keep only the k best features by F-statistic.
    pub select_k: Option<usize>,
    /// Holdout fraction used when no validation file is given.
    pub val_fraction: f64,
    pub label_encoding: LabelEncoding,
    pub seed: u64,
    pub checkpoint_dir: String,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            weight_decay: 2e-5,
            batch_size: 16384,
            epochs: 50,
            early_stop_patience: 15,
            lr_patience: 10,
            lr_factor: 0.5,
            min_lr: 1e-5,
            label_smoothing: 0.1,
            noise_std: None,
            select_k: None,
            val_fraction: 0.2,
            label_encoding: LabelEncoding::Signed,
            seed: 42,
            checkpoint_dir: "./checkpoints".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: TrainerConfig = serde_yaml::from_str(
            "epochs: 200\nearly_stop_patience: 20\nselect_k: 50\nweight_decay: 1.0e-5\nlabel_encoding: binary\n",
        )
        .unwrap();
        assert_eq!(cfg.epochs, 200);
        assert_eq!(cfg.select_k, Some(50));
        assert_eq!(cfg.label_encoding, LabelEncoding::Binary);
        assert_eq!(cfg.batch_size, 16384);
        assert_eq!(cfg.lr_patience, 10);
    }
}
