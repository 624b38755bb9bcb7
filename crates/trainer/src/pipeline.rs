use anyhow::{ensure, Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tch::Device;

use evaluation::{evaluate, print_summary, Evaluation};
use features::{load_csv, train_val_split, LabeledData, Preprocessor};
use ranker_core::checkpoint::{HISTORY_FILE, PREPROCESSOR_FILE};
use ranker_core::{FeatureDataset, ModelConfig, Snapshot};

use crate::train::{Trainer, TrainingSummary};
use crate::TrainerConfig;

/// Input CSVs for one run. Without `val`, a holdout is split off `train`.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub train: PathBuf,
    pub val: Option<PathBuf>,
    pub test: Option<PathBuf>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub training: TrainingSummary,
    /// Metrics of the best checkpoint on the test file, or on the validation
    /// split when no test file was given.
    pub evaluation: Evaluation,
    pub output_dir: PathBuf,
}

fn load(path: &Path, config: &TrainerConfig) -> Result<LabeledData> {
    load_csv(path, config.label_encoding).with_context(|| format!("Failed to load data from {:?}", path))
}

fn to_dataset(data: &LabeledData, preprocessor: &Preprocessor, device: Device) -> Result<FeatureDataset> {
    let features = preprocessor.transform(&data.features)?;
    FeatureDataset::new(features.as_slice(), &data.labels, features.cols(), device)
}

/// Load, preprocess, train, then evaluate the best checkpoint.
///
/// Every artifact lands in `config.checkpoint_dir`: both weight snapshots,
/// `model_config.json`, `preprocessor.json` and `history.json`.
pub fn run(
    paths: &DataPaths,
    mut model_config: ModelConfig,
    config: TrainerConfig,
    device: Device,
) -> Result<RunSummary> {
    let train = load(&paths.train, &config)?;
    let (train, val) = match &paths.val {
        Some(path) => (train, load(path, &config)?),
        None => {
            let (train, val) = train_val_split(&train, config.val_fraction, config.seed);
            log::info!("Held out {} of {} rows for validation", val.len(), train.len() + val.len());
            (train, val)
        }
    };
    ensure!(!train.is_empty(), "no training rows in {:?}", paths.train);
    ensure!(!val.is_empty(), "validation split is empty");
    train.ensure_same_width(&val)?;

    let test = paths.test.as_deref().map(|p| load(p, &config)).transpose()?;
    if let Some(test) = &test {
        train.ensure_same_width(test)?;
    }

    // Statistics come from the training rows alone.
    let mut preprocessor = Preprocessor::new(config.select_k);
    preprocessor.fit(&train.features, &train.labels)?;

    let output_dir = PathBuf::from(&config.checkpoint_dir);
    fs::create_dir_all(&output_dir)?;
    preprocessor.save(output_dir.join(PREPROCESSOR_FILE))?;

    let train_ds = to_dataset(&train, &preprocessor, device)?;
    let val_ds = to_dataset(&val, &preprocessor, device)?;
    model_config.input_dim = train_ds.n_features() as i64;

    let batch_size = config.batch_size;
    let mut trainer = Trainer::new(model_config, config, device)?;
    let training = trainer.fit(&train_ds, &val_ds)?;

    let history = BufWriter::new(File::create(output_dir.join(HISTORY_FILE))?);
    serde_json::to_writer_pretty(history, &training.history)?;

    if training.best_epoch.is_some() {
        trainer.load(Snapshot::Best)?;
    } else {
        log::warn!("No epoch produced a finite validation loss, evaluating the final weights");
    }

    let (title, eval_ds) = match &test {
        Some(test) => ("the test set", to_dataset(test, &preprocessor, device)?),
        None => ("the validation set", val_ds),
    };
    println!("Testing the model...");
    let evaluation = evaluate(trainer.model(), eval_ds.sequential(batch_size))?;
    print_summary(title, &evaluation);

    Ok(RunSummary {
        training,
        evaluation,
        output_dir,
    })
}
