use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tch::{nn, nn::ModuleT, nn::OptimizerConfig, Device, Reduction, Tensor};

use ranker_core::checkpoint;
use ranker_core::{FeatureDataset, ModelConfig, RelevanceClassifier, Snapshot};

use crate::schedule::{EarlyStopping, PlateauScheduler, Verdict};
use crate::TrainerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Training,
    Validating,
    CheckEarlyStop,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub history: Vec<EpochRecord>,
    /// 1-based epoch of the best checkpoint; `None` if no epoch produced a finite loss.
    pub best_epoch: Option<usize>,
    pub best_val_loss: f64,
    pub stopped_early: bool,
}

impl TrainingSummary {
    pub fn epochs_run(&self) -> usize {
        self.history.len()
    }
}

/// Owns the model, optimizer and schedule state for one training run.
pub struct Trainer {
    config: TrainerConfig,
    model: RelevanceClassifier,
    optimizer: nn::Optimizer,
    scheduler: PlateauScheduler,
    early_stop: EarlyStopping,
    rng: StdRng,
    vs: nn::VarStore,
    checkpoint_dir: PathBuf,
}

impl Trainer {
    pub fn new(model_config: ModelConfig, trainer_config: TrainerConfig, device: Device) -> Result<Self> {
        tch::manual_seed(trainer_config.seed as i64);

        let vs = nn::VarStore::new(device);
        let model = RelevanceClassifier::new(&vs.root(), &model_config)?;

        let optimizer = nn::AdamW {
            wd: trainer_config.weight_decay,
            ..Default::default()
        }
        .build(&vs, trainer_config.learning_rate)?;

        let scheduler = PlateauScheduler::new(
            trainer_config.learning_rate,
            trainer_config.lr_factor,
            trainer_config.lr_patience,
            trainer_config.min_lr,
        );

        Ok(Self {
            early_stop: EarlyStopping::new(trainer_config.early_stop_patience),
            rng: StdRng::seed_from_u64(trainer_config.seed),
            checkpoint_dir: PathBuf::from(&trainer_config.checkpoint_dir),
            config: trainer_config,
            model,
            optimizer,
            scheduler,
            vs,
        })
    }

    pub fn model(&self) -> &RelevanceClassifier {
        &self.model
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    pub fn learning_rate(&self) -> f64 {
        self.scheduler.lr()
    }

    /// Runs epochs until early stopping or the epoch limit, writing the best
    /// checkpoint on every improvement and the final snapshot at the end.
    pub fn fit(&mut self, train: &FeatureDataset, val: &FeatureDataset) -> Result<TrainingSummary> {
        ensure!(!train.is_empty(), "training split is empty");
        ensure!(!val.is_empty(), "validation split is empty");

        let batch_size = self.config.batch_size.max(1);
        let last_batch = match train.len() % batch_size {
            0 => batch_size.min(train.len()),
            rest => rest,
        };
        ensure!(
            !(last_batch == 1 && self.model.config.uses_batch_norm()),
            "{} training rows with batch_size {} leave a single-row batch, which batch norm \
             cannot train on; change batch_size or the number of training rows",
            train.len(),
            batch_size
        );
        checkpoint::save_config(&self.model.config, &self.checkpoint_dir)?;

        log::info!(
            "Training for up to {} epochs ({} train / {} val rows, {} batches per epoch)",
            self.config.epochs,
            train.len(),
            val.len(),
            train.num_batches(self.config.batch_size)
        );

        let mut history = Vec::new();
        let mut stopped_early = false;
        let mut epoch = 0;
        let (mut train_loss, mut val_loss) = (0.0, 0.0);
        let mut phase = if self.config.epochs == 0 {
            Phase::Stopped
        } else {
            Phase::Training
        };

        while phase != Phase::Stopped {
            phase = match phase {
                Phase::Training => {
                    epoch += 1;
                    train_loss = self.train_epoch(train);
                    Phase::Validating
                }
                Phase::Validating => {
                    val_loss = self.validation_loss(val);
                    Phase::CheckEarlyStop
                }
                Phase::CheckEarlyStop => {
                    log::info!(
                        "Epoch [{}/{}], Train Loss: {:.4}, Val Loss: {:.4}",
                        epoch,
                        self.config.epochs,
                        train_loss,
                        val_loss
                    );
                    history.push(EpochRecord {
                        epoch,
                        train_loss,
                        val_loss,
                        learning_rate: self.scheduler.lr(),
                    });

                    if let Some(lr) = self.scheduler.step(val_loss) {
                        self.optimizer.set_lr(lr);
                        log::info!("Reducing learning rate to {:.2e}", lr);
                    }

                    match self.early_stop.observe(epoch, val_loss) {
                        Verdict::Improved => {
                            let path = self.save(Snapshot::Best)?;
                            log::info!("New best val loss {:.4}, saved {:?}", val_loss, path);
                        }
                        Verdict::Stalled(n) => log::debug!("No improvement for {} epochs", n),
                        Verdict::Stop => {
                            log::info!("Early stopping triggered after {} epochs", epoch);
                            stopped_early = true;
                        }
                    }

                    if stopped_early || epoch >= self.config.epochs {
                        Phase::Stopped
                    } else {
                        Phase::Training
                    }
                }
                Phase::Stopped => Phase::Stopped,
            };
        }

        self.save(Snapshot::Final)?;

        Ok(TrainingSummary {
            history,
            best_epoch: self.early_stop.best_epoch(),
            best_val_loss: self.early_stop.best(),
            stopped_early,
        })
    }

    /// One pass over shuffled training batches; returns the mean batch loss.
    fn train_epoch(&mut self, train: &FeatureDataset) -> f64 {
        let batches = train.shuffled(self.config.batch_size, &mut self.rng, self.config.noise_std);
        let num_batches = batches.len();
        let mut total = 0.0;

        for (batch_idx, batch) in batches.enumerate() {
            let logits = self.model.forward_t(&batch.features, true);
            let loss = self.loss(&logits, &batch.labels);
            self.optimizer.backward_step(&loss);

            let loss_val = loss.double_value(&[]);
            total += loss_val;
            log::debug!("Batch {}/{} | Loss: {:.4}", batch_idx + 1, num_batches, loss_val);
        }

        total / num_batches.max(1) as f64
    }

    /// Mean batch loss over `data` in evaluation mode, without gradients.
    pub fn validation_loss(&self, data: &FeatureDataset) -> f64 {
        let _guard = tch::no_grad_guard();
        let mut total = 0.0;
        let mut count = 0usize;
        for batch in data.sequential(self.config.batch_size) {
            let logits = self.model.forward_t(&batch.features, false);
            total += self.loss(&logits, &batch.labels).double_value(&[]);
            count += 1;
        }
        total / count.max(1) as f64
    }

    fn loss(&self, logits: &Tensor, labels: &Tensor) -> Tensor {
        logits.cross_entropy_loss::<Tensor>(labels, None, Reduction::Mean, -100, self.config.label_smoothing)
    }

    pub fn save(&self, snapshot: Snapshot) -> Result<PathBuf> {
        checkpoint::save_weights(&self.vs, &self.checkpoint_dir, snapshot)
    }

    pub fn load(&mut self, snapshot: Snapshot) -> Result<()> {
        checkpoint::load_weights(&mut self.vs, &self.checkpoint_dir, snapshot)
    }
}
