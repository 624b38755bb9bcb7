use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Gelu,
    LeakyRelu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormKind {
    /// Per-feature statistics across the batch.
    Batch,
    /// Per-sample statistics across features.
    Layer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Width of the preprocessed feature vector. Overwritten from the fitted preprocessor.
    pub input_dim: i64,
    /// Output width of each residual block, in order.
    pub block_widths: Vec<i64>,
    pub activation: Activation,
    /// Negative slope, only used by `LeakyRelu`.
    #[serde(default = "default_leaky_slope")]
    pub leaky_slope: f64,
    /// Normalization after the first linear layer of a block.
    pub inner_norm: NormKind,
    /// Normalization after the second linear layer, before the residual add.
    pub outer_norm: NormKind,
    /// Dropout inside each residual block.
    pub block_dropout: f64,
    /// Dropout before the classification head.
    pub head_dropout: f64,
    pub norm_epsilon: f64,
    pub num_classes: i64,
}

fn default_leaky_slope() -> f64 {
    0.1
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::wide(50)
    }
}

impl ModelConfig {
    /// Six blocks 128-256-512-256-128-64, GELU, layer then batch norm.
    pub fn wide(input_dim: i64) -> Self {
        Self {
            input_dim,
            block_widths: vec![128, 256, 512, 256, 128, 64],
            activation: Activation::Gelu,
            leaky_slope: default_leaky_slope(),
            inner_norm: NormKind::Layer,
            outer_norm: NormKind::Batch,
            block_dropout: 0.3,
            head_dropout: 0.4,
            norm_epsilon: 1e-5,
            num_classes: 2,
        }
    }

    /// Four blocks 128-64-32-16, leaky ReLU(0.1), batch norm throughout.
    pub fn compact(input_dim: i64) -> Self {
        Self {
            input_dim,
            block_widths: vec![128, 64, 32, 16],
            activation: Activation::LeakyRelu,
            leaky_slope: 0.1,
            inner_norm: NormKind::Batch,
            outer_norm: NormKind::Batch,
            block_dropout: 0.3,
            head_dropout: 0.0,
            norm_epsilon: 1e-5,
            num_classes: 2,
        }
    }

    /// No hidden blocks: a single linear layer over the features, i.e. a
    /// logistic-regression baseline. Weight decay plays the role of the L2 penalty.
    pub fn linear(input_dim: i64) -> Self {
        Self {
            block_widths: Vec::new(),
            head_dropout: 0.0,
            ..Self::compact(input_dim)
        }
    }

    /// True when some layer normalizes with batch statistics, which needs
    /// more than one row per training batch.
    pub fn uses_batch_norm(&self) -> bool {
        !self.block_widths.is_empty()
            && (self.inner_norm == NormKind::Batch || self.outer_norm == NormKind::Batch)
    }

    /// Width fed to the classification head.
    pub fn head_input_dim(&self) -> i64 {
        self.block_widths.last().copied().unwrap_or(self.input_dim)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.input_dim > 0, "input_dim must be positive, got {}", self.input_dim);
        ensure!(
            self.block_widths.iter().all(|&w| w > 0),
            "block widths must be positive: {:?}",
            self.block_widths
        );
        ensure!(self.num_classes >= 2, "num_classes must be at least 2");
        for p in [self.block_dropout, self.head_dropout] {
            ensure!((0.0..1.0).contains(&p), "dropout {} outside [0, 1)", p);
        }
        Ok(())
    }
}
