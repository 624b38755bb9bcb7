use tch::{nn, Tensor};
use crate::config::{Activation, ModelConfig};
use crate::norm::Norm;

/// Residual block:
/// `act(norm2(linear2(dropout(act(norm1(linear1(x)))))) + shortcut(x))`.
/// The shortcut is the identity when widths match, otherwise a linear projection.
#[derive(Debug)]
pub struct ResidualBlock {
    linear1: nn::Linear,
    norm1: Norm,
    linear2: nn::Linear,
    norm2: Norm,
    shortcut: Option<nn::Linear>,
    activation: Activation,
    leaky_slope: f64,
    dropout: f64,
}

impl ResidualBlock {
    pub fn new(vs: &nn::Path, in_dim: i64, out_dim: i64, config: &ModelConfig) -> Self {
        let eps = config.norm_epsilon;
        let linear1 = nn::linear(vs / "linear1", in_dim, out_dim, Default::default());
        let norm1 = Norm::new(&(vs / "norm1"), config.inner_norm, out_dim, eps);
        let linear2 = nn::linear(vs / "linear2", out_dim, out_dim, Default::default());
        let norm2 = Norm::new(&(vs / "norm2"), config.outer_norm, out_dim, eps);

        let shortcut = (in_dim != out_dim)
            .then(|| nn::linear(vs / "shortcut", in_dim, out_dim, Default::default()));

        Self {
            linear1,
            norm1,
            linear2,
            norm2,
            shortcut,
            activation: config.activation,
            leaky_slope: config.leaky_slope,
            dropout: config.block_dropout,
        }
    }

    pub fn forward_t(&self, x: &Tensor, train: bool) -> Tensor {
        let h = x.apply(&self.linear1);
        let h = self.activate(&self.norm1.forward_t(&h, train));
        let h = h.dropout(self.dropout, train).apply(&self.linear2);
        let h = self.norm2.forward_t(&h, train);

        let residual = match &self.shortcut {
            Some(proj) => x.apply(proj),
            None => x.shallow_clone(),
        };
        self.activate(&(h + residual))
    }

    fn activate(&self, x: &Tensor) -> Tensor {
        match self.activation {
            Activation::Gelu => x.gelu("none"),
            Activation::LeakyRelu => x.clamp_min(0.0) + x.clamp_max(0.0) * self.leaky_slope,
        }
    }

    pub fn has_projection(&self) -> bool {
        self.shortcut.is_some()
    }
}
