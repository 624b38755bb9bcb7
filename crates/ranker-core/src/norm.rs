use tch::{nn, Tensor};
use crate::config::NormKind;

/// Either batch or layer normalization over a `[batch, dim]` input.
#[derive(Debug)]
pub enum Norm {
    Batch(nn::BatchNorm),
    Layer(nn::LayerNorm),
}

impl Norm {
    pub fn new(vs: &nn::Path, kind: NormKind, dim: i64, eps: f64) -> Self {
        match kind {
            NormKind::Batch => Norm::Batch(nn::batch_norm1d(
                vs,
                dim,
                nn::BatchNormConfig {
                    eps,
                    ..Default::default()
                },
            )),
            NormKind::Layer => Norm::Layer(nn::layer_norm(
                vs,
                vec![dim],
                nn::LayerNormConfig {
                    eps,
                    ..Default::default()
                },
            )),
        }
    }

    /// `train` switches batch norm between batch statistics and running averages.
    pub fn forward_t(&self, x: &Tensor, train: bool) -> Tensor {
        match self {
            Norm::Batch(bn) => x.apply_t(bn, train),
            Norm::Layer(ln) => x.apply(ln),
        }
    }
}
