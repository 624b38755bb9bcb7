use anyhow::Result;
use tch::{nn, Tensor};
use crate::block::ResidualBlock;
use crate::config::ModelConfig;

/// Stack of residual blocks followed by dropout and a linear head producing
/// one logit per class.
#[derive(Debug)]
pub struct RelevanceClassifier {
    blocks: Vec<ResidualBlock>,
    head_dropout: f64,
    head: nn::Linear,
    pub config: ModelConfig,
}

impl RelevanceClassifier {
    pub fn new(vs: &nn::Path, config: &ModelConfig) -> Result<Self> {
        config.validate()?;

        let mut blocks = Vec::with_capacity(config.block_widths.len());
        let mut in_dim = config.input_dim;
        for (i, &out_dim) in config.block_widths.iter().enumerate() {
            blocks.push(ResidualBlock::new(&(vs / "blocks" / i), in_dim, out_dim, config));
            in_dim = out_dim;
        }

        let head = nn::linear(
            vs / "head",
            config.head_input_dim(),
            config.num_classes,
            Default::default(),
        );

        Ok(Self {
            blocks,
            head_dropout: config.head_dropout,
            head,
            config: config.clone(),
        })
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }
}

impl nn::ModuleT for RelevanceClassifier {
    /// xs: [batch, input_dim] -> logits [batch, num_classes]
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let mut x = xs.shallow_clone();
        for block in &self.blocks {
            x = block.forward_t(&x, train);
        }
        x.dropout(self.head_dropout, train).apply(&self.head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormKind;
    use tch::{nn::ModuleT, Device, Kind};

    #[test]
    fn produces_two_logits_per_row() {
        let vs = nn::VarStore::new(Device::Cpu);
        let model = RelevanceClassifier::new(&vs.root(), &ModelConfig::wide(12)).unwrap();
        let x = Tensor::randn(&[8, 12], (Kind::Float, Device::Cpu));
        let logits = model.forward_t(&x, true);
        assert_eq!(logits.size(), vec![8, 2]);
        assert_eq!(model.num_blocks(), 6);
    }

    #[test]
    fn projection_only_where_widths_change() {
        let vs = nn::VarStore::new(Device::Cpu);
        let mut config = ModelConfig::compact(16);
        config.block_widths = vec![16, 8, 8];
        let model = RelevanceClassifier::new(&vs.root(), &config).unwrap();
        let projections: Vec<bool> = model.blocks.iter().map(|b| b.has_projection()).collect();
        assert_eq!(projections, vec![false, true, false]);
        assert!(vs.variables().contains_key("blocks.1.shortcut.weight"));
        assert!(!vs.variables().contains_key("blocks.0.shortcut.weight"));
    }

    #[test]
    fn eval_mode_is_deterministic() {
        let vs = nn::VarStore::new(Device::Cpu);
        let mut config = ModelConfig::compact(6);
        config.inner_norm = NormKind::Layer;
        let model = RelevanceClassifier::new(&vs.root(), &config).unwrap();
        let x = Tensor::randn(&[4, 6], (Kind::Float, Device::Cpu));
        let a = tch::no_grad(|| model.forward_t(&x, false));
        let b = tch::no_grad(|| model.forward_t(&x, false));
        assert!(a.allclose(&b, 1e-6, 1e-6, false));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let vs = nn::VarStore::new(Device::Cpu);
        let mut config = ModelConfig::compact(6);
        config.block_widths = vec![8, 0];
        assert!(RelevanceClassifier::new(&vs.root(), &config).is_err());
    }

    #[test]
    fn linear_config_is_a_single_head() {
        let vs = nn::VarStore::new(Device::Cpu);
        let model = RelevanceClassifier::new(&vs.root(), &ModelConfig::linear(6)).unwrap();
        assert_eq!(model.num_blocks(), 0);

        let mut names: Vec<String> = vs.variables().into_keys().collect();
        names.sort();
        assert_eq!(names, vec!["head.bias", "head.weight"]);

        // A single row is fine without batch statistics.
        let x = Tensor::randn(&[1, 6], (Kind::Float, Device::Cpu));
        assert_eq!(model.forward_t(&x, true).size(), vec![1, 2]);
    }
}
