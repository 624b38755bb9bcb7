pub mod block;
pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod device;
pub mod norm;
pub mod safetensors_util;

pub use checkpoint::Snapshot;
pub use classifier::RelevanceClassifier;
pub use config::{Activation, ModelConfig, NormKind};
pub use dataset::{Batch, FeatureDataset};
pub use device::compute_device;
