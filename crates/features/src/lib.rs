pub mod error;
pub mod letor;
pub mod loader;
pub mod matrix;
pub mod preprocess;
pub mod scaler;
pub mod selector;
pub mod split;
pub mod synthetic;

pub use error::FeatureError;
pub use loader::{load_csv, write_csv, LabelEncoding, LabeledData};
pub use matrix::Matrix;
pub use preprocess::Preprocessor;
pub use scaler::{RobustScaler, ScalerStats};
pub use selector::KBestSelector;
pub use split::train_val_split;
