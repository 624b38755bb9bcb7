use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{FeatureError, Result};
use crate::matrix::Matrix;
use crate::scaler::RobustScaler;
use crate::selector::KBestSelector;

/// Optional k-best selection followed by robust scaling. Fit on the training
/// split only; validation and test rows go through `transform`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    selector: Option<KBestSelector>,
    scaler: RobustScaler,
    fitted: bool,
}

impl Preprocessor {
    pub fn new(select_k: Option<usize>) -> Self {
        Self {
            selector: select_k.map(KBestSelector::new),
            scaler: RobustScaler::new(),
            fitted: false,
        }
    }

    pub fn fit(&mut self, x: &Matrix, y: &[i64]) -> Result<()> {
        let selected = match &mut self.selector {
            Some(selector) => {
                selector.fit(x, y)?;
                selector.transform(x)?
            }
            None => x.clone(),
        };
        self.scaler.fit(&selected)?;
        self.fitted = true;
        Ok(())
    }

    pub fn fit_transform(&mut self, x: &Matrix, y: &[i64]) -> Result<Matrix> {
        self.fit(x, y)?;
        self.transform(x)
    }

    pub fn transform(&self, x: &Matrix) -> Result<Matrix> {
        if !self.fitted {
            return Err(FeatureError::NotFitted("Preprocessor"));
        }
        match &self.selector {
            Some(selector) => self.scaler.transform(&selector.transform(x)?),
            None => self.scaler.transform(x),
        }
    }

    /// Width of transformed rows, known once fitted.
    pub fn output_dim(&self) -> Option<usize> {
        self.scaler.stats().map(|s| s.median.len())
    }

    pub fn selected_features(&self) -> Option<&[usize]> {
        self.selector.as_ref().and_then(|s| s.selected())
    }

    pub fn scaler(&self) -> &RobustScaler {
        &self.scaler
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
