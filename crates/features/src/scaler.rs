use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::matrix::Matrix;

/// Per-feature centre and spread learned from training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerStats {
    pub median: Vec<f32>,
    /// Interquartile range; a zero range is stored as 1.0.
    pub iqr: Vec<f32>,
}

/// Median / IQR scaling: `(x - median) / iqr`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobustScaler {
    stats: Option<ScalerStats>,
}

impl RobustScaler {
    pub fn new() -> Self {
        Self { stats: None }
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        if x.is_empty() {
            return Err(FeatureError::EmptyInput("scaler training data".into()));
        }

        let (median, iqr): (Vec<f32>, Vec<f32>) = (0..x.cols())
            .into_par_iter()
            .map(|j| {
                let mut col: Vec<f64> = x.column(j).map(f64::from).collect();
                col.sort_unstable_by(f64::total_cmp);
                let median = percentile(&col, 50.0);
                let iqr = percentile(&col, 75.0) - percentile(&col, 25.0);
                let iqr = if iqr == 0.0 { 1.0 } else { iqr };
                (median as f32, iqr as f32)
            })
            .unzip();

        let constant = iqr.iter().filter(|&&r| r == 1.0).count();
        log::debug!("Scaler fit on {} columns ({} with unit IQR)", x.cols(), constant);
        self.stats = Some(ScalerStats { median, iqr });
        Ok(())
    }

    pub fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let stats = self.fitted(x.cols())?;
        Ok(x.map_columns(|j, v| (v - stats.median[j]) / stats.iqr[j]))
    }

    pub fn inverse_transform(&self, x: &Matrix) -> Result<Matrix> {
        let stats = self.fitted(x.cols())?;
        Ok(x.map_columns(|j, v| v * stats.iqr[j] + stats.median[j]))
    }

    pub fn stats(&self) -> Option<&ScalerStats> {
        self.stats.as_ref()
    }

    fn fitted(&self, cols: usize) -> Result<&ScalerStats> {
        let stats = self
            .stats
            .as_ref()
            .ok_or(FeatureError::NotFitted("RobustScaler"))?;
        if stats.median.len() != cols {
            return Err(FeatureError::ColumnMismatch {
                expected: stats.median.len(),
                found: cols,
            });
        }
        Ok(stats)
    }
}

/// Linear-interpolated percentile of an ascending slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
