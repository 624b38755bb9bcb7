use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::matrix::Matrix;

/// Keeps the `k` columns with the highest one-way ANOVA F-statistic against
/// the class label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KBestSelector {
    k: usize,
    n_features_in: Option<usize>,
    selected: Option<Vec<usize>>,
    #[serde(skip)]
    scores: Option<Vec<f64>>,
}

impl KBestSelector {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            n_features_in: None,
            selected: None,
            scores: None,
        }
    }

    pub fn fit(&mut self, x: &Matrix, y: &[i64]) -> Result<()> {
        if x.rows() != y.len() {
            return Err(FeatureError::LengthMismatch {
                rows: x.rows(),
                labels: y.len(),
            });
        }
        if x.is_empty() {
            return Err(FeatureError::EmptyInput("selector training data".into()));
        }

        let scores: Vec<f64> = (0..x.cols())
            .into_par_iter()
            .map(|j| f_statistic(x.column(j), y))
            .collect();

        let k = self.k.min(x.cols());
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| rank_key(scores[b]).total_cmp(&rank_key(scores[a])));
        let mut selected = order[..k].to_vec();
        selected.sort_unstable();

        log::info!("Selected {} of {} features: {:?}", k, x.cols(), selected);
        self.n_features_in = Some(x.cols());
        self.selected = Some(selected);
        self.scores = Some(scores);
        Ok(())
    }

    pub fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let (selected, n_in) = match (&self.selected, self.n_features_in) {
            (Some(s), Some(n)) => (s, n),
            _ => return Err(FeatureError::NotFitted("KBestSelector")),
        };
        if x.cols() != n_in {
            return Err(FeatureError::ColumnMismatch {
                expected: n_in,
                found: x.cols(),
            });
        }
        Ok(x.select_columns(selected))
    }

    /// Column indices kept by the fitted selector, in ascending order.
    pub fn selected(&self) -> Option<&[usize]> {
        self.selected.as_deref()
    }

    /// F-scores from the last fit. Not persisted.
    pub fn scores(&self) -> Option<&[f64]> {
        self.scores.as_deref()
    }

    pub fn n_features_out(&self) -> Option<usize> {
        self.selected.as_ref().map(Vec::len)
    }
}

// NaN (constant column) ranks below every real score.
fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

fn f_statistic(column: impl Iterator<Item = f32>, y: &[i64]) -> f64 {
    let mut groups: Vec<(i64, usize, f64, f64)> = Vec::new();
    let mut total_sum = 0.0;
    let mut n = 0usize;

    for (v, &label) in column.zip(y) {
        let v = v as f64;
        total_sum += v;
        n += 1;
        match groups.iter_mut().find(|g| g.0 == label) {
            Some(g) => {
                g.1 += 1;
                g.2 += v;
                g.3 += v * v;
            }
            None => groups.push((label, 1, v, v * v)),
        }
    }

    let k = groups.len();
    if k < 2 || n <= k {
        return f64::NAN;
    }

    let grand_mean = total_sum / n as f64;
    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for &(_, count, sum, sum_sq) in &groups {
        let mean = sum / count as f64;
        ss_between += count as f64 * (mean - grand_mean).powi(2);
        ss_within += sum_sq - count as f64 * mean * mean;
    }
    let ss_within = ss_within.max(0.0);

    let ms_between = ss_between / (k - 1) as f64;
    let ms_within = ss_within / (n - k) as f64;
    ms_between / ms_within
}
