use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::loader::LabeledData;

/// Shuffled holdout split. The held-out part has `ceil(fraction * n)` rows,
/// the remainder keeps the shuffled order.
pub fn train_val_split(data: &LabeledData, fraction: f64, seed: u64) -> (LabeledData, LabeledData) {
    let n = data.len();
    let n_val = ((n as f64) * fraction.clamp(0.0, 1.0)).ceil() as usize;

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (val_idx, train_idx) = indices.split_at(n_val.min(n));
    (data.select_rows(train_idx), data.select_rows(val_idx))
}
