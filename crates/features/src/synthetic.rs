use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::loader::LabeledData;
use crate::matrix::Matrix;

/// Uniform features in [-1, 1) labelled by the sign of a fixed random
/// hyperplane. Labels are returned in the signed {-1, +1} convention
/// alongside the encoded {0, 1} data.
pub fn linear_separable(n: usize, d: usize, seed: u64) -> Result<(LabeledData, Vec<i64>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let weights: Vec<f32> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let mut data = Vec::with_capacity(n * d);
    let mut signed = Vec::with_capacity(n);
    for _ in 0..n {
        let row: Vec<f32> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let score: f32 = row.iter().zip(&weights).map(|(x, w)| x * w).sum();
        signed.push(if score >= 0.0 { 1 } else { -1 });
        data.extend(row);
    }

    let labels = signed.iter().map(|&s| (s + 1) / 2).collect();
    let data = LabeledData::new(Matrix::new(n, d, data)?, labels)?;
    Ok((data, signed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_and_label_domain() {
        let (data, signed) = linear_separable(200, 5, 1).unwrap();
        assert_eq!(data.len(), 200);
        assert_eq!(data.n_features(), 5);
        assert!(signed.iter().all(|s| *s == 1 || *s == -1));
        assert!(data.labels.iter().any(|&l| l == 0));
        assert!(data.labels.iter().any(|&l| l == 1));
    }
}
