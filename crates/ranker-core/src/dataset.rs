use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use tch::{Device, Kind, Tensor};

/// Scaled feature rows and class labels held on the CPU; batches are moved
/// to `device` as they are drawn.
pub struct FeatureDataset {
    features: Tensor,
    labels: Tensor,
    len: usize,
    n_features: usize,
    device: Device,
}

/// One mini-batch: features [b, n_features] (Float) and labels [b] (Int64).
pub struct Batch {
    pub features: Tensor,
    pub labels: Tensor,
}

impl FeatureDataset {
    /// `features` is row-major with `n_features` columns per row.
    pub fn new(features: &[f32], labels: &[i64], n_features: usize, device: Device) -> Result<Self> {
        ensure!(n_features > 0, "dataset needs at least one feature column");
        ensure!(
            features.len() == labels.len() * n_features,
            "{} values do not form {} rows of {} features",
            features.len(),
            labels.len(),
            n_features
        );

        let len = labels.len();
        let features = Tensor::from_slice(features).view([len as i64, n_features as i64]);
        let labels = Tensor::from_slice(labels);

        Ok(Self {
            features,
            labels,
            len,
            n_features,
            device,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// `ceil(len / batch_size)`.
    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.len.div_ceil(batch_size.max(1))
    }

    /// Batches in stored order; used for validation and test passes.
    pub fn sequential(&self, batch_size: usize) -> Batches<'_> {
        Batches {
            dataset: self,
            order: None,
            batch_size: batch_size.max(1),
            cursor: 0,
            noise_std: None,
        }
    }

    /// Batches in a fresh random order, optionally adding N(0, noise_std)
    /// to every feature value.
    pub fn shuffled<R: Rng>(&self, batch_size: usize, rng: &mut R, noise_std: Option<f64>) -> Batches<'_> {
        let mut order: Vec<i64> = (0..self.len as i64).collect();
        order.shuffle(rng);
        Batches {
            dataset: self,
            order: Some(order),
            batch_size: batch_size.max(1),
            cursor: 0,
            noise_std: noise_std.filter(|s| *s > 0.0),
        }
    }
}

pub struct Batches<'a> {
    dataset: &'a FeatureDataset,
    order: Option<Vec<i64>>,
    batch_size: usize,
    cursor: usize,
    noise_std: Option<f64>,
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let len = self.dataset.len;
        if self.cursor >= len {
            return None;
        }
        let start = self.cursor;
        let size = self.batch_size.min(len - start);
        self.cursor += size;

        let (features, labels) = match &self.order {
            Some(order) => {
                let idx = Tensor::from_slice(&order[start..start + size]);
                (
                    self.dataset.features.index_select(0, &idx),
                    self.dataset.labels.index_select(0, &idx),
                )
            }
            None => (
                self.dataset.features.narrow(0, start as i64, size as i64),
                self.dataset.labels.narrow(0, start as i64, size as i64),
            ),
        };

        let features = match self.noise_std {
            Some(std) => &features + features.randn_like() * std,
            None => features,
        };

        let device = self.dataset.device;
        Some(Batch {
            features: features.to_kind(Kind::Float).to(device),
            labels: labels.to(device),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.dataset.len - self.cursor.min(self.dataset.len)).div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Batches<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dataset(n: usize) -> FeatureDataset {
        let features: Vec<f32> = (0..n * 2).map(|v| v as f32).collect();
        let labels: Vec<i64> = (0..n as i64).map(|i| i % 2).collect();
        FeatureDataset::new(&features, &labels, 2, Device::Cpu).unwrap()
    }

    fn first_column(batch: &Batch) -> Vec<f32> {
        Vec::<f32>::try_from(&batch.features.select(1, 0)).unwrap()
    }

    #[test]
    fn batch_count_and_sizes() {
        let ds = dataset(10);
        let sizes: Vec<i64> = ds.sequential(4).map(|b| b.labels.size()[0]).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(ds.num_batches(4), 3);
        assert_eq!(ds.sequential(4).len(), 3);
        assert_eq!(sizes.iter().sum::<i64>(), 10);
    }

    #[test]
    fn sequential_preserves_order() {
        let ds = dataset(5);
        let rows: Vec<f32> = ds.sequential(2).flat_map(|b| first_column(&b)).collect();
        assert_eq!(rows, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn shuffled_is_a_permutation_and_restartable() {
        let ds = dataset(9);
        let mut rng = StdRng::seed_from_u64(3);
        let mut a: Vec<f32> = ds.shuffled(4, &mut rng, None).flat_map(|b| first_column(&b)).collect();
        let b: Vec<f32> = ds.shuffled(4, &mut rng, None).flat_map(|b| first_column(&b)).collect();
        assert_eq!(b.len(), 9);
        a.sort_by(f32::total_cmp);
        assert_eq!(a, (0..9).map(|i| (i * 2) as f32).collect::<Vec<_>>());
    }

    #[test]
    fn noise_only_perturbs_features() {
        let ds = dataset(6);
        let mut rng = StdRng::seed_from_u64(0);
        let clean: Vec<i64> = ds
            .shuffled(6, &mut StdRng::seed_from_u64(0), None)
            .flat_map(|b| Vec::<i64>::try_from(&b.labels).unwrap())
            .collect();
        let batch = ds.shuffled(6, &mut rng, Some(0.01)).next().unwrap();
        let noisy_labels = Vec::<i64>::try_from(&batch.labels).unwrap();
        assert_eq!(noisy_labels, clean);

        let values = first_column(&batch);
        assert!(values.iter().all(|v| (v - v.round()).abs() < 0.1));
        assert!(values.iter().any(|v| v.fract() != 0.0));
    }

    #[test]
    fn rejects_ragged_input() {
        assert!(FeatureDataset::new(&[1.0, 2.0, 3.0], &[0, 1], 2, Device::Cpu).is_err());
    }
}
