use anyhow::Result;
use tch::nn::ModuleT;
use tch::Device;

use ranker_core::{Batch, RelevanceClassifier};

use crate::report::{ClassificationReport, ConfusionMatrix};

/// Outcome of a read-only pass over held-out batches.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub confusion: ConfusionMatrix,
}

impl Evaluation {
    pub fn total(&self) -> u64 {
        self.confusion.total()
    }

    pub fn correct(&self) -> u64 {
        self.confusion.correct()
    }

    /// Percentage of correctly classified samples.
    pub fn accuracy(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        100.0 * self.correct() as f64 / self.total() as f64
    }

    pub fn report(&self) -> ClassificationReport {
        self.confusion.report()
    }
}

/// Predicts the arg-max class for every batch and accumulates the confusion matrix.
pub fn evaluate<I>(model: &RelevanceClassifier, batches: I) -> Result<Evaluation>
where
    I: IntoIterator<Item = Batch>,
{
    let _guard = tch::no_grad_guard();
    let mut confusion = ConfusionMatrix::new(model.config.num_classes as usize);

    for batch in batches {
        let predicted = model
            .forward_t(&batch.features, false)
            .argmax(-1, false)
            .to_device(Device::Cpu);
        let predicted = Vec::<i64>::try_from(&predicted)?;
        let truth = Vec::<i64>::try_from(&batch.labels.to_device(Device::Cpu))?;

        for (t, p) in truth.into_iter().zip(predicted) {
            confusion.record(t as usize, p as usize);
        }
    }

    tracing::debug!("Evaluated {} samples", confusion.total());
    Ok(Evaluation { confusion })
}
