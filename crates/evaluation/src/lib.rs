use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tch::{nn, Device};

use features::Preprocessor;
use ranker_core::checkpoint::{self, PREPROCESSOR_FILE};
use ranker_core::{RelevanceClassifier, Snapshot};

pub mod evaluator;
pub mod report;

pub use evaluator::{evaluate, Evaluation};
pub use report::{ClassMetrics, ClassificationReport, ConfusionMatrix};

/// A trained classifier with the variable store that owns its parameters.
pub struct LoadedModel {
    pub model: RelevanceClassifier,
    pub vs: nn::VarStore,
}

/// Rebuilds the classifier described by `model_config.json` in `dir` and
/// loads the requested snapshot's weights into it.
pub fn load_model(dir: &Path, snapshot: Snapshot, device: Device) -> Result<LoadedModel> {
    let config = checkpoint::read_config(dir)?;

    let mut vs = nn::VarStore::new(device);
    let model = RelevanceClassifier::new(&vs.root(), &config)?;

    tracing::info!("Loading {} weights from {:?}", snapshot, snapshot.path_in(dir));
    checkpoint::load_weights(&mut vs, dir, snapshot)?;

    Ok(LoadedModel { model, vs })
}

pub fn load_preprocessor(dir: &Path) -> Result<Preprocessor> {
    let path = dir.join(PREPROCESSOR_FILE);
    Preprocessor::load(&path).with_context(|| format!("Failed to load preprocessor at {:?}", path))
}

/// Prints accuracy, the classification report and the confusion matrix.
pub fn print_summary(title: &str, evaluation: &Evaluation) {
    println!("Accuracy on {}: {:.2}%", title, evaluation.accuracy());
    println!("\nClassification Report:");
    println!("{}", evaluation.report());
    println!("\nConfusion Matrix:");
    println!("{}", evaluation.confusion);
}

#[derive(Serialize)]
struct ReportFile<'a> {
    accuracy: f64,
    report: ClassificationReport,
    confusion_matrix: &'a ConfusionMatrix,
}

/// Writes the classification report and confusion counts as JSON.
pub fn write_report(path: &Path, evaluation: &Evaluation) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    let body = ReportFile {
        accuracy: evaluation.accuracy(),
        report: evaluation.report(),
        confusion_matrix: &evaluation.confusion,
    };
    serde_json::to_writer_pretty(writer, &body)
        .with_context(|| format!("Failed to write report to {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranker_core::checkpoint::{save_config, save_weights};
    use ranker_core::ModelConfig;
    use tch::nn::ModuleT;
    use tch::{Kind, Tensor};

    #[test]
    fn loads_the_requested_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig::compact(4);

        let vs = nn::VarStore::new(Device::Cpu);
        let model = RelevanceClassifier::new(&vs.root(), &config).unwrap();
        save_config(&config, dir.path()).unwrap();
        save_weights(&vs, dir.path(), Snapshot::Final).unwrap();

        let loaded = load_model(dir.path(), Snapshot::Final, Device::Cpu).unwrap();
        let x = Tensor::randn(&[5, 4], (Kind::Float, Device::Cpu));
        let expected = tch::no_grad(|| model.forward_t(&x, false));
        let actual = tch::no_grad(|| loaded.model.forward_t(&x, false));
        assert!(expected.allclose(&actual, 1e-6, 1e-6, false));

        // Only the final snapshot was written.
        assert!(load_model(dir.path(), Snapshot::Best, Device::Cpu).is_err());
    }

    #[test]
    fn report_json_has_accuracy_and_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let mut confusion = ConfusionMatrix::new(2);
        confusion.record(0, 0);
        confusion.record(1, 0);
        let path = dir.path().join("report.json");
        write_report(&path, &Evaluation { confusion }).unwrap();

        let value: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(value["accuracy"], 50.0);
        assert_eq!(value["confusion_matrix"]["counts"][1][0], 1);
        assert_eq!(value["report"]["classes"][0]["support"], 1);
    }
}
