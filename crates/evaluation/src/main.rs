use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use evaluation::{evaluate, load_model, load_preprocessor, print_summary, write_report};
use features::{load_csv, LabelEncoding};
use ranker_core::{compute_device, FeatureDataset, Snapshot};

#[derive(Parser)]
#[command(author, version, about = "Evaluate a trained relevance classifier on a labelled CSV")]
struct Cli {
    /// Labelled CSV to evaluate (last column is the label)
    #[arg(short, long)]
    test: PathBuf,

    /// Directory holding model_config.json, preprocessor.json and the weight snapshots
    #[arg(short, long, default_value = "checkpoints")]
    model_dir: PathBuf,

    /// Which snapshot to load: best or final
    #[arg(long, default_value_t = Snapshot::Best)]
    snapshot: Snapshot,

    #[arg(long, default_value_t = 16384)]
    batch_size: usize,

    /// Treat the label column as already binary {0,1} instead of {-1,+1}
    #[arg(long)]
    binary_labels: bool,

    /// Also write accuracy, report and confusion matrix as JSON
    #[arg(long)]
    report_json: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let device = compute_device();
    let encoding = if cli.binary_labels {
        LabelEncoding::Binary
    } else {
        LabelEncoding::Signed
    };

    let preprocessor = load_preprocessor(&cli.model_dir)?;
    let loaded = load_model(&cli.model_dir, cli.snapshot, device)?;

    let data = load_csv(&cli.test, encoding)
        .with_context(|| format!("Failed to load test data from {:?}", cli.test))?;
    let features = preprocessor.transform(&data.features)?;
    let dataset = FeatureDataset::new(features.as_slice(), &data.labels, features.cols(), device)?;

    println!("Testing the model...");
    let result = evaluate(&loaded.model, dataset.sequential(cli.batch_size))?;
    print_summary("the test set", &result);
    if let Some(path) = &cli.report_json {
        write_report(path, &result)?;
        tracing::info!("Wrote report to {:?}", path);
    }

    Ok(())
}
