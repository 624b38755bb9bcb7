use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use features::letor::{build_pairs, read_judgements, DEFAULT_FEATURE_IDS};
use features::synthetic::linear_separable;
use features::{load_csv, train_val_split, write_csv, LabelEncoding, LabeledData};

#[derive(Parser)]
#[command(author, version, about = "Prepare CSV datasets for relevance training", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build pairwise difference rows from a LETOR judgement file
    Pairwise {
        /// LETOR text file (`rel qid:Q id:value ...`)
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV, last column is the signed label
        #[arg(short, long)]
        output: PathBuf,

        /// Minimum relevance gap between paired documents
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..=4))]
        min_diff: i64,

        /// Upper bound on emitted pairs (uniform sample)
        #[arg(long, default_value_t = 1_000_000)]
        max_examples: usize,

        /// Feature ids to keep, comma separated
        #[arg(long, value_delimiter = ',')]
        features: Option<Vec<u32>>,

        /// Fail instead of warning when fewer than max_examples pairs exist
        #[arg(long)]
        strict: bool,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Split a labelled CSV into train and validation files
    Split {
        #[arg(short, long)]
        input: PathBuf,

        /// Directory receiving train.csv and val.csv
        #[arg(short, long)]
        output_dir: PathBuf,

        #[arg(long, default_value_t = 0.2)]
        val_fraction: f64,

        /// Labels are {0,1} instead of {-1,+1}
        #[arg(long)]
        binary_labels: bool,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Write a linearly separable CSV with signed labels
    Synth {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long, default_value_t = 1000)]
        rows: usize,

        #[arg(short, long, default_value_t = 20)]
        dims: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn write_labeled(path: &Path, data: &LabeledData, encoding: LabelEncoding) -> Result<()> {
    let raw: Vec<i64> = data.labels.iter().map(|&c| encoding.decode(c)).collect();
    write_csv(path, &data.features, &raw).with_context(|| format!("Failed to write {:?}", path))?;
    println!("Wrote {} rows to {:?}", data.len(), path);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Pairwise {
            input,
            output,
            min_diff,
            max_examples,
            features,
            strict,
            seed,
        } => {
            let ids = features.unwrap_or_else(|| DEFAULT_FEATURE_IDS.to_vec());
            let judgements = read_judgements(&input, &ids)
                .with_context(|| format!("Failed to read judgements from {:?}", input))?;
            log::info!("Read {} judgements from {:?}", judgements.len(), input);

            let pairs = build_pairs(&judgements, min_diff, max_examples, seed)?;
            if pairs.candidates < max_examples {
                let msg = format!(
                    "only {} pairs with a relevance gap of at least {}, wanted {}",
                    pairs.candidates, min_diff, max_examples
                );
                if strict {
                    bail!(msg);
                }
                log::warn!("{}", msg);
            }

            write_csv(&output, &pairs.features, &pairs.labels)
                .with_context(|| format!("Failed to write {:?}", output))?;
            println!("Wrote {} pairs to {:?}", pairs.labels.len(), output);
        }
        Commands::Split {
            input,
            output_dir,
            val_fraction,
            binary_labels,
            seed,
        } => {
            let encoding = if binary_labels {
                LabelEncoding::Binary
            } else {
                LabelEncoding::Signed
            };
            let data = load_csv(&input, encoding)
                .with_context(|| format!("Failed to load {:?}", input))?;
            let (train, val) = train_val_split(&data, val_fraction, seed);

            fs::create_dir_all(&output_dir)?;
            write_labeled(&output_dir.join("train.csv"), &train, encoding)?;
            write_labeled(&output_dir.join("val.csv"), &val, encoding)?;
        }
        Commands::Synth {
            output,
            rows,
            dims,
            seed,
        } => {
            let (data, signed) = linear_separable(rows, dims, seed)?;
            write_csv(&output, &data.features, &signed)
                .with_context(|| format!("Failed to write {:?}", output))?;
            println!("Wrote {} rows x {} features to {:?}", rows, dims, output);
        }
    }

    Ok(())
}
