//! Landmark Recognition CLI
//!
//! Entry point for training the landmark classifier over a sharded image
//! store and assembling a ranked submission for the unlabeled test split.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use landmark_recognition::backend::{backend_name, default_device, TrainingBackend};
use landmark_recognition::dataset::metadata::{
    encode_samples, filter_existing, filter_frequent_classes, read_test_metadata,
    read_train_metadata, LabelEncoder,
};
use landmark_recognition::dataset::{LandmarkDataset, Sample, ShardedLocator, Split};
use landmark_recognition::inference::{predict_valid, InferenceConfig};
use landmark_recognition::model::{LandmarkClassifier, LandmarkClassifierConfig};
use landmark_recognition::submission::SubmissionTable;
use landmark_recognition::training::{epoch_budget, TracingObserver, TrainConfig, Trainer};
use landmark_recognition::utils::format_duration;
use landmark_recognition::utils::logging::{init_logging, LogConfig};
use landmark_recognition::BatchLoader;

/// Landmark Recognition
///
/// Trains a CNN classifier over a long-tailed landmark label space and
/// produces a ranked top-K submission for the test split.
#[derive(Parser, Debug)]
#[command(name = "landmark_recognition")]
#[command(version = landmark_recognition::VERSION)]
#[command(about = "Landmark image classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the classifier, then assemble the test submission
    Run {
        /// Root directory of the sharded image store
        #[arg(short, long, default_value = "data")]
        data_dir: String,

        /// CSV with id,url,landmark_id rows for the train split
        #[arg(long, default_value = "data/train.csv")]
        train_csv: String,

        /// CSV with test sample ids
        #[arg(long, default_value = "data/test.csv")]
        test_csv: String,

        /// Submission template CSV (id,landmarks)
        #[arg(long, default_value = "data/sample_submission.csv")]
        template: String,

        /// Output path for the assembled submission
        #[arg(short, long, default_value = "submission.csv")]
        output: String,

        /// Number of training epochs
        #[arg(short, long, default_value = "4")]
        epochs: usize,

        /// Batch size for training and inference
        #[arg(short, long, default_value = "128")]
        batch_size: usize,

        /// Drop classes with fewer training samples than this
        #[arg(long, default_value = "50")]
        min_samples: usize,

        /// Upper bound on batches per epoch
        #[arg(long, default_value = "18000")]
        step_cap: usize,
    },

    /// Show class statistics for the train metadata
    Stats {
        /// CSV with id,url,landmark_id rows for the train split
        #[arg(long, default_value = "data/train.csv")]
        train_csv: String,

        /// Frequency threshold used by the class filter
        #[arg(long, default_value = "50")]
        min_samples: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();

    match cli.command {
        Commands::Run {
            data_dir,
            train_csv,
            test_csv,
            template,
            output,
            epochs,
            batch_size,
            min_samples,
            step_cap,
        } => {
            cmd_run(
                &data_dir,
                &train_csv,
                &test_csv,
                &template,
                &output,
                epochs,
                batch_size,
                min_samples,
                step_cap,
            )?;
        }

        Commands::Stats {
            train_csv,
            min_samples,
        } => {
            cmd_stats(&train_csv, min_samples)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════╗
 ║   Landmark Recognition                       ║
 ║   Ranked image classification with Burn      ║
 ╚══════════════════════════════════════════════╝
  "#
        .cyan()
    );
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    data_dir: &str,
    train_csv: &str,
    test_csv: &str,
    template: &str,
    output: &str,
    epochs: usize,
    batch_size: usize,
    min_samples: usize,
    step_cap: usize,
) -> Result<()> {
    let started = Instant::now();
    let device = default_device();
    info!("using {} backend", backend_name());

    let locator = Arc::new(ShardedLocator::new(data_dir));

    // Train metadata: frequency filter, then drop rows without a file on disk
    let records = read_train_metadata(train_csv)
        .with_context(|| format!("reading train metadata from {train_csv}"))?;
    let total = records.len();
    let records = filter_frequent_classes(records, min_samples);
    let records = filter_existing(records, locator.as_ref(), Split::Train, |r| &r.id);
    println!(
        "{} {} of {} train samples kept after filtering",
        "Data:".green(),
        records.len(),
        total
    );

    let encoder = LabelEncoder::fit(records.iter().map(|r| r.landmark_id.as_str()));
    let num_classes = encoder.num_classes();
    println!("{} {} classes", "Data:".green(), num_classes);

    let samples = encode_samples(&records, &encoder)?;
    let train_dataset = LandmarkDataset::new(samples, Split::Train, locator.clone());
    let train_loader = BatchLoader::new(&train_dataset, batch_size);

    // Training
    let model_config = LandmarkClassifierConfig::new(num_classes);
    let model = LandmarkClassifier::<TrainingBackend>::new(&model_config, &device);

    let train_config = TrainConfig {
        step_cap,
        ..Default::default()
    };
    let mut trainer = Trainer::new(model, train_config, device.clone());
    let mut observer = TracingObserver;

    println!(
        "{} {} epochs, {} batches per epoch (cap {})",
        "Training:".green(),
        epochs,
        train_loader.len(),
        step_cap
    );
    trainer.fit(&train_loader, &mut observer, epoch_budget(epochs))?;
    println!(
        "{} finished in {}",
        "Training:".green(),
        format_duration(started.elapsed().as_secs_f64())
    );

    // Test metadata and ranked inference
    let test_ids = read_test_metadata(test_csv)
        .with_context(|| format!("reading test metadata from {test_csv}"))?;
    let test_ids = filter_existing(test_ids, locator.as_ref(), Split::Test, |id| id.as_str());
    let test_samples: Vec<Sample> = test_ids.into_iter().map(Sample::unlabeled).collect();
    println!("{} {} test samples", "Data:".green(), test_samples.len());

    let test_dataset = LandmarkDataset::new(test_samples, Split::Test, locator);
    let test_loader = BatchLoader::new(&test_dataset, batch_size);

    let predictions = predict_valid(
        trainer.model(),
        &test_loader,
        &device,
        &InferenceConfig::default(),
    )?;

    // Assemble and write the submission only after the merge completed
    let mut table = SubmissionTable::from_template(template)
        .with_context(|| format!("reading submission template from {template}"))?;
    table.merge(&predictions, &encoder)?;
    table.write(output)?;

    println!(
        "{} wrote {} rows to {}",
        "Submission:".green(),
        table.rows().len(),
        output
    );
    Ok(())
}

fn cmd_stats(train_csv: &str, min_samples: usize) -> Result<()> {
    if !Path::new(train_csv).exists() {
        println!(
            "{} train metadata not found: {}",
            "Error:".red(),
            train_csv
        );
        return Ok(());
    }

    let records = read_train_metadata(train_csv)?;
    let total = records.len();
    let num_classes = records
        .iter()
        .map(|r| r.landmark_id.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();

    let kept = filter_frequent_classes(records, min_samples);
    let kept_classes = kept
        .iter()
        .map(|r| r.landmark_id.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();

    println!("{}", "Dataset statistics".cyan().bold());
    println!("  samples: {total}");
    println!("  classes: {num_classes}");
    println!(
        "  after >= {min_samples} samples/class filter: {} samples, {} classes",
        kept.len(),
        kept_classes
    );

    Ok(())
}
