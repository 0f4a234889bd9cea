//! Diabetes photo classifier CLI - classifies photos using a two-class ONNX model.
//!
//! Usage:
//!   diabetes-classifier photo.jpg --model model.onnx --labels labels.txt
//!   diabetes-classifier photos/ --config classifier.json --format json
//!   diabetes-classifier photos/ --model model.onnx --filter lanczos3 -v

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use classifier_core::batch::{BatchProgress, collect_files, run_batch};
use classifier_core::report::{OutputFormat, print_results};
use classifier_core::{Classifier, ClassifierConfig, ResizeFilter, load_config};

#[derive(Parser)]
#[command(name = "diabetes-classifier")]
#[command(about = "Two-class photo classifier backed by an ONNX model")]
struct Cli {
    /// Photos to classify (files or directories)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Path to a JSON config file; flags below override its values
    #[arg(short, long, env = "CLASSIFIER_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the ONNX model file
    #[arg(short, long, env = "CLASSIFIER_MODEL")]
    model: Option<PathBuf>,

    /// Path to labels.txt (one label per line)
    #[arg(short, long)]
    labels: Option<PathBuf>,

    /// Resize filter (nearest, triangle, catmull_rom, gaussian, lanczos3)
    #[arg(long)]
    filter: Option<ResizeFilter>,

    /// ONNX Runtime intra-op threads
    #[arg(long)]
    threads: Option<usize>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Log pipeline stages (debug level)
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<ClassifierConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ClassifierConfig::default(),
    };

    if let Some(model) = &cli.model {
        config.model_path = model.clone();
    }
    if let Some(labels) = &cli.labels {
        config.labels_path = Some(labels.clone());
    }
    if let Some(filter) = cli.filter {
        config.resize_filter = filter;
    }
    if let Some(threads) = cli.threads {
        config.intra_threads = threads;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = resolve_config(&cli)?;

    info!(model = %config.model_path.display(), "loading classifier");
    let mut classifier = Classifier::from_config(&config).context("Classifier is not ready")?;
    debug!(
        model = %classifier.model().model_path().display(),
        input = classifier.model().input_name(),
        output = classifier.model().output_name(),
        target = %classifier.preprocessor().target(),
        "classifier loaded"
    );

    let files = collect_files(&cli.paths);
    info!(count = files.len(), "found photos to classify");

    if files.is_empty() {
        info!("no photos to classify");
        return Ok(());
    }

    let progress = BatchProgress::new();
    let records = run_batch(&mut classifier, &files, &progress);

    info!(
        processed = progress.processed_files.load(Ordering::Relaxed),
        errors = progress.error_count.load(Ordering::Relaxed),
        "classification finished"
    );

    print_results(&records, cli.format);

    Ok(())
}
