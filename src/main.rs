// Sentiment CLI
// Loads or trains the review classifier, prints metrics and sample predictions

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sentiment_lib::models::{BinaryMetrics, Prediction};
use sentiment_lib::services::config_store::{AppConfig, ConfigStore};
use sentiment_lib::services::pipeline::{self, ModelSource, PipelineStage};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "sentiment", version, about = "Review sentiment classifier")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (defaults to the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Labeled dataset, one `text<TAB>0|1` row per line.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Model artifact to load or write.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Share of rows held out for evaluation.
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Seed for the split and the trainer.
    #[arg(long)]
    seed: Option<u64>,

    /// Train even if the model artifact already exists.
    #[arg(long)]
    retrain: bool,

    /// Write a JSON run report to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print the full calibrated metric set.
    #[arg(long)]
    verbose_metrics: bool,

    /// Texts to score; replaces the configured samples.
    texts: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default configuration file.
    InitConfig {
        /// Destination (defaults to the user config directory).
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoredText {
    text: String,
    #[serde(flatten)]
    prediction: Prediction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReport {
    model_path: PathBuf,
    source: ModelSource,
    feature_dimension: usize,
    metrics: Option<BinaryMetrics>,
    predictions: Vec<ScoredText>,
    generated_at: String,
}

fn config_store(path: Option<PathBuf>) -> Result<ConfigStore> {
    match path {
        Some(p) => Ok(ConfigStore::from_file(p)),
        None => ConfigStore::default_config_dir()
            .map(ConfigStore::new)
            .context("no user config directory available; pass --config"),
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigStore::from_file(path.clone())
            .load()
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => match ConfigStore::default_config_dir() {
            Some(dir) => ConfigStore::new(dir).load().context("failed to load user config")?,
            None => AppConfig::default(),
        },
    };

    config
        .apply_env_overrides()
        .context("invalid SENTIMENT_* environment override")?;

    if let Some(data) = &cli.data {
        config.dataset_path = data.clone();
    }
    if let Some(model) = &cli.model {
        config.model_path = model.clone();
    }
    if let Some(fraction) = cli.test_fraction {
        config.split.test_fraction = fraction;
    }
    if let Some(seed) = cli.seed {
        config.split.seed = seed;
        config.trainer.sdca.seed = seed;
    }
    if cli.retrain {
        config.force_retrain = true;
    }
    if !cli.texts.is_empty() {
        config.sample_texts = cli.texts.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

fn print_metrics(metrics: &BinaryMetrics, verbose: bool) {
    println!("Accuracy: {}", percent(metrics.accuracy));
    println!("Area Under Roc Curve: {}", percent(metrics.area_under_roc_curve));
    println!("F1 Score: {}", percent(metrics.f1_score));

    if verbose {
        let cm = &metrics.confusion_matrix;
        println!("Positive Precision: {}", percent(metrics.positive_precision));
        println!("Positive Recall: {}", percent(metrics.positive_recall));
        println!("Negative Precision: {}", percent(metrics.negative_precision));
        println!("Negative Recall: {}", percent(metrics.negative_recall));
        println!("Log Loss: {:.4}", metrics.log_loss);
        println!("Log Loss Reduction: {:.4}", metrics.log_loss_reduction);
        println!("Entropy: {:.4}", metrics.entropy);
        println!(
            "Confusion: TP={} FP={} TN={} FN={}",
            cm.true_positive, cm.false_positive, cm.true_negative, cm.false_negative
        );
    }
}

fn announce(stage: PipelineStage) {
    match stage {
        PipelineStage::LoadingModel { .. } => println!("Loading model from disk..."),
        PipelineStage::LoadingDataset { path } => println!("Loading {}...", path.display()),
        PipelineStage::Training { .. } => println!("Training model..."),
        PipelineStage::Evaluating { .. } => {}
        PipelineStage::SavingModel { .. } => println!("Saving model to disk..."),
    }
}

/// `init-config --path` wins, then the global `--config`.
fn init_config_path(cli: &Cli) -> Option<PathBuf> {
    match &cli.command {
        Some(Command::InitConfig { path: Some(path) }) => Some(path.clone()),
        _ => cli.config.clone(),
    }
}

/// Write the default config to `path`, or to the user config directory.
fn init_config(path: Option<PathBuf>) -> Result<()> {
    let store = config_store(path)?;
    store
        .save(&AppConfig::default())
        .with_context(|| format!("failed to write {}", store.config_file().display()))?;
    println!("Wrote {}", store.config_file().display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::InitConfig { .. }) = &cli.command {
        sentiment_lib::init_logging(None);
        return init_config(init_config_path(&cli));
    }

    let config = resolve_config(&cli)?;
    sentiment_lib::init_logging(config.log_dir.as_deref());
    info!(
        startup_ms = sentiment_lib::startup_elapsed_ms(),
        dataset = %config.dataset_path.display(),
        model = %config.model_path.display(),
        force_retrain = config.force_retrain,
        "sentiment.started"
    );

    let outcome = pipeline::run(&config, &mut announce).with_context(|| {
        format!(
            "pipeline failed (dataset {}, model {})",
            config.dataset_path.display(),
            config.model_path.display()
        )
    })?;

    if let Some(metrics) = &outcome.metrics {
        print_metrics(metrics, cli.verbose_metrics);
    }

    let mut predictions = Vec::with_capacity(config.sample_texts.len());
    for text in &config.sample_texts {
        let prediction = outcome.model.predict(text);
        println!("{} ({})", text, percent(f64::from(prediction.probability)));
        predictions.push(ScoredText {
            text: text.clone(),
            prediction,
        });
    }

    if let Some(report_path) = &cli.report {
        let report = RunReport {
            model_path: config.model_path.clone(),
            source: outcome.source,
            feature_dimension: outcome.model.feature_dimension(),
            metrics: outcome.metrics.clone(),
            predictions,
            generated_at: chrono::Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        std::fs::write(report_path, json)
            .with_context(|| format!("failed to write report {}", report_path.display()))?;
        info!(path = %report_path.display(), "report.written");
    }

    Ok(())
}
