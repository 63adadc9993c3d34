// Pipeline Orchestration
// Load-or-train state machine: reuse a saved model when one exists, otherwise
// load -> split -> fit -> evaluate -> save

use crate::models::{BinaryMetrics, DataSchema, FeaturizerOptions, Record, TrainerOptions};
use crate::services::config_store::AppConfig;
use crate::services::dataset::{load_records, train_test_split};
use crate::services::error::Result;
use crate::services::evaluation::evaluate;
use crate::services::featurizer::TextFeaturizer;
use crate::services::model_store;
use crate::services::predictor::SentimentModel;
use crate::services::training::{train_classifier, SdcaSummary};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Progress notifications emitted at each stage boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    LoadingModel { path: PathBuf },
    LoadingDataset { path: PathBuf },
    Training { rows: usize },
    Evaluating { rows: usize },
    SavingModel { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    Loaded,
    Trained,
}

/// What a pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub model: SentimentModel,
    pub schema: DataSchema,
    pub source: ModelSource,
    /// Present only when the model was trained in this run.
    pub metrics: Option<BinaryMetrics>,
    pub training: Option<SdcaSummary>,
}

/// Featurize and fit on training records.
pub fn fit_model(
    train: &[Record],
    featurizer_options: &FeaturizerOptions,
    trainer_options: &TrainerOptions,
) -> Result<(SentimentModel, SdcaSummary)> {
    let texts: Vec<&str> = train.iter().map(|r| r.text.as_str()).collect();
    let labels: Vec<bool> = train.iter().map(|r| r.label).collect();

    let featurizer = TextFeaturizer::new(featurizer_options.clone()).fit(&texts);
    let features = featurizer.transform_batch(&texts);
    let fitted = train_classifier(&features, &labels, featurizer.dimension(), trainer_options)?;

    let model = SentimentModel::new(featurizer, fitted.classifier, fitted.calibrator)?;
    Ok((model, fitted.summary))
}

/// Load, split, fit and evaluate without touching the model artifact.
pub fn train_and_evaluate(
    config: &AppConfig,
    progress: &mut dyn FnMut(PipelineStage),
) -> Result<(SentimentModel, BinaryMetrics, SdcaSummary)> {
    progress(PipelineStage::LoadingDataset {
        path: config.dataset_path.clone(),
    });
    let records = load_records(&config.dataset_path, &config.schema)?;
    let split = train_test_split(&records, config.split.test_fraction, config.split.seed)?;

    progress(PipelineStage::Training {
        rows: split.train.len(),
    });
    let started = Instant::now();
    let (model, summary) = fit_model(&split.train, &config.featurizer, &config.trainer)?;
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        dimension = model.feature_dimension(),
        epochs = summary.epochs,
        "pipeline.trained"
    );

    progress(PipelineStage::Evaluating {
        rows: split.test.len(),
    });
    let metrics = evaluate(&model, &split.test)?;
    Ok((model, metrics, summary))
}

/// Run the whole load-or-train flow.
pub fn run(config: &AppConfig, progress: &mut dyn FnMut(PipelineStage)) -> Result<PipelineOutcome> {
    config.validate()?;

    if config.model_path.exists() && !config.force_retrain {
        progress(PipelineStage::LoadingModel {
            path: config.model_path.clone(),
        });
        let (model, schema) = model_store::load(&config.model_path)?;
        return Ok(PipelineOutcome {
            model,
            schema,
            source: ModelSource::Loaded,
            metrics: None,
            training: None,
        });
    }

    if config.force_retrain && config.model_path.exists() {
        info!(path = %config.model_path.display(), "pipeline.force_retrain");
    }

    let (model, metrics, summary) = train_and_evaluate(config, progress)?;

    progress(PipelineStage::SavingModel {
        path: config.model_path.clone(),
    });
    model_store::save(&model, &config.schema, &config.model_path)?;

    Ok(PipelineOutcome {
        model,
        schema: config.schema.clone(),
        source: ModelSource::Trained,
        metrics: Some(metrics),
        training: Some(summary),
    })
}
