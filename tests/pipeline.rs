use sentiment_lib::models::{DataSchema, FeaturizerOptions, TrainerOptions};
use sentiment_lib::services::config_store::AppConfig;
use sentiment_lib::services::dataset::{load_records, train_test_split};
use sentiment_lib::services::error::SentimentError;
use sentiment_lib::services::model_store;
use sentiment_lib::services::pipeline::{self, fit_model, ModelSource, PipelineStage};
use std::fs;
use std::path::{Path, PathBuf};

const POSITIVE: &[&str] = &["great", "tasty", "friendly", "amazing", "loved"];
const NEGATIVE: &[&str] = &["bad", "cold", "rude", "terrible", "hated"];
const NOUNS: &[&str] = &["food", "service", "staff", "pasta", "place", "dessert"];

const PROBES: &[&str] = &[
    "this is a great restaurant",
    "this is a bad restaurant",
    "the pasta was cold and the staff rude",
    "amazing dessert, friendly staff",
    "",
    "qwerty zxcvb",
];

fn write_reviews(dir: &Path) -> PathBuf {
    let mut lines = Vec::new();
    for i in 0..60 {
        let noun = NOUNS[(i / 2) % NOUNS.len()];
        let (word, label) = if i % 2 == 0 {
            (POSITIVE[(i / 2) % POSITIVE.len()], 1)
        } else {
            (NEGATIVE[(i / 2) % NEGATIVE.len()], 0)
        };
        lines.push(format!("The {} was {}.\t{}", noun, word, label));
    }
    let path = dir.join("reviews.txt");
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn config_for(dir: &Path) -> AppConfig {
    AppConfig {
        dataset_path: write_reviews(dir),
        model_path: dir.join("model").join("model.zip"),
        ..AppConfig::default()
    }
}

fn run_quiet(config: &AppConfig) -> Result<pipeline::PipelineOutcome, SentimentError> {
    pipeline::run(config, &mut |_| {})
}

#[test]
fn test_train_then_reload_gives_identical_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());

    let mut stages = Vec::new();
    let trained = pipeline::run(&config, &mut |s| stages.push(s)).unwrap();
    assert_eq!(trained.source, ModelSource::Trained);
    assert!(config.model_path.exists());
    assert!(matches!(stages.first(), Some(PipelineStage::LoadingDataset { .. })));
    assert!(matches!(stages.last(), Some(PipelineStage::SavingModel { .. })));

    let metrics = trained.metrics.clone().unwrap();
    assert!(metrics.accuracy >= 0.9, "accuracy {}", metrics.accuracy);
    assert!(metrics.area_under_roc_curve >= 0.9);
    assert_eq!(metrics.confusion_matrix.total(), 12);

    let mut stages = Vec::new();
    let loaded = pipeline::run(&config, &mut |s| stages.push(s)).unwrap();
    assert_eq!(loaded.source, ModelSource::Loaded);
    assert!(loaded.metrics.is_none());
    assert_eq!(stages.len(), 1);
    assert_eq!(loaded.schema, DataSchema::default());
    assert_eq!(loaded.model, trained.model);

    for probe in PROBES {
        assert_eq!(loaded.model.predict(probe), trained.model.predict(probe));
    }
}

#[test]
fn test_force_retrain_ignores_existing_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path());

    run_quiet(&config).unwrap();
    let first = model_store::read_manifest(&config.model_path).unwrap();

    config.force_retrain = true;
    let outcome = run_quiet(&config).unwrap();
    assert_eq!(outcome.source, ModelSource::Trained);
    let second = model_store::read_manifest(&config.model_path).unwrap();
    assert_ne!(first.model_id, second.model_id);
}

#[test]
fn test_training_is_deterministic_for_seed() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());

    let (a, metrics_a, _) = pipeline::train_and_evaluate(&config, &mut |_| {}).unwrap();
    let (b, metrics_b, _) = pipeline::train_and_evaluate(&config, &mut |_| {}).unwrap();
    assert_eq!(a, b);
    assert_eq!(metrics_a.accuracy, metrics_b.accuracy);
    for probe in PROBES {
        assert_eq!(a.predict(probe), b.predict(probe));
    }
}

#[test]
fn test_probabilities_are_bounded_and_thresholded() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = run_quiet(&config_for(dir.path())).unwrap();

    for probe in PROBES {
        let p = outcome.model.predict(probe);
        assert!((0.0..=1.0).contains(&p.probability), "{probe}: {}", p.probability);
        assert_eq!(p.predicted_label, p.probability >= 0.5);
        assert!(p.score.is_finite());
    }
}

#[test]
fn test_single_class_dataset_is_training_error() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("positive.txt");
    fs::write(&data, "nice\t1\ngood\t1\ngreat\t1\nfine\t1\nok\t1\n").unwrap();
    let config = AppConfig {
        dataset_path: data,
        model_path: dir.path().join("model.zip"),
        ..AppConfig::default()
    };

    let err = run_quiet(&config).unwrap_err();
    assert!(matches!(err, SentimentError::Training(_)), "{err}");
    assert!(!config.model_path.exists());
}

#[test]
fn test_malformed_dataset_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("broken.txt");
    fs::write(&data, "fine\t1\nbroken line without label\n").unwrap();
    let config = AppConfig {
        dataset_path: data,
        model_path: dir.path().join("model.zip"),
        ..AppConfig::default()
    };

    let err = run_quiet(&config).unwrap_err();
    assert!(matches!(err, SentimentError::DataFormat { line: 2, .. }));
}

#[test]
fn test_corrupt_existing_artifact_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path());
    config.model_path = dir.path().join("model.zip");
    fs::write(&config.model_path, b"PK but not really").unwrap();

    let err = run_quiet(&config).unwrap_err();
    assert!(matches!(err, SentimentError::CorruptArtifact { .. }));
}

#[test]
fn test_explicit_load_of_missing_artifact_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = model_store::load(&dir.path().join("nope.zip")).unwrap_err();
    assert!(matches!(err, SentimentError::NotFound(_)));
}

#[test]
fn test_four_row_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("tiny.txt");
    fs::write(
        &data,
        "great food\t1\nterrible service\t0\nloved it\t1\nhated it\t0\n",
    )
    .unwrap();
    let records = load_records(&data, &DataSchema::default()).unwrap();

    // The default seed holds out "great food", the only cue the probes share
    // with training. Seed 4 holds out "loved it", leaving one positive and two
    // negatives, so the bias is negative and "great" carries the positive weight.
    let default_split = train_test_split(&records, 0.25, 42).unwrap();
    assert_eq!(default_split.test.len(), 1);
    assert_eq!(default_split.test[0].text, "great food");

    let split = train_test_split(&records, 0.25, 4).unwrap();
    assert_eq!(split.test.len(), 1);
    assert_eq!(split.train.len(), 3);
    assert_eq!(split.test[0].text, "loved it");

    let (model, _) = fit_model(
        &split.train,
        &FeaturizerOptions::default(),
        &TrainerOptions::default(),
    )
    .unwrap();

    let great = model.predict("this is a great restaurant");
    assert!(great.predicted_label);
    assert!(great.probability > 0.5);

    let bad = model.predict("this is a bad restaurant");
    assert!(!bad.predicted_label);
    assert!(bad.probability < 0.5);

    // No term of these texts was seen in training: the score is the bias alone.
    let unseen = model.predict("qwerty zxcvb");
    assert_eq!(unseen.score, model.predict("xyzzy plugh").score);
    assert!(unseen.score < 0.0);
    assert!(!unseen.predicted_label);
}
