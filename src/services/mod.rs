// Sentiment Core Services
// Dataset loading, featurization, training, evaluation and model persistence

pub mod error;
pub mod text_processor;
pub mod config_store;
pub mod dataset;
pub mod featurizer;
pub mod training;
pub mod predictor;
pub mod evaluation;
pub mod model_store;
pub mod pipeline;

pub use error::{Result, SentimentError};
pub use config_store::{AppConfig, ConfigStore};
pub use dataset::{load_records, read_records, train_test_split, DataSplit};
pub use featurizer::{FittedFeaturizer, TextFeaturizer};
pub use predictor::SentimentModel;
pub use evaluation::evaluate;
pub use pipeline::{fit_model, run, train_and_evaluate, ModelSource, PipelineOutcome, PipelineStage};

// Re-export training types
pub use training::{
    train_classifier,
    CalibratedClassifier,
    LinearClassifier,
    PlattCalibrator,
    SdcaSummary,
};
