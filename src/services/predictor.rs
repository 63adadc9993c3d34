// Sentiment Predictor
// Immutable fitted pipeline: featurize -> linear score -> calibrated probability

use crate::models::Prediction;
use crate::services::error::{Result, SentimentError};
use crate::services::featurizer::FittedFeaturizer;
use crate::services::training::{LinearClassifier, PlattCalibrator};

/// Probability at or above which a text is labeled positive.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// The composed model. Built once by training or restored whole from disk and
/// never mutated afterwards, so shared references may be scored from any
/// number of threads.
///
/// Scoring goes through `predict` and `predict_batch`; the stages stay private.
///
/// ```compile_fail
/// fn stages(model: &sentiment_lib::services::SentimentModel) {
///     let _ = model.classifier();
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentModel {
    featurizer: FittedFeaturizer,
    classifier: LinearClassifier,
    calibrator: PlattCalibrator,
}

impl SentimentModel {
    /// Compose a model, checking that the featurizer and weight vector agree
    /// on the feature dimension.
    pub fn new(
        featurizer: FittedFeaturizer,
        classifier: LinearClassifier,
        calibrator: PlattCalibrator,
    ) -> Result<Self> {
        if featurizer.dimension() != classifier.dimension() {
            return Err(SentimentError::Training(format!(
                "featurizer dimension {} does not match classifier dimension {}",
                featurizer.dimension(),
                classifier.dimension()
            )));
        }
        if !classifier.bias.is_finite() || classifier.weights.iter().any(|w| !w.is_finite()) {
            return Err(SentimentError::Training(
                "classifier has non-finite weights".to_string(),
            ));
        }
        Ok(Self {
            featurizer,
            classifier,
            calibrator,
        })
    }

    pub fn feature_dimension(&self) -> usize {
        self.featurizer.dimension()
    }

    // Stage access for persistence only; callers score through `predict`.
    pub(crate) fn featurizer(&self) -> &FittedFeaturizer {
        &self.featurizer
    }

    pub(crate) fn classifier(&self) -> &LinearClassifier {
        &self.classifier
    }

    pub(crate) fn calibrator(&self) -> &PlattCalibrator {
        &self.calibrator
    }

    /// Score one text.
    pub fn predict(&self, text: &str) -> Prediction {
        let features = self.featurizer.transform(text);
        let score = self.classifier.score(&features);
        let probability = self.calibrator.probability(score).clamp(0.0, 1.0);
        let probability = probability as f32;
        Prediction {
            predicted_label: f64::from(probability) >= DECISION_THRESHOLD,
            probability,
            score: score as f32,
        }
    }

    pub fn predict_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Prediction> {
        texts.iter().map(|t| self.predict(t.as_ref())).collect()
    }
}
