// Training Module
// Linear classifier fitting organized into:
// - sdca: L2-regularized logistic regression via dual coordinate ascent
// - calibration: Platt sigmoid from decision scores to probabilities

pub mod calibration;
pub mod sdca;

pub use calibration::{fit_platt, PlattCalibrator};
pub use sdca::{train_sdca, LinearClassifier, SdcaSummary};

use crate::models::{FeatureVector, TrainerOptions};
use crate::services::error::{Result, SentimentError};
use tracing::{info, warn};

/// Decision function plus probability map, fitted together.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedClassifier {
    pub classifier: LinearClassifier,
    pub calibrator: PlattCalibrator,
    pub summary: SdcaSummary,
}

/// Fit the classifier and its calibrator on featurized training rows.
pub fn train_classifier(
    features: &[FeatureVector],
    labels: &[bool],
    dimension: usize,
    options: &TrainerOptions,
) -> Result<CalibratedClassifier> {
    if features.is_empty() {
        return Err(SentimentError::Training("training set is empty".to_string()));
    }
    let positives = labels.iter().filter(|&&l| l).count();
    if positives == 0 || positives == labels.len() {
        return Err(SentimentError::Training(format!(
            "training set has a single class ({} positive of {} rows)",
            positives,
            labels.len()
        )));
    }

    let (classifier, summary) = train_sdca(features, labels, dimension, &options.sdca)?;

    let calibration = &options.calibration;
    let calibrator = if !calibration.enabled {
        PlattCalibrator::logistic()
    } else if features.len() < calibration.min_rows {
        info!(
            rows = features.len(),
            min_rows = calibration.min_rows,
            "calibration.skipped_small_set"
        );
        PlattCalibrator::logistic()
    } else {
        let scores: Vec<f64> = features.iter().map(|f| classifier.score(f)).collect();
        match fit_platt(&scores, labels, calibration.max_iterations) {
            Some(fitted) => fitted,
            None => {
                warn!("[Calibration] Falling back to logistic link");
                PlattCalibrator::logistic()
            }
        }
    };

    info!(
        rows = features.len(),
        positive = positives,
        slope = calibrator.slope,
        offset = calibrator.offset,
        "trainer.fitted"
    );

    Ok(CalibratedClassifier {
        classifier,
        calibrator,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CalibrationOptions;

    fn one_hot(dimension: usize, index: u32) -> FeatureVector {
        FeatureVector {
            dimension,
            indices: vec![index],
            values: vec![1.0],
        }
    }

    #[test]
    fn test_single_class_is_training_error() {
        let features = vec![one_hot(2, 0), one_hot(2, 1)];
        let err = train_classifier(&features, &[true, true], 2, &TrainerOptions::default())
            .unwrap_err();
        assert!(matches!(err, SentimentError::Training(_)));

        let err = train_classifier(&[], &[], 2, &TrainerOptions::default()).unwrap_err();
        assert!(matches!(err, SentimentError::Training(_)));
    }

    #[test]
    fn test_small_set_uses_logistic_link() {
        let features = vec![one_hot(2, 0), one_hot(2, 1)];
        let fitted =
            train_classifier(&features, &[true, false], 2, &TrainerOptions::default()).unwrap();
        assert_eq!(fitted.calibrator, PlattCalibrator::logistic());
    }

    #[test]
    fn test_large_set_fits_platt() {
        // Feature 2 is noise shared by both classes, so scores overlap.
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40u32 {
            let label = i % 2 == 0;
            let mut v = one_hot(3, if label { 0 } else { 1 });
            if i % 5 == 0 {
                v = one_hot(3, 2);
            }
            features.push(v);
            labels.push(label);
        }
        let options = TrainerOptions {
            calibration: CalibrationOptions {
                min_rows: 10,
                ..CalibrationOptions::default()
            },
            ..TrainerOptions::default()
        };
        let fitted = train_classifier(&features, &labels, 3, &options).unwrap();
        assert!(fitted.calibrator.slope < 0.0);
        let p_pos = fitted.calibrator.probability(fitted.classifier.score(&one_hot(3, 0)));
        let p_neg = fitted.calibrator.probability(fitted.classifier.score(&one_hot(3, 1)));
        assert!(p_pos > 0.5);
        assert!(p_neg < 0.5);
    }
}
