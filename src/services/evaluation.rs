// Evaluation Service
// Scores a fitted model on held-out records and reports binary metrics

use crate::models::{BinaryMetrics, ConfusionMatrix, Record};
use crate::services::error::{Result, SentimentError};
use crate::services::predictor::SentimentModel;
use std::cmp::Ordering;
use tracing::{info, warn};

const PROBABILITY_FLOOR: f64 = 1e-15;

/// Evaluate `model` against labeled test records.
pub fn evaluate(model: &SentimentModel, test: &[Record]) -> Result<BinaryMetrics> {
    if test.is_empty() {
        return Err(SentimentError::Config(
            "cannot evaluate on an empty test set".to_string(),
        ));
    }

    let mut labels = Vec::with_capacity(test.len());
    let mut probabilities = Vec::with_capacity(test.len());
    let mut confusion = ConfusionMatrix::default();

    for record in test {
        let prediction = model.predict(&record.text);
        confusion.record(record.label, prediction.predicted_label);
        labels.push(record.label);
        probabilities.push(f64::from(prediction.probability));
    }

    let metrics = compute_metrics(&labels, &probabilities, confusion);
    info!(
        rows = test.len(),
        accuracy = metrics.accuracy,
        auc = metrics.area_under_roc_curve,
        f1 = metrics.f1_score,
        "evaluation.completed"
    );
    Ok(metrics)
}

/// Assemble every metric from labels, probabilities and thresholded outcomes.
pub fn compute_metrics(
    labels: &[bool],
    probabilities: &[f64],
    confusion: ConfusionMatrix,
) -> BinaryMetrics {
    let cm = confusion;
    let positive_precision = safe_ratio(cm.true_positive, cm.true_positive + cm.false_positive);
    let positive_recall = safe_ratio(cm.true_positive, cm.actual_positive());
    let negative_precision = safe_ratio(cm.true_negative, cm.true_negative + cm.false_negative);
    let negative_recall = safe_ratio(cm.true_negative, cm.actual_negative());

    let f1_score = if positive_precision + positive_recall > 0.0 {
        2.0 * positive_precision * positive_recall / (positive_precision + positive_recall)
    } else {
        0.0
    };

    let log_loss = log_loss_bits(labels, probabilities);
    let entropy = label_entropy_bits(labels);
    let log_loss_reduction = if entropy > 0.0 {
        1.0 - log_loss / entropy
    } else {
        f64::NAN
    };

    BinaryMetrics {
        accuracy: safe_ratio(cm.true_positive + cm.true_negative, cm.total()),
        area_under_roc_curve: area_under_roc_curve(labels, probabilities),
        f1_score,
        positive_precision,
        positive_recall,
        negative_precision,
        negative_recall,
        log_loss,
        log_loss_reduction,
        entropy,
        confusion_matrix: cm,
    }
}

fn safe_ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// AUC as the Mann-Whitney statistic with average ranks for ties.
/// NaN when only one class is present.
pub fn area_under_roc_curve(labels: &[bool], probabilities: &[f64]) -> f64 {
    let positives = labels.iter().filter(|&&l| l).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        warn!(
            positives,
            negatives, "[Evaluation] AUC undefined for a single-class test set"
        );
        return f64::NAN;
    }

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| {
        probabilities[a]
            .partial_cmp(&probabilities[b])
            .unwrap_or(Ordering::Equal)
    });

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && probabilities[order[end + 1]] == probabilities[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; a tie group shares the mean of its ranks.
        let avg_rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            if labels[idx] {
                positive_rank_sum += avg_rank;
            }
        }
        start = end + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    (positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n)
}

/// Mean cross-entropy in bits with probabilities clamped away from 0 and 1.
pub fn log_loss_bits(labels: &[bool], probabilities: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = labels
        .iter()
        .zip(probabilities)
        .map(|(&label, &p)| {
            let p = p.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
            if label {
                -p.log2()
            } else {
                -(1.0 - p).log2()
            }
        })
        .sum();
    total / labels.len() as f64
}

/// Entropy of the empirical label distribution in bits.
pub fn label_entropy_bits(labels: &[bool]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let prior = labels.iter().filter(|&&l| l).count() as f64 / labels.len() as f64;
    [prior, 1.0 - prior]
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.log2())
        .sum()
}
