// SDCA Logistic Regression
// Stochastic dual coordinate ascent for L2-regularized logistic loss.
// Each coordinate step solves the one-dimensional dual subproblem exactly
// and training stops once the duality gap falls under the tolerance.

use crate::models::{FeatureVector, SdcaOptions};
use crate::services::error::{Result, SentimentError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const ROOT_MAX_STEPS: usize = 100;
const ROOT_TOLERANCE: f64 = 1e-12;

/// Linear decision function `w . x + b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearClassifier {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LinearClassifier {
    pub fn dimension(&self) -> usize {
        self.weights.len()
    }

    /// Raw decision value. Positive means the positive class is favored.
    pub fn score(&self, features: &FeatureVector) -> f64 {
        features.dot(&self.weights) + self.bias
    }
}

/// How an SDCA run ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdcaSummary {
    pub epochs: usize,
    pub duality_gap: f64,
    pub converged: bool,
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Binary entropy in nats with `0 ln 0 = 0`.
fn entropy(beta: f64) -> f64 {
    let term = |p: f64| if p > 0.0 { -p * p.ln() } else { 0.0 };
    term(beta) + term(1.0 - beta)
}

/// Root of `ln((1 - x) / x) - margin - inv * (x - current)` on (0, 1).
/// The function is strictly decreasing, so a bracketed Newton iteration
/// with bisection fallback always converges.
fn solve_dual_coordinate(margin: f64, inv: f64, current: f64) -> f64 {
    let g = |x: f64| (1.0 - x).ln() - x.ln() - margin - inv * (x - current);

    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    let mut x = if current > 0.0 && current < 1.0 { current } else { 0.5 };

    for _ in 0..ROOT_MAX_STEPS {
        let gx = g(x);
        if gx.abs() < ROOT_TOLERANCE {
            break;
        }
        if gx > 0.0 {
            lo = x;
        } else {
            hi = x;
        }
        if hi - lo < f64::EPSILON {
            break;
        }

        let dg = -1.0 / (x * (1.0 - x)) - inv;
        let newton = x - gx / dg;
        x = if newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };
    }
    x
}

/// Fit an L2-regularized logistic regression with SDCA.
///
/// Labels map to `y = +1 / -1`. The dual variable of row `i` is stored as
/// `beta_i = y_i * alpha_i` in [0, 1], with
/// `w = (1 / (lambda * n)) * sum(alpha_i * x_i)`. When `fit_intercept` is set
/// the bias is treated as a constant feature and regularized with `w`.
pub fn train_sdca(
    features: &[FeatureVector],
    labels: &[bool],
    dimension: usize,
    options: &SdcaOptions,
) -> Result<(LinearClassifier, SdcaSummary)> {
    let n = features.len();
    if n == 0 {
        return Err(SentimentError::Training("training set is empty".to_string()));
    }
    if labels.len() != n {
        return Err(SentimentError::Training(format!(
            "{} feature rows but {} labels",
            n,
            labels.len()
        )));
    }
    if !(options.l2_regularization > 0.0) {
        return Err(SentimentError::Config(format!(
            "l2 regularization must be positive, got {}",
            options.l2_regularization
        )));
    }
    if let Some(row) = features.iter().position(|f| f.dimension != dimension) {
        return Err(SentimentError::Training(format!(
            "row {} has dimension {}, expected {}",
            row, features[row].dimension, dimension
        )));
    }

    let lambda_n = options.l2_regularization * n as f64;
    let intercept = if options.fit_intercept { 1.0 } else { 0.0 };
    let ys: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { -1.0 }).collect();
    let inv: Vec<f64> = features
        .iter()
        .map(|f| (f.norm_squared() + intercept) / lambda_n)
        .collect();

    let mut weights = vec![0.0; dimension];
    let mut bias = 0.0;
    let mut beta = vec![0.0; n];
    let mut order: Vec<usize> = (0..n).collect();

    let mut summary = SdcaSummary {
        epochs: 0,
        duality_gap: f64::INFINITY,
        converged: false,
    };

    for epoch in 0..options.max_iterations {
        if options.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(options.seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);
        }

        for &i in &order {
            let x = &features[i];
            let out = x.dot(&weights) + bias * intercept;
            let margin = ys[i] * out;
            let updated = solve_dual_coordinate(margin, inv[i], beta[i]);
            let delta_alpha = ys[i] * (updated - beta[i]);
            if delta_alpha == 0.0 {
                continue;
            }
            beta[i] = updated;
            let step = delta_alpha / lambda_n;
            x.add_scaled_to(&mut weights, step);
            bias += step * intercept;
        }

        let gap = duality_gap(features, &ys, &beta, &weights, bias, options.l2_regularization);
        summary.epochs = epoch + 1;
        summary.duality_gap = gap;
        debug!(epoch = epoch + 1, gap, "sdca.epoch");

        if gap <= options.convergence_tolerance {
            summary.converged = true;
            break;
        }
    }

    if summary.converged {
        info!(
            epochs = summary.epochs,
            gap = summary.duality_gap,
            rows = n,
            dimension,
            "sdca.converged"
        );
    } else {
        warn!(
            epochs = summary.epochs,
            gap = summary.duality_gap,
            tolerance = options.convergence_tolerance,
            "[SDCA] Reached iteration limit before convergence"
        );
    }

    Ok((LinearClassifier { weights, bias }, summary))
}

/// Primal minus dual objective. Non-negative up to rounding.
fn duality_gap(
    features: &[FeatureVector],
    ys: &[f64],
    beta: &[f64],
    weights: &[f64],
    bias: f64,
    lambda: f64,
) -> f64 {
    let n = features.len() as f64;
    let reg = 0.5 * lambda * (weights.iter().map(|w| w * w).sum::<f64>() + bias * bias);

    let loss: f64 = features
        .iter()
        .zip(ys)
        .map(|(x, y)| softplus(-y * (x.dot(weights) + bias)))
        .sum();
    let dual: f64 = beta.iter().map(|&b| entropy(b)).sum();

    (loss / n + reg) - (dual / n - reg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(dimension: usize, entries: &[(u32, f64)]) -> FeatureVector {
        FeatureVector {
            dimension,
            indices: entries.iter().map(|e| e.0).collect(),
            values: entries.iter().map(|e| e.1).collect(),
        }
    }

    fn toy_problem() -> (Vec<FeatureVector>, Vec<bool>) {
        let features = vec![
            vector(3, &[(0, 1.0)]),
            vector(3, &[(0, 0.8), (2, 0.6)]),
            vector(3, &[(1, 1.0)]),
            vector(3, &[(1, 0.6), (2, 0.8)]),
        ];
        (features, vec![true, true, false, false])
    }

    #[test]
    fn test_solve_dual_coordinate_finds_root() {
        let (margin, inv, current) = (0.3, 2.0, 0.1);
        let x = solve_dual_coordinate(margin, inv, current);
        assert!(x > 0.0 && x < 1.0);
        let g = (1.0 - x).ln() - x.ln() - margin - inv * (x - current);
        assert!(g.abs() < 1e-9);

        // With no curvature the root is the logistic of -margin.
        let x = solve_dual_coordinate(1.5, 0.0, 0.0);
        assert!((x - 1.0 / (1.0 + 1.5_f64.exp())).abs() < 1e-9);
    }

    #[test]
    fn test_entropy_and_softplus() {
        assert_eq!(entropy(0.0), 0.0);
        assert_eq!(entropy(1.0), 0.0);
        assert!((entropy(0.5) - std::f64::consts::LN_2).abs() < 1e-12);
        assert!((softplus(0.0) - std::f64::consts::LN_2).abs() < 1e-12);
        assert!((softplus(800.0) - 800.0).abs() < 1e-9);
        assert!(softplus(-800.0) >= 0.0);
    }

    #[test]
    fn test_train_separates_toy_problem() {
        let (features, labels) = toy_problem();
        let options = SdcaOptions {
            l2_regularization: 0.01,
            convergence_tolerance: 1e-4,
            max_iterations: 1000,
            ..SdcaOptions::default()
        };
        let (model, summary) = train_sdca(&features, &labels, 3, &options).unwrap();
        assert!(summary.converged);
        assert!(summary.duality_gap <= options.convergence_tolerance);
        for (x, &y) in features.iter().zip(&labels) {
            assert_eq!(model.score(x) > 0.0, y);
        }
        assert!(model.weights[0] > 0.0);
        assert!(model.weights[1] < 0.0);
    }

    #[test]
    fn test_train_is_deterministic_for_seed() {
        let (features, labels) = toy_problem();
        let options = SdcaOptions::default();
        let (a, _) = train_sdca(&features, &labels, 3, &options).unwrap();
        let (b, _) = train_sdca(&features, &labels, 3, &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_iteration_limit_reports_not_converged() {
        let (features, labels) = toy_problem();
        let options = SdcaOptions {
            max_iterations: 1,
            convergence_tolerance: 0.0,
            ..SdcaOptions::default()
        };
        let (_, summary) = train_sdca(&features, &labels, 3, &options).unwrap();
        assert_eq!(summary.epochs, 1);
        assert!(!summary.converged);
    }

    #[test]
    fn test_rejects_empty_and_mismatched_input() {
        let options = SdcaOptions::default();
        assert!(matches!(
            train_sdca(&[], &[], 3, &options),
            Err(SentimentError::Training(_))
        ));

        let (features, _) = toy_problem();
        assert!(matches!(
            train_sdca(&features, &[true], 3, &options),
            Err(SentimentError::Training(_))
        ));
        assert!(matches!(
            train_sdca(&features, &[true, true, false, false], 5, &options),
            Err(SentimentError::Training(_))
        ));
    }

    #[test]
    fn test_no_intercept_keeps_bias_zero() {
        let (features, labels) = toy_problem();
        let options = SdcaOptions {
            fit_intercept: false,
            ..SdcaOptions::default()
        };
        let (model, _) = train_sdca(&features, &labels, 3, &options).unwrap();
        assert_eq!(model.bias, 0.0);
    }
}
