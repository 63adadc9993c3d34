// Platt Calibration
// Sigmoid map from raw decision scores to positive-class probabilities,
// fitted with the regularized-target Newton method of Lin, Lin and Weng.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MIN_STEP: f64 = 1e-10;
const HESSIAN_RIDGE: f64 = 1e-12;
const GRADIENT_EPS: f64 = 1e-5;

/// `P(positive | score) = 1 / (1 + exp(slope * score + offset))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlattCalibrator {
    pub slope: f64,
    pub offset: f64,
}

impl Default for PlattCalibrator {
    fn default() -> Self {
        Self::logistic()
    }
}

impl PlattCalibrator {
    /// Plain logistic link: `1 / (1 + exp(-score))`.
    pub fn logistic() -> Self {
        Self {
            slope: -1.0,
            offset: 0.0,
        }
    }

    pub fn probability(&self, score: f64) -> f64 {
        let f = self.slope * score + self.offset;
        if f >= 0.0 {
            let e = (-f).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + f.exp())
        }
    }
}

/// Negative log-likelihood of the smoothed targets for parameters (a, b).
fn objective(scores: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    scores
        .iter()
        .zip(targets)
        .map(|(&s, &t)| {
            let f = s * a + b;
            if f >= 0.0 {
                t * f + (-f).exp().ln_1p()
            } else {
                (t - 1.0) * f + f.exp().ln_1p()
            }
        })
        .sum()
}

/// Fit slope and offset on labeled scores. Returns `None` when either class
/// is missing or the fitted map is not increasing in the score.
pub fn fit_platt(scores: &[f64], labels: &[bool], max_iterations: usize) -> Option<PlattCalibrator> {
    let positives = labels.iter().filter(|&&l| l).count() as f64;
    let negatives = labels.len() as f64 - positives;
    if positives == 0.0 || negatives == 0.0 || scores.len() != labels.len() {
        return None;
    }

    let hi_target = (positives + 1.0) / (positives + 2.0);
    let lo_target = 1.0 / (negatives + 2.0);
    let targets: Vec<f64> = labels
        .iter()
        .map(|&l| if l { hi_target } else { lo_target })
        .collect();

    let mut a = 0.0;
    let mut b = ((negatives + 1.0) / (positives + 1.0)).ln();
    let mut fval = objective(scores, &targets, a, b);

    for iteration in 0..max_iterations {
        let (mut h11, mut h22, mut h21) = (HESSIAN_RIDGE, HESSIAN_RIDGE, 0.0);
        let (mut g1, mut g2) = (0.0, 0.0);

        for (&s, &t) in scores.iter().zip(&targets) {
            let f = s * a + b;
            let (p, q) = if f >= 0.0 {
                let e = (-f).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += s * s * d2;
            h22 += d2;
            h21 += s * d2;
            let d1 = t - p;
            g1 += s * d1;
            g2 += d1;
        }

        if g1.abs() < GRADIENT_EPS && g2.abs() < GRADIENT_EPS {
            debug!(iteration, slope = a, offset = b, "platt.converged");
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let (na, nb) = (a + step * da, b + step * db);
            let nf = objective(scores, &targets, na, nb);
            if nf < fval + 1e-4 * step * gd {
                a = na;
                b = nb;
                fval = nf;
                break;
            }
            step /= 2.0;
        }

        if step < MIN_STEP {
            warn!(iteration, "[Platt] Line search failed, keeping last parameters");
            break;
        }
    }

    if !(a < 0.0) || !b.is_finite() {
        warn!(slope = a, "[Platt] Fitted map is not increasing in the score");
        return None;
    }

    Some(PlattCalibrator { slope: a, offset: b })
}
