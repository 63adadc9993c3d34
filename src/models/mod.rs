// Sentiment Data Models
// Records, predictions, schema bindings, option blocks and metric reports

use serde::{Deserialize, Serialize};

// ============ Records & Predictions ============

/// One labeled input row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub text: String,
    /// Ground truth; only meaningful for training and evaluation rows.
    pub label: bool,
}

impl Record {
    pub fn new(text: impl Into<String>, label: bool) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// Output of scoring a single text. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub predicted_label: bool,
    /// Calibrated probability of the positive class, in [0, 1].
    pub probability: f32,
    /// Raw decision-function value before calibration.
    pub score: f32,
}

// ============ Feature Vectors ============

/// Sparse numeric encoding of one text. Indices are strictly increasing and
/// below `dimension`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureVector {
    pub dimension: usize,
    pub indices: Vec<u32>,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }

    /// Dot product with a dense weight vector of length `dimension`.
    pub fn dot(&self, weights: &[f64]) -> f64 {
        self.indices
            .iter()
            .zip(&self.values)
            .map(|(&i, v)| weights[i as usize] * v)
            .sum()
    }

    /// `weights += scale * self`
    pub fn add_scaled_to(&self, weights: &mut [f64], scale: f64) {
        for (&i, v) in self.indices.iter().zip(&self.values) {
            weights[i as usize] += scale * v;
        }
    }

    pub fn to_dense(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.dimension];
        for (&i, v) in self.indices.iter().zip(&self.values) {
            out[i as usize] = *v;
        }
        out
    }
}

// ============ Schema ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Boolean,
}

/// Binds a record field to a column of the delimited input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnBinding {
    pub name: String,
    pub index: usize,
    pub kind: ColumnKind,
}

/// Declarative field-to-column mapping used by the dataset loader and
/// stored alongside the model as its input schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSchema {
    pub columns: Vec<ColumnBinding>,
    #[serde(default = "default_separator")]
    pub separator: char,
    #[serde(default)]
    pub has_header: bool,
}

impl Default for DataSchema {
    fn default() -> Self {
        Self {
            columns: vec![
                ColumnBinding {
                    name: "Text".to_string(),
                    index: 0,
                    kind: ColumnKind::Text,
                },
                ColumnBinding {
                    name: "Label".to_string(),
                    index: 1,
                    kind: ColumnKind::Boolean,
                },
            ],
            separator: default_separator(),
            has_header: false,
        }
    }
}

impl DataSchema {
    /// Number of fields every data line must contain.
    pub fn column_count(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.index + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn text_column(&self) -> Option<&ColumnBinding> {
        self.columns.iter().find(|c| c.kind == ColumnKind::Text)
    }

    pub fn label_column(&self) -> Option<&ColumnBinding> {
        self.columns.iter().find(|c| c.kind == ColumnKind::Boolean)
    }
}

// ============ Pipeline Options ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitOptions {
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermWeighting {
    Tf,
    TfIdf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorNorm {
    None,
    L2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturizerOptions {
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default)]
    pub remove_stop_words: bool,
    /// Word n-grams of length 1..=word_ngram_length are emitted.
    #[serde(default = "default_word_ngram_length")]
    pub word_ngram_length: usize,
    #[serde(default = "default_true")]
    pub use_char_ngrams: bool,
    #[serde(default = "default_char_ngram_length")]
    pub char_ngram_length: usize,
    #[serde(default = "default_min_term_count")]
    pub min_term_count: usize,
    #[serde(default = "default_weighting")]
    pub weighting: TermWeighting,
    #[serde(default = "default_norm")]
    pub norm: VectorNorm,
}

impl Default for FeaturizerOptions {
    fn default() -> Self {
        Self {
            lowercase: true,
            remove_stop_words: false,
            word_ngram_length: default_word_ngram_length(),
            use_char_ngrams: true,
            char_ngram_length: default_char_ngram_length(),
            min_term_count: default_min_term_count(),
            weighting: default_weighting(),
            norm: default_norm(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdcaOptions {
    /// L2 regularization strength (lambda).
    #[serde(default = "default_l2")]
    pub l2_regularization: f64,
    /// Maximum number of passes over the training set.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Absolute duality-gap threshold for early stopping.
    #[serde(default = "default_tolerance")]
    pub convergence_tolerance: f64,
    #[serde(default = "default_true")]
    pub fit_intercept: bool,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SdcaOptions {
    fn default() -> Self {
        Self {
            l2_regularization: default_l2(),
            max_iterations: default_max_iterations(),
            convergence_tolerance: default_tolerance(),
            fit_intercept: true,
            shuffle: true,
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Below this many training rows the logistic link is used as-is.
    #[serde(default = "default_calibration_min_rows")]
    pub min_rows: usize,
    #[serde(default = "default_calibration_max_iterations")]
    pub max_iterations: usize,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            min_rows: default_calibration_min_rows(),
            max_iterations: default_calibration_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrainerOptions {
    #[serde(default)]
    pub sdca: SdcaOptions,
    #[serde(default)]
    pub calibration: CalibrationOptions,
}

// ============ Evaluation ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn record(&mut self, actual: bool, predicted: bool) {
        match (actual, predicted) {
            (true, true) => self.true_positive += 1,
            (false, true) => self.false_positive += 1,
            (false, false) => self.true_negative += 1,
            (true, false) => self.false_negative += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn actual_positive(&self) -> usize {
        self.true_positive + self.false_negative
    }

    pub fn actual_negative(&self) -> usize {
        self.true_negative + self.false_positive
    }
}

/// Calibrated binary-classification metrics for one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryMetrics {
    pub accuracy: f64,
    /// NaN when the evaluated rows contain a single class.
    pub area_under_roc_curve: f64,
    pub f1_score: f64,
    pub positive_precision: f64,
    pub positive_recall: f64,
    pub negative_precision: f64,
    pub negative_recall: f64,
    /// Mean cross-entropy in bits.
    pub log_loss: f64,
    pub log_loss_reduction: f64,
    /// Entropy of the evaluated labels in bits.
    pub entropy: f64,
    pub confusion_matrix: ConfusionMatrix,
}

fn default_true() -> bool { true }
fn default_separator() -> char { '\t' }
fn default_test_fraction() -> f64 { 0.2 }
fn default_seed() -> u64 { 42 }
fn default_word_ngram_length() -> usize { 2 }
fn default_char_ngram_length() -> usize { 3 }
fn default_min_term_count() -> usize { 1 }
fn default_weighting() -> TermWeighting { TermWeighting::Tf }
fn default_norm() -> VectorNorm { VectorNorm::L2 }
fn default_l2() -> f64 { 1e-4 }
fn default_max_iterations() -> usize { 200 }
fn default_tolerance() -> f64 { 1e-6 }
fn default_calibration_min_rows() -> usize { 30 }
fn default_calibration_max_iterations() -> usize { 100 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_binds_text_and_label() {
        let schema = DataSchema::default();
        assert_eq!(schema.column_count(), 2);
        assert_eq!(schema.text_column().map(|c| c.index), Some(0));
        assert_eq!(schema.label_column().map(|c| c.index), Some(1));
        assert_eq!(schema.separator, '\t');
    }

    #[test]
    fn test_options_fill_missing_fields_with_defaults() {
        let opts: SdcaOptions = serde_json::from_str(r#"{"maxIterations": 5}"#).unwrap();
        assert_eq!(opts.max_iterations, 5);
        assert_eq!(opts.l2_regularization, 1e-4);
        assert!(opts.fit_intercept);

        let feat: FeaturizerOptions = serde_json::from_str(r#"{"weighting": "tf_idf"}"#).unwrap();
        assert_eq!(feat.weighting, TermWeighting::TfIdf);
        assert_eq!(feat.word_ngram_length, 2);
    }

    #[test]
    fn test_feature_vector_sparse_ops() {
        let v = FeatureVector {
            dimension: 4,
            indices: vec![1, 3],
            values: vec![0.6, 0.8],
        };
        assert_eq!(v.nnz(), 2);
        assert!((v.norm_squared() - 1.0).abs() < 1e-12);
        assert!((v.dot(&[9.0, 1.0, 9.0, 2.0]) - 2.2).abs() < 1e-12);
        assert_eq!(v.to_dense(), vec![0.0, 0.6, 0.0, 0.8]);

        let mut w = vec![0.0; 4];
        v.add_scaled_to(&mut w, 2.0);
        assert_eq!(w, vec![0.0, 1.2, 0.0, 1.6]);
        assert!(FeatureVector::empty(4).is_zero());
    }

    #[test]
    fn test_confusion_matrix_record() {
        let mut cm = ConfusionMatrix::default();
        cm.record(true, true);
        cm.record(true, false);
        cm.record(false, true);
        cm.record(false, false);
        cm.record(false, false);
        assert_eq!(cm.total(), 5);
        assert_eq!(cm.actual_positive(), 2);
        assert_eq!(cm.actual_negative(), 3);
    }
}
