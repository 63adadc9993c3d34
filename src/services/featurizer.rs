// Text Featurizer
// Fits an n-gram vocabulary on training text and maps any text to a
// fixed-dimension sparse vector

use crate::models::{FeatureVector, FeaturizerOptions, TermWeighting, VectorNorm};
use crate::services::text_processor::extract_terms;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

/// Unfitted featurizer: options only.
#[derive(Debug, Clone, Default)]
pub struct TextFeaturizer {
    options: FeaturizerOptions,
}

impl TextFeaturizer {
    pub fn new(options: FeaturizerOptions) -> Self {
        Self { options }
    }

    /// Build the vocabulary from the training corpus.
    pub fn fit<S: AsRef<str>>(&self, texts: &[S]) -> FittedFeaturizer {
        let mut term_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for text in texts {
            let terms = extract_terms(text.as_ref(), &self.options);
            let unique: HashSet<&String> = terms.iter().collect();
            for term in unique {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            for term in terms {
                *term_counts.entry(term).or_insert(0) += 1;
            }
        }

        let min_count = self.options.min_term_count.max(1);
        let vocabulary: Vec<String> = term_counts
            .into_iter()
            .filter(|(_, count)| *count >= min_count)
            .map(|(term, _)| term)
            .collect();

        let idf = match self.options.weighting {
            TermWeighting::Tf => Vec::new(),
            TermWeighting::TfIdf => {
                let n_docs = texts.len() as f64;
                vocabulary
                    .iter()
                    .map(|term| {
                        let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                        // Smoothed: ln((N + 1) / (df + 1)) + 1
                        ((n_docs + 1.0) / (df + 1.0)).ln() + 1.0
                    })
                    .collect()
            }
        };

        info!(
            documents = texts.len(),
            vocabulary = vocabulary.len(),
            "featurizer.fitted"
        );

        FittedFeaturizer::from_parts(self.options.clone(), vocabulary, idf)
    }
}

/// Serialized form of a fitted featurizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeaturizerState {
    options: FeaturizerOptions,
    vocabulary: Vec<String>,
    #[serde(default)]
    idf: Vec<f64>,
}

/// Fitted vocabulary plus options. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "FeaturizerState", into = "FeaturizerState")]
pub struct FittedFeaturizer {
    options: FeaturizerOptions,
    vocabulary: Vec<String>,
    idf: Vec<f64>,
    index: HashMap<String, u32>,
}

impl PartialEq for FittedFeaturizer {
    fn eq(&self, other: &Self) -> bool {
        self.options == other.options && self.vocabulary == other.vocabulary && self.idf == other.idf
    }
}

impl TryFrom<FeaturizerState> for FittedFeaturizer {
    type Error = String;

    fn try_from(state: FeaturizerState) -> Result<Self, Self::Error> {
        match state.options.weighting {
            TermWeighting::TfIdf if state.idf.len() != state.vocabulary.len() => {
                return Err(format!(
                    "idf table has {} entries for {} terms",
                    state.idf.len(),
                    state.vocabulary.len()
                ));
            }
            TermWeighting::Tf if !state.idf.is_empty() => {
                return Err("idf table present for tf weighting".to_string());
            }
            _ => {}
        }
        if state.vocabulary.len() > u32::MAX as usize {
            return Err("vocabulary too large".to_string());
        }

        let fitted = Self::from_parts(state.options, state.vocabulary, state.idf);
        if fitted.index.len() != fitted.vocabulary.len() {
            return Err("vocabulary contains duplicate terms".to_string());
        }
        Ok(fitted)
    }
}

impl From<FittedFeaturizer> for FeaturizerState {
    fn from(f: FittedFeaturizer) -> Self {
        Self {
            options: f.options,
            vocabulary: f.vocabulary,
            idf: f.idf,
        }
    }
}

impl FittedFeaturizer {
    fn from_parts(options: FeaturizerOptions, vocabulary: Vec<String>, idf: Vec<f64>) -> Self {
        let index = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i as u32))
            .collect();
        Self {
            options,
            vocabulary,
            idf,
            index,
        }
    }

    /// Length of every vector this featurizer produces.
    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn term_index(&self, term: &str) -> Option<u32> {
        self.index.get(term).copied()
    }

    /// Map text to its feature vector. Unknown terms are ignored, so unseen
    /// text yields the all-zero vector rather than an error.
    pub fn transform(&self, text: &str) -> FeatureVector {
        let mut counts: BTreeMap<u32, f64> = BTreeMap::new();
        for term in extract_terms(text, &self.options) {
            if let Some(&idx) = self.index.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let (indices, mut values): (Vec<u32>, Vec<f64>) = counts.into_iter().unzip();

        if self.options.weighting == TermWeighting::TfIdf {
            for (v, &i) in values.iter_mut().zip(&indices) {
                *v *= self.idf[i as usize];
            }
        }

        if self.options.norm == VectorNorm::L2 {
            let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for v in values.iter_mut() {
                    *v /= norm;
                }
            }
        }

        FeatureVector {
            dimension: self.dimension(),
            indices,
            values,
        }
    }

    pub fn transform_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<FeatureVector> {
        texts.iter().map(|t| self.transform(t.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_only() -> FeaturizerOptions {
        FeaturizerOptions {
            use_char_ngrams: false,
            ..FeaturizerOptions::default()
        }
    }

    #[test]
    fn test_fit_builds_sorted_vocabulary_from_training_text() {
        let f = TextFeaturizer::new(word_only()).fit(&["great food", "terrible service"]);
        assert_eq!(f.dimension(), 6);
        assert_eq!(f.term_index("w:food"), Some(0));
        assert_eq!(f.term_index("w:terrible|service"), Some(5));
        assert_eq!(f.term_index("w:restaurant"), None);
    }

    #[test]
    fn test_transform_is_l2_normalized_and_sorted() {
        let f = TextFeaturizer::new(FeaturizerOptions::default()).fit(&["great food", "loved it"]);
        let v = f.transform("GREAT food, great!");
        assert_eq!(v.dimension, f.dimension());
        assert!((v.norm_squared() - 1.0).abs() < 1e-9);
        assert!(v.indices.windows(2).all(|w| w[0] < w[1]));
        assert!(v.indices.iter().all(|&i| (i as usize) < f.dimension()));
    }

    #[test]
    fn test_transform_unseen_text_is_zero_vector() {
        let f = TextFeaturizer::new(word_only()).fit(&["great food"]);
        let v = f.transform("zzz qqq");
        assert_eq!(v.nnz(), 0);
        assert!(v.is_zero());
        assert_eq!(v.dimension, f.dimension());

        let empty = f.transform("");
        assert_eq!(empty.nnz(), 0);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let f = TextFeaturizer::new(FeaturizerOptions::default())
            .fit(&["the pasta was cold", "friendly staff and tasty pasta"]);
        assert_eq!(f.transform("tasty cold pasta"), f.transform("tasty cold pasta"));
    }

    #[test]
    fn test_min_term_count_prunes_rare_terms() {
        let opts = FeaturizerOptions {
            min_term_count: 2,
            word_ngram_length: 1,
            ..word_only()
        };
        let f = TextFeaturizer::new(opts).fit(&["good food", "good service"]);
        assert_eq!(f.dimension(), 1);
        assert_eq!(f.term_index("w:good"), Some(0));
    }

    #[test]
    fn test_tf_idf_downweights_common_terms() {
        let opts = FeaturizerOptions {
            weighting: TermWeighting::TfIdf,
            norm: VectorNorm::None,
            word_ngram_length: 1,
            ..word_only()
        };
        let f = TextFeaturizer::new(opts).fit(&["good food", "good service", "good vibes"]);
        let v = f.transform("good food");
        let dense = v.to_dense();
        let good = dense[f.term_index("w:good").unwrap() as usize];
        let food = dense[f.term_index("w:food").unwrap() as usize];
        assert!(food > good);
    }

    #[test]
    fn test_serde_round_trip_restores_index() {
        let f = TextFeaturizer::new(FeaturizerOptions::default()).fit(&["nice place", "bad place"]);
        let json = serde_json::to_string(&f).unwrap();
        let restored: FittedFeaturizer = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, f);
        assert_eq!(restored.transform("nice"), f.transform("nice"));
    }

    #[test]
    fn test_deserialize_rejects_duplicate_terms() {
        let json = r#"{"options":{},"vocabulary":["w:a","w:a"]}"#;
        let err = serde_json::from_str::<FittedFeaturizer>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
