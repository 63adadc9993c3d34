// Configuration Storage Service
// Handles config file read/write, version backup and environment overrides

use crate::models::{DataSchema, FeaturizerOptions, SplitOptions, TrainerOptions};
use crate::services::error::{Result, SentimentError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Train even when a model artifact already exists.
    #[serde(default)]
    pub force_retrain: bool,
    #[serde(default)]
    pub split: SplitOptions,
    #[serde(default)]
    pub schema: DataSchema,
    #[serde(default)]
    pub featurizer: FeaturizerOptions,
    #[serde(default)]
    pub trainer: TrainerOptions,
    #[serde(default = "default_sample_texts")]
    pub sample_texts: Vec<String>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            model_path: default_model_path(),
            force_retrain: false,
            split: SplitOptions::default(),
            schema: DataSchema::default(),
            featurizer: FeaturizerOptions::default(),
            trainer: TrainerOptions::default(),
            sample_texts: default_sample_texts(),
            log_dir: None,
        }
    }
}

fn default_dataset_path() -> PathBuf { PathBuf::from("yelp_labelled.txt") }
fn default_model_path() -> PathBuf { PathBuf::from("model.zip") }
fn default_sample_texts() -> Vec<String> {
    vec![
        "this is a great restaurant".to_string(),
        "this is a bad restaurant".to_string(),
    ]
}

fn env_flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "yes")
}

impl AppConfig {
    /// Apply `SENTIMENT_*` environment variables on top of file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Same as `apply_env_overrides` with an injectable variable source.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = present("SENTIMENT_DATASET") {
            self.dataset_path = PathBuf::from(v);
        }
        if let Some(v) = present("SENTIMENT_MODEL") {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = present("SENTIMENT_TEST_FRACTION") {
            self.split.test_fraction = v.trim().parse().map_err(|_| {
                SentimentError::Config(format!("SENTIMENT_TEST_FRACTION is not a number: {}", v))
            })?;
        }
        if let Some(v) = present("SENTIMENT_SEED") {
            let seed: u64 = v.trim().parse().map_err(|_| {
                SentimentError::Config(format!("SENTIMENT_SEED is not an integer: {}", v))
            })?;
            self.split.seed = seed;
            self.trainer.sdca.seed = seed;
        }
        if let Some(v) = present("SENTIMENT_FORCE_RETRAIN") {
            self.force_retrain = env_flag(&v);
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let fraction = self.split.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(SentimentError::Config(format!(
                "split.testFraction must be in (0, 1), got {}",
                fraction
            )));
        }
        if self.schema.text_column().is_none() || self.schema.label_column().is_none() {
            return Err(SentimentError::Config(
                "schema must bind one text column and one label column".to_string(),
            ));
        }
        let text_idx = self.schema.text_column().map(|c| c.index);
        if text_idx == self.schema.label_column().map(|c| c.index) {
            return Err(SentimentError::Config(
                "text and label columns must differ".to_string(),
            ));
        }
        if self.featurizer.word_ngram_length == 0 && !self.featurizer.use_char_ngrams {
            return Err(SentimentError::Config(
                "featurizer emits no terms: enable word or char n-grams".to_string(),
            ));
        }
        if self.featurizer.use_char_ngrams && self.featurizer.char_ngram_length == 0 {
            return Err(SentimentError::Config(
                "featurizer.charNgramLength must be at least 1".to_string(),
            ));
        }
        let sdca = &self.trainer.sdca;
        if !(sdca.l2_regularization > 0.0 && sdca.l2_regularization.is_finite()) {
            return Err(SentimentError::Config(format!(
                "trainer.sdca.l2Regularization must be positive, got {}",
                sdca.l2_regularization
            )));
        }
        if sdca.max_iterations == 0 {
            return Err(SentimentError::Config(
                "trainer.sdca.maxIterations must be at least 1".to_string(),
            ));
        }
        if !(sdca.convergence_tolerance >= 0.0) {
            return Err(SentimentError::Config(format!(
                "trainer.sdca.convergenceTolerance must be non-negative, got {}",
                sdca.convergence_tolerance
            )));
        }
        Ok(())
    }
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Store rooted at an explicit config file path.
    pub fn from_file(config_file: PathBuf) -> Self {
        let config_dir = config_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sentiment"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.config_dir).map_err(|e| SentimentError::io(&self.config_dir, e))
    }

    /// Load configuration from file, or defaults when there is none
    pub fn load(&self) -> Result<AppConfig> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| SentimentError::io(&self.config_file, e))?;

        serde_json::from_str(&content).map_err(|e| {
            SentimentError::Config(format!(
                "failed to parse {}: {}",
                self.config_file.display(),
                e
            ))
        })
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| SentimentError::Config(format!("failed to serialize config: {}", e)))?;

        fs::write(&self.config_file, content).map_err(|e| SentimentError::io(&self.config_file, e))?;
        info!(path = %self.config_file.display(), "config.saved");
        Ok(())
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<PathBuf> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir).map_err(|e| SentimentError::io(&backup_dir, e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file).map_err(|e| SentimentError::io(&backup_file, e))?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)?;

        Ok(backup_file)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<()> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| SentimentError::io(backup_dir, e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Oldest first; names carry the timestamp so they break mtime ties
        entries.sort_by_key(|e| {
            (
                e.metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                e.file_name(),
            )
        });

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }
}
