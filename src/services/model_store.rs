// Model Storage Service
// Persists the fitted pipeline and its input schema as one zip artifact

use crate::models::DataSchema;
use crate::services::error::{Result, SentimentError};
use crate::services::featurizer::FittedFeaturizer;
use crate::services::predictor::SentimentModel;
use crate::services::training::{LinearClassifier, PlattCalibrator};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Seek, Write};
use std::path::Path;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const FORMAT_VERSION: u32 = 1;

const MANIFEST_ENTRY: &str = "manifest.json";
const SCHEMA_ENTRY: &str = "schema.json";
const FEATURIZER_ENTRY: &str = "featurizer.json";
const CLASSIFIER_ENTRY: &str = "classifier.json";
const CALIBRATOR_ENTRY: &str = "calibrator.json";

/// Artifact header describing what the archive holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelManifest {
    pub format_version: u32,
    pub model_id: String,
    pub created_at: String,
    pub feature_dimension: usize,
    #[serde(default)]
    pub crate_version: String,
}

/// Write `model` and `schema` to `path`, replacing any existing file.
pub fn save(model: &SentimentModel, schema: &DataSchema, path: &Path) -> Result<ModelManifest> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SentimentError::io(parent, e))?;
    }

    let manifest = ModelManifest {
        format_version: FORMAT_VERSION,
        model_id: uuid::Uuid::new_v4().to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        feature_dimension: model.feature_dimension(),
        crate_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let file = File::create(path).map_err(|e| SentimentError::io(path, e))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    write_entry(&mut writer, path, MANIFEST_ENTRY, &manifest, options)?;
    write_entry(&mut writer, path, SCHEMA_ENTRY, schema, options)?;
    write_entry(&mut writer, path, FEATURIZER_ENTRY, model.featurizer(), options)?;
    write_entry(&mut writer, path, CLASSIFIER_ENTRY, model.classifier(), options)?;
    write_entry(&mut writer, path, CALIBRATOR_ENTRY, model.calibrator(), options)?;

    writer.finish().map_err(|e| archive_write_error(path, e))?;

    info!(
        path = %path.display(),
        model_id = %manifest.model_id,
        dimension = manifest.feature_dimension,
        "model.saved"
    );
    Ok(manifest)
}

fn write_entry<W: Write + Seek, T: Serialize + ?Sized>(
    writer: &mut ZipWriter<W>,
    path: &Path,
    name: &str,
    value: &T,
    options: SimpleFileOptions,
) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| SentimentError::corrupt(path, format!("failed to serialize {}: {}", name, e)))?;
    writer
        .start_file(name, options)
        .map_err(|e| archive_write_error(path, e))?;
    writer.write_all(&bytes).map_err(|e| SentimentError::io(path, e))
}

// Failures while writing are I/O; CorruptArtifact is reserved for loading.
fn archive_write_error(path: &Path, err: ZipError) -> SentimentError {
    let source = match err {
        ZipError::Io(e) => e,
        other => std::io::Error::other(other),
    };
    SentimentError::io(path, source)
}

fn read_entry<R: Read + Seek, T: DeserializeOwned>(
    archive: &mut ZipArchive<R>,
    path: &Path,
    name: &str,
) -> Result<T> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| SentimentError::corrupt(path, format!("missing entry {}: {}", name, e)))?;
    let mut content = Vec::new();
    entry
        .read_to_end(&mut content)
        .map_err(|e| SentimentError::corrupt(path, format!("unreadable entry {}: {}", name, e)))?;
    serde_json::from_slice(&content)
        .map_err(|e| SentimentError::corrupt(path, format!("invalid {}: {}", name, e)))
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    if !path.exists() {
        return Err(SentimentError::NotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|e| SentimentError::io(path, e))?;
    ZipArchive::new(file)
        .map_err(|e| SentimentError::corrupt(path, format!("not a model archive: {}", e)))
}

fn check_manifest(manifest: &ModelManifest, path: &Path) -> Result<()> {
    if manifest.format_version != FORMAT_VERSION {
        return Err(SentimentError::corrupt(
            path,
            format!("unsupported format version {}", manifest.format_version),
        ));
    }
    Ok(())
}

/// Read only the manifest of an artifact.
pub fn read_manifest(path: &Path) -> Result<ModelManifest> {
    let mut archive = open_archive(path)?;
    let manifest: ModelManifest = read_entry(&mut archive, path, MANIFEST_ENTRY)?;
    check_manifest(&manifest, path)?;
    Ok(manifest)
}

/// Restore a model and its schema. The artifact is accepted or rejected as a
/// whole.
pub fn load(path: &Path) -> Result<(SentimentModel, DataSchema)> {
    let mut archive = open_archive(path)?;

    let manifest: ModelManifest = read_entry(&mut archive, path, MANIFEST_ENTRY)?;
    check_manifest(&manifest, path)?;

    let schema: DataSchema = read_entry(&mut archive, path, SCHEMA_ENTRY)?;
    let featurizer: FittedFeaturizer = read_entry(&mut archive, path, FEATURIZER_ENTRY)?;
    let classifier: LinearClassifier = read_entry(&mut archive, path, CLASSIFIER_ENTRY)?;
    let calibrator: PlattCalibrator = read_entry(&mut archive, path, CALIBRATOR_ENTRY)?;

    if featurizer.dimension() != manifest.feature_dimension {
        return Err(SentimentError::corrupt(
            path,
            format!(
                "manifest declares dimension {} but vocabulary has {} terms",
                manifest.feature_dimension,
                featurizer.dimension()
            ),
        ));
    }

    let model = SentimentModel::new(featurizer, classifier, calibrator)
        .map_err(|e| SentimentError::corrupt(path, e.to_string()))?;

    info!(
        path = %path.display(),
        model_id = %manifest.model_id,
        dimension = model.feature_dimension(),
        "model.loaded"
    );
    Ok((model, schema))
}
