// Dataset Service
// Loads delimited (text, label) files through a column-binding schema and
// splits records into train/test partitions

use crate::models::{DataSchema, Record};
use crate::services::error::{Result, SentimentError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// Train/test partition of a record set.
#[derive(Debug, Clone)]
pub struct DataSplit {
    pub train: Vec<Record>,
    pub test: Vec<Record>,
}

/// Load every record of a delimited file.
pub fn load_records(path: &Path, schema: &DataSchema) -> Result<Vec<Record>> {
    let file = File::open(path).map_err(|e| SentimentError::io(path, e))?;
    let records = read_records(BufReader::new(file), schema).map_err(|e| match e {
        SentimentError::Io { source, .. } => SentimentError::io(path, source),
        other => other,
    })?;

    info!(
        path = %path.display(),
        rows = records.len(),
        positive = records.iter().filter(|r| r.label).count(),
        "dataset.loaded"
    );
    Ok(records)
}

/// Parse records from any buffered reader.
pub fn read_records<R: BufRead>(reader: R, schema: &DataSchema) -> Result<Vec<Record>> {
    let text_col = schema
        .text_column()
        .ok_or_else(|| SentimentError::Config("schema has no text column".to_string()))?
        .index;
    let label_col = schema
        .label_column()
        .ok_or_else(|| SentimentError::Config("schema has no label column".to_string()))?
        .index;
    let expected = schema.column_count();

    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| SentimentError::io("<dataset>", e))?;
        let line = line.strip_suffix('\r').unwrap_or(&line);

        if schema.has_header && line_no == 1 {
            continue;
        }
        if line.trim().is_empty() {
            debug!(line = line_no, "dataset.blank_line_skipped");
            continue;
        }

        let fields: Vec<&str> = line.split(schema.separator).collect();
        if fields.len() != expected {
            return Err(SentimentError::data_format(
                line_no,
                format!("expected {} fields, found {}", expected, fields.len()),
            ));
        }

        let label = parse_label(fields[label_col])
            .ok_or_else(|| {
                SentimentError::data_format(
                    line_no,
                    format!("label must be 0 or 1, found {:?}", fields[label_col]),
                )
            })?;

        records.push(Record::new(fields[text_col], label));
    }

    Ok(records)
}

fn parse_label(field: &str) -> Option<bool> {
    match field.trim() {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

/// Number of rows assigned to the test set for `n` records.
fn test_count(n: usize, test_fraction: f64) -> usize {
    if n < 2 {
        return 0;
    }
    let raw = (n as f64 * test_fraction).round() as usize;
    raw.clamp(1, n - 1)
}

/// Seeded train/test split. Each subset keeps source order.
pub fn train_test_split(records: &[Record], test_fraction: f64, seed: u64) -> Result<DataSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(SentimentError::Config(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let n = records.len();
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = test_count(n, test_fraction);
    let mut test_idx = indices[..n_test].to_vec();
    let mut train_idx = indices[n_test..].to_vec();
    test_idx.sort_unstable();
    train_idx.sort_unstable();

    let train: Vec<Record> = train_idx.iter().map(|&i| records[i].clone()).collect();
    let test: Vec<Record> = test_idx.iter().map(|&i| records[i].clone()).collect();

    info!(
        train = train.len(),
        test = test.len(),
        test_fraction,
        seed,
        "dataset.split"
    );

    Ok(DataSplit { train, test })
}
