// Error Types
// Failure taxonomy shared by every pipeline stage

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("malformed dataset row at line {line}: {reason}")]
    DataFormat { line: usize, reason: String },
    #[error("training failed: {0}")]
    Training(String),
    #[error("corrupt model artifact {}: {reason}", .path.display())]
    CorruptArtifact { path: PathBuf, reason: String },
    #[error("model artifact not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SentimentError>;

impl SentimentError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn data_format(line: usize, reason: impl Into<String>) -> Self {
        Self::DataFormat {
            line,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_location() {
        let err = SentimentError::data_format(7, "label must be 0 or 1");
        assert_eq!(
            err.to_string(),
            "malformed dataset row at line 7: label must be 0 or 1"
        );

        let err = SentimentError::NotFound(PathBuf::from("model.zip"));
        assert_eq!(err.to_string(), "model artifact not found: model.zip");
    }
}
