//! Error types for export sinks.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while writing exam artifacts.
#[derive(Debug, Error)]
pub enum ExportError {
    /// File system error while writing an artifact.
    #[error("IO error writing {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Record could not be serialized for the JSON sink.
    #[error("failed to serialize exam {exam_id}: {source}")]
    Serialize {
        /// The exam being exported.
        exam_id: i64,
        /// The underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// CSV encoding failed.
    #[error("failed to encode CSV for exam {exam_id}: {source}")]
    Csv {
        /// The exam being exported.
        exam_id: i64,
        /// The underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// SQLite sink failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ExportError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
