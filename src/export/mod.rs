//! Export sinks for validated exam records.
//!
//! The [`Exporter`] owns the output directory and the configured sinks.
//! It also answers the resume predicate: an exam ID is considered already
//! extracted when a JSON artifact with its `{exam_id}_` prefix exists.
//!
//! File sinks write to a temporary sibling and rename into place, so a
//! crashed or cancelled run never leaves a partially written artifact
//! under the final name.

mod error;
mod filename;
mod sqlite;

pub use error::ExportError;
pub use filename::{artifact_stem, sanitize_filename};
pub use sqlite::ExamDatabase;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::model::ExamRecord;

/// Filename of the SQLite sink inside the output directory.
const DB_FILENAME: &str = "exams.db";

/// Supported export formats.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// One structured JSON file per exam.
    Json,
    /// One flattened CSV file per exam, one row per (question, choice).
    Csv,
    /// Relational rows in a shared SQLite database.
    Sqlite,
}

impl ExportFormat {
    /// Sink name used in logs and the export location map.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

/// Writes validated exam records to every configured sink.
#[derive(Debug, Clone)]
pub struct Exporter {
    output_dir: PathBuf,
    formats: Vec<ExportFormat>,
    db: Option<ExamDatabase>,
}

impl Exporter {
    /// Creates the output directory and initializes configured sinks.
    ///
    /// The SQLite database is opened (and its schema created) only when
    /// the `sqlite` format is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] if the output directory cannot be
    /// created, or [`ExportError::Database`] if SQLite setup fails.
    #[instrument(skip(formats), fields(output_dir = %output_dir.display()))]
    pub async fn new(
        output_dir: &Path,
        formats: Vec<ExportFormat>,
    ) -> Result<Self, ExportError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| ExportError::io(output_dir, e))?;

        let db = if formats.contains(&ExportFormat::Sqlite) {
            Some(ExamDatabase::open(&output_dir.join(DB_FILENAME)).await?)
        } else {
            None
        };

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            formats,
            db,
        })
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Resume predicate: true iff a JSON artifact for `exam_id` already
    /// exists in the output directory.
    ///
    /// Matches on the `{exam_id}_` filename prefix, so it works without
    /// knowing the exam's name fields. The scan is deliberately
    /// uncached: artifacts written after construction are visible to
    /// later checks.
    pub async fn exists(&self, exam_id: i64) -> bool {
        let prefix = format!("{exam_id}_");
        let Ok(mut entries) = tokio::fs::read_dir(&self.output_dir).await else {
            return false;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            if name.to_str().is_some_and(|n| {
                n.starts_with(&prefix) && n.ends_with(".json")
            }) {
                return true;
            }
        }
        false
    }

    /// Writes `record` to every configured sink.
    ///
    /// Returns a map of sink name to artifact location. Each sink is
    /// atomic on its own: file sinks go through a temp-then-rename write
    /// and the SQLite sink writes inside one transaction. The first
    /// failing sink aborts the remainder and fails the export.
    ///
    /// # Errors
    ///
    /// Returns the first sink error encountered.
    #[instrument(skip(self, record), fields(exam_id = record.metadata.exam_id))]
    pub async fn export(
        &self,
        record: &ExamRecord,
    ) -> Result<BTreeMap<String, String>, ExportError> {
        let stem = artifact_stem(&record.metadata);
        let mut locations = BTreeMap::new();

        for format in &self.formats {
            let location = match format {
                ExportFormat::Json => self.export_json(record, &stem).await?,
                ExportFormat::Csv => self.export_csv(record, &stem).await?,
                ExportFormat::Sqlite => self.export_sqlite(record).await?,
            };
            debug!(sink = format.as_str(), location = %location, "sink written");
            locations.insert(format.as_str().to_string(), location);
        }

        Ok(locations)
    }

    async fn export_json(
        &self,
        record: &ExamRecord,
        stem: &str,
    ) -> Result<String, ExportError> {
        let path = self.output_dir.join(format!("{stem}.json"));
        let body = serde_json::to_vec_pretty(record).map_err(|e| ExportError::Serialize {
            exam_id: record.metadata.exam_id,
            source: e,
        })?;
        write_atomic(&path, &body).await?;
        Ok(path.display().to_string())
    }

    async fn export_csv(&self, record: &ExamRecord, stem: &str) -> Result<String, ExportError> {
        let path = self.output_dir.join(format!("{stem}.csv"));
        let exam_id = record.metadata.exam_id;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "Question Number",
                "Question Text",
                "Choice Number",
                "Choice Text",
                "Is Correct",
            ])
            .map_err(|e| ExportError::Csv { exam_id, source: e })?;

        for question in &record.questions {
            for choice in &question.choices {
                writer
                    .write_record([
                        question.question_number.to_string(),
                        question.question_text.clone(),
                        choice.choice_number.to_string(),
                        choice.choice_text.clone(),
                        choice.is_correct.to_string(),
                    ])
                    .map_err(|e| ExportError::Csv { exam_id, source: e })?;
            }
        }

        let body = writer
            .into_inner()
            .map_err(|e| ExportError::Csv {
                exam_id,
                source: e.into_error().into(),
            })?;
        write_atomic(&path, &body).await?;
        Ok(path.display().to_string())
    }

    async fn export_sqlite(&self, record: &ExamRecord) -> Result<String, ExportError> {
        let db_path = self.output_dir.join(DB_FILENAME);
        if let Some(db) = &self.db {
            db.upsert_exam(record).await?;
        }
        Ok(db_path.display().to_string())
    }
}

/// Writes `body` to a temporary sibling of `path` and renames it into
/// place. Rename within one directory is atomic on POSIX file systems, so
/// readers never observe a partially written artifact.
async fn write_atomic(path: &Path, body: &[u8]) -> Result<(), ExportError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp, body)
        .await
        .map_err(|e| ExportError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| ExportError::io(path, e))?;
    Ok(())
}
