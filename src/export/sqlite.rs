//! SQLite sink: relational storage for exams, questions, and choices.
//!
//! Schema: `exams` keyed by `exam_id`, `questions` with a synthetic key and
//! an `exam_id` foreign key, `choices` referencing the synthetic question
//! key. Re-exporting an exam replaces its rows rather than appending, so
//! the sink stays idempotent under resume and re-runs.

use std::path::Path;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, instrument};

use super::error::ExportError;
use crate::model::ExamRecord;

/// Maximum connections in the pool. Kept low for SQLite since it uses
/// file-level locking.
const MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in milliseconds.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Connection pool wrapper for the exam database.
#[derive(Debug, Clone)]
pub struct ExamDatabase {
    pool: SqlitePool,
}

impl ExamDatabase {
    /// Opens (creating if needed) the database at `db_path` and ensures the
    /// schema exists.
    ///
    /// WAL mode is enabled for concurrent reads and a busy timeout is set
    /// so concurrent pipeline writers wait instead of failing immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Database`] if the connection or schema setup
    /// fails.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn open(db_path: &Path) -> Result<Self, ExportError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// In-memory database for tests.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Database`] if the connection or schema setup
    /// fails.
    pub async fn open_in_memory() -> Result<Self, ExportError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    async fn ensure_schema(&self) -> Result<(), ExportError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS exams (
                exam_id INTEGER PRIMARY KEY,
                exam_name TEXT NOT NULL,
                level_name TEXT NOT NULL,
                subject_name TEXT NOT NULL,
                question_count INTEGER NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exam_id INTEGER NOT NULL,
                question_number INTEGER NOT NULL,
                question_id INTEGER NOT NULL,
                question_text TEXT NOT NULL,
                FOREIGN KEY (exam_id) REFERENCES exams(exam_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS choices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_pk INTEGER NOT NULL,
                choice_number INTEGER NOT NULL,
                choice_text TEXT NOT NULL,
                is_correct BOOLEAN NOT NULL,
                FOREIGN KEY (question_pk) REFERENCES questions(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Writes one exam, replacing any prior rows for the same `exam_id`.
    ///
    /// The exam row, the deletion of stale question/choice rows, and the
    /// fresh inserts happen inside a single transaction, so a failed write
    /// leaves the previous state intact.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Database`] if any statement fails; the
    /// transaction is rolled back on drop.
    #[instrument(skip(self, record), fields(exam_id = record.metadata.exam_id))]
    pub async fn upsert_exam(&self, record: &ExamRecord) -> Result<(), ExportError> {
        let meta = &record.metadata;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT OR REPLACE INTO exams
                (exam_id, exam_name, level_name, subject_name, question_count)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(meta.exam_id)
        .bind(&meta.exam_name)
        .bind(&meta.level_name)
        .bind(&meta.subject_name)
        .bind(meta.question_count)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM choices WHERE question_pk IN
                (SELECT id FROM questions WHERE exam_id = ?)",
        )
        .bind(meta.exam_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM questions WHERE exam_id = ?")
            .bind(meta.exam_id)
            .execute(&mut *tx)
            .await?;

        for question in &record.questions {
            let result = sqlx::query(
                "INSERT INTO questions (exam_id, question_number, question_id, question_text)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(meta.exam_id)
            .bind(question.question_number)
            .bind(question.question_id)
            .bind(&question.question_text)
            .execute(&mut *tx)
            .await?;

            let question_pk = result.last_insert_rowid();

            for choice in &question.choices {
                sqlx::query(
                    "INSERT INTO choices (question_pk, choice_number, choice_text, is_correct)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(question_pk)
                .bind(choice.choice_number)
                .bind(&choice.choice_text)
                .bind(choice.is_correct)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        debug!(questions = record.questions.len(), "exam rows written");
        Ok(())
    }

    /// Number of question rows stored for an exam. Used by tests and the
    /// resume diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Database`] if the query fails.
    pub async fn question_count(&self, exam_id: i64) -> Result<i64, ExportError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM questions WHERE exam_id = ?")
            .bind(exam_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Returns a reference to the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
