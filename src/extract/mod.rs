//! Extraction engine: drives an ID range through fetch, validate,
//! duplicate-check, and export under a concurrency cap.
//!
//! # Concurrency Model
//!
//! - Each exam ID's pipeline runs in its own Tokio task
//! - A semaphore permit is acquired before the resume check, so a skip
//!   still consumes and releases a slot
//! - Permits are released automatically when pipelines finish (RAII)
//! - Completion order across IDs is unordered; stages within one ID are
//!   strictly sequential
//!
//! # Rate Limiting
//!
//! After each pipeline completes (success or failure, but not a resume
//! skip), the worker pauses for the configured delay before releasing its
//! slot, smoothing the outbound request rate independently of the cap.
//!
//! # Cancellation
//!
//! A [`CancellationToken`] stops submission of further IDs; pipelines
//! already in flight run to completion, and the caller still gets a
//! best-effort statistics summary.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dedup::DuplicateDetector;
use crate::export::Exporter;
use crate::fetch::{ExamClient, FetchError, FetchOutcome};
use crate::stats::{FailureKind, Statistics};
use crate::validate::validate_exam;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default number of concurrently in-flight pipelines.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Error type for engine construction and orchestration.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The ID range is inverted.
    #[error("invalid exam id range: start {start} is greater than end {end}")]
    InvalidRange {
        /// Range start.
        start: i64,
        /// Range end.
        end: i64,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Terminal state of one exam ID's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamOutcome {
    /// Resume found an existing artifact; no fetch attempted.
    Skipped,
    /// Not found upstream, retries exhausted, or the body failed to map.
    FetchFailed,
    /// Fetched but structurally invalid.
    ValidationFailed,
    /// Validated but a sink write failed.
    ExportFailed,
    /// Fully exported (or validated, in dry-run mode).
    Exported,
}

/// Tunables for one extraction run.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Maximum concurrently in-flight pipelines (1-100).
    pub concurrency: usize,
    /// Pause after each completed pipeline before its slot is released.
    pub rate_limit_delay: Duration,
    /// Skip IDs whose output already exists.
    pub resume: bool,
    /// Validate and count, but write nothing.
    pub dry_run: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            rate_limit_delay: Duration::from_millis(500),
            resume: true,
            dry_run: false,
        }
    }
}

/// Orchestrates the per-ID pipelines for one extraction run.
///
/// The engine owns the run-scoped mutable state (duplicate seen-set and
/// statistics) and hands shared references into pipeline tasks; nothing is
/// process-global, so a new run starts clean.
pub struct ExtractionEngine {
    client: Arc<ExamClient>,
    exporter: Arc<Exporter>,
    detector: Arc<DuplicateDetector>,
    stats: Arc<Statistics>,
    semaphore: Arc<Semaphore>,
    options: EngineOptions,
    cancel: CancellationToken,
}

impl ExtractionEngine {
    /// Creates an engine for one run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the concurrency is
    /// outside 1-100.
    pub fn new(
        client: ExamClient,
        exporter: Exporter,
        stats: Arc<Statistics>,
        options: EngineOptions,
        cancel: CancellationToken,
    ) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&options.concurrency) {
            return Err(EngineError::InvalidConcurrency {
                value: options.concurrency,
            });
        }

        debug!(
            concurrency = options.concurrency,
            rate_limit_ms = options.rate_limit_delay.as_millis(),
            resume = options.resume,
            dry_run = options.dry_run,
            "creating extraction engine"
        );

        Ok(Self {
            client: Arc::new(client),
            exporter: Arc::new(exporter),
            detector: Arc::new(DuplicateDetector::new()),
            stats,
            semaphore: Arc::new(Semaphore::new(options.concurrency)),
            options,
            cancel,
        })
    }

    /// Processes every exam ID in `[start_id, end_id]` inclusive.
    ///
    /// Each ID resolves to exactly one terminal state and updates the
    /// shared [`Statistics`] exactly once. Individual pipeline failures do
    /// not error this method; cancellation stops submission and lets
    /// in-flight pipelines finish.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRange`] for an inverted range, or
    /// [`EngineError::SemaphoreClosed`] if the semaphore is closed.
    pub async fn run(&self, start_id: i64, end_id: i64) -> Result<(), EngineError> {
        if start_id > end_id {
            return Err(EngineError::InvalidRange {
                start: start_id,
                end: end_id,
            });
        }

        info!(start_id, end_id, "starting extraction run");
        let mut handles = Vec::new();

        for exam_id in start_id..=end_id {
            if self.cancel.is_cancelled() {
                info!(exam_id, "cancellation requested, stopping submission");
                break;
            }

            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            let client = Arc::clone(&self.client);
            let exporter = Arc::clone(&self.exporter);
            let detector = Arc::clone(&self.detector);
            let stats = Arc::clone(&self.stats);
            let options = self.options.clone();

            handles.push(tokio::spawn(async move {
                // Permit is dropped when this block exits (RAII).
                let _permit = permit;

                let outcome =
                    process_exam(&client, &exporter, &detector, &stats, exam_id, &options).await;

                // Resume skips bypass the rate limit pause: no request
                // was made.
                if outcome != ExamOutcome::Skipped && !options.rate_limit_delay.is_zero() {
                    tokio::time::sleep(options.rate_limit_delay).await;
                }

                outcome
            }));
        }

        debug!(task_count = handles.len(), "waiting for pipelines");
        for handle in handles {
            // Task panics are logged but don't fail the run.
            if let Err(e) = handle.await {
                warn!(error = %e, "pipeline task panicked");
            }
        }

        info!(
            successful = self.stats.successful(),
            failed = self.stats.failed(),
            skipped = self.stats.skipped(),
            duplicates = self.stats.duplicates(),
            "extraction run complete"
        );
        Ok(())
    }
}

/// Runs one exam ID through the full pipeline and records its terminal
/// state in the statistics exactly once.
async fn process_exam(
    client: &ExamClient,
    exporter: &Exporter,
    detector: &DuplicateDetector,
    stats: &Statistics,
    exam_id: i64,
    options: &EngineOptions,
) -> ExamOutcome {
    if options.resume && exporter.exists(exam_id).await {
        debug!(exam_id, "skipped (already exists)");
        stats.record_skip();
        return ExamOutcome::Skipped;
    }

    let record = match client.fetch_exam(exam_id).await {
        Ok(FetchOutcome::Exam(record)) => record,
        Ok(FetchOutcome::NotFound) => {
            stats.record_failure(FailureKind::NotFound);
            return ExamOutcome::FetchFailed;
        }
        Err(e) => {
            warn!(exam_id, error = %e, "fetch failed");
            stats.record_failure(failure_kind(&e));
            return ExamOutcome::FetchFailed;
        }
    };

    let raw = serde_json::to_value(&record).unwrap_or(serde_json::Value::Null);
    let report = validate_exam(&raw);
    if !report.ok {
        error!(
            exam_id,
            errors = report.errors.join(", "),
            "validation failed"
        );
        stats.record_failure(FailureKind::Validation);
        return ExamOutcome::ValidationFailed;
    }

    // Duplicates are recorded but still exported.
    if detector.check(&record) {
        info!(exam_id, "duplicate content detected");
        stats.record_duplicate();
    }

    if options.dry_run {
        info!(exam_id, "would be extracted (dry-run)");
        stats.record_success();
        return ExamOutcome::Exported;
    }

    match exporter.export(&record).await {
        Ok(locations) => {
            debug!(exam_id, sinks = locations.len(), "exam exported");
            stats.record_success();
            ExamOutcome::Exported
        }
        Err(e) => {
            error!(exam_id, error = %e, "export failed");
            stats.record_failure(FailureKind::Export);
            ExamOutcome::ExportFailed
        }
    }
}

/// Maps a terminal fetch error onto its statistics category.
fn failure_kind(error: &FetchError) -> FailureKind {
    match error {
        FetchError::Mapping { .. } => FailureKind::Mapping,
        _ => FailureKind::Fetch,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::export::ExportFormat;
    use crate::fetch::RetryPolicy;
    use tempfile::TempDir;

    async fn test_exporter(dir: &TempDir) -> Exporter {
        Exporter::new(dir.path(), vec![ExportFormat::Json])
            .await
            .unwrap()
    }

    fn test_client() -> ExamClient {
        ExamClient::new(
            "http://127.0.0.1:1",
            RetryPolicy::new(1, Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn test_engine_rejects_invalid_concurrency() {
        let dir = TempDir::new().unwrap();
        let options = EngineOptions {
            concurrency: 0,
            ..EngineOptions::default()
        };
        let result = ExtractionEngine::new(
            test_client(),
            test_exporter(&dir).await,
            Arc::new(Statistics::new()),
            options,
            CancellationToken::new(),
        );
        assert!(matches!(
            result,
            Err(EngineError::InvalidConcurrency { value: 0 })
        ));
    }

    #[tokio::test]
    async fn test_engine_rejects_inverted_range() {
        let dir = TempDir::new().unwrap();
        let engine = ExtractionEngine::new(
            test_client(),
            test_exporter(&dir).await,
            Arc::new(Statistics::new()),
            EngineOptions::default(),
            CancellationToken::new(),
        )
        .unwrap();

        let err = engine.run(10, 5).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidRange { start: 10, end: 5 }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_engine_submits_nothing() {
        let dir = TempDir::new().unwrap();
        let stats = Arc::new(Statistics::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let engine = ExtractionEngine::new(
            test_client(),
            test_exporter(&dir).await,
            Arc::clone(&stats),
            EngineOptions::default(),
            cancel,
        )
        .unwrap();

        engine.run(1, 100).await.unwrap();
        // Nothing ran: no successes, no failures, no skips.
        assert_eq!(stats.summary().total_processed, 0);
    }

    #[test]
    fn test_default_concurrency_constant() {
        assert_eq!(DEFAULT_CONCURRENCY, 5);
    }
}
