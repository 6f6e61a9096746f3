//! Run statistics: counters, error breakdown, and the summary report.
//!
//! A [`Statistics`] instance is owned by one extraction run and shared by
//! reference into pipeline workers. Counters are atomic so concurrently
//! completing pipelines can record terminal outcomes without coordination.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Named failure categories for the error breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Upstream has no record for the ID (HTTP 404).
    NotFound,
    /// Transient fetch failure that exhausted its retries.
    Fetch,
    /// 200 response whose body did not match the expected shape.
    Mapping,
    /// Well-formed response that failed structural validation.
    Validation,
    /// A sink write failed.
    Export,
}

impl FailureKind {
    /// Stable key used in the error breakdown map.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Fetch => "fetch_failed",
            Self::Mapping => "mapping_failed",
            Self::Validation => "validation_failed",
            Self::Export => "export_failed",
        }
    }
}

/// Counters for one extraction run.
#[derive(Debug)]
pub struct Statistics {
    successful: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    duplicates: AtomicU64,
    errors: Mutex<BTreeMap<&'static str, u64>>,
    started: Instant,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    /// Creates a fresh tracker; the elapsed clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            errors: Mutex::new(BTreeMap::new()),
            started: Instant::now(),
        }
    }

    /// Records a successfully exported (or dry-run validated) exam.
    pub fn record_success(&self) {
        self.successful.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a terminal failure under its category.
    pub fn record_failure(&self, kind: FailureKind) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut errors) = self.errors.lock() {
            *errors.entry(kind.as_str()).or_insert(0) += 1;
        }
    }

    /// Records a resume skip.
    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a duplicate detection hit.
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::SeqCst);
    }

    #[must_use]
    pub fn successful(&self) -> u64 {
        self.successful.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn duplicates(&self) -> u64 {
        self.duplicates.load(Ordering::SeqCst)
    }

    /// Builds the summary over everything recorded so far.
    #[must_use]
    pub fn summary(&self) -> Summary {
        let successful = self.successful();
        let failed = self.failed();
        let skipped = self.skipped();
        let total_processed = successful + failed + skipped;
        let elapsed_time = self.started.elapsed().as_secs_f64();

        let (avg_time_per_exam, success_rate) = if total_processed > 0 {
            (
                elapsed_time / total_processed as f64,
                successful as f64 / total_processed as f64 * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        let errors = self
            .errors
            .lock()
            .map(|map| {
                map.iter()
                    .map(|(k, v)| ((*k).to_string(), *v))
                    .collect()
            })
            .unwrap_or_default();

        Summary {
            total_processed,
            successful,
            failed,
            skipped,
            duplicates: self.duplicates(),
            elapsed_time,
            avg_time_per_exam,
            success_rate,
            errors,
            timestamp: None,
        }
    }
}

/// Machine-readable summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub skipped: u64,
    pub duplicates: u64,
    /// Wall-clock seconds for the whole run.
    pub elapsed_time: f64,
    pub avg_time_per_exam: f64,
    /// Percentage of processed IDs that were exported.
    pub success_rate: f64,
    /// Failure-kind to count.
    pub errors: BTreeMap<String, u64>,
    /// RFC 3339 timestamp, set when the report file is written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Summary {
    /// Renders the human-readable end-of-run banner.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "EXTRACTION SUMMARY");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Total Processed:  {}", self.total_processed);
        let _ = writeln!(
            out,
            "Successful:       {} ({:.1}%)",
            self.successful, self.success_rate
        );
        let _ = writeln!(out, "Failed:           {}", self.failed);
        let _ = writeln!(out, "Skipped:          {}", self.skipped);
        let _ = writeln!(out, "Duplicates:       {}", self.duplicates);
        let _ = writeln!(out, "Elapsed Time:     {:.2} seconds", self.elapsed_time);
        let _ = writeln!(
            out,
            "Avg Time/Exam:    {:.2} seconds",
            self.avg_time_per_exam
        );
        if !self.errors.is_empty() {
            let _ = writeln!(out, "\nError Breakdown:");
            for (kind, count) in &self.errors {
                let _ = writeln!(out, "  {kind}: {count}");
            }
        }
        let _ = writeln!(out, "{rule}");
        out
    }

    /// Stamps the summary and writes it as pretty JSON to `path`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be written.
    pub fn write_report(&mut self, path: &Path) -> std::io::Result<()> {
        self.timestamp = Some(chrono::Utc::now().to_rfc3339());
        let body = serde_json::to_vec_pretty(self)
            .map_err(std::io::Error::other)?;
        std::fs::write(path, body)
    }
}
