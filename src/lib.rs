//! Exam Extractor Library
//!
//! Core functionality for the exam-extractor tool, which pulls exam
//! content (metadata, questions, multiple-choice answers) from a
//! paginated-by-ID web API, validates it, deduplicates it by content
//! hash, and persists it to JSON, CSV, and SQLite sinks with resume
//! support.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`model`] - Canonical exam record types and API response mapping
//! - [`validate`] - Structural validation of fetched records
//! - [`dedup`] - Content hashing and duplicate detection
//! - [`fetch`] - HTTP client with bounded retries and backoff
//! - [`export`] - JSON/CSV/SQLite sinks and the resume predicate
//! - [`extract`] - Concurrency-capped orchestration of the pipeline
//! - [`stats`] - Run counters and the summary report
//! - [`config`] - YAML config with environment overrides

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod cli;
pub mod config;
pub mod dedup;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod stats;
pub mod validate;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use dedup::{DuplicateDetector, canonical_digest};
pub use export::{ExamDatabase, ExportError, ExportFormat, Exporter};
pub use extract::{
    DEFAULT_CONCURRENCY, EngineError, EngineOptions, ExamOutcome, ExtractionEngine,
};
pub use fetch::{
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, ExamClient, FetchError, FetchOutcome, RetryPolicy,
};
pub use model::{Choice, ExamMetadata, ExamRecord, MappingError, Question};
pub use stats::{FailureKind, Statistics, Summary};
pub use validate::{ValidationReport, validate_exam};
