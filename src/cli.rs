//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::export::ExportFormat;

/// Batch extraction of exam question banks from a paginated web API.
///
/// Fetches every exam in an ID range, validates and deduplicates the
/// content, and writes JSON/CSV/SQLite artifacts with resume support.
#[derive(Parser, Debug)]
#[command(name = "exam-extractor")]
#[command(author, version, about)]
pub struct Args {
    /// Starting exam ID (overrides config)
    #[arg(long)]
    pub start: Option<i64>,

    /// Ending exam ID, inclusive (overrides config)
    #[arg(long)]
    pub end: Option<i64>,

    /// Path to the YAML config file
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Validate and count without writing any output
    #[arg(long)]
    pub dry_run: bool,

    /// Re-fetch IDs even when their output already exists
    #[arg(long)]
    pub no_resume: bool,

    /// Upstream API base URL (overrides config)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds (overrides config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Total fetch attempts per exam, including the first (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_retries: Option<u32>,

    /// Base retry backoff in seconds (overrides config)
    #[arg(long)]
    pub retry_delay: Option<f64>,

    /// Maximum concurrent pipelines (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u64).range(1..=100))]
    pub concurrency: Option<u64>,

    /// Pause in seconds after each completed pipeline (overrides config)
    #[arg(short = 'l', long)]
    pub rate_limit: Option<f64>,

    /// Output directory for all artifacts (overrides config)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Export format; repeat for multiple sinks (overrides config)
    #[arg(long = "format", value_enum)]
    pub formats: Vec<ExportFormat>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Applies flag overrides on top of the file and environment layers.
    ///
    /// Flags have the highest precedence; absent flags leave the current
    /// value untouched.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(base_url) = &self.base_url {
            config.api.base_url = base_url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.api.timeout = timeout;
        }
        if let Some(max_retries) = self.max_retries {
            config.api.max_retries = max_retries;
        }
        if let Some(retry_delay) = self.retry_delay {
            config.api.retry_delay = retry_delay;
        }
        if let Some(concurrency) = self.concurrency {
            config.download.concurrent_limit = concurrency as usize;
        }
        if let Some(rate_limit) = self.rate_limit {
            config.download.rate_limit_delay = rate_limit;
        }
        if self.no_resume {
            config.download.resume = false;
        }
        if let Some(output_dir) = &self.output_dir {
            config.output.directory = output_dir.clone();
        }
        if !self.formats.is_empty() {
            config.output.formats = self.formats.clone();
        }
        if let Some(start) = self.start {
            config.extraction.start_id = start;
        }
        if let Some(end) = self.end {
            config.extraction.end_id = end;
        }
    }
}
