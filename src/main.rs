//! CLI entry point for the exam extractor.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use exam_extractor::cli::Args;
use exam_extractor::{
    Config, EngineOptions, ExamClient, ExtractionEngine, Exporter, RetryPolicy, Statistics,
};

/// Exit code for a user-interrupted run (conventional SIGINT code).
const EXIT_INTERRUPTED: u8 = 130;

/// Filename of the machine-readable report in the output directory.
const REPORT_FILENAME: &str = "extraction_report.json";

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = format!("{e:#}"), "fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    debug!(?args, "CLI arguments parsed");

    // Layered configuration: file, then environment, then flags.
    let mut config = Config::load(&args.config).context("loading configuration")?;
    config.apply_env().context("applying environment overrides")?;
    args.apply_overrides(&mut config);

    let start_id = config.extraction.start_id;
    let end_id = config.extraction.end_id;
    info!(start_id, end_id, "starting extraction");
    if args.dry_run {
        info!("dry-run mode: no files will be written");
    }

    let policy = RetryPolicy::new(config.api.max_retries, config.api.retry_delay_duration());
    let client = ExamClient::with_timeout(
        config.api.base_url.clone(),
        policy,
        config.api.timeout_duration(),
    );
    let exporter = Exporter::new(&config.output.directory, config.output.formats.clone())
        .await
        .context("initializing export sinks")?;
    let report_path = config.output.directory.join(REPORT_FILENAME);
    let stats = Arc::new(Statistics::new());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, finishing in-flight work");
                cancel.cancel();
            }
        });
    }

    let options = EngineOptions {
        concurrency: config.download.concurrent_limit,
        rate_limit_delay: config.download.rate_limit_duration(),
        resume: config.download.resume,
        dry_run: args.dry_run,
    };
    let engine = ExtractionEngine::new(
        client,
        exporter,
        Arc::clone(&stats),
        options,
        cancel.clone(),
    )?;
    engine.run(start_id, end_id).await?;

    // Best-effort summary: printed even after an interrupt.
    let mut summary = stats.summary();
    println!("{}", summary.render());

    if !args.dry_run {
        match summary.write_report(&report_path) {
            Ok(()) => info!(path = %report_path.display(), "statistics report saved"),
            Err(e) => warn!(error = %e, "failed to write statistics report"),
        }
    }

    if cancel.is_cancelled() {
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
