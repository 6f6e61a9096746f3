//! Configuration: YAML file, environment overrides, typed accessors.
//!
//! Precedence is flag > environment variable > file > built-in default.
//! The file and env layers live here; CLI flags are merged on top by the
//! binary (see `main.rs`).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::export::ExportFormat;

/// Errors raised while loading or overriding configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for the expected shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// An environment variable override had an unusable value.
    #[error("invalid value {value:?} for environment variable {var}")]
    InvalidEnv {
        /// The variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Fetcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Upstream endpoint; the exam ID is appended as a query parameter.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    /// Total fetch attempts per exam, including the first.
    pub max_retries: u32,
    /// Base backoff delay in seconds; doubled per attempt.
    pub retry_delay: f64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url:
                "https://www.trueplookpanya.com/webservice/api/examination/formdoexamination"
                    .to_string(),
            timeout: 30,
            max_retries: 3,
            retry_delay: 2.0,
        }
    }
}

impl ApiConfig {
    /// Per-request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Base retry delay as a [`Duration`].
    #[must_use]
    pub fn retry_delay_duration(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay.max(0.0))
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Maximum concurrently in-flight pipelines.
    pub concurrent_limit: usize,
    /// Pause in seconds after each completed pipeline.
    pub rate_limit_delay: f64,
    /// Skip IDs whose output already exists.
    pub resume: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 5,
            rate_limit_delay: 0.5,
            resume: true,
        }
    }
}

impl DownloadConfig {
    /// Rate limit pause as a [`Duration`].
    #[must_use]
    pub fn rate_limit_duration(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_delay.max(0.0))
    }
}

/// Exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving all artifacts.
    pub directory: PathBuf,
    /// Enabled sinks.
    pub formats: Vec<ExportFormat>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data/output"),
            formats: vec![ExportFormat::Json],
        }
    }
}

/// ID range settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// First exam ID, inclusive.
    pub start_id: i64,
    /// Last exam ID, inclusive.
    pub end_id: i64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            start_id: 14000,
            end_id: 20000,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub download: DownloadConfig,
    pub output: OutputConfig,
    pub extraction: ExtractionConfig,
}

impl Config {
    /// Loads configuration from a YAML file.
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged, matching the expectation that the tool runs out of the box.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] for unreadable files and
    /// [`ConfigError::Parse`] for malformed YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let body = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_yaml::from_str(&body).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Applies `EXAM_*` environment variable overrides on top of the file
    /// layer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if a set variable cannot be
    /// parsed into the target type.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(base_url) = env_string("EXAM_API_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Some(timeout) = env_parse("EXAM_API_TIMEOUT")? {
            self.api.timeout = timeout;
        }
        if let Some(max_retries) = env_parse("EXAM_API_MAX_RETRIES")? {
            self.api.max_retries = max_retries;
        }
        if let Some(retry_delay) = env_parse("EXAM_API_RETRY_DELAY")? {
            self.api.retry_delay = retry_delay;
        }
        if let Some(limit) = env_parse("EXAM_CONCURRENT_LIMIT")? {
            self.download.concurrent_limit = limit;
        }
        if let Some(delay) = env_parse("EXAM_RATE_LIMIT_DELAY")? {
            self.download.rate_limit_delay = delay;
        }
        if let Some(resume) = env_parse("EXAM_RESUME")? {
            self.download.resume = resume;
        }
        if let Some(dir) = env_string("EXAM_OUTPUT_DIR") {
            self.output.directory = PathBuf::from(dir);
        }
        if let Some(formats) = env_string("EXAM_OUTPUT_FORMATS") {
            self.output.formats = parse_formats("EXAM_OUTPUT_FORMATS", &formats)?;
        }
        if let Some(start_id) = env_parse("EXAM_START_ID")? {
            self.extraction.start_id = start_id;
        }
        if let Some(end_id) = env_parse("EXAM_END_ID")? {
            self.extraction.end_id = end_id;
        }
        Ok(())
    }
}

fn env_string(var: &'static str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env_string(var) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

/// Parses a comma-separated format list, e.g. `json,sqlite`.
fn parse_formats(var: &'static str, value: &str) -> Result<Vec<ExportFormat>, ConfigError> {
    value
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            part.parse().map_err(|_| ConfigError::InvalidEnv {
                var,
                value: value.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    /// Env mutations are process-wide; serialize the tests that touch them.
    fn env_lock() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Restores an env var to its previous value (or removes it) when dropped.
    struct RestoreEnv {
        key: &'static str,
        value: Option<std::ffi::OsString>,
    }

    impl RestoreEnv {
        fn set(key: &'static str, new_value: &str) -> Self {
            let value = std::env::var_os(key);
            // SAFETY: test holds the env lock and restores on drop.
            unsafe { std::env::set_var(key, new_value) };
            Self { key, value }
        }
    }

    impl Drop for RestoreEnv {
        fn drop(&mut self) {
            // SAFETY: test restores env to prior state under the lock.
            match &self.value {
                Some(v) => unsafe { std::env::set_var(self.key, v) },
                None => unsafe { std::env::remove_var(self.key) },
            }
        }
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.api.timeout, 30);
        assert_eq!(config.api.max_retries, 3);
        assert!((config.api.retry_delay - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.download.concurrent_limit, 5);
        assert!(config.download.resume);
        assert_eq!(config.output.formats, vec![ExportFormat::Json]);
        assert_eq!(config.extraction.start_id, 14000);
        assert_eq!(config.extraction.end_id, 20000);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config.download.concurrent_limit, 5);
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "api:\n  timeout: 10\noutput:\n  formats: [json, sqlite]\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.timeout, 10);
        assert_eq!(config.api.max_retries, 3);
        assert_eq!(
            config.output.formats,
            vec![ExportFormat::Json, ExportFormat::Sqlite]
        );
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "api: [this is not a mapping").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let _guard = env_lock();
        let _timeout = RestoreEnv::set("EXAM_API_TIMEOUT", "7");
        let _start = RestoreEnv::set("EXAM_START_ID", "100");
        let _formats = RestoreEnv::set("EXAM_OUTPUT_FORMATS", "csv,sqlite");

        let mut config = Config::default();
        config.apply_env().unwrap();
        assert_eq!(config.api.timeout, 7);
        assert_eq!(config.extraction.start_id, 100);
        assert_eq!(
            config.output.formats,
            vec![ExportFormat::Csv, ExportFormat::Sqlite]
        );
    }

    #[test]
    fn test_invalid_env_value_is_an_error() {
        let _guard = env_lock();
        let _timeout = RestoreEnv::set("EXAM_API_TIMEOUT", "soon");

        let mut config = Config::default();
        let err = config.apply_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "EXAM_API_TIMEOUT",
                ..
            }
        ));
    }

    #[test]
    fn test_resume_env_parses_bool() {
        let _guard = env_lock();
        let _resume = RestoreEnv::set("EXAM_RESUME", "false");

        let mut config = Config::default();
        config.apply_env().unwrap();
        assert!(!config.download.resume);
    }

    #[test]
    fn test_duration_accessors() {
        let config = Config::default();
        assert_eq!(config.api.timeout_duration(), Duration::from_secs(30));
        assert_eq!(
            config.download.rate_limit_duration(),
            Duration::from_millis(500)
        );
        assert_eq!(
            config.api.retry_delay_duration(),
            Duration::from_secs(2)
        );
    }
}
