//! Exam fetching: one HTTP round trip per exam ID with bounded retries.
//!
//! [`ExamClient`] is the pipeline's only I/O boundary on the upstream
//! side. It issues `GET {base_url}?exam_id={id}`, maps the body into an
//! [`ExamRecord`], and distinguishes three terminal outcomes: a mapped
//! record, an explicit not-found, and a tagged failure after retries.

mod error;
mod retry;

pub use error::FetchError;
pub use retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, RetryPolicy};

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::ExamRecord;

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one fetch contract invocation.
#[derive(Debug)]
pub enum FetchOutcome {
    /// A mapped exam record.
    Exam(ExamRecord),
    /// The upstream has no exam at this ID (HTTP 404). Not retried.
    NotFound,
}

/// HTTP client for the exam API.
///
/// Designed to be created once per run and shared across pipelines,
/// taking advantage of connection pooling.
#[derive(Debug, Clone)]
pub struct ExamClient {
    http: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl ExamClient {
    /// Creates a client with the default request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self::with_timeout(base_url, policy, DEFAULT_TIMEOUT)
    }

    /// Creates a client with an explicit request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied
    /// configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeout(
        base_url: impl Into<String>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            http,
            base_url: base_url.into(),
            policy,
        }
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches one exam with bounded retries and exponential backoff.
    ///
    /// Transient failures (timeout, transport error, unexpected status) are
    /// retried up to the policy's attempt bound, waiting
    /// `retry_delay * 2^attempt` between attempts and not at all after the
    /// last one. Terminal conditions return immediately: 404 maps to
    /// [`FetchOutcome::NotFound`] and a malformed 200 body to
    /// [`FetchError::Mapping`], neither consuming remaining retries.
    ///
    /// # Errors
    ///
    /// Returns the last transient error once retries are exhausted, a
    /// mapping error for malformed bodies, or [`FetchError::InvalidExamId`]
    /// for non-positive IDs.
    pub async fn fetch_exam(&self, exam_id: i64) -> Result<FetchOutcome, FetchError> {
        if exam_id <= 0 {
            return Err(FetchError::InvalidExamId { exam_id });
        }

        let url = format!("{}?exam_id={}", self.base_url, exam_id);
        let max_attempts = self.policy.max_retries();
        let mut last_error = None;

        for attempt in 0..max_attempts {
            match self.attempt(&url, exam_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() => {
                    warn!(
                        exam_id,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "fetch attempt failed"
                    );
                    last_error = Some(e);
                    if attempt + 1 < max_attempts {
                        tokio::time::sleep(self.policy.backoff_delay(attempt)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        warn!(exam_id, max_attempts, "fetch failed after all attempts");
        // max_attempts >= 1, so at least one attempt recorded an error.
        Err(last_error.unwrap_or(FetchError::InvalidExamId { exam_id }))
    }

    /// One request/response round trip with no retry handling.
    async fn attempt(&self, url: &str, exam_id: i64) -> Result<FetchOutcome, FetchError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        match response.status() {
            StatusCode::OK => {
                let body: Value = response
                    .json()
                    .await
                    .map_err(|e| FetchError::from_reqwest(url, e))?;
                let record = ExamRecord::from_api_response(&body)
                    .map_err(|e| FetchError::mapping(exam_id, e))?;
                debug!(exam_id, questions = record.questions.len(), "exam mapped");
                Ok(FetchOutcome::Exam(record))
            }
            StatusCode::NOT_FOUND => {
                debug!(exam_id, "exam not found (404)");
                Ok(FetchOutcome::NotFound)
            }
            status => Err(FetchError::status(url, status.as_u16())),
        }
    }
}
