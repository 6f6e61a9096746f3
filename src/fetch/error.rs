//! Error types for exam fetching.

use thiserror::Error;

use crate::model::MappingError;

/// Errors that can occur while fetching one exam.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Unexpected HTTP status (anything other than 200 and 404).
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// 200 response whose body did not match the expected shape.
    #[error("exam {exam_id}: response body did not match expected shape: {source}")]
    Mapping {
        /// The exam ID whose response failed to map.
        exam_id: i64,
        /// The field-level mapping error.
        #[source]
        source: MappingError,
    },

    /// The caller supplied a non-positive exam ID.
    #[error("invalid exam id {exam_id}: must be positive")]
    InvalidExamId {
        /// The rejected ID.
        exam_id: i64,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error, mapping reqwest's own
    /// timeout classification onto [`FetchError::Timeout`].
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    /// Creates a mapping error for a malformed 200 body.
    pub fn mapping(exam_id: i64, source: MappingError) -> Self {
        Self::Mapping { exam_id, source }
    }

    /// True if the error may succeed on retry.
    ///
    /// Timeouts, transport errors, and unexpected statuses are transient;
    /// mapping failures and invalid IDs are terminal.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::Status { .. } => true,
            Self::Mapping { .. } | Self::InvalidExamId { .. } => false,
        }
    }
}
