//! Content-hash duplicate detection.
//!
//! Records are canonicalized to a deterministic byte form and digested
//! with SHA-256. The seen-set lives for one engine run and is reset with
//! it; duplicates are a monitoring signal, not an export filter.

use dashmap::DashSet;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::model::ExamRecord;

/// A 256-bit content digest.
pub type ContentDigest = [u8; 32];

/// Computes the SHA-256 digest of a record's canonical form.
///
/// The canonical form is the record serialized through `serde_json::Value`,
/// whose object maps are key-sorted, so the digest is independent of field
/// insertion order.
#[must_use]
pub fn canonical_digest(record: &ExamRecord) -> ContentDigest {
    // A plain struct tree cannot fail to serialize.
    let canonical = serde_json::to_value(record)
        .unwrap_or(Value::Null)
        .to_string();
    Sha256::digest(canonical.as_bytes()).into()
}

/// Tracks content digests seen during one extraction run.
#[derive(Debug, Default)]
pub struct DuplicateDetector {
    seen: DashSet<ContentDigest>,
}

impl DuplicateDetector {
    /// Creates a detector with an empty seen-set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if an identical record was seen before.
    ///
    /// First occurrences are remembered and return false. Safe to call
    /// from concurrently running pipelines.
    pub fn check(&self, record: &ExamRecord) -> bool {
        let digest = canonical_digest(record);
        !self.seen.insert(digest)
    }

    /// Number of distinct digests observed so far.
    #[must_use]
    pub fn distinct_count(&self) -> usize {
        self.seen.len()
    }
}
