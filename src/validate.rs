//! Structural validation of fetched exam records.
//!
//! Validation runs against the raw JSON shape rather than the typed model
//! so that incomplete or hand-assembled records can be rejected with a full
//! list of problems instead of a single deserialization error.
//!
//! Only the first question is sampled for per-question and per-choice key
//! checks. This is a deliberate cost/thoroughness trade-off: a response
//! whose first question is well-formed almost always came from the same
//! code path as the rest.

use serde_json::Value;

/// Required keys inside `metadata`.
const REQUIRED_METADATA_KEYS: [&str; 4] = ["exam_id", "exam_name", "level_name", "subject_name"];

/// Required keys on each question entry.
const REQUIRED_QUESTION_KEYS: [&str; 4] =
    ["question_number", "question_id", "question_text", "choices"];

/// Outcome of validating one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// True iff no errors were accumulated.
    pub ok: bool,
    /// All applicable errors, in check order.
    pub errors: Vec<String>,
}

/// Validates the structure of a fetched exam record.
///
/// Non-object input is rejected with exactly one error and no further
/// checks. Otherwise all applicable errors are accumulated. The input is
/// never mutated.
#[must_use]
pub fn validate_exam(raw: &Value) -> ValidationReport {
    let mut errors = Vec::new();

    let Some(record) = raw.as_object() else {
        return ValidationReport {
            ok: false,
            errors: vec!["record is not an object".to_string()],
        };
    };

    if !record.contains_key("metadata") {
        errors.push("missing 'metadata' key".to_string());
    }
    if !record.contains_key("questions") {
        errors.push("missing 'questions' key".to_string());
    }

    if let Some(metadata) = record.get("metadata") {
        for key in REQUIRED_METADATA_KEYS {
            if metadata.get(key).is_none() {
                errors.push(format!("missing metadata key: {key}"));
            }
        }
    }

    if let Some(questions) = record.get("questions") {
        match questions.as_array() {
            None => errors.push("questions is not an array".to_string()),
            Some(items) if items.is_empty() => {
                errors.push("questions array is empty".to_string());
            }
            Some(items) => {
                // Sample the first question only.
                let question = &items[0];
                for key in REQUIRED_QUESTION_KEYS {
                    if question.get(key).is_none() {
                        errors.push(format!("missing question key: {key}"));
                    }
                }
                if let Some(choices) = question.get("choices") {
                    let non_empty_array =
                        choices.as_array().is_some_and(|c| !c.is_empty());
                    if !non_empty_array {
                        errors.push("choices is empty or not an array".to_string());
                    }
                }
            }
        }
    }

    ValidationReport {
        ok: errors.is_empty(),
        errors,
    }
}
