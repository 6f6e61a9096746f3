//! Canonical in-memory representation of one exam.
//!
//! An [`ExamRecord`] is built once from a single API response and never
//! mutated afterwards. Position fields (`question_number`, `choice_number`)
//! are reassigned during ingestion and are always contiguous from 1; they
//! are never taken from upstream ordering data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error raised when an API response body does not match the expected shape.
///
/// Mapping failures are terminal for the exam ID being fetched: a 200
/// response with a malformed body will not look better on retry.
#[derive(Debug, Error)]
#[error("missing or malformed field: {field}")]
pub struct MappingError {
    /// Dotted path of the field that was missing or had the wrong type.
    pub field: String,
}

impl MappingError {
    fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

/// Exam-level metadata. `exam_id` is the resume key and the sink primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamMetadata {
    pub exam_id: i64,
    pub exam_name: String,
    pub level_name: String,
    pub subject_name: String,
    pub question_count: i64,
}

/// One answer choice within a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// 1-based position assigned during ingestion.
    pub choice_number: i64,
    pub choice_text: String,
    /// Derived from the upstream sentinel: `answer == "true"`.
    pub is_correct: bool,
}

/// One question with its ordered choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// 1-based position assigned during ingestion (equals index + 1).
    pub question_number: i64,
    /// Upstream identifier; not assumed unique across exams.
    pub question_id: i64,
    pub question_text: String,
    pub choices: Vec<Choice>,
}

/// A complete exam: metadata plus the ordered question/choice tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamRecord {
    pub metadata: ExamMetadata,
    pub questions: Vec<Question>,
}

impl ExamRecord {
    /// Maps a raw upstream API response body into an `ExamRecord`.
    ///
    /// Expected shape: `data.exam.{exam_id, exam_name, level_name,
    /// subject_name, question_count}` plus `data.formdo[]` entries with
    /// `question_id`, `question_detail`, and `choice[]` entries carrying
    /// `detail` and `answer`. Numeric identifiers may arrive as JSON
    /// numbers or numeric strings; both are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError`] naming the first missing or malformed field.
    pub fn from_api_response(body: &Value) -> Result<Self, MappingError> {
        let exam = body
            .pointer("/data/exam")
            .ok_or_else(|| MappingError::new("data.exam"))?;

        let metadata = ExamMetadata {
            exam_id: field_i64(exam, "exam_id", "data.exam.exam_id")?,
            exam_name: field_str(exam, "exam_name", "data.exam.exam_name")?,
            level_name: field_str(exam, "level_name", "data.exam.level_name")?,
            subject_name: field_str(exam, "subject_name", "data.exam.subject_name")?,
            question_count: field_i64(exam, "question_count", "data.exam.question_count")?,
        };

        let formdo = body
            .pointer("/data/formdo")
            .and_then(Value::as_array)
            .ok_or_else(|| MappingError::new("data.formdo"))?;

        let mut questions = Vec::with_capacity(formdo.len());
        for (i, entry) in formdo.iter().enumerate() {
            let choices_raw = entry
                .get("choice")
                .and_then(Value::as_array)
                .ok_or_else(|| MappingError::new(format!("data.formdo[{i}].choice")))?;

            let mut choices = Vec::with_capacity(choices_raw.len());
            for (j, choice) in choices_raw.iter().enumerate() {
                choices.push(Choice {
                    choice_number: (j + 1) as i64,
                    choice_text: field_str(
                        choice,
                        "detail",
                        format!("data.formdo[{i}].choice[{j}].detail"),
                    )?,
                    is_correct: choice.get("answer").and_then(Value::as_str) == Some("true"),
                });
            }

            questions.push(Question {
                question_number: (i + 1) as i64,
                question_id: field_i64(
                    entry,
                    "question_id",
                    format!("data.formdo[{i}].question_id"),
                )?,
                question_text: field_str(
                    entry,
                    "question_detail",
                    format!("data.formdo[{i}].question_detail"),
                )?,
                choices,
            });
        }

        Ok(Self {
            metadata,
            questions,
        })
    }
}

/// Reads an integer field that may be a JSON number or a numeric string.
fn field_i64(value: &Value, key: &str, path: impl Into<String>) -> Result<i64, MappingError> {
    value
        .get(key)
        .and_then(as_i64_lenient)
        .ok_or_else(|| MappingError::new(path))
}

/// Reads a required string field.
fn field_str(value: &Value, key: &str, path: impl Into<String>) -> Result<String, MappingError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| MappingError::new(path))
}

fn as_i64_lenient(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_response() -> Value {
        json!({
            "data": {
                "exam": {
                    "exam_id": "4321",
                    "exam_name": "Midterm",
                    "level_name": "Grade 9",
                    "subject_name": "Math",
                    "question_count": 2
                },
                "formdo": [
                    {
                        "question_id": 900,
                        "question_detail": "What is 2+2?",
                        "choice": [
                            {"detail": "3", "answer": "false"},
                            {"detail": "4", "answer": "true"}
                        ]
                    },
                    {
                        "question_id": "901",
                        "question_detail": "What is 3*3?",
                        "choice": [
                            {"detail": "9", "answer": "true"},
                            {"detail": "6", "answer": "false"}
                        ]
                    }
                ]
            }
        })
    }

    #[test]
    fn test_from_api_response_maps_metadata() {
        let record = ExamRecord::from_api_response(&sample_response()).unwrap();
        assert_eq!(record.metadata.exam_id, 4321);
        assert_eq!(record.metadata.exam_name, "Midterm");
        assert_eq!(record.metadata.level_name, "Grade 9");
        assert_eq!(record.metadata.subject_name, "Math");
        assert_eq!(record.metadata.question_count, 2);
    }

    #[test]
    fn test_from_api_response_assigns_contiguous_positions() {
        let record = ExamRecord::from_api_response(&sample_response()).unwrap();
        for (i, question) in record.questions.iter().enumerate() {
            assert_eq!(question.question_number, (i + 1) as i64);
            for (j, choice) in question.choices.iter().enumerate() {
                assert_eq!(choice.choice_number, (j + 1) as i64);
            }
        }
    }

    #[test]
    fn test_from_api_response_accepts_numeric_strings() {
        let record = ExamRecord::from_api_response(&sample_response()).unwrap();
        // exam_id and the second question_id arrive as strings in the sample
        assert_eq!(record.metadata.exam_id, 4321);
        assert_eq!(record.questions[1].question_id, 901);
    }

    #[test]
    fn test_from_api_response_correctness_sentinel() {
        let record = ExamRecord::from_api_response(&sample_response()).unwrap();
        assert!(!record.questions[0].choices[0].is_correct);
        assert!(record.questions[0].choices[1].is_correct);
    }

    #[test]
    fn test_from_api_response_missing_exam_block() {
        let err = ExamRecord::from_api_response(&json!({"data": {}})).unwrap_err();
        assert!(err.to_string().contains("data.exam"));
    }

    #[test]
    fn test_from_api_response_missing_question_field() {
        let mut body = sample_response();
        body.pointer_mut("/data/formdo/0")
            .unwrap()
            .as_object_mut()
            .unwrap()
            .remove("question_detail");
        let err = ExamRecord::from_api_response(&body).unwrap_err();
        assert!(err.to_string().contains("question_detail"));
    }

    #[test]
    fn test_from_api_response_non_object_body() {
        let err = ExamRecord::from_api_response(&json!([1, 2, 3])).unwrap_err();
        assert!(err.to_string().contains("data.exam"));
    }

    #[test]
    fn test_from_api_response_answer_sentinel_must_be_exact() {
        let mut body = sample_response();
        *body
            .pointer_mut("/data/formdo/0/choice/1/answer")
            .unwrap() = json!("True");
        let record = ExamRecord::from_api_response(&body).unwrap();
        assert!(!record.questions[0].choices[1].is_correct);
    }
}
