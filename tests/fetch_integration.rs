//! Integration tests for the exam fetch client.
//!
//! These tests verify ExamClient against a mock HTTP server, including
//! retry behavior with exponential backoff and terminal error handling.

use std::time::Duration;

use exam_extractor::{ExamClient, FetchError, FetchOutcome, RetryPolicy};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

mod support;

/// Well-formed upstream body for the given exam ID.
fn exam_body(exam_id: i64) -> serde_json::Value {
    json!({
        "data": {
            "exam": {
                "exam_id": exam_id,
                "exam_name": "Final Exam",
                "level_name": "Grade 8",
                "subject_name": "Science",
                "question_count": 1
            },
            "formdo": [
                {
                    "question_id": 42,
                    "question_detail": "Which planet is closest to the sun?",
                    "choice": [
                        {"detail": "Mercury", "answer": "true"},
                        {"detail": "Venus", "answer": "false"}
                    ]
                }
            ]
        }
    })
}

/// Policy with negligible backoff so retry tests stay fast.
fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::from_millis(1))
}

#[tokio::test]
async fn test_fetch_maps_exam_over_http() {
    let Some(mock_server) = support::mock_server().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("exam_id", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(exam_body(500)))
        .mount(&mock_server)
        .await;

    let client = ExamClient::new(mock_server.uri(), fast_policy(1));
    let record = match client.fetch_exam(500).await.unwrap() {
        FetchOutcome::Exam(record) => record,
        other => panic!("expected a mapped exam, got {other:?}"),
    };
    assert_eq!(record.metadata.exam_id, 500);
    assert_eq!(record.metadata.subject_name, "Science");
    assert_eq!(record.questions.len(), 1);
    assert_eq!(record.questions[0].question_number, 1);
    assert_eq!(record.questions[0].choices[0].choice_number, 1);
    assert!(record.questions[0].choices[0].is_correct);
    assert!(!record.questions[0].choices[1].is_correct);
}

#[tokio::test]
async fn test_404_maps_to_not_found_without_retry() {
    let Some(mock_server) = support::mock_server().await else {
        return;
    };
    // 404 is a terminal outcome, so exactly one request is expected even
    // with retries available.
    Mock::given(method("GET"))
        .and(query_param("exam_id", "501"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ExamClient::new(mock_server.uri(), fast_policy(3));
    let outcome = client.fetch_exam(501).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::NotFound));
}

#[tokio::test]
async fn test_retry_succeeds_after_transient_failures() {
    let Some(mock_server) = support::mock_server().await else {
        return;
    };

    // First two requests return 500 (transient), third succeeds.
    Mock::given(method("GET"))
        .and(query_param("exam_id", "502"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("exam_id", "502"))
        .respond_with(ResponseTemplate::new(200).set_body_json(exam_body(502)))
        .mount(&mock_server)
        .await;

    let client = ExamClient::new(mock_server.uri(), fast_policy(3));
    let outcome = client.fetch_exam(502).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Exam(_)));
}

#[tokio::test]
async fn test_retries_exhausted_performs_exactly_max_attempts() {
    let Some(mock_server) = support::mock_server().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(query_param("exam_id", "503"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = ExamClient::new(mock_server.uri(), fast_policy(3));
    let err = client.fetch_exam(503).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_200_body_is_terminal() {
    let Some(mock_server) = support::mock_server().await else {
        return;
    };

    // A 200 with a body missing data.exam will not improve on retry, so
    // only one request is expected.
    Mock::given(method("GET"))
        .and(query_param("exam_id", "504"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ExamClient::new(mock_server.uri(), fast_policy(3));
    let err = client.fetch_exam(504).await.unwrap_err();
    assert!(matches!(err, FetchError::Mapping { exam_id: 504, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_backoff_delays_exhausted_retries() {
    let Some(mock_server) = support::mock_server().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(query_param("exam_id", "505"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    // Delays between 3 attempts: 40ms * 2^0 + 40ms * 2^1 = 120ms.
    let policy = RetryPolicy::new(3, Duration::from_millis(40));
    let client = ExamClient::new(mock_server.uri(), policy);

    let start = std::time::Instant::now();
    let _ = client.fetch_exam(505).await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(
        elapsed >= Duration::from_millis(100),
        "backoff should delay between attempts, elapsed: {elapsed:?}"
    );
}
