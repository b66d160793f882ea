//! End-to-end session tests: the session manager driving real collaborators.
//!
//! Grading goes through either the REST backend (served by wiremock) or the
//! in-process mock grader.

use std::sync::Arc;
use std::time::Duration;

use challenger_backend::{BackendConfig, HttpBackend, MockGrader, RecordingSink};
use challenger_core::error::SessionError;
use challenger_core::model::{AssessmentDefinition, DifficultyTier};
use challenger_core::report::SubmitTrigger;
use challenger_core::session::{SessionManager, SessionManagerConfig, SessionStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn assessment(id: &str, time_limit_secs: Option<u64>) -> AssessmentDefinition {
    AssessmentDefinition {
        id: id.into(),
        title: id.into(),
        category: "backend".into(),
        skills: ["Rust".to_string()].into(),
        difficulty: DifficultyTier::Intermediate,
        time_limit_secs,
        passing_score: 70,
        popularity: 10,
        created_at: "2026-09-01T00:00:00Z".parse().unwrap(),
        question_count: 3,
    }
}

fn http_grader(server: &MockServer) -> Arc<HttpBackend> {
    Arc::new(
        HttpBackend::new(&BackendConfig {
            base_url: server.uri(),
            api_token: Some("t".into()),
            timeout_secs: 5,
        })
        .unwrap(),
    )
}

#[tokio::test]
async fn manual_submit_through_rest_grader() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/grade"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "score": 84,
            "breakdown": {"q1": 40, "q2": 44}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::new());
    let manager = SessionManager::new(
        http_grader(&server),
        sink.clone(),
        SessionManagerConfig::default(),
    );

    manager.start(&assessment("rust-101", None)).unwrap();
    manager.answer(0, "b").unwrap();
    manager.answer(2, "d").unwrap();

    let outcome = manager.submit(SubmitTrigger::Manual).await.unwrap();
    assert_eq!(outcome.score, 84);
    assert!(outcome.passed);
    assert_eq!(outcome.trigger, SubmitTrigger::Manual);
    assert_eq!(outcome.breakdown["q2"], 44);
    assert_eq!(sink.len(), 1);
    assert!(manager.current().is_none());
}

#[tokio::test]
async fn rest_failure_then_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/grade"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/grade"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"score": 55})),
        )
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::new());
    let manager = SessionManager::new(
        http_grader(&server),
        sink.clone(),
        SessionManagerConfig::default(),
    );
    manager.start(&assessment("sql-1", None)).unwrap();

    let err = manager.submit(SubmitTrigger::Manual).await.unwrap_err();
    assert!(matches!(err, SessionError::SubmissionFailed { .. }));
    assert!(err.is_retryable());
    assert!(err.to_string().starts_with("couldn't submit, try again"));
    assert_eq!(
        manager.current().map(|s| s.status),
        Some(SessionStatus::Submitting)
    );
    assert!(sink.is_empty());

    let outcome = manager.submit(SubmitTrigger::Manual).await.unwrap();
    assert_eq!(outcome.score, 55);
    assert!(!outcome.passed);
    assert_eq!(sink.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_session_auto_submits_with_mock_grader() {
    let grader = Arc::new(MockGrader::with_fixed_score(90));
    let sink = Arc::new(RecordingSink::new());
    let manager = SessionManager::new(
        grader.clone(),
        sink.clone(),
        SessionManagerConfig::default(),
    );

    manager.start(&assessment("timed", Some(60))).unwrap();
    manager.answer(1, "c").unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(grader.call_count(), 1);
    let outcomes = sink.outcomes();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].trigger, SubmitTrigger::Timeout);
    assert_eq!(outcomes[0].time_spent_secs, 60);
    assert_eq!(grader.last_request().unwrap().answers.len(), 3);
    assert!(manager.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn manual_submit_beats_deadline() {
    let grader = Arc::new(MockGrader::with_fixed_score(70));
    let sink = Arc::new(RecordingSink::new());
    let manager = SessionManager::new(
        grader.clone(),
        sink.clone(),
        SessionManagerConfig::default(),
    );

    manager.start(&assessment("timed", Some(30))).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    let outcome = manager.submit(SubmitTrigger::Manual).await.unwrap();
    assert_eq!(outcome.time_spent_secs, 10);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(grader.call_count(), 1);
    assert_eq!(sink.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_start_conflicts_until_completion() {
    let grader = Arc::new(MockGrader::with_fixed_score(100));
    let manager = SessionManager::new(
        grader,
        Arc::new(RecordingSink::new()),
        SessionManagerConfig::default(),
    );

    let first = manager.start(&assessment("a", Some(120))).unwrap();
    let err = manager.start(&assessment("b", None)).unwrap_err();
    match err {
        SessionError::Conflict { active, status } => {
            assert_eq!(active, first.session_id);
            assert_eq!(status, SessionStatus::Active);
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    manager.submit(SubmitTrigger::Manual).await.unwrap();
    let second = manager.start(&assessment("a", None)).unwrap();
    assert_eq!(second.attempt_number, 2);
}
