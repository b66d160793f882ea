//! In-process grader and result sink for tests and offline practice.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use challenger_core::report::{ResultSink, SessionOutcome};
use challenger_core::traits::{GradeRequest, GradeResponse, Grader};

/// A grader that returns scripted scores without any network calls.
///
/// Scores are looked up by assessment id, falling back to a default. Failures
/// can be queued to exercise the retry path, and a delay can be set to keep a
/// grading call in flight while a test races it against the deadline.
pub struct MockGrader {
    /// Map of assessment id → score.
    scores: HashMap<String, u8>,
    default_score: u8,
    delay: Option<Duration>,
    /// Errors returned by the next calls, in order.
    failures: Mutex<VecDeque<String>>,
    call_count: AtomicU32,
    last_request: Mutex<Option<GradeRequest>>,
}

impl MockGrader {
    /// Create a mock with per-assessment scores.
    pub fn new(scores: HashMap<String, u8>) -> Self {
        Self {
            scores,
            default_score: 0,
            delay: None,
            failures: Mutex::new(VecDeque::new()),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that grades everything with the same score.
    pub fn with_fixed_score(score: u8) -> Self {
        Self {
            default_score: score,
            ..Self::new(HashMap::new())
        }
    }

    /// Sleep this long inside every `grade` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next call with `message`. Queued failures are consumed in order.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(message.into());
    }

    /// Number of `grade` calls made, failed ones included.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<GradeRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Grader for MockGrader {
    async fn grade(&self, request: &GradeRequest) -> anyhow::Result<GradeResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(message) = failure {
            anyhow::bail!(message);
        }

        let score = self
            .scores
            .get(&request.assessment_id)
            .copied()
            .unwrap_or(self.default_score);
        let answered = request.answers.iter().filter(|a| a.is_answered()).count();

        Ok(GradeResponse {
            score,
            breakdown: [("answered".to_string(), answered as u32)].into(),
        })
    }
}

/// A [`ResultSink`] that keeps every outcome it receives.
#[derive(Default)]
pub struct RecordingSink {
    outcomes: Mutex<Vec<SessionOutcome>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<SessionOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultSink for RecordingSink {
    fn on_completed(&self, outcome: &SessionOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use challenger_core::model::Answer;
    use uuid::Uuid;

    fn request(id: &str) -> GradeRequest {
        GradeRequest {
            session_id: Uuid::new_v4(),
            assessment_id: id.into(),
            answers: vec![Answer::Answered("a".into()), Answer::Unanswered],
            time_spent_secs: 30,
        }
    }

    #[tokio::test]
    async fn fixed_score() {
        let grader = MockGrader::with_fixed_score(77);
        let response = grader.grade(&request("anything")).await.unwrap();
        assert_eq!(response.score, 77);
        assert_eq!(response.breakdown["answered"], 1);
        assert_eq!(grader.call_count(), 1);
        assert_eq!(grader.last_request().unwrap().assessment_id, "anything");
    }

    #[tokio::test]
    async fn per_assessment_scores() {
        let grader = MockGrader::new(HashMap::from([("sql".to_string(), 95)]));
        assert_eq!(grader.grade(&request("sql")).await.unwrap().score, 95);
        assert_eq!(grader.grade(&request("go")).await.unwrap().score, 0);
    }

    #[tokio::test]
    async fn queued_failures_are_consumed_in_order() {
        let grader = MockGrader::with_fixed_score(50);
        grader.fail_next("network down");
        grader.fail_next("still down");

        let first = grader.grade(&request("a")).await.unwrap_err();
        assert_eq!(first.to_string(), "network down");
        let second = grader.grade(&request("a")).await.unwrap_err();
        assert_eq!(second.to_string(), "still down");
        assert!(grader.grade(&request("a")).await.is_ok());
        assert_eq!(grader.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_applied() {
        let grader = MockGrader::with_fixed_score(10).with_delay(Duration::from_secs(5));
        let start = tokio::time::Instant::now();
        grader.grade(&request("a")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn recording_sink_keeps_outcomes() {
        use challenger_core::report::SubmitTrigger;

        let sink = RecordingSink::new();
        assert!(sink.is_empty());
        sink.on_completed(&SessionOutcome {
            session_id: Uuid::nil(),
            assessment_id: "a".into(),
            score: 80,
            passed: true,
            time_spent_secs: 12,
            attempt_number: 1,
            trigger: SubmitTrigger::Manual,
            breakdown: Default::default(),
            completed_at: chrono::Utc::now(),
        });
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.outcomes()[0].score, 80);
    }
}
