//! Single-slot assessment session manager.
//!
//! A [`SessionManager`] owns at most one live attempt. Timed attempts arm a
//! deadline task that submits automatically when the time limit runs out.
//! That task is a second writer to the session status, so every transition
//! goes through the slot mutex and checks the current status first: manual
//! submit, timeout submit, and cancel are mutually exclusive and whichever
//! arrives first wins.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::history;
use crate::model::{Answer, AssessmentDefinition, CompletionRecord, MAX_TIME_LIMIT_SECS};
use crate::report::{ResultSink, SessionOutcome, SubmitTrigger};
use crate::traits::{GradeRequest, Grader};

/// Lifecycle status of a session.
///
/// `Active -> Submitting -> Completed` or `Active -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Submitting,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// Whether the session still occupies the slot.
    pub fn is_live(self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Submitting)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Submitting => write!(f, "submitting"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A snapshot of one attempt at an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub assessment_id: String,
    pub status: SessionStatus,
    /// One slot per question.
    pub answers: Vec<Answer>,
    pub started_at: DateTime<Utc>,
    /// Nominal end of the time limit, if the assessment is timed.
    pub deadline_at: Option<DateTime<Utc>>,
    /// One past the most recently answered index.
    pub current_question_index: usize,
    pub attempt_number: u32,
}

impl Session {
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_answered()).count()
    }
}

/// Tunables for the session manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionManagerConfig {
    /// Extra seconds past the deadline before the automatic submit fires.
    #[serde(default)]
    pub deadline_grace_secs: u64,
}

struct LiveSession {
    session: Session,
    passing_score: u8,
    started: Instant,
    deadline: Option<Instant>,
    /// Fixed by the first submit so retries report the same duration.
    time_spent_secs: Option<u64>,
    grading_in_flight: bool,
    timer: Option<JoinHandle<()>>,
}

impl LiveSession {
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Clone, Copy)]
struct Deadlines {
    deadline: Instant,
    deadline_at: DateTime<Utc>,
    /// `deadline` plus the configured grace period.
    fire_at: Instant,
}

/// Deadlines for a time limit, or `None` if they cannot be represented.
fn compute_deadlines(
    started: Instant,
    started_at: DateTime<Utc>,
    secs: u64,
    grace_secs: u64,
) -> Option<Deadlines> {
    if secs > MAX_TIME_LIMIT_SECS {
        return None;
    }
    let deadline = started.checked_add(Duration::from_secs(secs))?;
    let limit = chrono::TimeDelta::try_seconds(i64::try_from(secs).ok()?)?;
    let deadline_at = started_at.checked_add_signed(limit)?;
    let fire_at = deadline.checked_add(Duration::from_secs(grace_secs))?;
    Some(Deadlines {
        deadline,
        deadline_at,
        fire_at,
    })
}

#[derive(Default)]
struct SlotState {
    live: Option<LiveSession>,
    /// Highest attempt number seen per assessment.
    attempts: HashMap<String, u32>,
}

struct Inner {
    grader: Arc<dyn Grader>,
    sink: Arc<dyn ResultSink>,
    config: SessionManagerConfig,
    state: Mutex<SlotState>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(live) = state.live.as_mut() {
            live.disarm();
        }
    }
}

/// Owns the single live session for one user-facing flow.
///
/// Cloning yields another handle to the same slot. Timed sessions spawn a
/// Tokio task, so [`start`](Self::start) must run inside a Tokio runtime.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        grader: Arc<dyn Grader>,
        sink: Arc<dyn ResultSink>,
        config: SessionManagerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                grader,
                sink,
                config,
                state: Mutex::new(SlotState::default()),
            }),
        }
    }

    /// Seed attempt numbering from existing completion records.
    pub fn with_history(self, history: &[CompletionRecord]) -> Self {
        {
            let mut state = self.state();
            for (id, count) in history::attempt_counts(history) {
                let entry = state.attempts.entry(id).or_default();
                *entry = (*entry).max(count);
            }
        }
        self
    }

    fn state(&self) -> MutexGuard<'_, SlotState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the live session, if any.
    pub fn current(&self) -> Option<Session> {
        self.state().live.as_ref().map(|l| l.session.clone())
    }

    /// Begin an attempt at `assessment`.
    ///
    /// Fails with `Conflict` while another session is active or submitting.
    pub fn start(&self, assessment: &AssessmentDefinition) -> Result<Session> {
        let mut state = self.state();

        if let Some(live) = state.live.as_ref().filter(|l| l.session.status.is_live()) {
            return Err(SessionError::Conflict {
                active: live.session.session_id,
                status: live.session.status,
            });
        }

        let attempt_number = state
            .attempts
            .get(&assessment.id)
            .copied()
            .unwrap_or(0)
            .saturating_add(1);
        let session_id = Uuid::new_v4();
        let started = Instant::now();
        let started_at = Utc::now();

        let deadlines = match assessment.time_limit_secs {
            None => None,
            Some(secs) => Some(
                compute_deadlines(
                    started,
                    started_at,
                    secs,
                    self.inner.config.deadline_grace_secs,
                )
                .ok_or_else(|| SessionError::TimeLimitOutOfRange {
                    assessment_id: assessment.id.clone(),
                    secs,
                })?,
            ),
        };
        let deadline = deadlines.map(|d| d.deadline);
        let deadline_at = deadlines.map(|d| d.deadline_at);
        let timer = deadlines.map(|d| self.arm_deadline(session_id, d.fire_at));

        let session = Session {
            session_id,
            assessment_id: assessment.id.clone(),
            status: SessionStatus::Active,
            answers: vec![Answer::Unanswered; assessment.question_count],
            started_at,
            deadline_at,
            current_question_index: 0,
            attempt_number,
        };

        state.live = Some(LiveSession {
            session: session.clone(),
            passing_score: assessment.passing_score,
            started,
            deadline,
            time_spent_secs: None,
            grading_in_flight: false,
            timer,
        });

        info!(
            session_id = %session_id,
            assessment_id = %assessment.id,
            attempt = attempt_number,
            time_limit_secs = ?assessment.time_limit_secs,
            "session started"
        );
        Ok(session)
    }

    fn arm_deadline(&self, session_id: Uuid, fire_at: Instant) -> JoinHandle<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep_until(fire_at).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            SessionManager { inner }.fire_deadline(session_id).await;
        })
    }

    /// Deadline callback. A no-op unless `session_id` is still active.
    async fn fire_deadline(&self, session_id: Uuid) {
        match self.submit_gated(SubmitTrigger::Timeout, Some(session_id)).await {
            Ok(outcome) => {
                debug!(session_id = %session_id, score = outcome.score, "deadline submit completed");
            }
            Err(SessionError::InvalidState { status, .. }) => {
                debug!(session_id = %session_id, ?status, "stale deadline ignored");
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "automatic submission failed");
            }
        }
    }

    /// Record an answer for question `index`. Last write wins.
    pub fn answer(&self, index: usize, value: impl Into<String>) -> Result<()> {
        let mut state = self.state();
        let live = match state.live.as_mut() {
            Some(live) if live.session.status == SessionStatus::Active => live,
            other => {
                return Err(SessionError::InvalidState {
                    operation: "answer",
                    status: other.map(|l| l.session.status),
                })
            }
        };

        let len = live.session.answers.len();
        if index >= len {
            return Err(SessionError::OutOfRange { index, len });
        }

        live.session.answers[index] = Answer::Answered(value.into());
        live.session.current_question_index = index + 1;
        Ok(())
    }

    /// Submit the live session for grading.
    ///
    /// Legal from `Active`. A manual submit is also accepted from a
    /// `Submitting` session whose previous grading attempt failed; that is
    /// the retry path after `SubmissionFailed`.
    pub async fn submit(&self, trigger: SubmitTrigger) -> Result<SessionOutcome> {
        self.submit_gated(trigger, None).await
    }

    async fn submit_gated(
        &self,
        trigger: SubmitTrigger,
        expected: Option<Uuid>,
    ) -> Result<SessionOutcome> {
        let request = {
            let mut state = self.state();
            let live = match state.live.as_mut() {
                Some(live) if expected.map_or(true, |id| id == live.session.session_id) => live,
                other => {
                    return Err(SessionError::InvalidState {
                        operation: "submit",
                        status: other.map(|l| l.session.status),
                    })
                }
            };

            let retry = live.session.status == SessionStatus::Submitting
                && !live.grading_in_flight
                && trigger == SubmitTrigger::Manual;
            if live.session.status != SessionStatus::Active && !retry {
                return Err(SessionError::InvalidState {
                    operation: "submit",
                    status: Some(live.session.status),
                });
            }

            live.session.status = SessionStatus::Submitting;
            live.grading_in_flight = true;
            let started = live.started;
            let time_spent_secs = *live
                .time_spent_secs
                .get_or_insert_with(|| started.elapsed().as_secs());

            // The deadline task must not abort itself mid-submit.
            match trigger {
                SubmitTrigger::Manual => live.disarm(),
                SubmitTrigger::Timeout => drop(live.timer.take()),
            }

            GradeRequest {
                session_id: live.session.session_id,
                assessment_id: live.session.assessment_id.clone(),
                answers: live.session.answers.clone(),
                time_spent_secs,
            }
        };

        info!(
            session_id = %request.session_id,
            %trigger,
            time_spent_secs = request.time_spent_secs,
            "submitting session"
        );

        let graded = self.inner.grader.grade(&request).await;

        let outcome = {
            let mut state = self.state();

            let response = match graded {
                Ok(response) => response,
                Err(e) => {
                    if let Some(live) = state.live.as_mut() {
                        live.grading_in_flight = false;
                    }
                    let message = format!("{e:#}");
                    warn!(session_id = %request.session_id, error = %message, "grading failed");
                    return Err(SessionError::SubmissionFailed {
                        session_id: request.session_id,
                        message,
                    });
                }
            };

            let Some(mut live) = state.live.take() else {
                return Err(SessionError::InvalidState {
                    operation: "submit",
                    status: None,
                });
            };
            live.session.status = SessionStatus::Completed;

            let attempts = state
                .attempts
                .entry(live.session.assessment_id.clone())
                .or_default();
            *attempts = (*attempts).max(live.session.attempt_number);

            let score = response.score.min(100);
            SessionOutcome {
                session_id: live.session.session_id,
                assessment_id: live.session.assessment_id,
                score,
                passed: score >= live.passing_score,
                time_spent_secs: request.time_spent_secs,
                attempt_number: live.session.attempt_number,
                trigger,
                breakdown: response.breakdown,
                completed_at: Utc::now(),
            }
        };

        info!(
            session_id = %outcome.session_id,
            score = outcome.score,
            passed = outcome.passed,
            %trigger,
            "session completed"
        );
        self.inner.sink.on_completed(&outcome);
        Ok(outcome)
    }

    /// Discard the live session without grading. Legal only from `Active`.
    ///
    /// The deadline task is aborted before this returns.
    pub fn cancel(&self) -> Result<Session> {
        let mut state = self.state();
        match state.live.as_ref().map(|l| l.session.status) {
            Some(SessionStatus::Active) => {}
            status => {
                return Err(SessionError::InvalidState {
                    operation: "cancel",
                    status,
                })
            }
        }

        let Some(mut live) = state.live.take() else {
            return Err(SessionError::InvalidState {
                operation: "cancel",
                status: None,
            });
        };
        live.disarm();
        live.session.status = SessionStatus::Cancelled;

        info!(session_id = %live.session.session_id, "session cancelled");
        Ok(live.session)
    }

    /// Seconds left before the deadline, rounded up. `None` if untimed or idle.
    pub fn remaining_time(&self) -> Option<u64> {
        let state = self.state();
        let deadline = state.live.as_ref()?.deadline?;
        let left = deadline.saturating_duration_since(Instant::now());
        Some(left.as_secs() + u64::from(left.subsec_nanos() > 0))
    }
}
