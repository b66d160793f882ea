//! Session error types.
//!
//! Every variant is recoverable by the caller. A failed operation leaves the
//! session untouched, except `SubmissionFailed`, which leaves the session in
//! `Submitting` so the caller can retry the submit.

use thiserror::Error;
use uuid::Uuid;

use crate::session::SessionStatus;

/// Errors returned by [`SessionManager`](crate::session::SessionManager).
#[derive(Debug, Error)]
pub enum SessionError {
    /// Another session already occupies the slot.
    #[error("finish your current session first (session {active} is still {status})")]
    Conflict { active: Uuid, status: SessionStatus },

    /// The operation is not legal for the current status.
    #[error("cannot {operation} while session is {}", status_label(.status))]
    InvalidState {
        operation: &'static str,
        status: Option<SessionStatus>,
    },

    /// The answer index is outside `[0, len)`.
    #[error("question index {index} out of range (assessment has {len} questions)")]
    OutOfRange { index: usize, len: usize },

    /// The assessment's time limit (plus grace period) cannot be scheduled.
    #[error("time limit of {secs}s for assessment {assessment_id} is out of range")]
    TimeLimitOutOfRange { assessment_id: String, secs: u64 },

    /// The grading collaborator failed; the session stays in `Submitting`.
    #[error("couldn't submit, try again: {message}")]
    SubmissionFailed { session_id: Uuid, message: String },
}

impl SessionError {
    /// Returns `true` if repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::SubmissionFailed { .. })
    }
}

fn status_label(status: &Option<SessionStatus>) -> String {
    status.map_or_else(|| "absent".to_string(), |s| s.to_string())
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        let conflict = SessionError::Conflict {
            active: Uuid::nil(),
            status: SessionStatus::Active,
        };
        assert!(conflict.to_string().starts_with("finish your current session first"));

        let failed = SessionError::SubmissionFailed {
            session_id: Uuid::nil(),
            message: "network down".into(),
        };
        assert!(failed.to_string().contains("couldn't submit, try again"));
        assert!(failed.is_retryable());
        assert!(!conflict.is_retryable());
    }

    #[test]
    fn time_limit_out_of_range_is_not_retryable() {
        let err = SessionError::TimeLimitOutOfRange {
            assessment_id: "marathon".into(),
            secs: u64::MAX,
        };
        assert!(err.to_string().contains("out of range"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn invalid_state_without_session() {
        let err = SessionError::InvalidState {
            operation: "answer",
            status: None,
        };
        assert_eq!(err.to_string(), "cannot answer while session is absent");
    }
}
