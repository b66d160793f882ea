//! Collaborator traits for the catalog, user history, and grading services.
//!
//! The core never talks to storage or the network directly. These async
//! traits are implemented by `challenger-backend` (REST and mock) and by the
//! file-backed sources in [`crate::catalog`] and [`crate::history`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Answer, AssessmentDefinition, CompletionRecord};

// ---------------------------------------------------------------------------
// Read-only data sources
// ---------------------------------------------------------------------------

/// Supplies the assessment catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch every assessment definition currently on offer.
    async fn fetch_catalog(&self) -> anyhow::Result<Vec<AssessmentDefinition>>;
}

/// Supplies per-user history.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch every completion record for a user, oldest first.
    async fn fetch_completion_history(&self, user_id: &str)
        -> anyhow::Result<Vec<CompletionRecord>>;

    /// Fetch the ids of assessments the user has favorited.
    async fn fetch_favorites(&self, user_id: &str) -> anyhow::Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Grading
// ---------------------------------------------------------------------------

/// Grades a submitted session. May fail (e.g. network errors).
#[async_trait]
pub trait Grader: Send + Sync {
    async fn grade(&self, request: &GradeRequest) -> anyhow::Result<GradeResponse>;
}

/// Everything the grader needs to score one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRequest {
    pub session_id: Uuid,
    pub assessment_id: String,
    /// One entry per question, holes marked `Unanswered`.
    pub answers: Vec<Answer>,
    /// Wall-clock seconds between start and submit.
    pub time_spent_secs: u64,
}

/// The grader's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResponse {
    /// Score in 0-100.
    pub score: u8,
    /// Per-section or per-question points.
    #[serde(default)]
    pub breakdown: BTreeMap<String, u32>,
}
