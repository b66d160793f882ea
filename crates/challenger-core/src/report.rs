//! Session outcomes and the result-reporting contract.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::CompletionRecord;

/// What caused a session to be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitTrigger {
    Manual,
    Timeout,
}

impl fmt::Display for SubmitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitTrigger::Manual => write!(f, "manual"),
            SubmitTrigger::Timeout => write!(f, "timeout"),
        }
    }
}

/// Emitted once when a session reaches `Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub assessment_id: String,
    /// Score in 0-100, as returned by the grader.
    pub score: u8,
    /// `score >= passing_score`.
    pub passed: bool,
    pub time_spent_secs: u64,
    pub attempt_number: u32,
    pub trigger: SubmitTrigger,
    #[serde(default)]
    pub breakdown: BTreeMap<String, u32>,
    pub completed_at: DateTime<Utc>,
}

impl SessionOutcome {
    /// The append-only history entry for this outcome.
    pub fn to_completion_record(&self) -> CompletionRecord {
        CompletionRecord {
            assessment_id: self.assessment_id.clone(),
            score: self.score,
            attempt_number: self.attempt_number,
            completed_at: self.completed_at,
        }
    }

    /// Save the outcome as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize outcome")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write outcome to {}", path.display()))?;
        Ok(())
    }

    /// Load an outcome from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read outcome from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse outcome JSON")
    }
}

/// Receives completed outcomes (the external result reporter).
pub trait ResultSink: Send + Sync {
    fn on_completed(&self, outcome: &SessionOutcome);
}

/// Discards every outcome.
pub struct NoopSink;

impl ResultSink for NoopSink {
    fn on_completed(&self, _: &SessionOutcome) {}
}
