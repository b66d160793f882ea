//! Core data model types for challenger.
//!
//! Assessment definitions come from an external catalog and are read-only
//! here. Completion records form an append-only per-user history.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest time limit a session will schedule: one week.
pub const MAX_TIME_LIMIT_SECS: u64 = 7 * 24 * 60 * 60;

/// A single assessment ("challenge") a user can attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentDefinition {
    /// Unique identifier within the catalog.
    pub id: String,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Category used for affinity and interest matching.
    pub category: String,
    /// Skills exercised by this assessment.
    #[serde(default)]
    pub skills: BTreeSet<String>,
    /// Difficulty tier of the assessment.
    pub difficulty: DifficultyTier,
    /// Time limit in seconds. `None` means untimed.
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
    /// Minimum score (0-100) required to pass.
    pub passing_score: u8,
    /// Popularity signal (attempt count or similar).
    #[serde(default)]
    pub popularity: u64,
    /// When the assessment was published.
    pub created_at: DateTime<Utc>,
    /// Number of questions or problems.
    pub question_count: usize,
}

impl AssessmentDefinition {
    /// Whether `score` meets this assessment's passing score.
    pub fn is_passing(&self, score: u8) -> bool {
        score >= self.passing_score
    }
}

/// Coarse difficulty bucket, shared by assessments and user proficiency.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl DifficultyTier {
    /// All tiers in ascending order.
    pub const ALL: [DifficultyTier; 4] = [
        DifficultyTier::Beginner,
        DifficultyTier::Intermediate,
        DifficultyTier::Advanced,
        DifficultyTier::Expert,
    ];

    /// Position of the tier in ascending order (Beginner = 0).
    pub fn rank(self) -> usize {
        match self {
            DifficultyTier::Beginner => 0,
            DifficultyTier::Intermediate => 1,
            DifficultyTier::Advanced => 2,
            DifficultyTier::Expert => 3,
        }
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultyTier::Beginner => write!(f, "beginner"),
            DifficultyTier::Intermediate => write!(f, "intermediate"),
            DifficultyTier::Advanced => write!(f, "advanced"),
            DifficultyTier::Expert => write!(f, "expert"),
        }
    }
}

impl FromStr for DifficultyTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" | "easy" => Ok(DifficultyTier::Beginner),
            "intermediate" | "medium" => Ok(DifficultyTier::Intermediate),
            "advanced" | "hard" => Ok(DifficultyTier::Advanced),
            "expert" => Ok(DifficultyTier::Expert),
            other => Err(format!("unknown difficulty tier: {other}")),
        }
    }
}

/// One finished attempt at an assessment. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub assessment_id: String,
    /// Score in 0-100.
    pub score: u8,
    /// 1 for the first attempt, incremented on every retake.
    pub attempt_number: u32,
    pub completed_at: DateTime<Utc>,
}

/// The response slot for one question in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Unanswered,
    Answered(String),
}

impl Answer {
    pub fn is_answered(&self) -> bool {
        matches!(self, Answer::Answered(_))
    }
}
