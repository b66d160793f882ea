//! Completion history: file-backed source and read-time selection policies.
//!
//! History is append-only. Whether the best or the latest attempt is
//! authoritative is decided by the reader through [`SelectionPolicy`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::CompletionRecord;
use crate::traits::HistorySource;

/// Which record represents an assessment when it has several attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// Highest score; later attempt wins a tie.
    Best,
    /// Most recent attempt.
    #[default]
    Latest,
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::Best => write!(f, "best"),
            SelectionPolicy::Latest => write!(f, "latest"),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "best" => Ok(SelectionPolicy::Best),
            "latest" => Ok(SelectionPolicy::Latest),
            other => Err(format!("unknown selection policy: {other} (expected best or latest)")),
        }
    }
}

impl SelectionPolicy {
    /// Orders two attempts at the same assessment; the greater one wins.
    fn compare(self, a: &CompletionRecord, b: &CompletionRecord) -> Ordering {
        match self {
            SelectionPolicy::Best => a
                .score
                .cmp(&b.score)
                .then_with(|| a.completed_at.cmp(&b.completed_at)),
            SelectionPolicy::Latest => a
                .completed_at
                .cmp(&b.completed_at)
                .then_with(|| a.attempt_number.cmp(&b.attempt_number)),
        }
    }
}

/// Highest-scoring record for `assessment_id`.
pub fn best_record<'a>(
    history: &'a [CompletionRecord],
    assessment_id: &str,
) -> Option<&'a CompletionRecord> {
    history
        .iter()
        .filter(|r| r.assessment_id == assessment_id)
        .max_by(|a, b| SelectionPolicy::Best.compare(a, b))
}

/// Most recent record for `assessment_id`.
pub fn latest_record<'a>(
    history: &'a [CompletionRecord],
    assessment_id: &str,
) -> Option<&'a CompletionRecord> {
    history
        .iter()
        .filter(|r| r.assessment_id == assessment_id)
        .max_by(|a, b| SelectionPolicy::Latest.compare(a, b))
}

/// One representative record per assessment under `policy`, ordered by id.
///
/// Single pass; on a full tie the later record wins, as with `max_by`.
pub fn select<'a>(
    history: &'a [CompletionRecord],
    policy: SelectionPolicy,
) -> Vec<&'a CompletionRecord> {
    let mut chosen: BTreeMap<&str, &CompletionRecord> = BTreeMap::new();
    for record in history {
        chosen
            .entry(record.assessment_id.as_str())
            .and_modify(|current| {
                if policy.compare(record, *current) != Ordering::Less {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    chosen.into_values().collect()
}

/// Number of prior attempts per assessment.
pub fn attempt_counts(history: &[CompletionRecord]) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for record in history {
        let entry = counts.entry(record.assessment_id.clone()).or_default();
        *entry = (*entry).max(record.attempt_number);
    }
    counts
}

// ---------------------------------------------------------------------------
// JSON file source
// ---------------------------------------------------------------------------

/// On-disk shape of a user's history file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryFile {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub completions: Vec<CompletionRecord>,
    #[serde(default)]
    pub favorites: Vec<String>,
}

impl HistoryFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read history file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse history JSON: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize history")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write history to {}", path.display()))
    }

    /// Append a record. Earlier records are never touched.
    pub fn append(&mut self, record: CompletionRecord) {
        self.completions.push(record);
    }
}

/// A [`HistorySource`] reading one user's history from a JSON file.
///
/// The file is re-read on every fetch. Requests for any other user id
/// return empty history.
pub struct FileHistory {
    path: PathBuf,
}

impl FileHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load_for(&self, user_id: &str) -> Result<HistoryFile> {
        let file = HistoryFile::load(&self.path)?;
        if !file.user_id.is_empty() && file.user_id != user_id {
            tracing::debug!(requested = user_id, stored = %file.user_id, "history file belongs to another user");
            return Ok(HistoryFile::default());
        }
        Ok(file)
    }
}

#[async_trait]
impl HistorySource for FileHistory {
    async fn fetch_completion_history(&self, user_id: &str) -> Result<Vec<CompletionRecord>> {
        Ok(self.load_for(user_id)?.completions)
    }

    async fn fetch_favorites(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self.load_for(user_id)?.favorites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn at(day: u32) -> DateTime<Utc> {
        format!("2026-09-{day:02}T10:00:00Z").parse().unwrap()
    }

    fn record(id: &str, score: u8, attempt: u32, day: u32) -> CompletionRecord {
        CompletionRecord {
            assessment_id: id.into(),
            score,
            attempt_number: attempt,
            completed_at: at(day),
        }
    }

    fn retakes() -> Vec<CompletionRecord> {
        vec![
            record("sql", 90, 1, 1),
            record("sql", 60, 2, 5),
            record("go", 70, 1, 3),
        ]
    }

    #[test]
    fn best_and_latest_differ_after_worse_retake() {
        let history = retakes();
        assert_eq!(best_record(&history, "sql").unwrap().score, 90);
        assert_eq!(latest_record(&history, "sql").unwrap().score, 60);
        assert!(best_record(&history, "missing").is_none());
    }

    #[test]
    fn select_one_per_assessment() {
        let history = retakes();
        let best = select(&history, SelectionPolicy::Best);
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].assessment_id, "go");
        assert_eq!(best[1].score, 90);

        let latest = select(&history, SelectionPolicy::Latest);
        assert_eq!(latest[1].score, 60);
    }

    #[test]
    fn select_matches_per_assessment_lookup() {
        let mut history = retakes();
        history.push(record("go", 70, 2, 3));
        history.push(record("rust", 40, 1, 9));
        history.push(record("sql", 90, 3, 1));
        history.push(record("rust", 85, 2, 2));

        for policy in [SelectionPolicy::Best, SelectionPolicy::Latest] {
            let selected = select(&history, policy);
            let ids: Vec<&str> = selected.iter().map(|r| r.assessment_id.as_str()).collect();
            assert_eq!(ids, ["go", "rust", "sql"]);
            for chosen in selected {
                let expected = match policy {
                    SelectionPolicy::Best => best_record(&history, &chosen.assessment_id),
                    SelectionPolicy::Latest => latest_record(&history, &chosen.assessment_id),
                };
                assert!(std::ptr::eq(chosen, expected.unwrap()), "{policy} {chosen:?}");
            }
        }
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Best".parse::<SelectionPolicy>(), Ok(SelectionPolicy::Best));
        assert_eq!("latest".parse::<SelectionPolicy>(), Ok(SelectionPolicy::Latest));
        assert!("newest".parse::<SelectionPolicy>().is_err());
    }

    #[test]
    fn attempt_counts_track_highest_attempt() {
        let counts = attempt_counts(&retakes());
        assert_eq!(counts["sql"], 2);
        assert_eq!(counts["go"], 1);
    }

    #[tokio::test]
    async fn file_history_scoped_to_user() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut file = HistoryFile {
            user_id: "ada".into(),
            completions: vec![],
            favorites: vec!["go".into()],
        };
        file.append(record("sql", 90, 1, 1));
        file.save(&path).unwrap();

        let source = FileHistory::new(&path);
        assert_eq!(source.fetch_completion_history("ada").await.unwrap().len(), 1);
        assert_eq!(source.fetch_favorites("ada").await.unwrap(), vec!["go"]);
        assert!(source.fetch_completion_history("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let source = FileHistory::new("/nonexistent/history.json");
        assert!(source.fetch_completion_history("ada").await.is_err());
    }
}
