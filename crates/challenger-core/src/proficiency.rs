//! Proficiency tier inference from completion history.

use crate::model::{CompletionRecord, DifficultyTier};

/// Ordered `(min_count, min_avg_score, tier)` thresholds. First match wins.
const THRESHOLDS: [(usize, f64, DifficultyTier); 3] = [
    (15, 85.0, DifficultyTier::Expert),
    (10, 75.0, DifficultyTier::Advanced),
    (5, 65.0, DifficultyTier::Intermediate),
];

/// Infer a user's proficiency tier from every completed attempt.
///
/// Retakes count as separate records; an empty history is `Beginner`.
pub fn tier(history: &[CompletionRecord]) -> DifficultyTier {
    if history.is_empty() {
        return DifficultyTier::Beginner;
    }

    let count = history.len();
    let avg = history.iter().map(|r| r.score as f64).sum::<f64>() / count as f64;

    THRESHOLDS
        .iter()
        .find(|(min_count, min_avg, _)| count >= *min_count && avg >= *min_avg)
        .map(|(_, _, tier)| *tier)
        .unwrap_or(DifficultyTier::Beginner)
}
