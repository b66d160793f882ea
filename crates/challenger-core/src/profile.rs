//! Per-user scoring profile, derived from catalog, history, and favorites.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{AssessmentDefinition, CompletionRecord, DifficultyTier};
use crate::proficiency;

/// Weight a completed assessment adds to its category.
pub const COMPLETED_CATEGORY_WEIGHT: f64 = 1.0;
/// Weight a favorited, not yet completed assessment adds to its category.
pub const FAVORITE_CATEGORY_WEIGHT: f64 = 0.5;

/// The inputs the recommendation scorer needs about a user.
///
/// Recomputed on demand; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Assessments with at least one completion record.
    pub completed_assessment_ids: BTreeSet<String>,
    /// Categories the user has attempted.
    pub active_categories: BTreeSet<String>,
    /// Weighted interest per category.
    pub favorite_category_counts: BTreeMap<String, f64>,
    /// Union of skills from completed and favorited assessments.
    pub skill_pool: BTreeSet<String>,
    pub proficiency_tier: DifficultyTier,
}

impl UserProfile {
    /// Build a profile from the catalog, a user's history, and favorite ids.
    ///
    /// History entries for assessments missing from the catalog still count
    /// as completed and toward the tier, but carry no category or skills.
    pub fn build(
        catalog: &[AssessmentDefinition],
        history: &[CompletionRecord],
        favorites: &[String],
    ) -> Self {
        let by_id: HashMap<&str, &AssessmentDefinition> =
            catalog.iter().map(|a| (a.id.as_str(), a)).collect();

        let completed_assessment_ids: BTreeSet<String> =
            history.iter().map(|r| r.assessment_id.clone()).collect();

        let mut active_categories = BTreeSet::new();
        let mut favorite_category_counts: BTreeMap<String, f64> = BTreeMap::new();
        let mut skill_pool = BTreeSet::new();

        // Retakes count once toward category weight.
        for id in &completed_assessment_ids {
            let Some(assessment) = by_id.get(id.as_str()) else {
                tracing::debug!(assessment_id = %id, "completed assessment not in catalog");
                continue;
            };
            active_categories.insert(assessment.category.clone());
            *favorite_category_counts
                .entry(assessment.category.clone())
                .or_default() += COMPLETED_CATEGORY_WEIGHT;
            skill_pool.extend(assessment.skills.iter().cloned());
        }

        let favorites: BTreeSet<&str> = favorites.iter().map(String::as_str).collect();
        for id in favorites {
            let Some(assessment) = by_id.get(id) else {
                continue;
            };
            skill_pool.extend(assessment.skills.iter().cloned());
            if !completed_assessment_ids.contains(id) {
                *favorite_category_counts
                    .entry(assessment.category.clone())
                    .or_default() += FAVORITE_CATEGORY_WEIGHT;
            }
        }

        Self {
            completed_assessment_ids,
            active_categories,
            favorite_category_counts,
            skill_pool,
            proficiency_tier: proficiency::tier(history),
        }
    }

    /// The `n` categories with the highest weighted count, ties by name.
    pub fn top_categories(&self, n: usize) -> Vec<&str> {
        let mut ranked: Vec<(&str, f64)> = self
            .favorite_category_counts
            .iter()
            .map(|(category, weight)| (category.as_str(), *weight))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.into_iter().take(n).map(|(category, _)| category).collect()
    }
}
