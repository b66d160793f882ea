//! Personalized assessment ranking.
//!
//! Each candidate is scored by a table of independent term functions, every
//! term returning a value in `[0, 1]`. The final score is the weighted sum of
//! the terms; weights sum to 1.0, so the score is in `[0, 1]` as well.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AssessmentDefinition, DifficultyTier};
use crate::profile::UserProfile;
use crate::traits::{CatalogSource, HistorySource};

/// Contributions at or below this are not reported as reasons.
const REASON_EPSILON: f64 = 1e-9;

/// How many favorite categories count as "interests".
const INTEREST_CATEGORY_COUNT: usize = 3;

/// Tunables for the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendConfig {
    /// Popularity above which a candidate counts as trending.
    #[serde(default = "default_trending_threshold")]
    pub trending_threshold: u64,
    /// Candidates newer than this many days count as recent.
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: i64,
    /// Minimum score for the `High` fit bucket.
    #[serde(default = "default_high_fit")]
    pub high_fit_threshold: f64,
    /// Minimum score for the `Medium` fit bucket.
    #[serde(default = "default_medium_fit")]
    pub medium_fit_threshold: f64,
}

fn default_trending_threshold() -> u64 {
    1000
}
fn default_recency_window_days() -> i64 {
    30
}
fn default_high_fit() -> f64 {
    0.7
}
fn default_medium_fit() -> f64 {
    0.4
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            trending_threshold: default_trending_threshold(),
            recency_window_days: default_recency_window_days(),
            high_fit_threshold: default_high_fit(),
            medium_fit_threshold: default_medium_fit(),
        }
    }
}

/// Per-call ranking options.
#[derive(Debug, Clone)]
pub struct RankOptions {
    /// Drop assessments the user has already completed.
    pub exclude_completed: bool,
    /// Keep at most this many candidates.
    pub limit: Option<usize>,
    /// Reference time for the recency term.
    pub now: DateTime<Utc>,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            exclude_completed: true,
            limit: None,
            now: Utc::now(),
        }
    }
}

/// Coarse grouping of a recommendation score for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitBucket {
    High,
    Medium,
    Low,
}

impl FitBucket {
    pub fn from_score(score: f64, config: &RecommendConfig) -> Self {
        if score >= config.high_fit_threshold {
            FitBucket::High
        } else if score >= config.medium_fit_threshold {
            FitBucket::Medium
        } else {
            FitBucket::Low
        }
    }
}

impl std::fmt::Display for FitBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitBucket::High => write!(f, "high"),
            FitBucket::Medium => write!(f, "medium"),
            FitBucket::Low => write!(f, "low"),
        }
    }
}

/// One ranked recommendation.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub assessment: AssessmentDefinition,
    /// Weighted score in `[0, 1]`.
    pub score: f64,
    /// Human-readable reasons, in term order.
    pub reason_tags: Vec<String>,
    pub fit: FitBucket,
    /// Raw (unweighted) value of every term, keyed by term name.
    pub terms: BTreeMap<&'static str, f64>,
}

// ---------------------------------------------------------------------------
// Scoring terms
// ---------------------------------------------------------------------------

/// Precomputed per-user state shared by all term functions.
pub struct ScoringContext<'a> {
    pub profile: &'a UserProfile,
    pub config: &'a RecommendConfig,
    pub now: DateTime<Utc>,
    interests: Vec<&'a str>,
}

impl<'a> ScoringContext<'a> {
    pub fn new(profile: &'a UserProfile, config: &'a RecommendConfig, now: DateTime<Utc>) -> Self {
        Self {
            profile,
            config,
            now,
            interests: profile.top_categories(INTEREST_CATEGORY_COUNT),
        }
    }
}

/// A named, weighted scoring term.
pub struct ScoringTerm {
    pub name: &'static str,
    pub weight: f64,
    pub evaluate: fn(&ScoringContext<'_>, &AssessmentDefinition) -> f64,
    pub reason: fn(&ScoringContext<'_>) -> String,
}

/// The scoring table. Weights sum to 1.0.
pub const TERMS: [ScoringTerm; 6] = [
    ScoringTerm {
        name: "category_affinity",
        weight: 0.25,
        evaluate: category_affinity,
        reason: |_| "Matches your active categories".into(),
    },
    ScoringTerm {
        name: "interest_alignment",
        weight: 0.20,
        evaluate: interest_alignment,
        reason: |_| "Aligned with your interests".into(),
    },
    ScoringTerm {
        name: "skill_overlap",
        weight: 0.20,
        evaluate: skill_overlap,
        reason: |_| "Builds on skills you have".into(),
    },
    ScoringTerm {
        name: "difficulty_fit",
        weight: 0.15,
        evaluate: |ctx, a| difficulty_fit(ctx.profile.proficiency_tier, a.difficulty),
        reason: |ctx| format!("Fits your {} level", ctx.profile.proficiency_tier),
    },
    ScoringTerm {
        name: "trending",
        weight: 0.10,
        evaluate: trending,
        reason: |_| "Trending now".into(),
    },
    ScoringTerm {
        name: "recency",
        weight: 0.10,
        evaluate: recency,
        reason: |_| "Recently added".into(),
    },
];

/// 1.0 if the user has attempted something in the candidate's category.
pub fn category_affinity(ctx: &ScoringContext<'_>, candidate: &AssessmentDefinition) -> f64 {
    indicator(ctx.profile.active_categories.contains(&candidate.category))
}

/// 1.0 if the candidate's category is among the user's top favorite categories.
pub fn interest_alignment(ctx: &ScoringContext<'_>, candidate: &AssessmentDefinition) -> f64 {
    indicator(ctx.interests.contains(&candidate.category.as_str()))
}

/// Fraction of the candidate's skills already in the user's skill pool.
pub fn skill_overlap(ctx: &ScoringContext<'_>, candidate: &AssessmentDefinition) -> f64 {
    if candidate.skills.is_empty() {
        return 0.0;
    }
    let shared = candidate
        .skills
        .intersection(&ctx.profile.skill_pool)
        .count();
    shared as f64 / candidate.skills.len() as f64
}

/// 1.0 if popularity exceeds the trending threshold.
pub fn trending(ctx: &ScoringContext<'_>, candidate: &AssessmentDefinition) -> f64 {
    indicator(candidate.popularity > ctx.config.trending_threshold)
}

/// 1.0 if the candidate was created within the recency window.
pub fn recency(ctx: &ScoringContext<'_>, candidate: &AssessmentDefinition) -> f64 {
    let age = ctx.now.signed_duration_since(candidate.created_at);
    indicator(age < Duration::days(ctx.config.recency_window_days))
}

/// Rows: user tier. Columns: candidate tier. Both ascending.
const DIFFICULTY_FIT: [[f64; 4]; 4] = [
    [1.0, 0.7, 0.2, 0.1],
    [0.6, 1.0, 0.7, 0.3],
    [0.3, 0.6, 1.0, 0.7],
    [0.1, 0.3, 0.7, 1.0],
];

/// How well a candidate's difficulty suits a user's tier.
pub fn difficulty_fit(user: DifficultyTier, candidate: DifficultyTier) -> f64 {
    DIFFICULTY_FIT[user.rank()][candidate.rank()]
}

fn indicator(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Stateless ranker. Safe to share across users and threads.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: RecommendConfig,
}

impl Scorer {
    pub fn new(config: RecommendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecommendConfig {
        &self.config
    }

    /// Score a single candidate against a prepared context.
    pub fn score(&self, ctx: &ScoringContext<'_>, candidate: &AssessmentDefinition) -> ScoredCandidate {
        let mut score = 0.0;
        let mut reason_tags = Vec::new();
        let mut terms = BTreeMap::new();

        for term in &TERMS {
            let value = (term.evaluate)(ctx, candidate).clamp(0.0, 1.0);
            let contribution = term.weight * value;
            if contribution > REASON_EPSILON {
                reason_tags.push((term.reason)(ctx));
            }
            terms.insert(term.name, value);
            score += contribution;
        }

        let score = score.clamp(0.0, 1.0);
        ScoredCandidate {
            assessment: candidate.clone(),
            score,
            reason_tags,
            fit: FitBucket::from_score(score, &self.config),
            terms,
        }
    }

    /// Rank the catalog for a user, best first.
    ///
    /// Ties are broken by popularity (descending), then id (ascending).
    pub fn rank(
        &self,
        catalog: &[AssessmentDefinition],
        profile: &UserProfile,
        options: &RankOptions,
    ) -> Vec<ScoredCandidate> {
        let ctx = ScoringContext::new(profile, &self.config, options.now);

        let mut ranked: Vec<ScoredCandidate> = catalog
            .iter()
            .filter(|a| {
                !(options.exclude_completed && profile.completed_assessment_ids.contains(&a.id))
            })
            .map(|a| self.score(&ctx, a))
            .collect();

        ranked.sort_by(compare_candidates);
        if let Some(limit) = options.limit {
            ranked.truncate(limit);
        }

        tracing::debug!(
            catalog = catalog.len(),
            ranked = ranked.len(),
            tier = %profile.proficiency_tier,
            "ranked catalog"
        );
        ranked
    }
}

fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.assessment.popularity.cmp(&a.assessment.popularity))
        .then_with(|| a.assessment.id.cmp(&b.assessment.id))
}

// ---------------------------------------------------------------------------
// Recommender
// ---------------------------------------------------------------------------

/// Fetches a user's data from the collaborators and ranks the catalog.
pub struct Recommender {
    catalog: Arc<dyn CatalogSource>,
    history: Arc<dyn HistorySource>,
    scorer: Scorer,
}

impl Recommender {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        history: Arc<dyn HistorySource>,
        scorer: Scorer,
    ) -> Self {
        Self {
            catalog,
            history,
            scorer,
        }
    }

    /// Fetch catalog, history, and favorites concurrently, then rank.
    pub async fn recommend(
        &self,
        user_id: &str,
        options: &RankOptions,
    ) -> anyhow::Result<Vec<ScoredCandidate>> {
        let (catalog, history, favorites) = futures::try_join!(
            self.catalog.fetch_catalog(),
            self.history.fetch_completion_history(user_id),
            self.history.fetch_favorites(user_id),
        )?;

        let profile = UserProfile::build(&catalog, &history, &favorites);
        Ok(self.scorer.rank(&catalog, &profile, options))
    }
}
