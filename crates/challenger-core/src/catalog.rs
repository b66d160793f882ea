//! TOML assessment catalog loader.
//!
//! Loads catalogs from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::{AssessmentDefinition, DifficultyTier, MAX_TIME_LIMIT_SECS};
use crate::traits::CatalogSource;

/// A named collection of assessments loaded from one file.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub id: String,
    pub name: String,
    pub assessments: Vec<AssessmentDefinition>,
}

/// Intermediate TOML structure for parsing catalog files.
#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    catalog: TomlCatalogHeader,
    #[serde(default)]
    assessments: Vec<TomlAssessment>,
}

#[derive(Debug, Deserialize)]
struct TomlCatalogHeader {
    id: String,
    name: String,
    #[serde(default = "default_passing_score")]
    default_passing_score: u32,
}

fn default_passing_score() -> u32 {
    70
}

#[derive(Debug, Deserialize)]
struct TomlAssessment {
    id: String,
    #[serde(default)]
    title: String,
    category: String,
    #[serde(default)]
    skills: Vec<String>,
    difficulty: String,
    #[serde(default)]
    time_limit_secs: Option<u64>,
    #[serde(default)]
    passing_score: Option<u32>,
    #[serde(default)]
    popularity: u64,
    /// RFC 3339 timestamp string.
    created_at: String,
    question_count: usize,
}

/// Parse a single TOML file into a `Catalog`.
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, path)
}

/// Parse a TOML string into a `Catalog` (useful for testing).
pub fn parse_catalog_str(content: &str, source_path: &Path) -> Result<Catalog> {
    let parsed: TomlCatalogFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let default_passing = parsed.catalog.default_passing_score;

    let assessments = parsed
        .assessments
        .into_iter()
        .map(|a| {
            let difficulty: DifficultyTier = a
                .difficulty
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{}: {}", a.id, e))?;

            let created_at = DateTime::parse_from_rfc3339(&a.created_at)
                .with_context(|| format!("{}: invalid created_at '{}'", a.id, a.created_at))?
                .with_timezone(&Utc);

            let passing_score = a.passing_score.unwrap_or(default_passing);
            anyhow::ensure!(
                passing_score <= 100,
                "{}: passing_score {} is outside 0-100",
                a.id,
                passing_score
            );

            Ok(AssessmentDefinition {
                title: if a.title.is_empty() {
                    a.id.clone()
                } else {
                    a.title
                },
                id: a.id,
                category: a.category,
                skills: a.skills.into_iter().collect(),
                difficulty,
                time_limit_secs: a.time_limit_secs,
                passing_score: passing_score as u8,
                popularity: a.popularity,
                created_at,
                question_count: a.question_count,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Catalog {
        id: parsed.catalog.id,
        name: parsed.catalog.name,
        assessments,
    })
}

/// Recursively load all `.toml` catalog files from a directory.
pub fn load_catalog_directory(dir: &Path) -> Result<Vec<Catalog>> {
    let mut catalogs = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            catalogs.extend(load_catalog_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_catalog(&path) {
                Ok(catalog) => catalogs.push(catalog),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(catalogs)
}

/// Load a catalog file, or merge every catalog under a directory.
pub fn load_catalog_path(path: &Path) -> Result<Vec<Catalog>> {
    if path.is_dir() {
        load_catalog_directory(path)
    } else {
        Ok(vec![parse_catalog(path)?])
    }
}

/// A warning from catalog validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The assessment ID (if applicable).
    pub assessment_id: Option<String>,
    pub message: String,
}

/// Validate a list of assessments for common issues.
pub fn validate_assessments(assessments: &[AssessmentDefinition]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for a in assessments {
        if !seen_ids.insert(&a.id) {
            warnings.push(ValidationWarning {
                assessment_id: Some(a.id.clone()),
                message: format!("duplicate assessment ID: {}", a.id),
            });
        }
    }

    for a in assessments {
        if a.passing_score > 100 {
            warnings.push(ValidationWarning {
                assessment_id: Some(a.id.clone()),
                message: format!("passing_score {} is outside 0-100", a.passing_score),
            });
        }
        if a.question_count == 0 {
            warnings.push(ValidationWarning {
                assessment_id: Some(a.id.clone()),
                message: "assessment has no questions".into(),
            });
        }
        if a.time_limit_secs == Some(0) {
            warnings.push(ValidationWarning {
                assessment_id: Some(a.id.clone()),
                message: "time_limit_secs is 0; the session would time out immediately".into(),
            });
        }
        if let Some(secs) = a.time_limit_secs.filter(|&s| s > MAX_TIME_LIMIT_SECS) {
            warnings.push(ValidationWarning {
                assessment_id: Some(a.id.clone()),
                message: format!(
                    "time_limit_secs {secs} exceeds the {MAX_TIME_LIMIT_SECS}s maximum; sessions cannot start"
                ),
            });
        }
        if a.category.trim().is_empty() {
            warnings.push(ValidationWarning {
                assessment_id: Some(a.id.clone()),
                message: "category is empty".into(),
            });
        }
    }

    warnings
}

/// Validate a single catalog.
pub fn validate_catalog(catalog: &Catalog) -> Vec<ValidationWarning> {
    validate_assessments(&catalog.assessments)
}

/// A [`CatalogSource`] backed by a TOML file or directory.
///
/// Re-reads the path on every fetch and rejects catalogs whose ids collide.
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalog {
    async fn fetch_catalog(&self) -> Result<Vec<AssessmentDefinition>> {
        let assessments: Vec<AssessmentDefinition> = load_catalog_path(&self.path)?
            .into_iter()
            .flat_map(|c| c.assessments)
            .collect();

        if let Some(dupe) = validate_assessments(&assessments)
            .into_iter()
            .find(|w| w.message.starts_with("duplicate"))
        {
            anyhow::bail!("{}: {}", self.path.display(), dupe.message);
        }
        Ok(assessments)
    }
}
