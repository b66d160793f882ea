//! The `challenger recommend` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use challenger_backend::config::load_config_from;
use challenger_backend::create_backend;
use challenger_core::catalog::FileCatalog;
use challenger_core::history::FileHistory;
use challenger_core::model::CompletionRecord;
use challenger_core::recommend::{RankOptions, Recommender, ScoredCandidate, Scorer};
use challenger_core::traits::{CatalogSource, HistorySource};

pub struct RecommendArgs {
    pub catalog: Option<PathBuf>,
    pub history: Option<PathBuf>,
    pub user: Option<String>,
    pub limit: usize,
    pub include_completed: bool,
    pub now: Option<DateTime<Utc>>,
    pub format: String,
    pub config: Option<PathBuf>,
}

/// History for a user nobody knows anything about yet.
struct NoHistory;

#[async_trait]
impl HistorySource for NoHistory {
    async fn fetch_completion_history(&self, _: &str) -> Result<Vec<CompletionRecord>> {
        Ok(Vec::new())
    }

    async fn fetch_favorites(&self, _: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

pub async fn execute(args: RecommendArgs) -> Result<()> {
    anyhow::ensure!(args.limit >= 1, "limit must be at least 1");
    anyhow::ensure!(
        matches!(args.format.as_str(), "text" | "json"),
        "unknown format: {} (expected text or json)",
        args.format
    );

    let config = load_config_from(args.config.as_deref())?;
    let backend = config.backend.as_ref().map(create_backend).transpose()?.map(Arc::new);

    let catalog: Arc<dyn CatalogSource> = match (&args.catalog, &backend) {
        (Some(path), _) => Arc::new(FileCatalog::new(path)),
        (None, Some(backend)) => backend.clone(),
        (None, None) => {
            anyhow::bail!("no catalog: pass --catalog or configure a [backend] in challenger.toml")
        }
    };
    let history: Arc<dyn HistorySource> = match (&args.history, &backend) {
        (Some(path), _) => Arc::new(FileHistory::new(path)),
        (None, Some(backend)) => backend.clone(),
        (None, None) => Arc::new(NoHistory),
    };

    let user = args
        .user
        .or(config.default_user)
        .unwrap_or_else(|| "anonymous".to_string());
    let options = RankOptions {
        exclude_completed: !args.include_completed,
        limit: Some(args.limit),
        now: args.now.unwrap_or_else(Utc::now),
    };

    let recommender = Recommender::new(catalog, history, Scorer::new(config.recommend));
    let ranked = recommender.recommend(&user, &options).await?;
    tracing::debug!(user = %user, count = ranked.len(), "ranked catalog");

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
    } else if ranked.is_empty() {
        println!("No recommendations for {user}.");
    } else {
        println!("Recommendations for {user}:");
        print_table(&ranked);
    }

    Ok(())
}

fn print_table(ranked: &[ScoredCandidate]) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "#",
        "Assessment",
        "Category",
        "Difficulty",
        "Score",
        "Fit",
        "Why",
    ]);

    for (rank, candidate) in ranked.iter().enumerate() {
        let a = &candidate.assessment;
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(format!("{} ({})", a.title, a.id)),
            Cell::new(&a.category),
            Cell::new(a.difficulty),
            Cell::new(format!("{:.2}", candidate.score)),
            Cell::new(candidate.fit),
            Cell::new(candidate.reason_tags.join("; ")),
        ]);
    }

    println!("{table}");
}
