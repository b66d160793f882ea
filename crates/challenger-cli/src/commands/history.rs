//! The `challenger history` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use challenger_backend::config::load_config_from;
use challenger_core::history::{self, HistoryFile, SelectionPolicy};

pub fn execute(
    history_path: PathBuf,
    policy: Option<SelectionPolicy>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let policy = match policy {
        Some(policy) => policy,
        None => load_config_from(config_path.as_deref())?.selection_policy,
    };

    let file = HistoryFile::load(&history_path)?;
    let selected = history::select(&file.completions, policy);
    if selected.is_empty() {
        println!("No completions yet.");
        return Ok(());
    }

    let attempts = history::attempt_counts(&file.completions);

    let mut table = Table::new();
    table.set_header(vec!["Assessment", "Score", "Attempt", "Attempts", "Completed"]);
    for record in selected {
        table.add_row(vec![
            Cell::new(&record.assessment_id),
            Cell::new(record.score),
            Cell::new(record.attempt_number),
            Cell::new(attempts.get(&record.assessment_id).copied().unwrap_or(1)),
            Cell::new(record.completed_at.format("%Y-%m-%d %H:%M")),
        ]);
    }

    println!("History ({policy} attempt per assessment):");
    println!("{table}");
    Ok(())
}
