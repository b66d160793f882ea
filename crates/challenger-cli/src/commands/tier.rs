//! The `challenger tier` command.

use std::path::PathBuf;

use anyhow::Result;

use challenger_core::history::HistoryFile;
use challenger_core::proficiency;

pub fn execute(history_path: PathBuf) -> Result<()> {
    let history = HistoryFile::load(&history_path)?;
    let records = &history.completions;
    let tier = proficiency::tier(records);

    if records.is_empty() {
        println!("No completions yet.");
    } else {
        let avg = records.iter().map(|r| f64::from(r.score)).sum::<f64>() / records.len() as f64;
        println!("Completions: {} (average score {avg:.1})", records.len());
    }
    println!("Proficiency tier: {tier}");

    Ok(())
}
