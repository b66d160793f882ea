//! The `challenger validate` command.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::Result;

use challenger_core::catalog::{load_catalog_path, validate_catalog};

pub fn execute(catalog_path: PathBuf) -> Result<()> {
    let catalogs = load_catalog_path(&catalog_path)?;
    anyhow::ensure!(
        !catalogs.is_empty(),
        "no catalogs found in {}",
        catalog_path.display()
    );

    let mut total_warnings = 0;

    for catalog in &catalogs {
        println!(
            "Catalog: {} ({} assessments)",
            catalog.name,
            catalog.assessments.len()
        );

        let warnings = validate_catalog(catalog);
        for w in &warnings {
            let prefix = w
                .assessment_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    // Ids must also be unique across files that are served together.
    let mut owners: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for catalog in &catalogs {
        for a in &catalog.assessments {
            owners.entry(&a.id).or_default().insert(&catalog.id);
        }
    }
    for (id, catalog_ids) in owners.iter().filter(|(_, c)| c.len() > 1) {
        let joined: Vec<&str> = catalog_ids.iter().copied().collect();
        println!(
            "  [{id}] WARNING: assessment ID appears in several catalogs: {}",
            joined.join(", ")
        );
        total_warnings += 1;
    }

    if total_warnings == 0 {
        println!("All catalogs valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
