//! The `challenger init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("challenger.toml").exists() {
        println!("challenger.toml already exists, skipping.");
    } else {
        std::fs::write("challenger.toml", SAMPLE_CONFIG)?;
        println!("Created challenger.toml");
    }

    std::fs::create_dir_all("catalogs")?;
    let example_path = std::path::Path::new("catalogs/example.toml");
    if example_path.exists() {
        println!("catalogs/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_CATALOG)?;
        println!("Created catalogs/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Point [backend] in challenger.toml at your grading service, or use --mock-score");
    println!("  2. Run: challenger validate --catalog catalogs/example.toml");
    println!("  3. Run: challenger recommend --catalog catalogs");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# challenger configuration

# default_user = "ada"
selection_policy = "latest"

# [backend]
# base_url = "https://assessments.example.com/api"
# api_token = "${CHALLENGER_API_TOKEN}"
# timeout_secs = 30

[recommend]
trending_threshold = 1000
recency_window_days = 30
high_fit_threshold = 0.7
medium_fit_threshold = 0.4

[session]
deadline_grace_secs = 0
"#;

const EXAMPLE_CATALOG: &str = r#"[catalog]
id = "example"
name = "Example Catalog"
default_passing_score = 70

[[assessments]]
id = "rust-ownership"
title = "Rust Ownership"
category = "backend"
skills = ["Rust"]
difficulty = "intermediate"
time_limit_secs = 900
popularity = 1200
created_at = "2026-01-15T09:00:00Z"
question_count = 10

[[assessments]]
id = "sql-joins"
title = "SQL Joins"
category = "data"
skills = ["SQL"]
difficulty = "beginner"
time_limit_secs = 600
popularity = 450
created_at = "2025-11-02T09:00:00Z"
question_count = 8

[[assessments]]
id = "react-hooks"
title = "React Hooks"
category = "frontend"
skills = ["React", "JS"]
difficulty = "intermediate"
popularity = 2300
created_at = "2025-06-20T09:00:00Z"
question_count = 12
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use challenger_core::catalog::{parse_catalog_str, validate_catalog};

    #[test]
    fn example_catalog_is_valid() {
        let catalog =
            parse_catalog_str(EXAMPLE_CATALOG, std::path::Path::new("example.toml")).unwrap();
        assert_eq!(catalog.assessments.len(), 3);
        assert!(validate_catalog(&catalog).is_empty());
    }

    #[test]
    fn sample_config_parses() {
        let config = challenger_backend::config::parse_config_str(SAMPLE_CONFIG).unwrap();
        assert!(config.backend.is_none());
        assert_eq!(config.recommend.trending_threshold, 1000);
    }
}
