//! challenger CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use challenger_core::history::SelectionPolicy;

mod commands;

#[derive(Parser)]
#[command(
    name = "challenger",
    version,
    about = "Assessment recommendations and timed sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank the catalog for a user
    Recommend {
        /// Catalog .toml file or directory (defaults to the configured backend)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// History JSON file (defaults to the configured backend)
        #[arg(long)]
        history: Option<PathBuf>,

        /// User id (defaults to `default_user` from the config)
        #[arg(long)]
        user: Option<String>,

        /// Maximum number of recommendations
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Keep assessments the user has already completed
        #[arg(long)]
        include_completed: bool,

        /// Reference time for recency (RFC 3339, default: now)
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the proficiency tier inferred from a history file
    Tier {
        /// History JSON file
        #[arg(long)]
        history: PathBuf,
    },

    /// Show one record per assessment from a history file
    History {
        /// History JSON file
        #[arg(long)]
        history: PathBuf,

        /// Which attempt represents a retaken assessment: best, latest
        #[arg(long)]
        policy: Option<SelectionPolicy>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Take an assessment with scripted answers
    Take {
        /// Catalog .toml file or directory
        #[arg(long)]
        catalog: PathBuf,

        /// Assessment id to start
        #[arg(long)]
        assessment: String,

        /// Answer as INDEX=VALUE (repeatable)
        #[arg(long = "answer")]
        answers: Vec<String>,

        /// History JSON file; the outcome is appended to it
        #[arg(long)]
        history: Option<PathBuf>,

        /// User id recorded in a new history file
        #[arg(long)]
        user: Option<String>,

        /// Grade locally with this fixed score instead of the backend
        #[arg(long)]
        mock_score: Option<u8>,

        /// Retries after a failed grading call
        #[arg(long, default_value = "1")]
        retries: u32,

        /// Save the outcome JSON here
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate catalog TOML files
    Validate {
        /// Path to catalog file or directory
        #[arg(long)]
        catalog: PathBuf,
    },

    /// Create starter config and example catalog
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("challenger=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Recommend {
            catalog,
            history,
            user,
            limit,
            include_completed,
            now,
            format,
            config,
        } => {
            commands::recommend::execute(commands::recommend::RecommendArgs {
                catalog,
                history,
                user,
                limit,
                include_completed,
                now,
                format,
                config,
            })
            .await
        }
        Commands::Tier { history } => commands::tier::execute(history),
        Commands::History {
            history,
            policy,
            config,
        } => commands::history::execute(history, policy, config),
        Commands::Take {
            catalog,
            assessment,
            answers,
            history,
            user,
            mock_score,
            retries,
            output,
            config,
        } => {
            commands::take::execute(commands::take::TakeArgs {
                catalog,
                assessment,
                answers,
                history,
                user,
                mock_score,
                retries,
                output,
                config,
            })
            .await
        }
        Commands::Validate { catalog } => commands::validate::execute(catalog),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
