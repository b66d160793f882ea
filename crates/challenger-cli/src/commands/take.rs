//! The `challenger take` command.
//!
//! Runs one session end to end: start, record the scripted answers, submit,
//! and append the outcome to the user's history.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use challenger_backend::config::load_config_from;
use challenger_backend::{create_backend, MockGrader};
use challenger_core::catalog::load_catalog_path;
use challenger_core::history::HistoryFile;
use challenger_core::report::{ResultSink, SessionOutcome, SubmitTrigger};
use challenger_core::session::SessionManager;
use challenger_core::traits::Grader;

pub struct TakeArgs {
    pub catalog: PathBuf,
    pub assessment: String,
    pub answers: Vec<String>,
    pub history: Option<PathBuf>,
    pub user: Option<String>,
    pub mock_score: Option<u8>,
    pub retries: u32,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Reports completed sessions through the log.
struct LogSink;

impl ResultSink for LogSink {
    fn on_completed(&self, outcome: &SessionOutcome) {
        tracing::info!(
            session_id = %outcome.session_id,
            assessment_id = %outcome.assessment_id,
            score = outcome.score,
            passed = outcome.passed,
            "result reported"
        );
    }
}

/// Parse an `INDEX=VALUE` answer argument.
fn parse_answer(raw: &str) -> Result<(usize, String)> {
    let (index, value) = raw
        .split_once('=')
        .with_context(|| format!("invalid answer '{raw}': expected INDEX=VALUE"))?;
    let index = index
        .trim()
        .parse::<usize>()
        .with_context(|| format!("invalid answer index in '{raw}'"))?;
    Ok((index, value.to_string()))
}

pub async fn execute(args: TakeArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;

    let assessment = load_catalog_path(&args.catalog)?
        .into_iter()
        .flat_map(|c| c.assessments)
        .find(|a| a.id == args.assessment)
        .with_context(|| format!("unknown assessment: {}", args.assessment))?;

    let answers = args
        .answers
        .iter()
        .map(|raw| parse_answer(raw))
        .collect::<Result<Vec<_>>>()?;

    let grader: Arc<dyn Grader> = match (args.mock_score, &config.backend) {
        (Some(score), _) => Arc::new(MockGrader::with_fixed_score(score)),
        (None, Some(backend)) => Arc::new(create_backend(backend)?),
        (None, None) => {
            anyhow::bail!("no grader: pass --mock-score or configure a [backend] in challenger.toml")
        }
    };

    let mut history = match &args.history {
        Some(path) if path.exists() => HistoryFile::load(path)?,
        _ => HistoryFile {
            user_id: args.user.clone().or(config.default_user).unwrap_or_default(),
            ..Default::default()
        },
    };

    let manager = SessionManager::new(grader, Arc::new(LogSink), config.session)
        .with_history(&history.completions);

    let session = manager.start(&assessment)?;
    println!(
        "Started {} (attempt {}, {} questions)",
        assessment.title,
        session.attempt_number,
        assessment.question_count
    );

    for (index, value) in answers {
        manager.answer(index, value)?;
    }

    let mut retries_left = args.retries;
    let outcome = loop {
        match manager.submit(SubmitTrigger::Manual).await {
            Ok(outcome) => break outcome,
            Err(e) if e.is_retryable() && retries_left > 0 => {
                retries_left -= 1;
                eprintln!("  {e}; retrying ({retries_left} left)");
            }
            Err(e) => return Err(e.into()),
        }
    };

    println!(
        "Score: {} ({}) in {}s",
        outcome.score,
        if outcome.passed { "passed" } else { "failed" },
        outcome.time_spent_secs
    );

    if let Some(path) = &args.history {
        history.append(outcome.to_completion_record());
        history.save(path)?;
        println!("History updated: {}", path.display());
    }

    if let Some(path) = &args.output {
        outcome.save_json(path)?;
        println!("Outcome saved to: {}", path.display());
    }

    Ok(())
}
