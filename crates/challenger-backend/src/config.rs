//! Configuration loading and backend factory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use challenger_core::history::SelectionPolicy;
use challenger_core::recommend::RecommendConfig;
use challenger_core::session::SessionManagerConfig;

use crate::http::HttpBackend;

/// Connection settings for the REST backend.
///
/// Note: Custom Debug impl masks the API token to keep it out of logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Top-level challenger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChallengerConfig {
    /// REST backend. Absent means local files only.
    #[serde(default)]
    pub backend: Option<BackendConfig>,
    /// User id used when the CLI is not given one.
    #[serde(default)]
    pub default_user: Option<String>,
    /// Which retake counts when reporting a user's history.
    #[serde(default)]
    pub selection_policy: SelectionPolicy,
    #[serde(default)]
    pub recommend: RecommendConfig,
    #[serde(default)]
    pub session: SessionManagerConfig,
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

fn resolve_backend_config(config: &BackendConfig) -> BackendConfig {
    BackendConfig {
        base_url: resolve_env_vars(&config.base_url),
        api_token: config.api_token.as_deref().map(resolve_env_vars),
        timeout_secs: config.timeout_secs,
    }
}

/// Apply `CHALLENGER_BASE_URL` / `CHALLENGER_API_TOKEN` style overrides.
fn apply_overrides(config: &mut ChallengerConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("CHALLENGER_BASE_URL") {
        match config.backend.as_mut() {
            Some(backend) => backend.base_url = url,
            None => {
                config.backend = Some(BackendConfig {
                    base_url: url,
                    api_token: None,
                    timeout_secs: default_timeout_secs(),
                })
            }
        }
    }

    if let Some(token) = lookup("CHALLENGER_API_TOKEN") {
        if let Some(backend) = config.backend.as_mut() {
            backend.api_token = Some(token);
        } else {
            tracing::warn!("CHALLENGER_API_TOKEN is set but no backend is configured");
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `challenger.toml` in the current directory
/// 2. `~/.config/challenger/config.toml`
///
/// Environment variable overrides: `CHALLENGER_BASE_URL`, `CHALLENGER_API_TOKEN`.
pub fn load_config() -> Result<ChallengerConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ChallengerConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("challenger.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ChallengerConfig::default(),
    };

    apply_overrides(&mut config, |name| std::env::var(name).ok());
    config.backend = config.backend.as_ref().map(resolve_backend_config);

    Ok(config)
}

/// Parse a config document without touching the environment.
pub fn parse_config_str(content: &str) -> Result<ChallengerConfig> {
    let config: ChallengerConfig = toml::from_str(content)?;
    let recommend = &config.recommend;
    anyhow::ensure!(
        recommend.medium_fit_threshold <= recommend.high_fit_threshold,
        "recommend.medium_fit_threshold ({}) must not exceed high_fit_threshold ({})",
        recommend.medium_fit_threshold,
        recommend.high_fit_threshold
    );
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("challenger"))
}

/// Create the REST backend from its configuration.
pub fn create_backend(config: &BackendConfig) -> Result<HttpBackend> {
    HttpBackend::new(config)
        .with_context(|| format!("failed to create backend for {}", config.base_url))
}
