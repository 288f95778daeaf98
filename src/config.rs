//! Configuration management

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::RunConfig;
use crate::recovery::RetryPolicy;

const DEFAULT_DB_FILE: &str = "ai_tutor.db";

/// Tutor configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Anthropic API key (required to reach the model)
    pub anthropic_api_key: Option<String>,

    /// SQLite database path
    pub db_path: PathBuf,

    /// Model used by every tutor agent (haiku, sonnet, opus or a full id)
    pub agent_model: String,

    /// Output token limit per model call
    pub max_tokens: usize,

    /// Model round trips an agent may spend on tools per turn
    pub max_tool_rounds: usize,

    /// Attempts per model call, including the first
    pub retry_attempts: usize,

    /// Delay before the first retry
    pub retry_initial_delay: Duration,

    /// Interactions reloaded when a chat is resumed
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            anthropic_api_key: None,
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            agent_model: "sonnet".to_string(),
            max_tokens: run.max_tokens,
            max_tool_rounds: run.max_tool_rounds,
            retry_attempts: 15,
            retry_initial_delay: Duration::from_secs(2),
            history_limit: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let db_path = std::env::var("DATABASE_URI")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| parse_database_uri(&v))
            .unwrap_or(defaults.db_path);

        let agent_model = std::env::var("TUTOR_AGENT_MODEL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.agent_model);

        Ok(Self {
            anthropic_api_key,
            db_path,
            agent_model,
            max_tokens: env_number("TUTOR_MAX_TOKENS", defaults.max_tokens)?,
            max_tool_rounds: env_number("TUTOR_MAX_TOOL_ROUNDS", defaults.max_tool_rounds)?,
            retry_attempts: env_number("TUTOR_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_initial_delay: Duration::from_secs(env_number(
                "TUTOR_RETRY_INITIAL_DELAY_SECS",
                defaults.retry_initial_delay.as_secs(),
            )?),
            history_limit: env_number("TUTOR_HISTORY_LIMIT", defaults.history_limit)?,
        })
    }

    /// Retry policy for model calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_initial_delay)
    }

    /// Per-turn limits for the agent runtime
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            max_tokens: self.max_tokens,
            max_tool_rounds: self.max_tool_rounds,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Accepts `sqlite:///path/to.db`, `sqlite://relative.db` or a plain path
pub fn parse_database_uri(uri: &str) -> PathBuf {
    let uri = uri.trim();
    let path = uri
        .strip_prefix("sqlite:///")
        .or_else(|| uri.strip_prefix("sqlite://"))
        .or_else(|| uri.strip_prefix("sqlite:"))
        .unwrap_or(uri);

    if path.is_empty() {
        PathBuf::from(DEFAULT_DB_FILE)
    } else {
        PathBuf::from(path)
    }
}

fn env_number<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", key, v)),
        _ => Ok(default),
    }
}
