//! Retry with backoff
//!
//! Model calls fail for boring reasons (429s, overloaded upstream, dropped
//! connections). Errors are classified from their message and retried with
//! exponential backoff plus jitter; everything else fails fast.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How a failed model call should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 429: wait before trying again
    RateLimited,
    /// Upstream overloaded (529/503)
    Overloaded,
    /// Dropped connection, timeout or 5xx
    Transient,
    /// Missing or rejected API key
    Auth,
    /// The request itself is wrong
    BadRequest,
    Other,
}

static API_STATUS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Claude API error (\d{3})\b").unwrap());

impl ErrorClass {
    /// Classify an HTTP status from the model API
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            503 | 529 => Self::Overloaded,
            401 | 403 => Self::Auth,
            500..=599 => Self::Transient,
            400..=499 => Self::BadRequest,
            _ => Self::Other,
        }
    }

    /// Classify an error from its message. API errors are classified by
    /// their status alone; the response body is never inspected.
    pub fn from_error(error: &str) -> Self {
        if let Some(status) = API_STATUS_RE
            .captures(error.trim_start())
            .and_then(|c| c[1].parse::<u16>().ok())
        {
            return Self::from_status(status);
        }

        let lower = error.to_lowercase();
        let any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if any(&["429", "rate limit", "rate_limit", "too many requests"]) {
            Self::RateLimited
        } else if any(&["401", "403", "unauthorized", "forbidden", "api_key", "api key"]) {
            Self::Auth
        } else if any(&["400", "invalid"]) {
            Self::BadRequest
        } else if any(&["529", "503", "overloaded", "unavailable"]) {
            Self::Overloaded
        } else if any(&["timed out", "timeout", "connection", "500", "502"]) {
            Self::Transient
        } else {
            Self::Other
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Overloaded | Self::Transient)
    }
}

/// Exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Fraction of the delay added or removed at random
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            ..Self::default()
        }
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Wait before retry number `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        let jitter = capped * self.jitter_factor * (rand::random::<f64>() * 2.0 - 1.0);

        Duration::from_secs_f64((capped + jitter).max(0.0))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded after {} attempts", label, attempt);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let class = ErrorClass::from_error(&e.to_string());
                    if !class.is_retryable() || attempt >= self.max_attempts {
                        return Err(e);
                    }

                    let delay = self.delay_for_attempt(attempt - 1);
                    warn!(
                        "{} failed ({:?}), attempt {}/{}, retrying in {:?}: {}",
                        label, class, attempt, self.max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
