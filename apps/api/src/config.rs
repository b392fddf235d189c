use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub tailor_webhook_url: String,
    pub tailor_timeout: Duration,
    pub progress_tick: Duration,
    pub preview_grace: Duration,
    pub steps_file: Option<PathBuf>,
    pub resume_cache_clear: Duration,
    pub session_idle: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let progress_tick = Duration::from_millis(parse_env("PROGRESS_TICK_MS", 100)?);
        validate_tick(progress_tick)?;

        Ok(Config {
            tailor_webhook_url: require_env("TAILOR_WEBHOOK_URL")?,
            tailor_timeout: Duration::from_secs(parse_env("TAILOR_TIMEOUT_SECS", 180)?),
            progress_tick,
            preview_grace: Duration::from_millis(parse_env("PREVIEW_GRACE_MS", 600)?),
            steps_file: std::env::var("PROGRESS_STEPS_FILE").ok().map(PathBuf::from),
            resume_cache_clear: Duration::from_secs(parse_env("RESUME_CACHE_CLEAR_SECS", 1800)?),
            session_idle: Duration::from_secs(parse_env("SESSION_IDLE_SECS", 1800)?),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(raw) => parse_number(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'"))
}

/// Tick granularity must stay within 1..=200ms.
fn validate_tick(tick: Duration) -> Result<()> {
    if tick.is_zero() || tick > Duration::from_millis(200) {
        bail!(
            "PROGRESS_TICK_MS must be between 1 and 200, got {}",
            tick.as_millis()
        );
    }
    Ok(())
}
