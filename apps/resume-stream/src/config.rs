use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_EXTRACTION_URL: &str = "http://localhost:8000/parse-resume";

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed numbers are a startup error.
#[derive(Debug, Clone)]
pub struct Config {
    pub extraction_url: String,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Config {
            extraction_url: lookup("EXTRACTION_URL")
                .unwrap_or_else(|| DEFAULT_EXTRACTION_URL.to_string()),
            connect_timeout: Duration::from_secs(
                lookup("EXTRACTION_CONNECT_TIMEOUT_SECS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse::<u64>()
                    .context("EXTRACTION_CONNECT_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            max_retries: lookup("EXTRACTION_MAX_RETRIES")
                .unwrap_or_else(|| "3".to_string())
                .parse::<u32>()
                .context("EXTRACTION_MAX_RETRIES must be a non-negative integer")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}
