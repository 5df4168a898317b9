use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

pub const MIN_POLL_SECS: u64 = 15;
pub const MAX_POLL_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub token: Option<String>,
    pub page_size: u32,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub dropdown_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_url: env::var("RWALENT_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            token: env::var("RWALENT_TOKEN").ok(),
            page_size: parse_or("NOTIFICATIONS_PAGE_SIZE", 10)?,
            poll_interval: poll_interval(parse_or("NOTIFICATIONS_POLL_SECS", 30)?),
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 10)?),
            dropdown_limit: parse_or("DROPDOWN_LIMIT", 5)?,
        })
    }
}

/// Keeps polling between 15 s and 120 s whatever was configured.
pub fn poll_interval(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_POLL_SECS, MAX_POLL_SECS))
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", key, value)),
        Err(_) => Ok(default),
    }
}
