//! Settings loaded from the environment (after `.env` is applied).

use std::time::Duration;

use groupvault_core::errors::{Error, Result};
use groupvault_core::sync::DEFAULT_BATCH_SIZE;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_RATE_LIMIT_CALLS: usize = 100;
const DEFAULT_RATE_LIMIT_PERIOD_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: usize = 3;

#[derive(Debug, Clone)]
pub struct Settings {
    pub access_token: String,
    pub data_dir: String,
    pub api_base_url: Option<String>,
    pub rate_limit_calls: usize,
    pub rate_limit_period: Duration,
    pub batch_size: usize,
    pub max_retries: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let access_token = std::env::var("GROUPME_ACCESS_TOKEN").map_err(|_| {
            Error::Config(
                "GROUPME_ACCESS_TOKEN is not set. Put it in .env or the environment.".to_string(),
            )
        })?;

        Ok(Settings {
            access_token,
            data_dir: std::env::var("GROUPVAULT_DATA_DIR")
                .unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()),
            api_base_url: std::env::var("GROUPME_API_BASE_URL").ok(),
            rate_limit_calls: parse_env("GROUPME_RATE_LIMIT_CALLS", DEFAULT_RATE_LIMIT_CALLS)?,
            rate_limit_period: Duration::from_secs(parse_env(
                "GROUPME_RATE_LIMIT_PERIOD",
                DEFAULT_RATE_LIMIT_PERIOD_SECS,
            )?),
            batch_size: parse_env("GROUPVAULT_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            max_retries: parse_env("GROUPVAULT_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
