// Environment configuration. Everything is read once at startup so a missing
// credential kills the process before any socket is bound, not on the first
// tool call.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth client credentials for the Google account (see `get-token`).
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Listen port for the proxy.
    pub port: u16,
    /// Upper bound on any single upstream request. One attempt, no retry.
    pub upstream_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: require("CLIENT_ID")?,
            client_secret: require("CLIENT_SECRET")?,
            refresh_token: require("REFRESH_TOKEN")?,
            port: parse_or_default("PORT", DEFAULT_PORT)?,
            upstream_timeout: Duration::from_secs(parse_or_default(
                "UPSTREAM_TIMEOUT_SECS",
                DEFAULT_UPSTREAM_TIMEOUT_SECS,
            )?),
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

fn parse_or_default<T: std::str::FromStr>(
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}
