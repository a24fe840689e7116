//! Runtime configuration read from the environment.

use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

pub const API_BASE_URL_VAR: &str = "SKILLCOIN_API_BASE_URL";
pub const API_TOKEN_VAR: &str = "SKILLCOIN_API_TOKEN";
pub const TIMEOUT_MS_VAR: &str = "SKILLCOIN_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: invalid url '{value}': {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var}: expected a positive number of milliseconds, got '{value}'")]
    InvalidTimeout { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Remote authority; `None` means run against an in-memory authority.
    pub api_base_url: Option<Url>,
    /// Bearer token sent with every request.
    pub api_token: Option<String>,
    /// Transport timeout for a single authority round-trip.
    pub timeout: Duration,
}

impl Config {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let api_base_url = get(API_BASE_URL_VAR)
            .map(|value| parse_base_url(API_BASE_URL_VAR, value))
            .transpose()?;

        let timeout = match get(TIMEOUT_MS_VAR) {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        var: TIMEOUT_MS_VAR,
                        value,
                    });
                }
            },
            None => Self::DEFAULT_TIMEOUT,
        };

        Ok(Self {
            api_base_url,
            api_token: get(API_TOKEN_VAR),
            timeout,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

fn parse_base_url(var: &'static str, value: String) -> Result<Url, ConfigError> {
    match Url::parse(value.trim()) {
        Ok(url) if !url.cannot_be_a_base() => Ok(url),
        Ok(_) => Err(ConfigError::InvalidUrl {
            var,
            value,
            reason: "not a base url".into(),
        }),
        Err(err) => Err(ConfigError::InvalidUrl {
            var,
            value,
            reason: err.to_string(),
        }),
    }
}
