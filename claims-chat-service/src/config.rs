//! Service configuration from environment variables.
//!
//! A `.env` file in the working directory is loaded first when present.

use std::time::Duration;

use claim_flow::{Timeouts, llm::DEFAULT_MODEL};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a whole number of milliseconds, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub log_format: String,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
    pub normalizer_timeout: Duration,
    pub policy_lookup_timeout: Duration,
    pub claims_dir: String,
    pub database_url: Option<String>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let millis = |key: &'static str, default: u64| -> Result<Duration, ConfigError> {
            match get(key) {
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| ConfigError::InvalidNumber { key, value }),
                None => Ok(Duration::from_millis(default)),
            }
        };

        Ok(Self {
            bind_addr: or("BIND_ADDR", "0.0.0.0:3000"),
            log_format: or("LOG_FORMAT", "json"),
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            openrouter_model: or("OPENROUTER_MODEL", DEFAULT_MODEL),
            normalizer_timeout: millis("NORMALIZER_TIMEOUT_MS", 8000)?,
            policy_lookup_timeout: millis("POLICY_LOOKUP_TIMEOUT_MS", 2000)?,
            claims_dir: or("CLAIMS_DIR", "data"),
            database_url: get("DATABASE_URL"),
        })
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            normalizer: self.normalizer_timeout,
            policy_lookup: self.policy_lookup_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.log_format, "json");
        assert_eq!(config.openrouter_api_key, None);
        assert_eq!(config.openrouter_model, "openai/gpt-4o-mini");
        assert_eq!(config.timeouts().normalizer, Duration::from_secs(8));
        assert_eq!(config.timeouts().policy_lookup, Duration::from_secs(2));
        assert_eq!(config.claims_dir, "data");
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("OPENROUTER_API_KEY", "sk-test"),
            ("NORMALIZER_TIMEOUT_MS", "1500"),
            ("DATABASE_URL", "  "),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.openrouter_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.normalizer_timeout, Duration::from_millis(1500));
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn test_invalid_timeout() {
        let err = config(&[("POLICY_LOOKUP_TIMEOUT_MS", "soon")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                key: "POLICY_LOOKUP_TIMEOUT_MS",
                value: "soon".to_string()
            }
        );
    }
}
