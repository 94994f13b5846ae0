//! Loader configuration.
//!
//! Retry and batch parameters live in an explicit [`LoadConfig`]
//! passed into the Loader at construction, never in process-global
//! state. `from_env` reads the standard variables (a `.env` file is
//! honored via dotenvy), `from_vars` takes any lookup function so
//! tests can inject values without touching the process environment.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable names.
const VAR_URL: &str = "FEATURESTORE_URL";
const VAR_KEY: &str = "FEATURESTORE_KEY";
const VAR_BATCH_SIZE: &str = "LOAD_BATCH_SIZE";
const VAR_MAX_RETRIES: &str = "LOAD_MAX_RETRIES";
const VAR_BACKOFF_MS: &str = "LOAD_BACKOFF_MS";
const VAR_CONCURRENCY: &str = "LOAD_CONCURRENCY";

/// Defaults matching the store's sensible limits.
const DEFAULT_BATCH_SIZE: usize = 200;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Configuration for one Loader instance.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Base URL of the external table store.
    pub url: String,
    /// API key / auth credential.
    pub key: String,
    /// Maximum rows per batch write.
    pub batch_size: usize,
    /// Retries per batch after the first attempt.
    pub max_retries: u32,
    /// Base backoff; doubled after each failed attempt.
    pub backoff: Duration,
    /// Maximum in-flight batch writes. 1 means strictly ordered
    /// sequential loading (the default); anything higher is an
    /// explicit opt-in that gives up cross-batch commit ordering.
    pub concurrency: usize,
}

impl LoadConfig {
    /// Config with explicit connection target and defaults elsewhere.
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            concurrency: 1,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Read the configuration from the process environment, honoring
    /// a `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|var| env::var(var).ok())
    }

    /// Read the configuration through an arbitrary lookup function.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(VAR_URL).ok_or_else(|| ConfigError::MissingVar(VAR_URL.into()))?;
        let key = lookup(VAR_KEY).ok_or_else(|| ConfigError::MissingVar(VAR_KEY.into()))?;

        let mut config = Self::new(url, key);
        if let Some(raw) = lookup(VAR_BATCH_SIZE) {
            config.batch_size = parse_var(VAR_BATCH_SIZE, &raw)?;
            if config.batch_size == 0 {
                return Err(ConfigError::InvalidVar {
                    var: VAR_BATCH_SIZE.into(),
                    value: raw,
                });
            }
        }
        if let Some(raw) = lookup(VAR_MAX_RETRIES) {
            config.max_retries = parse_var(VAR_MAX_RETRIES, &raw)?;
        }
        if let Some(raw) = lookup(VAR_BACKOFF_MS) {
            config.backoff = Duration::from_millis(parse_var(VAR_BACKOFF_MS, &raw)?);
        }
        if let Some(raw) = lookup(VAR_CONCURRENCY) {
            let concurrency: usize = parse_var(VAR_CONCURRENCY, &raw)?;
            config.concurrency = concurrency.max(1);
        }
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidVar {
        var: var.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let env = vars(&[
            ("FEATURESTORE_URL", "https://example.test"),
            ("FEATURESTORE_KEY", "secret"),
        ]);
        let config = LoadConfig::from_vars(|v| env.get(v).cloned()).unwrap();
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff, Duration::from_millis(1000));
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_overrides() {
        let env = vars(&[
            ("FEATURESTORE_URL", "https://example.test"),
            ("FEATURESTORE_KEY", "secret"),
            ("LOAD_BATCH_SIZE", "100"),
            ("LOAD_MAX_RETRIES", "5"),
            ("LOAD_BACKOFF_MS", "250"),
            ("LOAD_CONCURRENCY", "4"),
        ]);
        let config = LoadConfig::from_vars(|v| env.get(v).cloned()).unwrap();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff, Duration::from_millis(250));
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_missing_url() {
        let env = vars(&[("FEATURESTORE_KEY", "secret")]);
        let err = LoadConfig::from_vars(|v| env.get(v).cloned()).unwrap_err();
        assert!(err.to_string().contains("FEATURESTORE_URL"));
    }

    #[test]
    fn test_invalid_batch_size() {
        let env = vars(&[
            ("FEATURESTORE_URL", "https://example.test"),
            ("FEATURESTORE_KEY", "secret"),
            ("LOAD_BATCH_SIZE", "zero"),
        ]);
        assert!(LoadConfig::from_vars(|v| env.get(v).cloned()).is_err());

        let env = vars(&[
            ("FEATURESTORE_URL", "https://example.test"),
            ("FEATURESTORE_KEY", "secret"),
            ("LOAD_BATCH_SIZE", "0"),
        ]);
        assert!(LoadConfig::from_vars(|v| env.get(v).cloned()).is_err());
    }
}
