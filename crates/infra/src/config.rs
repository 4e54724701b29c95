//! Configuration loading and representation.
//!
//! Values come from `KITROOM_*` environment variables (nested keys use `__`),
//! layered over the defaults below.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kitroom_checkout::DEFAULT_LOAN_DAYS;
pub use kitroom_observability::LogFormat;

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
/// Longest configurable default loan period (ten years).
pub const MAX_LOAN_DAYS: i64 = 3650;
pub const MAX_HISTORY_LIMIT: i64 = 500;

#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(String);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Postgres URL. When unset the service runs on the in-memory engine.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub db_pool_size: u32,
    #[serde(default = "default_max_overflow")]
    pub db_max_overflow: u32,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Comma-separated whitelist of locations; empty disables the check.
    #[serde(default)]
    pub locations: String,
    /// Comma-separated list of allowed CORS origins.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "default_loan_days")]
    pub default_loan_days: i64,
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_pool_size: default_pool_size(),
            db_max_overflow: default_max_overflow(),
            bind_addr: default_bind_addr(),
            locations: String::new(),
            cors_origins: default_cors_origins(),
            log_format: LogFormat::default(),
            default_loan_days: default_loan_days(),
            history_limit: default_history_limit(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(environment())
    }

    /// Load from an explicit source (tests pass a pre-filled environment map).
    pub fn from_source<S>(source: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(source)
            .build()
            .map_err(|e| ConfigError(format!("failed to build config: {e}")))?;

        let cfg: AppConfig = config
            .try_deserialize()
            .map_err(|e| ConfigError(format!("failed to deserialize config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.db_pool_size == 0 {
            return Err(ConfigError("db_pool_size must be at least 1".into()));
        }
        if !(1..=MAX_LOAN_DAYS).contains(&self.default_loan_days) {
            return Err(ConfigError(format!(
                "default_loan_days must be between 1 and {MAX_LOAN_DAYS}"
            )));
        }
        Ok(())
    }

    /// Pool ceiling: the base size plus the allowed overflow.
    pub fn max_connections(&self) -> u32 {
        self.db_pool_size.saturating_add(self.db_max_overflow)
    }

    pub fn location_whitelist(&self) -> Vec<String> {
        split_list(&self.locations)
    }

    pub fn cors_origin_list(&self) -> Vec<String> {
        split_list(&self.cors_origins)
    }

    /// Default history page size, clamped to the accepted range.
    pub fn history_limit(&self) -> i64 {
        clamp_history_limit(Some(self.history_limit))
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("KITROOM")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Apply the history page bounds: missing → 50, otherwise within 1..=500.
pub fn clamp_history_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_pool_size() -> u32 {
    5
}

fn default_max_overflow() -> u32 {
    10
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_cors_origins() -> String {
    "http://localhost:3000,http://localhost:3001".to_string()
}

fn default_loan_days() -> i64 {
    DEFAULT_LOAN_DAYS
}

fn default_history_limit() -> i64 {
    DEFAULT_HISTORY_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let cfg = AppConfig::from_source(env(&[])).unwrap();
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.max_connections(), 15);
        assert_eq!(cfg.bind_addr, "127.0.0.1:8000");
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.default_loan_days, 7);
        assert!(cfg.location_whitelist().is_empty());
        assert_eq!(cfg.cors_origin_list().len(), 2);
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = AppConfig::from_source(env(&[
            ("KITROOM_DATABASE_URL", "postgres://kit:pw@db/kitroom"),
            ("KITROOM_DB_POOL_SIZE", "8"),
            ("KITROOM_LOCATIONS", "san_jose, 2u ,3k"),
            ("KITROOM_LOG_FORMAT", "pretty"),
        ]))
        .unwrap();

        assert_eq!(cfg.database_url.as_deref(), Some("postgres://kit:pw@db/kitroom"));
        assert_eq!(cfg.max_connections(), 18);
        assert_eq!(cfg.location_whitelist(), vec!["san_jose", "2u", "3k"]);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        assert!(AppConfig::from_source(env(&[("KITROOM_DB_POOL_SIZE", "0")])).is_err());
    }

    #[test]
    fn loan_days_must_stay_within_bounds() {
        assert!(AppConfig::from_source(env(&[("KITROOM_DEFAULT_LOAN_DAYS", "0")])).is_err());
        assert!(
            AppConfig::from_source(env(&[("KITROOM_DEFAULT_LOAN_DAYS", "100000000000000")]))
                .is_err()
        );
        let cfg = AppConfig::from_source(env(&[("KITROOM_DEFAULT_LOAN_DAYS", "3650")])).unwrap();
        assert_eq!(cfg.default_loan_days, MAX_LOAN_DAYS);
    }

    #[test]
    fn history_limit_is_clamped() {
        assert_eq!(clamp_history_limit(None), 50);
        assert_eq!(clamp_history_limit(Some(0)), 1);
        assert_eq!(clamp_history_limit(Some(10_000)), 500);
        assert_eq!(clamp_history_limit(Some(20)), 20);
    }
}
