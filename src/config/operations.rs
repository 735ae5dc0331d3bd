//! Config loading, environment overrides, and validation.

use super::model::Config;
use crate::error::{Result, SeqError};
use std::path::{Path, PathBuf};

/// Environment variable names read by [`Config::apply_env`].
pub(crate) const ENV_SEQUENTIAL: &str = "SEQSPEAK_SEQUENTIAL";
pub(crate) const ENV_LOCK_DIR: &str = "SEQSPEAK_LOCK_DIR";
pub(crate) const ENV_STALE_GRACE_SECS: &str = "SEQSPEAK_STALE_GRACE_SECS";
pub(crate) const ENV_MAX_REGISTRATIONS: &str = "SEQSPEAK_MAX_REGISTRATIONS";

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            SeqError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| SeqError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Resolve the effective config: optional file, then environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SEQSPEAK_*` environment overrides on top of the current values.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(value) = env_var(ENV_SEQUENTIAL) {
            self.sequential = parse_bool(ENV_SEQUENTIAL, &value)?;
        }
        if let Some(value) = env_var(ENV_LOCK_DIR) {
            self.lock_dir = PathBuf::from(value);
        }
        if let Some(value) = env_var(ENV_STALE_GRACE_SECS) {
            self.stale_grace_secs = parse_number(ENV_STALE_GRACE_SECS, &value)?;
        }
        if let Some(value) = env_var(ENV_MAX_REGISTRATIONS) {
            self.max_registrations = parse_number(ENV_MAX_REGISTRATIONS, &value)?;
        }
        Ok(())
    }

    /// Validate config values and return error on invalid values.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("stale_grace_secs", self.stale_grace_secs == 0),
            ("max_registrations", self.max_registrations == 0),
            ("registration_ttl_secs", self.registration_ttl_secs == 0),
            ("max_id_len", self.max_id_len == 0),
            ("max_reason_len", self.max_reason_len == 0),
        ];
        for (name, is_zero) in positive {
            if is_zero {
                return Err(SeqError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.retry_jitter_min_ms > self.retry_jitter_max_ms {
            return Err(SeqError::Config(format!(
                "retry_jitter_min_ms ({}) must not exceed retry_jitter_max_ms ({})",
                self.retry_jitter_min_ms, self.retry_jitter_max_ms
            )));
        }

        if self.lock_dir.as_os_str().is_empty() {
            return Err(SeqError::Config("lock_dir must not be empty".to_string()));
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SeqError::Config(format!(
            "{} must be a boolean (got '{}')",
            name, other
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        SeqError::Config(format!(
            "{} must be a non-negative integer (got '{}')",
            name, value
        ))
    })
}
