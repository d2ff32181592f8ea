//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{Result, TurnstileError};

/// Top-level configuration for a Turnstile deployment.
///
/// A deployment declares its named limiters in one place so they can all be
/// created at process startup, plus the cadence of the shared eviction sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Interval between eviction sweeps, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Named limiter instances to create at startup
    #[serde(default)]
    pub limiters: Vec<LimiterConfig>,
}

impl Default for TurnstileConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            limiters: Vec::new(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    600
}

impl TurnstileConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TurnstileConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the whole deployment configuration.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 {
            return Err(TurnstileError::Config(
                "sweep_interval_secs must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for limiter in &self.limiters {
            limiter.validate()?;
            if !seen.insert(limiter.key_prefix.as_str()) {
                return Err(TurnstileError::Config(format!(
                    "duplicate limiter key_prefix \"{}\"",
                    limiter.key_prefix
                )));
            }
        }

        Ok(())
    }

    /// Get the sweep interval as a [`Duration`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Configuration for a single named limiter instance.
///
/// Immutable for the lifetime of the instance it creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Unique name distinguishing this limiter from others sharing the sweep
    pub key_prefix: String,

    /// Length of the counting window, in milliseconds
    pub window_ms: u64,

    /// Maximum requests allowed per key within one window
    pub max_requests: u64,

    /// Message returned to rejected callers
    pub message: String,
}

impl LimiterConfig {
    /// Create a new limiter configuration.
    pub fn new(
        key_prefix: impl Into<String>,
        window_ms: u64,
        max_requests: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            window_ms,
            max_requests,
            message: message.into(),
        }
    }

    /// Validate this limiter's configuration.
    ///
    /// A zero window or quota would disable limiting entirely, so both are
    /// rejected rather than defaulted.
    pub fn validate(&self) -> Result<()> {
        if self.key_prefix.is_empty() {
            return Err(TurnstileError::Config(
                "limiter key_prefix must not be empty".to_string(),
            ));
        }
        if self.window_ms == 0 {
            return Err(TurnstileError::Config(format!(
                "window_ms must be positive for limiter \"{}\"",
                self.key_prefix
            )));
        }
        if self.max_requests == 0 {
            return Err(TurnstileError::Config(format!(
                "max_requests must be positive for limiter \"{}\"",
                self.key_prefix
            )));
        }
        Ok(())
    }

    /// Get the counting window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}
