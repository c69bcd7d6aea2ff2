use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::sync::reconcile::RetentionPolicy;

/// What happens to a sample that reaches the flush before its user's
/// minimum write interval has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlySamplePolicy {
    /// Keep it in the pending slot until it is superseded or the interval elapses.
    #[default]
    Hold,
    /// Discard it; it is never retried.
    Drop,
}

/// Serialized form of [`RetentionPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetentionConfig {
    #[default]
    Sticky,
    Expire { after_ms: u64 },
}

impl From<RetentionConfig> for RetentionPolicy {
    fn from(config: RetentionConfig) -> Self {
        match config {
            RetentionConfig::Sticky => RetentionPolicy::Sticky,
            RetentionConfig::Expire { after_ms } => RetentionPolicy::Expire {
                after: Duration::from_millis(after_ms),
            },
        }
    }
}

/// Tuning for the throttle and reconcile paths.
///
/// Every field has a default, so a config file only needs the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Per-axis distance below which a local move is noise.
    pub noise_threshold: f32,
    /// Per-axis distance a remote avatar must move before it is re-applied.
    pub move_threshold: f32,
    /// Sample-and-hold window; one write at most per window across all users.
    pub flush_interval_ms: u64,
    /// Minimum time between two writes for the same (lobby, user).
    pub min_user_interval_ms: u64,
    pub early_samples: EarlySamplePolicy,
    pub retention: RetentionConfig,
    /// Wait before re-subscribing after a snapshot stream ends.
    pub resubscribe_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            noise_threshold: 0.1,
            move_threshold: 0.1,
            flush_interval_ms: 50,
            min_user_interval_ms: 100,
            early_samples: EarlySamplePolicy::Hold,
            retention: RetentionConfig::Sticky,
            resubscribe_delay_ms: 1_000,
        }
    }
}

impl SyncConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("noise_threshold", self.noise_threshold),
            ("move_threshold", self.move_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("flush_interval_ms", self.flush_interval_ms),
            ("min_user_interval_ms", self.min_user_interval_ms),
            ("resubscribe_delay_ms", self.resubscribe_delay_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
            }
        }
        if let RetentionConfig::Expire { after_ms: 0 } = self.retention {
            return Err(ConfigError::Invalid(
                "retention after_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn min_user_interval(&self) -> Duration {
        Duration::from_millis(self.min_user_interval_ms)
    }

    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_millis(self.resubscribe_delay_ms)
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        self.retention.into()
    }

    /// Aggregate write ceiling implied by the flush window.
    pub fn max_writes_per_second(&self) -> f64 {
        1_000.0 / self.flush_interval_ms as f64
    }
}
