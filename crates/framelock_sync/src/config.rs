//! # Sync Configuration
//!
//! Loaded once at session start from a TOML table:
//!
//! ```toml
//! barrier_timeout_ms = 1000
//! default_tolerance_us = 1000
//! default_fail_handling = "continue"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::policy::FailHandling;

/// Configuration of a sync coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Longest a participant waits at a barrier. `None` waits forever.
    pub barrier_timeout_ms: Option<u64>,
    /// Tolerance used when a request carries none.
    pub default_tolerance_us: i64,
    /// Fail handling used when a request carries none.
    pub default_fail_handling: FailHandling,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            barrier_timeout_ms: Some(1000),
            // One millisecond: well inside a 33ms frame at 30fps.
            default_tolerance_us: 1000,
            default_fail_handling: FailHandling::Continue,
        }
    }
}

impl SyncConfig {
    /// Unbounded barrier waits. A participant that never arrives blocks its
    /// peers forever.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            barrier_timeout_ms: None,
            ..Self::default()
        }
    }

    /// Barrier timeout as a duration.
    #[must_use]
    pub fn barrier_timeout(&self) -> Option<Duration> {
        self.barrier_timeout_ms.map(Duration::from_millis)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `Config` on a decode error or a negative tolerance.
    pub fn from_toml_str(content: &str) -> SyncResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// `Config` if the file cannot be read or is invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// `Config` on a negative tolerance.
    pub fn validate(&self) -> SyncResult<()> {
        if self.default_tolerance_us < 0 {
            return Err(SyncError::Config(format!(
                "default_tolerance_us must not be negative, got {}",
                self.default_tolerance_us
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.barrier_timeout(), Some(Duration::from_secs(1)));
        assert_eq!(config.default_tolerance_us, 1000);
        assert_eq!(config.default_fail_handling, FailHandling::Continue);
        assert_eq!(SyncConfig::unbounded().barrier_timeout(), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SyncConfig::from_toml_str("default_fail_handling = \"drop\"\n").unwrap();
        assert_eq!(config.default_fail_handling, FailHandling::Drop);
        assert_eq!(config.barrier_timeout_ms, Some(1000));
    }

    #[test]
    fn test_unknown_fail_handling_is_rejected() {
        let err = SyncConfig::from_toml_str("default_fail_handling = \"retry\"\n").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_negative_tolerance_is_rejected() {
        let err = SyncConfig::from_toml_str("default_tolerance_us = -5\n").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = SyncConfig {
            barrier_timeout_ms: Some(250),
            default_tolerance_us: 80,
            default_fail_handling: FailHandling::Drop,
        };
        let text = toml::to_string(&config).unwrap();
        assert_eq!(SyncConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = SyncConfig::from_toml_file("/nonexistent/framelock.toml").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
