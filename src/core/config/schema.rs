//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order of precedence:
//! 1. `$FLOW_HEALTH_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/flow-health/config.toml`
//! 3. `~/.flow-health/config.toml`
//!
//! # Validation
//!
//! Config values are validated after parsing so that a bad file fails the
//! run up front instead of turning every forge call into an absent result.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::RepoSlug;

/// Analyzer configuration.
///
/// Every field has a default matching the dotnet codeflow setup, so an
/// empty file (or no file) is a valid configuration.
///
/// # Example
///
/// ```toml
/// gh_path = "/usr/local/bin/gh"
/// vmr_repository = "dotnet/dotnet"
/// merged_retries = 5
/// retry_delay_ms = 2000
///
/// [timeouts]
/// list_secs = 30
/// detail_secs = 90
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FlowHealthConfig {
    /// Forge CLI executable.
    pub gh_path: String,

    /// Search qualifier identifying the codeflow bot as PR author.
    pub bot_author: String,

    /// Login prefix identifying bot comments.
    pub bot_login_prefix: String,

    /// The companion (VMR) repository.
    pub vmr_repository: String,

    /// Phrase every codeflow PR title carries before the source repository.
    pub title_marker: String,

    /// Result limits for the PR searches.
    pub limits: SearchLimits,

    /// Max attempts for the merged-PR search.
    pub merged_retries: u32,

    /// Fixed delay between merged-PR search attempts.
    pub retry_delay_ms: u64,

    /// Age after which a diverged preview branch counts as released.
    pub released_preview_days: i64,

    /// Per-call process timeouts.
    pub timeouts: Timeouts,
}

impl Default for FlowHealthConfig {
    fn default() -> Self {
        Self {
            gh_path: "gh".to_string(),
            bot_author: "app/dotnet-maestro".to_string(),
            bot_login_prefix: "dotnet-maestro".to_string(),
            vmr_repository: "dotnet/dotnet".to_string(),
            title_marker: "Source code updates from".to_string(),
            limits: SearchLimits::default(),
            merged_retries: 3,
            retry_delay_ms: 1000,
            released_preview_days: 14,
            timeouts: Timeouts::default(),
        }
    }
}

impl FlowHealthConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gh_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue("gh_path cannot be empty".into()));
        }

        if RepoSlug::new(self.vmr_repository.as_str()).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "vmr_repository '{}' is not <owner/repo>",
                self.vmr_repository
            )));
        }

        if self.merged_retries == 0 {
            return Err(ConfigError::InvalidValue(
                "merged_retries must be at least 1".into(),
            ));
        }

        self.preview_threshold()?;
        self.limits.validate()?;
        self.timeouts.validate()?;

        Ok(())
    }

    /// The VMR repository as a validated slug.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the configured value is malformed.
    pub fn vmr(&self) -> Result<RepoSlug, ConfigError> {
        RepoSlug::new(self.vmr_repository.as_str())
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    /// Merge age after which a `preview` branch counts as released.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `released_preview_days` is
    /// negative or too large to represent as a duration.
    pub fn preview_threshold(&self) -> Result<chrono::Duration, ConfigError> {
        if self.released_preview_days < 0 {
            return Err(ConfigError::InvalidValue(
                "released_preview_days cannot be negative".into(),
            ));
        }
        chrono::Duration::try_days(self.released_preview_days).ok_or_else(|| {
            ConfigError::InvalidValue(format!(
                "released_preview_days {} is out of range",
                self.released_preview_days
            ))
        })
    }

    /// Title phrase marking backflow PRs, e.g. `Source code updates from dotnet/dotnet`.
    pub fn backflow_marker(&self) -> String {
        format!("{} {}", self.title_marker, self.vmr_repository)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Result limits for `pr list` searches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SearchLimits {
    pub open: u32,
    pub merged: u32,
    pub forward: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            open: 100,
            merged: 30,
            forward: 10,
        }
    }
}

impl SearchLimits {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.open == 0 || self.merged == 0 || self.forward == 0 {
            return Err(ConfigError::InvalidValue(
                "search limits must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Per-call timeouts for forge process invocations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    /// Listing and body calls.
    pub list_secs: u64,
    /// PR health and REST API calls.
    pub detail_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            list_secs: 30,
            detail_secs: 60,
        }
    }
}

impl Timeouts {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.list_secs == 0 || self.detail_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "timeouts must be at least 1 second".into(),
            ));
        }
        Ok(())
    }

    pub fn list(&self) -> Duration {
        Duration::from_secs(self.list_secs)
    }

    pub fn detail(&self) -> Duration {
        Duration::from_secs(self.detail_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = FlowHealthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.merged_retries, 3);
        assert_eq!(config.retry_delay(), Duration::from_millis(1000));
        assert_eq!(config.timeouts.list(), Duration::from_secs(30));
        assert_eq!(config.timeouts.detail(), Duration::from_secs(60));
        assert_eq!(config.released_preview_days, 14);
    }

    #[test]
    fn preview_threshold_in_days() {
        let config = FlowHealthConfig {
            released_preview_days: 30,
            ..Default::default()
        };
        assert_eq!(
            config.preview_threshold().unwrap(),
            chrono::Duration::days(30)
        );
    }

    #[test]
    fn rejects_negative_preview_days() {
        let config = FlowHealthConfig {
            released_preview_days: -1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(msg)) if msg.contains("negative")
        ));
    }

    #[test]
    fn rejects_unrepresentable_preview_days() {
        let config = FlowHealthConfig {
            released_preview_days: 200_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(msg)) if msg.contains("out of range")
        ));
        assert!(config.preview_threshold().is_err());
    }

    #[test]
    fn backflow_marker_includes_vmr() {
        let config = FlowHealthConfig::default();
        assert_eq!(
            config.backflow_marker(),
            "Source code updates from dotnet/dotnet"
        );
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: FlowHealthConfig = toml::from_str("").unwrap();
        assert_eq!(config, FlowHealthConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config: FlowHealthConfig = toml::from_str(
            r#"
            merged_retries = 5
            vmr_repository = "contoso/vmr"

            [timeouts]
            detail_secs = 90
            "#,
        )
        .unwrap();
        assert_eq!(config.merged_retries, 5);
        assert_eq!(config.vmr_repository, "contoso/vmr");
        assert_eq!(config.timeouts.detail_secs, 90);
        assert_eq!(config.timeouts.list_secs, 30);
        assert_eq!(config.limits, SearchLimits::default());
    }

    #[test]
    fn unknown_field_rejected() {
        let result: Result<FlowHealthConfig, _> = toml::from_str("colour = true");
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = FlowHealthConfig {
            merged_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = FlowHealthConfig {
            vmr_repository: "dotnet".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = FlowHealthConfig::default();
        config.timeouts.detail_secs = 0;
        assert!(config.validate().is_err());

        config = FlowHealthConfig::default();
        config.limits.forward = 0;
        assert!(config.validate().is_err());

        config = FlowHealthConfig {
            gh_path: "  ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
