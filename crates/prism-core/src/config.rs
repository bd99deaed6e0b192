//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::error::{PrismError, Result};

fn default_max_rays() -> usize {
    8
}

fn default_initial_ray_count() -> usize {
    3
}

/// Configuration for one orchestration session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upper bound for the ray count; `set_ray_count` clamps to this.
    #[serde(default = "default_max_rays")]
    pub max_rays: usize,
    /// Number of idle rays a fresh session starts with.
    #[serde(default = "default_initial_ray_count")]
    pub initial_ray_count: usize,
    /// Model used by rays with no explicit binding and by fusions created
    /// before a target model is chosen.
    #[serde(default)]
    pub default_model: Option<String>,
    /// Whether scatter-pass completion may start an auto-runnable fusion
    /// automatically.
    #[serde(default)]
    pub auto_start_on_completion: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_rays: default_max_rays(),
            initial_ray_count: default_initial_ray_count(),
            default_model: None,
            auto_start_on_completion: false,
        }
    }
}

impl SessionConfig {
    /// Parses a configuration from a TOML document and validates it.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.max_rays == 0 {
            return Err(PrismError::config("max_rays must be at least 1"));
        }
        if self.initial_ray_count > self.max_rays {
            return Err(PrismError::config(format!(
                "initial_ray_count ({}) exceeds max_rays ({})",
                self.initial_ray_count, self.max_rays
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_rays, 8);
        assert_eq!(config.initial_ray_count, 3);
        assert!(!config.auto_start_on_completion);
    }

    #[test]
    fn test_from_toml_applies_defaults() {
        let config = SessionConfig::from_toml_str(
            r#"
            max_rays = 4
            auto_start_on_completion = true
            "#,
        )
        .unwrap();
        assert_eq!(config.max_rays, 4);
        assert_eq!(config.initial_ray_count, 3);
        assert!(config.auto_start_on_completion);
    }

    #[test]
    fn test_invalid_limits_are_rejected() {
        let err = SessionConfig::from_toml_str("max_rays = 0").unwrap_err();
        assert!(err.is_config());

        let err = SessionConfig::from_toml_str("max_rays = 2\ninitial_ray_count = 5").unwrap_err();
        assert!(err.is_config());
    }
}
