use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::interpreter::Limits;
use crate::transform::TransformOptions;

/// Engine settings a host can load from TOML.
///
/// ```toml
/// step-budget = 500000
/// max-call-depth = 64
/// cache-capacity = 16
///
/// [transform]
/// jsx-runtime = "preact"
/// max-nesting = 48
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct EngineConfig {
    /// Evaluation steps allowed per load and per render.
    pub step_budget: u64,
    pub max_call_depth: usize,
    /// Cached modules kept before the least recently used one is evicted;
    /// `None` keeps every module.
    pub cache_capacity: Option<usize>,
    pub transform: TransformOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            step_budget: limits.step_budget,
            max_call_depth: limits.max_call_depth,
            cache_capacity: Some(64),
            transform: TransformOptions::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_budget == 0 {
            return Err(ConfigError::ZeroLimit { field: "step-budget" });
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max-call-depth",
            });
        }
        if self.transform.max_nesting == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "transform.max-nesting",
            });
        }
        if self.cache_capacity == Some(0) {
            return Err(ConfigError::ZeroLimit {
                field: "cache-capacity",
            });
        }
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            step_budget: self.step_budget,
            max_call_depth: self.max_call_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str("step-budget = 500\n").unwrap();
        assert_eq!(config.step_budget, 500);
        assert_eq!(config.max_call_depth, 128);
        assert_eq!(config.cache_capacity, Some(64));
        assert_eq!(config.transform.jsx_runtime, "react");
    }

    #[test]
    fn nested_transform_table() {
        let config: EngineConfig = toml::from_str(
            r#"
            cache-capacity = 2

            [transform]
            jsx-runtime = "preact"
            max-nesting = 48
            "#,
        )
        .unwrap();
        assert_eq!(config.cache_capacity, Some(2));
        assert_eq!(config.transform.jsx_runtime, "preact");
        assert_eq!(config.transform.max_nesting, 48);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<EngineConfig>("step_budget = 1\n").is_err());
    }

    #[test]
    fn zero_limits_are_invalid() {
        let config = EngineConfig {
            max_call_depth: 0,
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroLimit {
                field: "max-call-depth"
            })
        );
        let config = EngineConfig {
            cache_capacity: Some(0),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
        let mut config = EngineConfig::default();
        config.transform.max_nesting = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroLimit {
                field: "transform.max-nesting"
            })
        );
        let config = EngineConfig {
            cache_capacity: None,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
