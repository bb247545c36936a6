//! Evacuation configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Holds raw evacuation config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
struct RawEvacuationConfig {
    pub poll_interval: Option<f64>,
    pub wait_timeout: Option<f64>,
    pub on_shared_storage: Option<bool>,
    pub placement: Option<String>,
    pub target_host_pattern: Option<String>,
    pub compute_services: Option<Vec<String>>,
    pub unreachable_is_down: Option<bool>,
}

/// Represents evacuation configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct EvacuationConfig {
    /// Period in seconds between two checks of the evacuated VM status.
    pub poll_interval: f64,
    /// Time in seconds to wait for an evacuated VM to become active.
    pub wait_timeout: f64,
    /// Whether the disks of VMs reside on storage shared between hosts.
    pub on_shared_storage: bool,
    /// Algorithm choosing among suitable hosts, e.g. `FirstFit` or `RandomFit[seed=42]`.
    pub placement: String,
    /// Regular expression a host name must match (from its start) to be used as evacuation target.
    pub target_host_pattern: Option<String>,
    /// Services that must be reported down on the failed host before evacuation.
    pub compute_services: Vec<String>,
    /// Whether an unreachable host is treated the same way as a down host.
    pub unreachable_is_down: bool,
}

impl Default for EvacuationConfig {
    fn default() -> Self {
        Self::from_raw(RawEvacuationConfig::default())
    }
}

impl EvacuationConfig {
    /// Creates evacuation config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Read {
            path: file_name.to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawEvacuationConfig = serde_yaml::from_str(content)?;
        let config = Self::from_raw(raw);
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawEvacuationConfig) -> Self {
        Self {
            poll_interval: raw.poll_interval.unwrap_or(3.),
            wait_timeout: raw.wait_timeout.unwrap_or(10.),
            on_shared_storage: raw.on_shared_storage.unwrap_or(true),
            placement: raw.placement.unwrap_or_else(|| "FirstFit".to_string()),
            target_host_pattern: raw.target_host_pattern,
            compute_services: raw
                .compute_services
                .unwrap_or_else(|| vec!["nova-compute".to_string()]),
            unreachable_is_down: raw.unreachable_is_down.unwrap_or(false),
        }
    }

    /// Checks the values which can't be checked by the parser.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry_policy()?;
        Ok(())
    }

    /// Returns the policy of waiting for an evacuated VM.
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        if !(self.poll_interval > 0.) || !self.poll_interval.is_finite() {
            return Err(ConfigError::InvalidValue {
                name: "poll_interval",
                value: self.poll_interval.to_string(),
            });
        }
        if !(self.wait_timeout >= 0.) || !self.wait_timeout.is_finite() {
            return Err(ConfigError::InvalidValue {
                name: "wait_timeout",
                value: self.wait_timeout.to_string(),
            });
        }
        Ok(RetryPolicy::new(self.poll_interval, self.wait_timeout))
    }
}

/// Parses config value string, which consists of two parts - name and options.
/// Example: `RandomFit[seed=42]` parts are name `RandomFit` and options string `seed=42`.
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.split_once('[') {
        Some((l, r)) => (l.trim().to_string(), Some(r.trim_end().trim_end_matches(']').to_string())),
        None => (config_str.trim().to_string(), None),
    }
}

/// Parses options string from config value, returns map with option names and values.
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    options_str
        .split(',')
        .filter_map(|option| option.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EvacuationConfig::default();
        assert_eq!(config.poll_interval, 3.);
        assert_eq!(config.wait_timeout, 10.);
        assert!(config.on_shared_storage);
        assert_eq!(config.placement, "FirstFit");
        assert_eq!(config.target_host_pattern, None);
        assert_eq!(config.compute_services, vec!["nova-compute".to_string()]);
        assert!(!config.unreachable_is_down);
    }

    #[test]
    fn test_partial_yaml() {
        let config = EvacuationConfig::from_yaml_str("wait_timeout: 60\nplacement: RandomFit[seed=7]\n").unwrap();
        assert_eq!(config.wait_timeout, 60.);
        assert_eq!(config.poll_interval, 3.);
        assert_eq!(config.placement, "RandomFit[seed=7]");
    }

    #[test]
    fn test_invalid_interval() {
        let err = EvacuationConfig::from_yaml_str("poll_interval: 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "poll_interval", .. }));
    }

    #[test]
    fn test_unknown_field() {
        assert!(matches!(
            EvacuationConfig::from_yaml_str("poll_intervall: 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_config_value() {
        assert_eq!(parse_config_value("FirstFit"), ("FirstFit".to_string(), None));
        assert_eq!(
            parse_config_value("RandomFit[seed=42]"),
            ("RandomFit".to_string(), Some("seed=42".to_string()))
        );
    }

    #[test]
    fn test_parse_options() {
        let options = parse_options("option1=0.8, option2=something");
        assert_eq!(options.get("option1").unwrap(), "0.8");
        assert_eq!(options.get("option2").unwrap(), "something");
        assert_eq!(options.get("option3"), None);
    }
}
