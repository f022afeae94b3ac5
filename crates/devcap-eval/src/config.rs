//! Evaluator configuration.
//!
//! Defaults suit interactive use. Override via environment variables or a
//! YAML/JSON document deserialized into [`EvaluatorConfig`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What to do when two declarations of one member cannot be merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Roll back the whole contribution of the conflicting block.
    Strict,
    /// Drop the conflicting member and keep going.
    #[default]
    Lenient,
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("expected strict or lenient, got {other:?}")),
        }
    }
}

/// Evaluator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluatorConfig {
    pub merge_policy: MergePolicy,
    /// Largest reported queue-family count the assignment search accepts.
    /// The search is factorial in this count.
    pub max_queue_family_search: usize,
    /// Let simulation synthesize video profiles the target does not report.
    pub synthesize_video_profiles: bool,
    /// Evaluate optional slots (reported as warnings).
    pub evaluate_optionals: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::Lenient,
            max_queue_family_search: 8,
            synthesize_video_profiles: true,
            evaluate_optionals: true,
        }
    }
}

impl EvaluatorConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `DEVCAP_MERGE_POLICY` (`strict` | `lenient`, default: `lenient`)
    /// - `DEVCAP_MAX_QUEUE_FAMILY_SEARCH` (default: 8)
    /// - `DEVCAP_SYNTHESIZE_VIDEO` (default: true)
    /// - `DEVCAP_EVALUATE_OPTIONALS` (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("DEVCAP_MERGE_POLICY") {
            config.merge_policy = raw
                .parse::<MergePolicy>()
                .map_err(|reason| ConfigError::invalid("DEVCAP_MERGE_POLICY", &raw, reason))?;
        }
        if let Some(raw) = lookup("DEVCAP_MAX_QUEUE_FAMILY_SEARCH") {
            config.max_queue_family_search = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::invalid("DEVCAP_MAX_QUEUE_FAMILY_SEARCH", &raw, e.to_string())
            })?;
        }
        if let Some(raw) = lookup("DEVCAP_SYNTHESIZE_VIDEO") {
            config.synthesize_video_profiles = parse_bool("DEVCAP_SYNTHESIZE_VIDEO", &raw)?;
        }
        if let Some(raw) = lookup("DEVCAP_EVALUATE_OPTIONALS") {
            config.evaluate_optionals = parse_bool("DEVCAP_EVALUATE_OPTIONALS", &raw)?;
        }
        Ok(config)
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(var, raw, "expected a boolean".into())),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &str, value: &str, reason: String) -> Self {
        Self::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
            reason,
        }
    }
}
