// SPDX-License-Identifier: MIT OR Apache-2.0
//! Environment-driven configuration for the agent coordination hub.
//!
//! This crate provides [`HubConfig`] — the runtime settings governing
//! message/blob size caps, the polling guard, the done-gate confidence
//! floor, idempotency retention, namespace-advisory keywords, and logging —
//! together with [`HubConfig::from_env`] and [`HubConfig::validate`].
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Advisory-level configuration issue. Out-of-range values are clamped, not
/// rejected — this enum records what was adjusted so callers can log it.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// A numeric value was outside its valid range and has been clamped.
    ClampedValue {
        /// Name of the field that was clamped.
        field: &'static str,
        /// Value as supplied (before clamping).
        requested: String,
        /// Value actually in effect (after clamping).
        applied: String,
    },
    /// A value was unrecognized and a default was substituted.
    UnrecognizedValue {
        /// Name of the field.
        field: &'static str,
        /// Value as supplied.
        requested: String,
        /// Default substituted in its place.
        applied: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::ClampedValue {
                field,
                requested,
                applied,
            } => write!(f, "'{field}' value '{requested}' clamped to '{applied}'"),
            ConfigWarning::UnrecognizedValue {
                field,
                requested,
                applied,
            } => write!(
                f,
                "'{field}' value '{requested}' not recognized, using '{applied}'"
            ),
        }
    }
}

const DEFAULT_NAMESPACE_KEYWORDS: &[&str] = &["swarm", "orchestrator", "worker round"];

/// Runtime configuration for the agent coordination hub.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct HubConfig {
    /// Hard cap on message `content` length, in characters.
    pub max_message_content_chars: usize,
    /// Cap on message `metadata` string length, in characters.
    pub max_message_metadata_chars: usize,
    /// Cap on stored blob payload length, in characters.
    pub max_protocol_blob_chars: usize,
    /// If `true`, `full` response mode is rejected on polling reads.
    pub disallow_full_in_polling: bool,
    /// Minimum self-reported confidence accepted by the done gate, in `[0, 1]`.
    pub done_confidence_floor: f64,
    /// Retention window for idempotency-gate cache entries, in seconds.
    pub idempotency_retention_secs: u64,
    /// Keywords that trigger the namespace-collision advisory.
    pub namespace_keywords: Vec<String>,
    /// `tracing-subscriber` formatter selector (`"pretty"` or `"json"`).
    pub log_format: String,
    /// `EnvFilter` directive string for the log level.
    pub log_level: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_message_content_chars: 1024,
            max_message_metadata_chars: 1024,
            max_protocol_blob_chars: 32_768,
            disallow_full_in_polling: true,
            done_confidence_floor: 0.9,
            idempotency_retention_secs: 86_400,
            namespace_keywords: DEFAULT_NAMESPACE_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            log_format: "pretty".to_string(),
            log_level: "info".to_string(),
        }
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool_on_by_default(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => v != "0",
        Err(_) => true,
    }
}

impl HubConfig {
    /// Build a [`HubConfig`] by overlaying recognised environment variables
    /// on top of [`HubConfig::default`].
    ///
    /// Recognised variables: `MAX_MESSAGE_CONTENT_CHARS`,
    /// `MAX_MESSAGE_METADATA_CHARS`, `MAX_PROTOCOL_BLOB_CHARS`,
    /// `DISALLOW_FULL_IN_POLLING`, `DONE_CONFIDENCE_FLOOR`,
    /// `IDEMPOTENCY_RETENTION`, `HUB_NAMESPACE_KEYWORDS`, `HUB_LOG_FORMAT`,
    /// `HUB_LOG_LEVEL`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let namespace_keywords = std::env::var("HUB_NAMESPACE_KEYWORDS")
            .ok()
            .map(|v| v.split(',').map(|s| s.to_string()).collect())
            .unwrap_or(defaults.namespace_keywords);

        Self {
            max_message_content_chars: env_usize(
                "MAX_MESSAGE_CONTENT_CHARS",
                defaults.max_message_content_chars,
            ),
            max_message_metadata_chars: env_usize(
                "MAX_MESSAGE_METADATA_CHARS",
                defaults.max_message_metadata_chars,
            ),
            max_protocol_blob_chars: env_usize(
                "MAX_PROTOCOL_BLOB_CHARS",
                defaults.max_protocol_blob_chars,
            ),
            disallow_full_in_polling: env_bool_on_by_default("DISALLOW_FULL_IN_POLLING"),
            done_confidence_floor: env_f64(
                "DONE_CONFIDENCE_FLOOR",
                defaults.done_confidence_floor,
            ),
            idempotency_retention_secs: env_u64(
                "IDEMPOTENCY_RETENTION",
                defaults.idempotency_retention_secs,
            ),
            namespace_keywords,
            log_format: std::env::var("HUB_LOG_FORMAT").unwrap_or(defaults.log_format),
            log_level: std::env::var("HUB_LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    /// Validate and clamp this configuration in place, returning advisory
    /// warnings for every value that needed adjustment. Never fails: an
    /// out-of-range value is always clamped rather than rejected.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if !(0.0..=1.0).contains(&self.done_confidence_floor) {
            let requested = self.done_confidence_floor;
            self.done_confidence_floor = requested.clamp(0.0, 1.0);
            warnings.push(ConfigWarning::ClampedValue {
                field: "done_confidence_floor",
                requested: requested.to_string(),
                applied: self.done_confidence_floor.to_string(),
            });
        }

        if self.max_message_content_chars == 0 {
            warnings.push(ConfigWarning::ClampedValue {
                field: "max_message_content_chars",
                requested: "0".to_string(),
                applied: "1".to_string(),
            });
            self.max_message_content_chars = 1;
        }

        if self.max_protocol_blob_chars == 0 {
            warnings.push(ConfigWarning::ClampedValue {
                field: "max_protocol_blob_chars",
                requested: "0".to_string(),
                applied: "1".to_string(),
            });
            self.max_protocol_blob_chars = 1;
        }

        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            let requested = self.log_format.clone();
            self.log_format = "pretty".to_string();
            warnings.push(ConfigWarning::UnrecognizedValue {
                field: "log_format",
                requested,
                applied: "pretty".to_string(),
            });
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_documented_defaults() {
        let cfg = HubConfig::default();
        assert_eq!(cfg.max_message_content_chars, 1024);
        assert_eq!(cfg.max_message_metadata_chars, 1024);
        assert_eq!(cfg.max_protocol_blob_chars, 32_768);
        assert!(cfg.disallow_full_in_polling);
        assert_eq!(cfg.done_confidence_floor, 0.9);
        assert_eq!(cfg.idempotency_retention_secs, 86_400);
        assert_eq!(
            cfg.namespace_keywords,
            vec!["swarm".to_string(), "orchestrator".to_string(), "worker round".to_string()]
        );
        assert_eq!(cfg.log_format, "pretty");
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn default_config_validates_without_warnings() {
        let mut cfg = HubConfig::default();
        let warnings = cfg.validate();
        assert!(warnings.is_empty());
    }

    #[test]
    fn confidence_floor_above_one_is_clamped() {
        let mut cfg = HubConfig {
            done_confidence_floor: 1.5,
            ..HubConfig::default()
        };
        let warnings = cfg.validate();
        assert_eq!(cfg.done_confidence_floor, 1.0);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], ConfigWarning::ClampedValue { .. }));
    }

    #[test]
    fn confidence_floor_below_zero_is_clamped() {
        let mut cfg = HubConfig {
            done_confidence_floor: -0.2,
            ..HubConfig::default()
        };
        cfg.validate();
        assert_eq!(cfg.done_confidence_floor, 0.0);
    }

    #[test]
    fn zero_content_cap_is_clamped_to_one() {
        let mut cfg = HubConfig {
            max_message_content_chars: 0,
            ..HubConfig::default()
        };
        let warnings = cfg.validate();
        assert_eq!(cfg.max_message_content_chars, 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn unrecognized_log_format_falls_back_to_pretty() {
        let mut cfg = HubConfig {
            log_format: "xml".to_string(),
            ..HubConfig::default()
        };
        let warnings = cfg.validate();
        assert_eq!(cfg.log_format, "pretty");
        assert!(matches!(
            warnings[0],
            ConfigWarning::UnrecognizedValue { .. }
        ));
    }

    #[test]
    fn config_warning_display() {
        let w = ConfigWarning::ClampedValue {
            field: "x",
            requested: "5".into(),
            applied: "1".into(),
        };
        let s = w.to_string();
        assert!(s.contains('x'));
        assert!(s.contains('5'));
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = HubConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: HubConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, cfg2);
    }
}
