// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output formatting for the hub CLI: every tool result is a JSON value
//! already (the typed handlers return shaped, serializable rows), so this
//! module only decides compact vs. pretty rendering.

use serde_json::Value;
use std::fmt;

/// Supported output formats for CLI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Compact single-line JSON.
    Json,
    /// Pretty-printed, indented JSON.
    JsonPretty,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::JsonPretty => "json-pretty",
        };
        write!(f, "{s}")
    }
}

/// Render `value` to a string in the requested format.
#[must_use]
pub fn render(value: &Value, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => value.to_string(),
        OutputFormat::JsonPretty => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
    }
}
