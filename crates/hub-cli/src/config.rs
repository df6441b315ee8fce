// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading for the hub CLI: environment defaults, optionally
//! overlaid with a `hub.toml` file, plus the on-disk state snapshot path.

use anyhow::{Context, Result};
use hub_config::HubConfig;
use std::path::{Path, PathBuf};

/// Default location for the persisted table-set snapshot between CLI
/// invocations, relative to the current directory.
pub const DEFAULT_STATE_PATH: &str = ".hub-state.json";

/// Load [`HubConfig`] from the environment, optionally overlaid with a TOML
/// file at `path`. Logs a warning (via `tracing`) for every value `validate`
/// had to clamp.
pub fn load_config(path: Option<&Path>) -> Result<HubConfig> {
    let mut config = HubConfig::from_env();

    if let Some(path) = path {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config file '{}'", path.display()))?;
        config = toml::from_str(&content)
            .with_context(|| format!("parse config from '{}'", path.display()))?;
    }

    for warning in config.validate() {
        tracing::warn!("config: {warning}");
    }

    Ok(config)
}

/// Resolve the snapshot path: `explicit` if given, else [`DEFAULT_STATE_PATH`].
#[must_use]
pub fn resolve_state_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH))
}
