// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared command implementations for the hub CLI.
//!
//! These functions are library-level so they can be tested without spawning
//! the binary. The CLI is a one-shot process — state survives between
//! invocations only via the JSON snapshot file read/written here.

use anyhow::{Context, Result};
use hub_config::HubConfig;
use hub_daemon::HubState;
use hub_daemon::collaborators::{InMemoryArtifactAcl, LocalTicketIssuer};
use hub_error::HubErrorDto;
use hub_store::state::Snapshot;
use hub_store::HubStore;
use hub_telemetry::HubMetrics;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// Build a [`HubState`] from `config`, restoring tables from `snapshot_path`
/// if it exists, otherwise starting empty.
pub fn load_state(config: HubConfig, snapshot_path: &Path) -> Result<HubState> {
    let store = if snapshot_path.is_file() {
        let content = std::fs::read_to_string(snapshot_path)
            .with_context(|| format!("read state file '{}'", snapshot_path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("parse state from '{}'", snapshot_path.display()))?;
        HubStore::from_snapshot(snapshot)
    } else {
        HubStore::new()
    };

    Ok(HubState {
        store,
        config,
        metrics: HubMetrics::default(),
        acl: InMemoryArtifactAcl::new(),
        issuer: LocalTicketIssuer,
    })
}

/// Persist `hub`'s current tables to `snapshot_path`, creating parent
/// directories as needed.
pub fn save_state(hub: &HubState, snapshot_path: &Path) -> Result<()> {
    let snapshot = hub.store.snapshot();
    let json = serde_json::to_string_pretty(&snapshot).context("serialize state snapshot")?;

    if let Some(parent) = snapshot_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create state directory {}", parent.display()))?;
        }
    }

    std::fs::write(snapshot_path, json)
        .with_context(|| format!("write state to '{}'", snapshot_path.display()))
}

/// Render a tool handler's result as a JSON value, wrapping either side of
/// the `ToolResult` in an envelope that tells `ok` from `error` at a glance.
///
/// Returns the rendered value plus the process exit code it implies.
pub fn render<T: Serialize>(result: Result<T, HubErrorDto>) -> (Value, i32) {
    match result {
        Ok(value) => (
            serde_json::json!({ "ok": true, "result": value }),
            0,
        ),
        Err(err) => (
            serde_json::json!({ "ok": false, "error": err }),
            1,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{RuntimeMode, RuntimeProfile};

    #[test]
    fn load_state_starts_empty_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let hub = load_state(HubConfig::default(), &path).unwrap();
        let has_agent = hub.store.with_transaction(|s| s.agent("a1").is_some());
        assert!(!has_agent);
    }

    #[test]
    fn save_then_load_round_trips_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let hub = load_state(HubConfig::default(), &path).unwrap();
        hub.store.with_transaction(|s| {
            s.heartbeat(
                "a1",
                RuntimeProfile { mode: RuntimeMode::Any, source: "test".into() },
            );
        });
        save_state(&hub, &path).unwrap();

        let reloaded = load_state(HubConfig::default(), &path).unwrap();
        let has_agent = reloaded.store.with_transaction(|s| s.agent("a1").is_some());
        assert!(has_agent);
    }

    #[test]
    fn render_ok_sets_exit_zero() {
        let (value, code) = render::<i32>(Ok(7));
        assert_eq!(code, 0);
        assert_eq!(value["ok"], true);
        assert_eq!(value["result"], 7);
    }

    #[test]
    fn render_err_sets_exit_one() {
        let err = HubErrorDto {
            code: hub_error::ErrorCode::NotFound,
            message: "no task 9".into(),
            context: Default::default(),
            source_message: None,
        };
        let (value, code) = render::<i32>(Err(err));
        assert_eq!(code, 1);
        assert_eq!(value["ok"], false);
    }
}
