// SPDX-License-Identifier: MIT OR Apache-2.0
//! hub-store
#![warn(missing_docs)]
//!
//! Transactional in-memory tables for the coordination hub: protocol blobs,
//! the message log, tasks, claims, and the idempotency cache. All mutation
//! goes through [`HubStore::with_transaction`], a single-writer critical
//! section over one [`state::State`].

/// Content-addressed blob insert/lookup.
pub mod blobs;
/// Claim/lease lifecycle.
pub mod claims;
/// The `(agent, tool, key)` result cache.
pub mod idempotency;
/// Append-only message log with read-marks and delta replay.
pub mod messages;
/// Response-mode shaping for messages and tasks.
pub mod shaping;
/// The mutable table set guarded by the transaction lock.
pub mod state;
/// Task creation, status transitions, listing, and artifact attachment.
pub mod tasks;

use state::State;
use std::sync::{Arc, Mutex};

/// Shared handle to the hub's single mutable table set.
///
/// Cloning an `HubStore` shares the same underlying tables — it is the
/// `Arc<Mutex<_>>` wrapper callers hand to every tool handler.
#[derive(Debug, Clone, Default)]
pub struct HubStore {
    inner: Arc<Mutex<State>>,
}

impl HubStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(State::new())),
        }
    }

    /// Run `f` with exclusive access to the table set.
    ///
    /// This is the hub's only mutation primitive: every tool handler runs
    /// inside exactly one call to `with_transaction`, matching the
    /// single-writer model described for the store.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned by a prior panicking transaction.
    pub fn with_transaction<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut State) -> R,
    {
        let mut guard = self.inner.lock().expect("hub store lock poisoned");
        f(&mut guard)
    }

    /// Build a store whose tables are restored from a previously exported
    /// [`state::Snapshot`].
    #[must_use]
    pub fn from_snapshot(snapshot: state::Snapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State::from_snapshot(snapshot))),
        }
    }

    /// Export the current tables to a serializable snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned by a prior panicking transaction.
    #[must_use]
    pub fn snapshot(&self) -> state::Snapshot {
        self.inner.lock().expect("hub store lock poisoned").to_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::RuntimeMode;

    #[test]
    fn transactions_share_state_across_calls() {
        let store = HubStore::new();
        store.with_transaction(|state| {
            state.heartbeat(
                "a1",
                hub_core::RuntimeProfile {
                    mode: RuntimeMode::Any,
                    source: "test".to_string(),
                },
            );
        });
        let seen = store.with_transaction(|state| state.agent("a1").is_some());
        assert!(seen);
    }

    #[test]
    fn cloned_handle_shares_the_same_lock() {
        let store = HubStore::new();
        let clone = store.clone();
        store.with_transaction(|state| {
            state.heartbeat(
                "a1",
                hub_core::RuntimeProfile {
                    mode: RuntimeMode::Any,
                    source: "test".to_string(),
                },
            );
        });
        let seen = clone.with_transaction(|state| state.agent("a1").is_some());
        assert!(seen);
    }

    #[test]
    fn snapshot_round_trips_through_a_fresh_store() {
        let store = HubStore::new();
        store.with_transaction(|state| {
            state.heartbeat(
                "a1",
                hub_core::RuntimeProfile {
                    mode: RuntimeMode::Any,
                    source: "test".to_string(),
                },
            );
        });
        let snapshot = store.snapshot();
        let restored = HubStore::from_snapshot(snapshot);
        let seen = restored.with_transaction(|state| state.agent("a1").is_some());
        assert!(seen);
    }
}
