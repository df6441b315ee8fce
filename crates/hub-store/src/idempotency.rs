// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `(agent, tool, key)` result cache that makes every write tool safe
//! under retry: the first result — success or error — is replayed verbatim
//! for any repeat key, and the thunk never runs twice.

use crate::state::{now_ms, State};
use hub_core::IdempotencyRecord;
use serde::{Deserialize, Serialize};

/// Wire envelope distinguishing a cached `Ok` from a cached `Err`, so a
/// replay can reconstruct the exact `Result` variant.
#[derive(Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value")]
enum CachedOutcome<T, E> {
    Ok(T),
    Err(E),
}

impl<T, E> From<&Result<T, E>> for CachedOutcome<T, E>
where
    T: Clone,
    E: Clone,
{
    fn from(result: &Result<T, E>) -> Self {
        match result {
            Ok(v) => CachedOutcome::Ok(v.clone()),
            Err(e) => CachedOutcome::Err(e.clone()),
        }
    }
}

impl<T, E> From<CachedOutcome<T, E>> for Result<T, E> {
    fn from(outcome: CachedOutcome<T, E>) -> Self {
        match outcome {
            CachedOutcome::Ok(v) => Ok(v),
            CachedOutcome::Err(e) => Err(e),
        }
    }
}

/// Run `thunk` under the idempotency gate.
///
/// If `key` is empty, the gate is bypassed entirely: `thunk` runs and its
/// result is returned unwrapped, uncached. Otherwise a cache hit on
/// `(agent, tool, key)` short-circuits `thunk` and returns the stored first
/// result (success or error) verbatim; a miss runs `thunk`, persists the
/// outcome, and returns it.
///
/// Expired records (older than `retention_secs`) are evicted lazily before
/// the lookup.
pub fn with_idempotency<T, E, F>(
    state: &mut State,
    agent: &str,
    tool: &str,
    key: &str,
    retention_secs: u64,
    thunk: F,
) -> Result<T, E>
where
    T: Clone + Serialize + for<'de> Deserialize<'de>,
    E: Clone + Serialize + for<'de> Deserialize<'de>,
    F: FnOnce(&mut State) -> Result<T, E>,
{
    if key.is_empty() {
        return thunk(state);
    }

    state.evict_expired_idempotency(retention_secs);

    let cache_key = (agent.to_string(), tool.to_string(), key.to_string());
    if let Some(record) = state.idempotency.get(&cache_key) {
        let outcome: CachedOutcome<T, E> = serde_json::from_value(record.result.clone())
            .expect("cached idempotency result must deserialize into the original shape");
        return outcome.into();
    }

    let result = thunk(state);
    let outcome = CachedOutcome::from(&result);
    let encoded =
        serde_json::to_value(&outcome).expect("idempotency outcome must serialize to JSON");
    state.idempotency.insert(
        cache_key,
        IdempotencyRecord {
            agent_id: agent.to_string(),
            tool: tool.to_string(),
            key: key.to_string(),
            result: encoded,
            created_at: now_ms(),
        },
    );
    result
}
