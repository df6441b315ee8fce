// SPDX-License-Identifier: MIT OR Apache-2.0
//! The single mutable table set guarded by [`crate::HubStore`]'s transaction
//! lock. Nothing in this module takes its own lock; callers reach it only
//! through `HubStore::with_transaction`.

use hub_core::{AgentId, Claim, EpochMs, IdempotencyRecord, Message, ProtocolBlob, RowId, Task};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time, ms epoch.
#[must_use]
pub fn now_ms() -> EpochMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as EpochMs
}

/// Key identifying one idempotency-gate cache entry.
pub type IdempotencyKey = (AgentId, String, String);

/// All tables behind the hub's single-writer transaction.
#[derive(Debug, Default)]
pub struct State {
    next_message_id: RowId,
    next_task_id: RowId,

    pub(crate) agents: BTreeMap<AgentId, hub_core::Agent>,
    pub(crate) messages: Vec<Message>,
    /// Per-recipient read marks for broadcast messages (`to_agent = None`),
    /// materialized lazily on first read by each agent. Direct messages use
    /// `Message::read` directly.
    pub(crate) broadcast_read_marks: BTreeMap<RowId, BTreeSet<AgentId>>,
    pub(crate) blobs: BTreeMap<String, ProtocolBlob>,
    pub(crate) tasks: BTreeMap<RowId, Task>,
    /// Retained even once expired; see [`Claim::is_expired`].
    pub(crate) claims: BTreeMap<RowId, Claim>,
    pub(crate) artifact_links: Vec<hub_core::TaskArtifactLink>,
    pub(crate) idempotency: BTreeMap<IdempotencyKey, IdempotencyRecord>,
    poll_backoff: BTreeMap<AgentId, u32>,
}

impl State {
    /// Construct an empty table set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next monotonic message id.
    pub(crate) fn next_message_id(&mut self) -> RowId {
        self.next_message_id += 1;
        self.next_message_id
    }

    /// Allocate the next monotonic task id.
    pub(crate) fn next_task_id(&mut self) -> RowId {
        self.next_task_id += 1;
        self.next_task_id
    }

    /// Register an agent, or update its `last_seen_at` if it already exists.
    pub fn heartbeat(&mut self, id: &str, profile: hub_core::RuntimeProfile) {
        let now = now_ms();
        self.agents
            .entry(id.to_string())
            .and_modify(|a| a.last_seen_at = now)
            .or_insert(hub_core::Agent {
                id: id.to_string(),
                runtime_profile: profile,
                last_seen_at: now,
            });
    }

    /// Look up a registered agent.
    #[must_use]
    pub fn agent(&self, id: &str) -> Option<&hub_core::Agent> {
        self.agents.get(id)
    }

    /// Look up a task by id.
    #[must_use]
    pub fn task(&self, id: RowId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Look up the claim row for a task, whether or not it has expired.
    #[must_use]
    pub fn claim(&self, task_id: RowId) -> Option<&Claim> {
        self.claims.get(&task_id)
    }

    /// Evict idempotency records older than `retention_secs`.
    pub fn evict_expired_idempotency(&mut self, retention_secs: u64) {
        let cutoff = now_ms() - (retention_secs as i64) * 1000;
        self.idempotency.retain(|_, rec| rec.created_at >= cutoff);
    }

    /// Returns true if a cached idempotency record already exists for this
    /// `(agent, tool, key)`, without evicting or consuming it.
    #[must_use]
    pub fn has_idempotency_record(&self, agent: &str, tool: &str, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        self.idempotency
            .contains_key(&(agent.to_string(), tool.to_string(), key.to_string()))
    }

    /// Iterate all tasks, in id order.
    pub fn tasks_iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Iterate all claim rows, live or expired, in task-id order.
    pub fn claims_iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    /// Returns the claim for `task_id` only if it has not expired.
    #[must_use]
    pub fn live_claim(&self, task_id: RowId, now: EpochMs) -> Option<&Claim> {
        self.claims.get(&task_id).filter(|c| !c.is_expired(now))
    }

    /// Current consecutive-empty-poll count for `agent`.
    #[must_use]
    pub fn poll_backoff(&self, agent: &str) -> u32 {
        self.poll_backoff.get(agent).copied().unwrap_or(0)
    }

    /// Increment and return `agent`'s consecutive-empty-poll count.
    pub fn bump_poll_backoff(&mut self, agent: &str) -> u32 {
        let count = self.poll_backoff.entry(agent.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Reset `agent`'s consecutive-empty-poll count to zero, e.g. on a
    /// successful claim.
    pub fn reset_poll_backoff(&mut self, agent: &str) {
        self.poll_backoff.remove(agent);
    }

    /// Export every table to a serializable snapshot, for persistence across
    /// process restarts (the daemon itself never serializes its own state).
    #[must_use]
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            next_message_id: self.next_message_id,
            next_task_id: self.next_task_id,
            agents: self.agents.clone(),
            messages: self.messages.clone(),
            broadcast_read_marks: self.broadcast_read_marks.clone(),
            blobs: self.blobs.clone(),
            tasks: self.tasks.clone(),
            claims: self.claims.clone(),
            artifact_links: self.artifact_links.clone(),
            idempotency: self.idempotency.clone(),
            poll_backoff: self.poll_backoff.clone(),
        }
    }

    /// Rebuild a table set from a snapshot previously produced by
    /// [`State::to_snapshot`].
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            next_message_id: snapshot.next_message_id,
            next_task_id: snapshot.next_task_id,
            agents: snapshot.agents,
            messages: snapshot.messages,
            broadcast_read_marks: snapshot.broadcast_read_marks,
            blobs: snapshot.blobs,
            tasks: snapshot.tasks,
            claims: snapshot.claims,
            artifact_links: snapshot.artifact_links,
            idempotency: snapshot.idempotency,
            poll_backoff: snapshot.poll_backoff,
        }
    }
}

/// Serializable image of every [`State`] table, used to persist the hub's
/// contents across process restarts (e.g. by the CLI between invocations).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Snapshot {
    /// See `State::next_message_id`.
    pub next_message_id: RowId,
    /// See `State::next_task_id`.
    pub next_task_id: RowId,
    /// Registered agents.
    pub agents: BTreeMap<AgentId, hub_core::Agent>,
    /// Append-only message log.
    pub messages: Vec<Message>,
    /// Per-recipient broadcast read marks.
    pub broadcast_read_marks: BTreeMap<RowId, BTreeSet<AgentId>>,
    /// Content-addressed blob store.
    pub blobs: BTreeMap<String, ProtocolBlob>,
    /// Task table.
    pub tasks: BTreeMap<RowId, Task>,
    /// Claim/lease table.
    pub claims: BTreeMap<RowId, Claim>,
    /// Task-artifact attachment links.
    pub artifact_links: Vec<hub_core::TaskArtifactLink>,
    /// Idempotency result cache.
    pub idempotency: BTreeMap<IdempotencyKey, IdempotencyRecord>,
    /// Consecutive-empty-poll counters.
    pub poll_backoff: BTreeMap<AgentId, u32>,
}
