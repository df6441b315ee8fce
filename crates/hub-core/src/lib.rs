// SPDX-License-Identifier: MIT OR Apache-2.0
//! hub-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Stable domain types shared by every layer of the coordination hub:
//! agents, messages, protocol blobs, tasks, and claims. If you only take
//! one dependency from this workspace, take this one.

/// Artifact ACL and download-ticket collaborator contracts.
pub mod collaborators;
/// Blob-reference envelope embedded in message content.
pub mod envelope;
/// Task status transition graph and the terminal "done gate".
pub mod state_machine;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Opaque identifier for an agent process.
pub type AgentId = String;

/// Monotonic message/task row identifier.
pub type RowId = u64;

/// Milliseconds since the Unix epoch.
pub type EpochMs = i64;

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// How an agent's runtime executes task work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    /// Runs against a live repository checkout.
    Repo,
    /// Runs in an isolated/ephemeral sandbox with no repo access.
    Isolated,
    /// Compatible with either mode.
    Any,
}

impl RuntimeMode {
    /// Returns `true` if a task whose `execution_mode` is `self` may be
    /// claimed by an agent whose `runtime_profile.mode` is `agent_mode`.
    ///
    /// `any` on either side matches anything; otherwise the modes must be
    /// equal.
    #[must_use]
    pub fn compatible_with(self, agent_mode: RuntimeMode) -> bool {
        matches!(self, RuntimeMode::Any) || matches!(agent_mode, RuntimeMode::Any) || self == agent_mode
    }
}

/// Declares where and how an agent's work is executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeProfile {
    /// Execution mode this agent supports.
    pub mode: RuntimeMode,
    /// Free-form descriptor of the runtime (e.g. `"claude-code"`, `"codex-cli"`).
    pub source: String,
}

/// A registered autonomous process.
///
/// Created on first `register`/heartbeat call; mutated only by heartbeat
/// (last-seen timestamp); never destroyed by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Opaque agent identifier.
    pub id: AgentId,
    /// Declared execution profile.
    pub runtime_profile: RuntimeProfile,
    /// Last heartbeat timestamp, ms epoch.
    pub last_seen_at: EpochMs,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single entry in the append-only message log.
///
/// Invariants: `id` strictly increasing; `created_at` monotonically
/// non-decreasing; `content`/`metadata` lengths bounded by configuration.
/// `read` starts `false` and flips to `true` exactly once per recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Monotonic message id.
    pub id: RowId,
    /// Sending agent.
    pub from_agent: AgentId,
    /// Recipient agent, or `None` for broadcast.
    pub to_agent: Option<AgentId>,
    /// Message body.
    pub content: String,
    /// Normalized JSON metadata string.
    pub metadata: String,
    /// Distributed-trace correlation id.
    pub trace_id: Option<String>,
    /// Distributed-trace span id.
    pub span_id: Option<String>,
    /// Creation timestamp, ms epoch.
    pub created_at: EpochMs,
    /// Whether the addressed recipient has read this message.
    ///
    /// For broadcast messages this field is meaningless at the row level —
    /// per-recipient read state is tracked separately (see the message
    /// store's broadcast read-mark table) and materialized into this flag
    /// only on a per-agent read projection.
    pub read: bool,
}

// ---------------------------------------------------------------------------
// Protocol Blob
// ---------------------------------------------------------------------------

/// A content-addressed binary payload.
///
/// `hash` is the hex SHA-256 digest of `value` (the *stored*, possibly
/// codec-encoded bytes). Insertion is idempotent by hash; blobs are never
/// mutated or garbage-collected by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolBlob {
    /// Hex SHA-256 digest of `value`.
    pub hash: String,
    /// Stored (possibly codec-encoded) bytes.
    pub value: Vec<u8>,
    /// Creation timestamp, ms epoch.
    pub created_at: EpochMs,
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, unclaimed (or claim expired).
    Pending,
    /// Claimed and being worked.
    InProgress,
    /// Claimed but execution is stalled pending something external.
    Blocked,
    /// Terminal: gated success.
    Done,
    /// Terminal: abandoned from any non-terminal state.
    Cancelled,
}

impl TaskStatus {
    /// Terminal states accept no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }
}

/// Scheduling priority. `Ord` derives in ascending severity so that
/// `Priority::Critical > Priority::High > Priority::Medium > Priority::Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Lowest scheduling priority.
    Low,
    /// Default priority.
    Medium,
    /// Above default priority.
    High,
    /// Highest priority; forces `consistency_mode = strict` unless overridden.
    Critical,
}

/// Transactional consistency requirement for terminal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
    /// Done gate applies without the independent-verifier rule.
    Relaxed,
    /// Done gate additionally requires `verified_by` independent of the
    /// updater and the task's creator.
    Strict,
}

/// A unit of work collaborated on by agents.
///
/// Invariants: `id` strictly increasing; `updated_at >= created_at`;
/// `depends_on` never references `id` itself and is acyclic against the
/// existing graph (enforced at insert).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Monotonic task id.
    pub id: RowId,
    /// Short title.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Agent that created the task.
    pub created_by: AgentId,
    /// Current claimant, if any.
    pub assigned_to: Option<AgentId>,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Scheduling priority.
    pub priority: Priority,
    /// Opaque governance grouping tag.
    pub namespace: Option<String>,
    /// Task ids that must be `done` before this task is dependency-ready.
    pub depends_on: BTreeSet<RowId>,
    /// Where this task is permitted to execute.
    pub execution_mode: RuntimeMode,
    /// Consistency requirement for the done gate.
    pub consistency_mode: ConsistencyMode,
    /// Self-reported confidence in `[0, 1]`.
    pub confidence: Option<f64>,
    /// Whether independent or self-verification passed.
    pub verification_passed: bool,
    /// Agent id that performed verification, if any.
    pub verified_by: Option<AgentId>,
    /// Ordered list of evidence references (free-form strings).
    pub evidence_refs: Vec<String>,
    /// Creation timestamp, ms epoch.
    pub created_at: EpochMs,
    /// Last-update timestamp, ms epoch.
    pub updated_at: EpochMs,
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// A time-bounded exclusive assignment of a task to an agent.
///
/// Invariant: at most one non-expired claim per `task_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    /// Task this claim assigns.
    pub task_id: RowId,
    /// Agent holding the claim.
    pub agent_id: AgentId,
    /// Lease expiry, ms epoch.
    pub lease_expires_at: EpochMs,
    /// Claim creation timestamp, ms epoch.
    pub claimed_at: EpochMs,
}

impl Claim {
    /// Returns `true` if `now` is at or past the lease expiry.
    #[must_use]
    pub fn is_expired(&self, now: EpochMs) -> bool {
        now >= self.lease_expires_at
    }
}

// ---------------------------------------------------------------------------
// Task Artifact Link
// ---------------------------------------------------------------------------

/// Grants an artifact's association with a task.
///
/// Attaching an artifact grants read-access to the task's current
/// `assigned_to` (if any) via a side-effect to the artifact ACL collaborator;
/// the link itself only records the attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskArtifactLink {
    /// Owning task.
    pub task_id: RowId,
    /// Opaque artifact identifier (managed by the artifact byte-transport
    /// collaborator, out of scope for this crate).
    pub artifact_id: String,
    /// Agent that attached the artifact.
    pub attached_by: AgentId,
    /// Attachment timestamp, ms epoch.
    pub attached_at: EpochMs,
}

// ---------------------------------------------------------------------------
// Idempotency Record
// ---------------------------------------------------------------------------

/// A cached first result for an `(agent, tool, key)` triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Acting agent.
    pub agent_id: AgentId,
    /// Tool name invoked.
    pub tool: String,
    /// Caller-supplied idempotency key.
    pub key: String,
    /// Serialized first result (success or error, verbatim).
    pub result: serde_json::Value,
    /// Record creation timestamp, ms epoch; used for retention eviction.
    pub created_at: EpochMs,
}

// ---------------------------------------------------------------------------
// Hashing / canonicalization helpers
// ---------------------------------------------------------------------------

/// Errors from contract-level operations (serialization, hashing).
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// JSON serialization or deserialization failed.
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Produce a deterministic JSON string for hashing or codec use.
///
/// Not a full JCS implementation, but stable for our types: keys are sorted
/// (`serde_json::Map` is a `BTreeMap` by default) and numbers are serialized
/// consistently by `serde_json`.
///
/// # Errors
///
/// Returns [`ContractError::Json`] if the value cannot be serialized.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, ContractError> {
    let v = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&v)?)
}

/// Compute the hex-encoded SHA-256 digest of `bytes`.
///
/// # Examples
///
/// ```
/// let h = hub_core::sha256_hex(b"hello");
/// assert_eq!(h.len(), 64);
/// ```
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
