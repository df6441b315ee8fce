// SPDX-License-Identifier: MIT OR Apache-2.0
//! hub-daemon
#![warn(missing_docs)]
//!
//! Typed tool handlers for the agent coordination hub. This crate owns no
//! transport: each tool is a plain function `(&HubState, Request) ->
//! ToolResult<Response>`, wired to a wire protocol by whatever sits above it.

/// Default in-process `ArtifactAcl`/`TicketIssuer` implementations.
pub mod collaborators;

use collaborators::{InMemoryArtifactAcl, LocalTicketIssuer};
use hub_codec::Codec;
use hub_config::HubConfig;
use hub_core::envelope::BlobRefEnvelope;
use hub_core::{
    AgentId, Claim, ConsistencyMode, EpochMs, Message, Priority, RowId, RuntimeMode,
    RuntimeProfile, Task, TaskArtifactLink, TaskStatus,
};
use hub_error::{ErrorCode, HubError, HubErrorDto};
use hub_store::shaping::{shape_message, shape_task, ResponseMode};
use hub_store::state::State;
use hub_store::{blobs, claims, messages, tasks, HubStore};
use hub_telemetry::HubMetrics;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Result type every tool handler returns. The error side is the wire-safe
/// [`HubErrorDto`] rather than [`HubError`] itself, since the idempotency
/// gate requires its error type to be `Clone + Serialize + Deserialize`,
/// which a boxed `source` error prevents `HubError` from satisfying.
pub type ToolResult<T> = Result<T, HubErrorDto>;

/// Everything one hub instance needs to serve tool calls: the transactional
/// table set, the resolved configuration, live metrics, and the in-process
/// collaborator stand-ins for artifact access and download tickets.
#[derive(Debug)]
pub struct HubState {
    /// The transactional table set.
    pub store: HubStore,
    /// Resolved configuration (limits, namespace keywords, log settings).
    pub config: HubConfig,
    /// Live counters for polls, claims, renewals, and gate failures.
    pub metrics: HubMetrics,
    /// In-process artifact access control.
    pub acl: InMemoryArtifactAcl,
    /// In-process download ticket issuer.
    pub issuer: LocalTicketIssuer,
}

impl HubState {
    /// Construct a fresh hub instance from a resolved configuration.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        Self {
            store: HubStore::new(),
            config,
            metrics: HubMetrics::default(),
            acl: InMemoryArtifactAcl::new(),
            issuer: LocalTicketIssuer,
        }
    }
}

impl Default for HubState {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

fn to_dto(err: HubError) -> HubErrorDto {
    HubErrorDto::from(&err)
}

/// Register `agent_id`'s last-seen timestamp, defaulting to an unspecified
/// `Any`-mode profile when the caller did not supply one.
fn heartbeat(state: &mut State, agent_id: &str, profile: Option<RuntimeProfile>) {
    state.heartbeat(
        agent_id,
        profile.unwrap_or(RuntimeProfile {
            mode: RuntimeMode::Any,
            source: "unspecified".to_string(),
        }),
    );
}

fn parse_codec(raw: &str) -> Codec {
    match raw {
        "none" => Codec::None,
        "whitespace" => Codec::Whitespace,
        "json" => Codec::Json,
        "lossless_auto" => Codec::LosslessAuto,
        _ => Codec::Auto,
    }
}

/// Run a write tool under the idempotency gate, bumping the idempotency-hit
/// counter on a cache hit.
fn dispatch<T, F>(
    store: &HubStore,
    metrics: &HubMetrics,
    agent_id: &str,
    tool: &str,
    idempotency_key: Option<&str>,
    retention_secs: u64,
    f: F,
) -> ToolResult<T>
where
    T: Clone + Serialize + for<'de> Deserialize<'de>,
    F: FnOnce(&mut State) -> Result<T, HubError>,
{
    let key = idempotency_key.unwrap_or("");
    let span = tracing::info_span!("tool", tool, agent_id, idempotent = !key.is_empty());
    let _entered = span.enter();
    store.with_transaction(|state| {
        if state.has_idempotency_record(agent_id, tool, key) {
            metrics.record_idempotency_hit();
        }
        hub_store::idempotency::with_idempotency(state, agent_id, tool, key, retention_secs, |st| {
            f(st).map_err(to_dto)
        })
    })
}

/// Run a tool that mutates state but is not behind the idempotency gate
/// (polling, lease renewal, and release are inherently non-replayable).
fn mutate_no_cache<T, F>(store: &HubStore, f: F) -> ToolResult<T>
where
    F: FnOnce(&mut State) -> Result<T, HubError>,
{
    store.with_transaction(|state| f(state).map_err(to_dto))
}

/// Run a tool that only reads the table set.
fn read_only<T, F>(store: &HubStore, f: F) -> ToolResult<T>
where
    F: FnOnce(&State) -> Result<T, HubError>,
{
    store.with_transaction(|state| f(&*state).map_err(to_dto))
}

/// Decode a message's content as a blob reference and resolve it against the
/// blob store, shaping the result per `mode`. Falls back to an unresolved
/// shape if the content is not a blob reference or the blob is missing.
fn shape_one_message(state: &State, msg: &Message, mode: ResponseMode, resolve: bool) -> Value {
    if !resolve {
        return shape_message(msg, mode, None, None);
    }
    let Some(envelope) = BlobRefEnvelope::parse(&msg.content) else {
        return shape_message(msg, mode, None, None);
    };
    let Some(blob) = blobs::get(state, &envelope.hash) else {
        return shape_message(msg, mode, None, None);
    };

    let stored = String::from_utf8_lossy(&blob.value).into_owned();
    let (resolved_content, integrity_ok, codec_label) = match hub_codec::decode(&stored, Codec::LosslessAuto) {
        Ok(decoded) if decoded.value != stored => (decoded.value, decoded.integrity_ok, "lossless_auto"),
        Ok(decoded) => (decoded.value, decoded.integrity_ok, "none"),
        Err(_) => (stored.clone(), false, "none"),
    };

    let blob_ref = json!({
        "hash": envelope.hash,
        "declared_chars": envelope.declared_chars,
        "resolved": true,
        "codec": codec_label,
        "integrity_ok": integrity_ok,
    });
    shape_message(msg, mode, Some(&resolved_content), Some(blob_ref))
}

// ---------------------------------------------------------------------
// send_message
// ---------------------------------------------------------------------

/// Request for [`send_message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Sending agent.
    pub from_agent: AgentId,
    /// `None` broadcasts to every agent.
    pub to_agent: Option<AgentId>,
    /// Raw message body.
    pub content: String,
    /// Caller-supplied metadata, as a JSON-encoded string; defaults to `"{}"`.
    pub metadata: Option<String>,
    /// Distributed trace id, propagated verbatim.
    pub trace_id: Option<String>,
    /// Distributed span id, propagated verbatim.
    pub span_id: Option<String>,
    /// Profile to heartbeat the sender with.
    pub runtime_profile: Option<RuntimeProfile>,
    /// Replay key for the idempotency gate.
    pub idempotency_key: Option<String>,
}

/// Response for [`send_message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    /// The stored message.
    pub message: Message,
}

/// Handler signature for [`send_message`].
pub type SendMessageHandler = fn(&HubState, SendMessageRequest) -> ToolResult<SendMessageResponse>;

/// Send a plain-text message.
pub fn send_message(hub: &HubState, req: SendMessageRequest) -> ToolResult<SendMessageResponse> {
    let cfg = &hub.config;
    dispatch(
        &hub.store,
        &hub.metrics,
        &req.from_agent,
        "send_message",
        req.idempotency_key.as_deref(),
        cfg.idempotency_retention_secs,
        |state| {
            heartbeat(state, &req.from_agent, req.runtime_profile.clone());
            let message = messages::send(
                state,
                &req.from_agent,
                req.to_agent.as_deref(),
                req.content.clone(),
                req.metadata.clone().unwrap_or_else(|| "{}".to_string()),
                req.trace_id.clone(),
                req.span_id.clone(),
                cfg.max_message_content_chars,
                cfg.max_message_metadata_chars,
            )?;
            Ok(SendMessageResponse { message })
        },
    )
}

// ---------------------------------------------------------------------
// send_blob_message
// ---------------------------------------------------------------------

/// Request for [`send_blob_message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendBlobMessageRequest {
    /// Sending agent.
    pub from_agent: AgentId,
    /// `None` broadcasts to every agent.
    pub to_agent: Option<AgentId>,
    /// Raw payload to store and reference.
    pub payload: String,
    /// One of `none`, `whitespace`, `json`, `auto`, `lossless_auto`.
    /// Unrecognized values fall back to `auto`.
    pub compression_mode: String,
    /// Caller-supplied metadata, as a JSON-encoded string; defaults to `"{}"`.
    pub metadata: Option<String>,
    /// Distributed trace id, propagated verbatim.
    pub trace_id: Option<String>,
    /// Distributed span id, propagated verbatim.
    pub span_id: Option<String>,
    /// Profile to heartbeat the sender with.
    pub runtime_profile: Option<RuntimeProfile>,
    /// Replay key for the idempotency gate.
    pub idempotency_key: Option<String>,
}

/// Response for [`send_blob_message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendBlobMessageResponse {
    /// The stored message, whose content is the blob-ref envelope.
    pub message: Message,
    /// `{hash, declared_chars, codec_used, applied, lossless, gain_pct}`.
    pub blob_ref: Value,
}

/// Handler signature for [`send_blob_message`].
pub type SendBlobMessageHandler =
    fn(&HubState, SendBlobMessageRequest) -> ToolResult<SendBlobMessageResponse>;

/// Store `payload` as a content-addressed blob and send a message carrying
/// its blob-ref envelope.
pub fn send_blob_message(
    hub: &HubState,
    req: SendBlobMessageRequest,
) -> ToolResult<SendBlobMessageResponse> {
    let cfg = &hub.config;
    dispatch(
        &hub.store,
        &hub.metrics,
        &req.from_agent,
        "send_blob_message",
        req.idempotency_key.as_deref(),
        cfg.idempotency_retention_secs,
        |state| {
            heartbeat(state, &req.from_agent, req.runtime_profile.clone());

            let declared_chars = req.payload.chars().count();
            if declared_chars > cfg.max_protocol_blob_chars {
                return Err(HubError::new(
                    ErrorCode::BlobTooLong,
                    format!(
                        "blob payload of {declared_chars} chars exceeds the {} char cap",
                        cfg.max_protocol_blob_chars
                    ),
                ));
            }

            let codec = parse_codec(&req.compression_mode);
            let (hash, encoded, _outcome) = blobs::put_encoded(state, &req.payload, codec)
                .map_err(|e| HubError::new(ErrorCode::Internal, e.to_string()))?;

            let envelope = BlobRefEnvelope::make(hash.clone(), declared_chars as u64);
            let message = messages::send(
                state,
                &req.from_agent,
                req.to_agent.as_deref(),
                envelope,
                req.metadata.clone().unwrap_or_else(|| "{}".to_string()),
                req.trace_id.clone(),
                req.span_id.clone(),
                cfg.max_message_content_chars,
                cfg.max_message_metadata_chars,
            )?;

            let blob_ref = json!({
                "hash": hash,
                "declared_chars": declared_chars,
                "codec_used": encoded.codec_used,
                "applied": encoded.applied,
                "lossless": encoded.lossless,
                "gain_pct": encoded.gain_pct,
            });

            Ok(SendBlobMessageResponse { message, blob_ref })
        },
    )
}

// ---------------------------------------------------------------------
// read_messages
// ---------------------------------------------------------------------

/// Request for [`read_messages`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadMessagesRequest {
    /// Reading agent; determines read-mark state and broadcast visibility.
    pub agent_id: AgentId,
    /// Restrict to messages from this sender.
    pub from: Option<AgentId>,
    /// Restrict to unread messages.
    pub unread_only: bool,
    /// Maximum rows to return.
    pub limit: usize,
    /// Offset into the matching set (normal-order reads only).
    pub offset: usize,
    /// Delta read: only messages created at or after this time.
    pub since_ts: Option<i64>,
    /// Delta read: opaque resume token from a prior page.
    pub cursor: Option<String>,
    /// Whether this call is part of a polling loop.
    pub polling: bool,
    /// One of `full`, `compact`, `tiny`, `nano`.
    pub response_mode: String,
    /// Resolve blob-ref envelopes against the blob store.
    pub resolve_blob_refs: bool,
}

/// Response for [`read_messages`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadMessagesResponse {
    /// Messages shaped per the requested response mode.
    pub messages: Vec<Value>,
    /// Whether more messages remain beyond this page.
    pub has_more: bool,
    /// Resume token for the next delta read, set only for delta reads.
    pub next_cursor: Option<String>,
}

/// Handler signature for [`read_messages`].
pub type ReadMessagesHandler = fn(&HubState, ReadMessagesRequest) -> ToolResult<ReadMessagesResponse>;

/// Read messages visible to `agent_id`, optionally resolving blob-ref
/// envelopes and flipping read-marks for the rows returned.
pub fn read_messages(hub: &HubState, req: ReadMessagesRequest) -> ToolResult<ReadMessagesResponse> {
    let cfg = &hub.config;
    let mode = ResponseMode::parse(&req.response_mode);
    let delta_requested = req.cursor.is_some() || req.since_ts.is_some();
    if matches!(mode, ResponseMode::Full)
        && (req.polling || delta_requested)
        && cfg.disallow_full_in_polling
    {
        return Err(to_dto(HubError::new(
            ErrorCode::FullModeForbiddenInPolling,
            "full response mode is not permitted on a polling or delta read",
        )));
    }

    mutate_no_cache(&hub.store, |state| {
        let query = messages::ReadQuery {
            from: req.from.clone(),
            unread_only: req.unread_only,
            limit: req.limit,
            offset: req.offset,
            since_ts: req.since_ts,
            cursor: req.cursor.clone(),
        };
        let result = messages::read(state, &req.agent_id, &query);

        let next_cursor = if matches!(result.order, messages::ReadOrder::Delta) {
            result.messages.last().map(messages::cursor_for)
        } else {
            None
        };
        let shaped: Vec<Value> = result
            .messages
            .iter()
            .map(|m| shape_one_message(state, m, mode, req.resolve_blob_refs))
            .collect();

        Ok(ReadMessagesResponse {
            messages: shaped,
            has_more: result.has_more,
            next_cursor,
        })
    })
}

// ---------------------------------------------------------------------
// create_task
// ---------------------------------------------------------------------

/// Request for [`create_task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    /// Short title.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Creating agent.
    pub created_by: AgentId,
    /// Agent the task is pre-assigned to, if any.
    pub assigned_to: Option<AgentId>,
    /// Scheduling priority.
    pub priority: Priority,
    /// Free-text namespace; matched against configured advisory keywords.
    pub namespace: Option<String>,
    /// Task ids this task depends on.
    pub depends_on: BTreeSet<RowId>,
    /// Runtime mode a claimant must satisfy.
    pub execution_mode: RuntimeMode,
    /// Override the ambient done-gate consistency mode for this task.
    pub consistency_mode_override: Option<ConsistencyMode>,
    /// Profile to heartbeat the creator with.
    pub runtime_profile: Option<RuntimeProfile>,
    /// Replay key for the idempotency gate.
    pub idempotency_key: Option<String>,
}

/// Response for [`create_task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    /// The created task.
    pub task: Task,
    /// Set if the namespace didn't match any configured advisory keyword.
    pub namespace_advisory: Option<String>,
}

/// Handler signature for [`create_task`].
pub type CreateTaskHandler = fn(&HubState, CreateTaskRequest) -> ToolResult<CreateTaskResponse>;

/// Create a task.
pub fn create_task(hub: &HubState, req: CreateTaskRequest) -> ToolResult<CreateTaskResponse> {
    let cfg = &hub.config;
    dispatch(
        &hub.store,
        &hub.metrics,
        &req.created_by,
        "create_task",
        req.idempotency_key.as_deref(),
        cfg.idempotency_retention_secs,
        |state| {
            heartbeat(state, &req.created_by, req.runtime_profile.clone());
            let outcome = tasks::create_task(
                state,
                tasks::CreateTaskInput {
                    title: req.title.clone(),
                    description: req.description.clone(),
                    created_by: req.created_by.clone(),
                    assigned_to: req.assigned_to.clone(),
                    priority: req.priority,
                    namespace: req.namespace.clone(),
                    depends_on: req.depends_on.clone(),
                    execution_mode: req.execution_mode,
                    consistency_mode_override: req.consistency_mode_override,
                },
                &cfg.namespace_keywords,
            )?;
            Ok(CreateTaskResponse {
                task: outcome.task,
                namespace_advisory: outcome.namespace_advisory,
            })
        },
    )
}

// ---------------------------------------------------------------------
// update_task
// ---------------------------------------------------------------------

/// Request for [`update_task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    /// Task to update.
    pub task_id: RowId,
    /// Agent performing the update.
    pub updating_agent: AgentId,
    /// Target status.
    pub status: TaskStatus,
    /// Confidence score, required to transition into `Done`.
    pub confidence: Option<f64>,
    /// Whether independent verification passed, required for `Done`.
    pub verification_passed: Option<bool>,
    /// Verifying agent; required in strict consistency mode.
    pub verified_by: Option<AgentId>,
    /// Supporting evidence references; required, non-empty, for `Done`.
    pub evidence_refs: Option<Vec<String>>,
    /// Profile to heartbeat the updater with.
    pub runtime_profile: Option<RuntimeProfile>,
    /// Replay key for the idempotency gate.
    pub idempotency_key: Option<String>,
}

/// Response for [`update_task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTaskResponse {
    /// The task after the update.
    pub task: Task,
}

/// Handler signature for [`update_task`].
pub type UpdateTaskHandler = fn(&HubState, UpdateTaskRequest) -> ToolResult<UpdateTaskResponse>;

/// Transition or amend a task, subject to the state machine and (on entry
/// to `Done`) the done gate.
pub fn update_task(hub: &HubState, req: UpdateTaskRequest) -> ToolResult<UpdateTaskResponse> {
    let cfg = &hub.config;
    let result = dispatch(
        &hub.store,
        &hub.metrics,
        &req.updating_agent,
        "update_task",
        req.idempotency_key.as_deref(),
        cfg.idempotency_retention_secs,
        |state| {
            heartbeat(state, &req.updating_agent, req.runtime_profile.clone());
            let task = tasks::update_task(
                state,
                tasks::UpdateTaskInput {
                    task_id: req.task_id,
                    updating_agent: req.updating_agent.clone(),
                    status: req.status,
                    confidence: req.confidence,
                    verification_passed: req.verification_passed,
                    verified_by: req.verified_by.clone(),
                    evidence_refs: req.evidence_refs.clone(),
                    confidence_floor: cfg.done_confidence_floor,
                },
            )?;
            Ok(UpdateTaskResponse { task })
        },
    );
    if let Err(ref dto) = result {
        if dto.code == ErrorCode::DoneGateFailed {
            hub.metrics.record_done_gate_failure();
        }
    }
    result
}

// ---------------------------------------------------------------------
// list_tasks
// ---------------------------------------------------------------------

/// Request for [`list_tasks`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTasksRequest {
    /// Restrict to this status.
    pub status: Option<TaskStatus>,
    /// Restrict to this assignee.
    pub assigned_to: Option<AgentId>,
    /// Restrict to this namespace.
    pub namespace: Option<String>,
    /// Maximum rows to return.
    pub limit: usize,
    /// Offset into the matching set.
    pub offset: usize,
    /// One of `full`, `compact`, `tiny`, `nano`.
    pub response_mode: String,
}

/// Response for [`list_tasks`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTasksResponse {
    /// Tasks shaped per the requested response mode.
    pub tasks: Vec<Value>,
    /// Whether more tasks remain beyond this page.
    pub has_more: bool,
}

/// Handler signature for [`list_tasks`].
pub type ListTasksHandler = fn(&HubState, ListTasksRequest) -> ToolResult<ListTasksResponse>;

/// List tasks matching the given filters, newest first.
pub fn list_tasks(hub: &HubState, req: ListTasksRequest) -> ToolResult<ListTasksResponse> {
    let mode = ResponseMode::parse(&req.response_mode);
    read_only(&hub.store, |state| {
        let mut rows = tasks::list_tasks(
            state,
            &tasks::TaskListQuery {
                status: req.status,
                assigned_to: req.assigned_to.clone(),
                namespace: req.namespace.clone(),
                limit: req.limit.saturating_add(1),
                offset: req.offset,
            },
        );
        let has_more = rows.len() > req.limit;
        rows.truncate(req.limit);
        let shaped = rows.iter().map(|t| shape_task(t, mode)).collect();
        Ok(ListTasksResponse { tasks: shaped, has_more })
    })
}

// ---------------------------------------------------------------------
// poll_and_claim
// ---------------------------------------------------------------------

/// Request for [`poll_and_claim`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollAndClaimRequest {
    /// Polling agent.
    pub agent_id: AgentId,
    /// Lease duration in seconds if a task is claimed.
    pub lease_seconds: u64,
    /// Profile to heartbeat the agent with.
    pub runtime_profile: Option<RuntimeProfile>,
}

/// Response for [`poll_and_claim`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollAndClaimResponse {
    /// The claimed task, if any.
    pub task: Option<Task>,
    /// The new claim, if any.
    pub claim: Option<Claim>,
    /// Suggested backoff before the next poll, set when nothing was claimed.
    pub retry_after_ms: Option<u64>,
}

/// Handler signature for [`poll_and_claim`].
pub type PollAndClaimHandler = fn(&HubState, PollAndClaimRequest) -> ToolResult<PollAndClaimResponse>;

/// Poll for the highest-ranked claimable task and claim it in one step.
/// Not behind the idempotency gate: each call is expected to observe fresh
/// state and is inherently non-replayable.
pub fn poll_and_claim(hub: &HubState, req: PollAndClaimRequest) -> ToolResult<PollAndClaimResponse> {
    hub.metrics.record_poll();
    let mut reclaimed = false;
    let result = mutate_no_cache(&hub.store, |state| {
        heartbeat(state, &req.agent_id, req.runtime_profile.clone());
        let outcome = hub_scheduler::poll_and_claim(state, &req.agent_id, req.lease_seconds)?;
        reclaimed = outcome.reclaimed;
        Ok(PollAndClaimResponse {
            task: outcome.task,
            claim: outcome.claim,
            retry_after_ms: outcome.retry_after_ms,
        })
    });
    if let Ok(ref resp) = result {
        if resp.claim.is_some() {
            hub.metrics.record_claim();
        }
        if reclaimed {
            hub.metrics.record_reclaimed_leases(1);
        }
    }
    result
}

// ---------------------------------------------------------------------
// claim_task
// ---------------------------------------------------------------------

/// Request for [`claim_task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimTaskRequest {
    /// Task to claim.
    pub task_id: RowId,
    /// Claiming agent.
    pub agent_id: AgentId,
    /// Lease duration in seconds.
    pub lease_seconds: u64,
    /// Profile to heartbeat the agent with.
    pub runtime_profile: Option<RuntimeProfile>,
    /// Replay key for the idempotency gate.
    pub idempotency_key: Option<String>,
}

/// Response for [`claim_task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimTaskResponse {
    /// The new claim.
    pub claim: Claim,
}

/// Handler signature for [`claim_task`].
pub type ClaimTaskHandler = fn(&HubState, ClaimTaskRequest) -> ToolResult<ClaimTaskResponse>;

/// Claim a specific task by id, subject to profile compatibility and any
/// existing live claim.
pub fn claim_task(hub: &HubState, req: ClaimTaskRequest) -> ToolResult<ClaimTaskResponse> {
    let cfg = &hub.config;
    let result = dispatch(
        &hub.store,
        &hub.metrics,
        &req.agent_id,
        "claim_task",
        req.idempotency_key.as_deref(),
        cfg.idempotency_retention_secs,
        |state| {
            heartbeat(state, &req.agent_id, req.runtime_profile.clone());
            let claim = claims::claim(state, req.task_id, &req.agent_id, req.lease_seconds)?;
            Ok(ClaimTaskResponse { claim })
        },
    );
    if result.is_ok() {
        hub.metrics.record_claim();
    }
    result
}

// ---------------------------------------------------------------------
// renew_task_claim
// ---------------------------------------------------------------------

/// Request for [`renew_task_claim`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewTaskClaimRequest {
    /// Task whose claim to renew.
    pub task_id: RowId,
    /// Claiming agent; must match the existing claim's holder.
    pub agent_id: AgentId,
    /// New lease duration in seconds, measured from now.
    pub lease_seconds: u64,
    /// Profile to heartbeat the agent with.
    pub runtime_profile: Option<RuntimeProfile>,
}

/// Response for [`renew_task_claim`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewTaskClaimResponse {
    /// The renewed claim.
    pub claim: Claim,
}

/// Handler signature for [`renew_task_claim`].
pub type RenewTaskClaimHandler =
    fn(&HubState, RenewTaskClaimRequest) -> ToolResult<RenewTaskClaimResponse>;

/// Extend a held claim's lease. Not behind the idempotency gate: each call
/// is expected to push the expiry further out, so replaying the first
/// result would defeat the purpose.
pub fn renew_task_claim(
    hub: &HubState,
    req: RenewTaskClaimRequest,
) -> ToolResult<RenewTaskClaimResponse> {
    let result = mutate_no_cache(&hub.store, |state| {
        heartbeat(state, &req.agent_id, req.runtime_profile.clone());
        let claim = claims::renew(state, req.task_id, &req.agent_id, req.lease_seconds)?;
        Ok(RenewTaskClaimResponse { claim })
    });
    if result.is_ok() {
        hub.metrics.record_renewal();
    }
    result
}

// ---------------------------------------------------------------------
// release_task_claim
// ---------------------------------------------------------------------

/// Request for [`release_task_claim`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseTaskClaimRequest {
    /// Task whose claim to release.
    pub task_id: RowId,
    /// Claiming agent; must match the existing claim's holder.
    pub agent_id: AgentId,
    /// Status to leave the task in.
    pub next_status: TaskStatus,
    /// Confidence score, required to transition into `Done`.
    pub confidence: Option<f64>,
    /// Whether independent verification passed, required for `Done`.
    pub verification_passed: Option<bool>,
    /// Verifying agent; required in strict consistency mode.
    pub verified_by: Option<AgentId>,
    /// Supporting evidence references; required, non-empty, for `Done`.
    pub evidence_refs: Option<Vec<String>>,
    /// Profile to heartbeat the agent with.
    pub runtime_profile: Option<RuntimeProfile>,
}

/// Response for [`release_task_claim`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseTaskClaimResponse {
    /// The task after the release.
    pub task: Task,
}

/// Handler signature for [`release_task_claim`].
pub type ReleaseTaskClaimHandler =
    fn(&HubState, ReleaseTaskClaimRequest) -> ToolResult<ReleaseTaskClaimResponse>;

/// Transition the task and drop its claim in one step. The claim is
/// preserved if the status transition is rejected.
pub fn release_task_claim(
    hub: &HubState,
    req: ReleaseTaskClaimRequest,
) -> ToolResult<ReleaseTaskClaimResponse> {
    let cfg = &hub.config;
    let result = mutate_no_cache(&hub.store, |state| {
        heartbeat(state, &req.agent_id, req.runtime_profile.clone());
        let task = claims::release(
            state,
            claims::ReleaseInput {
                task_id: req.task_id,
                agent_id: req.agent_id.clone(),
                next_status: req.next_status,
                confidence: req.confidence,
                verification_passed: req.verification_passed,
                verified_by: req.verified_by.clone(),
                evidence_refs: req.evidence_refs.clone(),
                confidence_floor: cfg.done_confidence_floor,
            },
        )?;
        Ok(ReleaseTaskClaimResponse { task })
    });
    if let Err(ref dto) = result {
        if dto.code == ErrorCode::DoneGateFailed {
            hub.metrics.record_done_gate_failure();
        }
    }
    result
}

// ---------------------------------------------------------------------
// list_task_claims
// ---------------------------------------------------------------------

/// Request for [`list_task_claims`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListTaskClaimsRequest {}

/// Response for [`list_task_claims`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTaskClaimsResponse {
    /// Every live claim.
    pub claims: Vec<Claim>,
}

/// Handler signature for [`list_task_claims`].
pub type ListTaskClaimsHandler =
    fn(&HubState, ListTaskClaimsRequest) -> ToolResult<ListTaskClaimsResponse>;

/// List every unexpired claim.
pub fn list_task_claims(
    hub: &HubState,
    _req: ListTaskClaimsRequest,
) -> ToolResult<ListTaskClaimsResponse> {
    read_only(&hub.store, |state| {
        Ok(ListTaskClaimsResponse {
            claims: claims::list_claims(state),
        })
    })
}

// ---------------------------------------------------------------------
// attach_task_artifact
// ---------------------------------------------------------------------

/// Request for [`attach_task_artifact`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachTaskArtifactRequest {
    /// Task to attach the artifact to.
    pub task_id: RowId,
    /// Opaque artifact identifier.
    pub artifact_id: String,
    /// Agent attaching the artifact; granted read access automatically.
    pub attached_by: AgentId,
    /// Profile to heartbeat the agent with.
    pub runtime_profile: Option<RuntimeProfile>,
    /// Replay key for the idempotency gate.
    pub idempotency_key: Option<String>,
}

/// Response for [`attach_task_artifact`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachTaskArtifactResponse {
    /// The new attachment link.
    pub link: TaskArtifactLink,
}

/// Handler signature for [`attach_task_artifact`].
pub type AttachTaskArtifactHandler =
    fn(&HubState, AttachTaskArtifactRequest) -> ToolResult<AttachTaskArtifactResponse>;

/// Attach an artifact to a task and grant the attaching agent read access.
pub fn attach_task_artifact(
    hub: &HubState,
    req: AttachTaskArtifactRequest,
) -> ToolResult<AttachTaskArtifactResponse> {
    let cfg = &hub.config;
    dispatch(
        &hub.store,
        &hub.metrics,
        &req.attached_by,
        "attach_task_artifact",
        req.idempotency_key.as_deref(),
        cfg.idempotency_retention_secs,
        |state| {
            heartbeat(state, &req.attached_by, req.runtime_profile.clone());
            let link = tasks::attach_task_artifact(
                state,
                &hub.acl,
                req.task_id,
                &req.artifact_id,
                &req.attached_by,
            )?;
            Ok(AttachTaskArtifactResponse { link })
        },
    )
}

// ---------------------------------------------------------------------
// list_task_artifacts
// ---------------------------------------------------------------------

/// Wire-friendly copy of `hub_store::tasks::ArtifactView`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactViewDto {
    /// Opaque artifact identifier.
    pub artifact_id: String,
    /// Agent that attached it.
    pub attached_by: AgentId,
    /// Attachment time, ms epoch.
    pub attached_at: EpochMs,
    /// Whether the requesting agent has read access.
    pub has_access: bool,
    /// Whether the artifact has been finalized and is downloadable.
    pub ready: bool,
}

/// Request for [`list_task_artifacts`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTaskArtifactsRequest {
    /// Task whose artifacts to list.
    pub task_id: RowId,
    /// Agent whose access is being checked.
    pub requesting_agent: AgentId,
}

/// Response for [`list_task_artifacts`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTaskArtifactsResponse {
    /// Attached artifacts, annotated with access and readiness.
    pub artifacts: Vec<ArtifactViewDto>,
}

/// Handler signature for [`list_task_artifacts`].
pub type ListTaskArtifactsHandler =
    fn(&HubState, ListTaskArtifactsRequest) -> ToolResult<ListTaskArtifactsResponse>;

/// List artifacts attached to a task, annotated for the requesting agent.
pub fn list_task_artifacts(
    hub: &HubState,
    req: ListTaskArtifactsRequest,
) -> ToolResult<ListTaskArtifactsResponse> {
    read_only(&hub.store, |state| {
        let artifacts = tasks::list_task_artifacts(state, &hub.acl, req.task_id, &req.requesting_agent)
            .into_iter()
            .map(|v| ArtifactViewDto {
                artifact_id: v.artifact_id,
                attached_by: v.attached_by,
                attached_at: v.attached_at,
                has_access: v.has_access,
                ready: v.ready,
            })
            .collect();
        Ok(ListTaskArtifactsResponse { artifacts })
    })
}

// ---------------------------------------------------------------------
// get_task_handoff
// ---------------------------------------------------------------------

/// Request for [`get_task_handoff`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskHandoffRequest {
    /// Task to assemble a handoff packet for.
    pub task_id: RowId,
    /// Agent requesting the handoff.
    pub requesting_agent: AgentId,
    /// One of `full`, `compact`, `tiny`, `nano`.
    pub response_mode: String,
    /// Resolve time-bounded download tickets for attached artifacts.
    pub include_downloads: bool,
    /// Ticket lifetime in seconds, if `include_downloads` is set.
    pub download_ttl_sec: u64,
}

/// Response for [`get_task_handoff`].
pub type GetTaskHandoffResponse = hub_handoff::HandoffResult;

/// Handler signature for [`get_task_handoff`].
pub type GetTaskHandoffHandler =
    fn(&HubState, GetTaskHandoffRequest) -> ToolResult<GetTaskHandoffResponse>;

/// Assemble the handoff packet for a task: its row, resolved dependencies,
/// evidence, attached artifacts, and optionally download tickets.
pub fn get_task_handoff(
    hub: &HubState,
    req: GetTaskHandoffRequest,
) -> ToolResult<GetTaskHandoffResponse> {
    let mode = ResponseMode::parse(&req.response_mode);
    read_only(&hub.store, |state| {
        hub_handoff::get_task_handoff(
            state,
            &hub.acl,
            &hub.issuer,
            req.task_id,
            &req.requesting_agent,
            mode,
            req.include_downloads,
            req.download_ttl_sec,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::RuntimeMode;

    fn hub() -> HubState {
        HubState::default()
    }

    #[test]
    fn send_and_read_round_trip() {
        let hub = hub();
        let sent = send_message(
            &hub,
            SendMessageRequest {
                from_agent: "a1".into(),
                to_agent: Some("a2".into()),
                content: "hello".into(),
                metadata: None,
                trace_id: None,
                span_id: None,
                runtime_profile: None,
                idempotency_key: None,
            },
        )
        .unwrap();
        assert_eq!(sent.message.content, "hello");

        let read = read_messages(
            &hub,
            ReadMessagesRequest {
                agent_id: "a2".into(),
                from: None,
                unread_only: true,
                limit: 10,
                offset: 0,
                since_ts: None,
                cursor: None,
                polling: false,
                response_mode: "full".into(),
                resolve_blob_refs: false,
            },
        )
        .unwrap();
        assert_eq!(read.messages.len(), 1);
    }

    #[test]
    fn blob_message_round_trips_and_resolves() {
        let hub = hub();
        let payload = "   lots   of   whitespace   here   ".repeat(5);
        let sent = send_blob_message(
            &hub,
            SendBlobMessageRequest {
                from_agent: "a1".into(),
                to_agent: None,
                payload: payload.clone(),
                compression_mode: "lossless_auto".into(),
                metadata: None,
                trace_id: None,
                span_id: None,
                runtime_profile: None,
                idempotency_key: None,
            },
        )
        .unwrap();
        assert!(sent.blob_ref["hash"].is_string());

        let read = read_messages(
            &hub,
            ReadMessagesRequest {
                agent_id: "a1".into(),
                from: None,
                unread_only: false,
                limit: 10,
                offset: 0,
                since_ts: None,
                cursor: None,
                polling: false,
                response_mode: "full".into(),
                resolve_blob_refs: true,
            },
        )
        .unwrap();
        let resolved = &read.messages[0];
        assert_eq!(resolved["resolved_content"], json!(payload));
    }

    #[test]
    fn full_mode_rejected_while_polling() {
        let hub = hub();
        let err = read_messages(
            &hub,
            ReadMessagesRequest {
                agent_id: "a1".into(),
                from: None,
                unread_only: false,
                limit: 10,
                offset: 0,
                since_ts: None,
                cursor: None,
                polling: true,
                response_mode: "full".into(),
                resolve_blob_refs: false,
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::FullModeForbiddenInPolling);
    }

    #[test]
    fn create_task_is_idempotent_on_repeat_key() {
        let hub = hub();
        let input = || CreateTaskRequest {
            title: "t".into(),
            description: "d".into(),
            created_by: "a1".into(),
            assigned_to: None,
            priority: Priority::Medium,
            namespace: None,
            depends_on: BTreeSet::new(),
            execution_mode: RuntimeMode::Any,
            consistency_mode_override: None,
            runtime_profile: None,
            idempotency_key: Some("create-1".into()),
        };
        let first = create_task(&hub, input()).unwrap();
        let second = create_task(&hub, input()).unwrap();
        assert_eq!(first.task.id, second.task.id);
        assert_eq!(hub.metrics.snapshot().idempotency_hits, 1);
    }

    #[test]
    fn poll_and_claim_returns_retry_hint_when_empty() {
        let hub = hub();
        let result = poll_and_claim(
            &hub,
            PollAndClaimRequest {
                agent_id: "a1".into(),
                lease_seconds: 60,
                runtime_profile: None,
            },
        )
        .unwrap();
        assert!(result.task.is_none());
        assert!(result.retry_after_ms.is_some());
    }

    #[test]
    fn poll_and_claim_bumps_reclaimed_leases_metric_on_expired_lease() {
        let hub = hub();
        create_task(
            &hub,
            CreateTaskRequest {
                title: "t".into(),
                description: "d".into(),
                created_by: "creator".into(),
                assigned_to: None,
                priority: Priority::Medium,
                namespace: None,
                depends_on: Default::default(),
                execution_mode: RuntimeMode::Any,
                consistency_mode_override: None,
                runtime_profile: None,
                idempotency_key: None,
            },
        )
        .unwrap();

        poll_and_claim(
            &hub,
            PollAndClaimRequest {
                agent_id: "a1".into(),
                lease_seconds: 0,
                runtime_profile: None,
            },
        )
        .unwrap();
        assert_eq!(hub.metrics.snapshot().reclaimed_leases, 0);

        poll_and_claim(
            &hub,
            PollAndClaimRequest {
                agent_id: "a1".into(),
                lease_seconds: 60,
                runtime_profile: None,
            },
        )
        .unwrap();
        assert_eq!(hub.metrics.snapshot().reclaimed_leases, 1);
    }

    #[test]
    fn update_task_done_gate_failure_bumps_metric() {
        let hub = hub();
        let created = create_task(
            &hub,
            CreateTaskRequest {
                title: "t".into(),
                description: "d".into(),
                created_by: "a1".into(),
                assigned_to: None,
                priority: Priority::Medium,
                namespace: None,
                depends_on: BTreeSet::new(),
                execution_mode: RuntimeMode::Any,
                consistency_mode_override: None,
                runtime_profile: None,
                idempotency_key: None,
            },
        )
        .unwrap();

        let err = update_task(
            &hub,
            UpdateTaskRequest {
                task_id: created.task.id,
                updating_agent: "a1".into(),
                status: TaskStatus::Done,
                confidence: None,
                verification_passed: None,
                verified_by: None,
                evidence_refs: None,
                runtime_profile: None,
                idempotency_key: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DoneGateFailed);
        assert_eq!(hub.metrics.snapshot().done_gate_failures, 1);
    }

    #[test]
    fn attach_and_list_task_artifacts() {
        let hub = hub();
        let created = create_task(
            &hub,
            CreateTaskRequest {
                title: "t".into(),
                description: "d".into(),
                created_by: "a1".into(),
                assigned_to: None,
                priority: Priority::Medium,
                namespace: None,
                depends_on: BTreeSet::new(),
                execution_mode: RuntimeMode::Any,
                consistency_mode_override: None,
                runtime_profile: None,
                idempotency_key: None,
            },
        )
        .unwrap();

        attach_task_artifact(
            &hub,
            AttachTaskArtifactRequest {
                task_id: created.task.id,
                artifact_id: "art1".into(),
                attached_by: "a1".into(),
                runtime_profile: None,
                idempotency_key: None,
            },
        )
        .unwrap();

        let listed = list_task_artifacts(
            &hub,
            ListTaskArtifactsRequest {
                task_id: created.task.id,
                requesting_agent: "a1".into(),
            },
        )
        .unwrap();
        assert_eq!(listed.artifacts.len(), 1);
        assert!(listed.artifacts[0].has_access);
    }

    #[test]
    fn handoff_assembles_task_and_dependencies() {
        let hub = hub();
        let dep = create_task(
            &hub,
            CreateTaskRequest {
                title: "dep".into(),
                description: "d".into(),
                created_by: "a1".into(),
                assigned_to: None,
                priority: Priority::Medium,
                namespace: None,
                depends_on: BTreeSet::new(),
                execution_mode: RuntimeMode::Any,
                consistency_mode_override: None,
                runtime_profile: None,
                idempotency_key: None,
            },
        )
        .unwrap();
        let mut deps = BTreeSet::new();
        deps.insert(dep.task.id);
        let task = create_task(
            &hub,
            CreateTaskRequest {
                title: "main".into(),
                description: "d".into(),
                created_by: "a1".into(),
                assigned_to: None,
                priority: Priority::Medium,
                namespace: None,
                depends_on: deps,
                execution_mode: RuntimeMode::Any,
                consistency_mode_override: None,
                runtime_profile: None,
                idempotency_key: None,
            },
        )
        .unwrap();

        let handoff = get_task_handoff(
            &hub,
            GetTaskHandoffRequest {
                task_id: task.task.id,
                requesting_agent: "a1".into(),
                response_mode: "full".into(),
                include_downloads: false,
                download_ttl_sec: 60,
            },
        )
        .unwrap();
        assert_eq!(handoff.depends_on.len(), 1);
    }
}
