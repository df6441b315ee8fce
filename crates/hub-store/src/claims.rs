// SPDX-License-Identifier: MIT OR Apache-2.0
//! Claim/lease lifecycle: exclusive, time-bounded task assignment.
//!
//! Expired claims are never deleted outright — they are retained so
//! `list_claims`/audits can see lease history; eligibility checks treat an
//! expired claim as absent instead.

use crate::state::{now_ms, State};
use crate::tasks::{self, UpdateTaskInput};
use hub_core::{AgentId, Claim, RowId, Task, TaskStatus};
use hub_error::{ErrorCode, HubError};

/// Attempt to assign `task_id` to `agent_id` for `lease_seconds`.
///
/// # Errors
///
/// [`ErrorCode::NotFound`] if the task or agent does not exist,
/// [`ErrorCode::ProfileMismatch`] if the task's `execution_mode` is
/// incompatible with the agent's declared runtime, or
/// [`ErrorCode::ClaimConflict`] if the task is not in a claimable status or
/// already has a live claim.
pub fn claim(
    state: &mut State,
    task_id: RowId,
    agent_id: &str,
    lease_seconds: u64,
) -> Result<Claim, HubError> {
    let now = now_ms();
    let agent = state
        .agent(agent_id)
        .ok_or_else(|| HubError::new(ErrorCode::NotFound, format!("no agent {agent_id}")))?
        .clone();
    let task = state
        .task(task_id)
        .ok_or_else(|| HubError::new(ErrorCode::NotFound, format!("no task {task_id}")))?
        .clone();

    if !matches!(
        task.status,
        TaskStatus::Pending | TaskStatus::InProgress | TaskStatus::Blocked
    ) {
        return Err(HubError::new(
            ErrorCode::ClaimConflict,
            format!("task {task_id} is not in a claimable status ({:?})", task.status),
        ));
    }
    if state.live_claim(task_id, now).is_some() {
        return Err(HubError::new(
            ErrorCode::ClaimConflict,
            format!("task {task_id} already has a live claim"),
        ));
    }
    if !task
        .execution_mode
        .compatible_with(agent.runtime_profile.mode)
    {
        return Err(HubError::new(
            ErrorCode::ProfileMismatch,
            format!(
                "task execution_mode {:?} incompatible with agent runtime mode {:?}",
                task.execution_mode, agent.runtime_profile.mode
            ),
        ));
    }

    let claim = Claim {
        task_id,
        agent_id: agent_id.to_string(),
        lease_expires_at: now + (lease_seconds as i64) * 1000,
        claimed_at: now,
    };
    state.claims.insert(task_id, claim.clone());
    let row = state.tasks.get_mut(&task_id).expect("checked above");
    row.assigned_to = Some(agent_id.to_string());
    row.status = TaskStatus::InProgress;
    row.updated_at = now;

    Ok(claim)
}

/// Extend a live claim held by `agent_id` by `lease_seconds`.
///
/// # Errors
///
/// [`ErrorCode::ClaimNotHeld`] if no claim by this agent exists,
/// [`ErrorCode::ClaimExpired`] if it has already expired.
pub fn renew(
    state: &mut State,
    task_id: RowId,
    agent_id: &str,
    lease_seconds: u64,
) -> Result<Claim, HubError> {
    let now = now_ms();
    let existing = state
        .claim(task_id)
        .ok_or_else(|| HubError::new(ErrorCode::ClaimNotHeld, format!("no claim on task {task_id}")))?;
    if existing.agent_id != agent_id {
        return Err(HubError::new(
            ErrorCode::ClaimNotHeld,
            format!("task {task_id} is not claimed by {agent_id}"),
        ));
    }
    if existing.is_expired(now) {
        return Err(HubError::new(
            ErrorCode::ClaimExpired,
            format!("claim on task {task_id} has expired"),
        ));
    }

    let claim = state.claims.get_mut(&task_id).expect("checked above");
    claim.lease_expires_at = now + (lease_seconds as i64) * 1000;
    Ok(claim.clone())
}

/// Arguments to [`release`].
#[derive(Debug, Clone)]
pub struct ReleaseInput {
    /// Task whose claim is being released.
    pub task_id: RowId,
    /// Claim holder releasing it.
    pub agent_id: AgentId,
    /// Status to transition the task into before releasing the claim.
    pub next_status: TaskStatus,
    /// See [`UpdateTaskInput::confidence`].
    pub confidence: Option<f64>,
    /// See [`UpdateTaskInput::verification_passed`].
    pub verification_passed: Option<bool>,
    /// See [`UpdateTaskInput::verified_by`].
    pub verified_by: Option<AgentId>,
    /// See [`UpdateTaskInput::evidence_refs`].
    pub evidence_refs: Option<Vec<String>>,
    /// Confidence floor for the done gate.
    pub confidence_floor: f64,
}

/// Transition the task per `input.next_status` (including the done gate),
/// then delete the claim. If the transition fails, the claim is preserved
/// so the agent can retry.
///
/// # Errors
///
/// Propagates [`ErrorCode::ClaimNotHeld`]/[`ErrorCode::ClaimExpired`] from
/// the same checks as [`renew`], or any error from the underlying task
/// transition (`InvalidTransition`, `DoneGateFailed`, `VerifierRequired`).
pub fn release(state: &mut State, input: ReleaseInput) -> Result<Task, HubError> {
    let now = now_ms();
    let existing = state.claim(input.task_id).ok_or_else(|| {
        HubError::new(ErrorCode::ClaimNotHeld, format!("no claim on task {}", input.task_id))
    })?;
    if existing.agent_id != input.agent_id {
        return Err(HubError::new(
            ErrorCode::ClaimNotHeld,
            format!("task {} is not claimed by {}", input.task_id, input.agent_id),
        ));
    }
    if existing.is_expired(now) {
        return Err(HubError::new(
            ErrorCode::ClaimExpired,
            format!("claim on task {} has expired", input.task_id),
        ));
    }

    let task = tasks::update_task(
        state,
        UpdateTaskInput {
            task_id: input.task_id,
            updating_agent: input.agent_id.clone(),
            status: input.next_status,
            confidence: input.confidence,
            verification_passed: input.verification_passed,
            verified_by: input.verified_by,
            evidence_refs: input.evidence_refs,
            confidence_floor: input.confidence_floor,
        },
    )?;

    state.claims.remove(&input.task_id);
    Ok(task)
}

/// All currently live (non-expired) claims.
#[must_use]
pub fn list_claims(state: &State) -> Vec<Claim> {
    let now = now_ms();
    state
        .claims_iter()
        .filter(|c| !c.is_expired(now))
        .cloned()
        .collect()
}
