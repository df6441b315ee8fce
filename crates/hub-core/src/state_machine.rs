// SPDX-License-Identifier: MIT OR Apache-2.0
//! Task status transition graph and the terminal "done gate".
//!
//! ```text
//! pending ──► in_progress ──► done
//!     │           │
//!     ├──────────►├──► blocked ──► in_progress
//!     │           │
//!     └──► cancelled  (from any non-terminal)
//! ```

use crate::{AgentId, ConsistencyMode, TaskStatus};
use hub_error::{ErrorCode, HubError};

/// Returns `true` if `from -> to` is a legal transition in the graph above.
///
/// A "transition" to the same status is not itself part of the graph;
/// callers that allow no-op updates should special-case `from == to`.
#[must_use]
pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    if from.is_terminal() {
        return false;
    }
    match (from, to) {
        (Pending, InProgress) => true,
        (InProgress, Done) => true,
        (InProgress, Blocked) => true,
        (Blocked, InProgress) => true,
        (_, Cancelled) => true,
        _ => false,
    }
}

/// Inputs to the done gate, gathered from the pending task update.
#[derive(Debug, Clone, Copy)]
pub struct DoneGateInput<'a> {
    /// Self-reported confidence, if supplied.
    pub confidence: Option<f64>,
    /// Minimum acceptable confidence (from configuration).
    pub confidence_floor: f64,
    /// Whether verification passed.
    pub verification_passed: bool,
    /// Evidence references supplied with the update.
    pub evidence_refs: &'a [String],
    /// The task's consistency mode.
    pub consistency_mode: ConsistencyMode,
    /// Agent performing the update.
    pub updating_agent: &'a AgentId,
    /// Agent that originally created the task.
    pub created_by: &'a AgentId,
    /// Independent verifier, if supplied with the update.
    pub verified_by: Option<&'a AgentId>,
}

/// Evaluate the preconditions for entering `done`.
///
/// Returns `Ok(())` if the gate is satisfied, otherwise a [`HubError`] with
/// [`ErrorCode::DoneGateFailed`] or, in strict consistency mode without an
/// independent verifier, [`ErrorCode::VerifierRequired`].
pub fn evaluate_done_gate(input: DoneGateInput<'_>) -> Result<(), HubError> {
    let confidence_ok = matches!(input.confidence, Some(c) if c >= input.confidence_floor);
    let evidence_ok = !input.evidence_refs.is_empty()
        && input.evidence_refs.iter().all(|e| !e.trim().is_empty());

    if !confidence_ok || !input.verification_passed || !evidence_ok {
        return Err(HubError::new(
            ErrorCode::DoneGateFailed,
            "done gate requires confidence >= floor, verification_passed, and non-empty evidence_refs",
        )
        .with_context("confidence", input.confidence)
        .with_context("confidence_floor", input.confidence_floor)
        .with_context("verification_passed", input.verification_passed)
        .with_context("evidence_count", input.evidence_refs.len()));
    }

    if matches!(input.consistency_mode, ConsistencyMode::Strict) {
        let independent = match input.verified_by {
            Some(v) => v != input.updating_agent && v != input.created_by,
            None => false,
        };
        if !independent {
            return Err(HubError::new(
                ErrorCode::VerifierRequired,
                "strict consistency mode requires verified_by to differ from the updater and the creator",
            ));
        }
    }

    Ok(())
}
