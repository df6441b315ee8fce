// SPDX-License-Identifier: MIT OR Apache-2.0
//! Task store: creation with dependency validation, the status transition
//! graph plus done gate, listing, and artifact attachment.

use crate::state::{now_ms, State};
use hub_core::collaborators::ArtifactAcl;
use hub_core::state_machine::{can_transition, evaluate_done_gate, DoneGateInput};
use hub_core::{
    AgentId, ConsistencyMode, Priority, RowId, RuntimeMode, Task, TaskArtifactLink, TaskStatus,
};
use hub_error::{ErrorCode, HubError};
use std::collections::BTreeSet;

/// Arguments to [`create_task`].
#[derive(Debug, Clone)]
pub struct CreateTaskInput {
    /// Short title.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Agent creating the task.
    pub created_by: AgentId,
    /// Initial claimant, if pre-assigned.
    pub assigned_to: Option<AgentId>,
    /// Scheduling priority.
    pub priority: Priority,
    /// Opaque governance grouping tag.
    pub namespace: Option<String>,
    /// Ids of tasks that must be `done` before this one is dependency-ready.
    pub depends_on: BTreeSet<RowId>,
    /// Where this task is permitted to execute.
    pub execution_mode: RuntimeMode,
    /// Explicit override of the priority-derived consistency mode.
    pub consistency_mode_override: Option<ConsistencyMode>,
}

/// Result of [`create_task`].
#[derive(Debug, Clone)]
pub struct CreateTaskOutcome {
    /// The newly created row.
    pub task: Task,
    /// Non-fatal namespace policy warning, if the title/description matched
    /// a configured orchestration keyword and no namespace was supplied.
    pub namespace_advisory: Option<String>,
}

fn matches_namespace_keyword(title: &str, description: &str, keywords: &[String]) -> bool {
    let haystack = format!("{title} {description}").to_lowercase();
    keywords
        .iter()
        .any(|kw| !kw.is_empty() && haystack.contains(&kw.to_lowercase()))
}

/// Returns `true` if `target` is reachable from `start` by following
/// `depends_on` edges of already-inserted tasks.
fn has_path(state: &State, start: RowId, target: RowId) -> bool {
    let mut frontier = vec![start];
    let mut visited = BTreeSet::new();
    while let Some(id) = frontier.pop() {
        if id == target {
            return true;
        }
        if !visited.insert(id) {
            continue;
        }
        if let Some(task) = state.task(id) {
            frontier.extend(task.depends_on.iter().copied());
        }
    }
    false
}

/// Validate and insert a new task.
///
/// # Errors
///
/// Returns [`ErrorCode::DependencyMissing`] if any `depends_on` id does not
/// exist, or [`ErrorCode::DependencyCycle`] if inserting the edge set would
/// create a cycle.
pub fn create_task(
    state: &mut State,
    input: CreateTaskInput,
    namespace_keywords: &[String],
) -> Result<CreateTaskOutcome, HubError> {
    for dep in &input.depends_on {
        if state.task(*dep).is_none() {
            return Err(HubError::new(
                ErrorCode::DependencyMissing,
                format!("depends_on references nonexistent task {dep}"),
            ));
        }
    }

    let id = state.next_task_id();

    for dep in &input.depends_on {
        if *dep == id || has_path(state, *dep, id) {
            return Err(HubError::new(
                ErrorCode::DependencyCycle,
                format!("depends_on introduces a cycle through task {dep}"),
            ));
        }
    }

    let consistency_mode = input.consistency_mode_override.unwrap_or(
        if input.priority == Priority::Critical {
            ConsistencyMode::Strict
        } else {
            ConsistencyMode::Relaxed
        },
    );

    let advisory = if input.namespace.is_none()
        && matches_namespace_keyword(&input.title, &input.description, namespace_keywords)
    {
        Some(
            "title/description matches an orchestration keyword but no namespace was supplied"
                .to_string(),
        )
    } else {
        None
    };

    let now = now_ms();
    let task = Task {
        id,
        title: input.title,
        description: input.description,
        created_by: input.created_by,
        assigned_to: input.assigned_to,
        status: TaskStatus::Pending,
        priority: input.priority,
        namespace: input.namespace,
        depends_on: input.depends_on,
        execution_mode: input.execution_mode,
        consistency_mode,
        confidence: None,
        verification_passed: false,
        verified_by: None,
        evidence_refs: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    state.tasks.insert(id, task.clone());

    Ok(CreateTaskOutcome {
        task,
        namespace_advisory: advisory,
    })
}

/// Arguments to [`update_task`]. `status == <current status>` is treated as
/// a field-only update with no transition or done-gate check.
#[derive(Debug, Clone)]
pub struct UpdateTaskInput {
    /// Task to update.
    pub task_id: RowId,
    /// Agent performing the update.
    pub updating_agent: AgentId,
    /// Target status.
    pub status: TaskStatus,
    /// Confidence override; falls back to the task's stored value.
    pub confidence: Option<f64>,
    /// Verification-passed override; falls back to the task's stored value.
    pub verification_passed: Option<bool>,
    /// Independent verifier override; falls back to the task's stored value.
    pub verified_by: Option<AgentId>,
    /// Evidence references override; falls back to the task's stored value.
    pub evidence_refs: Option<Vec<String>>,
    /// Confidence floor for the done gate (from configuration).
    pub confidence_floor: f64,
}

/// Apply a status transition (or field-only no-op update) to a task.
///
/// # Errors
///
/// Returns [`ErrorCode::NotFound`] if the task does not exist,
/// [`ErrorCode::InvalidTransition`] if `from -> to` is not legal,
/// [`ErrorCode::DoneGateFailed`]/[`ErrorCode::VerifierRequired`] if the
/// transition into `done` fails its gate.
pub fn update_task(state: &mut State, input: UpdateTaskInput) -> Result<Task, HubError> {
    let current = state
        .task(input.task_id)
        .ok_or_else(|| HubError::new(ErrorCode::NotFound, format!("no task {}", input.task_id)))?
        .clone();

    let same_status = input.status == current.status;
    if !same_status && !can_transition(current.status, input.status) {
        return Err(HubError::new(
            ErrorCode::InvalidTransition,
            format!("cannot transition task from {:?} to {:?}", current.status, input.status),
        ));
    }

    let confidence = input.confidence.or(current.confidence);
    let verification_passed = input.verification_passed.unwrap_or(current.verification_passed);
    let verified_by = input.verified_by.or_else(|| current.verified_by.clone());
    let evidence_refs = input.evidence_refs.unwrap_or_else(|| current.evidence_refs.clone());

    if !same_status && input.status == TaskStatus::Done {
        evaluate_done_gate(DoneGateInput {
            confidence,
            confidence_floor: input.confidence_floor,
            verification_passed,
            evidence_refs: &evidence_refs,
            consistency_mode: current.consistency_mode,
            updating_agent: &input.updating_agent,
            created_by: &current.created_by,
            verified_by: verified_by.as_ref(),
        })?;
    }

    let task = state.tasks.get_mut(&input.task_id).expect("checked above");
    task.status = input.status;
    task.confidence = confidence;
    task.verification_passed = verification_passed;
    task.verified_by = verified_by;
    task.evidence_refs = evidence_refs;
    task.updated_at = now_ms();
    Ok(task.clone())
}

/// Filters for [`list_tasks`].
#[derive(Debug, Clone, Default)]
pub struct TaskListQuery {
    /// Restrict to this status.
    pub status: Option<TaskStatus>,
    /// Restrict to this assignee.
    pub assigned_to: Option<AgentId>,
    /// Restrict to this namespace.
    pub namespace: Option<String>,
    /// Maximum rows to return.
    pub limit: usize,
    /// Skip this many matching rows before collecting.
    pub offset: usize,
}

/// List tasks matching `query`, newest-first by `(created_at, id)`.
#[must_use]
pub fn list_tasks(state: &State, query: &TaskListQuery) -> Vec<Task> {
    let mut matching: Vec<Task> = state
        .tasks
        .values()
        .filter(|t| query.status.is_none_or(|s| t.status == s))
        .filter(|t| query.assigned_to.as_deref().is_none_or(|a| t.assigned_to.as_deref() == Some(a)))
        .filter(|t| query.namespace.as_deref().is_none_or(|n| t.namespace.as_deref() == Some(n)))
        .cloned()
        .collect();
    matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
    matching.into_iter().skip(query.offset).take(query.limit).collect()
}

/// Attach an artifact to a task, granting the current assignee read access.
///
/// # Errors
///
/// Returns [`ErrorCode::NotFound`] if the task does not exist.
pub fn attach_task_artifact<A: ArtifactAcl>(
    state: &mut State,
    acl: &A,
    task_id: RowId,
    artifact_id: &str,
    attached_by: &str,
) -> Result<TaskArtifactLink, HubError> {
    let task = state
        .task(task_id)
        .ok_or_else(|| HubError::new(ErrorCode::NotFound, format!("no task {task_id}")))?;

    if let Some(assignee) = &task.assigned_to {
        acl.grant_read_access(task_id, artifact_id, assignee);
    }

    let link = TaskArtifactLink {
        task_id,
        artifact_id: artifact_id.to_string(),
        attached_by: attached_by.to_string(),
        attached_at: now_ms(),
    };
    state.artifact_links.push(link.clone());
    Ok(link)
}

/// One attached artifact, annotated with the requester's access and the
/// artifact's readiness.
#[derive(Debug, Clone)]
pub struct ArtifactView {
    /// Opaque artifact identifier.
    pub artifact_id: String,
    /// Agent that attached it.
    pub attached_by: AgentId,
    /// Attachment timestamp, ms epoch.
    pub attached_at: hub_core::EpochMs,
    /// Whether `requesting_agent` has read access.
    pub has_access: bool,
    /// Whether the artifact has been finalized and is downloadable.
    pub ready: bool,
}

/// List artifacts attached to `task_id`, annotated for `requesting_agent`.
#[must_use]
pub fn list_task_artifacts<A: ArtifactAcl>(
    state: &State,
    acl: &A,
    task_id: RowId,
    requesting_agent: &str,
) -> Vec<ArtifactView> {
    state
        .artifact_links
        .iter()
        .filter(|link| link.task_id == task_id)
        .map(|link| ArtifactView {
            artifact_id: link.artifact_id.clone(),
            attached_by: link.attached_by.clone(),
            attached_at: link.attached_at,
            has_access: acl.has_access(requesting_agent, &link.artifact_id),
            ready: acl.is_ready(&link.artifact_id),
        })
        .collect()
}
