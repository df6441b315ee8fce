// SPDX-License-Identifier: MIT OR Apache-2.0
//! hub-handoff
#![warn(missing_docs)]
//!
//! Assembles the compact packet a claimant needs to take over a task: the
//! task row, resolved dependencies, evidence, attached artifacts, and
//! (optionally) time-bounded download tickets.

use hub_core::collaborators::{ArtifactAcl, TicketIssuer};
use hub_core::{RowId, TaskStatus};
use hub_error::{ErrorCode, HubError};
use hub_store::shaping::{shape_task, ResponseMode};
use hub_store::state::State;
use hub_store::tasks::list_task_artifacts;
use serde::Serialize;

/// One resolved dependency.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyStatus {
    /// Dependency task id.
    pub id: RowId,
    /// Its current status.
    pub status: TaskStatus,
}

/// One attached artifact, annotated for the requesting agent.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactHandoffView {
    /// Opaque artifact identifier.
    pub artifact_id: String,
    /// Whether the requesting agent has read access.
    pub has_access: bool,
    /// Whether the artifact has been finalized and is downloadable.
    pub ready: bool,
}

/// A resolved download ticket for one artifact.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadTicketView {
    /// Artifact the ticket grants access to.
    pub artifact_id: String,
    /// Signed or pre-authorized URL.
    pub url: String,
    /// Expiry, ms epoch.
    pub expires_at: hub_core::EpochMs,
}

/// Assembled handoff packet.
#[derive(Debug, Clone, Serialize)]
pub struct HandoffResult {
    /// The task row, shaped by the requested response mode.
    pub task: serde_json::Value,
    /// Dependencies resolved to `{id, status}` pairs.
    pub depends_on: Vec<DependencyStatus>,
    /// Evidence references, verbatim.
    pub evidence_refs: Vec<String>,
    /// Attached artifacts, annotated with access and readiness.
    pub artifacts: Vec<ArtifactHandoffView>,
    /// Resolved download tickets, if `include_downloads` was requested and
    /// every ticket issued successfully.
    pub artifact_downloads: Option<Vec<DownloadTicketView>>,
    /// Set if `include_downloads` was requested and any ticket failed to
    /// issue; the rest of the packet is still returned.
    pub artifact_downloads_error: Option<String>,
}

/// Assemble a handoff packet for `task_id` on behalf of `requesting_agent`.
///
/// # Errors
///
/// Returns [`ErrorCode::NotFound`] if the task does not exist.
pub fn get_task_handoff<A: ArtifactAcl, T: TicketIssuer>(
    state: &State,
    acl: &A,
    issuer: &T,
    task_id: RowId,
    requesting_agent: &str,
    response_mode: ResponseMode,
    include_downloads: bool,
    download_ttl_sec: u64,
) -> Result<HandoffResult, HubError> {
    let task = state
        .task(task_id)
        .ok_or_else(|| HubError::new(ErrorCode::NotFound, format!("no task {task_id}")))?;

    let depends_on = task
        .depends_on
        .iter()
        .filter_map(|dep_id| {
            state.task(*dep_id).map(|dep| DependencyStatus {
                id: dep.id,
                status: dep.status,
            })
        })
        .collect();
    let evidence_refs = task.evidence_refs.clone();
    let shaped_task = shape_task(task, response_mode);

    let artifact_rows = list_task_artifacts(state, acl, task_id, requesting_agent);
    let artifacts: Vec<ArtifactHandoffView> = artifact_rows
        .iter()
        .map(|row| ArtifactHandoffView {
            artifact_id: row.artifact_id.clone(),
            has_access: row.has_access,
            ready: row.ready,
        })
        .collect();

    let (artifact_downloads, artifact_downloads_error) = if include_downloads {
        let mut tickets = Vec::with_capacity(artifacts.len());
        let mut failure = None;
        for artifact in &artifacts {
            match issuer.issue_ticket(&artifact.artifact_id, download_ttl_sec) {
                Ok(ticket) => tickets.push(DownloadTicketView {
                    artifact_id: artifact.artifact_id.clone(),
                    url: ticket.url,
                    expires_at: ticket.expires_at,
                }),
                Err(err) => {
                    failure = Some(err.to_string());
                    break;
                }
            }
        }
        match failure {
            Some(msg) => (None, Some(msg)),
            None => (Some(tickets), None),
        }
    } else {
        (None, None)
    };

    Ok(HandoffResult {
        task: shaped_task,
        depends_on,
        evidence_refs,
        artifacts,
        artifact_downloads,
        artifact_downloads_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::collaborators::{DownloadTicket, TicketError};
    use hub_core::{Priority, RuntimeMode};
    use hub_store::tasks::{attach_task_artifact, create_task, CreateTaskInput};
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeAcl {
        grants: Mutex<BTreeMap<String, Vec<String>>>,
        ready: Mutex<BTreeSet<String>>,
    }

    impl ArtifactAcl for FakeAcl {
        fn grant_read_access(&self, _task_id: RowId, artifact_id: &str, agent_id: &str) {
            self.grants
                .lock()
                .unwrap()
                .entry(artifact_id.to_string())
                .or_default()
                .push(agent_id.to_string());
        }

        fn has_access(&self, agent_id: &str, artifact_id: &str) -> bool {
            self.grants
                .lock()
                .unwrap()
                .get(artifact_id)
                .is_some_and(|agents| agents.iter().any(|a| a == agent_id))
        }

        fn is_ready(&self, artifact_id: &str) -> bool {
            self.ready.lock().unwrap().contains(artifact_id)
        }
    }

    struct FakeIssuer {
        fail: bool,
    }

    impl TicketIssuer for FakeIssuer {
        fn issue_ticket(&self, artifact_id: &str, ttl_sec: u64) -> Result<DownloadTicket, TicketError> {
            if self.fail {
                return Err(TicketError::Failed("backend unavailable".into()));
            }
            Ok(DownloadTicket {
                url: format!("https://artifacts.example/{artifact_id}"),
                expires_at: ttl_sec as i64 * 1000,
            })
        }
    }

    fn setup() -> (State, RowId) {
        let mut state = State::new();
        let mut input = CreateTaskInput {
            title: "t".into(),
            description: "d".into(),
            created_by: "creator".into(),
            assigned_to: Some("a1".into()),
            priority: Priority::Medium,
            namespace: None,
            depends_on: BTreeSet::new(),
            execution_mode: RuntimeMode::Any,
            consistency_mode_override: None,
        };
        let dep = create_task(&mut state, input.clone(), &[]).unwrap().task;
        input.depends_on.insert(dep.id);
        let task = create_task(&mut state, input, &[]).unwrap().task;
        (state, task.id)
    }

    #[test]
    fn handoff_resolves_dependency_status() {
        let (state, task_id) = setup();
        let acl = FakeAcl::default();
        let issuer = FakeIssuer { fail: false };
        let result = get_task_handoff(
            &state, &acl, &issuer, task_id, "a1", ResponseMode::Full, false, 60,
        )
        .unwrap();
        assert_eq!(result.depends_on.len(), 1);
        assert_eq!(result.depends_on[0].status, TaskStatus::Pending);
    }

    #[test]
    fn handoff_includes_artifact_access_and_readiness() {
        let (mut state, task_id) = setup();
        let acl = FakeAcl::default();
        attach_task_artifact(&mut state, &acl, task_id, "art1", "creator").unwrap();

        let issuer = FakeIssuer { fail: false };
        let result = get_task_handoff(
            &state, &acl, &issuer, task_id, "a1", ResponseMode::Full, false, 60,
        )
        .unwrap();
        assert_eq!(result.artifacts.len(), 1);
        assert!(result.artifacts[0].has_access);
        assert!(result.artifact_downloads.is_none());
    }

    #[test]
    fn handoff_downloads_populate_on_success() {
        let (mut state, task_id) = setup();
        let acl = FakeAcl::default();
        attach_task_artifact(&mut state, &acl, task_id, "art1", "creator").unwrap();

        let issuer = FakeIssuer { fail: false };
        let result = get_task_handoff(
            &state, &acl, &issuer, task_id, "a1", ResponseMode::Full, true, 60,
        )
        .unwrap();
        assert_eq!(result.artifact_downloads.unwrap().len(), 1);
        assert!(result.artifact_downloads_error.is_none());
    }

    #[test]
    fn handoff_download_failure_sets_error_but_keeps_rest() {
        let (mut state, task_id) = setup();
        let acl = FakeAcl::default();
        attach_task_artifact(&mut state, &acl, task_id, "art1", "creator").unwrap();

        let issuer = FakeIssuer { fail: true };
        let result = get_task_handoff(
            &state, &acl, &issuer, task_id, "a1", ResponseMode::Full, true, 60,
        )
        .unwrap();
        assert!(result.artifact_downloads.is_none());
        assert!(result.artifact_downloads_error.is_some());
        assert_eq!(result.artifacts.len(), 1);
    }

    #[test]
    fn missing_task_rejected() {
        let (state, _task_id) = setup();
        let acl = FakeAcl::default();
        let issuer = FakeIssuer { fail: false };
        let err = get_task_handoff(
            &state, &acl, &issuer, 9999, "a1", ResponseMode::Full, false, 60,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
