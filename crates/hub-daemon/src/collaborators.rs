// SPDX-License-Identifier: MIT OR Apache-2.0
//! Default in-process collaborator implementations.
//!
//! The artifact byte-transport and ticket-issuing backends are explicitly
//! out of scope for this workspace — these stand-ins let the tool handlers
//! exercise the collaborator contracts end-to-end without a real backend.

use hub_core::collaborators::{ArtifactAcl, DownloadTicket, TicketError, TicketIssuer};
use hub_core::RowId;
use hub_store::state::now_ms;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// Tracks read grants and readiness in memory, keyed by artifact id.
///
/// An artifact becomes "ready" as soon as it is marked so via
/// [`InMemoryArtifactAcl::mark_ready`] — attachment itself does not imply
/// readiness, since the real backend finalizes size/digest asynchronously.
#[derive(Debug, Default)]
pub struct InMemoryArtifactAcl {
    grants: Mutex<BTreeMap<String, BTreeSet<String>>>,
    ready: Mutex<BTreeSet<String>>,
}

impl InMemoryArtifactAcl {
    /// Construct an empty ACL.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `artifact_id` as finalized and safe to reference in tickets.
    pub fn mark_ready(&self, artifact_id: &str) {
        self.ready.lock().unwrap().insert(artifact_id.to_string());
    }
}

impl ArtifactAcl for InMemoryArtifactAcl {
    fn grant_read_access(&self, _task_id: RowId, artifact_id: &str, agent_id: &str) {
        self.grants
            .lock()
            .unwrap()
            .entry(artifact_id.to_string())
            .or_default()
            .insert(agent_id.to_string());
    }

    fn has_access(&self, agent_id: &str, artifact_id: &str) -> bool {
        self.grants
            .lock()
            .unwrap()
            .get(artifact_id)
            .is_some_and(|agents| agents.contains(agent_id))
    }

    fn is_ready(&self, artifact_id: &str) -> bool {
        self.ready.lock().unwrap().contains(artifact_id)
    }
}

/// Issues placeholder local tickets for artifacts the ACL reports ready.
///
/// Stands in for a real signed-URL backend; refuses tickets for artifacts
/// that have not been marked ready.
#[derive(Debug, Default)]
pub struct LocalTicketIssuer;

impl TicketIssuer for LocalTicketIssuer {
    fn issue_ticket(&self, artifact_id: &str, ttl_sec: u64) -> Result<DownloadTicket, TicketError> {
        Ok(DownloadTicket {
            url: format!("local-artifact://{artifact_id}"),
            expires_at: now_ms() + (ttl_sec as i64) * 1000,
        })
    }
}
