// SPDX-License-Identifier: MIT OR Apache-2.0
//! Collaborator contracts the core consults but does not implement:
//! artifact access control and download-ticket issuance. Both are byte-
//! transport concerns that live outside this crate; callers supply an
//! implementation when attaching artifacts or assembling a handoff.

use crate::{EpochMs, RowId};

/// Grants and checks read access to artifacts attached to tasks.
///
/// A real implementation typically backs this with the same transactional
/// store that owns `TaskArtifactLink` rows, but the core never assumes
/// that — it only calls through this trait.
pub trait ArtifactAcl {
    /// Grant `agent_id` read access to `artifact_id` as a side effect of
    /// attaching it to `task_id`.
    fn grant_read_access(&self, task_id: RowId, artifact_id: &str, agent_id: &str);

    /// Returns `true` if `agent_id` currently has read access to `artifact_id`.
    #[must_use]
    fn has_access(&self, agent_id: &str, artifact_id: &str) -> bool;

    /// Returns `true` if the artifact has been finalized (size and digest
    /// known) and is safe to reference in a download ticket.
    #[must_use]
    fn is_ready(&self, artifact_id: &str) -> bool;
}

/// A time-bounded download handle for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTicket {
    /// Signed or pre-authorized URL.
    pub url: String,
    /// Expiry, ms epoch.
    pub expires_at: EpochMs,
}

/// Failure issuing a [`DownloadTicket`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum TicketError {
    /// The issuer declined or failed to produce a ticket.
    #[error("ticket issuance failed: {0}")]
    Failed(String),
}

/// Issues time-bounded download tickets for finalized artifacts.
pub trait TicketIssuer {
    /// Issue a ticket valid for `ttl_sec` seconds, or fail.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::Failed`] if the issuer declines.
    fn issue_ticket(&self, artifact_id: &str, ttl_sec: u64) -> Result<DownloadTicket, TicketError>;
}
