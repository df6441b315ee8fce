// SPDX-License-Identifier: MIT OR Apache-2.0
//! Append-only message store: fan-out (direct or broadcast), per-recipient
//! read-marks, and ordered/cursor-based replay.

use crate::state::{now_ms, State};
use hub_core::{AgentId, Message, RowId};
use hub_error::{ErrorCode, HubError};

/// Which direction a read traverses the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrder {
    /// Descending `created_at`, tie-break descending `id` — the default.
    Normal,
    /// Ascending `created_at`, tie-break ascending `id` — triggered by a
    /// `cursor` or `since_ts` filter.
    Delta,
}

/// Filters and pagination for [`read`].
#[derive(Debug, Clone, Default)]
pub struct ReadQuery {
    /// Restrict to messages sent by this agent.
    pub from: Option<AgentId>,
    /// Restrict to messages this recipient has not yet read.
    pub unread_only: bool,
    /// Maximum rows to return.
    pub limit: usize,
    /// Skip this many matching rows before collecting (normal order only).
    pub offset: usize,
    /// Only messages created at or after this timestamp (forces delta order).
    pub since_ts: Option<i64>,
    /// Resume strictly after this `"<created_at>:<id>"` cursor (forces delta
    /// order).
    pub cursor: Option<String>,
}

/// Result of a [`read`] call, before response-mode shaping.
#[derive(Debug, Clone)]
pub struct ReadResult {
    /// Matching messages in the order described by [`ReadOrder`].
    pub messages: Vec<Message>,
    /// Whether more matching rows exist beyond what was returned.
    pub has_more: bool,
    /// Order that was actually used.
    pub order: ReadOrder,
}

fn parse_cursor(cursor: &str) -> Option<(i64, RowId)> {
    let (ts, id) = cursor.split_once(':')?;
    Some((ts.parse().ok()?, id.parse().ok()?))
}

/// Render the resume cursor for `msg`.
#[must_use]
pub fn cursor_for(msg: &Message) -> String {
    format!("{}:{}", msg.created_at, msg.id)
}

/// Validate `content`/`metadata` lengths, append the message, and return it.
pub fn send(
    state: &mut State,
    from: &str,
    to: Option<&str>,
    content: String,
    metadata: String,
    trace_id: Option<String>,
    span_id: Option<String>,
    max_content_chars: usize,
    max_metadata_chars: usize,
) -> Result<Message, HubError> {
    if content.chars().count() > max_content_chars {
        return Err(HubError::new(
            ErrorCode::ContentTooLong,
            format!("content exceeds {max_content_chars} characters"),
        ));
    }
    if metadata.chars().count() > max_metadata_chars {
        return Err(HubError::new(
            ErrorCode::MetadataTooLong,
            format!("metadata exceeds {max_metadata_chars} characters"),
        ));
    }

    let id = state.next_message_id();
    let msg = Message {
        id,
        from_agent: from.to_string(),
        to_agent: to.map(str::to_string),
        content,
        metadata,
        trace_id,
        span_id,
        created_at: now_ms(),
        read: false,
    };
    state.messages.push(msg.clone());
    Ok(msg)
}

fn is_read_by(state: &State, msg: &Message, agent: &str) -> bool {
    match &msg.to_agent {
        Some(to) if to == agent => msg.read,
        Some(_) => false,
        None => state
            .broadcast_read_marks
            .get(&msg.id)
            .is_some_and(|readers| readers.contains(agent)),
    }
}

fn mark_read(state: &mut State, msg_id: RowId, to_agent: Option<&str>, agent: &str) {
    match to_agent {
        Some(to) if to == agent => {
            if let Some(m) = state.messages.iter_mut().find(|m| m.id == msg_id) {
                m.read = true;
            }
        }
        Some(_) => {}
        None => {
            state
                .broadcast_read_marks
                .entry(msg_id)
                .or_default()
                .insert(agent.to_string());
        }
    }
}

/// Read messages addressed to `agent` (direct or broadcast), applying
/// `query`'s filters, pagination, and ordering, then flipping read-marks for
/// every returned previously-unread message.
pub fn read(state: &mut State, agent: &str, query: &ReadQuery) -> ReadResult {
    let order = if query.cursor.is_some() || query.since_ts.is_some() {
        ReadOrder::Delta
    } else {
        ReadOrder::Normal
    };

    let cursor = query.cursor.as_deref().and_then(parse_cursor);

    let mut matching: Vec<Message> = state
        .messages
        .iter()
        .filter(|m| m.to_agent.as_deref() == Some(agent) || m.to_agent.is_none())
        .filter(|m| query.from.as_deref().is_none_or(|f| m.from_agent == f))
        .filter(|m| !query.unread_only || !is_read_by(state, m, agent))
        .filter(|m| query.since_ts.is_none_or(|ts| m.created_at >= ts))
        .filter(|m| match cursor {
            Some((ts, id)) => (m.created_at, m.id) > (ts, id),
            None => true,
        })
        .cloned()
        .collect();

    match order {
        ReadOrder::Normal => {
            matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        }
        ReadOrder::Delta => {
            matching.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        }
    }

    let start = if matches!(order, ReadOrder::Normal) {
        query.offset
    } else {
        0
    };
    let available = matching.len().saturating_sub(start);
    let fetch = query.limit.saturating_add(1).min(available);
    let page: Vec<Message> = matching
        .into_iter()
        .skip(start)
        .take(fetch)
        .collect();

    let has_more = page.len() > query.limit;
    let mut page = page;
    page.truncate(query.limit);

    for m in &page {
        if !is_read_by(state, m, agent) {
            mark_read(state, m.id, m.to_agent.as_deref(), agent);
        }
    }

    ReadResult {
        messages: page,
        has_more,
        order,
    }
}
