// SPDX-License-Identifier: MIT OR Apache-2.0
//! Response-mode shaping, applied uniformly to `read_messages` and
//! `list_tasks` listings.

use hub_core::sha256_hex;
use serde_json::{json, Value};

/// How densely a listing response is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Full rows — rare, human diagnostics.
    Full,
    /// Routing fields plus a 180-char content preview and a 16-char digest.
    Compact,
    /// Routing fields plus char-count and digest, no preview.
    Tiny,
    /// Single-letter keys, 12-char digest, 0/1 flags, no `success` envelope.
    Nano,
}

impl ResponseMode {
    /// Parse from the wire string (`"full"`, `"compact"`, `"tiny"`, `"nano"`);
    /// unrecognized values fall back to [`ResponseMode::Compact`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "full" => Self::Full,
            "tiny" => Self::Tiny,
            "nano" => Self::Nano,
            _ => Self::Compact,
        }
    }
}

const COMPACT_PREVIEW_CHARS: usize = 180;
const COMPACT_DIGEST_CHARS: usize = 16;
const NANO_DIGEST_CHARS: usize = 12;

fn digest(content: &str, chars: usize) -> String {
    let full = sha256_hex(content.as_bytes());
    full.chars().take(chars).collect()
}

fn preview(content: &str, max_chars: usize) -> String {
    content.chars().take(max_chars).collect()
}

/// Shape one message for the given response mode.
///
/// `resolved_content` is the decoded blob payload when
/// `resolve_blob_refs` was requested and `content` parsed as a blob-ref
/// envelope; shaping then previews/digests it in preference to the raw
/// envelope string.
#[must_use]
pub fn shape_message(
    msg: &hub_core::Message,
    mode: ResponseMode,
    resolved_content: Option<&str>,
    blob_ref: Option<Value>,
) -> Value {
    let effective_content = resolved_content.unwrap_or(&msg.content);

    match mode {
        ResponseMode::Full => {
            let mut v = json!({
                "id": msg.id,
                "from_agent": msg.from_agent,
                "to_agent": msg.to_agent,
                "content": msg.content,
                "metadata": msg.metadata,
                "trace_id": msg.trace_id,
                "span_id": msg.span_id,
                "created_at": msg.created_at,
                "read": msg.read,
            });
            if let Some(br) = blob_ref {
                v["blob_ref"] = br;
                if let Some(rc) = resolved_content {
                    v["resolved_content"] = json!(rc);
                }
            }
            v
        }
        ResponseMode::Compact => {
            let mut v = json!({
                "id": msg.id,
                "from_agent": msg.from_agent,
                "to_agent": msg.to_agent,
                "created_at": msg.created_at,
                "read": msg.read,
                "preview": preview(effective_content, COMPACT_PREVIEW_CHARS),
                "digest": digest(effective_content, COMPACT_DIGEST_CHARS),
            });
            if let Some(br) = blob_ref {
                v["blob_ref"] = br;
            }
            v
        }
        ResponseMode::Tiny => {
            let mut v = json!({
                "id": msg.id,
                "from_agent": msg.from_agent,
                "to_agent": msg.to_agent,
                "created_at": msg.created_at,
                "read": msg.read,
                "chars": effective_content.chars().count(),
                "digest": digest(effective_content, COMPACT_DIGEST_CHARS),
            });
            if let Some(br) = blob_ref {
                v["blob_ref"] = br;
            }
            v
        }
        ResponseMode::Nano => json!({
            "i": msg.id,
            "f": msg.from_agent,
            "t": msg.to_agent,
            "c": effective_content.chars().count(),
            "d": digest(effective_content, NANO_DIGEST_CHARS),
            "r": u8::from(msg.read),
        }),
    }
}

/// Shape one task for the given response mode.
#[must_use]
pub fn shape_task(task: &hub_core::Task, mode: ResponseMode) -> Value {
    match mode {
        ResponseMode::Full => json!({
            "id": task.id,
            "title": task.title,
            "description": task.description,
            "created_by": task.created_by,
            "assigned_to": task.assigned_to,
            "status": task.status,
            "priority": task.priority,
            "namespace": task.namespace,
            "depends_on": task.depends_on,
            "execution_mode": task.execution_mode,
            "consistency_mode": task.consistency_mode,
            "confidence": task.confidence,
            "verification_passed": task.verification_passed,
            "verified_by": task.verified_by,
            "evidence_refs": task.evidence_refs,
            "created_at": task.created_at,
            "updated_at": task.updated_at,
        }),
        ResponseMode::Compact => json!({
            "id": task.id,
            "title": preview(&task.title, COMPACT_PREVIEW_CHARS),
            "status": task.status,
            "priority": task.priority,
            "assigned_to": task.assigned_to,
            "updated_at": task.updated_at,
            "digest": digest(&task.description, COMPACT_DIGEST_CHARS),
        }),
        ResponseMode::Tiny => json!({
            "id": task.id,
            "status": task.status,
            "priority": task.priority,
            "assigned_to": task.assigned_to,
            "updated_at": task.updated_at,
            "chars": task.description.chars().count(),
            "digest": digest(&task.description, COMPACT_DIGEST_CHARS),
        }),
        ResponseMode::Nano => json!({
            "i": task.id,
            "s": task.status,
            "p": task.priority,
            "a": task.assigned_to,
            "d": digest(&task.description, NANO_DIGEST_CHARS),
        }),
    }
}
