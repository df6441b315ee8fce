// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blob-reference envelope format: a small JSON string embedded in a
//! message's `content` field that points at a [`crate::ProtocolBlob`]
//! instead of inlining a large payload.

use serde::{Deserialize, Serialize};

/// Fixed type marker carried by every envelope.
pub const ENVELOPE_TYPE: &str = "caep-blob-ref";

/// Structured form of a blob-ref envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRefEnvelope {
    #[serde(rename = "type")]
    r#type: String,
    /// Hex SHA-256 digest of the referenced blob's stored bytes.
    pub hash: String,
    /// Character length the sender declared for the original payload.
    pub declared_chars: u64,
}

impl BlobRefEnvelope {
    /// Build a new envelope for `hash`/`declared_chars`.
    #[must_use]
    pub fn new(hash: impl Into<String>, declared_chars: u64) -> Self {
        Self {
            r#type: ENVELOPE_TYPE.to_string(),
            hash: hash.into(),
            declared_chars,
        }
    }

    /// Serialize to the wire string stored in a message's `content` field.
    #[must_use]
    pub fn make(hash: impl Into<String>, declared_chars: u64) -> String {
        let env = Self::new(hash, declared_chars);
        // An envelope is always representable as JSON; unwrap is safe.
        serde_json::to_string(&env).expect("envelope serializes")
    }

    /// Parse `content` as an envelope, returning `None` if it is not one.
    ///
    /// Rejects well-formed JSON whose `type` field doesn't match
    /// [`ENVELOPE_TYPE`], matching the "pass through unchanged" behavior
    /// used elsewhere for non-envelope content.
    #[must_use]
    pub fn parse(content: &str) -> Option<Self> {
        let env: Self = serde_json::from_str(content).ok()?;
        if env.r#type == ENVELOPE_TYPE {
            Some(env)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let s = BlobRefEnvelope::make("abc123", 42);
        let parsed = BlobRefEnvelope::parse(&s).unwrap();
        assert_eq!(parsed.hash, "abc123");
        assert_eq!(parsed.declared_chars, 42);
    }

    #[test]
    fn wire_shape_matches_contract() {
        let s = BlobRefEnvelope::make("deadbeef", 7);
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["type"], "caep-blob-ref");
        assert_eq!(v["hash"], "deadbeef");
        assert_eq!(v["declared_chars"], 7);
    }

    #[test]
    fn non_envelope_content_parses_to_none() {
        assert!(BlobRefEnvelope::parse("just some text").is_none());
        assert!(BlobRefEnvelope::parse(r#"{"type":"something_else"}"#).is_none());
        assert!(BlobRefEnvelope::parse(r#"{"k":"v"}"#).is_none());
    }
}
