// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content-addressed blob store: insert-or-reuse by digest of the *stored*
//! (possibly codec-encoded) bytes.

use crate::state::{now_ms, State};
use hub_core::{sha256_hex, ProtocolBlob};

/// Outcome of [`put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOutcome {
    /// `true` if a new row was inserted; `false` if `hash` already existed.
    pub created: bool,
}

/// Encode `payload` with `codec`, then insert the stored bytes under the
/// digest of those stored bytes (deduping identical codec outputs).
///
/// Returns the hash, the codec's [`hub_codec::EncodeResult`], and whether a
/// new row was created.
pub fn put_encoded(
    state: &mut State,
    payload: &str,
    codec: hub_codec::Codec,
) -> Result<(String, hub_codec::EncodeResult, PutOutcome), hub_codec::CodecError> {
    let encoded = hub_codec::encode(payload, codec)?;
    let hash = sha256_hex(encoded.stored_value.as_bytes());
    let outcome = put_raw(state, &hash, encoded.stored_value.as_bytes());
    Ok((hash, encoded, outcome))
}

/// Insert pre-encoded bytes under `hash` if not already present.
pub fn put_raw(state: &mut State, hash: &str, stored_value: &[u8]) -> PutOutcome {
    if state.blobs.contains_key(hash) {
        return PutOutcome { created: false };
    }
    state.blobs.insert(
        hash.to_string(),
        ProtocolBlob {
            hash: hash.to_string(),
            value: stored_value.to_vec(),
            created_at: now_ms(),
        },
    );
    PutOutcome { created: true }
}

/// Look up a stored blob by hash.
#[must_use]
pub fn get(state: &State, hash: &str) -> Option<&ProtocolBlob> {
    state.blobs.get(hash)
}
