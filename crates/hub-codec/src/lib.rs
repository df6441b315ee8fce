// SPDX-License-Identifier: MIT OR Apache-2.0
//! Payload codecs applied to message content and blob values before they are
//! hashed and stored.
//!
//! Five codecs are exposed through [`Codec`]:
//!
//! - [`Codec::None`] — stored verbatim.
//! - [`Codec::Whitespace`] — collapse runs of whitespace to a single space
//!   and trim the ends. Lossy.
//! - [`Codec::Json`] — parse and reserialize with sorted keys and no
//!   extraneous whitespace; falls back to the raw input on parse failure.
//!   Lossy with respect to the original byte form.
//! - [`Codec::Auto`] — picks the shortest of `{raw, whitespace, json}`,
//!   breaking ties in favor of raw, then json, then whitespace.
//! - [`Codec::LosslessAuto`] — zstd-compresses and base64-wraps the input,
//!   keeping it only if strictly shorter than the raw form by a margin;
//!   otherwise falls back to raw. Always round-trips exactly.

use hub_core::sha256_hex;
use serde::{Deserialize, Serialize};

/// Minimum absolute byte reduction required for [`Codec::LosslessAuto`] to
/// keep its compressed form instead of falling back to raw storage.
const LOSSLESS_MARGIN_BYTES: usize = 16;

/// Identifies which codec produced (or should produce) a stored value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    /// No transformation.
    None,
    /// Whitespace collapse.
    Whitespace,
    /// JSON minimization with sorted keys.
    Json,
    /// Shortest of `{raw, whitespace, json}`.
    Auto,
    /// zstd + base64 with an integrity digest, applied only if it shrinks
    /// the payload by [`LOSSLESS_MARGIN_BYTES`] or more.
    LosslessAuto,
}

/// Errors from encoding or decoding a payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The stored value was not valid base64.
    #[error("invalid base64 in lossless_auto payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    /// The base64-decoded bytes did not zstd-decompress.
    #[error("zstd decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
    /// zstd compression itself failed (should not happen for in-memory buffers).
    #[error("zstd compression failed: {0}")]
    Compress(#[source] std::io::Error),
    /// Decompressed bytes were not valid UTF-8.
    #[error("decompressed payload was not valid UTF-8")]
    NotUtf8,
}

/// Outcome of encoding a payload with a [`Codec`].
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeResult {
    /// The value to persist.
    pub stored_value: String,
    /// Which codec actually produced `stored_value` (may differ from the
    /// requested codec for [`Codec::Auto`] and [`Codec::LosslessAuto`], which
    /// can fall back to raw).
    pub codec_used: Codec,
    /// Whether a transformation was actually applied (`false` means the
    /// chosen codec degenerated to a raw passthrough).
    pub applied: bool,
    /// Whether `stored_value` round-trips to the exact original bytes.
    pub lossless: bool,
    /// Percentage size reduction, `100 * (in - out) / in`, rounded to two
    /// decimal places. Negative if the encoded form is larger.
    pub gain_pct: f64,
}

/// Outcome of decoding a previously encoded value.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    /// The recovered payload.
    pub value: String,
    /// Whether the recovered payload's digest matched the digest embedded
    /// at encode time. Always `true` for codecs without an embedded digest.
    pub integrity_ok: bool,
}

fn gain_pct(input_len: usize, output_len: usize) -> f64 {
    if input_len == 0 {
        return 0.0;
    }
    let raw = 100.0 * (input_len as f64 - output_len as f64) / input_len as f64;
    (raw * 100.0).round() / 100.0
}

fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

fn minify_json(input: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(input).ok()?;
    serde_json::to_string(&value).ok()
}

/// A self-describing wrapper persisted for [`Codec::LosslessAuto`] payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LosslessEnvelope {
    /// Base64 (standard, padded) of the zstd-compressed bytes.
    data: String,
    /// SHA-256 hex digest of the original, pre-compression bytes.
    digest: String,
}

fn encode_lossless_auto(input: &str) -> Result<(String, bool), CodecError> {
    let compressed = zstd::encode_all(input.as_bytes(), 3).map_err(CodecError::Compress)?;
    let envelope = LosslessEnvelope {
        data: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &compressed),
        digest: sha256_hex(input.as_bytes()),
    };
    let wire = serde_json::to_string(&envelope).expect("envelope serializes");
    if wire.len() + LOSSLESS_MARGIN_BYTES < input.len() {
        Ok((wire, true))
    } else {
        Ok((input.to_string(), false))
    }
}

fn decode_lossless_auto(stored: &str) -> Result<DecodeResult, CodecError> {
    let Ok(envelope) = serde_json::from_str::<LosslessEnvelope>(stored) else {
        // Fell back to raw storage at encode time.
        return Ok(DecodeResult {
            value: stored.to_string(),
            integrity_ok: true,
        });
    };
    let compressed =
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &envelope.data)?;
    let raw = zstd::decode_all(compressed.as_slice()).map_err(CodecError::Decompress)?;
    let value = String::from_utf8(raw).map_err(|_| CodecError::NotUtf8)?;
    let integrity_ok = sha256_hex(value.as_bytes()) == envelope.digest;
    Ok(DecodeResult { value, integrity_ok })
}

/// Encode `input` with `codec`.
pub fn encode(input: &str, codec: Codec) -> Result<EncodeResult, CodecError> {
    let in_len = input.len();
    match codec {
        Codec::None => Ok(EncodeResult {
            stored_value: input.to_string(),
            codec_used: Codec::None,
            applied: false,
            lossless: true,
            gain_pct: 0.0,
        }),
        Codec::Whitespace => {
            let collapsed = collapse_whitespace(input);
            let applied = collapsed != input;
            Ok(EncodeResult {
                gain_pct: gain_pct(in_len, collapsed.len()),
                stored_value: collapsed,
                codec_used: Codec::Whitespace,
                applied,
                lossless: false,
            })
        }
        Codec::Json => match minify_json(input) {
            Some(minified) => {
                let applied = minified != input;
                Ok(EncodeResult {
                    gain_pct: gain_pct(in_len, minified.len()),
                    stored_value: minified,
                    codec_used: Codec::Json,
                    applied,
                    lossless: false,
                })
            }
            None => Ok(EncodeResult {
                stored_value: input.to_string(),
                codec_used: Codec::Json,
                applied: false,
                lossless: false,
                gain_pct: 0.0,
            }),
        },
        Codec::Auto => {
            let whitespace = collapse_whitespace(input);
            let json = minify_json(input);

            // Candidates in tie-break priority order: raw, json, whitespace.
            let mut best = (input.to_string(), Codec::None, false);
            if let Some(j) = json {
                if j.len() < best.0.len() {
                    best = (j, Codec::Json, true);
                }
            }
            if whitespace.len() < best.0.len() {
                best = (whitespace, Codec::Whitespace, true);
            }

            Ok(EncodeResult {
                gain_pct: gain_pct(in_len, best.0.len()),
                stored_value: best.0,
                codec_used: best.1,
                applied: best.2,
                lossless: matches!(best.1, Codec::None),
            })
        }
        Codec::LosslessAuto => {
            let (stored_value, applied) = encode_lossless_auto(input)?;
            Ok(EncodeResult {
                gain_pct: gain_pct(in_len, stored_value.len()),
                stored_value,
                codec_used: Codec::LosslessAuto,
                applied,
                lossless: true,
            })
        }
    }
}

/// Decode a value previously produced by [`encode`] with `codec_used`.
pub fn decode(stored_value: &str, codec_used: Codec) -> Result<DecodeResult, CodecError> {
    match codec_used {
        Codec::LosslessAuto => decode_lossless_auto(stored_value),
        Codec::None | Codec::Whitespace | Codec::Json | Codec::Auto => Ok(DecodeResult {
            value: stored_value.to_string(),
            integrity_ok: true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_passthrough() {
        let r = encode("  hi  there  ", Codec::None).unwrap();
        assert_eq!(r.stored_value, "  hi  there  ");
        assert!(!r.applied);
        assert_eq!(r.gain_pct, 0.0);
    }

    #[test]
    fn whitespace_collapses_and_trims() {
        let r = encode("  hi   there\n\tfriend  ", Codec::Whitespace).unwrap();
        assert_eq!(r.stored_value, "hi there friend");
        assert!(r.applied);
    }

    #[test]
    fn json_sorts_keys_and_drops_whitespace() {
        let r = encode(r#"{ "z": 1, "a": 2 }"#, Codec::Json).unwrap();
        assert_eq!(r.stored_value, r#"{"a":2,"z":1}"#);
        assert!(r.applied);
    }

    #[test]
    fn json_passes_through_on_parse_failure() {
        let r = encode("not json at all", Codec::Json).unwrap();
        assert_eq!(r.stored_value, "not json at all");
        assert!(!r.applied);
    }

    #[test]
    fn auto_picks_json_over_whitespace_when_smaller() {
        let r = encode(r#"{ "a" :   1 }"#, Codec::Auto).unwrap();
        assert_eq!(r.codec_used, Codec::Json);
        assert_eq!(r.stored_value, r#"{"a":1}"#);
    }

    #[test]
    fn auto_tie_prefers_raw_over_json_over_whitespace() {
        // No whitespace, not JSON: all three candidates equal the input.
        let r = encode("plain", Codec::Auto).unwrap();
        assert_eq!(r.codec_used, Codec::None);
        assert!(!r.applied);
    }

    #[test]
    fn auto_prefers_json_when_strictly_shorter_than_whitespace() {
        let r = encode("{  \"a\": 1 }", Codec::Auto).unwrap();
        assert_eq!(r.codec_used, Codec::Json);
        assert_eq!(r.stored_value, r#"{"a":1}"#);
    }

    #[test]
    fn lossless_auto_round_trips_and_reports_integrity() {
        let payload = "x".repeat(500);
        let encoded = encode(&payload, Codec::LosslessAuto).unwrap();
        assert!(encoded.applied);
        let decoded = decode(&encoded.stored_value, Codec::LosslessAuto).unwrap();
        assert_eq!(decoded.value, payload);
        assert!(decoded.integrity_ok);
    }

    #[test]
    fn lossless_auto_falls_back_to_raw_when_not_worth_it() {
        let payload = "hi";
        let encoded = encode(payload, Codec::LosslessAuto).unwrap();
        assert!(!encoded.applied);
        assert_eq!(encoded.stored_value, payload);
        let decoded = decode(&encoded.stored_value, Codec::LosslessAuto).unwrap();
        assert_eq!(decoded.value, payload);
        assert!(decoded.integrity_ok);
    }

    #[test]
    fn lossless_auto_detects_tampering() {
        let payload = "y".repeat(500);
        let encoded = encode(&payload, Codec::LosslessAuto).unwrap();
        let mut envelope: serde_json::Value =
            serde_json::from_str(&encoded.stored_value).unwrap();
        envelope["digest"] = serde_json::Value::String("0".repeat(64));
        let tampered = serde_json::to_string(&envelope).unwrap();
        let decoded = decode(&tampered, Codec::LosslessAuto).unwrap();
        assert!(!decoded.integrity_ok);
    }

    #[test]
    fn none_and_auto_decode_are_identity() {
        let decoded = decode("hello", Codec::None).unwrap();
        assert_eq!(decoded.value, "hello");
        assert!(decoded.integrity_ok);
    }

    #[test]
    fn gain_pct_rounds_to_two_decimals() {
        assert_eq!(gain_pct(3, 1), 66.67);
        assert_eq!(gain_pct(0, 0), 0.0);
    }
}
