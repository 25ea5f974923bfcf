//! # Session-State Envelope Codec
//!
//! The dialog service carries structured session data through fields it
//! treats as opaque strings. This module provides the only legal crossing
//! point for that boundary: a JSON value is serialized, gzip-compressed,
//! and base64-encoded on the way out, and the exact inverse is applied on
//! the way back in.
//!
//! Round-trip law: `decode(&encode(v)?)? == v` for every JSON value.
//!
//! Encoding is not required to be byte-deterministic (object key order is
//! whatever the serializer produces); decode inverts whatever encode
//! produced, which is all the collaborators rely on.

use crate::error::{AppError, AppResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use std::io::{Read, Write};

/// Serialize, compress, and encode a JSON value into an opaque envelope
/// string suitable for a string-typed API field.
pub fn encode(value: &Value) -> AppResult<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| AppError::Internal(format!("envelope serialization failed: {}", e)))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| AppError::Internal(format!("envelope compression failed: {}", e)))?;
    let compressed = encoder
        .finish()
        .map_err(|e| AppError::Internal(format!("envelope compression failed: {}", e)))?;

    Ok(BASE64.encode(compressed))
}

/// Decode, decompress, and deserialize an envelope string back into the
/// JSON value it was produced from.
///
/// Fails with [`AppError::Decode`] when the text is not valid base64, the
/// byte stream is not a gzip stream, or the decompressed bytes are not
/// JSON. Never panics on malformed input.
pub fn decode(envelope: &str) -> AppResult<Value> {
    let compressed = BASE64
        .decode(envelope.trim())
        .map_err(|e| AppError::Decode(format!("invalid base64: {}", e)))?;

    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| AppError::Decode(format!("invalid gzip stream: {}", e)))?;

    serde_json::from_slice(&json).map_err(|e| AppError::Decode(format!("invalid JSON payload: {}", e)))
}

/// Session state used when the caller supplies none: start a fresh dialog
/// and elicit the user's intent.
pub fn default_session_state() -> Value {
    serde_json::json!({ "dialogAction": { "type": "ElicitIntent" } })
}

/// Request attributes used when the caller supplies none.
pub fn default_request_attributes() -> Value {
    serde_json::json!({})
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let values = [
            json!({"dialogAction": {"type": "ElicitIntent"}}),
            json!({}),
            json!([1, 2, 3, {"nested": ["deep", null, 4.5]}]),
            json!("just a string"),
            json!(42),
            json!(null),
            json!({"unicode": "héllo wörld — ∆t", "empty": {}, "flag": true}),
        ];

        for value in values {
            let envelope = encode(&value).unwrap();
            assert_eq!(decode(&envelope).unwrap(), value, "round-trip failed for {}", value);
        }
    }

    #[test]
    fn test_envelope_is_printable_ascii() {
        let envelope = encode(&json!({"key": "value with spaces and ünïcode"})).unwrap();
        assert!(envelope.chars().all(|c| c.is_ascii() && !c.is_ascii_control()));
    }

    #[test]
    fn test_decode_rejects_non_base64() {
        let err = decode("not~~~valid~~~base64!!!").unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_non_gzip_bytes() {
        // Valid base64, but the decoded bytes are not a gzip stream.
        let envelope = BASE64.encode(b"plainly not gzip");
        let err = decode(&envelope).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_non_json_plaintext() {
        // Compress bytes that are not JSON, then encode them properly.
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"this is not json at all {{{").unwrap();
        let envelope = BASE64.encode(encoder.finish().unwrap());

        let err = decode(&envelope).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[test]
    fn test_default_session_state() {
        let envelope = encode(&default_session_state()).unwrap();
        let decoded = decode(&envelope).unwrap();
        assert_eq!(decoded, json!({"dialogAction": {"type": "ElicitIntent"}}));
    }

    #[test]
    fn test_default_request_attributes_is_empty_object() {
        let decoded = decode(&encode(&default_request_attributes()).unwrap()).unwrap();
        assert_eq!(decoded, json!({}));
    }
}
