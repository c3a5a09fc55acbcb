//! Canonical JSON encoding.
//!
//! A canonical encoding is an idempotent byte-level encoding of a
//! [`serde_json::Value`]: object keys are sorted lexicographically by
//! codepoint, there is no insignificant whitespace, and numbers/strings are
//! encoded per the standard JSON grammar. `canonicalize(canonicalize(v))`
//! always equals `canonicalize(v)`.

use serde_json::Value;

use crate::error::CanonError;

/// Encode `value` as canonical JSON bytes.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, CanonError> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    Ok(out)
}

/// Encode any `Serialize` value as canonical JSON bytes.
pub fn canonicalize_value<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, CanonError> {
    let json = serde_json::to_value(value)
        .map_err(|e| CanonError::CanonicalizeFailed(e.to_string()))?;
    canonicalize(&json)
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            out.push(b'{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_json_string(key, out);
                out.push(b':');
                write_canonical(&map[*key], out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        // serde_json already produces minimal, grammar-correct encodings for
        // strings, numbers, bools, and null — reuse it for the leaves.
        _ => {
            let leaf = serde_json::to_vec(value).unwrap_or_default();
            out.extend_from_slice(&leaf);
        }
    }
}

fn write_json_string(s: &str, out: &mut Vec<u8>) {
    let encoded = serde_json::to_string(s).unwrap_or_default();
    out.extend_from_slice(encoded.as_bytes());
}
