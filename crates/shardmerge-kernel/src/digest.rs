//! Deterministic record digests.
//!
//! Two structurally equal records always produce the same digest, whatever
//! order their object keys were inserted in.
//!
//! Algorithm:
//! 1. Serialize canonically: object keys sorted, no whitespace
//! 2. `digest = "rec1_" || base32hex_lower(SHA256(bytes))`

use crate::CanonicalRecord;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const RECORD_DIGEST_PREFIX: &str = "rec1_";

/// Digest of a canonical record.
pub fn record_digest(record: &CanonicalRecord) -> String {
    let mut bytes = Vec::new();
    write_object(record, &mut bytes);
    finish(&bytes)
}

/// Digest of an arbitrary payload tree.
pub fn value_digest(value: &Value) -> String {
    let mut bytes = Vec::new();
    write_value(value, &mut bytes);
    finish(&bytes)
}

fn finish(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    format!("{RECORD_DIGEST_PREFIX}{}", base32hex_lower_no_pad(&hash))
}

fn write_value(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(true) => buf.extend_from_slice(b"true"),
        Value::Bool(false) => buf.extend_from_slice(b"false"),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                buf.extend_from_slice(i.to_string().as_bytes());
            } else if let Some(u) = n.as_u64() {
                buf.extend_from_slice(u.to_string().as_bytes());
            } else if let Some(f) = n.as_f64() {
                buf.extend_from_slice(f.to_string().as_bytes());
            } else {
                buf.extend_from_slice(n.to_string().as_bytes());
            }
        }
        Value::String(s) => write_string(s, buf),
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_value(item, buf);
            }
            buf.push(b']');
        }
        Value::Object(map) => write_object(map, buf),
    }
}

fn write_object(map: &Map<String, Value>, buf: &mut Vec<u8>) {
    // Map ordering depends on serde_json features; sort explicitly.
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    buf.push(b'{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        write_string(key, buf);
        buf.push(b':');
        write_value(&map[*key], buf);
    }
    buf.push(b'}');
}

fn write_string(s: &str, buf: &mut Vec<u8>) {
    // Display for a JSON string value is its escaped, quoted form.
    buf.extend_from_slice(Value::String(s.to_string()).to_string().as_bytes());
}

/// RFC 4648 base32hex, lowercase, without padding.
fn base32hex_lower_no_pad(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuv";

    let mut result = String::new();
    let mut bits: u64 = 0;
    let mut num_bits: u32 = 0;

    for &byte in data {
        bits = (bits << 8) | (byte as u64);
        num_bits += 8;

        while num_bits >= 5 {
            num_bits -= 5;
            let idx = ((bits >> num_bits) & 0x1f) as usize;
            result.push(ALPHABET[idx] as char);
        }
    }

    if num_bits > 0 {
        let idx = ((bits << (5 - num_bits)) & 0x1f) as usize;
        result.push(ALPHABET[idx] as char);
    }

    result
}
