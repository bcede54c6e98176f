//! Canonical JSON encoding for deterministic hashing.
//!
//! The canonical form is what gets hashed into Merkle leaves and signed in
//! commit payloads:
//! - Object keys sorted by byte order
//! - No insignificant whitespace
//! - Strings escaped as JSON
//! - Non-finite floats encoded as `null`
//!
//! Finite floats use Rust's shortest round-trip formatting (`1.0`, `0.1`),
//! which differs from JavaScript for integral floats (`1`). Metadata that must
//! hash identically across implementations should use integers or strings.

use std::collections::BTreeMap;

use crate::manifest::{Metadata, MetadataValue};

/// Canonical JSON text of a single value.
pub fn canonical_json(value: &MetadataValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Canonical JSON text of a metadata map.
pub fn canonical_metadata(metadata: &Metadata) -> String {
    let mut out = String::new();
    write_map(&mut out, metadata);
    out
}

fn write_value(out: &mut String, value: &MetadataValue) {
    match value {
        MetadataValue::Null => out.push_str("null"),
        MetadataValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        MetadataValue::Int(n) => out.push_str(&n.to_string()),
        MetadataValue::Float(f) => write_float(out, *f),
        MetadataValue::String(s) => write_string(out, s),
        MetadataValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        MetadataValue::Map(map) => write_map(out, map),
    }
}

fn write_map(out: &mut String, map: &BTreeMap<String, MetadataValue>) {
    // BTreeMap<String, _> iterates in byte order already.
    out.push('{');
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(out, key);
        out.push(':');
        write_value(out, value);
    }
    out.push('}');
}

fn write_float(out: &mut String, f: f64) {
    if !f.is_finite() {
        out.push_str("null");
        return;
    }
    match serde_json::to_string(&f) {
        Ok(s) => out.push_str(&s),
        Err(_) => out.push_str("null"),
    }
}

fn write_string(out: &mut String, s: &str) {
    // serde_json never fails on a plain str.
    match serde_json::to_string(s) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => out.push_str("\"\""),
    }
}
