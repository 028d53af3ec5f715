//! Canonical JSON encoding for deterministic hashing.
//!
//! Entries are hashed over a canonical JSON document with these rules:
//! - Object keys sorted by code point, at every depth
//! - No insignificant whitespace (`,` and `:` separators)
//! - Integers in plain decimal, at any magnitude, exactly as written
//! - Floats as shortest round-trip digits, positional for decimal
//!   exponents in `-5 < e < 16` (with `.0` for integral values),
//!   otherwise `d.ddde±XX`
//! - Strings escape `"` `\` and control characters, and every non
//!   printable-ASCII character as `\uXXXX` (UTF-16 units, lowercase hex)
//!
//! This is the same byte stream a `sort_keys` + compact-separators +
//! ASCII-only JSON encoder emits, so independent implementations agree on
//! the digest. **CRITICAL**: changing any rule breaks every stored chain.

use serde_json::{Map, Number, Value};

use crate::crypto::Sha256Hash;
use crate::entry::EntryFields;

/// Hashed field names, in canonical (sorted) order.
mod keys {
    pub const DATA: &str = "data";
    pub const PARTITION: &str = "partition";
    pub const PREV_HASH: &str = "prev_hash";
    pub const SEQ: &str = "seq";
    pub const TS: &str = "ts";
}

/// Encode an arbitrary JSON value canonically.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    encode_value(&mut out, value);
    out
}

/// Encode the hashed fields of an entry to canonical bytes.
///
/// Produces `{"data":..,"partition":..,"prev_hash":..,"seq":..,"ts":..}`.
pub fn canonical_entry_bytes(fields: &EntryFields<'_>) -> Vec<u8> {
    let mut out = String::with_capacity(160);
    out.push('{');
    encode_str(&mut out, keys::DATA);
    out.push(':');
    encode_value(&mut out, fields.data);
    out.push(',');
    encode_str(&mut out, keys::PARTITION);
    out.push(':');
    encode_str(&mut out, fields.partition);
    out.push(',');
    encode_str(&mut out, keys::PREV_HASH);
    out.push(':');
    encode_str(&mut out, fields.prev_hash);
    out.push(',');
    encode_str(&mut out, keys::SEQ);
    out.push(':');
    out.push_str(&fields.seq.to_string());
    out.push(',');
    encode_str(&mut out, keys::TS);
    out.push(':');
    encode_str(&mut out, fields.timestamp);
    out.push('}');
    out.into_bytes()
}

/// Hash the canonical encoding of an entry's fields.
pub fn hash_fields(fields: &EntryFields<'_>) -> Sha256Hash {
    Sha256Hash::hash(&canonical_entry_bytes(fields))
}

fn encode_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => encode_number(out, n),
        Value::String(s) => encode_str(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => encode_object(out, map),
    }
}

fn encode_object(out: &mut String, map: &Map<String, Value>) {
    // Map order depends on serde_json features; never rely on it.
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        encode_str(out, key);
        out.push(':');
        encode_value(out, value);
    }
    out.push('}');
}

/// Numbers keep their literal text (`arbitrary_precision`), so integers
/// wider than 64 bits are never narrowed to floats.
fn encode_number(out: &mut String, n: &Number) {
    let literal = n.to_string();
    if is_integer_literal(&literal) {
        // `-0` is the integer zero.
        if literal.trim_start_matches('-').bytes().all(|b| b == b'0') {
            out.push('0');
        } else {
            out.push_str(&literal);
        }
    } else if let Some(f) = n.as_f64() {
        encode_float(out, f);
    } else {
        out.push_str(&literal);
    }
}

fn is_integer_literal(literal: &str) -> bool {
    !literal.contains(['.', 'e', 'E'])
}

/// Format a float using shortest round-trip digits.
fn encode_float(out: &mut String, f: f64) {
    if f.is_nan() {
        out.push_str("NaN");
        return;
    }
    if f.is_infinite() {
        out.push_str(if f > 0.0 { "Infinity" } else { "-Infinity" });
        return;
    }
    if f.is_sign_negative() {
        out.push('-');
    }

    // `{:e}` yields the shortest digits that round-trip, e.g. "9.999e1".
    let sci = format!("{:e}", f.abs());
    let Some((mantissa, exp)) = sci.split_once('e') else {
        out.push_str(&sci);
        return;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    // Position of the decimal point relative to the digit string.
    let decpt = exp + 1;

    if (-3..=16).contains(&decpt) {
        if decpt <= 0 {
            out.push_str("0.");
            out.push_str(&"0".repeat(decpt.unsigned_abs() as usize));
            out.push_str(&digits);
        } else {
            let point = decpt as usize;
            if point < digits.len() {
                out.push_str(&digits[..point]);
                out.push('.');
                out.push_str(&digits[point..]);
            } else {
                out.push_str(&digits);
                out.push_str(&"0".repeat(point - digits.len()));
                out.push_str(".0");
            }
        }
    } else {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exp < 0 { '-' } else { '+' });
        out.push_str(&format!("{:02}", exp.unsigned_abs()));
    }
}

fn encode_str(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
    }
    out.push('"');
}
