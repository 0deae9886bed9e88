//! JSON text → Primitive tree.

use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::primitive::Primitive;

/// Parse JSON text into a normalized tree.
///
/// JSON has no extension mechanism, so the result contains native
/// primitives only — converter-encoded domain values come back as whatever
/// self-describing text their converter chose. Malformed input (unterminated
/// structures, invalid escapes, trailing data) is a [`Error::Decode`] with
/// serde_json's line/column report in the message and the byte offset of
/// the offending position.
pub fn decode(text: &str) -> Result<Primitive, Error> {
    let tree: JsonValue = serde_json::from_str(text).map_err(|err| Error::Decode {
        offset: byte_offset(text, err.line(), err.column()),
        msg: err.to_string(),
    })?;
    Ok(from_json_value(tree))
}

/// Byte offset of a one-based line/column position. serde_json counts
/// columns in bytes from the last newline.
fn byte_offset(text: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 || column == 0 {
        return None;
    }
    let mut start = 0;
    for (n, l) in text.split('\n').enumerate() {
        if n + 1 == line {
            return Some(start + (column - 1).min(l.len()));
        }
        start += l.len() + 1;
    }
    None
}

fn from_json_value(value: JsonValue) -> Primitive {
    match value {
        JsonValue::Null => Primitive::Null,
        JsonValue::Bool(b) => Primitive::Bool(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Primitive::Int(i)
            } else if let Some(u) = n.as_u64() {
                Primitive::UInt(u)
            } else {
                Primitive::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => Primitive::Str(s),
        JsonValue::Array(items) => {
            Primitive::Seq(items.into_iter().map(from_json_value).collect())
        }
        JsonValue::Object(map) => Primitive::Map(
            map.into_iter()
                .map(|(key, val)| (key, from_json_value(val)))
                .collect(),
        ),
    }
}
