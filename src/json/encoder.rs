//! Primitive tree → JSON text.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use crate::error::Error;
use crate::primitive::Primitive;

/// Render a normalized tree as JSON text.
///
/// `pretty` and `sort_keys` are cosmetic only: the decoded value is the same
/// either way. Byte buffers degrade to base64 text; JSON cannot carry them
/// natively.
pub fn encode(value: &Primitive, pretty: bool, sort_keys: bool) -> Result<String, Error> {
    let tree = to_json_value(value, sort_keys)?;
    let text = if pretty {
        serde_json::to_string_pretty(&tree)?
    } else {
        serde_json::to_string(&tree)?
    };
    Ok(text)
}

fn to_json_value(value: &Primitive, sort_keys: bool) -> Result<JsonValue, Error> {
    Ok(match value {
        Primitive::Null => JsonValue::Null,
        Primitive::Bool(b) => JsonValue::Bool(*b),
        Primitive::Int(n) => JsonValue::Number(Number::from(*n)),
        Primitive::UInt(n) => JsonValue::Number(Number::from(*n)),
        Primitive::Float(f) => JsonValue::Number(
            // RFC 8259 has no NaN/Infinity.
            Number::from_f64(*f).ok_or(Error::UnsupportedType("non-finite float"))?,
        ),
        Primitive::Str(s) => JsonValue::String(s.clone()),
        Primitive::Bytes(b) => JsonValue::String(BASE64.encode(b)),
        Primitive::Seq(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| to_json_value(item, sort_keys))
                .collect::<Result<_, _>>()?,
        ),
        Primitive::Map(entries) => {
            let mut pairs: Vec<&(String, Primitive)> = entries.iter().collect();
            if sort_keys {
                pairs.sort_by(|a, b| a.0.cmp(&b.0));
            }
            let mut map = JsonMap::with_capacity(pairs.len());
            for (key, val) in pairs {
                map.insert(key.clone(), to_json_value(val, sort_keys)?);
            }
            JsonValue::Object(map)
        }
        // The walker never produces frames on the JSON path; inline the
        // payload so the encoder stays total over the primitive set.
        Primitive::Ext(_, payload) => to_json_value(payload, sort_keys)?,
    })
}
