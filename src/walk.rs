//! Recursive walker: normalizes value graphs into [`Primitive`] trees and
//! revives decoded trees back into values.

use std::collections::HashSet;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::Error;
use crate::primitive::Primitive;
use crate::registry::Registry;
use crate::value::Value;
use crate::Policy;

/// Target format for a walk. Only the binary format wraps converter output
/// in extension frames; JSON inlines it bare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Json,
    Binary,
}

/// Per-call depth counter plus the identities of domain objects on the
/// active DFS path. Owned by exactly one top-level encode call.
pub(crate) struct RecursionContext {
    depth: usize,
    max_depth: usize,
    active: Vec<usize>,
}

impl RecursionContext {
    pub(crate) fn new(max_depth: usize) -> Self {
        RecursionContext {
            depth: 0,
            max_depth,
            active: Vec::new(),
        }
    }

    fn enter(&mut self) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(Error::DepthExceeded(self.max_depth));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn push_identity(&mut self, identity: usize) -> Result<(), Error> {
        if self.active.contains(&identity) {
            return Err(Error::CyclicReference);
        }
        self.active.push(identity);
        Ok(())
    }

    fn pop_identity(&mut self) {
        self.active.pop();
    }
}

/// Depth-first normalization of `value` into a [`Primitive`].
pub(crate) fn walk(
    value: &Value,
    registry: &Registry,
    policy: Policy,
    format: Format,
    ctx: &mut RecursionContext,
) -> Result<Primitive, Error> {
    match value {
        Value::Null => Ok(Primitive::Null),
        Value::Bool(b) => Ok(Primitive::Bool(*b)),
        Value::Int(n) => Ok(Primitive::Int(*n)),
        Value::UInt(n) => Ok(Primitive::UInt(*n)),
        Value::Float(f) => Ok(Primitive::Float(*f)),
        Value::Str(s) => Ok(Primitive::Str(s.clone())),
        Value::Bytes(b) => Ok(Primitive::Bytes(b.clone())),
        Value::Seq(items) => {
            ctx.enter()?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(walk(item, registry, policy, format, ctx)?);
            }
            ctx.leave();
            Ok(Primitive::Seq(out))
        }
        Value::Map(entries) => {
            ctx.enter()?;
            let mut out = Vec::with_capacity(entries.len());
            let mut seen = HashSet::with_capacity(entries.len());
            for (key, val) in entries {
                let key = coerce_key(key, registry, policy, ctx)?;
                if !seen.insert(key.clone()) {
                    return Err(Error::KeyCollision(key));
                }
                out.push((key, walk(val, registry, policy, format, ctx)?));
            }
            ctx.leave();
            Ok(Primitive::Map(out))
        }
        Value::Domain(object) => {
            let Some(converter) = registry.lookup_by_type(object.as_ref()) else {
                return match policy {
                    Policy::Strict => Err(Error::UnsupportedType(object.type_name())),
                    Policy::Permissive => Ok(Primitive::Str(object.fallback_text())),
                };
            };
            // Cycle check is by Arc identity: the same shared object may sit
            // under several siblings, but not under itself.
            ctx.push_identity(Arc::as_ptr(object).cast::<()>() as usize)?;
            ctx.enter()?;
            // The encoder may return another non-primitive; normalizing its
            // output iterates until a true primitive, bounded by max_depth.
            let encoded = converter.encode(object.as_ref())?;
            let payload = walk(&encoded, registry, policy, format, ctx)?;
            ctx.leave();
            ctx.pop_identity();
            Ok(match format {
                Format::Binary => Primitive::Ext(converter.tag(), Box::new(payload)),
                Format::Json => payload,
            })
        }
    }
}

/// Mapping keys must be text on the wire. Non-text keys are normalized and
/// coerced to their text form; composite keys are not representable.
fn coerce_key(
    key: &Value,
    registry: &Registry,
    policy: Policy,
    ctx: &mut RecursionContext,
) -> Result<String, Error> {
    // Keys never carry extension frames, in either format.
    let prim = walk(key, registry, policy, Format::Json, ctx)?;
    match prim {
        Primitive::Str(s) => Ok(s),
        Primitive::Null => Ok("null".to_owned()),
        Primitive::Bool(b) => Ok(b.to_string()),
        Primitive::Int(n) => Ok(n.to_string()),
        Primitive::UInt(n) => Ok(n.to_string()),
        Primitive::Float(f) => Ok(f.to_string()),
        Primitive::Bytes(b) => Ok(BASE64.encode(b)),
        Primitive::Seq(_) | Primitive::Map(_) | Primitive::Ext(..) => {
            Err(Error::UnsupportedType("composite mapping key"))
        }
    }
}

/// Inverse of [`walk`] for the decode path: structural conversion back into
/// [`Value`], resolving extension frames through the registry.
pub(crate) fn revive(prim: Primitive, registry: &Registry) -> Result<Value, Error> {
    Ok(match prim {
        Primitive::Null => Value::Null,
        Primitive::Bool(b) => Value::Bool(b),
        Primitive::Int(n) => Value::Int(n),
        Primitive::UInt(n) => Value::UInt(n),
        Primitive::Float(f) => Value::Float(f),
        Primitive::Str(s) => Value::Str(s),
        Primitive::Bytes(b) => Value::Bytes(b),
        Primitive::Seq(items) => Value::Seq(
            items
                .into_iter()
                .map(|item| revive(item, registry))
                .collect::<Result<_, _>>()?,
        ),
        Primitive::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| Ok((Value::Str(k), revive(v, registry)?)))
                .collect::<Result<_, Error>>()?,
        ),
        Primitive::Ext(tag, payload) => {
            let converter = registry
                .lookup_by_tag(tag)
                .ok_or(Error::UnknownExtension(tag))?;
            let payload = revive(*payload, registry)?;
            converter.decode(&payload)?
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RecursionContext {
        RecursionContext::new(crate::DEFAULT_MAX_DEPTH)
    }

    #[test]
    fn non_text_keys_coerce_to_text() {
        let registry = Registry::new();
        let map = Value::Map(vec![
            (Value::Int(1), Value::from("one")),
            (Value::Bool(true), Value::from("yes")),
            (Value::Null, Value::from("nothing")),
        ]);
        let prim = walk(&map, &registry, Policy::Strict, Format::Json, &mut ctx()).unwrap();
        let Primitive::Map(entries) = prim else {
            panic!("expected map, got {prim:?}");
        };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["1", "true", "null"]);
    }

    #[test]
    fn colliding_coerced_keys_are_an_error() {
        let registry = Registry::new();
        let map = Value::Map(vec![
            (Value::Int(1), Value::Null),
            (Value::Str("1".to_owned()), Value::Null),
        ]);
        let err = walk(&map, &registry, Policy::Strict, Format::Json, &mut ctx()).unwrap_err();
        assert_eq!(err, Error::KeyCollision("1".to_owned()));
    }

    #[test]
    fn sibling_sharing_is_not_a_cycle() {
        let registry = Registry::with_defaults();
        let id = std::sync::Arc::new(uuid::Uuid::nil());
        let shared = Value::Domain(id.clone());
        let seq = Value::seq([shared.clone(), shared]);
        let prim = walk(&seq, &registry, Policy::Strict, Format::Binary, &mut ctx()).unwrap();
        let Primitive::Seq(items) = prim else {
            panic!("expected seq, got {prim:?}");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], items[1]);
    }
}
