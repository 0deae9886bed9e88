//! Converter registry: runtime type → (encoder, decoder, extension tag).

use std::any::TypeId;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::error::Error;
use crate::value::{DomainValue, Value};

/// Inclusive tag interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRange {
    pub min: u8,
    pub max: u8,
}

impl TagRange {
    pub fn contains(&self, tag: u8) -> bool {
        tag >= self.min && tag <= self.max
    }
}

/// Tags claimed by the library's built-in converters.
pub const RESERVED_TAGS: TagRange = TagRange { min: 0, max: 32 };

/// Tags available to host applications via [`Registry::register`].
pub const APPLICATION_TAGS: TagRange = TagRange { min: 33, max: 127 };

pub const TAG_UUID: u8 = 0;
pub const TAG_TIMESTAMP: u8 = 1;
pub const TAG_DATE: u8 = 2;
pub const TAG_IP_ADDR: u8 = 3;

type EncodeFn = dyn Fn(&dyn DomainValue) -> Result<Value, Error> + Send + Sync;
type DecodeFn = dyn Fn(&Value) -> Result<Value, Error> + Send + Sync;
type MatchFn = dyn Fn(&dyn DomainValue) -> bool + Send + Sync;

/// Type-erased encode/decode pair keyed by a concrete type and a tag.
pub struct Converter {
    /// Exact-match key; `None` for erased converters that rely solely on
    /// their match predicate.
    type_id: Option<TypeId>,
    type_name: &'static str,
    tag: u8,
    encode: Box<EncodeFn>,
    decode: Box<DecodeFn>,
    matches: Option<Box<MatchFn>>,
}

impl Converter {
    /// Converter for a single concrete type `T`.
    pub fn new<T: DomainValue>(
        tag: u8,
        encode: impl Fn(&T) -> Result<Value, Error> + Send + Sync + 'static,
        decode: impl Fn(&Value) -> Result<T, Error> + Send + Sync + 'static,
    ) -> Self {
        Converter {
            type_id: Some(TypeId::of::<T>()),
            type_name: std::any::type_name::<T>(),
            tag,
            encode: Box::new(move |value| {
                let value = value
                    .as_any()
                    .downcast_ref::<T>()
                    .ok_or(Error::UnsupportedType(std::any::type_name::<T>()))?;
                encode(value)
            }),
            decode: Box::new(move |payload| decode(payload).map(Value::domain)),
            matches: None,
        }
    }

    /// Converter for a family of types selected by a predicate rather than
    /// an exact type. The encoder receives the erased value and must handle
    /// everything the predicate accepts; decode rebuilds the family's
    /// canonical representation. Exact registrations always win over
    /// predicate matches; among predicate matches the first registered wins.
    pub fn new_erased(
        tag: u8,
        type_name: &'static str,
        encode: impl Fn(&dyn DomainValue) -> Result<Value, Error> + Send + Sync + 'static,
        decode: impl Fn(&Value) -> Result<Value, Error> + Send + Sync + 'static,
        matches: impl Fn(&dyn DomainValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        Converter {
            type_id: None,
            type_name,
            tag,
            encode: Box::new(encode),
            decode: Box::new(decode),
            matches: Some(Box::new(matches)),
        }
    }

    /// Attach a structural-match predicate to a typed converter, consulted
    /// when no exact type match exists. The encoder still only accepts its
    /// own `T`; the predicate should not claim values it cannot encode.
    pub fn with_match(
        mut self,
        matches: impl Fn(&dyn DomainValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.matches = Some(Box::new(matches));
        self
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn encode(&self, value: &dyn DomainValue) -> Result<Value, Error> {
        (self.encode)(value)
    }

    pub(crate) fn decode(&self, payload: &Value) -> Result<Value, Error> {
        (self.decode)(payload)
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("type_name", &self.type_name)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// Mutable converter table.
///
/// Registration order is significant: it is the tie-break for predicate
/// matching. The table is read-only during any single walk; see the crate
/// docs for the concurrency contract around the process-wide instance.
#[derive(Debug, Default)]
pub struct Registry {
    converters: Vec<Converter>,
    by_type: IndexMap<TypeId, usize>,
    by_tag: IndexMap<u8, usize>,
}

impl Registry {
    /// Empty registry with no converters at all.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Registry pre-populated with the built-in converters: UUIDs,
    /// RFC 3339 timestamps, ISO dates, and IP addresses.
    pub fn with_defaults() -> Self {
        let mut registry = Registry::default();
        registry
            .install_defaults()
            .expect("built-in converter tags do not collide");
        registry
    }

    fn install_defaults(&mut self) -> Result<(), Error> {
        self.register_reserved::<Uuid>(
            TAG_UUID,
            |u| Ok(Value::Str(u.to_string())),
            |payload| {
                let text = payload_text(payload, "uuid")?;
                Uuid::parse_str(text).map_err(|err| Error::decode(format!("invalid uuid: {err}")))
            },
        )?;
        self.register_reserved::<DateTime<Utc>>(
            TAG_TIMESTAMP,
            |dt| Ok(Value::Str(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
            |payload| {
                let text = payload_text(payload, "timestamp")?;
                DateTime::parse_from_rfc3339(text)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|err| Error::decode(format!("invalid rfc3339 timestamp: {err}")))
            },
        )?;
        self.register_reserved::<NaiveDate>(
            TAG_DATE,
            |date| Ok(Value::Str(date.format("%Y-%m-%d").to_string())),
            |payload| {
                let text = payload_text(payload, "date")?;
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map_err(|err| Error::decode(format!("invalid date: {err}")))
            },
        )?;
        self.register_reserved::<IpAddr>(
            TAG_IP_ADDR,
            |ip| Ok(Value::Str(ip.to_string())),
            |payload| {
                let text = payload_text(payload, "ip address")?;
                text.parse::<IpAddr>()
                    .map_err(|err| Error::decode(format!("invalid ip address: {err}")))
            },
        )?;
        Ok(())
    }

    /// Register a converter in the application tag range. Adds or replaces:
    /// re-registering the same type frees its previous tag, while a tag held
    /// by a different type is a [`Error::Conflict`].
    pub fn register<T: DomainValue>(
        &mut self,
        tag: u8,
        encode: impl Fn(&T) -> Result<Value, Error> + Send + Sync + 'static,
        decode: impl Fn(&Value) -> Result<T, Error> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        self.insert(Converter::new::<T>(tag, encode, decode), APPLICATION_TAGS)
    }

    /// Register in the library-reserved tag range. Intended for embedders
    /// that extend the built-in set.
    pub fn register_reserved<T: DomainValue>(
        &mut self,
        tag: u8,
        encode: impl Fn(&T) -> Result<Value, Error> + Send + Sync + 'static,
        decode: impl Fn(&Value) -> Result<T, Error> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        self.insert(Converter::new::<T>(tag, encode, decode), RESERVED_TAGS)
    }

    /// Register a pre-built converter (the escape hatch for predicate
    /// matching) in the application tag range.
    pub fn register_converter(&mut self, converter: Converter) -> Result<(), Error> {
        self.insert(converter, APPLICATION_TAGS)
    }

    fn insert(&mut self, converter: Converter, range: TagRange) -> Result<(), Error> {
        if !range.contains(converter.tag) {
            return Err(Error::TagOutOfRange {
                tag: converter.tag,
                min: range.min,
                max: range.max,
            });
        }
        if let Some(&slot) = self.by_tag.get(&converter.tag) {
            // Erased converters carry no type identity, so an occupied tag
            // is always a conflict for them; only a converter for the same
            // concrete type may replace in place.
            let same_target = match (self.converters[slot].type_id, converter.type_id) {
                (Some(existing), Some(new)) => existing == new,
                _ => false,
            };
            if !same_target {
                return Err(Error::Conflict {
                    tag: converter.tag,
                    existing: self.converters[slot].type_name,
                });
            }
            self.converters[slot] = converter;
            return Ok(());
        }
        if let Some(type_id) = converter.type_id {
            if let Some(&slot) = self.by_type.get(&type_id) {
                // Same type moving to a new tag; the old tag is released.
                let old_tag = self.converters[slot].tag;
                self.by_tag.shift_remove(&old_tag);
                self.by_tag.insert(converter.tag, slot);
                self.converters[slot] = converter;
                return Ok(());
            }
        }
        let slot = self.converters.len();
        self.by_tag.insert(converter.tag, slot);
        if let Some(type_id) = converter.type_id {
            self.by_type.insert(type_id, slot);
        }
        self.converters.push(converter);
        Ok(())
    }

    /// Converter matching the value's runtime type: exact type first, then
    /// the first registered predicate match.
    pub fn lookup_by_type(&self, value: &dyn DomainValue) -> Option<&Converter> {
        if let Some(&slot) = self.by_type.get(&value.as_any().type_id()) {
            return Some(&self.converters[slot]);
        }
        self.converters
            .iter()
            .find(|c| c.matches.as_ref().is_some_and(|m| m(value)))
    }

    /// Converter for a binary extension tag.
    pub fn lookup_by_tag(&self, tag: u8) -> Option<&Converter> {
        self.by_tag.get(&tag).map(|&slot| &self.converters[slot])
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

fn payload_text<'a>(payload: &'a Value, what: &str) -> Result<&'a str, Error> {
    match payload {
        Value::Str(s) => Ok(s),
        other => Err(Error::decode(format!(
            "{what} payload must be text, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Token(u32);

    impl std::fmt::Display for Token {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "token:{}", self.0)
        }
    }

    crate::impl_domain_value!(Token);

    fn token_converter(tag: u8) -> Converter {
        Converter::new::<Token>(
            tag,
            |t| Ok(Value::Int(t.0 as i64)),
            |payload| match payload {
                Value::Int(n) => Ok(Token(*n as u32)),
                other => Err(Error::decode(format!("bad token payload: {other:?}"))),
            },
        )
    }

    #[test]
    fn defaults_cover_reserved_tags() {
        let registry = Registry::with_defaults();
        assert_eq!(registry.len(), 4);
        for tag in [TAG_UUID, TAG_TIMESTAMP, TAG_DATE, TAG_IP_ADDR] {
            assert!(registry.lookup_by_tag(tag).is_some());
        }
        assert!(registry.lookup_by_tag(99).is_none());
    }

    #[test]
    fn application_range_is_enforced() {
        let mut registry = Registry::new();
        let err = registry.register_converter(token_converter(5)).unwrap_err();
        assert_eq!(
            err,
            Error::TagOutOfRange {
                tag: 5,
                min: APPLICATION_TAGS.min,
                max: APPLICATION_TAGS.max
            }
        );
    }

    #[test]
    fn tag_conflict_is_rejected_and_replacement_allowed() {
        #[derive(Debug, Clone, PartialEq)]
        struct Other;

        impl std::fmt::Display for Other {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "other")
            }
        }

        crate::impl_domain_value!(Other);

        let mut registry = Registry::new();
        registry.register_converter(token_converter(40)).unwrap();

        let conflict = registry
            .register::<Other>(40, |_| Ok(Value::Null), |_| Ok(Other))
            .unwrap_err();
        assert!(matches!(conflict, Error::Conflict { tag: 40, .. }));

        // Same type may move to a new tag; the old tag is released.
        registry.register_converter(token_converter(41)).unwrap();
        assert!(registry.lookup_by_tag(40).is_none());
        assert!(registry.lookup_by_tag(41).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn erased_converters_conflict_on_an_occupied_tag() {
        fn family(tag: u8, name: &'static str) -> Converter {
            Converter::new_erased(
                tag,
                name,
                |_| Ok(Value::Null),
                |_| Err(Error::decode("opaque")),
                |_| false,
            )
        }

        let mut registry = Registry::new();
        registry.register_converter(family(40, "family-a")).unwrap();
        let err = registry
            .register_converter(family(40, "family-b"))
            .unwrap_err();
        assert_eq!(
            err,
            Error::Conflict {
                tag: 40,
                existing: "family-a"
            }
        );
        // The first family stays installed.
        assert_eq!(
            registry.lookup_by_tag(40).map(Converter::type_name),
            Some("family-a")
        );
    }

    #[test]
    fn exact_match_wins_over_predicate() {
        let mut registry = Registry::new();
        registry
            .register_converter(Converter::new_erased(
                50,
                "any-token",
                |_| Ok(Value::Null),
                |_| Err(Error::decode("not reconstructible")),
                |value| value.as_any().is::<Token>(),
            ))
            .unwrap();
        registry.register_converter(token_converter(51)).unwrap();

        let token = Token(7);
        let found = registry.lookup_by_type(&token).expect("converter");
        assert_eq!(found.tag(), 51);
    }
}
