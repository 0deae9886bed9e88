//! [`Value`] — the open value type handed to encode and produced by decode.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Object-safe surface a host type needs to travel through the codec.
///
/// Implement this (usually via [`impl_domain_value!`](crate::impl_domain_value))
/// for any type you want to register a converter for, or that should be
/// stringifiable under the permissive encode policy.
pub trait DomainValue: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Human-meaningful type name used in error messages.
    fn type_name(&self) -> &'static str;

    /// Text emitted by permissive encode when no converter matches.
    fn fallback_text(&self) -> String;

    /// Equality across the type-erased boundary. Values of different
    /// concrete types are never equal.
    fn domain_eq(&self, other: &dyn DomainValue) -> bool;
}

/// Implements [`DomainValue`] for a type that is `Display + PartialEq`.
#[macro_export]
macro_rules! impl_domain_value {
    ($ty:ty) => {
        impl $crate::DomainValue for $ty {
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn type_name(&self) -> &'static str {
                ::std::any::type_name::<$ty>()
            }

            fn fallback_text(&self) -> ::std::string::String {
                ::std::string::ToString::to_string(self)
            }

            fn domain_eq(&self, other: &dyn $crate::DomainValue) -> bool {
                other
                    .as_any()
                    .downcast_ref::<$ty>()
                    .is_some_and(|other| self == other)
            }
        }
    };
}

impl_domain_value!(uuid::Uuid);
impl_domain_value!(chrono::DateTime<chrono::Utc>);
impl_domain_value!(chrono::NaiveDate);
impl_domain_value!(std::net::IpAddr);

/// Any in-memory datum the codec accepts or reconstructs.
///
/// Mapping keys are arbitrary values on input; they are coerced to text
/// during normalization. Domain values are shared behind `Arc` so a single
/// object may legally appear under several siblings; only a back-edge on the
/// active traversal path is a cycle.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Unsigned integer above `i64::MAX`.
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Domain(Arc<dyn DomainValue>),
}

impl Value {
    /// Wrap a host value for encoding.
    pub fn domain<T: DomainValue>(value: T) -> Value {
        Value::Domain(Arc::new(value))
    }

    pub fn seq(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Seq(items.into_iter().collect())
    }

    /// Build a mapping with text keys, preserving entry order.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Value {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Str(k.into()), v))
                .collect(),
        )
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            // The binary codec picks the smallest wire form, so an in-range
            // UInt decodes back as Int. Compare numerically across the two.
            (Value::Int(a), Value::UInt(b)) | (Value::UInt(b), Value::Int(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Domain(a), Value::Domain(b)) => a.domain_eq(b.as_ref()),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Value {
        match i64::try_from(v) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::UInt(v),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Value {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::Seq(v)
    }
}
