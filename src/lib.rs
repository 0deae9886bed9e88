//! Type-aware serialization to JSON text and MessagePack binary.
//!
//! This crate gets arbitrary value graphs — including types neither format
//! understands natively, like timestamps, UUIDs, or host domain objects —
//! down to transport primitives and back:
//!
//! - a [`Registry`] of per-type [`Converter`]s, extensible by the host;
//! - a recursive walker that normalizes values depth-first with a recursion
//!   ceiling and cycle detection;
//! - a JSON codec (RFC 8259 via `serde_json`) with cosmetic pretty-printing
//!   and key sorting;
//! - a MessagePack codec whose ext frames preserve type identity that JSON
//!   loses.
//!
//! ```
//! use typepack::{from_binary, to_binary, EncodeOptions, Value};
//!
//! let value = Value::map([("id", Value::domain(uuid::Uuid::nil()))]);
//! let bytes = to_binary(&value, &EncodeOptions::default()).unwrap();
//! assert_eq!(from_binary(&bytes).unwrap(), value);
//! ```
//!
//! # Concurrency contract
//!
//! The process-wide registry behind [`register_type`] uses a reader-writer
//! lock: encode/decode calls take read locks, registration the write lock.
//! Registration is expected during the host's configuration phase; it is
//! safe while calls are in flight, but a registration only affects calls
//! that start after it completes. Explicit [`Registry`] instances passed to
//! the `*_with` entry points have no locking and follow ordinary ownership
//! rules.

mod error;
mod primitive;
mod registry;
mod value;
mod walk;

pub mod json;
pub mod msgpack;

use std::sync::{OnceLock, RwLock};

use walk::{Format, RecursionContext};

pub use error::Error;
pub use primitive::Primitive;
pub use registry::{
    Converter, Registry, TagRange, APPLICATION_TAGS, RESERVED_TAGS, TAG_DATE, TAG_IP_ADDR,
    TAG_TIMESTAMP, TAG_UUID,
};
pub use value::{DomainValue, Value};

/// Recursion ceiling used when [`EncodeOptions::max_depth`] is left alone.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// What to do with a value no converter matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Fail with [`Error::UnsupportedType`].
    #[default]
    Strict,
    /// Fall back to the value's text rendering; the encode path never fails
    /// on unknown input.
    Permissive,
}

/// Per-call encode configuration. `pretty` and `sort_keys` only apply to
/// JSON and are cosmetic: they never change the decoded value.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub pretty: bool,
    pub sort_keys: bool,
    pub policy: Policy,
    pub max_depth: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            pretty: false,
            sort_keys: false,
            policy: Policy::Strict,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EncodeOptions {
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    pub fn sort_keys(mut self) -> Self {
        self.sort_keys = true;
        self
    }

    pub fn permissive(mut self) -> Self {
        self.policy = Policy::Permissive;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

static DEFAULT_REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();

/// The process-wide registry used by the plain entry points, created with
/// the built-in converters on first use.
pub fn default_registry() -> &'static RwLock<Registry> {
    DEFAULT_REGISTRY.get_or_init(|| RwLock::new(Registry::with_defaults()))
}

/// Register a converter for `T` in the process-wide registry
/// (application tag range, `33..=127`).
pub fn register_type<T: DomainValue>(
    tag: u8,
    encode: impl Fn(&T) -> Result<Value, Error> + Send + Sync + 'static,
    decode: impl Fn(&Value) -> Result<T, Error> + Send + Sync + 'static,
) -> Result<(), Error> {
    let mut registry = default_registry()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    registry.register(tag, encode, decode)
}

/// Serialize `value` to JSON text using the process-wide registry.
pub fn to_json(value: &Value, options: &EncodeOptions) -> Result<String, Error> {
    let registry = default_registry()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    to_json_with(value, options, &registry)
}

/// Serialize `value` to JSON text against an explicit registry.
pub fn to_json_with(
    value: &Value,
    options: &EncodeOptions,
    registry: &Registry,
) -> Result<String, Error> {
    let mut ctx = RecursionContext::new(options.max_depth);
    let prim = walk::walk(value, registry, options.policy, Format::Json, &mut ctx)?;
    json::encode(&prim, options.pretty, options.sort_keys)
}

/// Parse JSON text. The result contains native primitives only: JSON has no
/// extension markers, so domain-type identity is not reconstructed.
pub fn from_json(text: &str) -> Result<Value, Error> {
    let registry = default_registry()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    from_json_with(text, &registry)
}

/// Parse JSON text against an explicit registry.
pub fn from_json_with(text: &str, registry: &Registry) -> Result<Value, Error> {
    walk::revive(json::decode(text)?, registry)
}

/// Serialize `value` to MessagePack bytes using the process-wide registry.
pub fn to_binary(value: &Value, options: &EncodeOptions) -> Result<Vec<u8>, Error> {
    let registry = default_registry()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    to_binary_with(value, options, &registry)
}

/// Serialize `value` to MessagePack bytes against an explicit registry.
pub fn to_binary_with(
    value: &Value,
    options: &EncodeOptions,
    registry: &Registry,
) -> Result<Vec<u8>, Error> {
    let mut ctx = RecursionContext::new(options.max_depth);
    let prim = walk::walk(value, registry, options.policy, Format::Binary, &mut ctx)?;
    msgpack::encode(&prim)
}

/// Decode MessagePack bytes, reconstructing domain values from extension
/// frames. Decode is always strict: an unregistered tag is
/// [`Error::UnknownExtension`], never a silent fallback.
pub fn from_binary(bytes: &[u8]) -> Result<Value, Error> {
    let registry = default_registry()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    from_binary_with(bytes, &registry)
}

/// Decode MessagePack bytes against an explicit registry.
pub fn from_binary_with(bytes: &[u8], registry: &Registry) -> Result<Value, Error> {
    walk::revive(msgpack::decode(bytes)?, registry)
}
