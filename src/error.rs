//! Error taxonomy shared by both codecs and the registry.

use thiserror::Error;

/// Every failure surfaced by encode, decode, or registration.
///
/// Encode failures are deterministic for a given input and registry state;
/// nothing here is transient or retryable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Strict encode reached a value with no registered converter, or a
    /// value shape the target format cannot carry.
    #[error("unsupported type `{0}`")]
    UnsupportedType(&'static str),

    /// Extension tag already claimed by a converter for a different type.
    #[error("extension tag {tag} is already registered for `{existing}`")]
    Conflict { tag: u8, existing: &'static str },

    /// Registration used a tag outside the permitted range.
    #[error("extension tag {tag} is outside the allowed range {min}..={max}")]
    TagOutOfRange { tag: u8, min: u8, max: u8 },

    /// Two distinct mapping keys coerced to the same text key.
    #[error("mapping keys collide after text coercion: `{0}`")]
    KeyCollision(String),

    /// The recursion ceiling was hit while walking a value graph.
    #[error("maximum recursion depth {0} exceeded")]
    DepthExceeded(usize),

    /// A composite referenced an ancestor on its own traversal path.
    #[error("cyclic reference detected on the active path")]
    CyclicReference,

    /// Malformed text or binary input. `offset` is the byte position of the
    /// offending input for both codecs; JSON parse errors additionally carry
    /// line/column in the message.
    #[error("decode failed: {msg}")]
    Decode { msg: String, offset: Option<usize> },

    /// Binary decode hit an extension tag with no registered converter.
    #[error("unknown extension tag {0}")]
    UnknownExtension(u8),
}

impl Error {
    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Error::Decode {
            msg: msg.into(),
            offset: None,
        }
    }

    pub(crate) fn decode_at(msg: impl Into<String>, offset: usize) -> Self {
        Error::Decode {
            msg: msg.into(),
            offset: Some(offset),
        }
    }
}

// Serialization path only; the JSON decoder maps parse errors itself so it
// can attach the byte offset.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::decode(err.to_string())
    }
}
