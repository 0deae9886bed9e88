//! JSON text codec: renders and parses [`Primitive`](crate::Primitive)
//! trees per RFC 8259, delegating the grammar to `serde_json`.

mod decoder;
mod encoder;

pub use decoder::decode;
pub use encoder::encode;
