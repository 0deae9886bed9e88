//! MessagePack binary codec.
//!
//! Encodes [`Primitive`](crate::Primitive) trees into the standard
//! MessagePack wire format, using ext frames to preserve type identity for
//! converter-encoded values. The ext payload is itself a complete
//! MessagePack document.

mod decoder;
mod encoder;

pub use decoder::MsgPackDecoder;
pub use encoder::MsgPackEncoder;

use crate::error::Error;
use crate::primitive::Primitive;

/// One-shot encode. Fails only on lengths the wire format cannot frame.
pub fn encode(value: &Primitive) -> Result<Vec<u8>, Error> {
    MsgPackEncoder::new().encode(value)
}

/// One-shot decode. Rejects truncated input and trailing bytes.
pub fn decode(input: &[u8]) -> Result<Primitive, Error> {
    MsgPackDecoder::new().decode(input)
}
