//! [`Primitive`] — the closed set of transport-safe shapes.

/// Normalized form every value is reduced to before hitting a wire codec.
///
/// Every variant is representable in both target formats except `Bytes` and
/// `Ext`, which only the binary codec preserves losslessly; the JSON codec
/// degrades bytes to base64 text and inlines extension payloads bare.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Null,
    Bool(bool),
    Int(i64),
    /// Unsigned integer above `i64::MAX`.
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<Primitive>),
    /// Ordered text-keyed mapping. Insertion order is preserved on encode.
    Map(Vec<(String, Primitive)>),
    /// Extension frame: converter tag plus the converter's encoded payload.
    /// Produced only when normalizing for the binary format.
    Ext(u8, Box<Primitive>),
}
