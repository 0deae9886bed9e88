//! Primitive tree → MessagePack bytes.

use crate::error::Error;
use crate::primitive::Primitive;

/// Byte-level MessagePack writer. Picks the smallest wire form for every
/// value; byte buffers use the bin family so non-text bytes survive intact.
/// Lengths past the 32-bit framing limit are an error, never a truncation.
#[derive(Default)]
pub struct MsgPackEncoder {
    out: Vec<u8>,
}

impl MsgPackEncoder {
    pub fn new() -> Self {
        MsgPackEncoder::default()
    }

    pub fn encode(&mut self, value: &Primitive) -> Result<Vec<u8>, Error> {
        self.out.clear();
        self.write_any(value)?;
        Ok(std::mem::take(&mut self.out))
    }

    fn write_any(&mut self, value: &Primitive) -> Result<(), Error> {
        match value {
            Primitive::Null => self.out.push(0xc0),
            Primitive::Bool(b) => self.out.push(if *b { 0xc3 } else { 0xc2 }),
            Primitive::Int(n) => self.write_int(*n),
            Primitive::UInt(n) => self.write_uint(*n),
            Primitive::Float(f) => self.write_float(*f),
            Primitive::Str(s) => return self.write_str(s),
            Primitive::Bytes(b) => return self.write_bytes(b),
            Primitive::Seq(items) => return self.write_seq(items),
            Primitive::Map(entries) => return self.write_map(entries),
            Primitive::Ext(tag, payload) => return self.write_ext(*tag, payload),
        }
        Ok(())
    }

    fn write_int(&mut self, n: i64) {
        if n >= 0 {
            self.write_uint(n as u64);
        } else if n >= -0x20 {
            // negative fixint
            self.out.push(n as i8 as u8);
        } else if n >= i8::MIN as i64 {
            self.out.push(0xd0);
            self.out.push(n as i8 as u8);
        } else if n >= i16::MIN as i64 {
            self.out.push(0xd1);
            self.out.extend_from_slice(&(n as i16).to_be_bytes());
        } else if n >= i32::MIN as i64 {
            self.out.push(0xd2);
            self.out.extend_from_slice(&(n as i32).to_be_bytes());
        } else {
            self.out.push(0xd3);
            self.out.extend_from_slice(&n.to_be_bytes());
        }
    }

    fn write_uint(&mut self, n: u64) {
        if n <= 0x7f {
            // positive fixint
            self.out.push(n as u8);
        } else if n <= 0xff {
            self.out.push(0xcc);
            self.out.push(n as u8);
        } else if n <= 0xffff {
            self.out.push(0xcd);
            self.out.extend_from_slice(&(n as u16).to_be_bytes());
        } else if n <= 0xffff_ffff {
            self.out.push(0xce);
            self.out.extend_from_slice(&(n as u32).to_be_bytes());
        } else {
            self.out.push(0xcf);
            self.out.extend_from_slice(&n.to_be_bytes());
        }
    }

    fn write_float(&mut self, f: f64) {
        self.out.push(0xcb);
        self.out.extend_from_slice(&f.to_be_bytes());
    }

    fn write_str(&mut self, s: &str) -> Result<(), Error> {
        let len = s.len();
        if len <= 0x1f {
            self.out.push(0xa0 | len as u8);
        } else if len <= 0xff {
            self.out.push(0xd9);
            self.out.push(len as u8);
        } else if len <= 0xffff {
            self.out.push(0xda);
            self.out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            self.out.push(0xdb);
            self.out.extend_from_slice(&len32(len)?.to_be_bytes());
        }
        self.out.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn write_bytes(&mut self, b: &[u8]) -> Result<(), Error> {
        let len = b.len();
        if len <= 0xff {
            self.out.push(0xc4);
            self.out.push(len as u8);
        } else if len <= 0xffff {
            self.out.push(0xc5);
            self.out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            self.out.push(0xc6);
            self.out.extend_from_slice(&len32(len)?.to_be_bytes());
        }
        self.out.extend_from_slice(b);
        Ok(())
    }

    fn write_seq(&mut self, items: &[Primitive]) -> Result<(), Error> {
        let len = items.len();
        if len <= 0xf {
            self.out.push(0x90 | len as u8);
        } else if len <= 0xffff {
            self.out.push(0xdc);
            self.out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            self.out.push(0xdd);
            self.out.extend_from_slice(&len32(len)?.to_be_bytes());
        }
        for item in items {
            self.write_any(item)?;
        }
        Ok(())
    }

    fn write_map(&mut self, entries: &[(String, Primitive)]) -> Result<(), Error> {
        let len = entries.len();
        if len <= 0xf {
            self.out.push(0x80 | len as u8);
        } else if len <= 0xffff {
            self.out.push(0xde);
            self.out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            self.out.push(0xdf);
            self.out.extend_from_slice(&len32(len)?.to_be_bytes());
        }
        for (key, val) in entries {
            self.write_str(key)?;
            self.write_any(val)?;
        }
        Ok(())
    }

    /// Ext frame: the payload is encoded as a nested MessagePack document,
    /// then wrapped with the converter tag.
    fn write_ext(&mut self, tag: u8, payload: &Primitive) -> Result<(), Error> {
        let body = MsgPackEncoder::new().encode(payload)?;
        match body.len() {
            1 => self.out.push(0xd4),
            2 => self.out.push(0xd5),
            4 => self.out.push(0xd6),
            8 => self.out.push(0xd7),
            16 => self.out.push(0xd8),
            n if n <= 0xff => {
                self.out.push(0xc7);
                self.out.push(n as u8);
            }
            n if n <= 0xffff => {
                self.out.push(0xc8);
                self.out.extend_from_slice(&(n as u16).to_be_bytes());
            }
            n => {
                self.out.push(0xc9);
                self.out.extend_from_slice(&len32(n)?.to_be_bytes());
            }
        }
        self.out.push(tag);
        self.out.extend_from_slice(&body);
        Ok(())
    }
}

/// str32/bin32/array32/map32/ext32 framing tops out at `u32::MAX`; anything
/// longer cannot be represented on the wire.
fn len32(len: usize) -> Result<u32, Error> {
    u32::try_from(len).map_err(|_| Error::UnsupportedType("value longer than u32::MAX"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_markers() {
        let mut encoder = MsgPackEncoder::new();
        assert_eq!(encoder.encode(&Primitive::Null).unwrap(), [0xc0]);
        assert_eq!(encoder.encode(&Primitive::Bool(false)).unwrap(), [0xc2]);
        assert_eq!(encoder.encode(&Primitive::Bool(true)).unwrap(), [0xc3]);
        assert_eq!(encoder.encode(&Primitive::Int(0)).unwrap(), [0x00]);
        assert_eq!(encoder.encode(&Primitive::Int(127)).unwrap(), [0x7f]);
        assert_eq!(encoder.encode(&Primitive::Int(-1)).unwrap(), [0xff]);
        assert_eq!(encoder.encode(&Primitive::Int(-32)).unwrap(), [0xe0]);
        assert_eq!(encoder.encode(&Primitive::Int(-33)).unwrap(), [0xd0, 0xdf]);
        assert_eq!(encoder.encode(&Primitive::Int(255)).unwrap(), [0xcc, 0xff]);
        assert_eq!(
            encoder.encode(&Primitive::Str("foo".into())).unwrap(),
            [0xa3, b'f', b'o', b'o']
        );
        assert_eq!(
            encoder.encode(&Primitive::Bytes(vec![0xde, 0xad])).unwrap(),
            [0xc4, 2, 0xde, 0xad]
        );
    }

    #[test]
    fn fixext_widths_match_payload_size() {
        let mut encoder = MsgPackEncoder::new();
        // Int(5) encodes to one byte, so the frame is fixext1.
        let framed = encoder
            .encode(&Primitive::Ext(33, Box::new(Primitive::Int(5))))
            .unwrap();
        assert_eq!(framed, [0xd4, 33, 0x05]);
        // A three-byte payload falls through to ext8.
        let framed = encoder
            .encode(&Primitive::Ext(33, Box::new(Primitive::Str("ab".into()))))
            .unwrap();
        assert_eq!(framed, [0xc7, 3, 33, 0xa2, b'a', b'b']);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn lengths_past_32_bit_framing_are_rejected() {
        assert_eq!(len32(7).unwrap(), 7);
        assert_eq!(len32(u32::MAX as usize).unwrap(), u32::MAX);
        assert_eq!(
            len32(u32::MAX as usize + 1).unwrap_err(),
            Error::UnsupportedType("value longer than u32::MAX")
        );
    }
}
