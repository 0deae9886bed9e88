//! MessagePack bytes → Primitive tree.

use crate::error::Error;
use crate::primitive::Primitive;

/// Byte-level MessagePack reader. Decode is strict by construction: every
/// malformed, truncated, or trailing byte is an error, never a guess.
///
/// Nesting is capped at [`DEFAULT_MAX_DEPTH`](crate::DEFAULT_MAX_DEPTH):
/// well-formed input can still be adversarially deep, and the recursive
/// reader must not exhaust the stack on it.
#[derive(Default)]
pub struct MsgPackDecoder {
    data: Vec<u8>,
    x: usize,
    depth: usize,
}

impl MsgPackDecoder {
    pub fn new() -> Self {
        MsgPackDecoder::default()
    }

    pub fn decode(&mut self, input: &[u8]) -> Result<Primitive, Error> {
        self.data = input.to_vec();
        self.x = 0;
        let value = self.read_any()?;
        if self.x != self.data.len() {
            return Err(Error::decode_at(
                "trailing bytes after top-level value",
                self.x,
            ));
        }
        Ok(value)
    }

    fn enter(&mut self) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > crate::DEFAULT_MAX_DEPTH {
            return Err(Error::DepthExceeded(crate::DEFAULT_MAX_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn check(&self, n: usize) -> Result<(), Error> {
        if self.x + n > self.data.len() {
            return Err(Error::decode_at("unexpected end of input", self.x));
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, Error> {
        self.check(1)?;
        let v = self.data[self.x];
        self.x += 1;
        Ok(v)
    }

    fn u16(&mut self) -> Result<u16, Error> {
        self.check(2)?;
        let v = u16::from_be_bytes([self.data[self.x], self.data[self.x + 1]]);
        self.x += 2;
        Ok(v)
    }

    fn u32(&mut self) -> Result<u32, Error> {
        self.check(4)?;
        let v = u32::from_be_bytes([
            self.data[self.x],
            self.data[self.x + 1],
            self.data[self.x + 2],
            self.data[self.x + 3],
        ]);
        self.x += 4;
        Ok(v)
    }

    fn u64(&mut self) -> Result<u64, Error> {
        let hi = self.u32()? as u64;
        let lo = self.u32()? as u64;
        Ok((hi << 32) | lo)
    }

    fn buf(&mut self, size: usize) -> Result<Vec<u8>, Error> {
        self.check(size)?;
        let v = self.data[self.x..self.x + size].to_vec();
        self.x += size;
        Ok(v)
    }

    fn utf8(&mut self, size: usize) -> Result<String, Error> {
        let offset = self.x;
        let bytes = self.buf(size)?;
        String::from_utf8(bytes).map_err(|_| Error::decode_at("invalid utf-8 in string", offset))
    }

    fn read_any(&mut self) -> Result<Primitive, Error> {
        let marker_offset = self.x;
        let byte = self.u8()?;

        // negative fixint: 0xe0..=0xff
        if byte >= 0xe0 {
            return Ok(Primitive::Int(byte as i8 as i64));
        }
        // positive fixint: 0x00..=0x7f
        if byte <= 0x7f {
            return Ok(Primitive::Int(byte as i64));
        }
        // fixmap: 0x80..=0x8f
        if (0x80..=0x8f).contains(&byte) {
            return self.read_map(byte as usize & 0xf);
        }
        // fixarray: 0x90..=0x9f
        if (0x90..=0x9f).contains(&byte) {
            return self.read_seq(byte as usize & 0xf);
        }
        // fixstr: 0xa0..=0xbf
        if (0xa0..=0xbf).contains(&byte) {
            let len = byte as usize & 0x1f;
            return self.utf8(len).map(Primitive::Str);
        }

        match byte {
            0xc0 => Ok(Primitive::Null),
            0xc2 => Ok(Primitive::Bool(false)),
            0xc3 => Ok(Primitive::Bool(true)),
            // bin8, bin16, bin32
            0xc4 => {
                let n = self.u8()? as usize;
                self.buf(n).map(Primitive::Bytes)
            }
            0xc5 => {
                let n = self.u16()? as usize;
                self.buf(n).map(Primitive::Bytes)
            }
            0xc6 => {
                let n = self.u32()? as usize;
                self.buf(n).map(Primitive::Bytes)
            }
            // ext8, ext16, ext32
            0xc7 => {
                let n = self.u8()? as usize;
                self.read_ext(n)
            }
            0xc8 => {
                let n = self.u16()? as usize;
                self.read_ext(n)
            }
            0xc9 => {
                let n = self.u32()? as usize;
                self.read_ext(n)
            }
            // float32, float64
            0xca => {
                let bits = self.u32()?;
                Ok(Primitive::Float(f32::from_bits(bits) as f64))
            }
            0xcb => {
                let bits = self.u64()?;
                Ok(Primitive::Float(f64::from_bits(bits)))
            }
            // uint8, uint16, uint32, uint64
            0xcc => Ok(Primitive::Int(self.u8()? as i64)),
            0xcd => Ok(Primitive::Int(self.u16()? as i64)),
            0xce => Ok(Primitive::Int(self.u32()? as i64)),
            0xcf => {
                let n = self.u64()?;
                Ok(match i64::try_from(n) {
                    Ok(n) => Primitive::Int(n),
                    Err(_) => Primitive::UInt(n),
                })
            }
            // int8, int16, int32, int64
            0xd0 => Ok(Primitive::Int(self.u8()? as i8 as i64)),
            0xd1 => Ok(Primitive::Int(self.u16()? as i16 as i64)),
            0xd2 => Ok(Primitive::Int(self.u32()? as i32 as i64)),
            0xd3 => Ok(Primitive::Int(self.u64()? as i64)),
            // fixext1, fixext2, fixext4, fixext8, fixext16
            0xd4 => self.read_ext(1),
            0xd5 => self.read_ext(2),
            0xd6 => self.read_ext(4),
            0xd7 => self.read_ext(8),
            0xd8 => self.read_ext(16),
            // str8, str16, str32
            0xd9 => {
                let n = self.u8()? as usize;
                self.utf8(n).map(Primitive::Str)
            }
            0xda => {
                let n = self.u16()? as usize;
                self.utf8(n).map(Primitive::Str)
            }
            0xdb => {
                let n = self.u32()? as usize;
                self.utf8(n).map(Primitive::Str)
            }
            // array16, array32
            0xdc => {
                let n = self.u16()? as usize;
                self.read_seq(n)
            }
            0xdd => {
                let n = self.u32()? as usize;
                self.read_seq(n)
            }
            // map16, map32
            0xde => {
                let n = self.u16()? as usize;
                self.read_map(n)
            }
            0xdf => {
                let n = self.u32()? as usize;
                self.read_map(n)
            }
            // 0xc1 is never used by the format
            _ => Err(Error::decode_at(
                format!("invalid marker byte 0x{byte:02x}"),
                marker_offset,
            )),
        }
    }

    fn read_seq(&mut self, len: usize) -> Result<Primitive, Error> {
        self.enter()?;
        let mut items = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            items.push(self.read_any()?);
        }
        self.leave();
        Ok(Primitive::Seq(items))
    }

    fn read_map(&mut self, len: usize) -> Result<Primitive, Error> {
        self.enter()?;
        let mut entries = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            let key_offset = self.x;
            let key = match self.read_any()? {
                Primitive::Str(s) => s,
                other => {
                    return Err(Error::decode_at(
                        format!("non-text map key: {other:?}"),
                        key_offset,
                    ))
                }
            };
            entries.push((key, self.read_any()?));
        }
        self.leave();
        Ok(Primitive::Map(entries))
    }

    fn read_ext(&mut self, len: usize) -> Result<Primitive, Error> {
        let tag_offset = self.x;
        let tag = self.u8()?;
        if tag > 0x7f {
            return Err(Error::decode_at(
                format!("extension tag 0x{tag:02x} out of range"),
                tag_offset,
            ));
        }
        let body = self.buf(len)?;
        self.enter()?;
        // The payload is a complete nested document; the nested decode
        // enforces exact consumption and inherits the depth already spent.
        let mut nested = MsgPackDecoder::new();
        nested.depth = self.depth;
        let payload = nested.decode(&body)?;
        self.leave();
        Ok(Primitive::Ext(tag, Box::new(payload)))
    }
}
