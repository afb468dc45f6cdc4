use std::io::Read;

use serde::de::{self, DeserializeSeed, SeqAccess, Visitor};

use crate::error::{Error, Result};
use crate::record::DEFAULT_MAX_DEPTH;
use crate::{string, varint};

/// Deserializes Rust values from the positional wire layout.
///
/// The format is not self-describing, so `deserialize_any` and friends are
/// rejected with [`Error::Unsupported`].
pub struct Deserializer<R> {
    reader: R,
    consumed: bool,
    /// Successful primitive reads so far.
    reads: u64,
    depth: usize,
    max_depth: usize,
}

impl<R: Read> Deserializer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            consumed: false,
            reads: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Once a byte of the value has been read, a clean end of stream is no
    /// longer clean.
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(v) => {
                self.consumed = true;
                self.reads += 1;
                Ok(v)
            }
            Err(e) if self.consumed => Err(e.mid_value()),
            Err(e) => Err(e),
        }
    }

    fn byte(&mut self) -> Result<u8> {
        let result = varint::read_byte(&mut self.reader)
            .and_then(|b| b.ok_or(Error::EndOfStream));
        self.track(result)
    }

    fn varint(&mut self) -> Result<u32> {
        let result = varint::decode(&mut self.reader);
        self.track(result)
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.varint()?;
        let result = string::read_exact(&mut self.reader, len as usize);
        self.track(result)
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(Error::SchemaDepthExceeded {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }
}

impl<'de, 'a, R: Read> de::Deserializer<'de> for &'a mut Deserializer<R> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Unsupported("self-describing deserialization"))
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.byte()? {
            0 => visitor.visit_bool(false),
            1 => visitor.visit_bool(true),
            other => Err(Error::InvalidDiscriminant(other)),
        }
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_u8(self.byte()?)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = u16::try_from(self.varint()?).map_err(|_| Error::IntegerOverflow)?;
        visitor.visit_u16(v)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_u32(self.varint()?)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Unsupported("u64"))
    }

    fn deserialize_i8<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Unsupported("i8"))
    }

    fn deserialize_i16<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Unsupported("i16"))
    }

    fn deserialize_i32<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Unsupported("i32"))
    }

    fn deserialize_i64<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Unsupported("i64"))
    }

    fn deserialize_f32<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Unsupported("f32"))
    }

    fn deserialize_f64<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Unsupported("f64"))
    }

    fn deserialize_char<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Unsupported("char"))
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let bytes = self.bytes()?;
        visitor.visit_string(string::from_utf8(bytes)?)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_byte_buf(self.bytes()?)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.byte()? {
            0 => visitor.visit_none(),
            1 => {
                self.enter()?;
                let value = visitor.visit_some(&mut *self);
                self.leave();
                value
            }
            other => Err(Error::InvalidDiscriminant(other)),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let len = self.varint()?;
        self.enter()?;
        let value = visitor.visit_seq(Access {
            de: &mut *self,
            remaining: len as usize,
            fields: None,
            index: 0,
            sequence: true,
        });
        self.leave();
        value
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        self.enter()?;
        let value = visitor.visit_seq(Access {
            de: &mut *self,
            remaining: len,
            fields: None,
            index: 0,
            sequence: false,
        });
        self.leave();
        value
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Unsupported("map"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        self.enter()?;
        let value = visitor.visit_seq(Access {
            de: &mut *self,
            remaining: fields.len(),
            fields: Some(fields),
            index: 0,
            sequence: false,
        });
        self.leave();
        value
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value> {
        Err(Error::Unsupported("enum"))
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Unsupported("identifier"))
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Unsupported("ignored value"))
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

struct Access<'a, R> {
    de: &'a mut Deserializer<R>,
    remaining: usize,
    fields: Option<&'static [&'static str]>,
    index: usize,
    /// Length came off the wire, so every item must consume input.
    sequence: bool,
}

impl<'de, 'a, R: Read> SeqAccess<'de> for Access<'a, R> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let index = self.index;
        self.index += 1;
        let before = self.de.reads;
        let value = seed.deserialize(&mut *self.de);
        match (value, self.fields) {
            (Ok(_), _) if self.sequence && self.de.reads == before => Err(Error::ZeroSizedItems(
                std::any::type_name::<T::Value>().to_string(),
            )),
            (Ok(v), _) => Ok(Some(v)),
            // Clean end of stream before the first field propagates unwrapped.
            (Err(e), _) if e.is_end_of_stream() => Err(e),
            (Err(e), Some(fields)) => Err(Error::field(fields[index], e)),
            (Err(e), None) => Err(e),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}
