use std::io::Write;

use serde::ser::{self, Impossible, Serialize};

use crate::error::{Error, Result};
use crate::record::DEFAULT_MAX_DEPTH;
use crate::{string, varint};

/// Serializes Rust values into the positional wire layout.
///
/// Writes go straight to the underlying writer; use
/// [`to_writer`](super::to_writer) to keep a failed value off the stream.
pub struct Serializer<W> {
    writer: W,
    written: u64,
    depth: usize,
    max_depth: usize,
}

impl<W: Write> Serializer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn byte(&mut self, b: u8) -> Result<()> {
        self.put(&[b])
    }

    fn varint(&mut self, v: u32) -> Result<()> {
        let (bytes, len) = varint::groups(v);
        self.put(&bytes[..len])
    }

    fn bytes(&mut self, v: &[u8]) -> Result<()> {
        self.varint(string::checked_len(v.len())?)?;
        self.put(v)
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

    fn leave(&mut self) -> Result<()> {
        self.depth -= 1;
        Ok(())
    }
}

impl<'a, W: Write> ser::Serializer for &'a mut Serializer<W> {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Self;
    type SerializeStructVariant = Impossible<(), Error>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.byte(u8::from(v))
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.byte(v)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.varint(u32::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.varint(v)
    }

    fn serialize_u64(self, _v: u64) -> Result<()> {
        Err(Error::Unsupported("u64"))
    }

    fn serialize_i8(self, _v: i8) -> Result<()> {
        Err(Error::Unsupported("i8"))
    }

    fn serialize_i16(self, _v: i16) -> Result<()> {
        Err(Error::Unsupported("i16"))
    }

    fn serialize_i32(self, _v: i32) -> Result<()> {
        Err(Error::Unsupported("i32"))
    }

    fn serialize_i64(self, _v: i64) -> Result<()> {
        Err(Error::Unsupported("i64"))
    }

    fn serialize_f32(self, _v: f32) -> Result<()> {
        Err(Error::Unsupported("f32"))
    }

    fn serialize_f64(self, _v: f64) -> Result<()> {
        Err(Error::Unsupported("f64"))
    }

    fn serialize_char(self, _v: char) -> Result<()> {
        Err(Error::Unsupported("char"))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.bytes(v.as_bytes())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.bytes(v)
    }

    fn serialize_none(self) -> Result<()> {
        self.byte(0)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        self.byte(1)?;
        self.enter()?;
        value.serialize(&mut *self)?;
        self.leave()
    }

    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<()> {
        Err(Error::Unsupported("enum"))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()> {
        Err(Error::Unsupported("enum"))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        let len = len.ok_or(Error::Unsupported("sequence of unknown length"))?;
        self.varint(string::checked_len(len)?)?;
        self.enter()?;
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        self.enter()?;
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        self.enter()?;
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::Unsupported("enum"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::Unsupported("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        self.enter()?;
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::Unsupported("enum"))
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

impl<'a, W: Write> ser::SerializeSeq for &'a mut Serializer<W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let before = self.written;
        value.serialize(&mut **self)?;
        if self.written == before {
            return Err(Error::ZeroSizedItems(std::any::type_name::<T>().to_string()));
        }
        Ok(())
    }

    fn end(self) -> Result<()> {
        self.leave()
    }
}

impl<'a, W: Write> ser::SerializeTuple for &'a mut Serializer<W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.leave()
    }
}

impl<'a, W: Write> ser::SerializeTupleStruct for &'a mut Serializer<W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.leave()
    }
}

impl<'a, W: Write> ser::SerializeStruct for &'a mut Serializer<W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        value
            .serialize(&mut **self)
            .map_err(|e| Error::field(key, e))
    }

    fn end(self) -> Result<()> {
        self.leave()
    }
}
