//! Schema-driven encoding of [`Value`]s.
//!
//! A record is the concatenation of its fields in schema order. Nothing
//! self-describing is written: no tags, no field ids, no type markers.
//!
//! ```text
//! u32        varint
//! string     varint(len) ‖ utf-8 bytes
//! record     field₀ ‖ field₁ ‖ …
//! option     0x00 | 0x01 ‖ value
//! list       varint(count) ‖ item₀ ‖ item₁ ‖ …
//! ```

use std::io::{Read, Write};

use crate::diagnostics::{Diagnostics, NoDiagnostics, Phase};
use crate::error::{Error, Result};
use crate::schema::{Kind, RecordId, Schema};
use crate::value::{Record, Value};
use crate::{string, varint};

/// Default bound on record / option / list nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

const NONE: u8 = 0;
const SOME: u8 = 1;

/// Encodes and decodes values against a [`Schema`].
#[derive(Clone, Copy)]
pub struct ValueCodec<'a> {
    schema: &'a Schema,
    max_depth: usize,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a> ValueCodec<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            max_depth: DEFAULT_MAX_DEPTH,
            diagnostics: &NoDiagnostics,
        }
    }

    /// Set the nesting bound enforced on both encode and decode.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn diagnostics(mut self, diagnostics: &'a dyn Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn encode(&self, kind: &Kind, value: &Value) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.put_value(&mut buf, kind, value, 0)?;
        Ok(buf)
    }

    pub fn encode_record(&self, id: RecordId, record: &Record) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.put_record(&mut buf, id, record, 0)?;
        Ok(buf)
    }

    /// Encode fully before touching `writer`, so a failing field never
    /// leaves a partial value on the stream.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W, kind: &Kind, value: &Value) -> Result<()> {
        let buf = self.encode(kind, value)?;
        writer.write_all(&buf)?;
        Ok(())
    }

    pub fn write_record<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        id: RecordId,
        record: &Record,
    ) -> Result<()> {
        let buf = self.encode_record(id, record)?;
        writer.write_all(&buf)?;
        Ok(())
    }

    pub fn decode<R: Read + ?Sized>(&self, reader: &mut R, kind: &Kind) -> Result<Value> {
        self.read_value(reader, kind, 0)
    }

    pub fn decode_record<R: Read + ?Sized>(&self, reader: &mut R, id: RecordId) -> Result<Record> {
        self.read_record(reader, id, 0)
    }

    fn enter(&self, depth: usize) -> Result<usize> {
        let depth = depth + 1;
        if depth > self.max_depth {
            return Err(Error::SchemaDepthExceeded {
                limit: self.max_depth,
            });
        }
        Ok(depth)
    }

    fn sized_items(&self, item: &Kind) -> Result<()> {
        if self.schema.is_zero_sized(item) {
            return Err(Error::ZeroSizedItems(self.schema.describe(item)));
        }
        Ok(())
    }

    fn put_value(&self, buf: &mut Vec<u8>, kind: &Kind, value: &Value, depth: usize) -> Result<()> {
        match (kind, value) {
            (Kind::U32, Value::U32(v)) => varint::push(buf, *v),
            (Kind::String, Value::String(s)) => {
                let len = string::checked_len(s.len())?;
                self.diagnostics.length(Phase::Encode, len);
                varint::push(buf, len);
                buf.extend_from_slice(s.as_bytes());
            }
            (Kind::Record(id), Value::Record(record)) => self.put_record(buf, *id, record, depth)?,
            (Kind::Option(inner), Value::Option(v)) => {
                let depth = self.enter(depth)?;
                match v {
                    None => buf.push(NONE),
                    Some(v) => {
                        buf.push(SOME);
                        self.put_value(buf, inner, v, depth)?;
                    }
                }
            }
            (Kind::List(inner), Value::List(items)) => {
                let depth = self.enter(depth)?;
                self.sized_items(inner)?;
                let len = string::checked_len(items.len())?;
                self.diagnostics.length(Phase::Encode, len);
                varint::push(buf, len);
                for item in items {
                    self.put_value(buf, inner, item, depth)?;
                }
            }
            (kind, value) => {
                return Err(Error::mismatch(self.schema.describe(kind), value.kind_name()));
            }
        }
        Ok(())
    }

    fn put_record(&self, buf: &mut Vec<u8>, id: RecordId, record: &Record, depth: usize) -> Result<()> {
        let depth = self.enter(depth)?;
        let def = self.schema.record(id)?;
        if record.len() != def.fields.len() {
            return Err(Error::mismatch(
                format!("{} fields in `{}`", def.fields.len(), def.name),
                format!("{} fields", record.len()),
            ));
        }
        for (field, (name, value)) in def.fields.iter().zip(record.fields()) {
            if field.name != name {
                return Err(Error::mismatch(
                    format!("field `{}`", field.name),
                    format!("field `{name}`"),
                ));
            }
            self.diagnostics.field(Phase::Encode, &def.name, name);
            if let Err(e) = self.put_value(buf, &field.kind, value, depth) {
                self.diagnostics.failed(Phase::Encode, &def.name, name, e.root_cause());
                return Err(Error::field(name, e));
            }
        }
        Ok(())
    }

    fn read_value<R: Read + ?Sized>(&self, reader: &mut R, kind: &Kind, depth: usize) -> Result<Value> {
        match kind {
            Kind::U32 => varint::decode(reader).map(Value::U32),
            Kind::String => {
                let len = varint::decode(reader)?;
                self.diagnostics.length(Phase::Decode, len);
                let bytes = string::read_exact(reader, len as usize)?;
                string::from_utf8(bytes).map(Value::String)
            }
            Kind::Record(id) => self.read_record(reader, *id, depth).map(Value::Record),
            Kind::Option(inner) => {
                let depth = self.enter(depth)?;
                match varint::read_byte(reader)? {
                    None => Err(Error::EndOfStream),
                    Some(NONE) => Ok(Value::Option(None)),
                    Some(SOME) => {
                        let value = self
                            .read_value(reader, inner, depth)
                            .map_err(Error::mid_value)?;
                        Ok(Value::some(value))
                    }
                    Some(other) => Err(Error::InvalidDiscriminant(other)),
                }
            }
            Kind::List(inner) => {
                let depth = self.enter(depth)?;
                // Each item must consume input, or a bare count could demand
                // billions of values.
                self.sized_items(inner)?;
                let len = varint::decode(reader)?;
                self.diagnostics.length(Phase::Decode, len);
                let mut items = Vec::with_capacity((len as usize).min(1024));
                for _ in 0..len {
                    let item = self
                        .read_value(reader, inner, depth)
                        .map_err(Error::mid_value)?;
                    items.push(item);
                }
                Ok(Value::List(items))
            }
        }
    }

    fn read_record<R: Read + ?Sized>(&self, reader: &mut R, id: RecordId, depth: usize) -> Result<Record> {
        let depth = self.enter(depth)?;
        let def = self.schema.record(id)?;
        let mut record = Record::new();
        for (i, field) in def.fields.iter().enumerate() {
            self.diagnostics.field(Phase::Decode, &def.name, &field.name);
            match self.read_value(reader, &field.kind, depth) {
                Ok(value) => record.push(field.name.as_str(), value),
                // Nothing of this record has been consumed yet.
                Err(e) if i == 0 && e.is_end_of_stream() => return Err(e),
                Err(e) => {
                    let e = e.mid_value();
                    self.diagnostics
                        .failed(Phase::Decode, &def.name, &field.name, e.root_cause());
                    return Err(Error::field(field.name.as_str(), e));
                }
            }
        }
        Ok(record)
    }
}
