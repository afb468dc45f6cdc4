//! Serde support: Rust types in the same positional layout as [`Value`](crate::Value).
//!
//! A struct serializes as a record (fields in declaration order, no names on
//! the wire), `u16`/`u32` as varints, `u8` and `bool` as a single byte,
//! `String` as a string, `Option` and sequences as the option and list
//! forms. Signed integers, floats, maps and enums are rejected, as are
//! sequences whose items occupy no bytes (`Vec<()>`).

mod de;
mod ser;

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

pub use self::de::Deserializer;
pub use self::ser::Serializer;

pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    value.serialize(&mut Serializer::new(&mut buf))?;
    Ok(buf)
}

/// Encode fully before touching `writer`, so a failing field never leaves a
/// partial value on the stream.
pub fn to_writer<W: Write, T: Serialize + ?Sized>(mut writer: W, value: &T) -> Result<()> {
    let buf = to_vec(value)?;
    writer.write_all(&buf)?;
    Ok(())
}

/// Decode one value that must span all of `bytes`.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut de = Deserializer::new(bytes);
    let value = T::deserialize(&mut de)?;
    let rest = de.into_inner();
    if !rest.is_empty() {
        return Err(Error::TrailingBytes(rest.len()));
    }
    Ok(value)
}

/// Decode one value from `reader`, leaving anything after it unread.
pub fn from_reader<R: Read, T: DeserializeOwned>(reader: R) -> Result<T> {
    T::deserialize(&mut Deserializer::new(reader))
}
