//! UTF-8 strings as a varint byte length followed by the raw bytes.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::varint;

/// Encode `value` as `varint(len) ‖ bytes`.
pub fn encode(value: &str) -> Result<Vec<u8>> {
    let len = checked_len(value.len())?;
    let mut buf = Vec::with_capacity(varint::MAX_LEN + value.len());
    varint::push(&mut buf, len);
    buf.extend_from_slice(value.as_bytes());
    Ok(buf)
}

pub fn write<W: Write + ?Sized>(writer: &mut W, value: &str) -> Result<()> {
    let len = checked_len(value.len())?;
    varint::write(writer, len)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

/// Decode a length-prefixed string.
///
/// Invalid UTF-8 yields [`Error::InvalidEncoding`] carrying the lossy
/// decoding of the bytes that were read.
pub fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<String> {
    let len = varint::decode(reader)?;
    let bytes = read_exact(reader, len as usize)?;
    from_utf8(bytes)
}

pub(crate) fn from_utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::InvalidEncoding {
        lossy: String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Read exactly `len` bytes. The buffer grows with what the stream actually
/// delivers, so a hostile length prefix cannot force a large allocation.
pub(crate) fn read_exact<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len.min(8 * 1024));
    Read::take(&mut *reader, len as u64).read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(Error::UnexpectedEndOfStream);
    }
    Ok(buf)
}

pub(crate) fn checked_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::LengthOverflow(len))
}
