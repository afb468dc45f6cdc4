//! LEB128 encoding of unsigned 32-bit integers.
//!
//! Values are split into 7-bit groups, low-order group first. Every byte but
//! the last has its high bit set. A 32-bit value needs at most 5 groups; the
//! 5th group holds bits 28..32, so its payload may not exceed `0x0f`.

use std::io::{ErrorKind, Read, Write};

use crate::error::{Error, Result};

/// Maximum number of bytes in the encoding of a `u32`.
pub const MAX_LEN: usize = 5;

const CONTINUATION: u8 = 0x80;
const PAYLOAD: u8 = 0x7f;
const LAST_GROUP_MAX: u8 = 0x0f;

/// Encode `value` into its canonical minimal-length form.
pub fn encode(value: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_LEN);
    push(&mut buf, value);
    buf
}

/// Append the canonical encoding of `value` to `buf`.
pub fn push(buf: &mut Vec<u8>, value: u32) {
    let (bytes, len) = groups(value);
    buf.extend_from_slice(&bytes[..len]);
}

/// Write the canonical encoding of `value` to `writer`.
pub fn write<W: Write + ?Sized>(writer: &mut W, value: u32) -> Result<()> {
    let (bytes, len) = groups(value);
    writer.write_all(&bytes[..len])?;
    Ok(())
}

/// Split `value` into its groups; only the first `len` bytes are used.
pub(crate) fn groups(value: u32) -> ([u8; MAX_LEN], usize) {
    let mut bytes = [0u8; MAX_LEN];
    let mut len = 0;
    let mut value = value;
    while value >= u32::from(CONTINUATION) {
        bytes[len] = (value as u8 & PAYLOAD) | CONTINUATION;
        value >>= 7;
        len += 1;
    }
    bytes[len] = value as u8;
    (bytes, len + 1)
}

/// Decode a varint from `reader`.
///
/// Returns [`Error::EndOfStream`] if the stream is empty before the first
/// byte, and [`Error::UnexpectedEndOfStream`] if it ends after a
/// continuation byte. Non-minimal encodings are accepted.
pub fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let mut value = 0u32;
    for i in 0..MAX_LEN {
        let byte = match read_byte(reader)? {
            Some(byte) => byte,
            None if i == 0 => return Err(Error::EndOfStream),
            None => return Err(Error::UnexpectedEndOfStream),
        };
        let shift = 7 * i as u32;
        if byte & CONTINUATION == 0 {
            if i == MAX_LEN - 1 && byte > LAST_GROUP_MAX {
                return Err(Error::IntegerOverflow);
            }
            return Ok(value | u32::from(byte) << shift);
        }
        if i == MAX_LEN - 1 {
            return Err(Error::IntegerOverflow);
        }
        value |= u32::from(byte & PAYLOAD) << shift;
    }
    Err(Error::IntegerOverflow)
}

/// Read a single byte, `None` on end of stream.
pub(crate) fn read_byte<R: Read + ?Sized>(reader: &mut R) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
