//! Variable-length integer encoding (RFC 9000 Section 16).
//!
//! QUIC encodes integers in 1, 2, 4, or 8 bytes; the two most significant
//! bits of the first byte carry the width class, the remaining 6, 14, 30,
//! or 62 bits carry the value big-endian. The codec here is used standalone
//! for every integer field on the wire, and as the base layer for two
//! derived forms: length-prefixed byte strings (a varint length followed by
//! exactly that many bytes) and varint-valued closed enums such as the
//! transport error codes in [`crate::error::TransportErrorCode`].

use bytes::{BufMut, Bytes};

use crate::error::{Error, Result};

/// Maximum encodable value, 2^62 - 1.
pub const MAX: u64 = (1u64 << 62) - 1;

/// Number of bytes `value` occupies on the wire.
///
/// # Errors
///
/// [`Error::VarIntOutOfRange`] if `value` exceeds [`MAX`].
pub fn encoded_len(value: u64) -> Result<usize> {
    if value < 1 << 6 {
        Ok(1)
    } else if value < 1 << 14 {
        Ok(2)
    } else if value < 1 << 30 {
        Ok(4)
    } else if value <= MAX {
        Ok(8)
    } else {
        Err(Error::VarIntOutOfRange(value))
    }
}

/// Append the encoding of `value` to `buf`, returning the bytes written.
///
/// # Errors
///
/// [`Error::VarIntOutOfRange`] if `value` exceeds [`MAX`]. Nothing is
/// written on error.
pub fn encode<B: BufMut>(value: u64, buf: &mut B) -> Result<usize> {
    match encoded_len(value)? {
        1 => {
            buf.put_u8(value as u8);
            Ok(1)
        }
        2 => {
            buf.put_u16(0x4000 | value as u16);
            Ok(2)
        }
        4 => {
            buf.put_u32(0x8000_0000 | value as u32);
            Ok(4)
        }
        _ => {
            buf.put_u64(0xc000_0000_0000_0000 | value);
            Ok(8)
        }
    }
}

/// Decode a varint from the front of `data`.
///
/// Returns the value and the number of bytes consumed. The width comes
/// from the top two bits of the first byte; the content is never
/// inspected to guess a width.
///
/// # Errors
///
/// [`Error::Truncated`] if `data` is empty or shorter than the width the
/// first byte declares.
pub fn decode(data: &[u8]) -> Result<(u64, usize)> {
    let first = *data.first().ok_or(Error::Truncated {
        needed: 1,
        available: 0,
    })?;

    let len = match first >> 6 {
        0 => 1,
        1 => 2,
        2 => 4,
        _ => 8,
    };
    if data.len() < len {
        return Err(Error::Truncated {
            needed: len,
            available: data.len(),
        });
    }

    let mut value = (first & 0x3f) as u64;
    for byte in &data[1..len] {
        value = (value << 8) | *byte as u64;
    }
    Ok((value, len))
}

/// Append a varint length prefix followed by `data` itself.
///
/// # Errors
///
/// [`Error::VarIntOutOfRange`] if the length exceeds [`MAX`].
pub fn encode_prefixed<B: BufMut>(data: &[u8], buf: &mut B) -> Result<usize> {
    let written = encode(data.len() as u64, buf)?;
    buf.put_slice(data);
    Ok(written + data.len())
}

/// Decode a varint length prefix and the bytes it covers.
///
/// Returns the covered bytes (copied out of `data`) and the total number
/// of bytes consumed including the prefix.
///
/// # Errors
///
/// [`Error::Truncated`] if the prefix or the covered bytes run past the
/// end of `data`.
pub fn decode_prefixed(data: &[u8]) -> Result<(Bytes, usize)> {
    let (len, prefix) = decode(data)?;
    let len = len as usize;
    let end = prefix
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or(Error::Truncated {
            needed: prefix + len,
            available: data.len(),
        })?;
    Ok((Bytes::copy_from_slice(&data[prefix..end]), end))
}
