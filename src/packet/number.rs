//! # Packet Number Encoding (RFC 9000 Section 17.1)
//!
//! Packet numbers are written in 1 to 4 bytes; the width travels in a
//! 2-bit header field (encoded as bytes minus one), never in the number
//! itself. Building selects the narrowest width that fits the value
//! unless a caller pins one explicitly; parsing trusts the header field
//! and nothing else.
//!
//! Display is context-sensitive: a packet number shown while the owning
//! connection is still undecrypted carries an `(encrypted)` qualifier,
//! purely as presentation.

use bytes::BufMut;

use crate::error::{Error, Result};

/// Highest packet number a 4-byte encoding can carry, plus one.
const PACKET_NUMBER_LIMIT: u64 = 1 << 32;

/// Width class of an encoded packet number.
///
/// The wire form is the class index (bytes minus one) in the low two bits
/// of the packet's first byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PacketNumberLen {
    /// One byte; class 0. The default when nothing is known.
    #[default]
    One,
    /// Two bytes; class 1.
    Two,
    /// Three bytes; class 2.
    Three,
    /// Four bytes; class 3.
    Four,
}

impl PacketNumberLen {
    /// Width class from the 2-bit header field. Only the low two bits of
    /// `bits` are considered.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::One,
            1 => Self::Two,
            2 => Self::Three,
            _ => Self::Four,
        }
    }

    /// The 2-bit header field value (bytes minus one).
    pub const fn bits(self) -> u8 {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Three => 2,
            Self::Four => 3,
        }
    }

    /// Width in bytes.
    pub const fn nbytes(self) -> usize {
        self.bits() as usize + 1
    }

    /// Narrowest class that fits `value`.
    ///
    /// # Errors
    ///
    /// [`Error::PacketNumberOutOfRange`] for values at or above 2^32.
    pub fn for_value(value: u64) -> Result<Self> {
        if value < 1 << 8 {
            Ok(Self::One)
        } else if value < 1 << 16 {
            Ok(Self::Two)
        } else if value < 1 << 24 {
            Ok(Self::Three)
        } else if value < PACKET_NUMBER_LIMIT {
            Ok(Self::Four)
        } else {
            Err(Error::PacketNumberOutOfRange(value))
        }
    }
}

/// Append `value` big-endian in exactly `len` bytes.
///
/// # Errors
///
/// [`Error::PacketNumberWidth`] if `value` does not fit `len`.
pub fn encode<B: BufMut>(value: u64, len: PacketNumberLen, buf: &mut B) -> Result<usize> {
    let nbytes = len.nbytes();
    if value >> (nbytes * 8) != 0 {
        return Err(Error::PacketNumberWidth {
            value,
            width: nbytes,
        });
    }
    let be = value.to_be_bytes();
    buf.put_slice(&be[8 - nbytes..]);
    Ok(nbytes)
}

/// Read a packet number of width `len` from the front of `data`.
///
/// # Errors
///
/// [`Error::Truncated`] if `data` is shorter than the declared width.
pub fn decode(data: &[u8], len: PacketNumberLen) -> Result<u64> {
    let nbytes = len.nbytes();
    if data.len() < nbytes {
        return Err(Error::Truncated {
            needed: nbytes,
            available: data.len(),
        });
    }
    let mut value = 0u64;
    for byte in &data[..nbytes] {
        value = (value << 8) | *byte as u64;
    }
    Ok(value)
}

/// Display form of a packet number under its connection context.
///
/// Carries the `(encrypted)` qualifier while the context's decrypted gate
/// is unset. Presentation only; the wire bytes are unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketNumberRepr {
    /// The packet number value.
    pub value: u64,
    /// Whether the owning connection is still undecrypted.
    pub encrypted: bool,
}

impl core::fmt::Display for PacketNumberRepr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.value)?;
        if self.encrypted {
            f.write_str(" (encrypted)")?;
        }
        Ok(())
    }
}
