//! # Packet Parsing and Serialization (RFC 9000 Section 17)
//!
//! [`parse_packet`] dispatches on the first byte and walks the selected
//! variant's field layout, returning the packet and the bytes consumed so
//! callers can step through coalesced datagrams. [`serialize_packet`] is
//! the mirror; after assembly the bytes pass through a [`PacketProtector`],
//! the seam where header and payload protection would be applied.

#![forbid(unsafe_code)]

use bytes::{BufMut, Bytes, BytesMut};

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::error::{Error, Result};
use crate::frames::parse::{dissect_payload, serialize_payload};
use crate::packet::number::{self, PacketNumberLen};
use crate::packet::types::*;
use crate::varint;

/// Packet protection seam (RFC 9001 Section 5).
///
/// Applied to the fully assembled packet bytes before they reach the
/// wire. The cryptographic implementation belongs to the TLS collaborator;
/// this crate ships only the [`NoProtection`] pass-through.
pub trait PacketProtector {
    /// Protect an assembled packet, returning the on-wire bytes.
    fn protect(&self, packet_type: PacketType, bytes: BytesMut) -> Result<Bytes>;
}

/// Pass-through protector: bytes hit the wire exactly as assembled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProtection;

impl PacketProtector for NoProtection {
    fn protect(&self, _packet_type: PacketType, bytes: BytesMut) -> Result<Bytes> {
        Ok(bytes.freeze())
    }
}

/// Parse one packet from the front of `data` under its connection context.
///
/// Returns the packet and the bytes consumed. Version Negotiation and
/// 1-RTT packets extend to the end of `data`; the long variants with a
/// Length field stop after it, leaving any coalesced packet behind. Empty
/// input yields a default Initial packet and consumes nothing.
///
/// # Errors
///
/// [`Error::Truncated`] when a declared width or length outruns `data`,
/// [`Error::Malformed`] for structural violations, [`Error::CidTooLong`]
/// for connection IDs above the RFC 9000 cap.
pub fn parse_packet(ctx: &ConnectionHandle, data: &[u8]) -> Result<(Packet, usize)> {
    if data.is_empty() {
        return Ok((Packet::Initial(Initial::new(ctx)), 0));
    }
    match PacketType::dispatch(data) {
        PacketType::VersionNegotiation => parse_version_negotiation(ctx, data),
        PacketType::Initial => parse_initial(ctx, data),
        PacketType::ZeroRtt => parse_zero_rtt(ctx, data),
        PacketType::Handshake => parse_handshake(ctx, data),
        PacketType::Retry => parse_retry(ctx, data),
        PacketType::OneRtt => parse_one_rtt(ctx, data),
    }
}

/// Serialize a packet through the [`NoProtection`] pass-through.
pub fn serialize_packet(packet: &Packet) -> Result<Bytes> {
    serialize_packet_protected(packet, &NoProtection)
}

/// Serialize a packet, handing the assembled bytes to `protector`.
pub fn serialize_packet_protected(
    packet: &Packet,
    protector: &dyn PacketProtector,
) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    match packet {
        Packet::VersionNegotiation(p) => write_version_negotiation(p, &mut buf)?,
        Packet::Initial(p) => write_initial(p, &mut buf)?,
        Packet::ZeroRtt(p) => write_zero_rtt(p, &mut buf)?,
        Packet::Handshake(p) => write_handshake(p, &mut buf)?,
        Packet::Retry(p) => write_retry(p, &mut buf),
        Packet::OneRtt(p) => write_one_rtt(p, &mut buf)?,
    }
    protector.protect(packet.packet_type(), buf)
}

// ============================================================================
// Shared field readers
// ============================================================================

fn read_u32(data: &[u8], offset: &mut usize) -> Result<u32> {
    let end = *offset + 4;
    if data.len() < end {
        return Err(Error::Truncated {
            needed: end,
            available: data.len(),
        });
    }
    let mut word = [0u8; 4];
    word.copy_from_slice(&data[*offset..end]);
    *offset = end;
    Ok(u32::from_be_bytes(word))
}

/// Long headers prefix each connection ID with a one-byte length.
fn read_cid(data: &[u8], offset: &mut usize) -> Result<ConnectionId> {
    let len_at = *offset;
    if data.len() <= len_at {
        return Err(Error::Truncated {
            needed: len_at + 1,
            available: data.len(),
        });
    }
    let len = data[len_at] as usize;
    let end = len_at + 1 + len;
    if data.len() < end {
        return Err(Error::Truncated {
            needed: end,
            available: data.len(),
        });
    }
    let cid = ConnectionId::from_slice(&data[len_at + 1..end])?;
    *offset = end;
    Ok(cid)
}

/// Read the Length field, the packet number, and the payload it covers.
///
/// The packet number width comes from the header's 2-bit field, and the
/// payload spans Length minus that width.
fn read_number_and_payload(
    ctx: &ConnectionHandle,
    data: &[u8],
    offset: &mut usize,
    pn_len: PacketNumberLen,
) -> Result<(u64, u64, crate::frames::FramePayload)> {
    let (length, n) = varint::decode(&data[*offset..])?;
    *offset += n;

    let pn_bytes = pn_len.nbytes();
    if length < pn_bytes as u64 {
        return Err(Error::Malformed(
            "length field smaller than the packet number width",
        ));
    }
    let remaining = data.len() - *offset;
    if length > remaining as u64 {
        return Err(Error::Truncated {
            needed: offset.saturating_add(length as usize),
            available: data.len(),
        });
    }

    let packet_number = number::decode(&data[*offset..], pn_len)?;
    *offset += pn_bytes;

    let payload_len = length as usize - pn_bytes;
    let payload = dissect_payload(ctx, &data[*offset..*offset + payload_len])?;
    *offset += payload_len;
    Ok((length, packet_number, payload))
}

// ============================================================================
// Per-variant parsers
// ============================================================================

fn parse_version_negotiation(ctx: &ConnectionHandle, data: &[u8]) -> Result<(Packet, usize)> {
    let first = data[0];
    let mut offset = 1;
    let version = read_u32(data, &mut offset)?;
    let dcid = read_cid(data, &mut offset)?;
    let scid = read_cid(data, &mut offset)?;

    // Whole 4-byte words to the end of the datagram.
    if (data.len() - offset) % 4 != 0 {
        return Err(Error::Malformed(
            "version negotiation carries a partial version word",
        ));
    }
    let mut supported_versions = Vec::with_capacity((data.len() - offset) / 4);
    while offset < data.len() {
        supported_versions.push(read_u32(data, &mut offset)?);
    }

    Ok((
        Packet::VersionNegotiation(VersionNegotiation {
            ctx: ctx.clone(),
            unused: first & !HEADER_FORM_BIT,
            version,
            dcid,
            scid,
            supported_versions,
        }),
        offset,
    ))
}

fn parse_initial(ctx: &ConnectionHandle, data: &[u8]) -> Result<(Packet, usize)> {
    let first = data[0];
    let mut offset = 1;
    let version = read_u32(data, &mut offset)?;
    let dcid = read_cid(data, &mut offset)?;
    let scid = read_cid(data, &mut offset)?;

    let (token, n) = varint::decode_prefixed(&data[offset..])?;
    offset += n;

    let pn_len = PacketNumberLen::from_bits(first);
    let (length, packet_number, payload) =
        read_number_and_payload(ctx, data, &mut offset, pn_len)?;

    Ok((
        Packet::Initial(Initial {
            ctx: ctx.clone(),
            fixed_bit: first & FIXED_BIT != 0,
            reserved: (first & LONG_RESERVED_MASK) >> 2,
            pn_len: Some(pn_len),
            version,
            dcid,
            scid,
            token,
            length: Some(length),
            packet_number,
            payload,
        }),
        offset,
    ))
}

fn parse_zero_rtt(ctx: &ConnectionHandle, data: &[u8]) -> Result<(Packet, usize)> {
    let first = data[0];
    let mut offset = 1;
    let version = read_u32(data, &mut offset)?;
    let dcid = read_cid(data, &mut offset)?;
    let scid = read_cid(data, &mut offset)?;

    let pn_len = PacketNumberLen::from_bits(first);
    let (length, packet_number, payload) =
        read_number_and_payload(ctx, data, &mut offset, pn_len)?;

    Ok((
        Packet::ZeroRtt(ZeroRtt {
            ctx: ctx.clone(),
            fixed_bit: first & FIXED_BIT != 0,
            reserved: (first & LONG_RESERVED_MASK) >> 2,
            pn_len: Some(pn_len),
            version,
            dcid,
            scid,
            length: Some(length),
            packet_number,
            payload,
        }),
        offset,
    ))
}

// Same layout as 0-RTT; only the type bits differ.
fn parse_handshake(ctx: &ConnectionHandle, data: &[u8]) -> Result<(Packet, usize)> {
    let first = data[0];
    let mut offset = 1;
    let version = read_u32(data, &mut offset)?;
    let dcid = read_cid(data, &mut offset)?;
    let scid = read_cid(data, &mut offset)?;

    let pn_len = PacketNumberLen::from_bits(first);
    let (length, packet_number, payload) =
        read_number_and_payload(ctx, data, &mut offset, pn_len)?;

    Ok((
        Packet::Handshake(Handshake {
            ctx: ctx.clone(),
            fixed_bit: first & FIXED_BIT != 0,
            reserved: (first & LONG_RESERVED_MASK) >> 2,
            pn_len: Some(pn_len),
            version,
            dcid,
            scid,
            length: Some(length),
            packet_number,
            payload,
        }),
        offset,
    ))
}

fn parse_retry(ctx: &ConnectionHandle, data: &[u8]) -> Result<(Packet, usize)> {
    let first = data[0];
    let mut offset = 1;
    let version = read_u32(data, &mut offset)?;
    let dcid = read_cid(data, &mut offset)?;
    let scid = read_cid(data, &mut offset)?;

    Ok((
        Packet::Retry(Retry {
            ctx: ctx.clone(),
            fixed_bit: first & FIXED_BIT != 0,
            unused: first & 0x0f,
            version,
            dcid,
            scid,
        }),
        offset,
    ))
}

fn parse_one_rtt(ctx: &ConnectionHandle, data: &[u8]) -> Result<(Packet, usize)> {
    let first = data[0];
    let mut offset = 1;

    // The short header never encodes its destination connection ID length;
    // the context supplies the agreed width.
    let dcid_len = ctx.dcid().len();
    if data.len() < offset + dcid_len {
        return Err(Error::Truncated {
            needed: offset + dcid_len,
            available: data.len(),
        });
    }
    let dcid = ConnectionId::from_slice(&data[offset..offset + dcid_len])?;
    offset += dcid_len;

    let pn_len = PacketNumberLen::from_bits(first);
    let packet_number = number::decode(&data[offset..], pn_len)?;
    offset += pn_len.nbytes();

    let payload = dissect_payload(ctx, &data[offset..])?;

    Ok((
        Packet::OneRtt(OneRtt {
            ctx: ctx.clone(),
            fixed_bit: first & FIXED_BIT != 0,
            spin: first & SPIN_BIT != 0,
            reserved: (first & SHORT_RESERVED_MASK) >> 3,
            key_phase: first & KEY_PHASE_BIT != 0,
            pn_len: Some(pn_len),
            dcid,
            packet_number,
            payload,
        }),
        data.len(),
    ))
}

// ============================================================================
// Per-variant writers
// ============================================================================

fn write_cid(cid: &ConnectionId, buf: &mut BytesMut) {
    // The length always fits one byte; ConnectionId caps at 20.
    buf.put_u8(cid.len() as u8);
    buf.put_slice(cid.as_bytes());
}

/// The width class for building: pinned, or the narrowest for the value.
fn effective_pn_len(pinned: Option<PacketNumberLen>, packet_number: u64) -> Result<PacketNumberLen> {
    match pinned {
        Some(len) => Ok(len),
        None => PacketNumberLen::for_value(packet_number),
    }
}

/// Write the Length field, the packet number, and the payload.
fn write_number_and_payload(
    length: Option<u64>,
    packet_number: u64,
    pn_len: PacketNumberLen,
    payload: &crate::frames::FramePayload,
    buf: &mut BytesMut,
) -> Result<()> {
    let mut payload_buf = BytesMut::new();
    serialize_payload(payload, &mut payload_buf)?;

    let length = match length {
        Some(pinned) => pinned,
        None => pn_len.nbytes() as u64 + payload_buf.len() as u64,
    };
    varint::encode(length, buf)?;
    number::encode(packet_number, pn_len, buf)?;
    buf.put_slice(&payload_buf);
    Ok(())
}

fn write_version_negotiation(p: &VersionNegotiation, buf: &mut BytesMut) -> Result<()> {
    buf.put_u8(HEADER_FORM_BIT | (p.unused & !HEADER_FORM_BIT));
    buf.put_u32(p.version);
    write_cid(&p.dcid, buf);
    write_cid(&p.scid, buf);
    for version in &p.supported_versions {
        buf.put_u32(*version);
    }
    Ok(())
}

fn long_first_byte(fixed_bit: bool, type_bits: u8, reserved: u8, pn_len: PacketNumberLen) -> u8 {
    let mut first = HEADER_FORM_BIT | (type_bits << 4) | ((reserved & 0x03) << 2) | pn_len.bits();
    if fixed_bit {
        first |= FIXED_BIT;
    }
    first
}

fn write_initial(p: &Initial, buf: &mut BytesMut) -> Result<()> {
    let pn_len = effective_pn_len(p.pn_len, p.packet_number)?;
    buf.put_u8(long_first_byte(p.fixed_bit, LONG_TYPE_INITIAL, p.reserved, pn_len));
    buf.put_u32(p.version);
    write_cid(&p.dcid, buf);
    write_cid(&p.scid, buf);
    varint::encode_prefixed(&p.token, buf)?;
    write_number_and_payload(p.length, p.packet_number, pn_len, &p.payload, buf)
}

fn write_zero_rtt(p: &ZeroRtt, buf: &mut BytesMut) -> Result<()> {
    let pn_len = effective_pn_len(p.pn_len, p.packet_number)?;
    buf.put_u8(long_first_byte(p.fixed_bit, LONG_TYPE_ZERO_RTT, p.reserved, pn_len));
    buf.put_u32(p.version);
    write_cid(&p.dcid, buf);
    write_cid(&p.scid, buf);
    write_number_and_payload(p.length, p.packet_number, pn_len, &p.payload, buf)
}

fn write_handshake(p: &Handshake, buf: &mut BytesMut) -> Result<()> {
    let pn_len = effective_pn_len(p.pn_len, p.packet_number)?;
    buf.put_u8(long_first_byte(p.fixed_bit, LONG_TYPE_HANDSHAKE, p.reserved, pn_len));
    buf.put_u32(p.version);
    write_cid(&p.dcid, buf);
    write_cid(&p.scid, buf);
    write_number_and_payload(p.length, p.packet_number, pn_len, &p.payload, buf)
}

fn write_retry(p: &Retry, buf: &mut BytesMut) {
    let mut first = HEADER_FORM_BIT | (LONG_TYPE_RETRY << 4) | (p.unused & 0x0f);
    if p.fixed_bit {
        first |= FIXED_BIT;
    }
    buf.put_u8(first);
    buf.put_u32(p.version);
    write_cid(&p.dcid, buf);
    write_cid(&p.scid, buf);
}

fn write_one_rtt(p: &OneRtt, buf: &mut BytesMut) -> Result<()> {
    let pn_len = effective_pn_len(p.pn_len, p.packet_number)?;
    let mut first = ((p.reserved & 0x03) << 3) | pn_len.bits();
    if p.fixed_bit {
        first |= FIXED_BIT;
    }
    if p.spin {
        first |= SPIN_BIT;
    }
    if p.key_phase {
        first |= KEY_PHASE_BIT;
    }
    buf.put_u8(first);
    // No length prefix; both ends agree on the width via the context.
    buf.put_slice(p.dcid.as_bytes());
    number::encode(p.packet_number, pn_len, buf)?;
    serialize_payload(&p.payload, buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionContext;
    use crate::frames::{CryptoFrame, Frame, FramePayload};

    fn decrypted_ctx() -> ConnectionHandle {
        let ctx = ConnectionContext::new();
        ctx.set_decrypted(true);
        ctx
    }

    /// Minimal Initial wire image: version 1, empty IDs and token, packet
    /// number 0, empty payload. Ten bytes.
    const MINIMAL_INITIAL: [u8; 10] = [
        0xc0, // long form, fixed bit, type 0, pn width 1
        0x00, 0x00, 0x00, 0x01, // version
        0x00, // dcid length
        0x00, // scid length
        0x00, // token length
        0x01, // length: packet number only
        0x00, // packet number
    ];

    mod parsing {
        use super::*;

        #[test]
        fn minimal_initial() {
            let ctx = decrypted_ctx();
            let (packet, consumed) = parse_packet(&ctx, &MINIMAL_INITIAL).unwrap();
            assert_eq!(consumed, MINIMAL_INITIAL.len());
            let Packet::Initial(initial) = packet else {
                panic!("expected Initial, got {packet}");
            };
            assert!(initial.fixed_bit);
            assert_eq!(initial.version, VERSION_1);
            assert!(initial.dcid.is_empty());
            assert!(initial.scid.is_empty());
            assert!(initial.token.is_empty());
            assert_eq!(initial.length, Some(1));
            assert_eq!(initial.packet_number, 0);
            assert!(initial.payload.is_empty());
        }

        #[test]
        fn empty_input_is_a_default_initial() {
            let ctx = ConnectionContext::new();
            let (packet, consumed) = parse_packet(&ctx, &[]).unwrap();
            assert_eq!(consumed, 0);
            let Packet::Initial(initial) = packet else {
                panic!("expected Initial");
            };
            assert_eq!(initial.version, VERSION_1);
            assert_eq!(initial.packet_number, 0);
        }

        #[test]
        fn coalesced_packets_parse_in_sequence() {
            let mut datagram = Vec::new();
            datagram.extend_from_slice(&MINIMAL_INITIAL);
            datagram.extend_from_slice(&MINIMAL_INITIAL);

            let ctx = decrypted_ctx();
            let (first, consumed) = parse_packet(&ctx, &datagram).unwrap();
            assert_eq!(consumed, MINIMAL_INITIAL.len());
            assert_eq!(first.packet_type(), PacketType::Initial);

            let (second, consumed) = parse_packet(&ctx, &datagram[consumed..]).unwrap();
            assert_eq!(consumed, MINIMAL_INITIAL.len());
            assert_eq!(second.packet_type(), PacketType::Initial);
        }

        #[test]
        fn length_below_packet_number_width_is_malformed() {
            let mut wire = MINIMAL_INITIAL;
            wire[8] = 0x00; // length 0, packet number needs 1 byte
            let ctx = decrypted_ctx();
            assert!(matches!(
                parse_packet(&ctx, &wire),
                Err(Error::Malformed(_))
            ));
        }

        #[test]
        fn length_past_the_buffer_is_truncation() {
            let mut wire = MINIMAL_INITIAL;
            wire[8] = 0x05; // claims 4 payload bytes that are not there
            let ctx = decrypted_ctx();
            assert!(matches!(
                parse_packet(&ctx, &wire),
                Err(Error::Truncated { .. })
            ));
        }

        #[test]
        fn truncated_connection_id() {
            // dcid length 4 with only two bytes behind it.
            let wire = [0xc0, 0x00, 0x00, 0x00, 0x01, 0x04, 0xaa, 0xbb];
            let ctx = decrypted_ctx();
            assert!(matches!(
                parse_packet(&ctx, &wire),
                Err(Error::Truncated { .. })
            ));
        }

        #[test]
        fn oversized_connection_id_rejected() {
            let mut wire = vec![0xc0, 0x00, 0x00, 0x00, 0x01, 21];
            wire.extend_from_slice(&[0u8; 21]);
            let ctx = decrypted_ctx();
            assert!(matches!(
                parse_packet(&ctx, &wire),
                Err(Error::CidTooLong(21))
            ));
        }

        #[test]
        fn undecrypted_payload_stays_opaque() {
            let mut wire = MINIMAL_INITIAL.to_vec();
            wire[8] = 0x04; // length: pn + 3 payload bytes
            wire.extend_from_slice(&[0x01, 0x02, 0x03]);

            let ctx = ConnectionContext::new();
            let (packet, consumed) = parse_packet(&ctx, &wire).unwrap();
            assert_eq!(consumed, wire.len());
            let payload = packet.payload().unwrap();
            assert_eq!(
                payload,
                &FramePayload::Opaque(Bytes::from_static(b"\x01\x02\x03"))
            );

            // Re-serialization reproduces the original bytes exactly.
            let rebuilt = serialize_packet(&packet).unwrap();
            assert_eq!(rebuilt.as_ref(), wire);
        }
    }

    mod building {
        use super::*;

        #[test]
        fn initial_with_ping_roundtrips() {
            let ctx = decrypted_ctx();
            let mut packet = Initial::new(&ctx);
            packet.payload = FramePayload::Frames(vec![Frame::Ping]);

            let wire = serialize_packet(&Packet::Initial(packet.clone())).unwrap();
            assert_eq!(wire[0], 0xc0);

            let (parsed, consumed) = parse_packet(&ctx, &wire).unwrap();
            assert_eq!(consumed, wire.len());
            let Packet::Initial(parsed) = parsed else {
                panic!("expected Initial");
            };
            assert_eq!(parsed.version, packet.version);
            assert_eq!(parsed.packet_number, packet.packet_number);
            assert_eq!(parsed.token, packet.token);
            assert_eq!(parsed.payload.frames().unwrap(), [Frame::Ping]);
        }

        #[test]
        fn initial_with_crypto_and_token() {
            let ctx = decrypted_ctx();
            let mut packet = Initial::new(&ctx);
            packet.dcid = ConnectionId::from_slice(&[0x11; 8]).unwrap();
            packet.scid = ConnectionId::from_slice(&[0x22; 4]).unwrap();
            packet.token = Bytes::from_static(b"retry-token");
            packet.packet_number = 300; // forces a two-byte number
            packet.payload = FramePayload::Frames(vec![Frame::Crypto(CryptoFrame {
                offset: 0,
                data: Bytes::from_static(b"client hello"),
            })]);

            let wire = serialize_packet(&Packet::Initial(packet.clone())).unwrap();
            let (parsed, consumed) = parse_packet(&ctx, &wire).unwrap();
            assert_eq!(consumed, wire.len());
            let Packet::Initial(parsed) = parsed else {
                panic!("expected Initial");
            };
            assert_eq!(parsed.pn_len, Some(PacketNumberLen::Two));
            assert_eq!(parsed.dcid, packet.dcid);
            assert_eq!(parsed.scid, packet.scid);
            assert_eq!(parsed.token, packet.token);
            assert_eq!(parsed.packet_number, 300);
            assert_eq!(parsed.payload, packet.payload);
        }

        #[test]
        fn pinned_length_is_emitted_verbatim() {
            let ctx = decrypted_ctx();
            let mut packet = Initial::new(&ctx);
            packet.length = Some(5);
            let wire = serialize_packet(&Packet::Initial(packet)).unwrap();
            // first byte, version, dcid len, scid len, token len, then length.
            assert_eq!(wire[8], 0x05);
        }

        #[test]
        fn handshake_and_zero_rtt_pick_their_type_bits() {
            let ctx = decrypted_ctx();

            let wire = serialize_packet(&Packet::ZeroRtt(ZeroRtt::new(&ctx))).unwrap();
            assert_eq!(wire[0] & LONG_PACKET_TYPE_MASK, LONG_TYPE_ZERO_RTT << 4);
            let (parsed, _) = parse_packet(&ctx, &wire).unwrap();
            assert_eq!(parsed.packet_type(), PacketType::ZeroRtt);

            let wire = serialize_packet(&Packet::Handshake(Handshake::new(&ctx))).unwrap();
            assert_eq!(wire[0] & LONG_PACKET_TYPE_MASK, LONG_TYPE_HANDSHAKE << 4);
            let (parsed, _) = parse_packet(&ctx, &wire).unwrap();
            assert_eq!(parsed.packet_type(), PacketType::Handshake);
        }

        #[test]
        fn version_negotiation_roundtrips() {
            let ctx = ConnectionContext::new();
            let mut packet = VersionNegotiation::new(&ctx);
            packet.dcid = ConnectionId::from_slice(&[0xaa, 0xbb]).unwrap();
            packet.scid = ConnectionId::from_slice(&[0xcc]).unwrap();
            packet.supported_versions = vec![VERSION_1, 0xff00_001d];

            let wire = serialize_packet(&Packet::VersionNegotiation(packet.clone())).unwrap();
            assert_eq!(wire[0] & HEADER_FORM_BIT, HEADER_FORM_BIT);
            assert_eq!(wire[0] & FIXED_BIT, 0);

            let (parsed, consumed) = parse_packet(&ctx, &wire).unwrap();
            assert_eq!(consumed, wire.len());
            let Packet::VersionNegotiation(parsed) = parsed else {
                panic!("expected Version Negotiation");
            };
            assert_eq!(parsed.version, VERSION_NEGOTIATION);
            assert_eq!(parsed.dcid, packet.dcid);
            assert_eq!(parsed.scid, packet.scid);
            assert_eq!(parsed.supported_versions, packet.supported_versions);
        }

        #[test]
        fn version_negotiation_partial_word_is_malformed() {
            // Empty IDs, then three stray bytes where a version word belongs.
            let wire = [0x80, 0, 0, 0, 0, 0, 0, 0xaa, 0xbb, 0xcc];
            let ctx = ConnectionContext::new();
            assert!(matches!(
                parse_packet(&ctx, &wire),
                Err(Error::Malformed(_))
            ));
        }

        #[test]
        fn retry_ends_after_the_source_id() {
            let ctx = ConnectionContext::new();
            let mut packet = Retry::new(&ctx);
            packet.dcid = ConnectionId::from_slice(&[1, 2]).unwrap();
            packet.scid = ConnectionId::from_slice(&[3]).unwrap();

            let wire = serialize_packet(&Packet::Retry(packet.clone())).unwrap();
            assert_eq!(wire.len(), 1 + 4 + 1 + 2 + 1 + 1);
            assert_eq!(wire[0] & LONG_PACKET_TYPE_MASK, LONG_TYPE_RETRY << 4);

            let (parsed, consumed) = parse_packet(&ctx, &wire).unwrap();
            assert_eq!(consumed, wire.len());
            let Packet::Retry(parsed) = parsed else {
                panic!("expected Retry");
            };
            assert_eq!(parsed.dcid, packet.dcid);
            assert_eq!(parsed.scid, packet.scid);
        }

        #[test]
        fn one_rtt_uses_the_context_dcid_width() {
            let ctx = decrypted_ctx();
            ctx.set_dcid(ConnectionId::from_slice(&[7, 8, 9]).unwrap());

            let mut packet = OneRtt::new(&ctx);
            packet.spin = true;
            packet.key_phase = true;
            packet.packet_number = 42;
            packet.payload = FramePayload::Frames(vec![Frame::Ping, Frame::Padding]);

            let wire = serialize_packet(&Packet::OneRtt(packet.clone())).unwrap();
            assert_eq!(wire[0] & HEADER_FORM_BIT, 0);

            let (parsed, consumed) = parse_packet(&ctx, &wire).unwrap();
            assert_eq!(consumed, wire.len());
            let Packet::OneRtt(parsed) = parsed else {
                panic!("expected 1-RTT");
            };
            assert!(parsed.spin);
            assert!(parsed.key_phase);
            assert_eq!(parsed.dcid.as_bytes(), [7, 8, 9]);
            assert_eq!(parsed.packet_number, 42);
            assert_eq!(parsed.payload, packet.payload);
        }

        #[test]
        fn pinned_width_too_narrow_fails_the_build() {
            let ctx = ConnectionContext::new();
            let mut packet = Initial::new(&ctx);
            packet.packet_number = 70_000;
            packet.pn_len = Some(PacketNumberLen::One);
            assert!(matches!(
                serialize_packet(&Packet::Initial(packet)),
                Err(Error::PacketNumberWidth { .. })
            ));
        }
    }

    mod protection {
        use super::*;

        /// Stand-in protector that appends a fake 16-byte tag.
        struct TagAppender;

        impl PacketProtector for TagAppender {
            fn protect(&self, _packet_type: PacketType, mut bytes: BytesMut) -> Result<Bytes> {
                bytes.put_slice(&[0u8; 16]);
                Ok(bytes.freeze())
            }
        }

        #[test]
        fn no_protection_is_identity() {
            let ctx = ConnectionContext::new();
            let packet = Packet::Initial(Initial::new(&ctx));
            let plain = serialize_packet(&packet).unwrap();
            let hooked = serialize_packet_protected(&packet, &NoProtection).unwrap();
            assert_eq!(plain, hooked);
        }

        #[test]
        fn protector_sees_the_assembled_bytes() {
            let ctx = ConnectionContext::new();
            let packet = Packet::Initial(Initial::new(&ctx));
            let plain = serialize_packet(&packet).unwrap();
            let tagged = serialize_packet_protected(&packet, &TagAppender).unwrap();
            assert_eq!(tagged.len(), plain.len() + 16);
            assert_eq!(&tagged[..plain.len()], plain.as_ref());
        }
    }
}
