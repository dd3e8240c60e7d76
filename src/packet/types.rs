//! # Packet Variants and First-Byte Dispatch (RFC 9000 Section 17)
//!
//! Six packet shapes, one closed [`Packet`] enum. The first byte decides
//! the variant: bit 0x80 selects the long form, and within the long form
//! a cleared 0x40 bit marks Version Negotiation before the two type bits
//! are consulted. Empty input defaults to an Initial packet.
//!
//! Every packet holds a [`ConnectionHandle`] to the connection it belongs
//! to; the context gates payload dissection and supplies the short
//! header's destination connection ID length.

use bytes::Bytes;

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::frames::FramePayload;
use crate::packet::number::{PacketNumberLen, PacketNumberRepr};

// ============================================================================
// First-byte layout (RFC 9000 Section 17.2, 17.3)
// ============================================================================

/// Header form bit; set for long headers.
pub const HEADER_FORM_BIT: u8 = 0x80;
/// Fixed bit; set in every v1 packet except Version Negotiation.
pub const FIXED_BIT: u8 = 0x40;
/// Long header packet type bits.
pub const LONG_PACKET_TYPE_MASK: u8 = 0x30;
/// Reserved bits of a long header first byte.
pub const LONG_RESERVED_MASK: u8 = 0x0c;
/// Spin bit of a short header first byte.
pub const SPIN_BIT: u8 = 0x20;
/// Reserved bits of a short header first byte.
pub const SHORT_RESERVED_MASK: u8 = 0x18;
/// Key phase bit of a short header first byte.
pub const KEY_PHASE_BIT: u8 = 0x04;
/// Packet number length bits (both header forms).
pub const PACKET_NUMBER_LENGTH_MASK: u8 = 0x03;

/// Long header type bits value for Initial.
pub const LONG_TYPE_INITIAL: u8 = 0x00;
/// Long header type bits value for 0-RTT.
pub const LONG_TYPE_ZERO_RTT: u8 = 0x01;
/// Long header type bits value for Handshake.
pub const LONG_TYPE_HANDSHAKE: u8 = 0x02;
/// Long header type bits value for Retry.
pub const LONG_TYPE_RETRY: u8 = 0x03;

/// QUIC version 1 (RFC 9000).
pub const VERSION_1: u32 = 0x0000_0001;
/// Version value carried by Version Negotiation packets.
pub const VERSION_NEGOTIATION: u32 = 0x0000_0000;

/// Registered UDP port for QUIC traffic.
pub const QUIC_PORT: u16 = 443;

/// Whether a UDP packet belongs to QUIC by port association, in either
/// direction.
pub fn is_quic_port(src_port: u16, dst_port: u16) -> bool {
    src_port == QUIC_PORT || dst_port == QUIC_PORT
}

// ============================================================================
// Dispatch
// ============================================================================

/// Packet variant selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Initial packet (long header, type 0).
    Initial,
    /// 0-RTT packet (long header, type 1).
    ZeroRtt,
    /// Handshake packet (long header, type 2).
    Handshake,
    /// Retry packet (long header, type 3).
    Retry,
    /// 1-RTT packet (short header).
    OneRtt,
    /// Version Negotiation packet (long form, fixed bit clear).
    VersionNegotiation,
}

impl PacketType {
    /// Select the variant for a datagram. Empty input selects Initial.
    pub fn dispatch(data: &[u8]) -> Self {
        let Some(&first) = data.first() else {
            return PacketType::Initial;
        };
        if first & HEADER_FORM_BIT == 0 {
            return PacketType::OneRtt;
        }
        if first & FIXED_BIT == 0 {
            return PacketType::VersionNegotiation;
        }
        match (first & LONG_PACKET_TYPE_MASK) >> 4 {
            LONG_TYPE_INITIAL => PacketType::Initial,
            LONG_TYPE_ZERO_RTT => PacketType::ZeroRtt,
            LONG_TYPE_HANDSHAKE => PacketType::Handshake,
            _ => PacketType::Retry,
        }
    }

    /// Display name of the variant.
    pub fn name(self) -> &'static str {
        match self {
            PacketType::Initial => "QUIC - Initial",
            PacketType::ZeroRtt => "QUIC - 0-RTT",
            PacketType::Handshake => "QUIC - Handshake",
            PacketType::Retry => "QUIC - Retry",
            PacketType::OneRtt => "QUIC - 1-RTT",
            PacketType::VersionNegotiation => "QUIC - Version Negotiation",
        }
    }
}

// ============================================================================
// Packet variants (RFC 9000 Section 17.2, 17.3)
// ============================================================================

/// Version Negotiation packet (RFC 9000 Section 17.2.1).
///
/// Long form with the fixed bit clear; the version word is zero and the
/// rest of the datagram after the connection IDs is a list of whole
/// 4-byte supported versions.
#[derive(Debug, Clone)]
pub struct VersionNegotiation {
    /// Connection this packet belongs to.
    pub ctx: ConnectionHandle,
    /// The seven low bits of the first byte; arbitrary on the wire and
    /// preserved for round-trips.
    pub unused: u8,
    /// Version word, zero for this variant.
    pub version: u32,
    /// Destination connection ID.
    pub dcid: ConnectionId,
    /// Source connection ID.
    pub scid: ConnectionId,
    /// Versions the sender would accept.
    pub supported_versions: Vec<u32>,
}

impl VersionNegotiation {
    /// A default Version Negotiation packet on `ctx`.
    pub fn new(ctx: &ConnectionHandle) -> Self {
        Self {
            ctx: ctx.clone(),
            unused: 0,
            version: VERSION_NEGOTIATION,
            dcid: ConnectionId::empty(),
            scid: ConnectionId::empty(),
            supported_versions: Vec::new(),
        }
    }
}

/// Initial packet (RFC 9000 Section 17.2.2).
#[derive(Debug, Clone)]
pub struct Initial {
    /// Connection this packet belongs to.
    pub ctx: ConnectionHandle,
    /// Fixed bit; set on every well-formed v1 packet.
    pub fixed_bit: bool,
    /// The two reserved bits, preserved for round-trips.
    pub reserved: u8,
    /// Packet number width class; `None` selects the narrowest class for
    /// the value at build time.
    pub pn_len: Option<PacketNumberLen>,
    /// Protocol version.
    pub version: u32,
    /// Destination connection ID.
    pub dcid: ConnectionId,
    /// Source connection ID.
    pub scid: ConnectionId,
    /// Address validation token, possibly empty.
    pub token: Bytes,
    /// Wire length field covering packet number and payload; `None` is
    /// computed at build time, `Some` after parsing or when pinned.
    pub length: Option<u64>,
    /// Packet number.
    pub packet_number: u64,
    /// Frame payload.
    pub payload: FramePayload,
}

impl Initial {
    /// A default Initial packet on `ctx`: version 1, empty IDs and token,
    /// packet number 0, empty payload.
    pub fn new(ctx: &ConnectionHandle) -> Self {
        Self {
            ctx: ctx.clone(),
            fixed_bit: true,
            reserved: 0,
            pn_len: None,
            version: VERSION_1,
            dcid: ConnectionId::empty(),
            scid: ConnectionId::empty(),
            token: Bytes::new(),
            length: None,
            packet_number: 0,
            payload: FramePayload::default(),
        }
    }

    /// Display form of the packet number under this packet's context.
    pub fn packet_number_repr(&self) -> PacketNumberRepr {
        PacketNumberRepr {
            value: self.packet_number,
            encrypted: !self.ctx.is_decrypted(),
        }
    }
}

/// 0-RTT packet (RFC 9000 Section 17.2.3): the Initial layout without
/// the token fields.
#[derive(Debug, Clone)]
pub struct ZeroRtt {
    /// Connection this packet belongs to.
    pub ctx: ConnectionHandle,
    /// Fixed bit.
    pub fixed_bit: bool,
    /// The two reserved bits.
    pub reserved: u8,
    /// Packet number width class; `None` derives from the value.
    pub pn_len: Option<PacketNumberLen>,
    /// Protocol version.
    pub version: u32,
    /// Destination connection ID.
    pub dcid: ConnectionId,
    /// Source connection ID.
    pub scid: ConnectionId,
    /// Wire length field; `None` is computed at build time.
    pub length: Option<u64>,
    /// Packet number.
    pub packet_number: u64,
    /// Frame payload.
    pub payload: FramePayload,
}

impl ZeroRtt {
    /// A default 0-RTT packet on `ctx`.
    pub fn new(ctx: &ConnectionHandle) -> Self {
        Self {
            ctx: ctx.clone(),
            fixed_bit: true,
            reserved: 0,
            pn_len: None,
            version: VERSION_1,
            dcid: ConnectionId::empty(),
            scid: ConnectionId::empty(),
            length: None,
            packet_number: 0,
            payload: FramePayload::default(),
        }
    }

    /// Display form of the packet number under this packet's context.
    pub fn packet_number_repr(&self) -> PacketNumberRepr {
        PacketNumberRepr {
            value: self.packet_number,
            encrypted: !self.ctx.is_decrypted(),
        }
    }
}

/// Handshake packet (RFC 9000 Section 17.2.4): same layout as 0-RTT with
/// type bits 2.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Connection this packet belongs to.
    pub ctx: ConnectionHandle,
    /// Fixed bit.
    pub fixed_bit: bool,
    /// The two reserved bits.
    pub reserved: u8,
    /// Packet number width class; `None` derives from the value.
    pub pn_len: Option<PacketNumberLen>,
    /// Protocol version.
    pub version: u32,
    /// Destination connection ID.
    pub dcid: ConnectionId,
    /// Source connection ID.
    pub scid: ConnectionId,
    /// Wire length field; `None` is computed at build time.
    pub length: Option<u64>,
    /// Packet number.
    pub packet_number: u64,
    /// Frame payload.
    pub payload: FramePayload,
}

impl Handshake {
    /// A default Handshake packet on `ctx`.
    pub fn new(ctx: &ConnectionHandle) -> Self {
        Self {
            ctx: ctx.clone(),
            fixed_bit: true,
            reserved: 0,
            pn_len: None,
            version: VERSION_1,
            dcid: ConnectionId::empty(),
            scid: ConnectionId::empty(),
            length: None,
            packet_number: 0,
            payload: FramePayload::default(),
        }
    }

    /// Display form of the packet number under this packet's context.
    pub fn packet_number_repr(&self) -> PacketNumberRepr {
        PacketNumberRepr {
            value: self.packet_number,
            encrypted: !self.ctx.is_decrypted(),
        }
    }
}

/// Retry packet (RFC 9000 Section 17.2.5).
///
/// Carries no packet number, length, or payload; the four low bits of
/// the first byte are unused and the wire form ends after the source
/// connection ID.
#[derive(Debug, Clone)]
pub struct Retry {
    /// Connection this packet belongs to.
    pub ctx: ConnectionHandle,
    /// Fixed bit.
    pub fixed_bit: bool,
    /// The four low bits of the first byte, preserved for round-trips.
    pub unused: u8,
    /// Protocol version.
    pub version: u32,
    /// Destination connection ID.
    pub dcid: ConnectionId,
    /// Source connection ID.
    pub scid: ConnectionId,
}

impl Retry {
    /// A default Retry packet on `ctx`.
    pub fn new(ctx: &ConnectionHandle) -> Self {
        Self {
            ctx: ctx.clone(),
            fixed_bit: true,
            unused: 0,
            version: VERSION_1,
            dcid: ConnectionId::empty(),
            scid: ConnectionId::empty(),
        }
    }
}

/// 1-RTT packet (RFC 9000 Section 17.3).
///
/// The short header does not encode its destination connection ID
/// length; dissection takes it from the connection context, and `new`
/// seeds the field from the context for building.
#[derive(Debug, Clone)]
pub struct OneRtt {
    /// Connection this packet belongs to.
    pub ctx: ConnectionHandle,
    /// Fixed bit.
    pub fixed_bit: bool,
    /// Latency spin bit.
    pub spin: bool,
    /// The two reserved bits.
    pub reserved: u8,
    /// Key phase bit.
    pub key_phase: bool,
    /// Packet number width class; `None` derives from the value.
    pub pn_len: Option<PacketNumberLen>,
    /// Destination connection ID. Its length never travels in a short
    /// header; both sides must already agree on it via the context.
    pub dcid: ConnectionId,
    /// Packet number.
    pub packet_number: u64,
    /// Frame payload, extending to the end of the datagram.
    pub payload: FramePayload,
}

impl OneRtt {
    /// A default 1-RTT packet on `ctx`, destination ID taken from the
    /// context.
    pub fn new(ctx: &ConnectionHandle) -> Self {
        Self {
            ctx: ctx.clone(),
            fixed_bit: true,
            spin: false,
            reserved: 0,
            key_phase: false,
            pn_len: None,
            dcid: ctx.dcid(),
            packet_number: 0,
            payload: FramePayload::default(),
        }
    }

    /// Display form of the packet number under this packet's context.
    pub fn packet_number_repr(&self) -> PacketNumberRepr {
        PacketNumberRepr {
            value: self.packet_number,
            encrypted: !self.ctx.is_decrypted(),
        }
    }
}

// ============================================================================
// Closed packet set
// ============================================================================

/// A QUIC packet of any variant.
#[derive(Debug, Clone)]
pub enum Packet {
    /// Version Negotiation packet.
    VersionNegotiation(VersionNegotiation),
    /// Initial packet.
    Initial(Initial),
    /// 0-RTT packet.
    ZeroRtt(ZeroRtt),
    /// Handshake packet.
    Handshake(Handshake),
    /// Retry packet.
    Retry(Retry),
    /// 1-RTT packet.
    OneRtt(OneRtt),
}

impl Packet {
    /// The variant selector for this packet.
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::VersionNegotiation(_) => PacketType::VersionNegotiation,
            Packet::Initial(_) => PacketType::Initial,
            Packet::ZeroRtt(_) => PacketType::ZeroRtt,
            Packet::Handshake(_) => PacketType::Handshake,
            Packet::Retry(_) => PacketType::Retry,
            Packet::OneRtt(_) => PacketType::OneRtt,
        }
    }

    /// One-line human-readable summary: the variant's display name.
    pub fn summary(&self) -> &'static str {
        self.packet_type().name()
    }

    /// The connection context this packet belongs to.
    pub fn ctx(&self) -> &ConnectionHandle {
        match self {
            Packet::VersionNegotiation(p) => &p.ctx,
            Packet::Initial(p) => &p.ctx,
            Packet::ZeroRtt(p) => &p.ctx,
            Packet::Handshake(p) => &p.ctx,
            Packet::Retry(p) => &p.ctx,
            Packet::OneRtt(p) => &p.ctx,
        }
    }

    /// Display form of the packet number, for variants that carry one.
    pub fn packet_number_repr(&self) -> Option<PacketNumberRepr> {
        match self {
            Packet::Initial(p) => Some(p.packet_number_repr()),
            Packet::ZeroRtt(p) => Some(p.packet_number_repr()),
            Packet::Handshake(p) => Some(p.packet_number_repr()),
            Packet::OneRtt(p) => Some(p.packet_number_repr()),
            Packet::VersionNegotiation(_) | Packet::Retry(_) => None,
        }
    }

    /// The frame payload, for variants that carry one.
    pub fn payload(&self) -> Option<&FramePayload> {
        match self {
            Packet::Initial(p) => Some(&p.payload),
            Packet::ZeroRtt(p) => Some(&p.payload),
            Packet::Handshake(p) => Some(&p.payload),
            Packet::OneRtt(p) => Some(&p.payload),
            Packet::VersionNegotiation(_) | Packet::Retry(_) => None,
        }
    }
}

impl core::fmt::Display for Packet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionContext;

    mod dispatch {
        use super::*;

        #[test]
        fn first_byte_selects_the_variant() {
            assert_eq!(PacketType::dispatch(&[0xc0]), PacketType::Initial);
            assert_eq!(PacketType::dispatch(&[0xd0]), PacketType::ZeroRtt);
            assert_eq!(PacketType::dispatch(&[0xe0]), PacketType::Handshake);
            assert_eq!(PacketType::dispatch(&[0xf0]), PacketType::Retry);
            assert_eq!(PacketType::dispatch(&[0x40]), PacketType::OneRtt);
        }

        #[test]
        fn long_form_without_fixed_bit_is_version_negotiation() {
            assert_eq!(
                PacketType::dispatch(&[0x80]),
                PacketType::VersionNegotiation
            );
            // Type bits are irrelevant when the fixed bit is clear.
            assert_eq!(
                PacketType::dispatch(&[0xb0]),
                PacketType::VersionNegotiation
            );
        }

        #[test]
        fn empty_input_defaults_to_initial() {
            assert_eq!(PacketType::dispatch(&[]), PacketType::Initial);
        }

        #[test]
        fn short_form_ignores_remaining_bits() {
            assert_eq!(PacketType::dispatch(&[0x00]), PacketType::OneRtt);
            assert_eq!(PacketType::dispatch(&[0x7f]), PacketType::OneRtt);
        }
    }

    mod summaries {
        use super::*;

        #[test]
        fn summary_is_the_variant_name() {
            let ctx = ConnectionContext::new();
            let packet = Packet::Initial(Initial::new(&ctx));
            assert_eq!(packet.summary(), "QUIC - Initial");
            assert_eq!(packet.to_string(), "QUIC - Initial");

            let packet = Packet::ZeroRtt(ZeroRtt::new(&ctx));
            assert_eq!(packet.summary(), "QUIC - 0-RTT");

            let packet = Packet::VersionNegotiation(VersionNegotiation::new(&ctx));
            assert_eq!(packet.summary(), "QUIC - Version Negotiation");

            let packet = Packet::OneRtt(OneRtt::new(&ctx));
            assert_eq!(packet.summary(), "QUIC - 1-RTT");
        }
    }

    mod contexts {
        use super::*;

        #[test]
        fn packet_number_repr_follows_the_gate() {
            let ctx = ConnectionContext::new();
            let packet = Initial::new(&ctx);
            assert_eq!(packet.packet_number_repr().to_string(), "0 (encrypted)");

            ctx.set_decrypted(true);
            assert_eq!(packet.packet_number_repr().to_string(), "0");
        }

        #[test]
        fn one_rtt_seeds_dcid_from_the_context() {
            let ctx = ConnectionContext::new();
            ctx.set_dcid(ConnectionId::from_slice(&[9, 9, 9]).unwrap());
            let packet = OneRtt::new(&ctx);
            assert_eq!(packet.dcid.as_bytes(), [9, 9, 9]);
        }

        #[test]
        fn default_initial_fields() {
            let ctx = ConnectionContext::new();
            let packet = Initial::new(&ctx);
            assert!(packet.fixed_bit);
            assert_eq!(packet.version, VERSION_1);
            assert!(packet.dcid.is_empty());
            assert!(packet.token.is_empty());
            assert_eq!(packet.length, None);
            assert_eq!(packet.packet_number, 0);
            assert!(packet.payload.is_empty());
        }
    }

    #[test]
    fn port_association_covers_both_directions() {
        assert!(is_quic_port(QUIC_PORT, 50_000));
        assert!(is_quic_port(50_000, QUIC_PORT));
        assert!(!is_quic_port(50_000, 50_001));
    }
}
